pub(crate) mod dsl;
pub(crate) mod manifest;
pub(crate) mod model;
pub(crate) mod reader;
