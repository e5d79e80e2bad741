/// Convenience result type used across bitseq.
pub type BitseqResult<T> = Result<T, BitseqError>;

/// Top-level error taxonomy used by sequence decoding APIs.
#[derive(thiserror::Error, Debug)]
pub enum BitseqError {
    /// Invalid sequence data, manifest contents, or request arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// Pixel storage could not be allocated (zero or overflowing dimensions).
    #[error("allocation error: {0}")]
    Allocation(String),

    /// A present patch could not be decoded into the frame buffer.
    #[error("decode error: frame {frame} patch {patch}: {source}")]
    Decode {
        /// Frame whose patch failed.
        frame: u64,
        /// Index of the failing patch within the frame.
        patch: usize,
        /// Underlying codec failure.
        #[source]
        source: anyhow::Error,
    },

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BitseqError {
    /// Build a [`BitseqError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`BitseqError::Allocation`] value.
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Build a [`BitseqError::Decode`] value.
    pub fn decode(frame: u64, patch: usize, source: anyhow::Error) -> Self {
        Self::Decode {
            frame,
            patch,
            source,
        }
    }

    /// Build a [`BitseqError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Return `true` for errors that invalidate a reader's cached frame but leave it usable.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
