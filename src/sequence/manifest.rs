use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;

use crate::{
    foundation::{
        core::Canvas,
        error::{BitseqError, BitseqResult},
    },
    sequence::model::{BitmapFrame, BitmapRect, BitmapSequence},
};

/// On-disk JSON description of a bitmap sequence.
///
/// Patch images live next to the manifest and are referenced by relative path.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SequenceManifest {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Whether the owning composition never changes once decoded.
    #[serde(default)]
    pub static_content: bool,
    /// Playback rate in frames per second.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f32,
    /// Frames in playback order.
    pub frames: Vec<ManifestFrame>,
}

/// One frame entry of a [`SequenceManifest`].
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ManifestFrame {
    /// Whether this frame is a keyframe.
    #[serde(default)]
    pub keyframe: bool,
    /// Patches in application order.
    #[serde(default)]
    pub patches: Vec<ManifestPatch>,
}

/// One patch entry of a [`ManifestFrame`].
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ManifestPatch {
    /// Left edge in canvas pixels.
    pub x: u32,
    /// Top edge in canvas pixels.
    pub y: u32,
    /// Declared width.
    pub width: u32,
    /// Declared height.
    pub height: u32,
    /// Encoded image, relative to the manifest directory. Absent for a blank patch.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_frame_rate() -> f32 {
    30.0
}

impl SequenceManifest {
    /// Parse manifest JSON.
    pub fn from_json_str(s: &str) -> BitseqResult<Self> {
        serde_json::from_str(s).map_err(|e| BitseqError::serde(e.to_string()))
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> BitseqResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| BitseqError::serde(e.to_string()))
    }

    /// Read every referenced patch file under `root` and build the sequence.
    ///
    /// Files referenced more than once are read once and share their bytes.
    pub fn resolve(&self, root: &Path) -> BitseqResult<Arc<BitmapSequence>> {
        let mut loaded: HashMap<String, Arc<[u8]>> = HashMap::new();
        let empty: Arc<[u8]> = Arc::from(Vec::new());

        let mut frames = Vec::with_capacity(self.frames.len());
        for (fi, mf) in self.frames.iter().enumerate() {
            let mut patches = smallvec::SmallVec::new();
            for (pi, mp) in mf.patches.iter().enumerate() {
                let bytes = match mp.file.as_deref() {
                    None => empty.clone(),
                    Some(src) => {
                        let rel = normalize_rel_path(src).map_err(|e| {
                            BitseqError::validation(format!("frame {fi} patch {pi}: {e}"))
                        })?;
                        match loaded.get(&rel) {
                            Some(b) => b.clone(),
                            None => {
                                let path = root.join(&rel);
                                let b: Arc<[u8]> = std::fs::read(&path)
                                    .with_context(|| {
                                        format!("read patch file '{}'", path.display())
                                    })?
                                    .into();
                                loaded.insert(rel, b.clone());
                                b
                            }
                        }
                    }
                };
                patches.push(BitmapRect::new(mp.x, mp.y, mp.width, mp.height, bytes));
            }
            frames.push(BitmapFrame {
                is_keyframe: mf.keyframe,
                patches,
            });
        }

        tracing::debug!(
            frames = frames.len(),
            files = loaded.len(),
            "resolved sequence manifest"
        );
        let canvas = Canvas {
            width: self.width,
            height: self.height,
        };
        BitmapSequence::new(canvas, self.static_content, self.frame_rate, frames).map(Arc::new)
    }
}

/// Load a manifest file and every patch it references.
pub fn load_manifest(path: &Path) -> BitseqResult<Arc<BitmapSequence>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("open manifest '{}'", path.display()))?;
    let manifest = SequenceManifest::from_json_str(&text)?;
    let root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    manifest.resolve(&root)
}

/// Normalize and validate manifest-relative patch paths.
///
/// The normalized result uses `/` separators, removes `.` segments, and rejects absolute paths or
/// parent traversals (`..`).
pub fn normalize_rel_path(source: &str) -> BitseqResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') || s.as_bytes().get(1) == Some(&b':') {
        return Err(BitseqError::validation("patch paths must be relative"));
    }
    if s.is_empty() {
        return Err(BitseqError::validation("patch path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(BitseqError::validation("patch paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(BitseqError::validation(
            "patch path must contain a file name",
        ));
    }

    Ok(out.join("/"))
}

#[cfg(test)]
#[path = "../../tests/unit/sequence/manifest.rs"]
mod tests;
