use std::{
    ops::Deref,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use tracing::{debug, trace, warn};

use crate::{
    codec::PatchCodec,
    foundation::{
        core::FrameIndex,
        error::{BitseqError, BitseqResult},
    },
    perf::{NoopPerf, PerfSink},
    pixels::buffer::{FrameRGBA, PixelBuffer},
    sequence::model::{BitmapFrame, BitmapSequence},
};

/// Construction options for [`SequenceReader`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReaderOpts {
    /// Override the allocation policy. `None` forces private memory unless the sequence is static.
    pub force_exclusive: Option<bool>,
    /// Composite into a coverage-only (`Alpha8`) buffer.
    pub alpha_only: bool,
}

struct ReaderState {
    buffer: PixelBuffer,
    /// Frame whose complete composite is in `buffer`; `None` while decoding or after a failure.
    last_decoded: Option<FrameIndex>,
}

enum Slot {
    Ready(Mutex<ReaderState>),
    Failed(String),
}

/// Incremental compositor for one [`BitmapSequence`].
///
/// Holds a single canvas-sized buffer and remembers which frame it currently shows. Sequential
/// playback decodes only the patches of the requested frame; seeks and gaps restart from the
/// nearest keyframe. All state is guarded by one mutex, so `get_frame` may be called from any
/// number of threads.
pub struct SequenceReader {
    sequence: Arc<BitmapSequence>,
    codec: Arc<dyn PatchCodec>,
    perf: Arc<dyn PerfSink>,
    slot: Slot,
}

impl std::fmt::Debug for SequenceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceReader")
            .field("canvas", &self.sequence.canvas())
            .field("frames", &self.sequence.len())
            .field("allocated", &matches!(self.slot, Slot::Ready(_)))
            .finish()
    }
}

impl SequenceReader {
    /// Create a reader with default options and no performance reporting.
    pub fn new(sequence: Arc<BitmapSequence>, codec: Arc<dyn PatchCodec>) -> Self {
        Self::with_opts(sequence, codec, Arc::new(NoopPerf), ReaderOpts::default())
    }

    /// Create a reader.
    ///
    /// Allocation failure does not fail construction; every later [`SequenceReader::get_frame`]
    /// reports it instead.
    pub fn with_opts(
        sequence: Arc<BitmapSequence>,
        codec: Arc<dyn PatchCodec>,
        perf: Arc<dyn PerfSink>,
        opts: ReaderOpts,
    ) -> Self {
        // Frames of non-static content are rewritten on every seek, so they must never land in
        // memory that has been handed out.
        let force_exclusive = opts
            .force_exclusive
            .unwrap_or(!sequence.static_content());
        let slot = match PixelBuffer::make(
            sequence.width(),
            sequence.height(),
            opts.alpha_only,
            force_exclusive,
        ) {
            Ok(buffer) => Slot::Ready(Mutex::new(ReaderState {
                buffer,
                last_decoded: None,
            })),
            Err(e) => {
                warn!(error = %e, "sequence reader has no frame buffer");
                Slot::Failed(e.to_string())
            }
        };
        Self {
            sequence,
            codec,
            perf,
            slot,
        }
    }

    /// The sequence this reader composites.
    pub fn sequence(&self) -> &Arc<BitmapSequence> {
        &self.sequence
    }

    /// Frame currently held complete in the buffer, if any.
    pub fn last_decoded_frame(&self) -> Option<FrameIndex> {
        match &self.slot {
            Slot::Ready(m) => lock(m).last_decoded,
            Slot::Failed(_) => None,
        }
    }

    /// Composite `target` and return a read guard over the buffer.
    ///
    /// The guard keeps the reader locked; drop it before requesting another frame from the same
    /// thread. On error the cached frame is discarded and the next call rebuilds from a keyframe.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn get_frame(&self, target: FrameIndex) -> BitseqResult<FrameGuard<'_>> {
        let m = match &self.slot {
            Slot::Ready(m) => m,
            Slot::Failed(msg) => return Err(BitseqError::allocation(msg.clone())),
        };
        let mut state = lock(m);
        if state.last_decoded == Some(target) {
            debug!("frame already composited");
            return Ok(FrameGuard { state, target });
        }

        let frames = self.sequence.frames();
        let target_idx = target.as_usize()?;
        if target_idx >= frames.len() {
            return Err(BitseqError::validation(format!(
                "frame {target} out of range for {} frames",
                frames.len()
            )));
        }

        let start = find_start_frame(frames, target_idx, state.last_decoded);
        debug!(start, cached = ?state.last_decoded, "compositing frames");

        let started = Instant::now();
        state.last_decoded = None;
        let result = self.composite(&mut state.buffer, start, target_idx);
        let nanos = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.perf.record_decode_time(nanos);

        match result {
            Ok(()) => {
                state.last_decoded = Some(target);
                Ok(FrameGuard { state, target })
            }
            Err(e) => {
                warn!(error = %e, "frame composition failed; cache invalidated");
                Err(e)
            }
        }
    }

    /// Composite `target` and copy it out as a packed frame.
    pub fn read_frame(&self, target: FrameIndex) -> BitseqResult<FrameRGBA> {
        Ok(self.get_frame(target)?.to_frame())
    }

    fn composite(&self, buffer: &mut PixelBuffer, start: usize, target: usize) -> BitseqResult<()> {
        let frames = self.sequence.frames();
        for (fi, frame) in frames.iter().enumerate().take(target + 1).skip(start) {
            self.apply_frame(buffer, fi as u64, frame)?;
        }
        Ok(())
    }

    fn apply_frame(
        &self,
        buffer: &mut PixelBuffer,
        fi: u64,
        frame: &BitmapFrame,
    ) -> BitseqResult<()> {
        let mut first_read = true;
        for (pi, patch) in frame.patches.iter().enumerate() {
            let decoder = self
                .codec
                .open(&patch.bytes)
                .map_err(|e| BitseqError::decode(fi, pi, e))?;
            let Some(mut decoder) = decoder else {
                trace!(frame = fi, patch = pi, "empty patch");
                continue;
            };

            let (w, h) = (decoder.width(), decoder.height());
            if first_read && frame.is_keyframe && (w, h) != (buffer.width(), buffer.height()) {
                trace!(frame = fi, w, h, "keyframe smaller than canvas; clearing");
                buffer.erase_all();
            }

            let mut canvas = buffer.pixmap_mut();
            let mut dst = canvas
                .subview(patch.x, patch.y, w, h)
                .map_err(|e| BitseqError::decode(fi, pi, anyhow::Error::new(e)))?;
            decoder
                .read_into(&mut dst)
                .map_err(|e| BitseqError::decode(fi, pi, e))?;
            first_read = false;
        }
        Ok(())
    }
}

/// Pick the first frame to apply when compositing `target`.
///
/// Walks backward from `target` and stops at the frame right after the cached one (sequential
/// playback) or at a keyframe, whichever comes first.
pub(crate) fn find_start_frame(
    frames: &[BitmapFrame],
    target: usize,
    last_decoded: Option<FrameIndex>,
) -> usize {
    let resume = last_decoded
        .and_then(|f| usize::try_from(f.0).ok())
        .and_then(|f| f.checked_add(1));
    (0..=target)
        .rev()
        .find(|&f| Some(f) == resume || frames[f].is_keyframe)
        .unwrap_or(0)
}

fn lock(m: &Mutex<ReaderState>) -> MutexGuard<'_, ReaderState> {
    // A panic mid-decode leaves `last_decoded` at `None`, so the state is still consistent.
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read access to a composited frame; the reader stays locked while this is alive.
pub struct FrameGuard<'a> {
    state: MutexGuard<'a, ReaderState>,
    target: FrameIndex,
}

impl FrameGuard<'_> {
    /// Frame shown by the buffer.
    pub fn frame(&self) -> FrameIndex {
        self.target
    }
}

impl Deref for FrameGuard<'_> {
    type Target = PixelBuffer;

    fn deref(&self) -> &PixelBuffer {
        &self.state.buffer
    }
}

impl std::fmt::Debug for FrameGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameGuard")
            .field("frame", &self.target)
            .field("buffer", &self.state.buffer)
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sequence/reader.rs"]
mod tests;
