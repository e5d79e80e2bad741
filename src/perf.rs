use std::sync::atomic::{AtomicU64, Ordering};

/// Sink for decode timings reported by sequence readers.
///
/// Implementations are called while the reader holds its lock, so they must return promptly and
/// never block.
pub trait PerfSink: Send + Sync {
    /// Record the wall time of one `get_frame` call that did decode work.
    fn record_decode_time(&self, nanos: u64);
}

/// Sink that discards every report.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPerf;

impl PerfSink for NoopPerf {
    fn record_decode_time(&self, _nanos: u64) {}
}

/// Point-in-time copy of a [`Performance`] accumulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PerfStats {
    /// Total nanoseconds spent decoding images.
    pub image_decoding_time: u64,
    /// Number of reports folded into `image_decoding_time`.
    pub decode_calls: u64,
}

/// Lock-free accumulator shared by every reader of a composition.
#[derive(Debug, Default)]
pub struct Performance {
    image_decoding_time: AtomicU64,
    decode_calls: AtomicU64,
}

impl Performance {
    /// Create a zeroed accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current totals.
    pub fn stats(&self) -> PerfStats {
        PerfStats {
            image_decoding_time: self.image_decoding_time.load(Ordering::Relaxed),
            decode_calls: self.decode_calls.load(Ordering::Relaxed),
        }
    }

    /// Return the current totals and reset them to zero.
    pub fn take(&self) -> PerfStats {
        PerfStats {
            image_decoding_time: self.image_decoding_time.swap(0, Ordering::Relaxed),
            decode_calls: self.decode_calls.swap(0, Ordering::Relaxed),
        }
    }
}

impl PerfSink for Performance {
    fn record_decode_time(&self, nanos: u64) {
        self.image_decoding_time.fetch_add(nanos, Ordering::Relaxed);
        self.decode_calls.fetch_add(1, Ordering::Relaxed);
    }
}
