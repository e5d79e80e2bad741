use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::{
    codec::PatchDecoder,
    foundation::core::Rgba8Premul,
    perf::Performance,
    pixels::pixmap::PixmapMut,
    sequence::dsl::SequenceBuilder,
};

/// `[w, h, r, g, b, a]` fills a `w x h` patch; `[w, h]` opens but fails to decode.
#[derive(Default)]
struct SolidCodec {
    reads: AtomicUsize,
}

struct SolidDecoder<'a> {
    bytes: &'a [u8],
    reads: &'a AtomicUsize,
}

impl PatchCodec for SolidCodec {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> anyhow::Result<Option<Box<dyn PatchDecoder + 'a>>> {
        match bytes.len() {
            0 => Ok(None),
            2 | 6 => Ok(Some(Box::new(SolidDecoder {
                bytes,
                reads: &self.reads,
            }))),
            n => anyhow::bail!("unrecognized {n}-byte patch"),
        }
    }
}

impl PatchDecoder for SolidDecoder<'_> {
    fn width(&self) -> u32 {
        u32::from(self.bytes[0])
    }

    fn height(&self) -> u32 {
        u32::from(self.bytes[1])
    }

    fn read_into(&mut self, dst: &mut PixmapMut<'_>) -> anyhow::Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let [_, _, r, g, b, a] = *self.bytes else {
            anyhow::bail!("corrupt patch");
        };
        for y in 0..dst.height() {
            for px in dst.row_mut(y).unwrap().chunks_exact_mut(4) {
                px.copy_from_slice(&[r, g, b, a]);
            }
        }
        Ok(())
    }
}

fn solid(w: u8, h: u8, v: u8) -> Vec<u8> {
    vec![w, h, v, v, v, 255]
}

fn reader_for(seq: Arc<BitmapSequence>) -> (SequenceReader, Arc<SolidCodec>) {
    let codec = Arc::new(SolidCodec::default());
    (SequenceReader::new(seq, codec.clone()), codec)
}

fn frames(flags: &[bool]) -> Vec<BitmapFrame> {
    flags
        .iter()
        .map(|&k| BitmapFrame {
            is_keyframe: k,
            patches: Default::default(),
        })
        .collect()
}

#[test]
fn start_frame_continues_sequential_playback() {
    let f = frames(&[true, false, false, false]);
    assert_eq!(find_start_frame(&f, 3, Some(FrameIndex(2))), 3);
    assert_eq!(find_start_frame(&f, 2, Some(FrameIndex(0))), 1);
}

#[test]
fn start_frame_falls_back_to_keyframe() {
    let f = frames(&[true, false, true, false, false]);
    assert_eq!(find_start_frame(&f, 4, None), 2);
    assert_eq!(find_start_frame(&f, 1, Some(FrameIndex(3))), 0);
    assert_eq!(find_start_frame(&f, 4, Some(FrameIndex(0))), 2);
    assert_eq!(find_start_frame(&f, 2, Some(FrameIndex(2))), 2);
}

#[test]
fn start_frame_prefers_gap_resume_when_no_keyframe_between() {
    let f = frames(&[true, false, false, false, false]);
    assert_eq!(find_start_frame(&f, 4, Some(FrameIndex(1))), 2);
}

#[test]
fn repeated_request_skips_codec() {
    let seq = SequenceBuilder::new(4, 4)
        .keyframe(|f| f.patch(0, 0, 4, 4, solid(4, 4, 9)))
        .build()
        .unwrap();
    let (reader, codec) = reader_for(seq);

    let h1 = reader.get_frame(FrameIndex(0)).unwrap().content_hash();
    let h2 = reader.get_frame(FrameIndex(0)).unwrap().content_hash();
    assert_eq!(h1, h2);
    assert_eq!(codec.reads.load(Ordering::SeqCst), 1);
    assert_eq!(reader.last_decoded_frame(), Some(FrameIndex(0)));
}

#[test]
fn out_of_range_leaves_cursor_alone() {
    let seq = SequenceBuilder::new(2, 2)
        .keyframe(|f| f.patch(0, 0, 2, 2, solid(2, 2, 1)))
        .build()
        .unwrap();
    let (reader, _) = reader_for(seq);
    reader.get_frame(FrameIndex(0)).unwrap();

    let err = reader.get_frame(FrameIndex(1)).unwrap_err();
    assert!(matches!(err, BitseqError::Validation(_)));
    assert_eq!(reader.last_decoded_frame(), Some(FrameIndex(0)));
}

#[test]
fn failure_invalidates_and_reports_patch() {
    let seq = SequenceBuilder::new(4, 4)
        .keyframe(|f| f.patch(0, 0, 4, 4, solid(4, 4, 1)))
        .delta(|f| f.patch(0, 0, 2, 2, solid(2, 2, 2)).patch(1, 1, 2, 2, vec![2u8, 2]))
        .build()
        .unwrap();
    let (reader, codec) = reader_for(seq);
    reader.get_frame(FrameIndex(0)).unwrap();

    let err = reader.get_frame(FrameIndex(1)).unwrap_err();
    match err {
        BitseqError::Decode { frame, patch, .. } => assert_eq!((frame, patch), (1, 1)),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(reader.last_decoded_frame(), None);

    // Frame 0 is no longer trusted either: it has to be decoded again.
    let before = codec.reads.load(Ordering::SeqCst);
    reader.get_frame(FrameIndex(0)).unwrap();
    assert_eq!(codec.reads.load(Ordering::SeqCst), before + 1);
}

#[test]
fn unrecognized_patch_is_a_decode_error() {
    let seq = SequenceBuilder::new(4, 4)
        .keyframe(|f| f.patch(0, 0, 4, 4, vec![1u8, 2, 3]))
        .build()
        .unwrap();
    let (reader, _) = reader_for(seq);
    assert!(reader.get_frame(FrameIndex(0)).unwrap_err().is_decode());
}

#[test]
fn decoded_patch_past_canvas_edge_is_a_decode_error() {
    let seq = SequenceBuilder::new(4, 4)
        .keyframe(|f| f.patch(2, 2, 2, 2, solid(3, 3, 1)))
        .build()
        .unwrap();
    let (reader, _) = reader_for(seq);
    assert!(reader.get_frame(FrameIndex(0)).unwrap_err().is_decode());
    assert_eq!(reader.last_decoded_frame(), None);
}

#[test]
fn allocation_failure_is_sticky() {
    let seq = Arc::new(BitmapSequence::new(
        crate::foundation::core::Canvas {
            width: 4,
            height: 4,
        },
        false,
        30.0,
        vec![BitmapFrame {
            is_keyframe: true,
            patches: Default::default(),
        }],
    )
    .unwrap());
    let reader = SequenceReader::with_opts(
        seq,
        Arc::new(SolidCodec::default()),
        Arc::new(NoopPerf),
        ReaderOpts::default(),
    );
    assert!(reader.get_frame(FrameIndex(0)).is_ok());

    let huge = Arc::new(
        BitmapSequence::new(
            crate::foundation::core::Canvas {
                width: u32::MAX,
                height: u32::MAX,
            },
            false,
            30.0,
            vec![],
        )
        .unwrap(),
    );
    let reader = SequenceReader::new(huge, Arc::new(SolidCodec::default()));
    for _ in 0..2 {
        let err = reader.get_frame(FrameIndex(0)).unwrap_err();
        assert!(matches!(err, BitseqError::Allocation(_)));
    }
    assert_eq!(reader.last_decoded_frame(), None);
}

#[test]
fn allocation_policy_follows_static_content() {
    let dynamic = SequenceBuilder::new(2, 2)
        .keyframe(|f| f.patch(0, 0, 2, 2, solid(2, 2, 3)))
        .build()
        .unwrap();
    let (reader, _) = reader_for(dynamic);
    assert!(!reader.get_frame(FrameIndex(0)).unwrap().is_shared());

    let still = SequenceBuilder::new(2, 2)
        .static_content(true)
        .keyframe(|f| f.patch(0, 0, 2, 2, solid(2, 2, 3)))
        .build()
        .unwrap();
    let (reader, _) = reader_for(still);
    let shared = reader.get_frame(FrameIndex(0)).unwrap().share().unwrap();
    assert_eq!(&shared[..4], &[3, 3, 3, 255]);
}

#[test]
fn alpha_only_reader_uses_coverage_buffer() {
    let seq = SequenceBuilder::new(2, 1).keyframe(|f| f).build().unwrap();
    let reader = SequenceReader::with_opts(
        seq,
        Arc::new(SolidCodec::default()),
        Arc::new(NoopPerf),
        ReaderOpts {
            force_exclusive: Some(true),
            alpha_only: true,
        },
    );
    let frame = reader.get_frame(FrameIndex(0)).unwrap();
    assert_eq!(frame.row_bytes(), 2);
    assert_eq!(frame.frame(), FrameIndex(0));
}

#[test]
fn decode_time_is_reported_only_when_work_happens() {
    let seq = SequenceBuilder::new(2, 2)
        .keyframe(|f| f.patch(0, 0, 2, 2, solid(2, 2, 1)))
        .empty_delta()
        .build()
        .unwrap();
    let perf = Arc::new(Performance::new());
    let reader = SequenceReader::with_opts(
        seq,
        Arc::new(SolidCodec::default()),
        perf.clone(),
        ReaderOpts::default(),
    );
    reader.get_frame(FrameIndex(0)).unwrap();
    reader.get_frame(FrameIndex(0)).unwrap();
    reader.get_frame(FrameIndex(1)).unwrap();
    assert_eq!(perf.stats().decode_calls, 2);
}

#[test]
fn keyframe_first_patch_smaller_than_canvas_clears() {
    let seq = SequenceBuilder::new(4, 4)
        .keyframe(|f| f.patch(0, 0, 4, 4, solid(4, 4, 200)))
        .keyframe(|f| f.blank(0, 0).patch(1, 1, 1, 1, solid(1, 1, 50)))
        .build()
        .unwrap();
    let (reader, _) = reader_for(seq);
    reader.get_frame(FrameIndex(0)).unwrap();

    let frame = reader.get_frame(FrameIndex(1)).unwrap();
    for y in 0..4 {
        for x in 0..4 {
            let want = if (x, y) == (1, 1) {
                Rgba8Premul {
                    r: 50,
                    g: 50,
                    b: 50,
                    a: 255,
                }
            } else {
                Rgba8Premul::transparent()
            };
            assert_eq!(frame.pixel(x, y), Some(want), "pixel ({x}, {y})");
        }
    }
}

#[test]
fn poisoned_lock_is_recovered_without_stale_cursor() {
    struct PanicCodec;
    impl PatchCodec for PanicCodec {
        fn open<'a>(
            &'a self,
            _bytes: &'a [u8],
        ) -> anyhow::Result<Option<Box<dyn PatchDecoder + 'a>>> {
            panic!("codec exploded");
        }
    }

    let seq = SequenceBuilder::new(2, 2)
        .keyframe(|f| f.patch(0, 0, 2, 2, solid(2, 2, 1)))
        .build()
        .unwrap();
    let reader = SequenceReader::new(seq, Arc::new(PanicCodec));
    let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = reader.get_frame(FrameIndex(0));
    }));
    assert!(caught.is_err());
    assert_eq!(reader.last_decoded_frame(), None);
}
