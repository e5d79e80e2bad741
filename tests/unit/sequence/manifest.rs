use super::*;

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "bitseq_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

#[test]
fn normalize_rel_path_rules() {
    assert_eq!(normalize_rel_path("a/b.png").unwrap(), "a/b.png");
    assert_eq!(normalize_rel_path("a\\b.png").unwrap(), "a/b.png");
    assert_eq!(normalize_rel_path("./a//b.png").unwrap(), "a/b.png");
    assert!(normalize_rel_path("/abs.png").is_err());
    assert!(normalize_rel_path("C:\\abs.png").is_err());
    assert!(normalize_rel_path("../up.png").is_err());
    assert!(normalize_rel_path("").is_err());
    assert!(normalize_rel_path("./.").is_err());
}

#[test]
fn json_defaults_apply() {
    let m = SequenceManifest::from_json_str(
        r#"{ "width": 4, "height": 2, "frames": [ { "keyframe": true }, {} ] }"#,
    )
    .unwrap();
    assert!(!m.static_content);
    assert_eq!(m.frame_rate, 30.0);
    assert_eq!(m.frames.len(), 2);
    assert!(m.frames[0].keyframe);
    assert!(!m.frames[1].keyframe);
    assert!(m.frames[1].patches.is_empty());
}

#[test]
fn malformed_json_is_serde_error() {
    let err = SequenceManifest::from_json_str("{ nope").unwrap_err();
    assert!(matches!(err, BitseqError::Serde(_)));
}

#[test]
fn resolve_reads_files_once_and_keeps_blank_patches() {
    let dir = temp_dir("manifest_resolve");
    std::fs::create_dir_all(dir.join("p")).unwrap();
    std::fs::write(dir.join("p/a.bin"), [1u8, 2, 3]).unwrap();

    let patch = |file: Option<&str>| ManifestPatch {
        x: 0,
        y: 0,
        width: 2,
        height: 2,
        file: file.map(str::to_string),
    };
    let m = SequenceManifest {
        width: 2,
        height: 2,
        static_content: true,
        frame_rate: 12.0,
        frames: vec![
            ManifestFrame {
                keyframe: true,
                patches: vec![patch(Some("p/a.bin"))],
            },
            ManifestFrame {
                keyframe: false,
                patches: vec![patch(None), patch(Some("p\\a.bin"))],
            },
        ],
    };

    let seq = m.resolve(&dir).unwrap();
    assert!(seq.static_content());
    assert_eq!(seq.frame_rate(), 12.0);
    let a = &seq.frames()[0].patches[0].bytes;
    let b = &seq.frames()[1].patches[1].bytes;
    assert_eq!(&a[..], &[1, 2, 3]);
    assert!(Arc::ptr_eq(a, b));
    assert!(seq.frames()[1].patches[0].is_empty());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn resolve_reports_missing_file_and_bad_path() {
    let dir = temp_dir("manifest_missing");
    std::fs::create_dir_all(&dir).unwrap();

    let mut m = SequenceManifest {
        width: 2,
        height: 2,
        static_content: false,
        frame_rate: 30.0,
        frames: vec![ManifestFrame {
            keyframe: true,
            patches: vec![ManifestPatch {
                width: 2,
                height: 2,
                file: Some("missing.png".to_string()),
                ..Default::default()
            }],
        }],
    };
    let err = m.resolve(&dir).unwrap_err();
    assert!(err.to_string().contains("missing.png"));

    m.frames[0].patches[0].file = Some("../escape.png".to_string());
    let err = m.resolve(&dir).unwrap_err();
    assert!(err.to_string().contains("frame 0 patch 0"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn load_manifest_round_trips_through_disk() {
    let dir = temp_dir("manifest_load");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("k.bin"), [9u8]).unwrap();

    let m = SequenceManifest {
        width: 3,
        height: 1,
        static_content: false,
        frame_rate: 30.0,
        frames: vec![ManifestFrame {
            keyframe: true,
            patches: vec![ManifestPatch {
                width: 3,
                height: 1,
                file: Some("k.bin".to_string()),
                ..Default::default()
            }],
        }],
    };
    let path = dir.join("seq.json");
    std::fs::write(&path, m.to_json_string().unwrap()).unwrap();

    let seq = load_manifest(&path).unwrap();
    assert_eq!((seq.width(), seq.height()), (3, 1));
    assert_eq!(&seq.frames()[0].patches[0].bytes[..], &[9]);

    std::fs::remove_dir_all(&dir).ok();
}
