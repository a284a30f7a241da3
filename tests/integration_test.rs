use fragvault::backup::{create_backup, reassemble, recover_secret, BackupError, BackupOptions};
use fragvault::block::Secret;
use fragvault::codec;
use fragvault::crypto::{Argon2Kdf, KdfParams};
use fragvault::layout::{self, PlacementKind, Size};
use fragvault::recovery::{AuxiliaryTargets, ScanKind};
use fragvault::service::{RestoreService, ServiceError};
use fragvault::visual::{EccLevel, VisualDecoder, VisualEncoder, VisualError};
use image::{Rgba, RgbaImage};

fn cheap_kdf() -> Argon2Kdf {
    Argon2Kdf::new(KdfParams { memory_kib: 64, passes: 1, parallelism: 1 })
}

fn three_secrets() -> Vec<Secret> {
    vec![Secret::new("a", "p1"), Secret::new("b", "p2"), Secret::new("c", "p3")]
}

/// Writes a 4-byte length then the text bytes into the red channel of a
/// square raster.  Good enough to carry wire text through the layout engine.
struct PixelCode;

impl VisualEncoder for PixelCode {
    fn encode(&self, text: &str, _ecc: EccLevel) -> Result<RgbaImage, VisualError> {
        let mut bytes = (text.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(text.as_bytes());
        let mut side = 1u32;
        while (side * side) < bytes.len() as u32 {
            side += 1;
        }
        let mut img = RgbaImage::from_pixel(side, side, Rgba([0, 0, 0, 255]));
        for (i, b) in bytes.iter().enumerate() {
            let i = i as u32;
            img.put_pixel(i % side, i / side, Rgba([*b, 0, 0, 255]));
        }
        Ok(img)
    }
}

impl VisualDecoder for PixelCode {
    fn decode(&self, raster: &RgbaImage) -> Result<String, VisualError> {
        let side = raster.width();
        let bytes: Vec<u8> = (0..side * raster.height())
            .map(|i| raster.get_pixel(i % side, i / side).0[0])
            .collect();
        if bytes.len() < 4 {
            return Err(VisualError::NoCodeFound);
        }
        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let body = bytes.get(4..4 + len).ok_or(VisualError::Corrupt("short".into()))?;
        String::from_utf8(body.to_vec()).map_err(|e| VisualError::Corrupt(e.to_string()))
    }
}

#[test]
fn test_three_secrets_end_to_end() {
    let kdf = cheap_kdf();
    let backup = create_backup(&three_secrets(), &kdf, &BackupOptions::default()).unwrap();
    assert_eq!(backup.fragments.len(), 4);

    let joined = codec::join(&backup.fragments).unwrap();
    assert_eq!(joined, backup.serialized);

    let block = reassemble(&backup.fragments).unwrap();
    assert_eq!(block, backup.block);
    for (pass, msg) in [("p1", "a"), ("p2", "b"), ("p3", "c")] {
        assert_eq!(recover_secret(&block, pass, &kdf).unwrap(), msg);
    }
    assert!(matches!(recover_secret(&block, "p4", &kdf), Err(BackupError::DecryptionFailed)));
}

#[test]
fn test_service_restores_from_shuffled_duplicated_scans() {
    let kdf = cheap_kdf();
    let backup = create_backup(&three_secrets(), &kdf, &BackupOptions::default()).unwrap();
    let wire = backup.wire_fragments();

    let svc = RestoreService::new(4).unwrap();
    let token = svc.start_session().unwrap();

    let scans = [
        wire[2].as_str(),
        "[\"skip\"]",
        wire[0].as_str(),
        wire[2].as_str(),
        "behind the clock",
        wire[3].as_str(),
    ];
    for scan in scans {
        svc.submit_scan(token, scan).unwrap();
    }
    assert_eq!(svc.progress(token).unwrap().missing(), vec![2]);
    assert!(matches!(
        svc.restore(token, "p2", &kdf),
        Err(ServiceError::MissingFragments { have: 3, need: 4 })
    ));

    // Malformed fragment is rejected without disturbing the session.
    assert!(svc.submit_scan(token, r#"{"order":"two"}"#).is_err());
    let receipt = svc.submit_scan(token, &wire[1]).unwrap();
    assert!(receipt.complete);

    let restored = svc.restore(token, "p2", &kdf).unwrap();
    assert_eq!(restored.secret, "b");
    assert_eq!(restored.hint, "behind the clock");
    assert!(restored.targets.is_empty());
    assert_eq!(restored.fingerprint, backup.fingerprint());

    assert!(matches!(
        svc.restore(token, "nope", &kdf),
        Err(ServiceError::Backup(BackupError::DecryptionFailed))
    ));
}

#[test]
fn test_composite_image_scans_back() {
    let kdf = cheap_kdf();
    let opts = BackupOptions::default();
    let backup = create_backup(&[Secret::new("seed words", "pw")], &kdf, &opts).unwrap();
    let targets = AuxiliaryTargets::parse(["https://vault.example.com/restore"]).unwrap();
    let label = backup.fingerprint();

    let composite = backup.render(&PixelCode, Some(&targets), Some(&label), &opts).unwrap();
    assert_eq!(composite.width(), opts.layout.canvas_width);
    assert!(composite.height() <= opts.layout.canvas_height);

    // Cut each code back out of the composite using the same plan.
    let codes: Vec<RgbaImage> = backup
        .wire_fragments()
        .iter()
        .map(|w| PixelCode.encode(w, opts.ecc).unwrap())
        .collect();
    let aux = PixelCode.encode(&targets.to_wire(), opts.ecc).unwrap();
    let sizes: Vec<Size> = codes.iter().map(Size::of).collect();
    let plan = layout::plan(&sizes, Some(Size::of(&aux)), Some(&label), &opts.layout).unwrap();

    let svc = RestoreService::new(opts.fragment_count).unwrap();
    let token = svc.start_session().unwrap();
    let mut kinds = Vec::new();
    for p in plan.placements.iter().rev() {
        if !matches!(p.kind, PlacementKind::Fragment(_) | PlacementKind::Auxiliary) {
            continue;
        }
        let r = p.rect;
        let crop = image::imageops::crop_imm(&composite, r.x, r.y, r.width, r.height).to_image();
        kinds.push(svc.submit_raster(token, &crop, &PixelCode).unwrap().kind);
    }
    assert!(kinds.contains(&ScanKind::TargetList));

    let restored = svc.restore(token, "pw", &kdf).unwrap();
    assert_eq!(restored.secret, "seed words");
    assert_eq!(restored.targets, targets);
}

#[test]
fn test_blank_raster_is_rejected() {
    let svc = RestoreService::new(4).unwrap();
    let token = svc.start_session().unwrap();
    let blank = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]));
    assert!(matches!(
        svc.submit_raster(token, &blank, &PixelCode),
        Err(ServiceError::Visual(VisualError::NoCodeFound))
    ));
    assert_eq!(svc.progress(token).unwrap().collected(), 0);
}

#[test]
fn test_capacity_exhaustion_is_fatal() {
    let kdf = cheap_kdf();
    let secrets: Vec<Secret> = (0..4)
        .map(|i| Secret::new("y".repeat(400), format!("pass{i}")))
        .collect();
    match create_backup(&secrets, &kdf, &BackupOptions::default()) {
        Err(BackupError::CapacityExhausted { attempts, last_capacity }) => {
            assert_eq!(attempts, 11);
            assert_eq!(last_capacity, 64 * 20);
        }
        other => panic!("expected capacity exhaustion, got {other:?}"),
    }
}
