//! User-level configuration under `$HOME` combined with an explicit file.
//!
//! Kept in its own test binary since it changes `HOME` for the process.

use galleria_images::{ImageConfig, MB};
use std::fs;

#[test]
fn test_user_layer_survives_partial_explicit_layer() {
    let home = tempfile::TempDir::new().unwrap();
    let user_dir = home.path().join(".galleria").join("config");
    fs::create_dir_all(&user_dir).unwrap();
    fs::write(user_dir.join("images.yaml"), "quota:\n  capacity_bytes: 2048\n").unwrap();
    std::env::set_var("HOME", home.path());

    let user_only = ImageConfig::load_with_hierarchy(None).unwrap();
    assert_eq!(user_only.quota.capacity_bytes, 2048);
    assert!((user_only.quota.warning_ratio - 0.85).abs() < f64::EPSILON);

    let explicit = home.path().join("explicit.yaml");
    fs::write(&explicit, "resize:\n  enabled: true\n").unwrap();
    let layered = ImageConfig::load_with_hierarchy(Some(&explicit)).unwrap();
    assert_eq!(layered.quota.capacity_bytes, 2048);
    assert!(layered.resize.enabled);
    assert_eq!(layered.ingest.max_upload_bytes, 5 * MB);
}
