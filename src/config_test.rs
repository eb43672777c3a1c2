use super::*;

/// # Safety
/// Tests must run with `--test-threads=1` to avoid env races.
unsafe fn clear_env() {
    unsafe {
        std::env::remove_var("TRACKLABEL_LABEL_TYPE");
        std::env::remove_var("TRACKLABEL_TRACKING");
        std::env::remove_var("TRACKLABEL_PROPAGATE");
        std::env::remove_var("TRACKLABEL_MIN_BOX_SIZE");
        std::env::remove_var("TRACKLABEL_KEYFRAME_INTERVAL");
    }
}

#[test]
fn from_env_uses_defaults_and_overrides() {
    unsafe { clear_env() };
    let cfg = SessionConfig::from_env().unwrap();
    assert_eq!(cfg, SessionConfig::default());

    unsafe {
        std::env::set_var("TRACKLABEL_LABEL_TYPE", "Polygon2d");
        std::env::set_var("TRACKLABEL_TRACKING", "off");
        std::env::set_var("TRACKLABEL_PROPAGATE", "0");
        std::env::set_var("TRACKLABEL_MIN_BOX_SIZE", "12.5");
        std::env::set_var("TRACKLABEL_KEYFRAME_INTERVAL", "10");
    }
    let cfg = SessionConfig::from_env().unwrap();
    assert_eq!(cfg.label_type, LabelType::Polygon2d);
    assert!(!cfg.tracking);
    assert!(!cfg.propagate_new_tracks);
    assert!((cfg.min_box_size - 12.5).abs() < f64::EPSILON);
    assert_eq!(cfg.keyframe_interval, 10);

    unsafe {
        std::env::set_var("TRACKLABEL_TRACKING", "maybe");
    }
    let err = SessionConfig::from_env().unwrap_err();
    assert_eq!(err.error_code(), "E_CONFIG_PARSE");
    assert!(err.to_string().contains("TRACKLABEL_TRACKING"));

    unsafe {
        clear_env();
        std::env::set_var("TRACKLABEL_KEYFRAME_INTERVAL", "0");
    }
    assert!(matches!(SessionConfig::from_env(), Err(ConfigError::ZeroInterval)));

    unsafe { clear_env() };
}

#[test]
fn json_config_fills_missing_fields() {
    let cfg: SessionConfig = serde_json::from_str(r#"{"label_type":"polyline2d","tracking":false}"#).unwrap();
    assert_eq!(cfg.label_type, LabelType::Polyline2d);
    assert!(!cfg.tracking);
    assert_eq!(cfg.keyframe_interval, DEFAULT_KEYFRAME_INTERVAL);
    assert_eq!(cfg.keymap, Keymap::default());
}

#[test]
fn json_config_file_missing_is_read_error() {
    let err = SessionConfig::from_json_file(Path::new("/nonexistent/tracklabel.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Read(_)));
}

#[test]
fn key_frame_grid() {
    assert!(is_key_frame(0, 5));
    assert!(is_key_frame(10, 5));
    assert!(!is_key_frame(7, 5));
    assert!(is_key_frame(3, 1));
    assert!(!is_key_frame(0, 0));
}
