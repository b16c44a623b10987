use fieldtrack_core::{default_log_level, init_logging, logging_status};
use tempfile::tempdir;

// Logging state is process-global; keep all init assertions in one test.
#[test]
fn init_is_idempotent_and_rejects_reconfiguration() {
    let dir = tempdir().unwrap();
    let dir_str = dir.path().to_str().unwrap().to_string();

    assert!(logging_status().is_none());
    init_logging("info", &dir_str).unwrap();
    init_logging("info", &dir_str).unwrap();

    let level_error = init_logging("debug", &dir_str).unwrap_err();
    assert!(level_error.contains("refusing to switch"));

    let other = tempdir().unwrap();
    let dir_error = init_logging("info", other.path().to_str().unwrap()).unwrap_err();
    assert!(dir_error.contains("refusing to switch"));

    let (level, active_dir) = logging_status().unwrap();
    assert_eq!(level, "info");
    assert_eq!(active_dir, dir.path());

    assert!(matches!(default_log_level(), "debug" | "info"));
}
