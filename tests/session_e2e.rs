use std::fs;

use tempfile::tempdir;

use nfsim_connector::{EchoEngine, Session, SessionConfig};

fn config(dir: &std::path::Path, threshold: usize) -> SessionConfig {
    SessionConfig::new("models/tlbr.xml", 3)
        .with_output_dir(dir)
        .with_flush_threshold(threshold)
}

#[test]
fn seeded_run_writes_expected_gdat() {
    let dir = tempdir().unwrap();
    let mut session = Session::new(EchoEngine::new(), config(dir.path(), 10_000)).unwrap();

    session.add_seed("A()", 5).unwrap();
    session.add_seed("B()", 3).unwrap();

    let snapshot = session.cached_observables().unwrap();
    assert_eq!(snapshot.get("Atotal"), Some(5.0));
    assert_eq!(snapshot.get("Btotal"), Some(3.0));

    session.log_observables(0.0).unwrap();
    session.log_observables(1.0).unwrap();
    session.flush().unwrap();

    let text = fs::read_to_string(&session.output_files().observables).unwrap();
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    assert_eq!(lines, vec!["time, Atotal, Btotal,", "0, 5, 3,", "1, 5, 3,"]);
    assert_eq!(session.engine().calls().resets, 1);
}

#[test]
fn threshold_minus_one_does_not_flush() {
    let dir = tempdir().unwrap();
    let threshold = 5;
    let mut session = Session::new(EchoEngine::new(), config(dir.path(), threshold)).unwrap();
    session.add_seed("A()", 1).unwrap();

    for t in 0..threshold - 1 {
        assert!(session.log_observables(t as f64).unwrap().is_none());
    }
    assert_eq!(session.buffer().len(), threshold - 1);
    assert!(!session.output_files().observables.exists());
}

#[test]
fn exactly_threshold_flushes_once() {
    let dir = tempdir().unwrap();
    let threshold = 5;
    let mut session = Session::new(EchoEngine::new(), config(dir.path(), threshold)).unwrap();
    session.add_seed("A()", 1).unwrap();

    let flushes = (0..threshold)
        .filter_map(|t| session.log_observables(t as f64).unwrap())
        .count();
    assert_eq!(flushes, 1);
    assert!(session.buffer().is_empty());

    // Later flushes append rows under the same header.
    session.log_observables(99.0).unwrap();
    session.flush().unwrap();
    let text = fs::read_to_string(&session.output_files().observables).unwrap();
    assert_eq!(text.matches("time,").count(), 1);
    assert_eq!(text.lines().count(), 1 + threshold + 1);
}

#[test]
fn negative_deltas_floor_at_zero() {
    let dir = tempdir().unwrap();
    let mut session = Session::new(EchoEngine::new(), config(dir.path(), 10)).unwrap();
    assert_eq!(session.add_seed("A()", 4).unwrap(), 4);
    assert_eq!(session.add_seed("A()", -10).unwrap(), 0);
    assert_eq!(session.add_seed("A()", i64::MIN).unwrap(), 0);
    assert_eq!(session.add_seed("A()", 2).unwrap(), 2);
    assert!(session.add_seed("", 1).unwrap_err().is_validation());
}

#[test]
fn changing_observables_mid_run_is_rejected() {
    let dir = tempdir().unwrap();
    let mut session = Session::new(EchoEngine::new(), config(dir.path(), 10)).unwrap();
    session.add_seed("A()", 1).unwrap();
    session.log_observables(0.0).unwrap();

    session.add_seed("B()", 1).unwrap();
    let err = session.log_observables(1.0).unwrap_err();
    assert_eq!(err.status_code(), -10);
    assert_eq!(session.buffer().len(), 1);
}

#[test]
fn reset_keeps_file_columns_fixed() {
    let dir = tempdir().unwrap();
    let mut session = Session::new(EchoEngine::new(), config(dir.path(), 10)).unwrap();
    session.add_seed("A()", 1).unwrap();
    session.log_observables(0.0).unwrap();
    session.flush().unwrap();

    session.reset_system().unwrap();
    session.add_seed("B()", 7).unwrap();
    let err = session.log_observables(1.0).unwrap_err();
    assert_eq!(err.status_code(), -10);
    assert!(session.buffer().is_empty());

    // Same columns as the header are still accepted after the reset.
    session.reset_system().unwrap();
    session.add_seed("A()", 2).unwrap();
    session.log_observables(2.0).unwrap();
    session.flush().unwrap();

    let text = fs::read_to_string(&session.output_files().observables).unwrap();
    assert_eq!(text, "time, Atotal, \n0, 1, \n2, 2, \n");
}

#[test]
fn explicit_path_refuses_column_change() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("explicit.gdat");
    let mut session = Session::new(EchoEngine::new(), config(dir.path(), 10)).unwrap();
    session.add_seed("A()", 1).unwrap();
    session.log_observables(0.0).unwrap();
    session.flush_observables_to(&path).unwrap();

    session.reset_system().unwrap();
    session.add_seed("B()", 7).unwrap();
    session.log_observables(1.0).unwrap();
    assert!(session.flush_observables_to(&path).unwrap_err().is_validation());
    assert_eq!(fs::read_to_string(&path).unwrap(), "time, Atotal, \n0, 1, \n");
}

#[test]
fn saturated_seeds_log_without_overflow() {
    let dir = tempdir().unwrap();
    let mut session = Session::new(EchoEngine::new(), config(dir.path(), 10)).unwrap();
    for _ in 0..3 {
        session.add_seed("A()", i64::MAX).unwrap();
    }
    assert_eq!(session.ledger().count("A()"), u64::MAX);
    session.add_seed("A(b)", 1).unwrap();

    session.log_observables(0.0).unwrap();
    let snapshot = session.cached_observables().unwrap();
    assert_eq!(snapshot.get("Atotal"), Some(u64::MAX as f64));
}
