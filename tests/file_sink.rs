use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;

use nfsim_connector::{FileSink, ObservableSample, ObservableSnapshot, OutputFiles, ReactionCounter};

fn sample(time: f64, a: f64) -> ObservableSample {
    let snapshot: ObservableSnapshot = vec![("Atotal", a)].into_iter().collect();
    ObservableSample {
        time,
        snapshot: Arc::new(snapshot),
    }
}

#[test]
fn same_file_twice_appends_without_second_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("m.xml.seed_00001.gdat");
    fs::write(&path, "stale contents from an earlier run\n").unwrap();

    let mut sink = FileSink::new(OutputFiles::new(dir.path(), Path::new("m.xml"), 1));
    let columns = vec!["Atotal".to_string()];

    sink.append_observables(&path, &columns, &[sample(0.0, 1.0)]).unwrap();
    let first = fs::read_to_string(&path).unwrap();
    assert_eq!(first, "time, Atotal, \n0, 1, \n");

    sink.append_observables(&path, &columns, &[sample(1.0, 2.0)]).unwrap();
    let second = fs::read_to_string(&path).unwrap();
    assert_eq!(second, format!("{first}1, 2, \n"));
    assert_eq!(sink.registry().len(), 1);
}

#[test]
fn new_sink_truncates_again() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.gdat");
    let columns = vec!["Atotal".to_string()];

    let mut first = FileSink::new(OutputFiles::new(dir.path(), Path::new("m.xml"), 1));
    first.append_observables(&path, &columns, &[sample(0.0, 1.0)]).unwrap();

    let mut second = FileSink::new(OutputFiles::new(dir.path(), Path::new("m.xml"), 1));
    second.append_observables(&path, &columns, &[sample(5.0, 9.0)]).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "time, Atotal, \n5, 9, \n");
}

#[test]
fn reaction_file_is_rewritten() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("m.xml_reactions.seed_00001.gdat");
    let mut counter = ReactionCounter::new();
    for _ in 0..3 {
        counter.record_fire("A");
    }
    counter.flush_reactions(&path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "A fired 3\n");

    counter.reset();
    counter.record_fire("B");
    counter.flush_reactions(&path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "B fired 1\n");
}
