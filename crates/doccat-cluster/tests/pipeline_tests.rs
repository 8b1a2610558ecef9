use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use doccat_cluster::{run_cluster, run_sequential, PipelineConfig};
use doccat_core::config::SinkMode;
use doccat_core::corpus::{DirectoryCorpus, StaticCorpus};
use doccat_core::sink::{AppendFileSink, MemorySink, OutputFormat};
use doccat_core::{DocumentOutcome, Error};
use tempfile::TempDir;

fn write_catalog(dir: &Path) -> PathBuf {
    let path = dir.join("catalog.txt");
    fs::write(&path, "Sports@%ball,goal\nTech@%cpu,ram\n").unwrap();
    path
}

fn write_corpus(dir: &Path, n: usize) -> PathBuf {
    let docs = dir.join("docs");
    fs::create_dir_all(&docs).unwrap();
    for i in 0..n {
        let body = format!("doc {i}: {}\n{}", "ball ".repeat(i % 3), "cpu ".repeat(i % 2));
        fs::write(docs.join(format!("doc{i:02}.txt")), body).unwrap();
    }
    fs::write(docs.join("ignored.pdf"), "ball ball").unwrap();
    docs
}

fn counts(outcomes: &[DocumentOutcome]) -> BTreeMap<String, Vec<(String, u64)>> {
    outcomes
        .iter()
        .filter_map(|o| match o {
            DocumentOutcome::Classified(r) => Some((r.document_name.clone(), r.scores.iter().map(|s| (s.topic.clone(), s.count)).collect())),
            DocumentOutcome::Failed { .. } => None,
        })
        .collect()
}

#[test]
fn sports_and_tech_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let catalog = tmp.path().join("catalog.txt");
    fs::write(&catalog, "Sports@%ball,goal\nTech@%cpu\n").unwrap();
    let doc = tmp.path().join("match.txt");
    fs::write(&doc, "the ball hit the goal, what a goalball").unwrap();

    let sink = MemorySink::new();
    let config = PipelineConfig::new(2, &catalog);
    let report = run_cluster(&config, &StaticCorpus(vec![doc]), &sink).expect("run");
    assert_eq!(report.classified, 1);

    let outcomes = sink.into_outcomes();
    let scores = &counts(&outcomes)["match.txt"];
    assert_eq!(scores, &vec![("Sports".to_string(), 4), ("Tech".to_string(), 0)]);
}

#[test]
fn every_document_recorded_once_in_both_modes() {
    let tmp = TempDir::new().unwrap();
    let catalog = write_catalog(tmp.path());
    let docs = write_corpus(tmp.path(), 11);

    for mode in [SinkMode::Append, SinkMode::Merge] {
        for workers in [1, 2, 3, 5, 16] {
            let sink = MemorySink::new();
            let config = PipelineConfig::new(workers, &catalog).with_sink_mode(mode);
            let report = run_cluster(&config, &DirectoryCorpus::new(&docs), &sink).expect("run");
            let outcomes = sink.into_outcomes();

            assert_eq!(report.units, workers + 1);
            assert_eq!(report.documents, 11);
            assert_eq!(report.classified, 11, "mode={mode:?} workers={workers}");
            assert_eq!(outcomes.len(), 11, "mode={mode:?} workers={workers}");
            assert_eq!(counts(&outcomes).len(), 11, "no duplicates");
            assert_eq!(report.workers.len(), workers);
            let assigned: Vec<usize> = report.workers.iter().map(|w| w.assigned).collect();
            assert!(assigned.iter().max().unwrap() - assigned.iter().min().unwrap() <= 1);
        }
    }
}

#[test]
fn cluster_and_sequential_agree() {
    let tmp = TempDir::new().unwrap();
    let catalog = write_catalog(tmp.path());
    let docs = write_corpus(tmp.path(), 7);
    let config = PipelineConfig::new(3, &catalog);

    let parallel = MemorySink::new();
    run_cluster(&config, &DirectoryCorpus::new(&docs), &parallel).expect("cluster");
    let sequential = MemorySink::new();
    let report = run_sequential(&config, &DirectoryCorpus::new(&docs), &sequential).expect("sequential");

    assert_eq!(report.units, 1);
    assert_eq!(counts(&parallel.into_outcomes()), counts(&sequential.into_outcomes()));
}

#[test]
fn merge_mode_writes_in_rank_order() {
    let tmp = TempDir::new().unwrap();
    let catalog = write_catalog(tmp.path());
    let docs = write_corpus(tmp.path(), 5);
    let paths: Vec<PathBuf> = (0..5).map(|i| docs.join(format!("doc{i:02}.txt"))).collect();

    let sink = MemorySink::new();
    let config = PipelineConfig::new(2, &catalog).with_sink_mode(SinkMode::Merge);
    run_cluster(&config, &StaticCorpus(paths), &sink).expect("run");
    let names: Vec<String> = sink.into_outcomes().iter().map(|o| o.document_name().to_string()).collect();
    assert_eq!(names, vec!["doc00.txt", "doc01.txt", "doc02.txt", "doc03.txt", "doc04.txt"]);
}

#[test]
fn unreadable_document_does_not_stop_the_worker() {
    let tmp = TempDir::new().unwrap();
    let catalog = write_catalog(tmp.path());
    let docs = write_corpus(tmp.path(), 3);
    let paths = vec![docs.join("doc00.txt"), docs.join("vanished.txt"), docs.join("doc01.txt"), docs.join("doc02.txt")];

    let sink = MemorySink::new();
    let report = run_cluster(&PipelineConfig::new(1, &catalog), &StaticCorpus(paths), &sink).expect("run");
    assert_eq!(report.classified, 3);
    assert_eq!(report.failed, 1);

    let outcomes = sink.into_outcomes();
    assert_eq!(outcomes.len(), 4);
    assert!(matches!(&outcomes[1], DocumentOutcome::Failed { document_name, .. } if document_name == "vanished.txt"));
    assert!(outcomes[3].is_classified());
}

#[test]
fn single_unit_fails_before_loading_catalog() {
    let sink = MemorySink::new();
    let config = PipelineConfig::new(0, "/no/such/catalog.txt");
    let err = run_cluster(&config, &StaticCorpus::default(), &sink).unwrap_err();
    assert!(matches!(err, Error::InsufficientWorkers { units: 1, required: 2 }), "got {err:?}");
}

#[test]
fn missing_catalog_aborts_every_worker() {
    let sink = MemorySink::new();
    let config = PipelineConfig::new(4, "/no/such/catalog.txt");
    let err = run_cluster(&config, &StaticCorpus::default(), &sink).unwrap_err();
    assert!(matches!(err, Error::CatalogUnavailable { .. }), "got {err:?}");
    assert!(sink.outcomes().is_empty());
}

#[test]
fn malformed_catalog_aborts_the_run() {
    let tmp = TempDir::new().unwrap();
    let catalog = tmp.path().join("catalog.txt");
    fs::write(&catalog, "Sports@%ball\nbroken line\n").unwrap();
    let err = run_cluster(&PipelineConfig::new(2, &catalog), &StaticCorpus::default(), &MemorySink::new()).unwrap_err();
    assert!(matches!(err, Error::CatalogParse { line: 2, .. }), "got {err:?}");
}

#[test]
fn missing_corpus_aborts_after_catalog_broadcast() {
    let tmp = TempDir::new().unwrap();
    let catalog = write_catalog(tmp.path());
    let err = run_cluster(&PipelineConfig::new(3, &catalog), &DirectoryCorpus::new(tmp.path().join("absent")), &MemorySink::new()).unwrap_err();
    assert!(matches!(err, Error::CorpusUnavailable { .. }), "got {err:?}");
}

#[test]
fn empty_corpus_is_not_an_error() {
    let tmp = TempDir::new().unwrap();
    let catalog = write_catalog(tmp.path());
    let report = run_cluster(&PipelineConfig::new(3, &catalog), &StaticCorpus::default(), &MemorySink::new()).expect("run");
    assert_eq!(report.documents, 0);
    assert!(report.workers.iter().all(|w| w.assigned == 0));
}

#[test]
fn shared_append_file_holds_whole_records() {
    let tmp = TempDir::new().unwrap();
    let catalog = write_catalog(tmp.path());
    let docs = write_corpus(tmp.path(), 40);
    let out = tmp.path().join("results.txt");

    let sink = AppendFileSink::open(&out, OutputFormat::Tabbed, true).expect("sink");
    run_cluster(&PipelineConfig::new(6, &catalog), &DirectoryCorpus::new(&docs), &sink).expect("run");
    drop(sink);

    let text = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 40);
    for line in lines {
        assert!(line.starts_with("doc") && line.contains(".txt:\t"), "bad record: {line:?}");
        assert!(line.ends_with(",\t"), "truncated record: {line:?}");
        assert_eq!(line.matches(';').count(), 2, "interleaved record: {line:?}");
    }
}

#[test]
fn failed_run_leaves_previous_results_alone() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("results.txt");
    fs::write(&out, "previous run\n").unwrap();
    let docs = write_corpus(tmp.path(), 3);

    let sink = AppendFileSink::open(&out, OutputFormat::Tabbed, true).expect("sink");
    let err = run_cluster(&PipelineConfig::new(2, tmp.path().join("absent.txt")), &DirectoryCorpus::new(&docs), &sink).unwrap_err();
    assert!(matches!(err, Error::CatalogUnavailable { .. }), "got {err:?}");
    let err = run_cluster(&PipelineConfig::new(0, tmp.path().join("absent.txt")), &DirectoryCorpus::new(&docs), &sink).unwrap_err();
    assert!(matches!(err, Error::InsufficientWorkers { .. }), "got {err:?}");
    drop(sink);

    assert_eq!(fs::read_to_string(&out).unwrap(), "previous run\n");
}
