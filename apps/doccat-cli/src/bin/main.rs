use std::env;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use doccat_cluster::{run_cluster, run_sequential, PipelineConfig, RunReport};
use doccat_core::config::{resolve_with_base, Config, SinkMode};
use doccat_core::corpus::DirectoryCorpus;
use doccat_core::sink::{relevant_topic_line, AppendFileSink, OutputFormat};
use doccat_core::{DocumentOutcome, ResultSink};

const USAGE: &str = "Usage: doccat [run] [--workers N | -w N] [--sequential] [--merge] [--truncate] [--topics] [--format tabbed|csv|jsonl] [--output PATH] [--catalog PATH] [CORPUS_DIR]";

#[derive(Debug, Default)]
struct Args {
    workers: Option<usize>,
    sequential: bool,
    merge: bool,
    topics: bool,
    truncate: bool,
    format: Option<OutputFormat>,
    output: Option<PathBuf>,
    catalog: Option<PathBuf>,
    corpus: Option<PathBuf>,
}

fn value(args: &[String], i: &mut usize, flag: &str) -> anyhow::Result<String> {
    *i += 1;
    args.get(*i).cloned().with_context(|| format!("{flag} requires a value"))
}

fn parse_args(args: &[String]) -> anyhow::Result<Option<Args>> {
    let mut parsed = Args::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "help" | "--help" | "-h" => return Ok(None),
            "run" if i == 0 => {}
            "--workers" | "-w" => {
                let raw = value(args, &mut i, "--workers")?;
                parsed.workers = Some(raw.parse().with_context(|| format!("--workers expects a number, got '{raw}'"))?);
            }
            "--sequential" => parsed.sequential = true,
            "--merge" => parsed.merge = true,
            "--topics" => parsed.topics = true,
            "--truncate" => parsed.truncate = true,
            "--format" => parsed.format = Some(value(args, &mut i, "--format")?.parse()?),
            "--output" | "-o" => parsed.output = Some(PathBuf::from(value(args, &mut i, "--output")?)),
            "--catalog" | "-c" => parsed.catalog = Some(PathBuf::from(value(args, &mut i, "--catalog")?)),
            other if !other.starts_with('-') => parsed.corpus = Some(PathBuf::from(other)),
            other => anyhow::bail!("unknown option '{other}'\n{USAGE}"),
        }
        i += 1;
    }
    Ok(Some(parsed))
}

/// Forwards outcomes to the real sink, ticks a progress spinner and keeps
/// each document's relevant-topic line.
struct ProgressSink<'a> {
    inner: &'a dyn ResultSink,
    bar: ProgressBar,
    topics: Mutex<Vec<String>>,
}

impl<'a> ProgressSink<'a> {
    fn new(inner: &'a dyn ResultSink, bar: ProgressBar) -> Self {
        Self { inner, bar, topics: Mutex::new(Vec::new()) }
    }

    fn into_topic_lines(self) -> Vec<String> {
        self.topics.into_inner().unwrap_or_default()
    }
}

impl ResultSink for ProgressSink<'_> {
    fn record(&self, outcome: &DocumentOutcome) -> doccat_core::Result<()> {
        let result = self.inner.record(outcome);
        if let (Some(line), Ok(mut topics)) = (relevant_topic_line(outcome), self.topics.lock()) {
            topics.push(line);
        }
        self.bar.inc(1);
        self.bar.set_message(outcome.document_name().to_string());
        result
    }

    fn flush(&self) -> doccat_core::Result<()> { self.inner.flush() }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(report: &RunReport, output: &std::path::Path) {
    println!("\nTopics: {}  Documents: {}  Units: {}", report.topics, report.documents, report.units);
    for w in &report.workers {
        println!("  unit {}: {} assigned, {} classified, {} failed", w.rank, w.assigned, w.classified, w.failed);
    }
    println!("Classified {} / failed {} -> {}", report.classified, report.failed, output.display());
    if report.sink_errors > 0 { println!("⚠️  {} results could not be written", report.sink_errors); }
    println!("{}s", report.elapsed.as_secs_f64());
}

fn run(argv: &[String]) -> anyhow::Result<()> {
    let Some(args) = parse_args(argv)? else {
        println!("{USAGE}");
        return Ok(());
    };
    setup_logging();
    tracing::debug!(?args, "arguments parsed");

    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;
    let separators = settings.catalog.separators()?;

    let cwd = env::current_dir().context("reading the current directory")?;
    let catalog_path = args.catalog.unwrap_or_else(|| resolve_with_base(&cwd, &settings.catalog.path));
    let corpus_dir = args.corpus.unwrap_or_else(|| resolve_with_base(&cwd, &settings.corpus.dir));
    let output_path = args.output.unwrap_or_else(|| resolve_with_base(&cwd, &settings.output.path));
    let format = args.format.unwrap_or(settings.output.format);
    let workers = args.workers.unwrap_or(settings.pipeline.workers);
    let sink_mode = if args.merge { SinkMode::Merge } else { settings.pipeline.sink_mode };

    println!("doccat\n======");
    println!("Catalog: {}", catalog_path.display());
    println!("Corpus:  {}", corpus_dir.display());
    if args.sequential { println!("Mode:    sequential") } else { println!("Mode:    {workers} workers, {sink_mode:?} sink") }

    let pipeline = PipelineConfig::new(workers, &catalog_path).with_separators(separators).with_sink_mode(sink_mode);
    if !args.sequential { pipeline.check_units()?; }
    let corpus = DirectoryCorpus::new(&corpus_dir).with_extensions(settings.corpus.extensions.iter().cloned());
    let file_sink = AppendFileSink::open(&output_path, format, args.truncate || settings.output.truncate)?;

    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} documents {msg}")?);
    let sink = ProgressSink::new(&file_sink, bar.clone());

    let report = if args.sequential {
        run_sequential(&pipeline, &corpus, &sink)
    } else {
        run_cluster(&pipeline, &corpus, &sink)
    };
    bar.finish_and_clear();
    let report = report.with_context(|| format!("classifying {}", corpus_dir.display()))?;

    if args.sequential || args.topics {
        println!();
        for line in sink.into_topic_lines() { println!("{line}"); }
    }
    print_summary(&report, file_sink.path());
    Ok(())
}

fn main() {
    let argv: Vec<String> = env::args().skip(1).collect();
    if let Err(e) = run(&argv) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
