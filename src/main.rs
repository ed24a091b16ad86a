//! CLI entry point for the concall tool.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use clap::Parser;
use concall_core::extract::{DocumentExtractor, TranscriptExtractor, YoutubeTranscripts};
use concall_core::{
    ApiSink, CompositeSink, CsvSink, DedupStore, Discovery, ItemStatus, JsonDirSink, LlmAnalyzer,
    ManifestDiscovery, Pipeline, ResultSink, RunSummary, ScreenerDiscovery, SourceDescriptor,
    SourceExtractor,
};
use tracing::{debug, info, warn};

mod cli;
mod config;

use cli::Args;
use config::{OutputSettings, Settings, SourceSettings, load_config};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // .env must be loaded before clap reads env-backed arguments.
    let dotenv_path = dotenvy::dotenv().ok();

    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(
        verbose = args.verbose,
        quiet = args.quiet,
        dry_run = args.dry_run,
        dotenv = ?dotenv_path,
        "CLI arguments parsed"
    );

    let loaded = load_config(args.config.as_deref())?;
    if let Some(path) = loaded.config.as_ref().and(loaded.path.as_ref()) {
        debug!(path = %path.display(), "config file loaded");
    }
    let settings = Settings::resolve(&args, loaded.config.as_ref())?;

    info!("concall starting");

    let discovery = build_discovery(&settings.sources)?;
    let sources = discovery.discover().await.context("source discovery failed")?;
    info!(sources = sources.len(), "sources discovered");

    if settings.dry_run {
        print_sources(&sources);
        return Ok(ExitCode::SUCCESS);
    }
    if sources.is_empty() {
        info!("nothing to process");
        return Ok(ExitCode::SUCCESS);
    }

    if settings.llm.api_key.is_none() {
        warn!("no LLM API key found in CONCALL_LLM_API_KEY or GROQ_API_KEY");
    }

    let mut document = DocumentExtractor::new()?;
    if let Some(dir) = &settings.scratch_dir {
        document = document.with_scratch_dir(dir);
    }
    let transcripts = YoutubeTranscripts::new()?.with_language(&settings.transcript_language);
    let extractor = SourceExtractor::new(document, TranscriptExtractor::new(Arc::new(transcripts)));
    let analyzer = LlmAnalyzer::new(settings.llm.clone())?;
    let sink = build_sink(&settings.output)?;
    let dedup = DedupStore::open(&settings.dedup_path).with_context(|| {
        format!(
            "cannot load processed state '{}'",
            settings.dedup_path.display()
        )
    })?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    let mut pipeline = Pipeline::new(
        Arc::new(extractor),
        Arc::new(analyzer),
        sink,
        dedup,
        settings.pipeline.clone(),
    )
    .with_interrupt(Arc::clone(&interrupted));

    let summary = pipeline.run(sources).await;
    print_summary(&summary);

    if summary.interrupted || interrupted.load(Ordering::SeqCst) {
        warn!(
            done = summary.done,
            failed = summary.failed,
            "Interrupted. Run again to resume."
        );
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::from(summary.exit_outcome().code()))
}

fn build_discovery(sources: &SourceSettings) -> Result<Box<dyn Discovery>> {
    match sources {
        SourceSettings::Manifest(path) => Ok(Box::new(ManifestDiscovery::new(path))),
        SourceSettings::Listing {
            base_url,
            credentials,
            filter,
        } => {
            let Some(credentials) = credentials.clone() else {
                bail!(
                    "listing discovery needs SCREENER_USERNAME and SCREENER_PASSWORD (or use --manifest)"
                );
            };
            Ok(Box::new(
                ScreenerDiscovery::with_base_url(base_url, credentials)?.with_date_filter(*filter),
            ))
        }
    }
}

fn build_sink(output: &OutputSettings) -> Result<Box<dyn ResultSink>> {
    let mut sinks: Vec<Box<dyn ResultSink>> = Vec::new();
    // The API goes first so local artifacts only exist for records it accepted.
    if let Some(url) = &output.api_url {
        let mut api = ApiSink::new(url)?;
        if let Some(token) = &output.api_token {
            api = api.with_token(token);
        }
        sinks.push(Box::new(api));
    }
    if let Some(dir) = &output.json_dir {
        sinks.push(Box::new(JsonDirSink::new(dir)));
    }
    if let Some(path) = &output.csv {
        sinks.push(Box::new(CsvSink::new(path)));
    }

    match sinks.len() {
        0 => bail!("no output configured"),
        1 => Ok(sinks.remove(0)),
        _ => Ok(Box::new(CompositeSink::new(sinks))),
    }
}

fn print_sources(sources: &[SourceDescriptor]) {
    for source in sources {
        println!(
            "{}\t{}\t{}\t{}",
            source.identity(),
            source.kind(),
            source.company(),
            source.locator()
        );
    }
}

fn print_summary(summary: &RunSummary) {
    for outcome in &summary.outcomes {
        match &outcome.status {
            ItemStatus::Done { target, .. } => println!("done     {}  {}", outcome.identity, target),
            ItemStatus::Skipped(_) => println!("skipped  {}", outcome.identity),
            ItemStatus::Failed(reason) => println!("failed   {}  {}", outcome.identity, reason),
        }
    }
    println!(
        "{} done, {} skipped, {} failed{}",
        summary.done,
        summary.skipped,
        summary.failed,
        if summary.interrupted {
            " (interrupted)"
        } else {
            ""
        }
    );
}
