//! Command implementations behind the CLI. `run` drives the configured
//! experiment over the corpus and scores the traces it wrote; the other
//! commands operate on existing trace or corpus files.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::cli::Command;
use crate::config::Config;
use crate::corpus::{self, Item};
use crate::dataset::{generate, rows_for, training_file_name, write_sets, write_training_rows};
use crate::fold::build_fold;
use crate::gateway::OpenAiCompatibleClient;
use crate::gateway::error::GatewayError;
use crate::pipeline::driver::PipelineDriver;
use crate::pipeline::stages::{self, Experiment};
use crate::pipeline::types::{StageId, StageResult};
use crate::score;
use crate::trace::{Trace, TraceWriter, read_traces, trace_file_name};

pub async fn execute(config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Run => run(config).await,
        Command::Score { trace } => score_traces(config, trace.as_deref()),
        Command::Verify { trace } => verify_traces(config, trace.as_deref()).await,
        Command::Dataset => generate_dataset(config).await,
        Command::FinetuneSet { out } => emit_finetune_set(config, out.as_deref()),
    }
}

async fn run(config: &Config) -> Result<()> {
    let experiment =
        stages::build(&config.experiment).context("failed to assemble experiment stages")?;
    let items = load_corpus(config)?;
    let port = Arc::new(
        OpenAiCompatibleClient::from_env(&config.gateway.endpoint, &config.gateway.credential_env)
            .context("failed to build inference client")?,
    );
    let driver = PipelineDriver::new(
        port,
        Duration::from_millis(config.gateway.request_timeout_ms),
        Duration::from_millis(config.gateway.retry_delay_ms),
    );

    fs::create_dir_all(&config.trace.dir).with_context(|| {
        format!(
            "failed to create trace directory {}",
            config.trace.dir.display()
        )
    })?;
    let trace_path = config.trace.dir.join(trace_file_name(
        experiment.kind.as_str(),
        Some(&experiment.condition),
        config.experiment.train_size,
    ));
    let mut writer = TraceWriter::create(&trace_path)?;

    // Ctrl+C finishes the current item and stops before the next one, so the
    // trace file stays well formed.
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupted.store(true, Ordering::SeqCst);
            }
        });
    }

    tracing::info!(
        target: "runner",
        kind = %experiment.kind,
        condition = %experiment.condition,
        items = items.len(),
        trace = %trace_path.display(),
        "run_started"
    );

    for (index, item) in items.iter().enumerate() {
        if interrupted.load(Ordering::SeqCst) {
            tracing::warn!(target: "runner", completed = index, "run_interrupted");
            break;
        }
        let started = Instant::now();
        let trace = run_item(&driver, &experiment, item).await?;
        writer.append(&trace)?;
        tracing::debug!(
            target: "runner",
            item = index,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "item_traced"
        );
    }
    let written = writer.finish()?;
    tracing::info!(target: "runner", written, "run_finished");

    let summary = score::score(&read_traces(&trace_path)?);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn run_item(
    driver: &PipelineDriver,
    experiment: &Experiment,
    item: &Item,
) -> Result<Trace, GatewayError> {
    let mut trace = driver.run_item(&experiment.stages, item).await?;
    let mut rounds = 1;
    while rounds < experiment.design_rounds && needs_redesign(&trace) {
        tracing::debug!(target: "runner", rounds, "redesign_round");
        trace = driver.run_item(&experiment.stages, item).await?;
        rounds += 1;
    }
    Ok(trace)
}

/// Whether a sequence-design trace warrants another whole-chain attempt:
/// the structure-check expert saw anything but the target structure. Runs
/// without a checker stage never re-run.
fn needs_redesign(trace: &Trace) -> bool {
    match trace.record(StageId::StructureCheck) {
        Some(record) => match &record.result {
            StageResult::Accepted { value } => *value != trace.item.structure,
            StageResult::Failed => true,
        },
        None => false,
    }
}

fn score_traces(config: &Config, trace_override: Option<&Path>) -> Result<()> {
    let trace_path = resolve_trace_path(config, trace_override)?;
    let traces = read_traces(&trace_path)?;
    let summary = score::score(&traces);
    tracing::info!(
        target: "runner",
        trace = %trace_path.display(),
        total = summary.total,
        exact_matches = summary.exact_matches,
        "traces_scored"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn verify_traces(config: &Config, trace_override: Option<&Path>) -> Result<()> {
    let trace_path = resolve_trace_path(config, trace_override)?;
    let traces = read_traces(&trace_path)?;
    let fold = build_fold(&config.fold);
    let verifications = score::verify_designs(&traces, fold.as_ref()).await?;
    let achieved = verifications
        .iter()
        .filter(|verification| verification.achieved_target())
        .count();

    let out_path = verified_path(&trace_path);
    let file = File::create(&out_path)
        .with_context(|| format!("failed to create {}", out_path.display()))?;
    let mut writer = BufWriter::new(file);
    for verification in &verifications {
        serde_json::to_writer(&mut writer, verification)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    tracing::info!(
        target: "runner",
        trace = %trace_path.display(),
        designs = verifications.len(),
        achieved,
        out = %out_path.display(),
        "designs_verified"
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "designs": verifications.len(),
            "achieved_target": achieved,
        }))?
    );
    Ok(())
}

async fn generate_dataset(config: &Config) -> Result<()> {
    let fold = build_fold(&config.fold);
    let sets = generate(&config.dataset, fold.as_ref()).await?;
    let (train_path, validation_path) = write_sets(&config.dataset.out_dir, &sets)?;
    tracing::info!(
        target: "runner",
        train = sets.train.len(),
        validation = sets.validation.len(),
        train_path = %train_path.display(),
        validation_path = %validation_path.display(),
        "dataset_written"
    );
    println!(
        "wrote {} training and {} validation items under {}",
        sets.train.len(),
        sets.validation.len(),
        config.dataset.out_dir.display()
    );
    Ok(())
}

fn emit_finetune_set(config: &Config, out_override: Option<&Path>) -> Result<()> {
    let kind = config.experiment.kind;
    let condition = stages::condition_label(kind, config.experiment.condition.as_deref())?;
    let train_path = config.dataset.out_dir.join("sequence_train_set.json");
    let mut items = corpus::load_items(&train_path)?;
    items.truncate(config.experiment.train_size as usize);

    let rows = rows_for(kind, Some(&condition), &items)?;
    let out_dir = match out_override {
        Some(dir) => dir.to_path_buf(),
        None => PathBuf::from("./fine_tune_sets"),
    };
    let out_path = out_dir.join(training_file_name(
        kind,
        &condition,
        config.experiment.train_size,
    ));
    let written = write_training_rows(&out_path, &rows)?;
    tracing::info!(
        target: "runner",
        written,
        out = %out_path.display(),
        "finetune_set_written"
    );
    println!("wrote {written} training rows to {}", out_path.display());
    Ok(())
}

fn load_corpus(config: &Config) -> Result<Vec<Item>> {
    let mut items = corpus::load_items(&config.corpus.path)?;
    if let Some(limit) = config.corpus.limit {
        items.truncate(limit);
    }
    tracing::info!(
        target: "runner",
        items = items.len(),
        path = %config.corpus.path.display(),
        "corpus_loaded"
    );
    Ok(items)
}

fn resolve_trace_path(config: &Config, trace_override: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = trace_override {
        return Ok(path.to_path_buf());
    }
    let condition =
        stages::condition_label(config.experiment.kind, config.experiment.condition.as_deref())?;
    Ok(config.trace.dir.join(trace_file_name(
        config.experiment.kind.as_str(),
        Some(&condition),
        config.experiment.train_size,
    )))
}

fn verified_path(trace_path: &Path) -> PathBuf {
    let stem = trace_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("trace");
    trace_path.with_file_name(format!("{stem}_verified.jsonl"))
}
