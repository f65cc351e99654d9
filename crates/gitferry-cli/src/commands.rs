//! CLI command implementations.

use std::path::Path;

use anyhow::{bail, Context};
use console::style;
use tracing::info;

use gitferry_client::GitLabClient;
use gitferry_engine::{
    MigrationEngine, MigrationProgress, MigrationSummary, ProgressCallback, ProgressUpdate,
};
use gitferry_types::{EntityKind, MigrationStatus};

use crate::config;

/// Run the migration (or a preview of it).
pub async fn migrate(config_path: &Path, dry_run: bool) -> anyhow::Result<()> {
    let mut cfg = config::load(config_path)?;
    if dry_run {
        cfg.migration.dry_run = true;
    }
    if cfg.migration.dry_run {
        println!("{}", style("Dry run: no changes will be written").yellow());
    }

    let reporter = ConsoleReporter::new();
    let engine = MigrationEngine::new(cfg)?
        .with_progress(MigrationProgress::with_callback(reporter.callback()));

    // Ctrl-C stops at the next phase boundary; in-flight entities finish.
    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("stop requested; finishing current phase");
            cancel.cancel();
        }
    });

    let summary = engine.run().await?;
    reporter.finish();
    print_summary(&summary);

    if summary.total_failed() > 0 {
        bail!("migration finished with {} failed entities", summary.total_failed());
    }
    Ok(())
}

/// Check configuration and connectivity to both instances.
pub async fn validate(config_path: &Path) -> anyhow::Result<()> {
    let cfg = config::load(config_path)?;

    let source = GitLabClient::new(&cfg.source, false)?;
    let destination = GitLabClient::new(&cfg.destination, false)?;

    source
        .ping()
        .await
        .context("source instance is unreachable or rejected the token")?;
    let source_version = source.version().await.unwrap_or_else(|| "unknown".into());
    println!("source      {} (GitLab {source_version})", style("ok").green());

    destination
        .ping()
        .await
        .context("destination instance is unreachable or rejected the token")?;
    let destination_version = destination.version().await.unwrap_or_else(|| "unknown".into());
    println!("destination {} (GitLab {destination_version})", style("ok").green());

    Ok(())
}

/// Write a configuration template.
pub fn init_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        bail!("{} already exists; not overwriting", path.display());
    }
    std::fs::write(path, config::TEMPLATE)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote configuration template to {}", path.display());
    Ok(())
}

/// Progress bar rendering for engine updates.
struct ConsoleReporter {
    bar: indicatif::ProgressBar,
}

impl ConsoleReporter {
    fn new() -> Self {
        let bar = indicatif::ProgressBar::new(0);
        bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .expect("static template")
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    fn callback(&self) -> ProgressCallback {
        let bar = self.bar.clone();
        Box::new(move |update: ProgressUpdate| {
            bar.set_length(update.total);
            bar.set_position(update.completed);

            let mut message = update
                .kind
                .map(|kind| format!("{kind}s"))
                .unwrap_or_default();
            if let Some(item) = &update.item {
                message = format!("{message}: {item}");
            }
            bar.set_message(message);
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn print_summary(summary: &MigrationSummary) {
    println!("\n{}", style("=== Migration Summary ===").bold());

    for kind in EntityKind::PHASE_ORDER {
        let tally = summary.tally(kind);
        if tally.total() == 0 {
            continue;
        }
        println!(
            "{kind:<12} {} succeeded, {} failed, {} skipped",
            style(tally.succeeded).green(),
            style(tally.failed).red(),
            style(tally.skipped).yellow(),
        );
    }

    // Skipped and failed entities call for different operator follow-up,
    // so list them separately.
    let skipped: Vec<_> = summary.skipped_results().collect();
    if !skipped.is_empty() {
        println!("\n{}", style("Skipped:").yellow());
        for result in skipped {
            let reason = result.warnings.last().map(String::as_str).unwrap_or("");
            println!("  {} {} - {reason}", result.kind, result.label);
        }
    }

    let failed: Vec<_> = summary
        .results
        .iter()
        .filter(|r| r.status == MigrationStatus::Failed)
        .collect();
    if !failed.is_empty() {
        println!("\n{}", style("Failed:").red());
        for result in failed {
            let error = result.error.as_deref().unwrap_or("unknown error");
            println!("  {} {} - {error}", result.kind, result.label);
        }
    }

    if let Some(duration) = summary.duration() {
        println!("\nCompleted in {}s", duration.num_seconds());
    }
}
