use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::Parser;
use tokio_util::sync::CancellationToken;

mod ai;
mod app;
mod cli;
mod config;
mod crawl;
mod db;
mod discovery;
mod error;
mod models;
mod services;
mod utils;

use app::App;
use cli::{Cli, Command};
use config::Config;
use discovery::{DiscoveryRun, DiscoveryStats, RunMode};
use error::Result;
use models::{
    DiscoveryFilter, DiscoveryStatus, DiscoveryUpdate, NewNewsSource, NewsSource, SourceUpdate,
    TechnologyDiscovery,
};

const WRAP_WIDTH: usize = 88;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so command output on stdout stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = e.kind();
            eprintln!("Error ({}): {}", kind.as_str(), e);
            ExitCode::from(kind.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let app = App::new(config).await?;

    match cli.command {
        Command::Run { all } => {
            let cancel = cancel_on_ctrl_c();
            let mode = if all { RunMode::All } else { RunMode::Due };
            let run = app.run(mode, &cancel).await?;
            print_run(&run);
        }
        Command::RunSource { id } => {
            let cancel = cancel_on_ctrl_c();
            let (source, found) = app.run_source(id, &cancel).await?;
            println!("{}: {} new discoveries", source.name, found.len());
            print_discoveries(&found);
        }
        Command::AddSource {
            name,
            url,
            cadence_days,
            description,
            inactive,
        } => {
            let source = app
                .add_source(NewNewsSource {
                    name,
                    url,
                    description,
                    cadence_days,
                    is_active: !inactive,
                })
                .await?;
            println!("Added source #{} {}", source.id, source.name);
        }
        Command::UpdateSource { id, json } => {
            let source = app.update_source(id, SourceUpdate::from_json(&json)?).await?;
            print_sources(&[source], Utc::now());
        }
        Command::DeleteSource { id } => {
            app.delete_source(id).await?;
            println!("Deleted source #{id}");
        }
        Command::Sources => print_sources(&app.sources().await?, Utc::now()),
        Command::Due => print_sources(&app.due_sources().await?, Utc::now()),
        Command::List {
            source,
            status,
            category,
            min_confidence,
        } => {
            let filter = DiscoveryFilter {
                news_source_id: source,
                status: status.as_deref().map(str::parse::<DiscoveryStatus>).transpose()?,
                category,
                min_confidence,
                since: None,
            };
            print_discoveries(&app.discoveries(&filter).await?);
        }
        Command::Since { source_id, days } => {
            print_discoveries(&app.discoveries_since(source_id, days).await?);
        }
        Command::Show { id } => print_discovery_detail(&app.discovery(id).await?),
        Command::SetStatus { id, status } => {
            let updated = app.set_status(id, status.parse()?).await?;
            println!("#{} {} -> {}", updated.id, updated.name, updated.status);
        }
        Command::Update { id, json } => {
            let updated = app
                .update_discovery(id, DiscoveryUpdate::from_json(&json)?)
                .await?;
            print_discovery_detail(&updated);
        }
        Command::Delete { id } => {
            app.delete_discovery(id).await?;
            println!("Deleted discovery #{id}");
        }
        Command::Stats => print_stats(&app.stats().await?),
    }

    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            trigger.cancel();
        }
    });
    token
}

fn print_run(run: &DiscoveryRun) {
    if run.results.is_empty() && run.skipped_sources.is_empty() {
        println!("No sources due.");
        return;
    }
    for (source, found) in &run.results {
        let marker = if run.failed_sources.contains(source) { " (failed)" } else { "" };
        println!("== {source}{marker}: {} new", found.len());
        print_discoveries(found);
    }
    if run.cancelled {
        println!(
            "Run cancelled; skipped: {}",
            run.skipped_sources.join(", ")
        );
    }
    println!("Total new discoveries: {}", run.total_discoveries());
}

fn print_sources(sources: &[NewsSource], now: DateTime<Utc>) {
    if sources.is_empty() {
        println!("No sources.");
        return;
    }
    for s in sources {
        let checked = s
            .last_checked
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        let state = match (s.is_active, s.is_due(now)) {
            (false, _) => "paused",
            (true, true) => "due",
            (true, false) => "ok",
        };
        println!(
            "#{:<4} {:<24} every {:>3}d  last {:<16}  [{}]  {}",
            s.id, s.name, s.cadence_days, checked, state, s.url
        );
    }
}

fn print_discoveries(discoveries: &[TechnologyDiscovery]) {
    for d in discoveries {
        println!(
            "#{:<5} {:<28} {:<20} {:.2} ({})  {}",
            d.id,
            d.name,
            d.category.as_deref().unwrap_or("-"),
            d.confidence_score,
            d.confidence_level().as_str(),
            d.status
        );
    }
}

fn print_discovery_detail(d: &TechnologyDiscovery) {
    println!("#{} {} [{}]", d.id, d.name, d.status);
    println!(
        "Category: {}   Confidence: {:.2} ({})",
        d.category.as_deref().unwrap_or("-"),
        d.confidence_score,
        d.confidence_level().as_str()
    );
    if let Some(title) = &d.article_title {
        println!("Article: {title}");
    }
    if let Some(url) = &d.article_url {
        println!("URL: {url}");
    }
    println!("Discovered: {}", d.discovered_at.format("%Y-%m-%d %H:%M UTC"));
    println!();
    for line in textwrap::wrap(&d.description, WRAP_WIDTH) {
        println!("{line}");
    }
}

fn print_stats(stats: &DiscoveryStats) {
    println!("Total discoveries: {}", stats.total);
    println!("By status:");
    for (status, count) in &stats.by_status {
        println!("  {:<12} {count}", status.as_str());
    }
    println!("By confidence:");
    for (level, count) in &stats.by_confidence {
        println!("  {:<12} {count}", level.as_str());
    }
    println!("By category:");
    for (category, count) in &stats.by_category {
        println!("  {:<24} {count}", category);
    }
}
