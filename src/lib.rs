use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use futures::StreamExt;
use github_client::{GithubClient, GithubClientBuilder};
use log::{debug, error, info, warn};
use repostats::api::{EventKind, PartialResult, RepoStats};
use repostats::collector::StatsCollector;
use repostats::consecutive::{max_consecutive_periods, peak_days};
use repostats::window::Lookback;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc::unbounded_channel;

pub mod args;
pub mod report;

pub use args::{Args, Mode};

pub const ANALYSIS_FILE: &str = "repos-analysis.csv";
pub const DEPENDENCIES_FILE: &str = "dependencies-usage.csv";
pub const PERIODS_FILE: &str = "max-periods.csv";
pub const PEAKS_FILE: &str = "peak-days.csv";

/// Progress is logged every this many pages in full-history mode.
const PROGRESS_EVERY: usize = 10;

pub fn build_client(args: &Args) -> anyhow::Result<GithubClient> {
    let mut client = GithubClientBuilder::default()
        .with_github_url(&args.api_url)
        .with_graphql_url(&args.graphql_url)
        .with_raw_url(&args.raw_url)
        .with_rest_stars(args.rest_stars)
        .with_timeout(Duration::from_secs(args.timeout_secs));
    if let Some(token) = &args.api_token {
        client = client.try_with_token(SecretString::new(token.expose_secret().clone()))?;
    }
    Ok(client.build()?)
}

/// Positional repositories followed by those from `--repos-file`.
pub fn repo_list(args: &Args) -> anyhow::Result<Vec<String>> {
    let mut repos = args.repos.clone();
    if let Some(file) = &args.repos_file {
        let content = fs::read_to_string(file)
            .with_context(|| format!("Cannot read repositories from {}", file.display()))?;
        repos.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }
    if repos.is_empty() {
        bail!("No repositories given, pass owner/name arguments or --repos-file");
    }
    Ok(repos)
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    let repos = repo_list(&args)?;
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Cannot create output directory {}", args.output_dir.display()))?;

    let collector = StatsCollector::new(build_client(&args)?).with_lookback(Lookback::days(args.window_days));
    check_rate_limit(&collector).await?;

    match args.mode {
        Mode::Summary => summary(&collector, &args, repos).await?,
        Mode::FullHistory => full_history(&collector, &args, repos).await?,
        Mode::Hourly => hourly(&collector, &args, repos).await?,
    }

    if let Some(limits) = collector.client().last_seen_limits().await {
        info!(
            "Rate limit: {} of {} remaining, resets at {}",
            limits.remaining, limits.limit, limits.reset
        );
    }
    Ok(())
}

async fn check_rate_limit(collector: &StatsCollector<GithubClient>) -> anyhow::Result<()> {
    match collector.rate_limit().await {
        Ok(limit) if limit.remaining == 0 => bail!("Rate limit exhausted until {}", limit.reset_at),
        Ok(limit) => {
            info!(
                "Rate limit: {} of {} remaining, resets at {}",
                limit.remaining, limit.limit, limit.reset_at
            );
            Ok(())
        }
        Err(err) => {
            warn!("Rate limit check failed: {}", err);
            Ok(())
        }
    }
}

async fn summary(collector: &StatsCollector<GithubClient>, args: &Args, repos: Vec<String>) -> anyhow::Result<()> {
    let rows: Vec<(String, PartialResult<RepoStats>)> = collector
        .collect_all(repos, args.concurrency)
        .inspect(|(path, result)| match result {
            Ok(stats) => debug!("{}", stats),
            Err(partial) => error!("{}: {}", path, partial),
        })
        .collect()
        .await;

    let mut history = BTreeMap::new();
    let mut usage: BTreeMap<String, usize> = BTreeMap::new();
    for (path, result) in &rows {
        let stats = match result {
            Ok(stats) => Some(stats),
            Err(partial) => partial.value.as_ref(),
        };
        if let Some(stats) = stats {
            history.insert(path.clone(), stats.stars.timeline.clone());
            for dependency in &stats.deps.direct_dependencies {
                *usage.entry(dependency.clone()).or_default() += 1;
            }
        }
    }

    let out = args.output_dir.as_path();
    write(out, ANALYSIS_FILE, |path| report::write_analysis(path, &rows))?;
    write(out, &format!("stars-history-{}d.json", args.window_days), |path| {
        report::write_json(path, &history)
    })?;
    write(out, DEPENDENCIES_FILE, |path| report::write_dependency_usage(path, &usage))?;
    info!("Collected {} repositories into {}", rows.len(), out.display());
    Ok(())
}

async fn full_history(collector: &StatsCollector<GithubClient>, args: &Args, repos: Vec<String>) -> anyhow::Result<()> {
    let out = args.output_dir.as_path();
    let mut periods = Vec::new();
    let mut peaks = Vec::new();
    for path in repos {
        let (sender, mut receiver) = unbounded_channel();
        let label = path.clone();
        let printer = tokio::spawn(async move {
            while let Some(pages) = receiver.recv().await {
                if pages % PROGRESS_EVERY == 0 {
                    info!("{}: {} pages fetched", label, pages);
                }
            }
        });

        let history = collector.full_history(&path, args.kind, Some(sender)).await;
        if let Err(err) = printer.await {
            warn!("Progress printer for {} failed: {}", path, err);
        }

        match history {
            Ok(timeline) => {
                let file = format!("{}-{}-history.csv", report::file_stem(&path), args.kind);
                write(out, &file, |file| report::write_timeline(file, &timeline))?;
                info!("{}: {} {} since creation", path, timeline.total_count(), args.kind);
                periods.push((path.clone(), max_consecutive_periods(&timeline.buckets, args.period_days)));
                peaks.push((path, peak_days(&timeline.buckets)));
            }
            Err(err) => error!("Full {} history of {} failed: {}", args.kind, path, err),
        }
    }
    write(out, PERIODS_FILE, |file| report::write_periods(file, &periods))?;
    write(out, PEAKS_FILE, |file| report::write_peaks(file, &peaks))?;
    Ok(())
}

async fn hourly(collector: &StatsCollector<GithubClient>, args: &Args, repos: Vec<String>) -> anyhow::Result<()> {
    let lookback = Lookback::hours(args.hours);
    let mut history = BTreeMap::new();
    for path in repos {
        match collector.recent(&path, EventKind::Stars, lookback).await {
            Ok(stars) => {
                history.insert(path, stars.timeline);
            }
            Err(partial) => {
                error!("Hourly stars of {} failed: {}", path, partial.error);
                if let Some(stars) = partial.value {
                    history.insert(path, stars.timeline);
                }
            }
        }
    }
    write(args.output_dir.as_path(), &format!("stars-history-{}h.json", args.hours), |file| {
        report::write_json(file, &history)
    })
}

fn write<F>(dir: &Path, name: &str, writer: F) -> anyhow::Result<()>
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    let path = dir.join(name);
    writer(&path).with_context(|| format!("Cannot write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}
