use anyhow::{Context, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pageweight_core::format::format_bytes;
use pageweight_core::load_time::NETWORK_PROFILES;
use pageweight_core::report::save_report;
use pageweight_core::{
    AnalysisEvent, AnalyzeOptions, ReportFormat, build_report, execute_analysis, render,
};
use pageweight_scanner::relay::{self, RelayProfile};
use pageweight_scanner::urls::normalize;
use pageweight_scanner::{FetchClient, FetchConfig, Shutdown};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{info, warn};

// Helper functions for analyze handler

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&String>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        parse_url_line(url)
            .map(|url| vec![url])
            .ok_or_else(|| format!("Invalid URL '{}'", url))
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file, skipping blank lines and `#` comments
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a page URL, assuming https when no scheme is given
pub fn parse_url_line(line: &str) -> Option<String> {
    match normalize(line) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            Some(url.to_string())
        }
        _ => {
            eprintln!("{} Skipping invalid URL '{}'", "⚠".yellow(), line);
            None
        }
    }
}

/// Fetch settings given explicitly on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOverrides {
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
    pub delay_ms: Option<u64>,
    pub allow_manual_relays: bool,
    pub no_direct_probe: bool,
}

impl FetchOverrides {
    pub fn from_matches(args: &ArgMatches) -> Self {
        Self {
            timeout_secs: args.get_one::<u64>("timeout").copied(),
            retries: args.get_one::<u32>("retries").copied(),
            delay_ms: args.get_one::<u64>("delay").copied(),
            allow_manual_relays: args.get_flag("allow-manual-relays"),
            no_direct_probe: args.get_flag("no-direct-probe"),
        }
    }

    pub fn apply(&self, mut config: FetchConfig) -> FetchConfig {
        if let Some(secs) = self.timeout_secs {
            config.document_timeout = Duration::from_secs(secs);
            config.relay_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        if let Some(ms) = self.delay_ms {
            config.min_request_delay = Duration::from_millis(ms);
        }
        if self.allow_manual_relays {
            config.allow_manual_relays = true;
        }
        if self.no_direct_probe {
            config.direct_probe = false;
        }
        config
    }
}

/// Read a JSON fetch config; `~` in the path is expanded.
pub fn load_fetch_config(path: &str) -> anyhow::Result<FetchConfig> {
    let expanded = shellexpand::tilde(path);
    let path = Path::new(expanded.as_ref());
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

/// Defaults, then the config file, then explicit flags.
pub fn resolve_fetch_config(
    config_path: Option<&str>,
    overrides: &FetchOverrides,
) -> anyhow::Result<FetchConfig> {
    let base = match config_path {
        Some(path) => load_fetch_config(path)?,
        None => FetchConfig::default(),
    };
    Ok(overrides.apply(base))
}

/// The named relays in the given order, or the whole catalog when none are named.
pub fn select_relays(names: &[String]) -> anyhow::Result<Vec<RelayProfile>> {
    if names.is_empty() {
        return Ok(relay::catalog());
    }
    Ok(relay::select(names)?)
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(1);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {prefix:>10} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn track_progress(mut rx: UnboundedReceiver<AnalysisEvent>, bar: Option<ProgressBar>) {
    while let Some(event) = rx.recv().await {
        let Some(bar) = bar.as_ref() else {
            continue;
        };
        match event {
            AnalysisEvent::Progress {
                message,
                current,
                total,
            } => {
                bar.set_length(total as u64);
                bar.set_position(current as u64);
                bar.set_message(message);
            }
            AnalysisEvent::ResourceRecorded {
                running_total, ..
            } => {
                bar.set_prefix(format_bytes(running_total));
            }
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
}

pub async fn handle_analyze(
    sub_matches: &ArgMatches,
    shutdown: Shutdown,
    quiet: bool,
) -> anyhow::Result<()> {
    let urls = load_urls_from_source(
        sub_matches.get_one::<String>("url"),
        sub_matches.get_one::<PathBuf>("hosts-file"),
    )
    .map_err(anyhow::Error::msg)?;

    let config = resolve_fetch_config(
        sub_matches.get_one::<String>("config").map(String::as_str),
        &FetchOverrides::from_matches(sub_matches),
    )?;
    let relay_names: Vec<String> = sub_matches
        .get_many::<String>("relay")
        .map(|names| names.cloned().collect())
        .unwrap_or_default();
    let relays = select_relays(&relay_names)?;

    let format = sub_matches
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);
    let output = sub_matches.get_one::<PathBuf>("output");
    let show_progress = !quiet && !sub_matches.get_flag("no-progress");
    let options = AnalyzeOptions::default()
        .with_concurrency(*sub_matches.get_one::<usize>("concurrency").unwrap_or(&3))
        .with_shutdown(shutdown.clone());

    if !quiet {
        println!(
            "\n{} Analyzing {} page(s) with concurrency {}",
            "→".blue(),
            urls.len(),
            options.concurrency
        );
        println!(
            "{} Relays: {}\n",
            "→".blue(),
            relays
                .iter()
                .map(|r| r.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let client = FetchClient::new(config, relays)?;
    let mut reports = Vec::new();
    let mut failures = 0;

    for url in &urls {
        if shutdown.is_triggered() {
            warn!("Shutdown requested, skipping remaining pages");
            break;
        }

        // cache keys are plain URLs, so every page starts cold
        client.clear_cache().await;

        let (tx, rx) = mpsc::unbounded_channel();
        let bar = show_progress.then(progress_bar);
        let analysis = async {
            let tx = tx;
            execute_analysis(&client, url, &options, Some(&tx)).await
        };
        let (result, ()) = tokio::join!(analysis, track_progress(rx, bar));

        match result {
            Ok(analysis) => {
                info!(
                    "{}: {} files, {}",
                    analysis.url,
                    analysis.total_files,
                    format_bytes(analysis.total_size)
                );
                if analysis.interrupted && !quiet {
                    eprintln!(
                        "{} Analysis of {} interrupted, reporting partial results",
                        "⚠".yellow(),
                        analysis.url
                    );
                }
                let report = build_report(analysis);
                reports.push(render(&report, format)?);
            }
            Err(e) => {
                failures += 1;
                eprintln!("{} {}: {}", "✗".red().bold(), url, e);
            }
        }
    }

    if reports.is_empty() {
        bail!("No page could be analyzed ({} failed)", failures);
    }

    let content = reports.join("\n");
    match output {
        Some(path) => {
            save_report(&content, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !quiet {
                println!(
                    "{} Report saved to {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
        }
        None => print!("{}", content),
    }

    Ok(())
}

pub fn handle_relays() {
    let sample = "https://example.com/";
    println!("{}", "Relays (failover order):".bright_white().bold());
    for relay in relay::catalog() {
        let note = if relay.needs_authorization {
            " (needs manual authorization)".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} {}{}",
            format!("{:<16}", relay.name).cyan(),
            relay.request_url(sample),
            note
        );
    }
}

/// One row per network profile, keyed the way reports refer to them.
pub fn profile_rows() -> Vec<String> {
    let mut rows = vec![format!(
        "{:<6} {:<12} {:>10} {:>10} {:>12}",
        "Key", "Name", "Mbps", "Latency", "Connections"
    )];
    rows.extend(NETWORK_PROFILES.iter().map(|profile| {
        format!(
            "{:<6} {:<12} {:>10} {:>8}ms {:>12}",
            profile.key,
            profile.name,
            profile.download_mbps,
            profile.latency_ms,
            profile.max_connections
        )
    }));
    rows
}

pub fn handle_profiles() {
    println!("{}", "Network profiles:".bright_white().bold());
    for (idx, row) in profile_rows().into_iter().enumerate() {
        if idx == 0 {
            println!("  {}", row.dimmed());
        } else {
            println!("  {}", row);
        }
    }
}
