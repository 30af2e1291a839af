// Page analysis: root fetch, discovery, then bounded size fetches

use crate::model::{AnalysisEvent, AnalysisResult, EventSender};
use futures::StreamExt;
use pageweight_scanner::discover::collect_resource_urls;
use pageweight_scanner::urls::normalize;
use pageweight_scanner::{
    BatchScheduler, Document, FetchClient, ResourceRecord, Result, ScanError, Shutdown,
};
use tracing::{debug, info, warn};
use url::Url;

/// Options for one analysis run
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Maximum number of resource fetches in flight
    pub concurrency: usize,
    /// Stops queued and in-flight fetches when triggered
    pub shutdown: Option<Shutdown>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            shutdown: None,
        }
    }
}

impl AnalyzeOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }
}

fn emit(events: Option<&EventSender>, event: AnalysisEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is watching progress
        let _ = tx.send(event);
    }
}

fn progress(events: Option<&EventSender>, message: String, current: usize, total: usize) {
    emit(
        events,
        AnalysisEvent::Progress {
            message,
            current,
            total,
        },
    );
}

async fn fetch_root(
    client: &FetchClient,
    root_url: &str,
    shutdown: Option<&Shutdown>,
) -> Result<Document> {
    let Some(shutdown) = shutdown else {
        return client.fetch_document(root_url).await;
    };

    tokio::select! {
        document = client.fetch_document(root_url) => document,
        _ = shutdown.triggered() => {
            warn!("Analysis of {} interrupted before the page was fetched", root_url);
            Err(ScanError::Interrupted(root_url.to_string()))
        }
    }
}

/// Normalize `input` and analyze the page it names.
///
/// Fails with `InvalidUrl` before any request is made when the input
/// cannot be parsed.
pub async fn execute_analysis(
    client: &FetchClient,
    input: &str,
    options: &AnalyzeOptions,
    events: Option<&EventSender>,
) -> Result<AnalysisResult> {
    let base = normalize(input)?;
    analyze_url(client, &base, options, events).await
}

/// Analyze an already normalized page URL.
///
/// The root document is fetched first and reported as the first resource.
/// Discovered resources are then sized with at most
/// `options.concurrency` fetches outstanding, each reported as it settles.
/// Only a root fetch failure is fatal. A shutdown during the root fetch
/// fails with `Interrupted` since there is nothing to report yet.
pub async fn analyze_url(
    client: &FetchClient,
    base: &Url,
    options: &AnalyzeOptions,
    events: Option<&EventSender>,
) -> Result<AnalysisResult> {
    let root_url = base.as_str();
    info!("Analyzing {}", root_url);

    progress(events, "Fetching main HTML page...".to_string(), 0, 1);
    let document = fetch_root(client, root_url, options.shutdown.as_ref()).await?;

    let root = ResourceRecord::root(root_url.to_string(), document.size_bytes);
    let mut result = AnalysisResult::new(root.clone());
    emit(
        events,
        AnalysisEvent::ResourceRecorded {
            resource: root,
            successful: 1,
            total_expected: 1,
            running_total: result.total_size,
        },
    );

    progress(
        events,
        "Parsing HTML and collecting resources...".to_string(),
        1,
        1,
    );
    let urls: Vec<String> = collect_resource_urls(&document.content, base)
        .into_iter()
        .filter(|url| url != root_url)
        .collect();

    let found = urls.len();
    let total_expected = found + 1;
    info!("Found {} resources on {}", found, root_url);
    progress(
        events,
        format!("Found {} resources. Starting parallel download...", found),
        1,
        total_expected,
    );

    let mut scheduler = BatchScheduler::new(options.concurrency);
    if let Some(shutdown) = options.shutdown.clone() {
        scheduler = scheduler.with_shutdown(shutdown);
    }

    let mut outcomes = Box::pin(scheduler.run(client, urls));
    let mut processed = 0;
    let mut successful = 1;

    while let Some(outcome) = outcomes.next().await {
        processed += 1;
        progress(
            events,
            format!("Fetching resources... ({}/{} checked)", processed, found),
            processed + 1,
            total_expected,
        );

        match outcome.into_record() {
            Some(record) => {
                successful += 1;
                result.push(record.clone());
                emit(
                    events,
                    AnalysisEvent::ResourceRecorded {
                        resource: record,
                        successful,
                        total_expected,
                        running_total: result.total_size,
                    },
                );
            }
            None => debug!("Skipped a resource with no measurable size"),
        }
    }

    if processed < found {
        warn!(
            "Analysis of {} interrupted after {}/{} resources",
            root_url, processed, found
        );
        result.interrupted = true;
    }

    info!(
        "Finished {}: {} files, {} bytes",
        root_url, result.total_files, result.total_size
    );
    Ok(result)
}
