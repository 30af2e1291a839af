// Bounded-concurrency batch scheduler for size fetches

use crate::client::FetchClient;
use crate::result::{ResourceRecord, ResourceType};
use crate::shutdown::Shutdown;
use crate::urls::{file_name, resource_type};
use futures::{Stream, StreamExt, future, stream};
use std::future::Future;
use tracing::debug;

/// Anything that can report the byte size of a URL (0 meaning failure).
pub trait SizeSource {
    fn size_of(&self, url: &str) -> impl Future<Output = u64> + Send;
}

impl SizeSource for FetchClient {
    fn size_of(&self, url: &str) -> impl Future<Output = u64> + Send {
        self.fetch_size(url)
    }
}

/// Terminal state of one scheduled URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Recorded,
    Skipped,
}

/// A settled fetch as reported by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub url: String,
    pub name: String,
    pub resource_type: ResourceType,
    pub size: u64,
}

impl FetchOutcome {
    pub fn new(url: String, size: u64) -> Self {
        Self {
            name: file_name(&url),
            resource_type: resource_type(&url),
            url,
            size,
        }
    }

    pub fn state(&self) -> FetchState {
        if self.size > 0 {
            FetchState::Recorded
        } else {
            FetchState::Skipped
        }
    }

    /// Zero-size outcomes never become records.
    pub fn into_record(self) -> Option<ResourceRecord> {
        (self.size > 0).then(|| ResourceRecord {
            url: self.url,
            name: self.name,
            resource_type: self.resource_type,
            size: self.size,
        })
    }
}

/// Drives a size source over a URL list with at most `concurrency` fetches in flight.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    concurrency: usize,
    shutdown: Option<Shutdown>,
}

impl BatchScheduler {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Stream outcomes in completion order.
    ///
    /// Once the shutdown signal fires, queued URLs are not started and
    /// in-flight fetches are dropped, so the stream ends early.
    pub fn run<'a, S>(
        &self,
        source: &'a S,
        urls: Vec<String>,
    ) -> impl Stream<Item = FetchOutcome> + Send + use<'a, S>
    where
        S: SizeSource + Sync,
    {
        debug!(
            "Scheduling {} URLs with concurrency {}",
            urls.len(),
            self.concurrency
        );
        let shutdown = self.shutdown.clone();

        stream::iter(urls)
            .map(move |url| {
                let shutdown = shutdown.clone();
                async move {
                    match shutdown {
                        Some(shutdown) => {
                            if shutdown.is_triggered() {
                                return None;
                            }
                            tokio::select! {
                                size = source.size_of(&url) => Some(FetchOutcome::new(url, size)),
                                _ = shutdown.triggered() => None,
                            }
                        }
                        None => {
                            let size = source.size_of(&url).await;
                            Some(FetchOutcome::new(url, size))
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .filter_map(future::ready)
    }
}
