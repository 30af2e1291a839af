use pageweight_scanner::ResourceRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// Everything measured for one page.
///
/// `resources[0]` is always the root document. `total_size` and
/// `total_files` track the list as records are pushed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub url: String,
    pub resources: Vec<ResourceRecord>,
    pub total_size: u64,
    pub total_files: usize,
    pub main_html_size: u64,
    /// Set when the run was stopped before every resource was checked.
    pub interrupted: bool,
}

impl AnalysisResult {
    pub fn new(root: ResourceRecord) -> Self {
        Self {
            url: root.url.clone(),
            total_size: root.size,
            main_html_size: root.size,
            total_files: 1,
            resources: vec![root],
            interrupted: false,
        }
    }

    pub fn push(&mut self, record: ResourceRecord) {
        self.total_size += record.size;
        self.total_files += 1;
        self.resources.push(record);
    }

    pub fn root(&self) -> &ResourceRecord {
        &self.resources[0]
    }

    /// Resources other than the root document.
    pub fn subresources(&self) -> &[ResourceRecord] {
        &self.resources[1..]
    }
}

/// Incremental events emitted while a page is analyzed.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    Progress {
        message: String,
        current: usize,
        total: usize,
    },
    ResourceRecorded {
        resource: ResourceRecord,
        successful: usize,
        total_expected: usize,
        running_total: u64,
    },
}

pub type EventSender = UnboundedSender<AnalysisEvent>;
