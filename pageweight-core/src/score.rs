// Composite performance score (0-100)

use crate::model::AnalysisResult;
use pageweight_scanner::{ResourceRecord, ResourceType};
use serde::Serialize;
use std::collections::BTreeMap;

const KB: f64 = 1024.0;
const MB: f64 = 1024.0 * 1024.0;
const LARGE_FILE_BYTES: u64 = 500 * 1024;

const PAGE_SIZE_WEIGHT: f64 = 0.30;
const REQUEST_COUNT_WEIGHT: f64 = 0.25;
const DISTRIBUTION_WEIGHT: f64 = 0.25;
const COMPRESSION_WEIGHT: f64 = 0.20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceScore {
    pub total_score: u8,
    pub breakdown: ScoreBreakdown,
    pub metrics: ScoreMetrics,
}

/// Rounded sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub page_size: u8,
    pub request_count: u8,
    pub resource_distribution: u8,
    pub compression: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeTotals {
    pub count: usize,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreMetrics {
    pub total_size_mb: f64,
    pub request_count: usize,
    pub type_distribution: BTreeMap<ResourceType, TypeTotals>,
    pub large_file_count: usize,
}

/// Score an analysis result.
pub fn calculate(result: &AnalysisResult) -> PerformanceScore {
    score_resources(&result.resources, result.total_size, result.total_files)
}

/// Score a resource list with explicit totals.
pub fn score_resources(
    resources: &[ResourceRecord],
    total_size: u64,
    total_files: usize,
) -> PerformanceScore {
    let total_size_mb = total_size as f64 / MB;
    let distribution = type_distribution(resources);
    let resource_bytes: u64 = resources.iter().map(|r| r.size).sum();
    let large_file_count = resources
        .iter()
        .filter(|r| r.size > LARGE_FILE_BYTES)
        .count();

    let page_size = page_size_score(total_size_mb).clamp(0.0, 100.0);
    let request_count = request_count_score(total_files).clamp(0.0, 100.0);
    let resource_distribution =
        distribution_score(&distribution, resource_bytes, large_file_count).clamp(0.0, 100.0);
    let compression =
        compression_score(&distribution, resource_bytes, total_files).clamp(0.0, 100.0);

    let weighted = page_size * PAGE_SIZE_WEIGHT
        + request_count * REQUEST_COUNT_WEIGHT
        + resource_distribution * DISTRIBUTION_WEIGHT
        + compression * COMPRESSION_WEIGHT;

    PerformanceScore {
        total_score: weighted.round().clamp(0.0, 100.0) as u8,
        breakdown: ScoreBreakdown {
            page_size: page_size.round() as u8,
            request_count: request_count.round() as u8,
            resource_distribution: resource_distribution.round() as u8,
            compression: compression.round() as u8,
        },
        metrics: ScoreMetrics {
            total_size_mb: (total_size_mb * 100.0).round() / 100.0,
            request_count: total_files,
            type_distribution: distribution,
            large_file_count,
        },
    }
}

pub fn type_distribution(resources: &[ResourceRecord]) -> BTreeMap<ResourceType, TypeTotals> {
    let mut totals: BTreeMap<ResourceType, TypeTotals> = BTreeMap::new();
    for resource in resources {
        let entry = totals.entry(resource.resource_type).or_default();
        entry.count += 1;
        entry.size += resource.size;
    }
    totals
}

/// Piecewise linear in total MB: 100 below 0.5, then 90-75, 75-50, 50-20, 20-0.
pub fn page_size_score(total_mb: f64) -> f64 {
    if total_mb < 0.5 {
        100.0
    } else if total_mb < 1.0 {
        90.0 - ((total_mb - 0.5) / 0.5) * 15.0
    } else if total_mb < 2.0 {
        75.0 - (total_mb - 1.0) * 25.0
    } else if total_mb < 5.0 {
        50.0 - ((total_mb - 2.0) / 3.0) * 30.0
    } else {
        (20.0 - ((total_mb - 5.0) / 5.0) * 20.0).max(0.0)
    }
}

/// Piecewise linear in request count: 100 below 25, then 90-75, 75-40, 40-20, 20-0.
pub fn request_count_score(count: usize) -> f64 {
    let count = count as f64;
    if count < 25.0 {
        100.0
    } else if count < 50.0 {
        90.0 - ((count - 25.0) / 25.0) * 15.0
    } else if count < 100.0 {
        75.0 - ((count - 50.0) / 50.0) * 35.0
    } else if count < 150.0 {
        40.0 - ((count - 100.0) / 50.0) * 20.0
    } else {
        (20.0 - ((count - 150.0) / 50.0) * 20.0).max(0.0)
    }
}

fn share(totals: &BTreeMap<ResourceType, TypeTotals>, kind: ResourceType, total: u64) -> f64 {
    match totals.get(&kind) {
        Some(t) if total > 0 => t.size as f64 / total as f64,
        _ => 0.0,
    }
}

fn distribution_score(
    totals: &BTreeMap<ResourceType, TypeTotals>,
    resource_bytes: u64,
    large_files: usize,
) -> f64 {
    let mut score = 100.0;

    let images = share(totals, ResourceType::Image, resource_bytes);
    if images > 0.7 {
        score -= 30.0;
    } else if images > 0.5 {
        score -= 15.0;
    }

    let scripts = share(totals, ResourceType::Js, resource_bytes);
    if scripts > 0.5 {
        score -= 25.0;
    } else if scripts > 0.3 {
        score -= 10.0;
    }

    if share(totals, ResourceType::Css, resource_bytes) > 0.3 {
        score -= 15.0;
    }

    if large_files > 0 {
        score -= (large_files as f64 * 5.0).min(20.0);
    }

    f64::max(score, 0.0)
}

fn compression_score(
    totals: &BTreeMap<ResourceType, TypeTotals>,
    resource_bytes: u64,
    total_files: usize,
) -> f64 {
    let mut score = 100.0;

    if total_files > 0 {
        let mean = resource_bytes as f64 / total_files as f64;
        if mean > 200.0 * KB {
            score -= 30.0;
        } else if mean > 100.0 * KB {
            score -= 15.0;
        }
    }

    if let Some(images) = totals.get(&ResourceType::Image)
        && images.count > 0
    {
        let mean = images.size as f64 / images.count as f64;
        if mean > 500.0 * KB {
            score -= 25.0;
        } else if mean > 200.0 * KB {
            score -= 10.0;
        }
    }

    f64::max(score, 0.0)
}
