// Duplicate resource detection
//
// Two resources are treated as the same asset when their cleaned file names
// and byte sizes match exactly. Content is never hashed.

use crate::format::format_bytes;
use crate::suggest::Priority;
use pageweight_scanner::{ResourceRecord, ResourceType};
use serde::Serialize;
use std::fmt;

const MB: u64 = 1024 * 1024;
const HIGH_WASTE_BYTES: u64 = MB;
const MEDIUM_WASTE_BYTES: u64 = MB / 10;
const BUILD_PROCESS_WASTE_BYTES: u64 = 100 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// `duplicate_count` is the number of redundant copies (instances - 1).
    pub fn classify(wasted_size: u64, duplicate_count: usize) -> Self {
        if wasted_size > HIGH_WASTE_BYTES || duplicate_count >= 5 {
            Severity::High
        } else if wasted_size > MEDIUM_WASTE_BYTES || duplicate_count >= 3 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub file_name: String,
    pub resource_type: ResourceType,
    pub size: u64,
    pub instances: usize,
    pub duplicate_count: usize,
    pub wasted_size: u64,
    pub urls: Vec<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateSuggestion {
    pub priority: Priority,
    pub category: String,
    pub title: String,
    pub description: String,
    pub action: String,
    pub impact: String,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateAnalysis {
    pub has_duplicates: bool,
    pub groups: Vec<DuplicateGroup>,
    pub total_duplicates: usize,
    pub wasted_bandwidth: u64,
    pub unique_resources: usize,
    pub total_resources: usize,
    pub duplicate_percentage: f64,
    pub wasted_percentage: f64,
    pub suggestions: Vec<DuplicateSuggestion>,
}

impl DuplicateAnalysis {
    pub fn summary_message(&self) -> String {
        if !self.has_duplicates {
            return "No duplicate resources detected. All resources are loaded only once."
                .to_string();
        }

        format!(
            "Found {} resource(s) loaded multiple times ({} duplicate instances, {}% of all resources). Wasting {} in duplicate downloads.",
            self.groups.len(),
            self.total_duplicates,
            self.duplicate_percentage,
            format_bytes(self.wasted_bandwidth)
        )
    }
}

/// File name with any query string or fragment removed.
pub fn clean_file_name(name: &str) -> &str {
    let name = name.split('?').next().unwrap_or(name);
    name.split('#').next().unwrap_or(name)
}

/// Find resources loaded more than once.
///
/// Groups are ordered by wasted bytes, largest first; ties keep the order
/// in which the file names were first seen.
pub fn analyze(resources: &[ResourceRecord]) -> DuplicateAnalysis {
    // file name -> (size -> members), both in first-seen order
    let mut by_name: Vec<(&str, Vec<(u64, Vec<&ResourceRecord>)>)> = Vec::new();

    for resource in resources {
        let name = clean_file_name(&resource.name);
        let idx = match by_name.iter().position(|(n, _)| *n == name) {
            Some(idx) => idx,
            None => {
                by_name.push((name, Vec::new()));
                by_name.len() - 1
            }
        };
        let sizes = &mut by_name[idx].1;
        match sizes.iter_mut().find(|(size, _)| *size == resource.size) {
            Some((_, members)) => members.push(resource),
            None => sizes.push((resource.size, vec![resource])),
        }
    }

    let mut groups: Vec<DuplicateGroup> = by_name
        .into_iter()
        .flat_map(|(name, sizes)| {
            sizes
                .into_iter()
                .filter(|(_, members)| members.len() > 1)
                .map(move |(size, members)| {
                    let duplicate_count = members.len() - 1;
                    let wasted_size = size * duplicate_count as u64;
                    DuplicateGroup {
                        file_name: name.to_string(),
                        resource_type: members[0].resource_type,
                        size,
                        instances: members.len(),
                        duplicate_count,
                        wasted_size,
                        urls: members.iter().map(|r| r.url.clone()).collect(),
                        severity: Severity::classify(wasted_size, duplicate_count),
                    }
                })
        })
        .collect();

    groups.sort_by(|a, b| b.wasted_size.cmp(&a.wasted_size));

    let total_duplicates: usize = groups.iter().map(|g| g.duplicate_count).sum();
    let wasted_bandwidth: u64 = groups.iter().map(|g| g.wasted_size).sum();
    let total_bytes: u64 = resources.iter().map(|r| r.size).sum();

    let suggestions = suggestions_for(&groups, wasted_bandwidth);

    DuplicateAnalysis {
        has_duplicates: !groups.is_empty(),
        total_duplicates,
        wasted_bandwidth,
        unique_resources: resources.len() - total_duplicates,
        total_resources: resources.len(),
        duplicate_percentage: percentage(total_duplicates as f64, resources.len() as f64),
        wasted_percentage: percentage(wasted_bandwidth as f64, total_bytes as f64),
        groups,
        suggestions,
    }
}

/// Percentage rounded to one decimal, 0 for an empty denominator.
fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        (part / whole * 1000.0).round() / 10.0
    } else {
        0.0
    }
}

fn names(groups: &[&DuplicateGroup]) -> Vec<String> {
    groups.iter().map(|g| g.file_name.clone()).collect()
}

fn wasted(groups: &[&DuplicateGroup]) -> u64 {
    groups.iter().map(|g| g.wasted_size).sum()
}

fn suggestions_for(groups: &[DuplicateGroup], total_wasted: u64) -> Vec<DuplicateSuggestion> {
    let mut suggestions = Vec::new();
    if groups.is_empty() {
        return suggestions;
    }

    let of_severity = |severity: Severity| -> Vec<&DuplicateGroup> {
        groups.iter().filter(|g| g.severity == severity).collect()
    };
    let of_type = |kind: ResourceType| -> Vec<&DuplicateGroup> {
        groups.iter().filter(|g| g.resource_type == kind).collect()
    };

    let high = of_severity(Severity::High);
    if !high.is_empty() {
        suggestions.push(DuplicateSuggestion {
            priority: Priority::High,
            category: "Resource Consolidation".to_string(),
            title: "Critical: Large Resources Loaded Multiple Times".to_string(),
            description: format!(
                "{} resource(s) with significant duplication detected. Wasting {} in duplicate downloads.",
                high.len(),
                format_bytes(wasted(&high))
            ),
            action: "Ensure each resource is only loaded once. Check for duplicate <script>, <link>, or <img> tags.".to_string(),
            impact: "High - Significantly reduces page load time and bandwidth usage".to_string(),
            resources: names(&high),
        });
    }

    let medium = of_severity(Severity::Medium);
    if !medium.is_empty() {
        suggestions.push(DuplicateSuggestion {
            priority: Priority::Medium,
            category: "Resource Optimization".to_string(),
            title: "Moderate Duplicate Resources Detected".to_string(),
            description: format!(
                "{} resource(s) loaded multiple times, wasting {}.",
                medium.len(),
                format_bytes(wasted(&medium))
            ),
            action: "Review your HTML for duplicate resource references. Consider using a bundler to consolidate resources.".to_string(),
            impact: "Medium - Improves page load time and reduces bandwidth".to_string(),
            resources: names(&medium),
        });
    }

    if total_wasted > BUILD_PROCESS_WASTE_BYTES {
        suggestions.push(DuplicateSuggestion {
            priority: Priority::Medium,
            category: "Build Process".to_string(),
            title: "Implement Resource Deduplication".to_string(),
            description: format!(
                "Total of {} wasted on duplicate resources.",
                format_bytes(total_wasted)
            ),
            action: "Use a bundler to deduplicate resources automatically and manage dependencies explicitly.".to_string(),
            impact: "Medium - Prevents duplicate resource loading through automation".to_string(),
            resources: Vec::new(),
        });
    }

    let scripts = of_type(ResourceType::Js);
    if !scripts.is_empty() {
        suggestions.push(DuplicateSuggestion {
            priority: Priority::Medium,
            category: "JavaScript Optimization".to_string(),
            title: "JavaScript Files Loaded Multiple Times".to_string(),
            description: format!(
                "{} JavaScript file(s) are loaded more than once.",
                scripts.len()
            ),
            action: "Consolidate JavaScript dependencies into a single bundle and remove duplicate <script> tags.".to_string(),
            impact: "Medium - Reduces script parsing time and bandwidth".to_string(),
            resources: names(&scripts),
        });
    }

    let styles = of_type(ResourceType::Css);
    if !styles.is_empty() {
        suggestions.push(DuplicateSuggestion {
            priority: Priority::Medium,
            category: "CSS Optimization".to_string(),
            title: "CSS Files Loaded Multiple Times".to_string(),
            description: format!("{} CSS file(s) are loaded more than once.", styles.len()),
            action: "Combine CSS files into a single stylesheet and remove duplicate <link> tags.".to_string(),
            impact: "Medium - Reduces render-blocking CSS and bandwidth".to_string(),
            resources: names(&styles),
        });
    }

    let images = of_type(ResourceType::Image);
    if !images.is_empty() {
        suggestions.push(DuplicateSuggestion {
            priority: Priority::Low,
            category: "Image Optimization".to_string(),
            title: "Images Loaded Multiple Times".to_string(),
            description: format!(
                "{} image(s) are referenced multiple times from different URLs.",
                images.len()
            ),
            action: "Serve each image from a single consistent URL so the browser cache can be reused.".to_string(),
            impact: "Low to Medium - Leverages browser cache and reduces bandwidth".to_string(),
            resources: names(&images),
        });
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_file_name() {
        assert_eq!(clean_file_name("app.js?v=3"), "app.js");
        assert_eq!(clean_file_name("page.html#top"), "page.html");
        assert_eq!(clean_file_name("a.css?x=1#y"), "a.css");
        assert_eq!(clean_file_name("plain.png"), "plain.png");
    }

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(Severity::classify(100, 1), Severity::Low);
        assert_eq!(Severity::classify(200 * 1024, 1), Severity::Medium);
        assert_eq!(Severity::classify(10, 3), Severity::Medium);
        assert_eq!(Severity::classify(MB + 1, 1), Severity::High);
        assert_eq!(Severity::classify(10, 5), Severity::High);
        assert_eq!(Severity::classify(MB, 1), Severity::Medium);
    }

    #[test]
    fn test_percentage_rounds_to_one_decimal() {
        assert_eq!(percentage(1.0, 3.0), 33.3);
        assert_eq!(percentage(5.0, 0.0), 0.0);
    }
}
