// Report generation from an analysis result

use crate::duplicates::{self, DuplicateAnalysis};
use crate::format::{format_bytes, format_duration_ms};
use crate::load_time::{self, LoadTimeEstimate};
use crate::model::AnalysisResult;
use crate::score::{self, PerformanceScore};
use crate::suggest::{self, Suggestion, SuggestionSummary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const THIN_RULE: &str =
    "────────────────────────────────────────────────────────────────────────────────";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// An analysis result together with everything derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    pub generated_at: DateTime<Utc>,
    pub analysis: AnalysisResult,
    pub score: PerformanceScore,
    pub duplicates: DuplicateAnalysis,
    pub load_times: Vec<LoadTimeEstimate>,
    pub suggestions: Vec<Suggestion>,
    pub suggestion_summary: SuggestionSummary,
}

pub fn build_report(analysis: AnalysisResult) -> PageReport {
    let score = score::calculate(&analysis);
    let duplicates = duplicates::analyze(&analysis.resources);
    let load_times = load_time::estimate_all(&analysis.resources);
    let suggestions = suggest::suggest(&analysis.resources);
    let suggestion_summary = suggest::summarize(&suggestions);

    PageReport {
        generated_at: Utc::now(),
        analysis,
        score,
        duplicates,
        load_times,
        suggestions,
        suggestion_summary,
    }
}

pub fn render(report: &PageReport, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(report)),
        ReportFormat::Json => generate_json_report(report),
    }
}

fn section(out: &mut String, title: &str) {
    out.push_str(RULE);
    out.push('\n');
    out.push_str(title);
    out.push('\n');
    out.push_str(RULE);
    out.push_str("\n\n");
}

pub fn generate_text_report(report: &PageReport) -> String {
    let analysis = &report.analysis;
    let mut out = String::new();

    out.push_str(RULE);
    out.push('\n');
    out.push_str("                          PAGEWEIGHT ANALYSIS REPORT\n");
    out.push_str(RULE);
    out.push_str("\n\n");

    out.push_str(&format!("URL:          {}\n", analysis.url));
    out.push_str(&format!(
        "Generated:    {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("Total Size:   {}\n", format_bytes(analysis.total_size)));
    out.push_str(&format!("Total Files:  {}\n", analysis.total_files));
    out.push_str(&format!(
        "Main HTML:    {} ({})\n",
        format_bytes(analysis.main_html_size),
        analysis.root().name
    ));
    if analysis.interrupted {
        out.push_str("Status:       INTERRUPTED (partial results)\n");
    }
    out.push('\n');

    section(&mut out, "PERFORMANCE SCORE");
    let breakdown = &report.score.breakdown;
    out.push_str(&format!("Score: {}/100\n\n", report.score.total_score));
    out.push_str(&format!("  Page size             {:>3}  (30%)\n", breakdown.page_size));
    out.push_str(&format!("  Request count         {:>3}  (25%)\n", breakdown.request_count));
    out.push_str(&format!(
        "  Resource distribution {:>3}  (25%)\n",
        breakdown.resource_distribution
    ));
    out.push_str(&format!("  Compression           {:>3}  (20%)\n\n", breakdown.compression));

    section(&mut out, "RESOURCES");
    for (kind, totals) in &report.score.metrics.type_distribution {
        out.push_str(&format!(
            "  {:<6} {:>4} files  {:>12}\n",
            kind.as_str(),
            totals.count,
            format_bytes(totals.size)
        ));
    }
    out.push('\n');

    let mut largest: Vec<_> = analysis.subresources().iter().collect();
    largest.sort_by(|a, b| b.size.cmp(&a.size));
    if !largest.is_empty() {
        out.push_str("Largest resources:\n");
    }
    for resource in largest.iter().take(10) {
        out.push_str(&format!(
            "  {:>12}  {:<6} {}\n",
            format_bytes(resource.size),
            resource.resource_type.as_str(),
            resource.name
        ));
    }
    out.push('\n');

    if !report.load_times.is_empty() {
        section(&mut out, "ESTIMATED LOAD TIME");
        for estimate in &report.load_times {
            out.push_str(&format!(
                "  {:<12} {:>8}  ({})  download {}, latency {}, parse/render {}\n",
                estimate.profile,
                format_duration_ms(estimate.total_with_render as f64),
                estimate.speed_category(),
                format_duration_ms(estimate.download_time as f64),
                format_duration_ms(estimate.latency_time as f64),
                format_duration_ms(estimate.parse_render_time as f64),
            ));
        }
        out.push('\n');
    }

    section(&mut out, "DUPLICATE RESOURCES");
    out.push_str(&report.duplicates.summary_message());
    out.push_str("\n\n");
    for group in &report.duplicates.groups {
        out.push_str(&format!(
            "  [{}] {} x{} ({} each, {} wasted)\n",
            group.severity.as_str().to_uppercase(),
            group.file_name,
            group.instances,
            format_bytes(group.size),
            format_bytes(group.wasted_size)
        ));
        for url in &group.urls {
            out.push_str(&format!("      {}\n", url));
        }
    }
    if report.duplicates.has_duplicates {
        out.push('\n');
    }

    section(&mut out, "OPTIMIZATION SUGGESTIONS");
    let summary = &report.suggestion_summary;
    out.push_str(&format!(
        "{} suggestions ({} high, {} medium, {} low), potential savings {}\n\n",
        summary.total_suggestions,
        summary.high_priority,
        summary.medium_priority,
        summary.low_priority,
        format_bytes(summary.potential_savings)
    ));

    for (idx, suggestion) in report.suggestions.iter().enumerate() {
        out.push_str(&format!(
            "[{}] {} ({})\n",
            idx + 1,
            suggestion.title,
            suggestion.priority.as_str().to_uppercase()
        ));
        out.push_str(&format!("Category:     {}\n", suggestion.category));
        out.push_str(&format!("Impact:       {}\n\n", suggestion.impact_text));
        out.push_str(&wrap_text(&suggestion.description, 80, "  "));
        out.push('\n');
        for action in &suggestion.actions {
            out.push_str(&format!("  - {}\n", action));
        }
        out.push('\n');
        out.push_str(THIN_RULE);
        out.push_str("\n\n");
    }

    out.push_str(RULE);
    out.push('\n');
    out.push_str("                                 End of Report\n");
    out.push_str(RULE);
    out.push('\n');

    out
}

pub fn generate_json_report(report: &PageReport) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Pageweight",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": report.generated_at.to_rfc3339(),
            },
            "analysis": report.analysis,
            "score": report.score,
            "duplicates": report.duplicates,
            "load_times": report.load_times,
            "suggestions": report.suggestions,
            "suggestion_summary": report.suggestion_summary,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if !line.is_empty() && line.len() + word.len() + 1 > width - indent.len() {
            result.push_str(indent);
            result.push_str(&line);
            result.push('\n');
            line.clear();
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }

    if !line.is_empty() {
        result.push_str(indent);
        result.push_str(&line);
        result.push('\n');
    }

    result
}
