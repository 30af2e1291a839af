pub mod analyze;
pub mod duplicates;
pub mod format;
pub mod load_time;
pub mod model;
pub mod report;
pub mod score;
pub mod suggest;

pub use analyze::{AnalyzeOptions, analyze_url, execute_analysis};
pub use model::{AnalysisEvent, AnalysisResult, EventSender};
pub use report::{PageReport, ReportFormat, build_report, render};
