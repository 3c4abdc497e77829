pub mod durations;
mod report;
mod resolution;
mod stats;
mod tracker;

pub use report::{IncidentReport, ReportTable};
pub use resolution::Resolution;
pub use stats::DescriptiveStats;
pub use tracker::{BuildView, Incident, IncidentSignature, IncidentTracker};
