mod progress;
mod styling;
mod tables;

pub use progress::ProcessingProgress;
pub use tables::print_report;

use styling::{dim, magenta_bold};

/// Prints the `RemedyLens` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🛠 RemedyLens"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Time-to-remediate insights for Develocity builds")
    );
}
