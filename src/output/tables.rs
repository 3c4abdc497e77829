use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::insights::ReportTable;

use super::styling::bright;

fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Renders a report to stdout: styled title line, then the table.
pub fn print_report(report: &ReportTable) {
    println!("{}", bright(&report.title).underlined());
    println!("{}", render_table(report));
    println!();
}

fn render_table(report: &ReportTable) -> Table {
    let mut table = create_table();
    table.set_header(
        report
            .headers
            .iter()
            .map(|header| Cell::new(header).fg(TableColor::Cyan))
            .collect::<Vec<_>>(),
    );
    for row in &report.rows {
        table.add_row(row.clone());
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_table_contains_headers_and_cells() {
        let report = ReportTable {
            title: "Example".to_string(),
            headers: vec!["Failures".to_string(), "Mean".to_string()],
            rows: vec![vec!["2".to_string(), "45m".to_string()]],
        };

        let rendered = render_table(&report).to_string();
        assert!(rendered.contains("Failures"));
        assert!(rendered.contains("Mean"));
        assert!(rendered.contains("45m"));
    }
}
