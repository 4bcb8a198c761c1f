use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{core::report::Report, quantity::power::Megawatts};

pub fn build_report_table(report: &Report) -> Table {
    let peak = report.rows.iter().map(|row| row.power).max().unwrap_or(Megawatts::ZERO);

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table.set_header(vec![
        format!("Date [{}]", report.timezone_abbreviation()),
        "Time".to_owned(),
        "Power".to_owned(),
    ]);
    for row in &report.rows {
        table.add_row(vec![
            Cell::new(row.date).add_attribute(Attribute::Dim),
            Cell::new(&row.interval),
            Cell::new(format!("{:.3} MW", row.power.0)).set_alignment(CellAlignment::Right).fg(
                if row.power <= Megawatts::ZERO {
                    Color::DarkGrey
                } else if row.power.0 >= 0.8 * peak.0 {
                    Color::Green
                } else {
                    Color::Reset
                },
            ),
        ]);
    }
    table
}
