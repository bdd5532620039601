use crate::config::DisplayConfig;
use crate::models::snapshot::{Section, SnapshotView};
use crate::models::volume::Category;
use crate::util::human::{fmt_bytes, fmt_pct, usage_bar};

const BAR_WIDTH: usize = 30;

/// Sections a report shows. Internal and external drives appear when present;
/// system volumes only on request; network storage on request even if empty.
pub fn visible_sections<'a>(view: &'a SnapshotView, display: &DisplayConfig) -> Vec<&'a Section> {
    view.sections
        .iter()
        .filter(|s| match s.category {
            Category::Internal | Category::External => !s.rows.is_empty(),
            Category::System  => display.show_system && !s.rows.is_empty(),
            Category::Network => display.show_network,
        })
        .collect()
}

/// Render a snapshot as a human-readable storage overview.
pub fn generate(view: &SnapshotView, display: &DisplayConfig) -> String {
    let mut out = String::new();

    out.push_str("═══════════════════════════════════════════════\n");
    out.push_str(&format!("  Storage Overview — {}\n", view.taken_at.format("%Y-%m-%d %H:%M:%S")));
    out.push_str("═══════════════════════════════════════════════\n\n");

    for section in visible_sections(view, display) {
        out.push_str(&format!("── {} ({}) ──────────────────────────\n", section.title, section.rows.len()));
        if section.rows.is_empty() {
            out.push_str("  No network storage found\n\n");
            continue;
        }
        for row in &section.rows {
            let pct = if row.total_bytes == 0 { 0.0 } else {
                row.used_bytes as f64 / row.total_bytes as f64 * 100.0
            };
            out.push_str(&format!("  {}  [{}]\n", row.display_name, row.icon.label()));
            out.push_str(&format!(
                "    Total: {:>10}   Used: {:>10}   Free: {:>10}\n",
                fmt_bytes(row.total_bytes), fmt_bytes(row.used_bytes), fmt_bytes(row.free_bytes),
            ));
            out.push_str(&format!("    {} {:>4}\n", usage_bar(pct, BAR_WIDTH), fmt_pct(pct)));
        }
        out.push('\n');
    }

    out.push_str("═══════════════════════════════════════════════\n");
    out
}

/// One-line notice shown in place of a report when probing failed.
pub fn unavailable(reason: &str) -> String {
    format!("Storage information unavailable: {reason}\n")
}
