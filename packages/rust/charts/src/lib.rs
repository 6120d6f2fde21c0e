//! Chart labelling and rendering.
//!
//! This crate provides:
//! - [`classifier`]: keyword rules mapping a question to a chart label/title
//! - [`render`]: the [`ChartRenderer`] seam and a PNG bar-chart implementation
//! - [`chart_file_name`]: collision-resistant names for persisted copies

pub mod classifier;
pub mod render;

use chrono::{DateTime, Local};

pub use classifier::{ChartTopic, TopicClassifier, TopicRule};
pub use render::{BarChartRenderer, ChartRenderer};

/// File name for a persisted chart: `{label}_{YYYYmmddHHMMSS}.png`.
///
/// The label is lowercased and every character outside `[a-z0-9_-]` becomes
/// `_`, so the name never leaves the output directory. The timestamp has
/// second resolution.
pub fn chart_file_name(label: &str, at: DateTime<Local>) -> String {
    let slug: String = label
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' | '-' => c,
            _ => '_',
        })
        .collect();
    let slug = if slug.is_empty() { "chart" } else { slug.as_str() };
    format!("{slug}_{}.png", at.format("%Y%m%d%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_name_uses_label_and_second_timestamp() {
        let at = Local.with_ymd_and_hms(2025, 6, 1, 9, 5, 7).unwrap();
        assert_eq!(chart_file_name("ROAS", at), "roas_20250601090507.png");
        assert_eq!(
            chart_file_name("Total Sales", at),
            "total_sales_20250601090507.png"
        );
    }

    #[test]
    fn file_names_differ_across_seconds() {
        let a = Local.with_ymd_and_hms(2025, 6, 1, 9, 5, 7).unwrap();
        let b = Local.with_ymd_and_hms(2025, 6, 1, 9, 5, 8).unwrap();
        assert_ne!(chart_file_name("CPC", a), chart_file_name("CPC", b));
    }

    #[test]
    fn path_characters_are_replaced() {
        let at = Local.with_ymd_and_hms(2025, 6, 1, 9, 5, 7).unwrap();
        assert_eq!(chart_file_name("../x", at), "___x_20250601090507.png");
        assert_eq!(chart_file_name("a/b", at), "a_b_20250601090507.png");
        assert_eq!(chart_file_name("C:\\ads", at), "c__ads_20250601090507.png");
        assert_eq!(chart_file_name("  ", at), "chart_20250601090507.png");

        for label in ["../../etc/passwd", "a/b", "Café Sales"] {
            let name = chart_file_name(label, at);
            let stem = name.strip_suffix(".png").unwrap();
            assert!(!stem.contains(['/', '\\', '.']), "{name}");
        }
    }
}
