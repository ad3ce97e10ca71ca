//! Terminal rendering of analysis results and history.

use gaugyan_common::{AnalysisRecord, CombinedResult, QualityBand};
use owo_colors::OwoColorize;
use std::fmt::Write;

/// Width of the longest bar in a chart
pub const BAR_WIDTH: usize = 40;

/// Rump angles are charted against at least this many degrees
const RUMP_ANGLE_SCALE: f64 = 45.0;

const LABEL_WIDTH: usize = 18;

/// Renders with or without ANSI colours
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    pub color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn band(&self, text: &str, band: QualityBand) -> String {
        if !self.color {
            return text.to_string();
        }
        match band {
            QualityBand::Good => text.bright_green().bold().to_string(),
            QualityBand::Medium => text.bright_yellow().bold().to_string(),
            QualityBand::Poor => text.bright_red().bold().to_string(),
        }
    }

    fn heading(&self, text: &str) -> String {
        if self.color {
            text.bright_cyan().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }

    /// Score, trait grid and the two bar charts
    pub fn scorecard(&self, result: &CombinedResult) -> String {
        let traits = &result.traits;
        let score = &result.score;
        let band = QualityBand::from_score(score.atc_score);
        let mut out = String::new();

        let headline = format!("{:.1}", score.atc_score);
        let _ = writeln!(
            out,
            "{}  {}  {}",
            self.heading("ATC Score"),
            self.band(&headline, band),
            self.band(&format!("[{}]", band.label()), band)
        );
        let _ = writeln!(out, "{}", score.salient_traits);
        out.push('\n');

        let _ = writeln!(out, "{}", self.heading("Traits"));
        for (label, value) in traits.measurements_cm() {
            let _ = writeln!(out, "  {:<LABEL_WIDTH$} {:>7.1} cm", label, value);
        }
        let _ = writeln!(out, "  {:<LABEL_WIDTH$} {:>7.1}°", "Rump Angle", traits.rump_angle);
        let _ = writeln!(out, "  {:<LABEL_WIDTH$} {}", "Udder Shape", traits.udder_shape);
        out.push('\n');

        let measurements = traits.measurements_cm();
        let scale = measurements
            .iter()
            .map(|(_, v)| *v)
            .fold(1.0_f64, f64::max);
        let _ = writeln!(out, "{}", self.heading("Measurements (cm)"));
        for (label, value) in measurements {
            let _ = writeln!(out, "  {:<LABEL_WIDTH$} {} {:.1}", label, self.dim(&bar(value, scale, BAR_WIDTH)), value);
        }
        out.push('\n');

        let angle_scale = traits.rump_angle.abs().max(RUMP_ANGLE_SCALE);
        let _ = writeln!(out, "{}", self.heading("Rump Angle (degrees)"));
        let _ = writeln!(
            out,
            "  {:<LABEL_WIDTH$} {} {:.1}°",
            "Rump Angle",
            self.dim(&bar(traits.rump_angle.abs(), angle_scale, BAR_WIDTH)),
            traits.rump_angle
        );

        out
    }

    /// One line per record, newest first
    pub fn history(&self, records: &[AnalysisRecord]) -> String {
        if records.is_empty() {
            return "No analyses yet.\n".to_string();
        }

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{}",
            self.heading(&format!("{:<17} {:>6}  {:<8} {}", "When (UTC)", "Score", "Band", "Udder Shape"))
        );
        for record in records {
            let score = record.result.score.atc_score;
            let band = QualityBand::from_score(score);
            let _ = writeln!(
                out,
                "{:<17} {}  {}  {}",
                record.timestamp.format("%Y-%m-%d %H:%M"),
                self.band(&format!("{:>6.1}", score), band),
                self.band(&format!("{:<7}", band.label()), band),
                record.result.traits.udder_shape
            );
        }
        out
    }

    pub fn relevant_traits(&self, traits: &[String]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.heading("Most relevant traits"));
        for (i, line) in traits.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, line);
        }
        out
    }
}

/// Horizontal bar proportional to `value / scale`
pub fn bar(value: f64, scale: f64, width: usize) -> String {
    if !value.is_finite() || !scale.is_finite() || scale <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let filled = ((value / scale) * width as f64).round().clamp(0.0, width as f64) as usize;
    "█".repeat(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use gaugyan_common::{ScoreResult, TraitSet};

    fn result(score: f64) -> CombinedResult {
        CombinedResult {
            traits: TraitSet {
                body_length: 160.0,
                chest_width: 40.0,
                height_at_withers: 80.0,
                rump_angle: 9.0,
                udder_shape: "bowl shaped".to_string(),
            },
            score: ScoreResult {
                atc_score: score,
                salient_traits: "Long body with a level rump.".to_string(),
            },
        }
    }

    #[test]
    fn test_bar_scaling() {
        assert_eq!(bar(10.0, 10.0, 20).chars().count(), 20);
        assert_eq!(bar(5.0, 10.0, 20).chars().count(), 10);
        assert_eq!(bar(50.0, 10.0, 20).chars().count(), 20);
        assert_eq!(bar(-3.0, 10.0, 20), "");
        assert_eq!(bar(f64::NAN, 10.0, 20), "");
        assert_eq!(bar(3.0, 0.0, 20), "");
    }

    #[test]
    fn test_plain_scorecard() {
        let text = Renderer::new(false).scorecard(&result(81.5));
        assert!(text.contains("ATC Score  81.5  [good]"));
        assert!(text.contains("Long body with a level rump."));
        assert!(text.contains("Udder Shape"));
        assert!(text.contains("bowl shaped"));
        assert!(text.contains("Measurements (cm)"));
        assert!(text.contains("Rump Angle (degrees)"));
        assert!(!text.contains('\u{1b}'));

        // Longest measurement gets the full bar
        let full = "█".repeat(BAR_WIDTH);
        let body_line = text.lines().find(|l| l.contains("Body Length") && l.contains('█')).unwrap();
        assert!(body_line.contains(&full));
    }

    #[test]
    fn test_band_labels() {
        assert!(Renderer::new(false).scorecard(&result(59.9)).contains("[poor]"));
        assert!(Renderer::new(false).scorecard(&result(60.0)).contains("[medium]"));
    }

    #[test]
    fn test_colour_output_has_escapes() {
        let text = Renderer::new(true).scorecard(&result(70.0));
        assert!(text.contains('\u{1b}'));
    }

    #[test]
    fn test_history_lines() {
        let ts = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let records = vec![AnalysisRecord::new("r1", "image/jpeg;sha256:00", ts, result(72.0))];
        let text = Renderer::new(false).history(&records);
        assert!(text.contains("2023-11-14 22:13"));
        assert!(text.contains("72.0"));
        assert!(text.contains("medium"));

        assert_eq!(Renderer::new(false).history(&[]), "No analyses yet.\n");
    }
}
