//! Color language for the practix TUI
//!
//! - Green: easy, mastered, ready
//! - Yellow: medium, loading, stale data
//! - Red: hard, failed
//! - Cyan: focus and interactive elements
//! - Gray: neutral and secondary text

use crate::state::ViewStatus;
use practix_types::Difficulty;
use ratatui::style::Color;

pub fn difficulty_color(difficulty: Difficulty) -> Color {
    match difficulty {
        Difficulty::Easy => Color::Green,
        Difficulty::Medium => Color::Yellow,
        Difficulty::Hard => Color::Red,
    }
}

/// Mastery percentage thresholds: 80+ green, 40+ yellow, else gray
pub fn mastery_color(percent: f64) -> Color {
    if percent >= 80.0 {
        Color::Green
    } else if percent >= 40.0 {
        Color::Yellow
    } else {
        Color::DarkGray
    }
}

/// Quality score in `[0, 1]` shown as a color ramp
pub fn quality_color(score: f64) -> Color {
    if score >= 0.8 {
        Color::Magenta
    } else if score >= 0.5 {
        Color::White
    } else {
        Color::DarkGray
    }
}

pub fn status_color(status: ViewStatus) -> Color {
    match status {
        ViewStatus::Ready | ViewStatus::Empty => Color::Green,
        ViewStatus::Loading | ViewStatus::Stale => Color::Yellow,
        ViewStatus::Failed => Color::Red,
        ViewStatus::Idle => Color::DarkGray,
    }
}

pub fn focus_border(focused: bool) -> Color {
    if focused {
        Color::Cyan
    } else {
        Color::DarkGray
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mastery_thresholds() {
        assert_eq!(mastery_color(100.0), Color::Green);
        assert_eq!(mastery_color(80.0), Color::Green);
        assert_eq!(mastery_color(45.5), Color::Yellow);
        assert_eq!(mastery_color(0.0), Color::DarkGray);
    }

    #[test]
    fn test_stale_is_a_warning() {
        assert_eq!(status_color(ViewStatus::Stale), Color::Yellow);
        assert_eq!(status_color(ViewStatus::Failed), Color::Red);
    }
}
