//! Placeholder panels for views without rows
//!
//! "No results" and "could not load" are different states and get
//! different panels.

use ratatui::{
    layout::Alignment,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

/// Builder for placeholder messages
pub struct EmptyState {
    title: String,
    title_color: Color,
    message: Vec<String>,
    actions: Vec<(String, String)>,
}

impl EmptyState {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            title_color: Color::Yellow,
            message: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn color(mut self, color: Color) -> Self {
        self.title_color = color;
        self
    }

    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message.push(msg.into());
        self
    }

    pub fn action(mut self, key: impl Into<String>, description: impl Into<String>) -> Self {
        self.actions.push((key.into(), description.into()));
        self
    }

    /// Text lines, without styling concerns of the caller
    pub fn lines(self) -> Vec<Line<'static>> {
        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(self.title, Style::default().fg(self.title_color))),
            Line::from(""),
        ];

        for msg in self.message {
            lines.push(Line::from(Span::styled(
                msg,
                Style::default().fg(Color::DarkGray),
            )));
        }

        if !self.actions.is_empty() {
            lines.push(Line::from(""));
            for (key, desc) in self.actions {
                lines.push(Line::from(vec![
                    Span::styled("[", Style::default().fg(Color::DarkGray)),
                    Span::styled(key, Style::default().fg(Color::Green)),
                    Span::styled("] ", Style::default().fg(Color::DarkGray)),
                    Span::styled(desc, Style::default().fg(Color::White)),
                ]));
            }
        }

        lines
    }

    pub fn build(self) -> Paragraph<'static> {
        Paragraph::new(self.lines()).alignment(Alignment::Center)
    }
}

pub fn loading(what: &str) -> Paragraph<'static> {
    EmptyState::new(format!("Loading {}...", what)).build()
}

pub fn nothing_selected() -> Paragraph<'static> {
    EmptyState::new("No category expanded")
        .color(Color::DarkGray)
        .action("Enter", "Expand the selected category")
        .action("/", "Search all items")
        .build()
}

pub fn no_items(filter: &str) -> Paragraph<'static> {
    EmptyState::new("No items")
        .message(format!("Nothing matches {}", filter))
        .action("d", "Cycle difficulty filter")
        .build()
}

pub fn no_search_results(query: &str) -> Paragraph<'static> {
    EmptyState::new("No Results")
        .message(format!("Nothing matches \"{}\"", query))
        .action("Esc", "Leave search")
        .build()
}

/// Shown when a load failed and there is no earlier data to fall back to
pub fn load_failed(error: &str) -> Paragraph<'static> {
    EmptyState::new("Could not load")
        .color(Color::Red)
        .message(error.to_string())
        .action("r", "Retry")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_panel_carries_error_and_retry_hint() {
        let lines = EmptyState::new("Could not load")
            .message("Service unavailable: list")
            .action("r", "Retry")
            .lines();

        let text: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        assert!(text.iter().any(|l| l == "Service unavailable: list"));
        assert!(text.iter().any(|l| l == "[r] Retry"));
    }
}
