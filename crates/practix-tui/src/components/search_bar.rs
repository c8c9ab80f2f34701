use crate::state::{SearchState, ViewStatus};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Search input line with a debounce/loading indicator
pub struct SearchBar<'a> {
    search: &'a SearchState,
    placeholder: &'a str,
}

impl<'a> SearchBar<'a> {
    pub fn new(search: &'a SearchState) -> Self {
        Self {
            search,
            placeholder: "Type to search titles...",
        }
    }

    pub fn with_placeholder(mut self, placeholder: &'a str) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Short status shown at the right of the input
    pub fn indicator(&self) -> Span<'static> {
        let view = &self.search.view;
        if self.search.pending.is_some() {
            return Span::styled(" typing…", Style::default().fg(Color::DarkGray));
        }
        match view.status() {
            ViewStatus::Loading => Span::styled(" searching…", Style::default().fg(Color::Yellow)),
            ViewStatus::Ready => Span::styled(
                format!(" {} matches", view.total_count),
                Style::default().fg(Color::Green),
            ),
            ViewStatus::Empty => Span::styled(" no matches", Style::default().fg(Color::DarkGray)),
            ViewStatus::Stale => Span::styled(" stale", Style::default().fg(Color::Yellow)),
            ViewStatus::Failed => Span::styled(" failed", Style::default().fg(Color::Red)),
            ViewStatus::Idle => Span::raw(""),
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let input = &self.search.input;
        let (text, style) = if input.is_empty() {
            (self.placeholder, Style::default().fg(Color::DarkGray))
        } else {
            (input.as_str(), Style::default().fg(Color::White))
        };

        let line = Line::from(vec![
            Span::styled("/ ", Style::default().fg(Color::Cyan)),
            Span::styled(text.to_string(), style),
            Span::styled(
                "_",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
            self.indicator(),
        ]);

        let paragraph = Paragraph::new(line).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(Span::styled(
                    " Search (Esc to leave) ",
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                )),
        );

        frame.render_widget(paragraph, area);
    }
}

/// Split `text` into spans, highlighting case-insensitive matches of `query`
pub fn highlight_matches(text: &str, query: &str) -> Vec<Span<'static>> {
    let query = query.trim();
    if query.is_empty() {
        return vec![Span::raw(text.to_string())];
    }

    let lower = text.to_lowercase();
    // Lowercasing may change byte lengths; fall back to plain text then
    if lower.len() != text.len() {
        return vec![Span::raw(text.to_string())];
    }

    let needle = query.to_lowercase();
    let highlight = Style::default()
        .bg(Color::Yellow)
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD);

    let mut spans = Vec::new();
    let mut cursor = 0;
    for (start, matched) in lower.match_indices(&needle) {
        if start > cursor {
            spans.push(Span::raw(text[cursor..start].to_string()));
        }
        let end = start + matched.len();
        spans.push(Span::styled(text[start..end].to_string(), highlight));
        cursor = end;
    }
    if cursor < text.len() {
        spans.push(Span::raw(text[cursor..].to_string()));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_case_insensitive() {
        let spans = highlight_matches("Binary Heap Merge", "HEAP");
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[1].content, "Heap");
    }

    #[test]
    fn test_highlight_repeated_and_missing() {
        assert_eq!(highlight_matches("ab ab", "ab").len(), 3);
        assert_eq!(highlight_matches("hello", "xyz").len(), 1);
        assert_eq!(highlight_matches("hello", "  ").len(), 1);
    }

    #[test]
    fn test_indicator_while_debouncing() {
        let search = SearchState {
            active: true,
            input: "gra".into(),
            pending: Some(4),
            ..SearchState::default()
        };
        assert_eq!(SearchBar::new(&search).indicator().content, " typing…");
    }
}
