use crate::theme::{difficulty_color, mastery_color};
use practix_types::{Category, CategoryId, CategoryMastery, Difficulty};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};
use std::collections::{BTreeSet, HashMap};

/// Category overview with expansion markers and the optional mastery overlay
pub struct CategoryTree<'a> {
    pub categories: &'a [Category],
    pub expanded: &'a BTreeSet<CategoryId>,
    pub mastery: &'a HashMap<CategoryId, CategoryMastery>,
    pub focused: bool,
}

impl<'a> CategoryTree<'a> {
    /// One line per category: marker, name, count, histogram, mastery
    pub fn row(&self, category: &Category) -> Line<'static> {
        let marker = if self.expanded.contains(&category.id) {
            "▾ "
        } else {
            "▸ "
        };

        let mut spans = vec![
            Span::styled(marker, Style::default().fg(Color::Cyan)),
            Span::styled(
                category.display_name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" {}", category.total_item_count),
                Style::default().fg(Color::DarkGray),
            ),
        ];

        for difficulty in Difficulty::ALL {
            let count = category.difficulty_histogram.get(difficulty);
            let label = difficulty.as_str().chars().next().unwrap_or('?').to_ascii_uppercase();
            spans.push(Span::styled(
                format!(" {}{}", label, count),
                Style::default().fg(difficulty_color(difficulty)),
            ));
        }

        if let Some(mastery) = self.mastery.get(&category.id) {
            spans.push(Span::styled(
                format!(" {:.0}%", mastery.mastery_percent),
                Style::default().fg(mastery_color(mastery.mastery_percent)),
            ));
        }

        Line::from(spans)
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, state: &mut ListState) {
        let border_color = if self.focused {
            Color::Cyan
        } else {
            Color::DarkGray
        };

        let items: Vec<ListItem> = self
            .categories
            .iter()
            .map(|category| ListItem::new(self.row(category)))
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border_color))
                    .title(Span::styled(
                        format!(" Categories ({}) ", self.categories.len()),
                        Style::default()
                            .fg(Color::White)
                            .add_modifier(Modifier::BOLD),
                    )),
            )
            .highlight_style(
                Style::default()
                    .bg(if self.focused { Color::Cyan } else { Color::DarkGray })
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            );

        frame.render_stateful_widget(list, area, state);
    }
}
