//! TUI rendering logic

use crate::app::{App, Focus};
use crate::components::{highlight_matches, CategoryTree, SearchBar};
use crate::empty_state;
use crate::keybindings::KeyBindings;
use crate::state::ViewStatus;
use crate::theme::{difficulty_color, focus_border, quality_color, status_color};
use practix_types::{Difficulty, Item};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Draw one frame
pub fn render(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], app);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);

    render_tree(frame, body[0], app);

    let item_area = if app.state.search.active {
        let split = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(3)])
            .split(body[1]);
        SearchBar::new(&app.state.search).render(frame, split[0]);
        split[1]
    } else {
        body[1]
    };
    render_items(frame, item_area, app);

    render_footer(frame, chunks[2], app);
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let difficulty = app
        .state
        .filters
        .difficulty
        .map(Difficulty::as_str)
        .unwrap_or("any");

    let mut spans = vec![
        Span::styled(
            " practix ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  difficulty: "),
        Span::styled(difficulty, Style::default().fg(Color::Yellow)),
        Span::raw("  sort: "),
        Span::styled(
            format!("{} {}", app.state.sort.field.as_str(), app.state.sort.order.as_str()),
            Style::default().fg(Color::Yellow),
        ),
    ];

    if let Some(user) = &app.state.user {
        spans.push(Span::raw("  user: "));
        spans.push(Span::styled(user.to_string(), Style::default().fg(Color::Green)));
    }
    if let Some(message) = &app.status_message {
        spans.push(Span::styled(
            format!("  {}", message),
            Style::default().fg(Color::Red),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_tree(frame: &mut Frame, area: Rect, app: &mut App) {
    let focused = app.focus == Focus::Tree && !app.state.search.active;
    let overview = &app.state.overview;

    if overview.categories.is_empty() {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(focus_border(focused)))
            .title(" Categories ");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let placeholder = match (&overview.error, overview.in_flight.is_some()) {
            (_, true) => empty_state::loading("categories"),
            (Some(error), false) => empty_state::load_failed(error),
            (None, false) => empty_state::loading("categories"),
        };
        frame.render_widget(placeholder, inner);
        return;
    }

    let tree = CategoryTree {
        categories: &overview.categories,
        expanded: &app.state.expanded,
        mastery: &overview.mastery,
        focused,
    };
    tree.render(frame, area, &mut app.tree_state);
}

/// One item row: position, title, difficulty, quality
pub fn format_item(index: usize, item: &Item, query: Option<&str>) -> Line<'static> {
    let mut spans = vec![Span::styled(
        format!("{:>5} ", index + 1),
        Style::default().fg(Color::DarkGray),
    )];

    match query {
        Some(q) => spans.extend(highlight_matches(&item.title, q)),
        None => spans.push(Span::raw(item.title.clone())),
    }

    spans.push(Span::styled(
        format!("  {}", item.difficulty),
        Style::default().fg(difficulty_color(item.difficulty)),
    ));
    spans.push(Span::styled(
        format!("  q{:.2}", item.quality_score),
        Style::default().fg(quality_color(item.quality_score)),
    ));

    Line::from(spans)
}

fn render_items(frame: &mut Frame, area: Rect, app: &mut App) {
    app.sync_item_list();
    let focused = app.focus == Focus::Items || app.state.search.active;
    let selected = app.tree_state.selected();
    let App {
        state,
        items: list,
        viewport_rows,
        ..
    } = app;
    let searching = state.search.active;

    let title = if searching {
        " Results ".to_string()
    } else {
        match selected.and_then(|i| state.overview.categories.get(i)) {
            Some(c) => format!(" {} ", c.display_name),
            None => " Items ".to_string(),
        }
    };

    let Some(view) = App::view_of(state, selected) else {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(focus_border(focused)))
            .title(title);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if !searching {
            frame.render_widget(empty_state::nothing_selected(), inner);
        }
        return;
    };

    let status = view.status();
    let mut title_spans = vec![Span::styled(
        title,
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )];
    if matches!(status, ViewStatus::Ready | ViewStatus::Stale) {
        title_spans.push(Span::styled(
            format!("{}/{} ", view.items.len(), view.total_count),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if view.is_loading() && view.last_updated.is_some() {
        title_spans.push(Span::styled("loading… ", Style::default().fg(Color::Yellow)));
    }
    if status == ViewStatus::Stale {
        title_spans.push(Span::styled(
            "(stale) ",
            Style::default().fg(status_color(status)),
        ));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(focus_border(focused)))
        .title(Line::from(title_spans));

    let placeholder = match status {
        ViewStatus::Idle | ViewStatus::Loading => {
            Some(empty_state::loading(if searching { "results" } else { "items" }))
        }
        ViewStatus::Failed => Some(empty_state::load_failed(
            view.error.as_deref().unwrap_or("unknown error"),
        )),
        ViewStatus::Empty if searching => Some(empty_state::no_search_results(&state.search.query)),
        ViewStatus::Empty => Some(empty_state::no_items(&format!(
            "difficulty {}",
            state.filters.difficulty.map(Difficulty::as_str).unwrap_or("any")
        ))),
        ViewStatus::Ready | ViewStatus::Stale => None,
    };

    if let Some(placeholder) = placeholder {
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(placeholder, inner);
        return;
    }

    let query = searching.then_some(state.search.query.as_str());
    *viewport_rows = list.viewport_rows(block.inner(area).height);
    list.render(
        frame,
        area,
        block,
        &view.items,
        view.has_next,
        focused,
        |index, item| format_item(index, item, query),
    );
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();
    for (key, action) in KeyBindings::hints(app.state.search.active) {
        spans.push(Span::styled(
            format!(" {} ", key),
            Style::default().fg(Color::Black).bg(Color::DarkGray),
        ));
        spans.push(Span::styled(
            format!(" {} ", action.description()),
            Style::default().fg(Color::Gray),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
