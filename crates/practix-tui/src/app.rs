//! TUI application state: client data plus what is purely presentational

use crate::components::VirtualList;
use crate::keybindings::{KeyAction, KeyBindings};
use crate::runtime::Runtime;
use crate::state::{ClientState, Msg, PagedView};
use crossterm::event::{KeyCode, KeyModifiers};
use practix_types::{Category, Difficulty, SortSpec};
use ratatui::widgets::ListState;

/// Pane receiving movement keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Tree,
    Items,
}

pub struct App {
    pub state: ClientState,
    pub focus: Focus,
    pub tree_state: ListState,
    pub items: VirtualList,
    pub bindings: KeyBindings,
    pub should_quit: bool,
    pub status_message: Option<String>,
    /// Rows the item pane showed on the last frame
    pub viewport_rows: usize,
    shown: Option<(String, u64)>,
}

impl App {
    pub fn new(state: ClientState, overscan: usize) -> Self {
        let mut tree_state = ListState::default();
        tree_state.select(Some(0));
        Self {
            state,
            focus: Focus::Tree,
            tree_state,
            items: VirtualList::new(overscan),
            bindings: KeyBindings::new(),
            should_quit: false,
            status_message: None,
            viewport_rows: 10,
            shown: None,
        }
    }

    /// Run `msg` through the reducer
    pub fn dispatch(&mut self, runtime: &Runtime, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        self.state = runtime.dispatch(state, msg);
    }

    /// Feed finished effects back into the state
    pub fn drain(&mut self, runtime: &mut Runtime) -> usize {
        let state = std::mem::take(&mut self.state);
        let (state, handled) = runtime.drain(state);
        self.state = state;
        handled
    }

    pub fn selected_category(&self) -> Option<&Category> {
        self.tree_state
            .selected()
            .and_then(|i| self.state.overview.categories.get(i))
    }

    /// What the item pane shows: search results, or the selected category
    /// when it is expanded
    pub fn item_view(&self) -> Option<&PagedView> {
        Self::view_of(&self.state, self.tree_state.selected())
    }

    /// [`item_view`](Self::item_view) over borrowed parts, so callers can
    /// hold the view while mutating the virtual list
    pub fn view_of(state: &ClientState, selected: Option<usize>) -> Option<&PagedView> {
        if state.search.active {
            return Some(&state.search.view);
        }
        let category = selected.and_then(|i| state.overview.categories.get(i))?;
        if !state.is_expanded(&category.id) {
            return None;
        }
        state.listing(&category.id)
    }

    fn item_rows(&self) -> (usize, bool) {
        self.item_view()
            .map(|view| (view.items.len(), view.has_next))
            .unwrap_or((0, false))
    }

    /// Reset or invalidate the virtual list when the shown data changes
    pub fn sync_item_list(&mut self) {
        let identity = if self.state.search.active {
            Some((
                format!("search:{}", self.state.search.query),
                self.state.search.view.epoch,
            ))
        } else {
            self.selected_category()
                .filter(|c| self.state.is_expanded(&c.id))
                .map(|c| {
                    let key = self.state.listing_key(&c.id);
                    let epoch = self.state.listing(&c.id).map(|v| v.epoch).unwrap_or(0);
                    (format!("{}:{}", c.id, key.signature()), epoch)
                })
        };

        match (&self.shown, &identity) {
            (Some((old, _)), Some((new, _))) if old != new => self.items.reset(),
            (Some((_, old)), Some((_, new))) if old != new => self.items.invalidate(),
            (None, Some(_)) => self.items.reset(),
            _ => {}
        }
        self.shown = identity;
    }

    /// Translate a key press into reducer messages
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Vec<Msg> {
        if self.state.search.active {
            return self.handle_search_key(code, modifiers);
        }

        let Some(action) = self.bindings.action(code, modifiers) else {
            return Vec::new();
        };
        let selected = self.selected_category().map(|c| c.id.clone());

        match action {
            KeyAction::Quit => {
                self.should_quit = true;
                Vec::new()
            }
            KeyAction::MoveUp => {
                match self.focus {
                    Focus::Tree => self.tree_state.select_previous(),
                    Focus::Items => self.items.move_up(),
                }
                Vec::new()
            }
            KeyAction::MoveDown => {
                match self.focus {
                    Focus::Tree => {
                        let last = self.state.overview.categories.len().saturating_sub(1);
                        let next = self.tree_state.selected().map(|i| i + 1).unwrap_or(0);
                        self.tree_state.select(Some(next.min(last)));
                    }
                    Focus::Items => {
                        let (items, has_next) = self.item_rows();
                        self.items.move_down(items + usize::from(has_next));
                    }
                }
                Vec::new()
            }
            KeyAction::PageUp => {
                self.items.page_up(self.viewport_rows);
                Vec::new()
            }
            KeyAction::PageDown => {
                let (items, has_next) = self.item_rows();
                self.items
                    .page_down(items + usize::from(has_next), self.viewport_rows);
                Vec::new()
            }
            KeyAction::Toggle => match (self.focus, selected) {
                (Focus::Tree, Some(id)) if self.state.is_expanded(&id) => vec![Msg::Collapse(id)],
                (Focus::Tree, Some(id)) => vec![Msg::Expand(id)],
                (Focus::Items, Some(id)) => {
                    let (items, has_next) = self.item_rows();
                    if self.items.on_load_more(items, has_next) {
                        vec![Msg::LoadMore(id)]
                    } else {
                        Vec::new()
                    }
                }
                _ => Vec::new(),
            },
            KeyAction::SwitchFocus => {
                self.focus = match self.focus {
                    Focus::Tree => Focus::Items,
                    Focus::Items => Focus::Tree,
                };
                Vec::new()
            }
            KeyAction::LoadMore => selected.map(Msg::LoadMore).into_iter().collect(),
            KeyAction::CycleDifficulty => {
                let next = match self.state.filters.difficulty {
                    None => Some(Difficulty::Easy),
                    Some(d) => d.next(),
                };
                vec![Msg::SetDifficulty(next)]
            }
            KeyAction::CycleSort => {
                let field = self.state.sort.field.next();
                vec![Msg::SetSort(SortSpec::new(field, field.default_order()))]
            }
            KeyAction::ToggleOrder => {
                let sort = self.state.sort;
                vec![Msg::SetSort(SortSpec::new(sort.field, sort.order.toggled()))]
            }
            KeyAction::StartSearch => {
                self.focus = Focus::Items;
                vec![Msg::SearchInput(self.state.search.input.clone())]
            }
            KeyAction::Refresh => {
                self.status_message = None;
                vec![Msg::Refresh]
            }
            KeyAction::LeaveSearch => Vec::new(),
        }
    }

    fn handle_search_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Vec<Msg> {
        let (items, has_next) = self.item_rows();

        match self.bindings.search_action(code, modifiers) {
            Some(KeyAction::LeaveSearch) => {
                self.focus = Focus::Tree;
                vec![Msg::ExitSearch]
            }
            Some(KeyAction::Quit) => {
                self.should_quit = true;
                Vec::new()
            }
            Some(KeyAction::MoveUp) => {
                self.items.move_up();
                Vec::new()
            }
            Some(KeyAction::MoveDown) => {
                self.items.move_down(items + usize::from(has_next));
                Vec::new()
            }
            Some(KeyAction::PageUp) => {
                self.items.page_up(self.viewport_rows);
                Vec::new()
            }
            Some(KeyAction::PageDown) => {
                self.items
                    .page_down(items + usize::from(has_next), self.viewport_rows);
                Vec::new()
            }
            Some(KeyAction::LoadMore) => vec![Msg::SearchLoadMore],
            Some(KeyAction::Toggle) if self.items.on_load_more(items, has_next) => {
                vec![Msg::SearchLoadMore]
            }
            Some(_) => Vec::new(),
            None => {
                let mut input = self.state.search.input.clone();
                match code {
                    KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => input.push(c),
                    KeyCode::Backspace => {
                        input.pop();
                    }
                    _ => return Vec::new(),
                }
                vec![Msg::SearchInput(input)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{update, ClientSettings};
    use practix_types::{DifficultyHistogram, SortField};
    use tokio::time::Instant;

    fn app_with_categories() -> App {
        let mut state = ClientState::new(ClientSettings::default(), None);
        state.overview.categories = ["arrays", "graphs"]
            .into_iter()
            .map(|id| Category {
                id: id.into(),
                display_name: id.to_uppercase(),
                total_item_count: 3,
                difficulty_histogram: DifficultyHistogram::default(),
                sample_items: Vec::new(),
            })
            .collect();
        App::new(state, 3)
    }

    fn apply(app: &mut App, msgs: Vec<Msg>) {
        for msg in msgs {
            let state = std::mem::take(&mut app.state);
            app.state = update(state, msg, Instant::now()).0;
        }
    }

    #[test]
    fn test_enter_toggles_selected_category() {
        let mut app = app_with_categories();
        app.handle_key(KeyCode::Down, KeyModifiers::NONE);

        let msgs = app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert!(matches!(&msgs[..], [Msg::Expand(id)] if id == "graphs"));
        apply(&mut app, msgs);

        let msgs = app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert!(matches!(&msgs[..], [Msg::Collapse(id)] if id == "graphs"));
    }

    #[test]
    fn test_filter_and_sort_keys() {
        let mut app = app_with_categories();

        let msgs = app.handle_key(KeyCode::Char('d'), KeyModifiers::NONE);
        assert!(matches!(msgs[..], [Msg::SetDifficulty(Some(Difficulty::Easy))]));
        apply(&mut app, msgs);
        app.state.filters.difficulty = Some(Difficulty::Hard);
        let msgs = app.handle_key(KeyCode::Char('d'), KeyModifiers::NONE);
        assert!(matches!(msgs[..], [Msg::SetDifficulty(None)]));

        let msgs = app.handle_key(KeyCode::Char('s'), KeyModifiers::NONE);
        assert!(matches!(&msgs[..], [Msg::SetSort(s)] if s.field == SortField::Quality.next()));
    }

    #[test]
    fn test_search_mode_collects_input() {
        let mut app = app_with_categories();
        let msgs = app.handle_key(KeyCode::Char('/'), KeyModifiers::NONE);
        apply(&mut app, msgs);
        assert!(app.state.search.active);

        for c in "hea".chars() {
            let msgs = app.handle_key(KeyCode::Char(c), KeyModifiers::NONE);
            apply(&mut app, msgs);
        }
        let msgs = app.handle_key(KeyCode::Backspace, KeyModifiers::NONE);
        assert!(matches!(&msgs[..], [Msg::SearchInput(text)] if text == "he"));

        // 'q' is text while searching
        let msgs = app.handle_key(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(!app.should_quit);
        assert_eq!(msgs.len(), 1);

        let msgs = app.handle_key(KeyCode::Esc, KeyModifiers::NONE);
        apply(&mut app, msgs);
        assert!(!app.state.search.active);
        assert_eq!(app.focus, Focus::Tree);
    }
}
