//! Keybindings for the catalog browser
//!
//! Browse mode maps keys to [`KeyAction`]s; search mode sends printable
//! keys to the query instead and only honours the keys listed in
//! [`KeyBindings::search_action`].

use crossterm::event::{KeyCode, KeyModifiers};
use std::collections::HashMap;

/// Actions that can be triggered by keyboard shortcuts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Quit,
    MoveUp,
    MoveDown,
    PageUp,
    PageDown,
    /// Expand or collapse the selected category; load more on the last row
    Toggle,
    /// Switch focus between the category tree and the item list
    SwitchFocus,
    LoadMore,
    CycleDifficulty,
    CycleSort,
    ToggleOrder,
    StartSearch,
    LeaveSearch,
    Refresh,
}

impl KeyAction {
    pub fn description(&self) -> &'static str {
        match self {
            KeyAction::Quit => "quit",
            KeyAction::MoveUp => "up",
            KeyAction::MoveDown => "down",
            KeyAction::PageUp => "page up",
            KeyAction::PageDown => "page down",
            KeyAction::Toggle => "expand",
            KeyAction::SwitchFocus => "focus",
            KeyAction::LoadMore => "more",
            KeyAction::CycleDifficulty => "difficulty",
            KeyAction::CycleSort => "sort",
            KeyAction::ToggleOrder => "order",
            KeyAction::StartSearch => "search",
            KeyAction::LeaveSearch => "back",
            KeyAction::Refresh => "refresh",
        }
    }
}

/// Key with modifiers for lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct KeyWithMods {
    code: KeyCode,
    modifiers: KeyModifiers,
}

impl KeyWithMods {
    fn plain(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }
}

pub struct KeyBindings {
    browse: HashMap<KeyWithMods, KeyAction>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyBindings {
    pub fn new() -> Self {
        let plain = [
            (KeyCode::Char('q'), KeyAction::Quit),
            (KeyCode::Up, KeyAction::MoveUp),
            (KeyCode::Char('k'), KeyAction::MoveUp),
            (KeyCode::Down, KeyAction::MoveDown),
            (KeyCode::Char('j'), KeyAction::MoveDown),
            (KeyCode::PageUp, KeyAction::PageUp),
            (KeyCode::PageDown, KeyAction::PageDown),
            (KeyCode::Enter, KeyAction::Toggle),
            (KeyCode::Tab, KeyAction::SwitchFocus),
            (KeyCode::Left, KeyAction::SwitchFocus),
            (KeyCode::Right, KeyAction::SwitchFocus),
            (KeyCode::Char('n'), KeyAction::LoadMore),
            (KeyCode::Char('d'), KeyAction::CycleDifficulty),
            (KeyCode::Char('s'), KeyAction::CycleSort),
            (KeyCode::Char('o'), KeyAction::ToggleOrder),
            (KeyCode::Char('/'), KeyAction::StartSearch),
            (KeyCode::Char('r'), KeyAction::Refresh),
            (KeyCode::F(5), KeyAction::Refresh),
        ];

        let mut browse: HashMap<KeyWithMods, KeyAction> = plain
            .into_iter()
            .map(|(code, action)| (KeyWithMods::plain(code), action))
            .collect();
        browse.insert(
            KeyWithMods {
                code: KeyCode::Char('c'),
                modifiers: KeyModifiers::CONTROL,
            },
            KeyAction::Quit,
        );

        Self { browse }
    }

    /// Action bound to a key in browse mode
    pub fn action(&self, code: KeyCode, modifiers: KeyModifiers) -> Option<KeyAction> {
        self.browse.get(&KeyWithMods { code, modifiers }).copied()
    }

    /// Action bound to a key in search mode (printable keys are input)
    pub fn search_action(&self, code: KeyCode, modifiers: KeyModifiers) -> Option<KeyAction> {
        match (code, modifiers) {
            (KeyCode::Esc, _) => Some(KeyAction::LeaveSearch),
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(KeyAction::Quit),
            (KeyCode::Char('n'), KeyModifiers::CONTROL) => Some(KeyAction::LoadMore),
            (KeyCode::Up, _) => Some(KeyAction::MoveUp),
            (KeyCode::Down, _) => Some(KeyAction::MoveDown),
            (KeyCode::PageUp, _) => Some(KeyAction::PageUp),
            (KeyCode::PageDown, _) => Some(KeyAction::PageDown),
            (KeyCode::Enter, _) => Some(KeyAction::Toggle),
            _ => None,
        }
    }

    /// Footer hint, e.g. `[d] difficulty`
    pub fn hints(search: bool) -> &'static [(&'static str, KeyAction)] {
        if search {
            &[
                ("Esc", KeyAction::LeaveSearch),
                ("↑↓", KeyAction::MoveDown),
                ("^N", KeyAction::LoadMore),
            ]
        } else {
            &[
                ("↑↓", KeyAction::MoveDown),
                ("Enter", KeyAction::Toggle),
                ("Tab", KeyAction::SwitchFocus),
                ("n", KeyAction::LoadMore),
                ("d", KeyAction::CycleDifficulty),
                ("s", KeyAction::CycleSort),
                ("o", KeyAction::ToggleOrder),
                ("/", KeyAction::StartSearch),
                ("r", KeyAction::Refresh),
                ("q", KeyAction::Quit),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browse_bindings() {
        let bindings = KeyBindings::new();
        assert_eq!(
            bindings.action(KeyCode::Char('d'), KeyModifiers::NONE),
            Some(KeyAction::CycleDifficulty)
        );
        assert_eq!(
            bindings.action(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(KeyAction::Quit)
        );
        assert_eq!(bindings.action(KeyCode::Char('x'), KeyModifiers::NONE), None);
    }

    #[test]
    fn test_search_mode_leaves_letters_to_input() {
        let bindings = KeyBindings::new();
        assert_eq!(bindings.search_action(KeyCode::Char('q'), KeyModifiers::NONE), None);
        assert_eq!(
            bindings.search_action(KeyCode::Esc, KeyModifiers::NONE),
            Some(KeyAction::LeaveSearch)
        );
    }
}
