// keybind configuration

use crossterm::event::{KeyCode, KeyModifiers};
use serde::Deserialize;

/// What a key press means to the app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    PageUp,
    PageDown,
    ScrollTop,
    End,
    Select,
    Delete,
    Pin,
    Favorite,
    MoveUp,
    MoveDown,
    Reset,
    CycleGroup,
    FavoritesOnly,
    Exit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Keybinds {
    #[serde(default = "default_up")]
    pub up: Vec<KeyBind>,
    #[serde(default = "default_down")]
    pub down: Vec<KeyBind>,
    #[serde(default = "default_page_up")]
    pub page_up: Vec<KeyBind>,
    #[serde(default = "default_page_down")]
    pub page_down: Vec<KeyBind>,
    #[serde(default = "default_scroll_top")]
    pub scroll_top: Vec<KeyBind>,
    #[serde(default = "default_end")]
    pub end: Vec<KeyBind>,
    #[serde(default = "default_select")]
    pub select: Vec<KeyBind>,
    #[serde(default = "default_delete")]
    pub delete: Vec<KeyBind>,
    #[serde(default = "default_pin")]
    pub pin: Vec<KeyBind>,
    #[serde(default = "default_favorite")]
    pub favorite: Vec<KeyBind>,
    #[serde(default = "default_move_up")]
    pub move_up: Vec<KeyBind>,
    #[serde(default = "default_move_down")]
    pub move_down: Vec<KeyBind>,
    #[serde(default = "default_reset")]
    pub reset: Vec<KeyBind>,
    #[serde(default = "default_cycle_group")]
    pub cycle_group: Vec<KeyBind>,
    #[serde(default = "default_favorites_only")]
    pub favorites_only: Vec<KeyBind>,
    #[serde(default = "default_exit")]
    pub exit: Vec<KeyBind>,
}

impl Default for Keybinds {
    fn default() -> Self {
        Self {
            up: default_up(),
            down: default_down(),
            page_up: default_page_up(),
            page_down: default_page_down(),
            scroll_top: default_scroll_top(),
            end: default_end(),
            select: default_select(),
            delete: default_delete(),
            pin: default_pin(),
            favorite: default_favorite(),
            move_up: default_move_up(),
            move_down: default_move_down(),
            reset: default_reset(),
            cycle_group: default_cycle_group(),
            favorites_only: default_favorites_only(),
            exit: default_exit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KeyBind {
    /// `"up"`, `"x"`, or `"ctrl+x"` style
    Simple(String),
    WithMod { key: String, modifiers: String },
}

impl KeyBind {
    pub fn matches(&self, code: KeyCode, mods: KeyModifiers) -> bool {
        let (key, parsed_mods) = match self {
            KeyBind::Simple(spec) => match spec.rsplit_once('+') {
                Some((modifiers, key)) if !key.is_empty() => (key, parse_modifiers(modifiers)),
                _ => (spec.as_str(), KeyModifiers::NONE),
            },
            KeyBind::WithMod { key, modifiers } => (key.as_str(), parse_modifiers(modifiers)),
        };
        let parsed = parse_key(key);
        parsed != KeyCode::Null && parsed == code && mods == parsed_mods
    }
}

fn parse_key(key: &str) -> KeyCode {
    match key.to_lowercase().as_str() {
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "pageup" | "page_up" => KeyCode::PageUp,
        "pagedown" | "page_down" => KeyCode::PageDown,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "enter" => KeyCode::Enter,
        "tab" => KeyCode::Tab,
        "delete" | "del" => KeyCode::Delete,
        "esc" | "escape" => KeyCode::Esc,
        "backspace" => KeyCode::Backspace,
        "space" => KeyCode::Char(' '),
        s if s.chars().count() == 1 => s.chars().next().map_or(KeyCode::Null, KeyCode::Char),
        _ => KeyCode::Null,
    }
}

fn parse_modifiers(mods: &str) -> KeyModifiers {
    let mut result = KeyModifiers::NONE;
    for part in mods.split('+') {
        match part.trim().to_lowercase().as_str() {
            "ctrl" | "control" => result |= KeyModifiers::CONTROL,
            "shift" => result |= KeyModifiers::SHIFT,
            "alt" => result |= KeyModifiers::ALT,
            _ => {}
        }
    }
    result
}

fn binds(specs: &[&str]) -> Vec<KeyBind> {
    specs
        .iter()
        .map(|spec| KeyBind::Simple(spec.to_string()))
        .collect()
}

fn default_up() -> Vec<KeyBind> {
    binds(&["up", "ctrl+p"])
}

fn default_down() -> Vec<KeyBind> {
    binds(&["down", "ctrl+n"])
}

fn default_page_up() -> Vec<KeyBind> {
    binds(&["pageup"])
}

fn default_page_down() -> Vec<KeyBind> {
    binds(&["pagedown"])
}

fn default_scroll_top() -> Vec<KeyBind> {
    binds(&["home"])
}

fn default_end() -> Vec<KeyBind> {
    binds(&["end"])
}

fn default_select() -> Vec<KeyBind> {
    binds(&["enter", "ctrl+y"])
}

fn default_delete() -> Vec<KeyBind> {
    binds(&["delete"])
}

fn default_pin() -> Vec<KeyBind> {
    binds(&["ctrl+space"])
}

fn default_favorite() -> Vec<KeyBind> {
    binds(&["ctrl+f"])
}

fn default_move_up() -> Vec<KeyBind> {
    binds(&["alt+up", "ctrl+k"])
}

fn default_move_down() -> Vec<KeyBind> {
    binds(&["alt+down", "ctrl+j"])
}

fn default_reset() -> Vec<KeyBind> {
    binds(&["ctrl+r"])
}

fn default_cycle_group() -> Vec<KeyBind> {
    binds(&["tab"])
}

fn default_favorites_only() -> Vec<KeyBind> {
    binds(&["alt+f"])
}

fn default_exit() -> Vec<KeyBind> {
    binds(&["esc", "ctrl+q", "ctrl+c"])
}

impl Keybinds {
    /// First action bound to the key, checked in a fixed order so that
    /// modifier bindings win over their plain counterparts
    pub fn action(&self, code: KeyCode, mods: KeyModifiers) -> Option<Action> {
        let table: [(&[KeyBind], Action); 16] = [
            (&self.move_up, Action::MoveUp),
            (&self.move_down, Action::MoveDown),
            (&self.up, Action::Up),
            (&self.down, Action::Down),
            (&self.page_up, Action::PageUp),
            (&self.page_down, Action::PageDown),
            (&self.scroll_top, Action::ScrollTop),
            (&self.end, Action::End),
            (&self.select, Action::Select),
            (&self.delete, Action::Delete),
            (&self.pin, Action::Pin),
            (&self.favorite, Action::Favorite),
            (&self.reset, Action::Reset),
            (&self.cycle_group, Action::CycleGroup),
            (&self.favorites_only, Action::FavoritesOnly),
            (&self.exit, Action::Exit),
        ];
        table
            .iter()
            .find(|(binds, _)| binds.iter().any(|kb| kb.matches(code, mods)))
            .map(|(_, action)| *action)
    }
}
