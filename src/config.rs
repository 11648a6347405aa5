use crate::drag::PartitionPolicy;
use crate::keybinds::Keybinds;
use crate::ui::Theme;
use directories::ProjectDirs;
use ratatui::style::Color;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Error type for config loading
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Toml(e) => write!(f, "TOML parse error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid setting: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Toml(e)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClipdeckConfig {
    #[serde(flatten)]
    pub ui: UiConfig,
    #[serde(default)]
    pub list: ListConfig,
    #[serde(default)]
    pub drag: DragConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub keybinds: Keybinds,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    #[serde(default = "default_highlight_color")]
    pub highlight_color: String,
    #[serde(default = "default_white")]
    pub border_color: String,
    #[serde(default = "default_white")]
    pub text_color: String,
    #[serde(default = "default_white")]
    pub header_title_color: String,
    #[serde(default = "default_pin_color")]
    pub pin_color: String,
    #[serde(default = "default_favorite_color")]
    pub favorite_color: String,
    #[serde(default = "default_pin_icon")]
    pub pin_icon: String,
    #[serde(default = "default_favorite_icon")]
    pub favorite_icon: String,
    #[serde(default = "default_true")]
    pub rounded_borders: bool,
    #[serde(default)]
    pub disable_mouse: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            highlight_color: default_highlight_color(),
            border_color: default_white(),
            text_color: default_white(),
            header_title_color: default_white(),
            pin_color: default_pin_color(),
            favorite_color: default_favorite_color(),
            pin_icon: default_pin_icon(),
            favorite_icon: default_favorite_icon(),
            rounded_borders: true,
            disable_mouse: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListConfig {
    /// Preview lines shown per row; also drives the row height estimate
    #[serde(default = "default_max_preview_lines")]
    pub max_preview_lines: usize,
    /// Entries requested per fetch, unlimited when unset
    #[serde(default)]
    pub page_size: Option<usize>,
    /// Rows laid out beyond each edge of the viewport
    #[serde(default = "default_overscan")]
    pub overscan: usize,
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            max_preview_lines: default_max_preview_lines(),
            page_size: None,
            overscan: default_overscan(),
            search_debounce_ms: default_search_debounce_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DragConfig {
    /// Cells the pointer must travel before a press becomes a drag
    #[serde(default = "default_activation_distance")]
    pub activation_distance: u16,
    #[serde(default)]
    pub policy: PartitionPolicy,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            activation_distance: default_activation_distance(),
            policy: PartitionPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrollConfig {
    #[serde(default = "default_fast_enter")]
    pub fast_enter_rows_per_sec: f32,
    #[serde(default = "default_fast_exit")]
    pub fast_exit_rows_per_sec: f32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            fast_enter_rows_per_sec: default_fast_enter(),
            fast_exit_rows_per_sec: default_fast_exit(),
        }
    }
}

// Default value implementations for serde
fn default_true() -> bool {
    true
}
fn default_highlight_color() -> String {
    "LightBlue".to_string()
}
fn default_white() -> String {
    "White".to_string()
}
fn default_pin_color() -> String {
    "rgb(255, 165, 0)".to_string()
}
fn default_favorite_color() -> String {
    "Yellow".to_string()
}
fn default_pin_icon() -> String {
    "📌".to_string()
}
fn default_favorite_icon() -> String {
    "★".to_string()
}
fn default_max_preview_lines() -> usize {
    3
}
fn default_overscan() -> usize {
    4
}
fn default_search_debounce_ms() -> u64 {
    120
}
fn default_activation_distance() -> u16 {
    2
}
fn default_fast_enter() -> f32 {
    150.0
}
fn default_fast_exit() -> f32 {
    50.0
}

impl ClipdeckConfig {
    pub fn new(cli_config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Priority: CLI arg > XDG config dir > defaults
        let cli_provided = cli_config_path.is_some();
        let config_path = if let Some(path) = cli_config_path {
            Some(path)
        } else {
            ProjectDirs::from("", "", "clipdeck").map(|dirs| dirs.config_dir().join("config.toml"))
        };

        let mut cfg = match config_path {
            Some(ref path) if path.exists() => Self::from_toml(&fs::read_to_string(path)?)?,
            Some(ref path) if cli_provided => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Config file not found at {}", path.display()),
                )
                .into());
            }
            _ => ClipdeckConfig::default(),
        };

        // CLIPDECK_* environment overrides
        if let Ok(val) = env::var("CLIPDECK_HIGHLIGHT_COLOR") {
            cfg.ui.highlight_color = val;
        }
        if let Ok(val) = env::var("CLIPDECK_DISABLE_MOUSE") {
            cfg.ui.disable_mouse = val.parse().unwrap_or(cfg.ui.disable_mouse);
        }
        if let Ok(val) = env::var("CLIPDECK_MAX_PREVIEW_LINES") {
            cfg.list.max_preview_lines = val.parse().unwrap_or(cfg.list.max_preview_lines);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let cfg: ClipdeckConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.list.max_preview_lines == 0 {
            return Err(ConfigError::Invalid(
                "list.max_preview_lines must be at least 1".to_string(),
            ));
        }
        let scroll = &self.scroll;
        if scroll.fast_exit_rows_per_sec > scroll.fast_enter_rows_per_sec {
            return Err(ConfigError::Invalid(format!(
                "scroll.fast_exit_rows_per_sec ({}) is above fast_enter_rows_per_sec ({})",
                scroll.fast_exit_rows_per_sec, scroll.fast_enter_rows_per_sec
            )));
        }
        self.theme().map(|_| ())
    }

    /// Resolve color names into a render theme
    pub fn theme(&self) -> Result<Theme, ConfigError> {
        let color = |name: &str, value: &str| {
            parse_color(value).ok_or_else(|| {
                ConfigError::Invalid(format!("{} '{}' is not a known color", name, value))
            })
        };
        Ok(Theme {
            highlight: color("highlight_color", &self.ui.highlight_color)?,
            border: color("border_color", &self.ui.border_color)?,
            text: color("text_color", &self.ui.text_color)?,
            header_title: color("header_title_color", &self.ui.header_title_color)?,
            pin: color("pin_color", &self.ui.pin_color)?,
            favorite: color("favorite_color", &self.ui.favorite_color)?,
            pin_icon: self.ui.pin_icon.clone(),
            favorite_icon: self.ui.favorite_icon.clone(),
            rounded_borders: self.ui.rounded_borders,
        })
    }
}

/// Parses a color name, `#rrggbb`/`#rgb`, `rgb(r, g, b)` or an 8-bit index.
/// Case-insensitive.
pub fn parse_color(value: &str) -> Option<Color> {
    let value = value.trim();
    // Plain numbers are palette indices, never short hex
    if let Ok(index) = value.parse::<u8>() {
        return Some(Color::Indexed(index));
    }
    if let Some(color) = parse_hex_color(value) {
        return Some(color);
    }
    if let Some(color) = parse_rgb_color(value) {
        return Some(color);
    }
    let color = match value.to_lowercase().as_str() {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "gray" | "grey" => Color::Gray,
        "darkgray" | "darkgrey" => Color::DarkGray,
        "lightred" => Color::LightRed,
        "lightgreen" => Color::LightGreen,
        "lightyellow" => Color::LightYellow,
        "lightblue" => Color::LightBlue,
        "lightmagenta" => Color::LightMagenta,
        "lightcyan" => Color::LightCyan,
        "white" => Color::White,
        "reset" => Color::Reset,
        _ => return None,
    };
    Some(color)
}

fn parse_hex_color(value: &str) -> Option<Color> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some(Color::Rgb(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        )),
        // #RGB -> #RRGGBB
        3 => Some(Color::Rgb(
            channel(&hex[0..1].repeat(2))?,
            channel(&hex[1..2].repeat(2))?,
            channel(&hex[2..3].repeat(2))?,
        )),
        _ => None,
    }
}

fn parse_rgb_color(value: &str) -> Option<Color> {
    let inner = value
        .strip_prefix("rgb(")
        .or_else(|| value.strip_prefix('('))?
        .strip_suffix(')')?;
    let parts: Vec<u8> = inner
        .split(',')
        .map(|part| part.trim().parse::<u8>().ok())
        .collect::<Option<_>>()?;
    match parts[..] {
        [r, g, b] => Some(Color::Rgb(r, g, b)),
        _ => None,
    }
}
