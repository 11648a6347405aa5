mod input;
mod navigation;
mod render;
mod virtual_list;

pub use input::{AsyncInput, Config as InputConfig, Event as InputEvent};
pub use navigation::{NavKey, NavOutcome, Navigator};
pub use render::{draw, sanitize_line, RenderedFrame, Theme, ViewModel};
pub use virtual_list::{Align, ScrollVelocity, VirtualList};
