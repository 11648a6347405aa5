//! Async terminal input
//!
//! Reads crossterm's EventStream on a tokio task and forwards key presses,
//! mouse events and periodic tick/render events over a channel.

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind, MouseEvent};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;

/// Builder for `AsyncInput`
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub tick_rate: Duration,
    pub frame_rate: Duration,
    pub disable_mouse: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_rate: Duration::from_millis(50),
            frame_rate: Duration::from_millis(16), // ~60 FPS
            disable_mouse: false,
        }
    }
}

impl Config {
    pub fn init(self) -> AsyncInput {
        AsyncInput::with_config(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Paste(String),
    Resize,
    Tick,
    Render,
}

pub struct AsyncInput {
    rx: mpsc::UnboundedReceiver<Event>,
    task: tokio::task::JoinHandle<()>,
}

impl AsyncInput {
    pub fn with_config(config: Config) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            let mut reader = EventStream::new();
            let mut tick_interval = interval(config.tick_rate);
            let mut render_interval = interval(config.frame_rate);

            loop {
                tokio::select! {
                    maybe_event = reader.next() => {
                        let event = match maybe_event {
                            Some(Ok(event)) => event,
                            // Read error or closed stream
                            Some(Err(_)) | None => return,
                        };
                        let forwarded = match event {
                            // Press only, some terminals also report releases
                            CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => {
                                Some(Event::Key(key))
                            }
                            CrosstermEvent::Mouse(mouse) if !config.disable_mouse => {
                                Some(Event::Mouse(mouse))
                            }
                            CrosstermEvent::Paste(text) => Some(Event::Paste(text)),
                            CrosstermEvent::Resize(_, _) => Some(Event::Resize),
                            _ => None,
                        };
                        if let Some(event) = forwarded {
                            if tx.send(event).is_err() {
                                return;
                            }
                        }
                    }
                    _ = tick_interval.tick() => {
                        if tx.send(Event::Tick).is_err() {
                            return;
                        }
                    }
                    _ = render_interval.tick() => {
                        if tx.send(Event::Render).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Self { rx, task }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Drop for AsyncInput {
    fn drop(&mut self) {
        self.task.abort();
    }
}
