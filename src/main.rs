#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # clipdeck
//!
//! > Reorderable clipboard history for the terminal
//!
//! Browse, pin, favorite and drag clipboard entries backed by cclip.

/// Event loop
mod app;
/// CLI parser
mod cli;
/// Config file and environment overrides
mod config;
/// Item model and debug logging
mod core;
/// Pointer sensing and drag state
mod drag;
/// Backend gateways
mod gateway;
/// Keybind configuration
mod keybinds;
/// Item store
mod store;
/// Rendering, input and list virtualization
mod ui;

use app::App;
use config::ClipdeckConfig;
use crate::core::debug_logger;
use gateway::{CclipGateway, Gateway, MemoryGateway};

use std::io;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{
        DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    },
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use directories::ProjectDirs;
use eyre::{eyre, WrapErr};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use scopeguard::defer;

/// How often cclip is polled for captures made elsewhere
const CCLIP_POLL_INTERVAL: Duration = Duration::from_secs(1);

fn main() {
    if let Err(error) = real_main() {
        shutdown_terminal(false);
        eprintln!("{error:?}");
        process::exit(1);
    }
}

fn setup_terminal(disable_mouse: bool) -> eyre::Result<()> {
    enable_raw_mode().wrap_err("Failed to enable raw mode")?;
    io::stderr()
        .execute(EnterAlternateScreen)
        .wrap_err("Failed to enter alternate screen")?;
    io::stderr()
        .execute(EnableBracketedPaste)
        .wrap_err("Failed to enable bracketed paste")?;
    if !disable_mouse {
        io::stderr()
            .execute(EnableMouseCapture)
            .wrap_err("Failed to enable mouse capture")?;
    }
    Ok(())
}

fn shutdown_terminal(disable_mouse: bool) {
    if !disable_mouse {
        let _ = io::stderr().execute(DisableMouseCapture);
    }
    let _ = io::stderr().execute(DisableBracketedPaste);
    let _ = io::stderr().execute(LeaveAlternateScreen);
    let _ = disable_raw_mode();
}

fn real_main() -> eyre::Result<()> {
    let cli = cli::parse().wrap_err("Error parsing command line arguments")?;
    let config = ClipdeckConfig::new(cli.config.clone()).wrap_err("Error reading config file")?;
    let theme = config.theme().wrap_err("Error reading config file")?;

    let project_dirs = ProjectDirs::from("", "", "clipdeck")
        .ok_or_else(|| eyre!("Can't find data dir for clipdeck, is your system broken?"))?;
    let data_dir = project_dirs.data_local_dir();

    if cli.debug {
        let log_file =
            debug_logger::init_debug_log(data_dir).wrap_err("Failed to start debug log")?;
        eprintln!("Debug log: {}", log_file.display());
    }

    let rt = tokio::runtime::Runtime::new().wrap_err("Failed to start async runtime")?;
    let chosen = rt.block_on(async {
        let gateway: Arc<dyn Gateway> = if cli.demo {
            let memory = MemoryGateway::new();
            memory.seed_demo();
            Arc::new(memory)
        } else {
            if !CclipGateway::check_available().await {
                return Err(eyre!(
                    "cclip is not available. Install it or run with --demo"
                ));
            }
            Arc::new(CclipGateway::open(data_dir, CCLIP_POLL_INTERVAL)?)
        };

        let disable_mouse = config.ui.disable_mouse;
        let (mut app, events) = App::new(gateway.clone(), &config, &cli, theme);
        app.listen_external();
        match gateway.groups().await {
            Ok(groups) => app.set_groups(groups),
            Err(e) => debug_logger::log_error("list groups", &e),
        }

        setup_terminal(disable_mouse)?;
        defer! {
            shutdown_terminal(disable_mouse);
        }
        let backend = CrosstermBackend::new(io::stderr());
        let mut terminal = Terminal::new(backend).wrap_err("Failed to start crossterm terminal")?;
        terminal.hide_cursor().wrap_err("Failed to hide cursor")?;
        terminal.clear().wrap_err("Failed to clear terminal")?;

        let input = ui::InputConfig {
            disable_mouse,
            ..ui::InputConfig::default()
        }
        .init();
        let chosen = app.run(&mut terminal, input, events).await?;

        if let Some(id) = chosen {
            gateway
                .copy_to_clipboard(id)
                .await
                .wrap_err_with(|| format!("Failed to copy entry {}", id))?;
        }
        Ok::<_, eyre::Report>(chosen)
    });

    debug_logger::log_session_end();
    chosen.map(|_| ())
}
