//! practix-tui - terminal catalog browser using Ratatui
//!
//! The client keeps its data in [`state::ClientState`], changed only by the
//! pure reducer [`state::update`]. Fetches and timers run on the
//! [`Runtime`], which talks to the catalog through a [`CatalogClient`]:
//! either a [`QueryService`](practix_core::QueryService) in the same process
//! or a `practix serve` instance over HTTP.

pub mod app;
pub mod client;
pub mod components;
pub mod empty_state;
pub mod keybindings;
pub mod runtime;
pub mod state;
pub mod theme;
pub mod ui;

pub use app::App;
pub use client::{CatalogClient, HttpCatalogClient, LocalCatalogClient};
pub use runtime::Runtime;
pub use state::{ClientSettings, ClientState, Msg};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use practix_core::config::ClientConfig;
use practix_types::UserId;
use ratatui::prelude::*;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Run the TUI application
pub async fn run(
    client: Arc<dyn CatalogClient>,
    config: ClientConfig,
    user: Option<UserId>,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let state = ClientState::new(ClientSettings::from(&config), user);
    let mut app = App::new(state, config.overscan_rows);
    let mut runtime = Runtime::new(client);
    app.dispatch(&runtime, Msg::LoadOverview);

    let result = run_loop(&mut terminal, &mut app, &mut runtime);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("TUI closed");
    result
}

fn run_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runtime: &mut Runtime,
) -> Result<()>
where
    <B as Backend>::Error: Send + Sync + 'static,
{
    loop {
        app.drain(runtime);

        terminal.draw(|f| ui::render(f, app))?;

        // Short poll so fetch results show up without a key press
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    for msg in app.handle_key(key.code, key.modifiers) {
                        app.dispatch(runtime, msg);
                    }
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
