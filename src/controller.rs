//! Application controller.
//!
//! This module orchestrates the main application loop:
//! - Terminal initialization and cleanup
//! - Event polling and handling
//! - Drawing, then delivering the completions of the drawn frame
//!
//! A frame completes every chart update handed out before it was drawn.
//! Completions may hand out new updates (labels after a range sync), so
//! the loop keeps drawing without waiting for input until none is left.

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::debug;
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::event::{apply_action, handle_event, poll_event};
use crate::state::AppState;
use crate::ui::render;

/// Upper bound on frames drawn back to back for pending completions.
const MAX_SETTLE_FRAMES: usize = 8;

/// The main application controller.
pub struct App {
    /// Terminal backend
    terminal: Terminal<CrosstermBackend<Stdout>>,
    /// Application state
    state: AppState,
    /// Event poll timeout
    tick_rate: Duration,
}

impl App {
    /// Creates a new application with the given state.
    pub fn new(state: AppState) -> Result<Self> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            state,
            tick_rate: Duration::from_millis(50),
        })
    }

    /// Runs the main application loop.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.draw_until_settled()?;

            if let Some(event) = poll_event(self.tick_rate) {
                let action = handle_event(event, &self.state.mode);
                if !apply_action(&mut self.state, action) {
                    break;
                }
            }
        }

        Ok(())
    }

    fn draw_until_settled(&mut self) -> Result<()> {
        for _ in 0..MAX_SETTLE_FRAMES {
            self.terminal.draw(|frame| {
                render(frame, &self.state);
            })?;
            if !self.state.has_pending() {
                return Ok(());
            }
            self.state.settle_completions();
        }

        // Never leave the sync lock held
        if self.state.has_pending() || self.state.views.is_syncing() {
            debug!("chart updates still pending after {} frames, resetting sync", MAX_SETTLE_FRAMES);
            self.state.views.reset();
        }
        Ok(())
    }
}

impl Drop for App {
    fn drop(&mut self) {
        // Restore terminal
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Convenience function to run the application with a processed session.
pub fn run_app(state: AppState) -> Result<()> {
    let mut app = App::new(state)?;
    app.run()
}
