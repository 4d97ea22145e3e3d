//! Pipeline wiring: the log-consuming thread, the fetch dispatch point and
//! the polling surface for the display driver.
//!
//! One thread consumes log lines and is the sole writer of the membership
//! state; N workers drain the fetch queue; the display driver polls from
//! its own thread. Threads are daemon-like: nothing joins them, they end
//! when their input closes or the process exits.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use spyglass_types::{InfoCell, OverlayUpdate};
use tracing::info;

use crate::controller::Controller;
use crate::events::Lexer;
use crate::fetch;
use crate::player::{Player, player_to_row, sort_players};
use crate::ratelimit::RateLimiter;

/// Consume log lines until the source ends, updating the membership state
/// and raising the redraw signal for transitions that need one.
pub fn run_event_pipeline(
    controller: &Controller,
    lexer: &impl Lexer,
    lines: impl Iterator<Item = String>,
) {
    for line in lines {
        let Some(event) = lexer.parse_line(&line) else {
            continue;
        };
        if controller.handle_event(event) {
            controller.redraw().raise();
        }
    }
    info!("log line source ended; event pipeline stopping");
}

/// Replay historical log lines without any redraw signaling. Used at
/// startup to catch the state up with an existing logfile.
pub fn fast_forward(
    controller: &Controller,
    lexer: &impl Lexer,
    lines: impl Iterator<Item = String>,
) {
    info!("fast forwarding state");
    for line in lines {
        let Some(event) = lexer.parse_line(&line) else {
            continue;
        };
        controller.handle_event(event);
    }
    info!("done fast forwarding state");
}

/// Did anything change since the last poll?
///
/// True when a transition raised the redraw signal, or when a completed
/// stats fetch belongs to a player still in the lobby. Always drains the
/// completion queue.
pub fn should_redraw(controller: &Controller, completed: &Receiver<String>) -> bool {
    let mut redraw = controller.redraw().take();

    while let Ok(username) = completed.try_recv() {
        if !redraw {
            redraw = controller.with_state(|state| state.lobby_players.contains(&username));
        }
    }

    redraw
}

/// Poll entry point for the display driver.
///
/// `rows` is `None` when nothing changed since the last poll. When rows are
/// produced, every lobby member without cached stats gets exactly one fetch
/// dispatched; the pending marker dedupes retries.
pub fn poll_update(
    controller: &Controller,
    requests: &Sender<String>,
    completed: &Receiver<String>,
) -> OverlayUpdate {
    let redraw = should_redraw(controller, completed);
    let column = controller.with_settings(|settings| settings.sort_column);

    controller.with_state(|state| {
        let rows = redraw.then(|| {
            // Dispatch point. Runs under the state lock, which keeps the
            // lock order (state before cache) identical to the denick path.
            let mut players: Vec<Player> = state
                .lobby_players
                .iter()
                .map(|username| {
                    let (player, newly_pending) = controller.cache().lookup_or_pending(username);
                    if newly_pending {
                        let _ = requests.send(username.clone());
                    }
                    player
                })
                .collect();

            sort_players(&mut players, &state.party_members, column);
            players
                .iter()
                .map(|player| player_to_row(player, &state.party_members))
                .collect()
        });

        let mut info_cells = Vec::new();
        if state.out_of_sync {
            info_cells.push(InfoCell::warning(
                "Lobby out of sync. Type /who to refresh.",
            ));
        }
        if controller.api_key_invalid() {
            info_cells.push(InfoCell::error(
                "Invalid API key. Update it in the settings.",
            ));
        }

        OverlayUpdate {
            in_queue: state.in_queue,
            info_cells,
            rows,
        }
    })
}

/// Running pipeline: the spawned threads plus the queues that feed them.
pub struct OverlayService {
    controller: Arc<Controller>,
    requests_tx: Sender<String>,
    completed_rx: Receiver<String>,
}

impl OverlayService {
    /// Spawn the fetch workers and the log-consuming thread.
    pub fn start<L, I>(controller: Arc<Controller>, lexer: L, lines: I) -> Self
    where
        L: Lexer + Send + 'static,
        I: Iterator<Item = String> + Send + 'static,
    {
        let (worker_count, rate_limit, rate_window) = controller.with_settings(|settings| {
            (
                settings.worker_count,
                settings.rate_limit,
                Duration::from_secs(settings.rate_window_secs),
            )
        });

        let limiter = Arc::new(RateLimiter::new(rate_limit, rate_window));
        let (requests_tx, requests_rx) = unbounded();
        let (completed_tx, completed_rx) = unbounded();

        fetch::spawn_workers(worker_count, &controller, &limiter, requests_rx, completed_tx);

        {
            let controller = Arc::clone(&controller);
            thread::spawn(move || run_event_pipeline(&controller, &lexer, lines));
        }

        Self {
            controller,
            requests_tx,
            completed_rx,
        }
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    /// Display driver entry point; see [`poll_update`].
    pub fn poll(&self) -> OverlayUpdate {
        poll_update(&self.controller, &self.requests_tx, &self.completed_rx)
    }
}
