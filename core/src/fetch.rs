//! Stats download workers.
//!
//! A fixed pool of worker threads drains the request queue, resolves nicks,
//! calls the remote stats API through the rate limiter and writes results
//! into the player cache. A worker never dies on a failed fetch; it dies
//! silently when the request channel closes.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;
use tracing::{debug, warn};

use crate::controller::Controller;
use crate::player::{KnownPlayer, NickedPlayer, Player, Stats, Winstreaks};
use crate::ratelimit::RateLimiter;

/// Normalized stats payload from the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerData {
    pub username: String,
    pub uuid: String,
    pub stars: f64,
    pub fkdr: f64,
    pub wlr: f64,
    pub winstreak: Option<i64>,
}

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The identity does not exist upstream; the player is assumed nicked.
    #[error("player not found")]
    NotFound,
    /// Temporary failure; the fetch will be retried on a later cycle.
    #[error("transient fetch failure: {0}")]
    Transient(String),
    /// The API credential was rejected. Sticky until the key changes.
    #[error("invalid API credential")]
    InvalidCredential,
}

/// Remote stats API surface the workers and the controller call into.
///
/// `fetch_stats` accepts either a username or a uuid (the adapter decides
/// from the shape of the string).
pub trait StatsProvider: Send + Sync {
    fn fetch_stats(&self, identity: &str) -> Result<PlayerData, FetchError>;

    /// Resolve a username to a uuid. `Ok(None)` means the name is unknown.
    fn uuid_for(&self, username: &str) -> Result<Option<String>, FetchError>;

    /// Estimated winstreaks for a player missing exact ones. The boolean
    /// reports whether the estimates are considered accurate.
    fn estimated_winstreaks(&self, _uuid: &str) -> Option<(Winstreaks, bool)> {
        None
    }

    /// Swap the API credential used by subsequent calls.
    fn set_api_key(&self, _key: &str) {}
}

/// Spawn `count` detached fetch workers draining `requests`.
pub fn spawn_workers(
    count: usize,
    controller: &Arc<Controller>,
    limiter: &Arc<RateLimiter>,
    requests: Receiver<String>,
    completed: Sender<String>,
) {
    for _ in 0..count {
        let controller = Arc::clone(controller);
        let limiter = Arc::clone(limiter);
        let requests = requests.clone();
        let completed = completed.clone();
        thread::spawn(move || {
            while let Ok(username) = requests.recv() {
                fetch_and_cache(&controller, &limiter, &username, &completed);
            }
        });
    }
}

/// Fetch one identity, classify the result and store it.
pub fn fetch_and_cache(
    controller: &Controller,
    limiter: &RateLimiter,
    username: &str,
    completed: &Sender<String>,
) {
    let genus = controller.cache().current_genus();
    let provider = controller.provider();

    // A known nick is fetched by the real player's uuid; the nick rides
    // along so both names alias the same entry.
    let (query, nick) = match controller.denick(username) {
        Some(uuid) => {
            debug!(nick = username, uuid, "resolved nick before fetch");
            (uuid, Some(username.to_string()))
        }
        None => (username.to_string(), None),
    };

    let result = {
        let _pass = limiter.acquire();
        provider.fetch_stats(&query)
    };

    let player = match result {
        Ok(data) => Player::Known(KnownPlayer {
            username: data.username,
            uuid: data.uuid,
            nick,
            stars: data.stars,
            stats: Stats {
                fkdr: data.fkdr,
                wlr: data.wlr,
                winstreak: data.winstreak,
                winstreak_accurate: data.winstreak.is_some(),
            },
        }),
        Err(FetchError::NotFound) => Player::Nicked(NickedPlayer {
            nick: username.to_string(),
        }),
        Err(FetchError::Transient(reason)) => {
            // Drop the pending marker so the next render cycle re-requests.
            warn!(username, reason, "stats fetch failed, will retry");
            controller.cache().uncache(username);
            return;
        }
        Err(FetchError::InvalidCredential) => {
            warn!(username, "API credential rejected, dropping request");
            controller.set_api_key_invalid(true);
            return;
        }
    };

    controller.cache().set_cached(username, player.clone(), genus);
    let _ = completed.send(username.to_string());
    debug!(username, "finished getting stats");

    if let Player::Known(known) = player {
        if known.is_missing_winstreaks() {
            backfill_winstreaks(controller, &known, username, completed);
        }
    }
}

/// Fill in missing winstreaks from the provider's estimates without
/// clobbering anything exact that arrived in the meantime.
fn backfill_winstreaks(
    controller: &Controller,
    known: &KnownPlayer,
    username: &str,
    completed: &Sender<String>,
) {
    let Some((estimates, accurate)) = controller.provider().estimated_winstreaks(&known.uuid)
    else {
        debug!(username, "no winstreak estimates available");
        return;
    };

    for alias in known.aliases() {
        controller
            .cache()
            .update_cached(alias, |player| player.update_winstreaks(estimates, accurate));
    }

    let _ = completed.send(username.to_string());
    debug!(username, "updated missing winstreak");
}
