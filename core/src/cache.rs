//! Thread-safe stats cache with a short-term and a long-term tier.
//!
//! The short-term tier feeds the render cycle and is flushed when a game
//! ends; the long-term tier backs heuristics (autodenick) that tolerate
//! staler data. Both tiers are written together and invalidated together.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use tracing::{error, warn};

use crate::player::{KnownPlayer, PendingPlayer, Player};

const SHORT_TERM_TTL: Duration = Duration::from_secs(10 * 60);
const LONG_TERM_TTL: Duration = Duration::from_secs(60 * 60);
const MAX_ENTRIES: usize = 512;

/// Which tier to read. Writes always hit both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    ShortTerm,
    LongTerm,
}

#[derive(Debug, Clone)]
struct Entry {
    player: Player,
    expires_at: Instant,
}

#[derive(Default)]
struct Tiers {
    /// Cache genus. Stores tagged with an older genus are discarded, so a
    /// worker that fetched under a stale API key cannot repopulate a
    /// cleared cache.
    genus: u64,
    short_term: HashMap<String, Entry>,
    long_term: HashMap<String, Entry>,
}

impl Tiers {
    fn store(&mut self, username: &str, player: Player, now: Instant) {
        if self.short_term.len() >= MAX_ENTRIES {
            self.short_term.retain(|_, entry| entry.expires_at > now);
        }
        if self.long_term.len() >= MAX_ENTRIES {
            self.long_term.retain(|_, entry| entry.expires_at > now);
        }
        self.short_term.insert(
            username.to_string(),
            Entry {
                player: player.clone(),
                expires_at: now + SHORT_TERM_TTL,
            },
        );
        self.long_term.insert(
            username.to_string(),
            Entry {
                player,
                expires_at: now + LONG_TERM_TTL,
            },
        );
    }

    fn get(&mut self, username: &str, tier: CacheTier, now: Instant) -> Option<Player> {
        let map = match tier {
            CacheTier::ShortTerm => &mut self.short_term,
            CacheTier::LongTerm => &mut self.long_term,
        };
        match map.get(username) {
            Some(entry) if entry.expires_at > now => Some(entry.player.clone()),
            Some(_) => {
                map.remove(username);
                None
            }
            None => None,
        }
    }
}

/// Maps an identity string (username or nick) to its latest known stats.
///
/// All operations are safe from any thread; no caller can observe a
/// half-updated entry.
#[derive(Default)]
pub struct PlayerCache {
    tiers: Mutex<Tiers>,
}

impl PlayerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Genus to tag in-flight fetches with; see [`PlayerCache::set_cached`].
    pub fn current_genus(&self) -> u64 {
        self.tiers.lock().unwrap().genus
    }

    /// Mark an identity as in-flight and return the placeholder.
    ///
    /// Callers that race a lookup against this must use
    /// [`PlayerCache::lookup_or_pending`] instead; calling this on a
    /// populated entry indicates a dispatch bug and is logged.
    pub fn set_pending(&self, username: &str) -> PendingPlayer {
        let pending = PendingPlayer {
            username: username.to_string(),
        };

        let mut tiers = self.tiers.lock().unwrap();
        if tiers.short_term.contains_key(username) {
            error!(username, "player set to pending, but already cached");
        }
        tiers.store(username, Player::Pending(pending.clone()), Instant::now());
        pending
    }

    /// Cached entry for the identity, or the pending placeholder if there is
    /// none yet. The boolean is true when the placeholder was newly created,
    /// i.e. exactly one racing caller is told to dispatch a fetch.
    pub fn lookup_or_pending(&self, username: &str) -> (Player, bool) {
        let now = Instant::now();
        let mut tiers = self.tiers.lock().unwrap();
        if let Some(player) = tiers.get(username, CacheTier::ShortTerm, now) {
            return (player, false);
        }
        let pending = PendingPlayer {
            username: username.to_string(),
        };
        tiers.store(username, Player::Pending(pending.clone()), now);
        (Player::Pending(pending), true)
    }

    /// Store a fetched result, replacing the pending placeholder.
    ///
    /// `genus` must be the value of [`PlayerCache::current_genus`] from when
    /// the fetch began; stale stores are dropped.
    pub fn set_cached(&self, username: &str, player: Player, genus: u64) {
        let mut tiers = self.tiers.lock().unwrap();
        if genus != tiers.genus {
            warn!(
                username,
                genus,
                current = tiers.genus,
                "discarding stats fetched under an old cache genus"
            );
            return;
        }
        tiers.store(username, player, Instant::now());
    }

    pub fn get_cached(&self, username: &str, tier: CacheTier) -> Option<Player> {
        self.tiers.lock().unwrap().get(username, tier, Instant::now())
    }

    /// Apply a functional update to a known player. Pending and nicked
    /// entries are left alone.
    pub fn update_cached(&self, username: &str, update: impl FnOnce(KnownPlayer) -> KnownPlayer) {
        let mut tiers = self.tiers.lock().unwrap();
        let Some(entry) = tiers.short_term.get(username) else {
            warn!(username, "player not found during update");
            return;
        };
        let Player::Known(known) = entry.player.clone() else {
            warn!(username, "skipping update of a non-resolved player");
            return;
        };
        let updated = Player::Known(update(known));
        tiers.store(username, updated, Instant::now());
    }

    /// Drop the entry for `username` from both tiers.
    pub fn uncache(&self, username: &str) {
        let mut tiers = self.tiers.lock().unwrap();
        tiers.short_term.remove(username);
        tiers.long_term.remove(username);
    }

    /// Drop everything and start a new genus. `short_term_only` keeps the
    /// long-term tier (used at game end, where stats are stale but the
    /// nick/known distinction is not).
    pub fn clear(&self, short_term_only: bool) {
        let mut tiers = self.tiers.lock().unwrap();
        tiers.genus += 1;
        tiers.short_term.clear();
        if !short_term_only {
            tiers.long_term.clear();
        }
    }
}
