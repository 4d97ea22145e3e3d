//! Membership snapshot for the current lobby, party and game.
//!
//! Every transition produces a fresh snapshot; nothing mutates in place.
//! The event pipeline thread is the sole writer, readers clone under the
//! controller's state lock.

use std::collections::HashSet;

/// Immutable view of "who is around me right now".
///
/// `alive_players ⊆ lobby_players` is the expected steady state, but it is
/// not enforced: a death event only shrinks the alive set, and the mismatch
/// is surfaced (out-of-sync handling, denick heuristics) rather than
/// silently repaired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LobbyState {
    pub own_username: Option<String>,
    pub party_members: HashSet<String>,
    pub lobby_players: HashSet<String>,
    pub alive_players: HashSet<String>,
    /// True once any lobby-join signal has been seen since the last reset.
    pub in_queue: bool,
    /// True when local lobby tracking disagrees with a server-reported count.
    pub out_of_sync: bool,
}

impl LobbyState {
    pub fn new(own_username: Option<String>) -> Self {
        Self {
            own_username,
            ..Self::default()
        }
    }

    // --- Queue flags ---

    pub fn join_queue(mut self) -> Self {
        self.in_queue = true;
        self
    }

    pub fn leave_queue(mut self) -> Self {
        self.in_queue = false;
        self
    }

    pub fn set_out_of_sync(mut self, out_of_sync: bool) -> Self {
        self.out_of_sync = out_of_sync;
        self
    }

    // --- Lobby membership ---

    /// Replace the lobby wholesale. The alive set follows the new roster.
    pub fn set_lobby(mut self, usernames: impl IntoIterator<Item = String>) -> Self {
        self.lobby_players = usernames.into_iter().collect();
        self.alive_players = self.lobby_players.clone();
        self
    }

    /// Add one player to the lobby and the alive set.
    pub fn add_to_lobby(mut self, username: &str) -> Self {
        if !self.lobby_players.contains(username) {
            self.lobby_players.insert(username.to_string());
            self.alive_players.insert(username.to_string());
        }
        self
    }

    pub fn remove_from_lobby(mut self, username: &str) -> Self {
        self.lobby_players.remove(username);
        self.alive_players.remove(username);
        self
    }

    pub fn clear_lobby(mut self) -> Self {
        self.lobby_players.clear();
        self.alive_players.clear();
        self
    }

    // --- Party membership ---

    pub fn add_to_party(mut self, username: &str) -> Self {
        self.party_members.insert(username.to_string());
        self
    }

    pub fn remove_from_party(mut self, username: &str) -> Self {
        self.party_members.remove(username);
        self
    }

    pub fn clear_party(mut self) -> Self {
        self.party_members.clear();
        self
    }

    // --- Life tracking ---

    /// Remove a player from the alive set only; lobby membership is kept so
    /// dead players still show on the overlay.
    pub fn mark_dead(mut self, username: &str) -> Self {
        self.alive_players.remove(username);
        self
    }

    pub fn mark_alive(mut self, username: &str) -> Self {
        self.alive_players.insert(username.to_string());
        self
    }
}
