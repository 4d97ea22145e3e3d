//! Membership state machine.
//!
//! `process_event` is a pure transition over the current snapshot: it never
//! blocks and never calls into the network. The only side channel is a
//! requested denick assignment, which the caller executes after releasing
//! the state lock.

mod denick;

#[cfg(test)]
mod processor_tests;

use tracing::{debug, info, warn};

use crate::controller::Controller;
use crate::events::Event;
use crate::state::LobbyState;

pub use denick::autodenick_teammate;

/// A requested nick binding: `username = None` deletes the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenickRequest {
    pub username: Option<String>,
    pub nick: String,
}

/// Result of one transition.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub state: LobbyState,
    pub redraw: bool,
    pub denick: Option<DenickRequest>,
}

impl Outcome {
    fn redraw(state: LobbyState) -> Self {
        Self {
            state,
            redraw: true,
            denick: None,
        }
    }

    fn quiet(state: LobbyState) -> Self {
        Self {
            state,
            redraw: false,
            denick: None,
        }
    }

    fn with_denick(state: LobbyState, request: DenickRequest) -> Self {
        // Redraw is deferred: executing the assignment raises it.
        Self {
            state,
            redraw: false,
            denick: Some(request),
        }
    }
}

/// Advance the membership state by one event.
///
/// Caller must hold exclusive access to the state; `state` is the current
/// snapshot and the returned one replaces it wholesale.
pub fn process_event(ctx: &Controller, state: &LobbyState, event: Event) -> Outcome {
    match event {
        Event::InitializeAs { username } => {
            // Logging in again means a restart or an account switch; all
            // prior membership is stale.
            info!(username, "initialized; clearing party and lobby");
            let new_state = LobbyState {
                own_username: Some(username),
                in_queue: false,
                out_of_sync: false,
                ..state.clone()
            };
            Outcome::redraw(new_state.clear_party().clear_lobby())
        }

        Event::NewNickname { nick } => match &state.own_username {
            None => {
                warn!(nick, "own username not set; cannot record own nick");
                Outcome::quiet(state.clone())
            }
            Some(own) => {
                info!(nick, own = %own, "recording own new nickname");
                Outcome::with_denick(
                    state.clone(),
                    DenickRequest {
                        username: Some(own.clone()),
                        nick,
                    },
                )
            }
        },

        Event::LobbySwap => {
            info!("lobby swap; clearing the lobby");
            ctx.set_wants_shown(None);
            Outcome::redraw(state.clone().clear_lobby().leave_queue())
        }

        Event::LobbyList { usernames } => {
            // Authoritative roster refresh. Mid-game this only lists alive
            // players, so we also clear out-of-sync instead of getting
            // stuck with the warning for a whole game.
            info!(?usernames, "overriding lobby from roster command");
            ctx.set_wants_shown(if !state.in_queue { Some(true) } else { None });
            Outcome::redraw(state.clone().set_out_of_sync(false).set_lobby(usernames))
        }

        Event::LobbyJoin {
            username,
            player_count,
            player_cap,
        } => {
            if player_cap < 8 {
                debug!(player_cap, "gamemode too small to track; skipping");
                return Outcome::quiet(state.clone());
            }

            let mut new_state = state.clone().join_queue().add_to_lobby(&username);

            let out_of_sync = if player_count != new_state.lobby_players.len() {
                // Typically the previous lobby was never cleared; it can
                // also be a genuine tracking bug.
                debug!(
                    player_count,
                    tracked = new_state.lobby_players.len(),
                    "player count out of sync"
                );

                if player_count < new_state.lobby_players.len() {
                    // We know of too many players; only the joiner is certain.
                    debug!("too many tracked players; resetting lobby");
                    new_state = new_state.clear_lobby().add_to_lobby(&username);
                    // The reset may have brought us back in sync.
                    player_count != new_state.lobby_players.len()
                } else {
                    true
                }
            } else {
                false
            };

            info!(username, player_count, player_cap, "player joined the lobby");

            if !state.in_queue {
                // New queue: drop the user's stale show/hide preference.
                ctx.set_wants_shown(None);
            }

            Outcome::redraw(new_state.set_out_of_sync(out_of_sync))
        }

        Event::LobbyLeave { username } => {
            info!(username, "player left the lobby");
            if !state.in_queue {
                ctx.set_wants_shown(None);
            }
            Outcome::redraw(state.clone().join_queue().remove_from_lobby(&username))
        }

        Event::PartyDetach => {
            info!("left the party; clearing all members");
            Outcome::redraw(state.clone().clear_party())
        }

        Event::PartyAttach { username } => {
            info!(username, "joined a party");
            // Start from a clean party either way.
            Outcome::redraw(state.clone().clear_party().add_to_party(&username))
        }

        Event::PartyJoin { usernames } => {
            info!(?usernames, "players joined the party");
            let mut new_state = state.clone();
            for username in &usernames {
                new_state = new_state.add_to_party(username);
            }
            Outcome::redraw(new_state)
        }

        Event::PartyLeave { usernames } => {
            let own_left = state
                .own_username
                .as_ref()
                .is_some_and(|own| usernames.contains(own));
            if own_left {
                // We left: the party is gone no matter who else was listed.
                return Outcome::redraw(state.clone().clear_party());
            }

            info!(?usernames, "players left the party");
            let mut new_state = state.clone();
            for username in &usernames {
                new_state = new_state.remove_from_party(username);
            }
            Outcome::redraw(new_state)
        }

        Event::PartyListIncoming => {
            // A role-list burst follows immediately; no redraw until then.
            debug!("party list incoming; clearing party");
            Outcome::quiet(state.clone().clear_party())
        }

        Event::PartyRoleList { role, usernames } => {
            info!(role = role.as_str(), ?usernames, "adding party members from list");
            let mut new_state = state.clone();
            for username in &usernames {
                new_state = new_state.add_to_party(username);
            }
            Outcome::redraw(new_state)
        }

        Event::BedwarsGameStartingSoon { seconds } => {
            info!(seconds, "game starting soon");
            Outcome::quiet(state.clone())
        }

        Event::StartBedwarsGame => {
            info!("game starting");

            // Last chance to denick a teammate while the queue roster is
            // still intact.
            let denick = if ctx.with_settings(|settings| settings.autodenick_teammates) {
                autodenick_teammate(ctx, state)
            } else {
                None
            };

            ctx.set_wants_shown(None);
            Outcome {
                state: state.clone().leave_queue(),
                redraw: false,
                denick,
            }
        }

        Event::BedwarsFinalKill { dead_player } => {
            info!(dead_player, "final kill");
            Outcome::redraw(state.clone().mark_dead(&dead_player))
        }

        Event::BedwarsDisconnect { username } => {
            info!(username, "player disconnected");
            Outcome::redraw(state.clone().mark_dead(&username))
        }

        Event::BedwarsReconnect { username } => {
            info!(username, "player reconnected");
            Outcome::redraw(state.clone().mark_alive(&username))
        }

        Event::EndBedwarsGame => {
            info!("game ended");
            ctx.game_ended();
            Outcome::redraw(state.clone().clear_lobby())
        }

        Event::WhisperCommandSetNick { nick, username } => {
            info!(nick, username, "binding nick from whisper command");
            Outcome::with_denick(
                state.clone(),
                DenickRequest {
                    username: Some(username),
                    nick,
                },
            )
        }
    }
}
