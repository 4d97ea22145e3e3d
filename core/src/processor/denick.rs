//! Automatic denicking of a single missing teammate.
//!
//! Best-effort heuristic run right before a game starts. Every ambiguous
//! situation aborts: a false negative costs nothing, a wrong assignment
//! poisons the nick database.

use tracing::{error, info};

use crate::cache::CacheTier;
use crate::controller::Controller;
use crate::player::Player;
use crate::state::LobbyState;

use super::DenickRequest;

/// Lobby sizes considered full; a partially filled lobby means players are
/// still joining and the missing-teammate count cannot be trusted.
const FULL_LOBBY_SIZES: [usize; 3] = [8, 12, 16];

/// If exactly one teammate is absent from a full, in-sync lobby that holds
/// exactly one unresolved nick, that nick must be the teammate.
///
/// Caller must hold exclusive access to the state.
pub fn autodenick_teammate(ctx: &Controller, state: &LobbyState) -> Option<DenickRequest> {
    if ctx.api_key_invalid() || state.in_queue || state.out_of_sync {
        return None;
    }

    let mut missing = state.party_members.difference(&state.lobby_players);
    let teammate = missing.next()?;
    if missing.next().is_some() {
        return None;
    }

    info!(teammate, "attempting to autodenick teammate");

    let lobby_size = state.lobby_players.len();
    if !FULL_LOBBY_SIZES.contains(&lobby_size) {
        info!(lobby_size, "aborting autodenick: lobby not full");
        return None;
    }

    if state.lobby_players != state.alive_players {
        // Someone already died or the sets drifted apart; the missing
        // teammate can no longer be pinned down.
        error!(
            lobby = ?state.lobby_players,
            alive = ?state.alive_players,
            "aborting autodenick: lobby/alive mismatch"
        );
        return None;
    }

    let mut nicked: Option<String> = None;
    for player in &state.lobby_players {
        // The long-term tier is enough here: we only need to know whether
        // each player resolved, not how fresh their stats are.
        match ctx.cache().get_cached(player, CacheTier::LongTerm) {
            None => {
                info!(player, "aborting autodenick: stats missing");
                return None;
            }
            Some(Player::Pending(_)) => {
                info!(player, "aborting autodenick: stats pending");
                return None;
            }
            Some(Player::Known(_)) => {}
            Some(Player::Nicked(entry)) => {
                if nicked.is_some() {
                    info!(player, "aborting autodenick: multiple unresolved nicks");
                    return None;
                }
                nicked = Some(entry.nick);
            }
        }
    }

    let Some(nick) = nicked else {
        info!("aborting autodenick: no unresolved nick in the lobby");
        return None;
    };

    info!(nick, teammate, "autodenicked teammate");
    Some(DenickRequest {
        username: Some(teammate.clone()),
        nick,
    })
}
