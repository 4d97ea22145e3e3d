//! Player model and lobby ordering.
//!
//! A cache entry is always one of three closed variants: stats are known,
//! the identity is an unresolved nick, or a fetch is still in flight.
//! Entries are replaced, never mutated, so snapshots stay race-free.

use std::collections::HashSet;

use spyglass_types::{OverlayRow, SortColumn, formatting};

/// Stat collection for a resolved player.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub fkdr: f64,
    pub wlr: f64,
    pub winstreak: Option<i64>,
    pub winstreak_accurate: bool,
}

impl Stats {
    /// Fill in a missing winstreak. Accurate values are never overwritten.
    pub fn update_winstreak(self, winstreak: Option<i64>, accurate: bool) -> Self {
        if self.winstreak_accurate || self.winstreak.is_some() {
            return self;
        }
        Self {
            winstreak,
            winstreak_accurate: accurate,
            ..self
        }
    }
}

/// Per-gamemode winstreak estimates from the stats provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Winstreaks {
    pub overall: Option<i64>,
    pub solo: Option<i64>,
    pub doubles: Option<i64>,
    pub threes: Option<i64>,
    pub fours: Option<i64>,
}

/// A player whose stats were fetched successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownPlayer {
    pub username: String,
    pub uuid: String,
    /// The nick this player was resolved from, if any.
    pub nick: Option<String>,
    pub stars: f64,
    pub stats: Stats,
}

impl KnownPlayer {
    pub fn is_missing_winstreaks(&self) -> bool {
        self.stats.winstreak.is_none()
    }

    /// Names this player is cached under.
    pub fn aliases(&self) -> Vec<&str> {
        let mut aliases = vec![self.username.as_str()];
        if let Some(nick) = &self.nick {
            aliases.push(nick.as_str());
        }
        aliases
    }

    pub fn update_winstreaks(self, winstreaks: Winstreaks, accurate: bool) -> Self {
        Self {
            stats: self.stats.update_winstreak(winstreaks.overall, accurate),
            ..self
        }
    }
}

/// An identity known only as an opaque nickname. Stats intentionally hidden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NickedPlayer {
    pub nick: String,
}

/// A fetch has been dispatched for this identity; no data yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPlayer {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Player {
    Known(KnownPlayer),
    Nicked(NickedPlayer),
    Pending(PendingPlayer),
}

impl Player {
    /// Display name; for nicked players this is the nick itself.
    pub fn username(&self) -> &str {
        match self {
            Player::Known(p) => &p.username,
            Player::Nicked(p) => &p.nick,
            Player::Pending(p) => &p.username,
        }
    }

    pub fn stats_hidden(&self) -> bool {
        matches!(self, Player::Nicked(_))
    }
}

/// Stat used for ordering. Unresolved and pending players sort below every
/// resolved one; a missing winstreak sorts as "unbeatable" so it surfaces.
fn sort_stat(player: &Player, column: SortColumn) -> f64 {
    let Player::Known(known) = player else {
        return if column == SortColumn::Username {
            0.0
        } else {
            f64::NEG_INFINITY
        };
    };

    match column {
        SortColumn::Username => 0.0,
        SortColumn::Stars => known.stars,
        SortColumn::Fkdr => known.stats.fkdr,
        SortColumn::Wlr => known.stats.wlr,
        SortColumn::Winstreak => known
            .stats
            .winstreak
            .map(|ws| ws as f64)
            .unwrap_or(f64::INFINITY),
    }
}

/// Sort key: enemies before party members, hidden stats before visible ones
/// within each group, then the chosen stat, all compared descending.
fn rate_player(player: &Player, party_members: &HashSet<String>, column: SortColumn) -> (bool, bool, f64) {
    let is_enemy = !party_members.contains(player.username());
    (is_enemy, player.stats_hidden(), sort_stat(player, column))
}

/// Order players for display: by the sort key descending, ties broken by
/// username ascending. Party members always end up after non-members.
pub fn sort_players(players: &mut [Player], party_members: &HashSet<String>, column: SortColumn) {
    players.sort_by(|a, b| {
        let (a_enemy, a_hidden, a_stat) = rate_player(a, party_members, column);
        let (b_enemy, b_hidden, b_stat) = rate_player(b, party_members, column);
        b_enemy
            .cmp(&a_enemy)
            .then(b_hidden.cmp(&a_hidden))
            .then(b_stat.total_cmp(&a_stat))
            .then_with(|| a.username().cmp(b.username()))
    });
}

/// Render one player into pre-formatted display cells.
pub fn player_to_row(player: &Player, party_members: &HashSet<String>) -> OverlayRow {
    let is_party = party_members.contains(player.username());
    match player {
        Player::Known(known) => OverlayRow {
            username: known.username.clone(),
            stars: formatting::format_stars(known.stars),
            fkdr: formatting::format_ratio(known.stats.fkdr),
            wlr: formatting::format_ratio(known.stats.wlr),
            winstreak: formatting::format_winstreak(
                known.stats.winstreak,
                known.stats.winstreak_accurate,
            ),
            is_party,
            stats_hidden: false,
        },
        Player::Nicked(nicked) => OverlayRow {
            username: nicked.nick.clone(),
            stars: formatting::hidden_cell(),
            fkdr: formatting::hidden_cell(),
            wlr: formatting::hidden_cell(),
            winstreak: formatting::hidden_cell(),
            is_party,
            stats_hidden: true,
        },
        Player::Pending(pending) => OverlayRow {
            username: pending.username.clone(),
            stars: formatting::hidden_cell(),
            fkdr: formatting::hidden_cell(),
            wlr: formatting::hidden_cell(),
            winstreak: formatting::hidden_cell(),
            is_party,
            stats_hidden: false,
        },
    }
}
