//! Shared-state owner and lock hierarchy.
//!
//! Every piece of cross-thread state lives here, behind private fields.
//! Compound operations acquire locks in one fixed order:
//!
//!   state → settings → nick database → player cache
//!
//! Only already-ordered operations are exposed, so no caller can build a
//! cycle out of the individual locks.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::cache::{CacheTier, PlayerCache};
use crate::events::Event;
use crate::fetch::StatsProvider;
use crate::nicks::NickDatabase;
use crate::player::Player;
use crate::processor::process_event;
use crate::settings::{KnownNick, Settings};
use crate::state::LobbyState;

/// Level-triggered "something changed" flag. Multiple pending reasons
/// collapse into one signal; `take` observes and clears it.
#[derive(Default)]
pub struct RedrawSignal(AtomicBool);

impl RedrawSignal {
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type PersistFn = Box<dyn Fn(&Settings) + Send + Sync>;

pub struct Controller {
    state: Mutex<LobbyState>,
    settings: Mutex<Settings>,
    nicks: Mutex<NickDatabase>,
    cache: PlayerCache,
    provider: Arc<dyn StatsProvider>,
    redraw: RedrawSignal,
    /// Sticky flag set by workers when the credential is rejected. Cleared
    /// only by an API key change.
    api_key_invalid: AtomicBool,
    /// Tri-state overlay preference: the user forced it shown/hidden, or
    /// `None` for "follow the default".
    wants_shown: Mutex<Option<bool>>,
    persist: PersistFn,
}

impl Controller {
    pub fn new(settings: Settings, nicks: NickDatabase, provider: Arc<dyn StatsProvider>) -> Self {
        Self {
            state: Mutex::new(LobbyState::default()),
            settings: Mutex::new(settings),
            nicks: Mutex::new(nicks),
            cache: PlayerCache::new(),
            provider,
            redraw: RedrawSignal::default(),
            api_key_invalid: AtomicBool::new(false),
            wants_shown: Mutex::new(None),
            persist: Box::new(|_| {}),
        }
    }

    /// Install the settings persistence hook (the host's flush-to-disk).
    pub fn on_settings_change(mut self, persist: impl Fn(&Settings) + Send + Sync + 'static) -> Self {
        self.persist = Box::new(persist);
        self
    }

    // --- Accessors ---

    pub fn with_state<R>(&self, f: impl FnOnce(&LobbyState) -> R) -> R {
        f(&self.state.lock().unwrap())
    }

    pub fn state_snapshot(&self) -> LobbyState {
        self.state.lock().unwrap().clone()
    }

    pub fn with_settings<R>(&self, f: impl FnOnce(&Settings) -> R) -> R {
        f(&self.settings.lock().unwrap())
    }

    pub fn cache(&self) -> &PlayerCache {
        &self.cache
    }

    pub fn provider(&self) -> &Arc<dyn StatsProvider> {
        &self.provider
    }

    pub fn redraw(&self) -> &RedrawSignal {
        &self.redraw
    }

    pub fn api_key_invalid(&self) -> bool {
        self.api_key_invalid.load(Ordering::SeqCst)
    }

    pub fn set_api_key_invalid(&self, invalid: bool) {
        self.api_key_invalid.store(invalid, Ordering::SeqCst);
    }

    pub fn wants_shown(&self) -> Option<bool> {
        *self.wants_shown.lock().unwrap()
    }

    pub fn set_wants_shown(&self, preference: Option<bool>) {
        *self.wants_shown.lock().unwrap() = preference;
    }

    /// Resolve a nick to a uuid through the nick database.
    pub fn denick(&self, nick: &str) -> Option<String> {
        self.nicks.lock().unwrap().denick(nick).map(str::to_string)
    }

    // --- Event entry point ---

    /// Apply one event to the membership state. Returns whether the display
    /// needs a redraw. The state lock is held only for the transition; any
    /// requested denick assignment runs after it is released.
    pub fn handle_event(&self, event: Event) -> bool {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            let outcome = process_event(self, &state, event);
            *state = outcome.state.clone();
            outcome
        };

        if let Some(request) = &outcome.denick {
            self.set_nickname(request.username.as_deref(), &request.nick);
        }
        outcome.redraw
    }

    // --- Compound operations ---

    /// Bind `nick` to `username` (or delete the binding when `username` is
    /// `None`): updates the persisted known-nick table and the default nick
    /// database, evicts the affected cache entries and requests a redraw.
    pub fn set_nickname(&self, username: Option<&str>, nick: &str) {
        debug!(nick, ?username, "setting denick entry");

        let uuid = username.and_then(|name| self.resolve_uuid(name));
        // With no uuid to bind, the existing entry for this nick is deleted.
        let mut old_nick = if uuid.is_none() {
            Some(nick.to_string())
        } else {
            None
        };

        {
            let mut settings = self.settings.lock().unwrap();

            let new_value = if let (Some(uuid), Some(username)) = (uuid.as_deref(), username) {
                // Reassignment: if this uuid already has a nick bound, move
                // that entry (keeping its comment) instead of duplicating it.
                match settings
                    .known_nicks
                    .iter()
                    .find(|(_, value)| value.uuid == uuid)
                    .map(|(known_nick, value)| (known_nick.clone(), value.clone()))
                {
                    Some((known_nick, value)) => {
                        old_nick = Some(known_nick);
                        Some(value)
                    }
                    None => {
                        old_nick = None;
                        Some(KnownNick {
                            uuid: uuid.to_string(),
                            comment: username.to_string(),
                        })
                    }
                }
            } else {
                None
            };

            if let Some(old) = &old_nick {
                settings.known_nicks.remove(old);
            }
            if let Some(value) = new_value {
                settings.known_nicks.insert(nick.to_string(), value);
            }
            (self.persist)(&settings);
        }

        {
            let mut nicks = self.nicks.lock().unwrap();
            if let Some(old) = &old_nick {
                nicks.remove_default(old);
            }
            if let Some(uuid) = &uuid {
                nicks.insert_default(nick, uuid);
            }
        }

        // Drop stats cached under the old and the new nick so both refetch.
        if let Some(old) = &old_nick {
            self.cache.uncache(old);
        }
        self.cache.uncache(nick);

        self.redraw.raise();
    }

    /// Rotate the API credential: resets the sticky invalid flag and clears
    /// the whole cache in case the old key poisoned it.
    pub fn set_api_key(&self, new_key: &str) {
        self.provider.set_api_key(new_key);
        self.set_api_key_invalid(false);

        {
            let mut settings = self.settings.lock().unwrap();
            settings.api_key = new_key.to_string();
            (self.persist)(&settings);
        }

        self.cache.clear(false);
    }

    /// Replace the settings wholesale, applying the required side effects
    /// for everything that changed.
    pub fn update_settings(&self, new: Settings) {
        debug!("updating settings");

        let mut settings = self.settings.lock().unwrap();

        let api_key_changed = new.api_key != settings.api_key;

        let added: Vec<String> = new
            .known_nicks
            .keys()
            .filter(|nick| !settings.known_nicks.contains_key(*nick))
            .cloned()
            .collect();
        let removed: Vec<String> = settings
            .known_nicks
            .keys()
            .filter(|nick| !new.known_nicks.contains_key(*nick))
            .cloned()
            .collect();
        let updated: Vec<String> = new
            .known_nicks
            .iter()
            .filter(|(nick, value)| {
                settings
                    .known_nicks
                    .get(*nick)
                    .is_some_and(|old| old != *value)
            })
            .map(|(nick, _)| nick.clone())
            .collect();

        if api_key_changed {
            debug!("clearing whole player cache due to API key change");
            self.provider.set_api_key(&new.api_key);
            self.set_api_key_invalid(false);
            self.cache.clear(false);
        } else {
            // Refetch stats for nicks whose binding changed in any way.
            for nick in added.iter().chain(removed.iter()).chain(updated.iter()) {
                self.cache.uncache(nick);
            }
        }

        {
            let mut nicks = self.nicks.lock().unwrap();
            for nick in &removed {
                nicks.remove_default(nick);
            }
            for nick in added.iter().chain(updated.iter()) {
                nicks.insert_default(nick, &new.known_nicks[nick].uuid);
            }
        }

        *settings = new;
        (self.persist)(&settings);

        self.redraw.raise();
    }

    /// Game-end bookkeeping: stats will have changed, so the render-cycle
    /// tier is flushed, and any not-yet-persisted settings are written out.
    pub fn game_ended(&self) {
        self.cache.clear(true);
        let settings = self.settings.lock().unwrap();
        (self.persist)(&settings);
    }

    /// Uuid for a username: the long-term cache first, the provider second.
    fn resolve_uuid(&self, username: &str) -> Option<String> {
        if let Some(Player::Known(known)) = self.cache.get_cached(username, CacheTier::LongTerm) {
            if known.username == username {
                return Some(known.uuid);
            }
        }

        match self.provider.uuid_for(username) {
            Ok(Some(uuid)) => Some(uuid),
            Ok(None) => {
                error!(username, "no uuid found when setting nickname");
                None
            }
            Err(err) => {
                warn!(username, %err, "uuid lookup failed when setting nickname");
                None
            }
        }
    }
}
