//! Hypixel-backed stats provider.
//!
//! Maps the raw HTTP surface onto the core's fetch classification: missing
//! players, throttling/transport errors and rejected credentials each get
//! their own variant so the workers can react per the error taxonomy.

use std::sync::RwLock;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use spyglass_core::fetch::{FetchError, PlayerData, StatsProvider};

const MOJANG_UUID_URL: &str = "https://api.mojang.com/users/profiles/minecraft";
const HYPIXEL_PLAYER_URL: &str = "https://api.hypixel.net/v2/player";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HypixelAdapter {
    client: reqwest::blocking::Client,
    api_key: RwLock<String>,
}

impl HypixelAdapter {
    pub fn new(api_key: &str) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: RwLock::new(api_key.to_string()),
        }
    }

    fn get_player_json(&self, uuid: &str) -> Result<Value, FetchError> {
        let api_key = self.api_key.read().unwrap().clone();
        let response = self
            .client
            .get(HYPIXEL_PLAYER_URL)
            .header("API-Key", api_key)
            .query(&[("uuid", uuid)])
            .send()
            .map_err(|err| FetchError::Transient(err.to_string()))?;

        match response.status().as_u16() {
            200 => {}
            401 | 403 => return Err(FetchError::InvalidCredential),
            404 => return Err(FetchError::NotFound),
            429 => return Err(FetchError::Transient("throttled".to_string())),
            status => return Err(FetchError::Transient(format!("status {status}"))),
        }

        let body: Value = response
            .json()
            .map_err(|err| FetchError::Transient(err.to_string()))?;

        if body["player"].is_null() {
            return Err(FetchError::NotFound);
        }
        Ok(body)
    }
}

impl StatsProvider for HypixelAdapter {
    fn fetch_stats(&self, identity: &str) -> Result<PlayerData, FetchError> {
        // Identities straight from the lobby are usernames; identities from
        // the nick database are already uuids.
        let uuid = if looks_like_uuid(identity) {
            identity.to_string()
        } else {
            self.uuid_for(identity)?.ok_or(FetchError::NotFound)?
        };

        let body = self.get_player_json(&uuid)?;
        let player = &body["player"];

        let username = player["displayname"]
            .as_str()
            .unwrap_or(identity)
            .to_string();
        debug!(username, uuid, "fetched player stats");

        let bw = &player["stats"]["Bedwars"];
        if bw.is_null() {
            // Account exists but never played: all-zero stats.
            return Ok(PlayerData {
                username,
                uuid,
                stars: 0.0,
                fkdr: 0.0,
                wlr: 0.0,
                winstreak: Some(0),
            });
        }

        let final_kills = bw["final_kills_bedwars"].as_f64().unwrap_or(0.0);
        let final_deaths = bw["final_deaths_bedwars"].as_f64().unwrap_or(0.0);
        let wins = bw["wins_bedwars"].as_f64().unwrap_or(0.0);
        let games = bw["games_played_bedwars"].as_f64().unwrap_or(0.0);

        Ok(PlayerData {
            username,
            uuid,
            stars: bedwars_level_from_exp(bw["Experience"].as_i64().unwrap_or(500)),
            fkdr: div(final_kills, final_deaths),
            wlr: div(wins, games - wins),
            winstreak: bw["winstreak"].as_i64(),
        })
    }

    fn uuid_for(&self, username: &str) -> Result<Option<String>, FetchError> {
        let response = self
            .client
            .get(format!("{MOJANG_UUID_URL}/{username}"))
            .send()
            .map_err(|err| FetchError::Transient(err.to_string()))?;

        match response.status().as_u16() {
            200 => {}
            204 | 404 => return Ok(None),
            429 => return Err(FetchError::Transient("throttled".to_string())),
            status => return Err(FetchError::Transient(format!("status {status}"))),
        }

        let body: Value = response
            .json()
            .map_err(|err| FetchError::Transient(err.to_string()))?;
        Ok(body["id"].as_str().map(str::to_string))
    }

    fn set_api_key(&self, key: &str) {
        *self.api_key.write().unwrap() = key.to_string();
    }
}

fn looks_like_uuid(identity: &str) -> bool {
    let hex = identity.len() == 32 || identity.len() == 36;
    hex && identity.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

/// Ratio that treats a zero denominator as "undefeated" rather than NaN.
fn div(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else if numerator > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Star level from raw Bedwars experience.
///
/// Each prestige is 100 levels; the first four levels of a prestige are
/// discounted (500/1000/2000/3500 xp), every later level costs 5000.
fn bedwars_level_from_exp(exp: i64) -> f64 {
    const PRESTIGE_EXP: i64 = 487_000;
    const EASY_LEVEL_COSTS: [i64; 4] = [500, 1000, 2000, 3500];
    const NORMAL_LEVEL_COST: i64 = 5000;

    let exp = exp.max(0);
    let mut level = 100.0 * (exp / PRESTIGE_EXP) as f64;
    let mut remainder = exp % PRESTIGE_EXP;

    for cost in EASY_LEVEL_COSTS {
        if remainder < cost {
            return level + remainder as f64 / cost as f64;
        }
        remainder -= cost;
        level += 1.0;
    }

    level + (remainder / NORMAL_LEVEL_COST) as f64
        + (remainder % NORMAL_LEVEL_COST) as f64 / NORMAL_LEVEL_COST as f64
}
