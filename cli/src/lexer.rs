//! Chat lexer: raw client log lines to structural events.
//!
//! Lines look like `[12:34:56] [Client thread/INFO]: [CHAT] <message>`,
//! with optional `§x` color codes sprinkled through the message. Anything
//! that matches no pattern is `None`; the pipeline skips it silently.

use memchr::memmem;

use spyglass_core::events::{Event, PartyRole};

const CHAT_MARKER: &[u8] = b"[CHAT] ";
const SETTING_USER: &str = "Setting user: ";

/// Parse one raw log line. Pure and stateless.
pub fn parse_line(line: &str) -> Option<Event> {
    // The launcher reports the account outside the chat stream.
    if let Some(idx) = memmem::find(line.as_bytes(), SETTING_USER.as_bytes()) {
        let username = line[idx + SETTING_USER.len()..].trim();
        if !username.is_empty() {
            return Some(Event::InitializeAs {
                username: username.to_string(),
            });
        }
        return None;
    }

    let idx = memmem::find(line.as_bytes(), CHAT_MARKER)?;
    let message = strip_color_codes(line[idx + CHAT_MARKER.len()..].trim_end());

    parse_chat(&message)
}

fn parse_chat(message: &str) -> Option<Event> {
    if let Some(rest) = message.strip_prefix("ONLINE: ") {
        return Some(Event::LobbyList {
            usernames: split_names(rest),
        });
    }

    if message.starts_with("Sending you to ") {
        return Some(Event::LobbySwap);
    }

    // "<name> has joined (5/16)!"
    if let Some((left, counts)) = split_suffix_once(message, " has joined (", ")!") {
        let (count, cap) = counts.split_once('/')?;
        return Some(Event::LobbyJoin {
            username: strip_rank(left).to_string(),
            player_count: count.parse().ok()?,
            player_cap: cap.parse().ok()?,
        });
    }

    if let Some(left) = message.strip_suffix(" has quit!") {
        return Some(Event::LobbyLeave {
            username: strip_rank(left).to_string(),
        });
    }

    if message == "You left the party."
        || message == "You are not currently in a party."
        || message.starts_with("The party was disbanded")
    {
        return Some(Event::PartyDetach);
    }

    // "You have joined [MVP+] Somebody's party!"
    if let Some(left) = message.strip_prefix("You have joined ") {
        let left = left.strip_suffix("'s party!")?;
        return Some(Event::PartyAttach {
            username: strip_rank(left).to_string(),
        });
    }

    if let Some(left) = message.strip_suffix(" joined the party.") {
        return Some(Event::PartyJoin {
            usernames: vec![strip_rank(left).to_string()],
        });
    }

    if let Some(left) = message.strip_suffix(" left the party.") {
        return Some(Event::PartyLeave {
            usernames: vec![strip_rank(left).to_string()],
        });
    }

    if let Some(left) = message.strip_suffix(" has been removed from the party.") {
        return Some(Event::PartyLeave {
            usernames: vec![strip_rank(left).to_string()],
        });
    }

    if message.starts_with("Party Members (") {
        return Some(Event::PartyListIncoming);
    }

    for (prefix, role) in [
        ("Party Leader: ", PartyRole::Leader),
        ("Party Moderators: ", PartyRole::Moderator),
        ("Party Members: ", PartyRole::Member),
    ] {
        if let Some(rest) = message.strip_prefix(prefix) {
            // Online markers (trailing bullets) ride along with each name.
            let usernames = rest
                .split(" ● ")
                .map(|chunk| strip_rank(chunk.trim_end_matches(['●', ' '])).to_string())
                .filter(|name| !name.is_empty())
                .collect();
            return Some(Event::PartyRoleList { role, usernames });
        }
    }

    // "The game starts in 5 seconds!"
    if let Some(rest) = message.strip_prefix("The game starts in ") {
        let seconds = rest
            .strip_suffix(" seconds!")
            .or_else(|| rest.strip_suffix(" second!"))?;
        return Some(Event::BedwarsGameStartingSoon {
            seconds: seconds.parse().ok()?,
        });
    }

    // The game-start banner body.
    if message
        .trim_start()
        .starts_with("Protect your bed and destroy the enemy beds.")
    {
        return Some(Event::StartBedwarsGame);
    }

    if message.ends_with("FINAL KILL!") {
        // "<victim> was struck down by <killer>. FINAL KILL!"
        let victim = message.split_whitespace().next()?;
        return Some(Event::BedwarsFinalKill {
            dead_player: strip_rank(victim).to_string(),
        });
    }

    if let Some(left) = message.strip_suffix(" disconnected.") {
        return Some(Event::BedwarsDisconnect {
            username: strip_rank(left).to_string(),
        });
    }

    if let Some(left) = message.strip_suffix(" reconnected.") {
        return Some(Event::BedwarsReconnect {
            username: strip_rank(left).to_string(),
        });
    }

    // Victory screen summary marks the end of the game.
    if message.trim_start().starts_with("1st Killer ") {
        return Some(Event::EndBedwarsGame);
    }

    // Whispering "/w !<nick>=<username>" is the denick command channel; the
    // server's failure response echoes it back to us.
    if let Some(rest) = message.strip_prefix("Can't find a player by the name of '") {
        let command = rest.strip_suffix('\'')?;
        let command = command.strip_prefix('!')?;
        return match command.split_once('=') {
            Some((nick, username)) if !nick.is_empty() && !username.is_empty() => {
                Some(Event::WhisperCommandSetNick {
                    nick: nick.to_string(),
                    username: username.to_string(),
                })
            }
            Some(_) => None,
            None if !command.is_empty() => Some(Event::NewNickname {
                nick: command.to_string(),
            }),
            None => None,
        };
    }

    None
}

/// Remove `§x` formatting codes.
fn strip_color_codes(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut chars = message.chars();
    while let Some(ch) = chars.next() {
        if ch == '§' {
            chars.next();
        } else {
            out.push(ch);
        }
    }
    out
}

/// Drop leading rank tags: `[MVP+] Somebody` -> `Somebody`.
fn strip_rank(name: &str) -> &str {
    let mut name = name.trim();
    while name.starts_with('[') {
        match name.split_once("] ") {
            Some((_, rest)) => name = rest.trim_start(),
            None => break,
        }
    }
    name
}

/// Split `prefix<mid>infix<right>suffix`-shaped messages: returns the text
/// before `infix` and the text between `infix` and `suffix`.
fn split_suffix_once<'a>(
    message: &'a str,
    infix: &str,
    suffix: &str,
) -> Option<(&'a str, &'a str)> {
    let message = message.strip_suffix(suffix)?;
    let idx = memmem::find(message.as_bytes(), infix.as_bytes())?;
    Some((&message[..idx], &message[idx + infix.len()..]))
}

fn split_names(list: &str) -> Vec<String> {
    list.split(", ")
        .map(|name| strip_rank(name).to_string())
        .filter(|name| !name.is_empty())
        .collect()
}
