//! Parsing of the `players` command response.
//!
//! ```text
//! Players on server:
//! [#] [IP Address]:[Port] [Ping] [GUID] [Name]
//! --------------------------------------------------
//! 0   192.168.1.10:2304   47   1a2b...6c5d(OK) Survivor
//! 1   10.0.0.3:2304       112  ffee...8899(?) Bandit (Lobby)
//! (2 players in total)
//! ```
//!
//! Only lines whose first token is fully numeric are player records.

use serde::{Deserialize, Serialize};

const GUID_VERIFIED: &str = "(OK)";
const GUID_UNVERIFIED: &str = "(?)";
const LOBBY_SUFFIX: &str = "(Lobby)";

/// One row of the server's player list. Ephemeral: the id is a slot
/// number that is reused after the player leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Slot id used by `kick`, `ban` and `say`.
    pub id: u32,
    /// `ip:port` as reported by the server.
    pub address: String,
    /// Ping in milliseconds, `None` when not numeric.
    pub ping: Option<u32>,
    /// BattlEye GUID without its verification suffix.
    pub guid: String,
    /// `true` when the server marked the GUID `(OK)`.
    pub guid_verified: bool,
    pub name: String,
    /// Player is still in the lobby.
    pub in_lobby: bool,
}

/// Parse a raw `players` response, keeping server order.
pub fn parse_players(response: &str) -> Vec<Player> {
    response.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Player> {
    let (id, rest) = next_token(line)?;
    if !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let id = id.parse().ok()?;
    let (address, rest) = next_token(rest)?;

    let (ping, rest) = match next_token(rest) {
        Some((ping, rest)) => (ping.parse().ok(), rest),
        None => (None, rest),
    };
    let (guid, rest) = next_token(rest).unwrap_or(("", rest));
    let (guid, guid_verified) = if let Some(stripped) = guid.strip_suffix(GUID_VERIFIED) {
        (stripped, true)
    } else {
        (guid.strip_suffix(GUID_UNVERIFIED).unwrap_or(guid), false)
    };

    let name = rest.trim();
    let (name, in_lobby) = match name.strip_suffix(LOBBY_SUFFIX) {
        Some(stripped) => (stripped.trim_end(), true),
        None => (name, false),
    };

    Some(Player {
        id,
        address: address.to_string(),
        ping,
        guid: guid.to_string(),
        guid_verified,
        name: name.to_string(),
        in_lobby,
    })
}

/// Split off the next whitespace-delimited token.
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some(s.split_at(end))
}
