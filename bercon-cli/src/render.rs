//! Human and JSON output for command results.

use bercon_core::{ConnectionReport, KickSummary, Player};

/// What a subcommand produced.
#[derive(Debug)]
pub enum Outcome {
    Text(String),
    Players(Vec<Player>),
    Report(ConnectionReport),
    Kicked(KickSummary),
}

pub fn render(outcome: &Outcome, json: bool) -> Result<String, serde_json::Error> {
    if json {
        return match outcome {
            Outcome::Text(text) => serde_json::to_string_pretty(text),
            Outcome::Players(players) => serde_json::to_string_pretty(players),
            Outcome::Report(report) => serde_json::to_string_pretty(report),
            Outcome::Kicked(summary) => serde_json::to_string_pretty(summary),
        };
    }
    Ok(match outcome {
        Outcome::Text(text) if text.is_empty() => "OK".to_string(),
        Outcome::Text(text) => text.clone(),
        Outcome::Players(players) => player_table(players),
        Outcome::Report(report) => format!(
            "{}: {}, {} player(s) online ({} ms)",
            report.endpoint,
            if report.authenticated { "authenticated" } else { "not authenticated" },
            report.players_online,
            report.elapsed_ms
        ),
        Outcome::Kicked(summary) => summary.to_string(),
    })
}

fn player_table(players: &[Player]) -> String {
    let mut out = format!("{:<4} {:<22} {:>5}  {:<36} {}\n", "#", "ADDRESS", "PING", "GUID", "NAME");
    for p in players {
        let ping = p.ping.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
        let guid = if p.guid_verified {
            format!("{}(OK)", p.guid)
        } else {
            p.guid.clone()
        };
        let lobby = if p.in_lobby { " (Lobby)" } else { "" };
        out.push_str(&format!(
            "{:<4} {:<22} {:>5}  {:<36} {}{}\n",
            p.id, p.address, ping, guid, p.name, lobby
        ));
    }
    out.push_str(&format!("({} players in total)", players.len()));
    out
}
