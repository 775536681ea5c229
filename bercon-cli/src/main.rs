//! bercon: BattlEye RCon command line.
//!
//! ```text
//! bercon --server chernarus players            Registered server from bercon.toml
//! bercon --host 10.0.0.5 --port 2306 \
//!        --password secret say "Restart in 5"  Explicit endpoint
//! bercon --server chernarus kick-all Restart   Kick everyone
//! bercon gen-config                            Write default config to stdout
//! ```

mod render;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use bercon_core::{ConnectionParams, RconClient, RconError, RconSettings, RconSupervisor};

use crate::render::Outcome;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "bercon", version, about = "BattlEye RCon administration tool")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "bercon.toml")]
    config: PathBuf,

    /// Server id from the `[servers]` table.
    #[arg(short, long, conflicts_with = "host")]
    server: Option<String>,

    /// RCon host, bypassing the config file.
    #[arg(long, requires = "password")]
    host: Option<String>,

    /// RCon port used with `--host`.
    #[arg(short, long, default_value_t = 2302)]
    port: u16,

    /// RCon password used with `--host`.
    #[arg(long)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in, list players and report timing.
    Check {
        #[arg(long)]
        json: bool,
    },
    /// List connected players.
    Players {
        #[arg(long)]
        json: bool,
    },
    /// Broadcast a chat message to everyone.
    Say {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Private message to one player.
    Whisper {
        id: u32,
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    Kick {
        id: u32,
        reason: Vec<String>,
    },
    /// Ban a player for MINUTES (0 = permanent).
    Ban {
        id: u32,
        minutes: u32,
        reason: Vec<String>,
    },
    /// Stop new players from joining.
    Lock,
    Unlock,
    /// Kick every connected player.
    KickAll {
        reason: Vec<String>,
    },
    /// Send a raw console command.
    Exec {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Print the default configuration to stdout and exit.
    GenConfig,
}

impl Command {
    fn wants_json(&self) -> bool {
        matches!(self, Command::Check { json: true } | Command::Players { json: true })
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // gen-config: dump defaults and exit.
    if matches!(cli.command, Command::GenConfig) {
        match toml::to_string_pretty(&RconSettings::default()) {
            Ok(text) => println!("{text}"),
            Err(e) => fail(&e),
        }
        return;
    }

    let settings = RconSettings::load(&cli.config);

    // Logs go to stderr so command output stays pipeable.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!("bercon v{}", env!("CARGO_PKG_VERSION"));

    let outcome = match run(&cli, &settings).await {
        Ok(outcome) => outcome,
        Err(e) => fail(&e),
    };
    match render::render(&outcome, cli.command.wants_json()) {
        Ok(text) => println!("{text}"),
        Err(e) => fail(&e),
    }
}

async fn run(cli: &Cli, settings: &RconSettings) -> Result<Outcome, RconError> {
    let supervisor = RconSupervisor::with_options(
        Arc::new(settings.registry()),
        settings.resolver(),
        settings.supervisor_options(),
    );
    let command = &cli.command;

    if let Some(host) = &cli.host {
        let password = cli.password.clone().unwrap_or_default();
        let params = ConnectionParams::new(host.clone(), cli.port, password);
        return supervisor
            .run_on(params, |client| async move { perform(client, command).await })
            .await;
    }

    let server_id = match &cli.server {
        Some(id) => id.clone(),
        None => sole_server(settings)?,
    };
    supervisor
        .run(&server_id, |client| async move { perform(client, command).await })
        .await
}

/// With no `--server`, a config holding exactly one server is unambiguous.
fn sole_server(settings: &RconSettings) -> Result<String, RconError> {
    let mut ids = settings.servers.keys();
    match (ids.next(), ids.next()) {
        (Some(id), None) => Ok(id.clone()),
        (None, _) => Err(RconError::Config(
            "no servers configured; pass --server or --host".into(),
        )),
        (Some(_), Some(_)) => Err(RconError::Config(
            "several servers configured; pick one with --server".into(),
        )),
    }
}

async fn perform(client: Arc<RconClient>, command: &Command) -> Result<Outcome, RconError> {
    Ok(match command {
        Command::Check { .. } => Outcome::Report(client.test_connection().await?),
        Command::Players { .. } => Outcome::Players(client.list_players().await?),
        Command::Say { message } => Outcome::Text(client.broadcast(&joined(message)).await?),
        Command::Whisper { id, message } => {
            Outcome::Text(client.whisper(*id, &joined(message)).await?)
        }
        Command::Kick { id, reason } => Outcome::Text(client.kick(*id, &joined(reason)).await?),
        Command::Ban {
            id,
            minutes,
            reason,
        } => Outcome::Text(client.ban(*id, *minutes, &joined(reason)).await?),
        Command::Lock => Outcome::Text(client.lock().await?),
        Command::Unlock => Outcome::Text(client.unlock().await?),
        Command::KickAll { reason } => Outcome::Kicked(client.kick_all(&joined(reason)).await?),
        Command::Exec { command } => Outcome::Text(client.execute(&joined(command)).await?),
        Command::GenConfig => return Err(RconError::InvalidState("gen-config needs no server")),
    })
}

fn joined(words: &[String]) -> String {
    words.join(" ")
}

fn fail(error: &dyn std::fmt::Display) -> ! {
    eprintln!("error: {error}");
    std::process::exit(1);
}
