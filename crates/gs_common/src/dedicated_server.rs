//! The dedicated server's `main()` implementation: parses the CLI, boots a [`GameServer`], and
//! runs a simple stdin command loop until told to stop (spec §6). Grounded on the teacher's own
//! `dedicated_server` module (the `clap` CLI, the `quit`/`stop`/`exit` commands, `Ctrl-D`/`Ctrl-C`
//! both triggering a clean shutdown), with its `rustyline` line editor replaced by a plain
//! buffered stdin loop: a dedicated server's console has no use for history or completion, and
//! `rustyline` is not part of the stack this core otherwise needs.

use std::io::BufRead;

use clap::Parser;

use crate::config::{GameConfig, ServerConfig};
use crate::prelude::*;
use crate::GameServer;

/// Command line options for the dedicated server binary (spec §6).
#[derive(Parser)]
#[command(name = "gs_dedi_server", about = "Geosia dedicated server")]
struct CliOptions {
    /// Port to listen on.
    #[arg(long, default_value_t = crate::config::DEFAULT_PORT)]
    port: u16,
    /// World generation seed. `0` picks a random seed.
    #[arg(long, default_value_t = 0)]
    seed: u32,
}

/// Parses the CLI, starts the server, and runs the console command loop until shutdown.
pub fn run_dedicated_server() -> Result<()> {
    let cli = CliOptions::parse();

    let game_config = GameConfig {
        server: ServerConfig {
            server_title: String::from("Dedicated server"),
            listen_addresses: vec![std::net::SocketAddr::from(([0, 0, 0, 0], cli.port))],
            seed: cli.seed,
            ..Default::default()
        },
    };
    let game_config = GameConfig::new_handle(game_config);
    let server = GameServer::new(game_config).context("starting dedicated server")?;

    run_console_loop(server);
    Ok(())
}

fn run_console_loop(server: Arc<GameServer>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "error reading console input");
                break;
            }
        };
        let cmd = line.split_whitespace().next().unwrap_or("");
        match cmd {
            "" => continue,
            "quit" | "stop" | "exit" => {
                info!("shutting down");
                break;
            }
            other => error!("unknown command {other}"),
        }
    }
    server.shutdown();
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cli_defaults_to_the_standard_port_and_a_random_seed() {
        let cli = CliOptions::parse_from(["gs_dedi_server"]);
        assert_eq!(cli.port, crate::config::DEFAULT_PORT);
        assert_eq!(cli.seed, 0);
    }

    #[test]
    fn cli_accepts_an_explicit_port_and_seed() {
        let cli = CliOptions::parse_from(["gs_dedi_server", "--port", "9999", "--seed", "42"]);
        assert_eq!(cli.port, 9999);
        assert_eq!(cli.seed, 42);
    }
}
