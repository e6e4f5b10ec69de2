// mixchain-cli — in-process chain simulation harness
//
// Wires up a FrontServer/MiddleServer/SpreadingServer chain plus one
// dead-drop server and N clients over tokio::sync::mpsc channels, and
// drives them through one or more synchronous rounds. Real socket
// bootstrap/dialing is an external collaborator (spec §1) this binary
// does not implement; it exists to exercise the round protocol end to
// end without a network.

mod sim;

use clap::{Parser, Subcommand};
use colored::*;
use sim::Simulation;

#[derive(Parser)]
#[command(name = "mixchain")]
#[command(about = "Mix-network messaging core — simulation harness", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an in-process simulation of a chain of 3 with one dead drop.
    Simulate {
        /// Number of clients to generate. Consecutive pairs (0-1, 2-3, ...)
        /// dial each other; an odd client out stays idle.
        #[arg(short, long, default_value_t = 4)]
        clients: usize,
        /// Number of rounds to run.
        #[arg(short, long, default_value_t = 3)]
        rounds: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate { clients, rounds } => cmd_simulate(clients, rounds).await,
    }
}

async fn cmd_simulate(n_clients: usize, rounds: u64) -> anyhow::Result<()> {
    if n_clients == 0 {
        anyhow::bail!("need at least one client to simulate");
    }

    println!("{}", "Mixchain simulation".bold());
    println!("  clients: {}", n_clients.to_string().bright_cyan());
    println!("  rounds:  {}", rounds.to_string().bright_cyan());
    println!();

    let mut sim = Simulation::new(n_clients);
    println!(
        "  chain_len={} dead_drop_count={}",
        sim.chain_config().chain_len,
        sim.chain_config().dead_drop_count
    );
    println!();

    let pairs: Vec<(usize, usize)> = (0..n_clients / 2).map(|i| (2 * i, 2 * i + 1)).collect();
    for &(a, b) in &pairs {
        let (pk_a, pk_b) = (sim.clients[a].public_key(), sim.clients[b].public_key());
        sim.clients[a].dial(pk_b);
        sim.clients[b].dial(pk_a);
    }
    if n_clients % 2 == 1 {
        println!("  {} client {} has no partner this run (idle)", "note:".yellow(), n_clients - 1);
    }

    for round in 0..rounds {
        for &(a, b) in &pairs {
            sim.clients[a].new_message(format!("hello from {a} at round {round}").into_bytes())?;
            sim.clients[b].new_message(format!("hello from {b} at round {round}").into_bytes())?;
        }

        let replies = sim.run_round(round).await;

        println!("{} {}", "Round".bold(), round.to_string().bright_cyan());
        for (i, reply) in replies.iter().enumerate() {
            match reply {
                Some(bytes) if !bytes.is_empty() => {
                    let text = String::from_utf8_lossy(bytes);
                    println!("  client {i}: {} \"{}\"", "received".green(), text);
                }
                Some(_) => println!("  client {i}: {}", "received empty reply (no match this round)".yellow()),
                None => println!("  client {i}: {}", "sent cover traffic, reply discarded".dimmed()),
            }
        }
        println!();
    }

    Ok(())
}
