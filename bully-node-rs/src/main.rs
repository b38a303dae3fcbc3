//! Bully Node - Rust Implementation
//!
//! Runs bully leader election either as a whole group inside one process
//! (`cluster`) or as a single member of a UDP group (`node`).

use bully_core::{udp, Group, MemoryNetwork, Node, NodeConfig, Rank, UdpGroupConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "bully-node")]
#[command(about = "Bully leader election among a fixed group of processes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every process of the group in this process over in-memory channels
    Cluster {
        /// Number of processes in the group
        #[arg(short, long, default_value = "3")]
        nodes: usize,

        /// Rank that starts the first election
        #[arg(short, long, default_value = "0")]
        starter: Rank,

        /// Response timeout in milliseconds
        #[arg(long, default_value = "5000")]
        timeout_ms: u64,

        /// OK poll interval in milliseconds
        #[arg(long, default_value = "1000")]
        poll_ms: u64,

        /// Ranks that never come up
        #[arg(short, long)]
        absent: Vec<Rank>,

        /// Rank whose start is delayed
        #[arg(long)]
        late: Option<Rank>,

        /// Start delay for the late rank in milliseconds
        #[arg(long, default_value = "100000")]
        late_delay_ms: u64,

        /// Give up waiting for a leader after this many seconds
        #[arg(short, long, default_value = "30")]
        wait_secs: u64,
    },

    /// Run one process of a UDP group
    Node {
        /// This process's rank
        #[arg(short, long)]
        rank: Rank,

        /// Group file: {"peers": ["127.0.0.1:9990", ...], "election": {...}}
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Cluster {
            nodes,
            starter,
            timeout_ms,
            poll_ms,
            absent,
            late,
            late_delay_ms,
            wait_secs,
        } => {
            info!("Running cluster of {} nodes, starter {}", nodes, starter);

            let group = Group::new(nodes)?;
            let network = MemoryNetwork::new(group);

            let mut members = Vec::new();
            for rank in group.ranks() {
                if absent.contains(&rank) {
                    info!("Node {} is absent", rank);
                    network.set_down(rank, true);
                    continue;
                }

                let mut config = NodeConfig::new(rank, group)
                    .with_timing(Duration::from_millis(timeout_ms), Duration::from_millis(poll_ms))
                    .with_starter(starter);
                if let Some(late) = late {
                    config = config.with_start_delay(late, Duration::from_millis(late_delay_ms));
                }

                members.push(Node::new(config, network.transport(rank)?)?);
            }

            // Any member failing to start aborts the whole group
            for node in &members {
                if let Err(e) = node.start() {
                    error!("Node {} failed to start, aborting group: {}", node.rank(), e);
                    return Err(e.into());
                }
            }

            let wait = Duration::from_secs(wait_secs);
            let mut settled = 0;
            for node in members.iter().filter(|n| n.rank() >= starter) {
                match tokio::time::timeout(wait, node.await_leader()).await {
                    Ok(Ok(_)) => settled += 1,
                    Ok(Err(e)) => warn!("Node {} stopped: {}", node.rank(), e),
                    Err(_) => warn!("Node {} has no leader after {:?}", node.rank(), wait),
                }
            }

            println!("\nElection summary:");
            println!("  {:>4}  {:>9}  {:>6}  {:>9}  {:>9}", "rank", "phase", "leader", "elections", "victories");
            for rank in group.ranks() {
                match members.iter().find(|n| n.rank() == rank) {
                    Some(node) => {
                        let status = node.status();
                        let leader = status
                            .leader
                            .map(|l| l.to_string())
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "  {:>4}  {:>9}  {:>6}  {:>9}  {:>9}",
                            rank,
                            format!("{:?}", status.phase),
                            leader,
                            status.elections,
                            status.victories
                        );
                    }
                    None => println!("  {:>4}  {:>9}", rank, "absent"),
                }
            }

            for node in &members {
                node.shutdown();
            }

            if settled == 0 {
                return Err("no leader was elected".into());
            }
        }

        Commands::Node { rank, config } => {
            let group_config = UdpGroupConfig::load(&config)?;
            let node_config = group_config.node_config(rank)?;

            info!(
                "Bully node {} of {} starting (starter: {})",
                rank,
                node_config.group.size(),
                node_config.election.starter
            );

            let transport = udp::bind(rank, group_config.peers.clone()).await?;
            let node = Node::new(node_config, transport)?;
            node.start()?;

            let mut status = node.subscribe();
            loop {
                tokio::select! {
                    changed = status.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let current = status.borrow_and_update().clone();
                        if let Some(leader) = current.leader {
                            info!("Status: {:?}, leader {}", current.phase, leader);
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutting down");
                        break;
                    }
                }
            }

            node.shutdown();
        }
    }

    Ok(())
}
