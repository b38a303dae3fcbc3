//! Bully election attempt.
//!
//! One run of [`run`] is one attempt by this process:
//! 1. send ELECTION to every higher rank
//! 2. poll for an OK from any sender until the response timeout
//! 3. no OK: broadcast RESULT and become leader;
//!    OK: wait (unbounded) for some higher rank's RESULT
//! 4. go idle and release the guard
//!
//! Which higher peer answered does not matter. Any OK means a live higher
//! process exists and will resolve leadership among the higher ranks itself.

use crate::node::Shared;
use crate::transport::Transport;
use crate::types::{Phase, Rank, Source, Tag};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// How an election attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No higher peer answered; this process announced itself
    Victory,
    /// A higher peer answered and `leader` announced itself
    Deferred { leader: Rank },
}

/// Drive one election attempt, begun with [`Shared::begin_election`]
pub(crate) async fn run(shared: &Shared) -> Outcome {
    let rank = shared.rank();
    let transport = &shared.transport;

    info!("Starting election...");

    solicit_higher(transport);

    let answered = wait_for_response(
        transport,
        shared.config.response_timeout(),
        shared.config.poll_interval(),
    )
    .await;

    let (outcome, leader) = match answered {
        None => {
            shared.update(|s| {
                s.phase = Phase::Victor;
                s.victories += 1;
            });
            broadcast_victory(transport);
            (Outcome::Victory, rank)
        }
        Some(_) => {
            shared.update(|s| s.phase = Phase::Deferring);
            let leader = wait_for_result(transport).await;
            (Outcome::Deferred { leader }, leader)
        }
    };

    shared.release(leader);
    debug!("Election finished: {:?}", outcome);
    outcome
}

fn solicit_higher(transport: &Transport) {
    let rank = transport.rank();
    for peer in transport.group().higher_than(rank) {
        if let Err(e) = transport.send(peer, Tag::Election) {
            warn!("Failed to solicit {}: {}", peer, e);
        }
    }
}

/// Poll for an OK until `timeout` elapses. Returns the first responder.
///
/// The full window is waited out even when no higher rank exists, so
/// solicitations racing in from lower ranks fold into this attempt.
async fn wait_for_response(transport: &Transport, timeout: Duration, poll: Duration) -> Option<Rank> {
    info!("Waiting for a response from higher nodes...");
    let deadline = Instant::now() + timeout;

    loop {
        if transport.probe(Tag::Ok, Source::Any) {
            let from = transport.receive(Tag::Ok, Source::Any).await;
            info!("Got an OK answer from node {}", from);

            let extra = transport.mailbox().drain(Tag::Ok);
            if extra > 0 {
                debug!("Discarded {} further OK answers", extra);
            }
            return Some(from);
        }

        if Instant::now() >= deadline {
            return None;
        }

        sleep(poll).await;
    }
}

fn broadcast_victory(transport: &Transport) {
    info!("I'm the winner of this election! Broadcasting result...");
    if let Err(e) = transport.broadcast(Tag::Result) {
        warn!("Failed to broadcast result: {}", e);
    }
}

/// No timeout: a lost RESULT leaves this process waiting forever
async fn wait_for_result(transport: &Transport) -> Rank {
    info!("Waiting for election result...");
    let leader = transport.receive(Tag::Result, Source::Any).await;
    info!("I acknowledge that {} is the winner!", leader);
    leader
}
