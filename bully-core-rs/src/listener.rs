//! Listener task: answers ELECTION solicitations for the node's lifetime.
//!
//! A solicitation always comes from a lower rank, so besides acknowledging it
//! this node must compete itself. OK and RESULT are left in the mailbox for
//! the election task.

use crate::node::Shared;
use crate::types::{Rank, Source, Tag};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub(crate) async fn run(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    if *shutdown.borrow_and_update() {
        return;
    }

    info!("Listening for election requests");

    loop {
        tokio::select! {
            from = shared.transport.receive(Tag::Election, Source::Any) => {
                handle_election_request(&shared, from);
            }
            _ = shutdown.changed() => {
                info!("Listener stopping");
                break;
            }
        }
    }
}

fn handle_election_request(shared: &Arc<Shared>, from: Rank) {
    if let Err(e) = shared.transport.send(from, Tag::Ok) {
        warn!("Failed to answer election request from {}: {}", from, e);
    }

    info!(
        "Received election request from {} (on election: {})",
        from,
        shared.guard.is_electing()
    );

    if !shared.trigger_election() {
        debug!("Election already in flight, request from {} absorbed", from);
    }
}
