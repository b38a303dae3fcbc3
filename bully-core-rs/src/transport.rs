//! Point-to-point transport between ranked processes

use crate::error::Result;
use crate::mailbox::Mailbox;
use crate::types::{Envelope, Group, Rank, Source, Tag};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outbound half of a network.
///
/// `send` hands the envelope off and returns without waiting for delivery.
/// Envelopes between the same pair of ranks must arrive in send order.
pub trait Link: Send + Sync {
    fn send(&self, envelope: Envelope) -> Result<()>;
}

/// A process's view of the network: its own rank, the group, an inbound
/// mailbox and an outbound link. Cheap to clone; clones share both halves.
#[derive(Clone)]
pub struct Transport {
    rank: Rank,
    group: Group,
    mailbox: Arc<Mailbox>,
    link: Arc<dyn Link>,
}

impl Transport {
    pub fn new(rank: Rank, group: Group, mailbox: Arc<Mailbox>, link: Arc<dyn Link>) -> Self {
        Self {
            rank,
            group,
            mailbox,
            link,
        }
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn group(&self) -> Group {
        self.group
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Send `tag` to a single rank
    pub fn send(&self, dest: Rank, tag: Tag) -> Result<()> {
        self.group.check(dest)?;
        debug!("Sending {} to {}", tag, dest);
        self.link.send(Envelope {
            from: self.rank,
            to: dest,
            tag,
        })
    }

    /// Send `tag` to every rank in the group.
    ///
    /// The sender's own copy is not put on the wire; a process never needs
    /// to hear its own announcement. Failures to individual ranks are logged
    /// and skipped.
    pub fn broadcast(&self, tag: Tag) -> Result<()> {
        for dest in self.group.ranks().filter(|r| *r != self.rank) {
            debug!("Broadcasting {} to {}", tag, dest);
            let envelope = Envelope {
                from: self.rank,
                to: dest,
                tag,
            };
            if let Err(e) = self.link.send(envelope) {
                warn!("Failed to send {} to {}: {}", tag, dest, e);
            }
        }
        Ok(())
    }

    /// Block until a matching message arrives; returns the sender
    pub async fn receive(&self, tag: Tag, source: Source) -> Rank {
        self.mailbox.receive(tag, source).await
    }

    /// Non-blocking check for a matching message
    pub fn probe(&self, tag: Tag, source: Source) -> bool {
        self.mailbox.probe(tag, source)
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("rank", &self.rank)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}
