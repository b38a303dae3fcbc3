//! In-process network for running a whole group inside one process
//!
//! Every rank gets its own mailbox; sending delivers straight into the
//! destination mailbox. Ranks can be marked down to simulate absent
//! processes, and every envelope handed to the network is logged so tests
//! can assert on the message trace.

use crate::error::Result;
use crate::mailbox::Mailbox;
use crate::transport::{Link, Transport};
use crate::types::{Envelope, Group, Rank, Tag};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

struct Inner {
    mailboxes: Vec<Arc<Mailbox>>,
    down: RwLock<HashSet<Rank>>,
    sent: Mutex<Vec<Envelope>>,
}

impl Link for Inner {
    fn send(&self, envelope: Envelope) -> Result<()> {
        self.sent.lock().push(envelope);

        let down = self.down.read();
        if down.contains(&envelope.to) || down.contains(&envelope.from) {
            trace!(
                "Dropping {} from {} to {} (process down)",
                envelope.tag,
                envelope.from,
                envelope.to
            );
            return Ok(());
        }

        self.mailboxes[envelope.to].deliver(envelope.from, envelope.tag);
        Ok(())
    }
}

/// Channel-free in-memory network for a fixed group
#[derive(Clone)]
pub struct MemoryNetwork {
    group: Group,
    inner: Arc<Inner>,
}

impl MemoryNetwork {
    pub fn new(group: Group) -> Self {
        let mailboxes = group.ranks().map(|_| Arc::new(Mailbox::new())).collect();
        Self {
            group,
            inner: Arc::new(Inner {
                mailboxes,
                down: RwLock::new(HashSet::new()),
                sent: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn group(&self) -> Group {
        self.group
    }

    /// Transport endpoint for `rank`
    pub fn transport(&self, rank: Rank) -> Result<Transport> {
        self.group.check(rank)?;
        Ok(Transport::new(
            rank,
            self.group,
            Arc::clone(&self.inner.mailboxes[rank]),
            self.inner.clone(),
        ))
    }

    /// Mark a process absent (or present again). Messages to or from an
    /// absent process are dropped.
    pub fn set_down(&self, rank: Rank, down: bool) {
        let mut set = self.inner.down.write();
        if down {
            set.insert(rank);
        } else {
            set.remove(&rank);
        }
        debug!("Network: node {} {}", rank, if down { "down" } else { "up" });
    }

    pub fn is_down(&self, rank: Rank) -> bool {
        self.inner.down.read().contains(&rank)
    }

    /// Every envelope handed to the network so far, in send order
    pub fn sent(&self) -> Vec<Envelope> {
        self.inner.sent.lock().clone()
    }

    /// Envelopes of one tag, as (from, to) pairs
    pub fn sent_with_tag(&self, tag: Tag) -> Vec<(Rank, Rank)> {
        self.inner
            .sent
            .lock()
            .iter()
            .filter(|e| e.tag == tag)
            .map(|e| (e.from, e.to))
            .collect()
    }
}
