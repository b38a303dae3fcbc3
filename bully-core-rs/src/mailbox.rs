//! Inbound message store for one process.
//!
//! Messages are queued per tag in arrival order. Receivers pick the oldest
//! message of a tag matching an optional sender filter, so delivery order
//! between any pair of processes is preserved.

use crate::types::{Rank, Source, Tag};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tracing::trace;

#[derive(Debug, Default)]
pub struct Mailbox {
    queues: Mutex<[VecDeque<Rank>; Tag::ALL.len()]>,
    arrived: Notify,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message from `from` and wake any waiting receivers
    pub fn deliver(&self, from: Rank, tag: Tag) {
        self.queues.lock()[tag.index()].push_back(from);
        trace!("Mailbox: queued {} from {}", tag, from);
        self.arrived.notify_waiters();
    }

    /// Wait for a message of `tag` from a matching sender and return the sender.
    ///
    /// Cancel-safe: a message is only removed once it is returned.
    pub async fn receive(&self, tag: Tag, source: Source) -> Rank {
        loop {
            let notified = self.arrived.notified();
            tokio::pin!(notified);
            // Register before checking so a delivery in between is not missed
            notified.as_mut().enable();

            if let Some(from) = self.try_receive(tag, source) {
                return from;
            }

            notified.await;
        }
    }

    /// Take a matching message if one is already queued
    pub fn try_receive(&self, tag: Tag, source: Source) -> Option<Rank> {
        let mut queues = self.queues.lock();
        let queue = &mut queues[tag.index()];
        let pos = queue.iter().position(|from| source.matches(*from))?;
        queue.remove(pos)
    }

    /// Check for a matching message without consuming it
    pub fn probe(&self, tag: Tag, source: Source) -> bool {
        self.queues.lock()[tag.index()]
            .iter()
            .any(|from| source.matches(*from))
    }

    /// Discard every queued message of `tag`, returning how many were dropped
    pub fn drain(&self, tag: Tag) -> usize {
        let mut queues = self.queues.lock();
        let queue = &mut queues[tag.index()];
        let n = queue.len();
        queue.clear();
        n
    }

    pub fn pending(&self, tag: Tag) -> usize {
        self.queues.lock()[tag.index()].len()
    }
}
