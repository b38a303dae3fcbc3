//! Core types for the bully election protocol

use crate::error::{BullyError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Process identifier within the group; doubles as election priority
pub type Rank = usize;

/// Protocol message kinds. Messages carry no payload beyond the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    /// "I am starting an election; are you alive?"
    #[serde(rename = "ELECTION")]
    Election,
    /// "Yes, defer to me."
    #[serde(rename = "OK")]
    Ok,
    /// "I am the leader."
    #[serde(rename = "RESULT")]
    Result,
}

impl Tag {
    pub const ALL: [Tag; 3] = [Tag::Election, Tag::Ok, Tag::Result];

    pub(crate) fn index(self) -> usize {
        match self {
            Tag::Election => 0,
            Tag::Ok => 1,
            Tag::Result => 2,
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tag::Election => write!(f, "ELECTION"),
            Tag::Ok => write!(f, "OK"),
            Tag::Result => write!(f, "RESULT"),
        }
    }
}

/// Sender filter for receive and probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Any,
    Rank(Rank),
}

impl Source {
    pub fn matches(&self, rank: Rank) -> bool {
        match self {
            Source::Any => true,
            Source::Rank(r) => *r == rank,
        }
    }
}

/// A tagged message in flight between two ranks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: Rank,
    pub to: Rank,
    pub tag: Tag,
}

impl Envelope {
    /// Serialize envelope to JSON bytes
    pub fn to_bytes(&self) -> std::result::Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// The fixed set of ranks `0..size`, identical on every process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Group {
    size: usize,
}

impl Group {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(BullyError::EmptyGroup);
        }
        Ok(Self { size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn contains(&self, rank: Rank) -> bool {
        rank < self.size
    }

    /// Every rank in the group, lowest first
    pub fn ranks(&self) -> Range<Rank> {
        0..self.size
    }

    /// Ranks that outrank `rank`; empty for the highest process
    pub fn higher_than(&self, rank: Rank) -> Range<Rank> {
        (rank + 1).min(self.size)..self.size
    }

    pub fn highest(&self) -> Rank {
        self.size - 1
    }

    pub(crate) fn check(&self, rank: Rank) -> Result<()> {
        if self.contains(rank) {
            Ok(())
        } else {
            Err(BullyError::RankOutOfRange {
                rank,
                size: self.size,
            })
        }
    }
}

/// Where a process is in its election cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    /// No election in flight
    #[default]
    Idle,
    /// Soliciting higher peers and waiting for an OK
    Electing,
    /// No OK arrived; broadcasting RESULT
    Victor,
    /// A higher peer answered; waiting for its RESULT
    Deferring,
}

/// Observable snapshot of a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub phase: Phase,
    /// Last announced (or self-declared) leader
    pub leader: Option<Rank>,
    /// Election attempts started by this node
    pub elections: u64,
    /// RESULT broadcasts issued by this node
    pub victories: u64,
}
