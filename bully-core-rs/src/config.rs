//! Configuration for election nodes
//!
//! Identity (rank and group) is immutable and passed explicitly to each node.
//! Timing and bootstrap settings can be loaded from JSON.

use crate::error::{BullyError, Result};
use crate::types::{Group, Rank};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// How long a soliciting node waits for an OK from a higher peer
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 5000;

/// How often the mailbox is probed for an OK while waiting
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Rank that triggers the first election
pub const DEFAULT_STARTER: Rank = 0;

/// Protocol timing and bootstrap settings shared by the whole group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectionConfig {
    pub response_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub starter: Rank,
    /// Per-rank delay before a node starts its tasks, in milliseconds
    pub start_delays: BTreeMap<Rank, u64>,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            starter: DEFAULT_STARTER,
            start_delays: BTreeMap::new(),
        }
    }
}

impl ElectionConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check timing and bootstrap settings against a group
    pub fn validate(&self, group: &Group) -> Result<()> {
        group.check(self.starter)?;
        for rank in self.start_delays.keys() {
            group.check(*rank)?;
        }

        let poll = self.poll_interval();
        let timeout = self.response_timeout();
        if poll.is_zero() || poll > timeout {
            return Err(BullyError::InvalidTiming { poll, timeout });
        }

        Ok(())
    }
}

/// Complete configuration for one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub rank: Rank,
    pub group: Group,
    pub election: ElectionConfig,
}

impl NodeConfig {
    /// Create config with default timing
    pub fn new(rank: Rank, group: Group) -> Self {
        Self {
            rank,
            group,
            election: ElectionConfig::default(),
        }
    }

    /// Replace the whole election section
    pub fn with_election(mut self, election: ElectionConfig) -> Self {
        self.election = election;
        self
    }

    /// Set response timeout and poll interval
    pub fn with_timing(mut self, response_timeout: Duration, poll_interval: Duration) -> Self {
        self.election.response_timeout_ms = response_timeout.as_millis() as u64;
        self.election.poll_interval_ms = poll_interval.as_millis() as u64;
        self
    }

    /// Set the rank that starts the first election
    pub fn with_starter(mut self, starter: Rank) -> Self {
        self.election.starter = starter;
        self
    }

    /// Delay the start of `rank` by `delay`
    pub fn with_start_delay(mut self, rank: Rank, delay: Duration) -> Self {
        self.election
            .start_delays
            .insert(rank, delay.as_millis() as u64);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.group.check(self.rank)?;
        self.election.validate(&self.group)
    }

    pub fn is_starter(&self) -> bool {
        self.rank == self.election.starter
    }

    pub fn start_delay(&self) -> Duration {
        self.election
            .start_delays
            .get(&self.rank)
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or(Duration::ZERO)
    }

    pub fn response_timeout(&self) -> Duration {
        self.election.response_timeout()
    }

    pub fn poll_interval(&self) -> Duration {
        self.election.poll_interval()
    }
}

/// Group description for UDP deployments; `peers[r]` is the address of rank `r`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpGroupConfig {
    pub peers: Vec<SocketAddr>,
    #[serde(default)]
    pub election: ElectionConfig,
}

impl UdpGroupConfig {
    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        if config.peers.is_empty() {
            return Err(BullyError::NoPeers);
        }
        Ok(config)
    }

    pub fn group(&self) -> Result<Group> {
        Group::new(self.peers.len())
    }

    /// Build the validated config for one member
    pub fn node_config(&self, rank: Rank) -> Result<NodeConfig> {
        let config = NodeConfig::new(rank, self.group()?).with_election(self.election.clone());
        config.validate()?;
        Ok(config)
    }
}
