//! Node bootstrap: owns a process's identity, guard and tasks.
//!
//! A node runs two kinds of task on the tokio runtime:
//! - the listener, started once by [`Node::start`] and alive until
//!   [`Node::shutdown`]
//! - at most one election task at a time, spawned whenever the guard is
//!   acquired (bootstrap on the starter, or a solicitation from a lower rank)

use crate::config::NodeConfig;
use crate::election;
use crate::error::{BullyError, Result};
use crate::guard::ElectionGuard;
use crate::listener;
use crate::transport::Transport;
use crate::types::{Phase, Rank, Status};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, Instrument};

/// State shared between the listener and election tasks of one node
pub(crate) struct Shared {
    pub(crate) config: NodeConfig,
    pub(crate) transport: Transport,
    pub(crate) guard: ElectionGuard,
    status: watch::Sender<Status>,
    election_task: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    pub(crate) fn new(config: NodeConfig, transport: Transport) -> Arc<Self> {
        let (status, _) = watch::channel(Status::default());
        Arc::new(Self {
            config,
            transport,
            guard: ElectionGuard::new(),
            status,
            election_task: Mutex::new(None),
        })
    }

    pub(crate) fn rank(&self) -> Rank {
        self.config.rank
    }

    pub(crate) fn status_snapshot(&self) -> Status {
        self.status.borrow().clone()
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut Status)) {
        self.status.send_modify(f);
    }

    /// Record the leader, go idle and clear the guard in one status update,
    /// so no observer sees `Idle` while the guard is still held.
    pub(crate) fn release(&self, leader: Rank) {
        self.status.send_modify(|s| {
            s.phase = Phase::Idle;
            s.leader = Some(leader);
            self.guard.clear_electing();
        });
    }

    /// Take the guard and mark a new attempt in the status, in one update.
    ///
    /// Observers never see the guard held while the status still reports
    /// the previous attempt as settled.
    pub(crate) fn begin_election(&self) -> bool {
        let mut acquired = false;
        self.status.send_if_modified(|s| {
            if !self.guard.try_set_electing() {
                return false;
            }
            s.phase = Phase::Electing;
            s.elections += 1;
            acquired = true;
            true
        });
        acquired
    }

    /// Start an election task unless one is already in flight
    pub(crate) fn trigger_election(self: &Arc<Self>) -> bool {
        if !self.begin_election() {
            return false;
        }

        // Spawn and store under the lock so handles land in attempt order
        let mut slot = self.election_task.lock();
        let shared = Arc::clone(self);
        let span = info_span!("node", rank = self.rank());
        *slot = Some(tokio::spawn(
            async move {
                election::run(&shared).await;
            }
            .instrument(span),
        ));
        true
    }
}

/// One member of the process group
pub struct Node {
    shared: Arc<Shared>,
    started: AtomicBool,
    shutdown: watch::Sender<bool>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    /// Create a node; the transport must belong to the configured rank and group
    pub fn new(config: NodeConfig, transport: Transport) -> Result<Self> {
        config.validate()?;
        if transport.rank() != config.rank || transport.group() != config.group {
            return Err(BullyError::TransportMismatch {
                transport: transport.rank(),
                transport_size: transport.group().size(),
                node: config.rank,
                node_size: config.group.size(),
            });
        }

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            shared: Shared::new(config, transport),
            started: AtomicBool::new(false),
            shutdown,
            listener: Mutex::new(None),
        })
    }

    pub fn rank(&self) -> Rank {
        self.shared.rank()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.shared.config
    }

    pub fn transport(&self) -> &Transport {
        &self.shared.transport
    }

    /// Current status snapshot
    pub fn status(&self) -> Status {
        self.shared.status_snapshot()
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.shared.status.subscribe()
    }

    pub fn is_electing(&self) -> bool {
        self.shared.guard.is_electing()
    }

    /// Start the listener and, on the starter rank, the first election.
    ///
    /// Fails if the runtime cannot run both tasks in parallel; callers should
    /// treat that as fatal for the whole group.
    pub fn start(&self) -> Result<()> {
        check_runtime()?;
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(BullyError::AlreadyStarted);
        }

        let shared = Arc::clone(&self.shared);
        let mut shutdown = self.shutdown.subscribe();
        let delay = shared.config.start_delay();
        let span = info_span!("node", rank = shared.rank());

        let handle = tokio::spawn(
            async move {
                if *shutdown.borrow_and_update() {
                    debug!("Stopped before start");
                    return;
                }

                if !delay.is_zero() {
                    info!("Delaying start by {:?}", delay);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => return,
                    }
                }

                if shared.config.is_starter() {
                    info!("Designated election starter");
                    shared.trigger_election();
                }

                listener::run(shared, shutdown).await;
            }
            .instrument(span),
        );

        *self.listener.lock() = Some(handle);
        Ok(())
    }

    /// Start an election from outside the protocol. Returns `false` if one is
    /// already in flight.
    pub fn trigger_election(&self) -> Result<bool> {
        check_runtime()?;
        let started = self.shared.trigger_election();
        if !started {
            debug!("Node {}: election already in flight", self.rank());
        }
        Ok(started)
    }

    /// Wait until the node is idle with a known leader and return it
    pub async fn await_leader(&self) -> Result<Rank> {
        let mut rx = self.shared.status.subscribe();
        let status = rx
            .wait_for(|s| s.phase == Phase::Idle && s.leader.is_some())
            .await
            .map_err(|_| BullyError::NodeStopped)?;
        status.leader.ok_or(BullyError::NodeStopped)
    }

    /// Ask the listener to stop. An election in flight runs to completion.
    ///
    /// Sticky: a node shut down before [`Node::start`] never starts listening.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait for the listener and the most recent election task to finish.
    ///
    /// The listener only returns after [`Node::shutdown`]; an election
    /// deferring to a leader whose RESULT never arrives blocks forever.
    pub async fn finish(&self) -> Result<()> {
        let listener = self.listener.lock().take();
        if let Some(handle) = listener {
            handle.await?;
        }

        let election = self.shared.election_task.lock().take();
        if let Some(handle) = election {
            handle.await?;
        }

        Ok(())
    }
}

/// The listener and election tasks must be able to run in parallel
fn check_runtime() -> Result<()> {
    let handle = Handle::try_current().map_err(|_| BullyError::NoRuntime)?;
    match handle.runtime_flavor() {
        RuntimeFlavor::CurrentThread => Err(BullyError::InsufficientConcurrency),
        _ => Ok(()),
    }
}
