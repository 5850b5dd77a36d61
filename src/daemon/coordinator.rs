//! Daemon event loop: owns the worker table, multiplexes worker links,
//! emits heartbeats and stats reports, and runs the shutdown sequence.

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::{DateTime, Utc};
use crossbeam_channel::{RecvTimeoutError, Select, TryRecvError};
use serde::Serialize;

use crate::core::errors::{MonError, Result};
use crate::daemon::context::Context;
use crate::daemon::messages::{ThreadMsg, Verb, WorkerId};
use crate::daemon::signals::SignalHandler;
use crate::daemon::worker::{self, WorkerHandle};
use crate::monitor::node::Node;
use crate::monitor::stats::StatsReport;
use crate::notify::Title;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Running,
    ShuttingDown,
    Stopped,
}

/// How the worker table was torn down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownSummary {
    /// Workers that acknowledged `Terminate` (or had already exited).
    pub acknowledged: usize,
    /// Workers force-cancelled after the grace period.
    pub cancelled: usize,
    /// Cancelled workers still running after the reap window; detached.
    pub leaked: usize,
}

pub struct Coordinator {
    ctx: Arc<Context>,
    workers: Vec<WorkerHandle>,
    signals: SignalHandler,
    state: CoordinatorState,
    node_count: usize,
}

impl Coordinator {
    /// Prepare every node, spawn one worker per node, and complete the
    /// `Ready`/`Init` handshake. On error, workers already spawned are torn
    /// down before returning.
    pub fn start(ctx: Arc<Context>, nodes: Vec<Node>, signals: SignalHandler) -> Result<Self> {
        for node in &nodes {
            ctx.prober().prepare(node)?;
        }

        let node_count = nodes.len();
        let mut coordinator = Self {
            ctx,
            workers: Vec::with_capacity(node_count),
            signals,
            state: CoordinatorState::Running,
            node_count,
        };

        for (idx, node) in nodes.into_iter().enumerate() {
            let handle = worker::spawn(WorkerId(idx), Arc::new(node), Arc::clone(&coordinator.ctx))?;
            coordinator.workers.push(handle);
        }

        let ready_timeout = coordinator.ctx.timings().ready_timeout;
        for handle in &coordinator.workers {
            match handle.link.from_worker.recv_timeout(ready_timeout) {
                Ok(msg) if msg.verb == Verb::Ready => {}
                Ok(msg) => {
                    return Err(MonError::WorkerInit {
                        host: handle.node.host().to_string(),
                        details: format!("expected Ready, got {:?}", msg.verb),
                    });
                }
                Err(_) => {
                    return Err(MonError::WorkerInit {
                        host: handle.node.host().to_string(),
                        details: format!("no Ready within {}ms", ready_timeout.as_millis()),
                    });
                }
            }
        }

        for handle in &coordinator.workers {
            handle
                .link
                .to_worker
                .send(ThreadMsg::new(handle.id, Verb::Init))
                .map_err(|_| MonError::WorkerInit {
                    host: handle.node.host().to_string(),
                    details: format!("{} exited before Init", handle.id),
                })?;
        }

        if coordinator.workers.len() != coordinator.node_count {
            return Err(MonError::Runtime {
                details: format!(
                    "spawned {} workers for {} nodes",
                    coordinator.workers.len(),
                    coordinator.node_count
                ),
            });
        }

        tracing::info!(workers = coordinator.workers.len(), "monitor started");
        Ok(coordinator)
    }

    /// Run until a shutdown is requested, then tear down the workers.
    pub fn run(&mut self) -> ShutdownSummary {
        let tick = self.ctx.timings().tick;
        while self.state == CoordinatorState::Running {
            self.heartbeat_if_due(Utc::now());
            self.wait_for_activity(tick);

            if self.signals.take_stats_request() {
                self.dispatch_info();
            }
            let stop = self.signals.should_shutdown();

            self.drain_once();

            if stop {
                tracing::info!("shutdown requested");
                break;
            }
        }
        self.dispatch_term()
    }

    #[must_use]
    pub const fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Workers not yet joined or detached.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_live()).count()
    }

    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.node_count
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    #[must_use]
    pub const fn signals(&self) -> &SignalHandler {
        &self.signals
    }

    fn heartbeat_if_due(&self, now: DateTime<Utc>) {
        if !self.ctx.heartbeat_due(now) {
            return;
        }
        let body = format!(
            "{} is alive; monitoring {} node(s).",
            self.ctx.name(),
            self.worker_count()
        );
        self.ctx.notify(Title::MonitorHeartbeat, &body);
        self.ctx.mark_heartbeat(now);
    }

    fn wait_for_activity(&self, tick: std::time::Duration) {
        let mut select = Select::new();
        let mut watched = 0_usize;
        for handle in self.workers.iter().filter(|w| w.is_live()) {
            select.recv(&handle.link.from_worker);
            watched += 1;
        }
        if watched == 0 {
            thread::sleep(tick);
            return;
        }
        // Readiness only; messages are consumed in `drain_once`.
        let _ = select.ready_timeout(tick);
    }

    /// Take at most one message from each live worker.
    fn drain_once(&mut self) {
        for idx in 0..self.workers.len() {
            if !self.workers[idx].is_live() {
                continue;
            }
            match self.workers[idx].link.from_worker.try_recv() {
                Ok(msg) => self.dispatch(idx, msg),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.ctx.record_poll_failure();
                    let handle = &mut self.workers[idx];
                    tracing::warn!(worker = %handle.id, host = handle.node.host(), "worker link closed");
                    handle.join();
                }
            }
        }
    }

    fn dispatch(&mut self, idx: usize, msg: ThreadMsg) {
        let handle = &mut self.workers[idx];
        match msg.verb {
            Verb::Heartbeat => {
                tracing::debug!(worker = %msg.worker, host = handle.node.host(), "heartbeat");
            }
            Verb::Terminate => {
                tracing::info!(worker = %msg.worker, host = handle.node.host(), "worker exited");
                handle.join();
            }
            other => {
                tracing::warn!(worker = %msg.worker, verb = ?other, "unknown message from worker");
            }
        }
    }

    /// Snapshot and reset the counters, then send the `MONITOR STATS` report.
    pub fn dispatch_info(&self) -> StatsReport {
        let report = self.ctx.take_report(self.node_count);
        self.ctx.notify(Title::MonitorStats, &report.render());
        tracing::info!(
            heartbeats = report.stats.heartbeats,
            errors = report.stats.errors,
            successes = report.stats.successes,
            poll_failures = report.stats.poll_failures,
            "stats reported"
        );
        report
    }

    /// Terminate every live worker: request, wait for acks against one
    /// shared deadline, force-cancel stragglers, then reap.
    pub fn dispatch_term(&mut self) -> ShutdownSummary {
        if self.state == CoordinatorState::Stopped {
            return ShutdownSummary::default();
        }
        self.state = CoordinatorState::ShuttingDown;
        let timings = *self.ctx.timings();
        let mut summary = ShutdownSummary::default();

        let live: Vec<usize> = (0..self.workers.len())
            .filter(|&idx| self.workers[idx].is_live())
            .collect();

        for &idx in &live {
            let handle = &self.workers[idx];
            if handle
                .link
                .to_worker
                .try_send(ThreadMsg::new(handle.id, Verb::Terminate))
                .is_err()
            {
                tracing::warn!(worker = %handle.id, "could not deliver terminate");
            }
        }

        let deadline = Instant::now() + timings.shutdown_grace;
        let mut acked = Vec::with_capacity(live.len());
        let mut stragglers = Vec::new();
        for &idx in &live {
            if self.await_ack(idx, deadline) {
                acked.push(idx);
            } else {
                let handle = &self.workers[idx];
                tracing::warn!(worker = %handle.id, host = handle.node.host(), "no terminate ack; cancelling");
                handle.cancel();
                stragglers.push(idx);
            }
        }

        for idx in acked {
            self.workers[idx].join();
            summary.acknowledged += 1;
        }

        summary.cancelled = stragglers.len();
        let reap_deadline = Instant::now() + timings.reap_slack;
        while !stragglers.is_empty() && Instant::now() < reap_deadline {
            stragglers.retain(|&idx| {
                if self.workers[idx].is_finished() {
                    self.workers[idx].join();
                    false
                } else {
                    true
                }
            });
            if !stragglers.is_empty() {
                thread::sleep(REAP_POLL);
            }
        }
        for idx in stragglers {
            let handle = &mut self.workers[idx];
            if handle.is_finished() {
                handle.join();
                continue;
            }
            tracing::error!(worker = %handle.id, host = handle.node.host(), "worker did not exit; detaching");
            handle.detach();
            summary.leaked += 1;
        }

        self.state = CoordinatorState::Stopped;
        tracing::info!(
            acknowledged = summary.acknowledged,
            cancelled = summary.cancelled,
            leaked = summary.leaked,
            "workers stopped"
        );
        summary
    }

    /// Wait for `Terminate` from one worker, skipping other traffic. A
    /// closed link means the thread already returned.
    fn await_ack(&self, idx: usize, deadline: Instant) -> bool {
        let link = &self.workers[idx].link;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match link.from_worker.recv_timeout(remaining) {
                Ok(msg) if msg.verb == Verb::Terminate => return true,
                Ok(_) => {}
                Err(RecvTimeoutError::Disconnected) => return true,
                Err(RecvTimeoutError::Timeout) => return false,
            }
        }
    }
}

const REAP_POLL: std::time::Duration = std::time::Duration::from_millis(10);

impl Drop for Coordinator {
    fn drop(&mut self) {
        if self.state != CoordinatorState::Stopped {
            self.dispatch_term();
        }
    }
}
