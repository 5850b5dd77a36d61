//! Per-node worker thread: control-channel wait with timeout, probe, health
//! bookkeeping, and transition notifications.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use chrono::{DateTime, Utc};
use crossbeam_channel::RecvTimeoutError;

use crate::core::errors::{MonError, Result};
use crate::daemon::context::Context;
use crate::daemon::messages::{CoordinatorLink, Verb, WorkerId, WorkerLink, link};
use crate::monitor::health::{self, FailureDecision, HealthEvent};
use crate::monitor::node::Node;
use crate::notify::Title;

/// Why a worker thread returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Received a terminate directive and acknowledged it.
    Terminated,
    /// Observed forced cancellation; no acknowledgment sent.
    Cancelled,
    /// The coordinator side of the link disappeared.
    ChannelClosed,
}

/// Coordinator-side handle to one worker.
pub struct WorkerHandle {
    pub id: WorkerId,
    pub node: Arc<Node>,
    pub link: WorkerLink,
    cancel: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<WorkerExit>>,
}

impl WorkerHandle {
    /// Ask the worker to stop at its next wake-up without acknowledging.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join
            .as_ref()
            .is_none_or(std::thread::JoinHandle::is_finished)
    }

    /// Whether the thread has not been joined or detached yet.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.join.is_some()
    }

    /// Join the thread. Returns `None` if already reaped or it panicked.
    pub fn join(&mut self) -> Option<WorkerExit> {
        let handle = self.join.take()?;
        match handle.join() {
            Ok(exit) => Some(exit),
            Err(_) => {
                tracing::error!(worker = %self.id, host = self.node.host(), "worker thread panicked");
                None
            }
        }
    }

    /// Give up on the thread; it keeps running until it notices cancellation.
    pub fn detach(&mut self) {
        self.join.take();
    }
}

/// Spawn a named worker thread for `node`.
pub fn spawn(id: WorkerId, node: Arc<Node>, ctx: Arc<Context>) -> Result<WorkerHandle> {
    let (coordinator_end, worker_end) = link(id);
    let cancel = Arc::new(AtomicBool::new(false));

    let thread_node = Arc::clone(&node);
    let thread_cancel = Arc::clone(&cancel);
    let join = thread::Builder::new()
        .name(format!("hbsdmon-{}", node.host()))
        .spawn(move || worker_main(&worker_end, &thread_node, &ctx, &thread_cancel))
        .map_err(|source| MonError::Runtime {
            details: format!("failed to spawn worker for {}: {source}", node.host()),
        })?;

    Ok(WorkerHandle {
        id,
        node,
        link: coordinator_end,
        cancel,
        join: Some(join),
    })
}

fn worker_main(
    link: &CoordinatorLink,
    node: &Node,
    ctx: &Context,
    cancel: &AtomicBool,
) -> WorkerExit {
    if !link.send(Verb::Ready) {
        return WorkerExit::ChannelClosed;
    }

    match link.from_coordinator.recv() {
        Ok(msg) if msg.verb == Verb::Init => {
            ctx.notify(Title::MonitorInit, &node.describe(&ctx.name()));
            tracing::info!(worker = %link.id, host = node.host(), method = %node.method(), "worker started");
        }
        Ok(_) => {
            link.send(Verb::Terminate);
            return WorkerExit::Terminated;
        }
        Err(_) => return WorkerExit::ChannelClosed,
    }

    let exit = run_loop(link, node, ctx, cancel);
    if exit == WorkerExit::Terminated {
        link.send(Verb::Terminate);
    }
    tracing::debug!(worker = %link.id, host = node.host(), ?exit, "worker exiting");
    exit
}

fn run_loop(link: &CoordinatorLink, node: &Node, ctx: &Context, cancel: &AtomicBool) -> WorkerExit {
    loop {
        if cancel.load(Ordering::SeqCst) {
            return WorkerExit::Cancelled;
        }

        let interval = ctx.interval_for(node);
        match link.from_coordinator.recv_timeout(interval) {
            Ok(msg) => match msg.verb {
                Verb::Init => {}
                _ => return WorkerExit::Terminated,
            },
            Err(RecvTimeoutError::Disconnected) => {
                ctx.record_poll_failure();
                let err = MonError::ChannelClosed { component: "worker" };
                tracing::warn!(code = err.code(), worker = %link.id, host = node.host(), "{err}");
                return WorkerExit::ChannelClosed;
            }
            Err(RecvTimeoutError::Timeout) => {
                let passed = ctx.prober().probe(node);
                if cancel.load(Ordering::SeqCst) {
                    return WorkerExit::Cancelled;
                }
                handle_probe_result(node, ctx, passed, Utc::now());
                link.offer(Verb::Heartbeat);
            }
        }
    }
}

/// Apply one probe result: update counters, the node's failure marker, and
/// emit at most one notification.
pub fn handle_probe_result(
    node: &Node,
    ctx: &Context,
    passed: bool,
    now: DateTime<Utc>,
) -> HealthEvent {
    if passed {
        ctx.record_success();
        let Some(event) = health::record_success(node) else {
            return HealthEvent::Healthy;
        };
        tracing::info!(host = node.host(), "node back online");
        ctx.notify(Title::NodeOnline, &node.describe(&ctx.name()));
        return event;
    }

    let interval = ctx.interval_for(node);
    let recorded = ctx.policy().record_failure(node, now, interval);
    apply_failure(node, ctx, recorded)
}

/// Act on a recorded failure. A store error yields no decision and sends
/// nothing.
fn apply_failure(node: &Node, ctx: &Context, recorded: Result<FailureDecision>) -> HealthEvent {
    let decision = match recorded {
        Ok(decision) => decision,
        Err(err) => {
            tracing::error!(code = err.code(), host = node.host(), "failed to record failure: {err}");
            return HealthEvent::Unrecorded;
        }
    };
    match decision {
        FailureDecision::Onset => {
            tracing::info!(host = node.host(), "probe failed; watching for sustained outage");
        }
        FailureDecision::Suppressed { elapsed, reason } => {
            tracing::debug!(host = node.host(), elapsed, ?reason, "failure notification suppressed");
        }
        FailureDecision::Notify { elapsed } => {
            tracing::warn!(host = node.host(), elapsed, "node failure");
            ctx.notify(Title::NodeFailure, &node.failure_body(&ctx.name()));
            ctx.record_error();
        }
    }
    HealthEvent::Failed(decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DaemonSettings;
    use crate::monitor::node::{Method, NodeParams};
    use crate::monitor::probe::Prober;
    use crate::notify::MemoryNotifier;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct Scripted {
        up: AtomicBool,
        calls: AtomicUsize,
    }

    impl Prober for Scripted {
        fn probe(&self, _node: &Node) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.up.load(Ordering::SeqCst)
        }
    }

    fn setup(up: bool) -> (Arc<Context>, Arc<MemoryNotifier>, Arc<Scripted>) {
        let notifier = Arc::new(MemoryNotifier::new());
        let prober = Arc::new(Scripted {
            up: AtomicBool::new(up),
            calls: AtomicUsize::new(0),
        });
        let ctx = Context::new(&DaemonSettings::default(), notifier.clone(), prober.clone())
            .unwrap();
        (Arc::new(ctx), notifier, prober)
    }

    fn node(interval: Duration) -> Node {
        Node::new(
            "10.0.0.5",
            Method::Tcp,
            NodeParams {
                port: Some(22),
                interval: Some(interval),
                fail_message: Some("check the uplink".into()),
                ..NodeParams::default()
            },
        )
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn steady_health_is_silent() {
        let (ctx, notifier, _) = setup(true);
        let node = node(Duration::from_secs(10));
        for t in 0..3 {
            assert_eq!(
                handle_probe_result(&node, &ctx, true, at(t * 10)),
                HealthEvent::Healthy
            );
        }
        assert!(notifier.sent().is_empty());
        assert_eq!(ctx.stats().successes, 3);
    }

    #[test]
    fn outage_escalates_then_recovers_once() {
        let (ctx, notifier, _) = setup(false);
        let node = node(Duration::from_secs(10));

        handle_probe_result(&node, &ctx, false, at(0));
        handle_probe_result(&node, &ctx, false, at(15));
        assert!(notifier.sent().is_empty());
        assert_eq!(ctx.stats().errors, 0);

        let event = handle_probe_result(&node, &ctx, false, at(7_300));
        assert_eq!(
            event,
            HealthEvent::Failed(FailureDecision::Notify { elapsed: 7_300 })
        );
        assert_eq!(notifier.titles(), vec!["NODE FAILURE"]);
        assert!(notifier.sent()[0].body.ends_with("\ncheck the uplink"));
        assert_eq!(ctx.stats().errors, 1);

        let event = handle_probe_result(&node, &ctx, true, at(7_310));
        assert!(matches!(event, HealthEvent::Recovered { .. }));
        handle_probe_result(&node, &ctx, true, at(7_320));
        handle_probe_result(&node, &ctx, true, at(7_330));
        assert_eq!(notifier.titles(), vec!["NODE FAILURE", "NODE ONLINE"]);
    }

    #[test]
    fn each_outcome_emits_at_most_one_notification() {
        let (ctx, notifier, _) = setup(false);
        let node = node(Duration::from_secs(5));
        let script = [
            (false, 0),
            (false, 5),
            (true, 10),
            (false, 20),
            (false, 7_300),
            (false, 7_305),
            (true, 7_310),
        ];
        for (passed, t) in script {
            let before = notifier.sent().len();
            handle_probe_result(&node, &ctx, passed, at(t));
            assert!(notifier.sent().len() - before <= 1);
        }
        assert_eq!(
            notifier.titles(),
            vec!["NODE ONLINE", "NODE FAILURE", "NODE ONLINE"]
        );
    }

    #[test]
    fn store_error_is_not_reported_as_onset() {
        let (ctx, notifier, _) = setup(false);
        let node = node(Duration::from_secs(10));
        let event = apply_failure(
            &node,
            &ctx,
            Err(MonError::Allocation { context: "kv put" }),
        );
        assert_eq!(event, HealthEvent::Unrecorded);
        assert!(notifier.sent().is_empty());
        assert_eq!(ctx.stats().errors, 0);
        assert!(!node.kv().contains(crate::monitor::node::KEY_LASTFAIL));
    }

    #[test]
    fn worker_follows_ready_init_terminate_protocol() {
        let (ctx, notifier, prober) = setup(true);
        let node = Arc::new(node(Duration::from_millis(20)));
        let mut handle = spawn(WorkerId(0), node, ctx).unwrap();

        let ready = handle
            .link
            .from_worker
            .recv_timeout(Duration::from_secs(2))
            .unwrap();
        assert_eq!(ready.verb, Verb::Ready);
        handle
            .link
            .to_worker
            .send(crate::daemon::messages::ThreadMsg::new(WorkerId(0), Verb::Init))
            .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while prober.calls.load(Ordering::SeqCst) < 3 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(prober.calls.load(Ordering::SeqCst) >= 3);

        handle
            .link
            .to_worker
            .send(crate::daemon::messages::ThreadMsg::new(WorkerId(0), Verb::Terminate))
            .unwrap();
        let ack = handle
            .link
            .from_worker
            .iter()
            .find(|msg| msg.verb == Verb::Terminate);
        assert!(ack.is_some());
        assert_eq!(handle.join(), Some(WorkerExit::Terminated));
        assert_eq!(notifier.count(Title::MonitorInit), 1);
    }

    #[test]
    fn terminate_before_init_exits_without_probing() {
        let (ctx, notifier, prober) = setup(true);
        let mut handle = spawn(WorkerId(1), Arc::new(node(Duration::from_millis(10))), ctx).unwrap();
        assert_eq!(handle.link.from_worker.recv().unwrap().verb, Verb::Ready);
        handle
            .link
            .to_worker
            .send(crate::daemon::messages::ThreadMsg::new(WorkerId(1), Verb::Fini))
            .unwrap();
        assert_eq!(handle.link.from_worker.recv().unwrap().verb, Verb::Terminate);
        assert_eq!(handle.join(), Some(WorkerExit::Terminated));
        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn dropped_coordinator_counts_poll_failure() {
        let (ctx, _, _) = setup(true);
        let mut handle =
            spawn(WorkerId(2), Arc::new(node(Duration::from_millis(10))), Arc::clone(&ctx)).unwrap();
        assert_eq!(handle.link.from_worker.recv().unwrap().verb, Verb::Ready);
        handle
            .link
            .to_worker
            .send(crate::daemon::messages::ThreadMsg::new(WorkerId(2), Verb::Init))
            .unwrap();

        let (replacement, _) = crossbeam_channel::bounded(1);
        drop(std::mem::replace(&mut handle.link.to_worker, replacement));
        assert_eq!(handle.join(), Some(WorkerExit::ChannelClosed));
        assert_eq!(ctx.stats().poll_failures, 1);
    }
}
