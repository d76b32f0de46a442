//! The audit pipeline: spool-first logging, background delivery, retry.
//!
//! `log` appends to the disk spool before it enqueues, so an event
//! survives a crash even when it never reaches the queue. Delivery and
//! retry run on plain detached threads (no async runtime) that poll their
//! queues with a short sleep, daemon-scoped to the process: they never
//! block shutdown, and in-flight events rely on the spool for recovery.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};
use warden_types::AuditEvent;

use crate::queue::{BoundedQueue, PushResult};
use crate::sink::AuditSink;
use crate::spool::{AuditSpooler, SpoolError};

/// How long the delivery worker sleeps when its queue is empty.
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Upper bound on one retry-scheduler sleep step, so shutdown stays
/// responsive even with long retry intervals.
const RETRY_SLEEP_STEP: Duration = Duration::from_millis(100);

/// Errors raised to the request path by [`AuditPipeline::log`].
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The spool's storage is exhausted. The event was not recorded.
    #[error("audit spool disk full")]
    DiskFull,

    /// Spool I/O or serialization failure.
    #[error(transparent)]
    Spool(SpoolError),

    /// The bounded queue stayed full past the enqueue timeout.
    ///
    /// Backpressure, not loss: the event is already on disk and will be
    /// recovered at the next process start.
    #[error("audit queue full; event retained on disk")]
    QueueFull,
}

impl From<SpoolError> for AuditError {
    fn from(err: SpoolError) -> Self {
        match err {
            SpoolError::DiskFull { .. } => AuditError::DiskFull,
            other => AuditError::Spool(other),
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Tunables for the pipeline.
#[derive(Debug, Clone)]
pub struct AuditPipelineConfig {
    /// Capacity of the main delivery queue.
    pub queue_capacity: usize,
    /// How long `log` may wait for queue space before signaling
    /// backpressure.
    pub enqueue_timeout: Duration,
    /// Capacity of the failed-event queue.
    pub failed_queue_capacity: usize,
    /// How often failed events are re-enqueued for delivery.
    pub retry_interval: Duration,
}

impl Default for AuditPipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            enqueue_timeout: Duration::from_millis(500),
            failed_queue_capacity: 1024,
            retry_interval: Duration::from_secs(120),
        }
    }
}

/// Durable audit pipeline: spool, bounded queue, delivery, retry.
///
/// Agnostic to why it is asked to record an event; the decision path
/// hands it fully built [`AuditEvent`]s.
pub struct AuditPipeline {
    spooler: Arc<AuditSpooler>,
    sink: Arc<dyn AuditSink>,
    queue: Arc<BoundedQueue<AuditEvent>>,
    failed: Arc<BoundedQueue<AuditEvent>>,
    enqueue_timeout: Duration,
    retry_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl AuditPipeline {
    /// Builds the pipeline and re-seeds the queue from disk, without
    /// starting the background workers.
    ///
    /// Events spooled before a crash are pushed onto the main queue;
    /// whatever exceeds its capacity stays on disk for the next start.
    pub fn new(
        config: AuditPipelineConfig,
        spooler: AuditSpooler,
        sink: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let spooler = Arc::new(spooler);
        let queue = Arc::new(BoundedQueue::new(config.queue_capacity));
        let failed = Arc::new(BoundedQueue::new(config.failed_queue_capacity));

        let recovered = spooler.load_all()?;
        if !recovered.is_empty() {
            info!(count = recovered.len(), "re-seeding audit queue from spool");
        }
        for event in recovered {
            if let PushResult::Backpressure(_) = queue.try_push(event) {
                warn!("audit queue filled during recovery; remaining events stay on disk");
                break;
            }
        }

        Ok(Self {
            spooler,
            sink,
            queue,
            failed,
            enqueue_timeout: config.enqueue_timeout,
            retry_interval: config.retry_interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Builds the pipeline and starts its background workers.
    pub fn start(
        config: AuditPipelineConfig,
        spooler: AuditSpooler,
        sink: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let pipeline = Self::new(config, spooler, sink)?;
        pipeline.start_workers();
        Ok(pipeline)
    }

    /// Spawns the delivery worker and the failed-retry scheduler.
    ///
    /// Both threads are detached: they stop when the process exits or
    /// when [`shutdown`](Self::shutdown) is signaled.
    pub fn start_workers(&self) {
        {
            let spooler = Arc::clone(&self.spooler);
            let sink = Arc::clone(&self.sink);
            let queue = Arc::clone(&self.queue);
            let failed = Arc::clone(&self.failed);
            let shutdown = Arc::clone(&self.shutdown);
            thread::Builder::new()
                .name("warden-audit-delivery".into())
                .spawn(move || delivery_loop(&spooler, sink.as_ref(), &queue, &failed, &shutdown))
                .expect("failed to spawn audit delivery worker");
        }
        {
            let queue = Arc::clone(&self.queue);
            let failed = Arc::clone(&self.failed);
            let shutdown = Arc::clone(&self.shutdown);
            let interval = self.retry_interval;
            thread::Builder::new()
                .name("warden-audit-retry".into())
                .spawn(move || retry_loop(&queue, &failed, interval, &shutdown))
                .expect("failed to spawn audit retry scheduler");
        }
    }

    /// Records an event durably and queues it for delivery.
    ///
    /// The spool append happens first: after `log` returns `Ok` or
    /// `Err(QueueFull)` the event is on disk. `Err(DiskFull)` means the
    /// event could not be recorded at all; the caller decides whether
    /// that fails the request.
    pub fn log(&self, event: AuditEvent) -> Result<()> {
        self.spooler.append(&event)?;

        match self.queue.push_within(event, self.enqueue_timeout) {
            PushResult::Ok => Ok(()),
            PushResult::Backpressure(_) => Err(AuditError::QueueFull),
        }
    }

    /// Signals the background workers to stop. Does not join them.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Events currently awaiting delivery (main queue only).
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Events currently parked for retry.
    pub fn failed_pending(&self) -> usize {
        self.failed.len()
    }

    /// The spooler backing this pipeline.
    pub fn spooler(&self) -> &AuditSpooler {
        &self.spooler
    }
}

/// Delivery worker: pop, push to sink, remove from spool on success.
fn delivery_loop(
    spooler: &AuditSpooler,
    sink: &dyn AuditSink,
    queue: &BoundedQueue<AuditEvent>,
    failed: &BoundedQueue<AuditEvent>,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let Some(event) = queue.try_pop() else {
            thread::sleep(IDLE_POLL);
            continue;
        };

        match sink.push(&event) {
            Ok(()) => {
                if let Err(err) = spooler.remove(&event) {
                    // Delivered but still on disk: at-least-once holds, the
                    // event will be re-delivered after a restart.
                    error!(error = %err, "failed to clear delivered audit event from spool");
                }
            }
            Err(err) => {
                warn!(error = %err, "audit delivery failed; scheduling retry");
                if let PushResult::Backpressure(_) = failed.try_push(event) {
                    // Dropped from active retry only; the spool still holds
                    // it and the next process start recovers it.
                    warn!("failed-event queue full; event recoverable from spool at restart");
                }
            }
        }
    }
}

/// Retry scheduler: every `interval`, move failed events back for another
/// delivery attempt.
fn retry_loop(
    queue: &BoundedQueue<AuditEvent>,
    failed: &BoundedQueue<AuditEvent>,
    interval: Duration,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let wake = Instant::now() + interval;
        while Instant::now() < wake {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            thread::sleep(RETRY_SLEEP_STEP.min(wake.saturating_duration_since(Instant::now())));
        }

        for event in failed.drain() {
            if let PushResult::Backpressure(event) = queue.try_push(event) {
                // Main queue full: park it again rather than dropping.
                if let PushResult::Backpressure(_) = failed.try_push(event) {
                    warn!("failed-event queue full during retry; event stays on disk");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use warden_types::{AppId, AuditResult, PolicyId, RequestKind, TenantId};

    fn event(seq: u64) -> AuditEvent {
        AuditEvent {
            event_time: chrono::Utc::now(),
            tenant_id: TenantId::new(1),
            thread_id: "t-1".into(),
            thread_sequence_number: seq,
            request_type: RequestKind::Prompt,
            user_id: "alice".into(),
            app_key: "app-key".into(),
            app_id: AppId::new(1),
            app_name: "support-bot".into(),
            result: AuditResult::Allowed,
            traits: vec![],
            masked_traits: BTreeMap::new(),
            messages: vec![],
            config_policy_ids: vec![PolicyId::new(7)],
            application_policy_ids: vec![],
            client_ip: None,
            client_hostname: None,
            encryption_key_id: None,
        }
    }

    /// Sink that records deliveries and can be told to fail.
    #[derive(Default)]
    struct MemorySink {
        delivered: Mutex<Vec<AuditEvent>>,
        failing: AtomicBool,
    }

    impl MemorySink {
        fn delivered(&self) -> Vec<AuditEvent> {
            self.delivered.lock().expect("sink lock").clone()
        }
    }

    impl AuditSink for MemorySink {
        fn push(&self, event: &AuditEvent) -> std::result::Result<(), crate::sink::SinkError> {
            if self.failing.load(Ordering::Relaxed) {
                return Err(crate::sink::SinkError("sink unreachable".into()));
            }
            self.delivered.lock().expect("sink lock").push(event.clone());
            Ok(())
        }
    }

    fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
        let end = Instant::now() + deadline;
        while Instant::now() < end {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        check()
    }

    fn config() -> AuditPipelineConfig {
        AuditPipelineConfig {
            queue_capacity: 8,
            enqueue_timeout: Duration::from_millis(50),
            failed_queue_capacity: 8,
            retry_interval: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_out_of_space_spool_error_becomes_disk_full() {
        let enospc = SpoolError::DiskFull {
            path: std::path::PathBuf::from("/audit/audit_spool_2026-08-30.json"),
        };
        assert!(matches!(AuditError::from(enospc), AuditError::DiskFull));

        let generic = SpoolError::Io {
            path: std::path::PathBuf::from("/audit/audit_spool_2026-08-30.json"),
            source: std::io::Error::other("read-only filesystem"),
        };
        assert!(matches!(AuditError::from(generic), AuditError::Spool(_)));
    }

    #[test]
    fn test_log_delivers_and_clears_spool() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = Arc::new(MemorySink::default());
        let pipeline = AuditPipeline::start(
            config(),
            AuditSpooler::open(dir.path()).expect("open"),
            Arc::clone(&sink) as Arc<dyn AuditSink>,
        )
        .expect("pipeline");

        pipeline.log(event(1)).expect("log");

        assert!(
            wait_until(Duration::from_secs(2), || sink.delivered().len() == 1),
            "event must reach the sink"
        );
        assert!(
            wait_until(Duration::from_secs(2), || pipeline
                .spooler()
                .load_all()
                .expect("load")
                .is_empty()),
            "spool entry must be removed after confirmed delivery"
        );
        pipeline.shutdown();
    }

    #[test]
    fn test_queue_full_is_backpressure_not_loss() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = Arc::new(MemorySink::default());
        // Workers not started: the queue fills and stays full.
        let pipeline = AuditPipeline::new(
            AuditPipelineConfig {
                queue_capacity: 2,
                enqueue_timeout: Duration::from_millis(20),
                ..config()
            },
            AuditSpooler::open(dir.path()).expect("open"),
            sink,
        )
        .expect("pipeline");

        pipeline.log(event(1)).expect("log");
        pipeline.log(event(2)).expect("log");

        let started = Instant::now();
        let result = pipeline.log(event(3));
        assert!(matches!(result, Err(AuditError::QueueFull)));
        assert!(
            started.elapsed() < Duration::from_millis(500),
            "log must fail fast once the timeout elapses"
        );

        // The rejected event is still durably recorded.
        assert_eq!(pipeline.spooler().load_all().expect("load").len(), 3);
    }

    #[test]
    fn test_failed_delivery_retries_until_sink_recovers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = Arc::new(MemorySink::default());
        sink.failing.store(true, Ordering::Relaxed);

        let pipeline = AuditPipeline::start(
            config(),
            AuditSpooler::open(dir.path()).expect("open"),
            Arc::clone(&sink) as Arc<dyn AuditSink>,
        )
        .expect("pipeline");

        pipeline.log(event(1)).expect("log");

        assert!(
            wait_until(Duration::from_secs(2), || pipeline.failed_pending() == 1
                || !sink.delivered().is_empty()),
            "event must land in the failed queue while the sink is down"
        );
        // Still on disk while undelivered.
        assert_eq!(pipeline.spooler().load_all().expect("load").len(), 1);

        sink.failing.store(false, Ordering::Relaxed);
        assert!(
            wait_until(Duration::from_secs(5), || sink.delivered().len() == 1),
            "retry scheduler must re-deliver after the sink recovers"
        );
        assert!(
            wait_until(Duration::from_secs(2), || pipeline
                .spooler()
                .load_all()
                .expect("load")
                .is_empty()),
            "spool entry must be cleared after the retried delivery"
        );
        pipeline.shutdown();
    }

    #[test]
    fn test_restart_reseeds_queue_from_spool() {
        let dir = tempfile::tempdir().expect("tempdir");

        // First process: spool two events, deliver nothing.
        {
            let spooler = AuditSpooler::open(dir.path()).expect("open");
            spooler.append(&event(1)).expect("append");
            spooler.append(&event(2)).expect("append");
        }

        // Second process: recovery pushes both onto the queue.
        let sink = Arc::new(MemorySink::default());
        let pipeline = AuditPipeline::new(
            config(),
            AuditSpooler::open(dir.path()).expect("open"),
            Arc::clone(&sink) as Arc<dyn AuditSink>,
        )
        .expect("pipeline");
        assert_eq!(pipeline.pending(), 2);

        pipeline.start_workers();
        assert!(
            wait_until(Duration::from_secs(2), || sink.delivered().len() == 2),
            "recovered events must be delivered"
        );
        pipeline.shutdown();
    }

    #[test]
    fn test_delivery_failure_never_reaches_log_caller() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = Arc::new(MemorySink::default());
        sink.failing.store(true, Ordering::Relaxed);

        let pipeline = AuditPipeline::start(
            config(),
            AuditSpooler::open(dir.path()).expect("open"),
            sink,
        )
        .expect("pipeline");

        // log succeeds even though the sink is down.
        pipeline.log(event(1)).expect("log must not surface sink failures");
        pipeline.shutdown();
    }
}
