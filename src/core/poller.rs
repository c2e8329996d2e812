/// Poll loop: countdown state machine plus the driver that owns the history
///
/// `PollScheduler` is the pure state machine. `Poller` wires it to a
/// `StatusSource` and the `SeriesStore`: fetches run on a spawned task and
/// their result comes back over a channel, so the owner of the `Poller`
/// (the UI loop or the headless watcher) is the only thing that ever mutates
/// the store.

use chrono::{DateTime, Local, Utc};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::core::client::{FetchError, StatusSource};
use crate::core::series::SeriesStore;
use crate::core::snapshot::ClusterSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    /// Seconds left before the next fetch
    Waiting(u32),
    Fetching,
}

#[derive(Debug, Clone)]
pub struct PollScheduler {
    state: PollState,
    period: u32,
}

impl PollScheduler {
    pub fn new(period_secs: u32) -> Self {
        Self {
            state: PollState::Idle,
            period: period_secs.max(1),
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    /// Seconds until the next fetch, `None` unless waiting
    pub fn countdown(&self) -> Option<u32> {
        match self.state {
            PollState::Waiting(n) => Some(n),
            _ => None,
        }
    }

    /// Idle -> Waiting(period). Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.state == PollState::Idle {
            self.state = PollState::Waiting(self.period);
            true
        } else {
            false
        }
    }

    /// One-second tick. Returns true when the countdown ran out and a fetch must begin.
    pub fn tick(&mut self) -> bool {
        match self.state {
            PollState::Waiting(n) if n > 1 => {
                self.state = PollState::Waiting(n - 1);
                false
            }
            PollState::Waiting(_) => {
                self.state = PollState::Fetching;
                true
            }
            PollState::Idle | PollState::Fetching => false,
        }
    }

    /// Manual refresh. Drops any pending countdown; ignored while a fetch is outstanding.
    pub fn request_refresh(&mut self) -> bool {
        if self.state == PollState::Fetching {
            false
        } else {
            self.state = PollState::Fetching;
            true
        }
    }

    /// Fetch finished, successfully or not
    pub fn complete(&mut self) {
        if self.state == PollState::Fetching {
            self.state = PollState::Waiting(self.period);
        }
    }
}

/// What a finished fetch did
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Updated { hosts: usize },
    Failed(FetchError),
}

pub struct Poller {
    scheduler: PollScheduler,
    store: SeriesStore,
    source: Arc<dyn StatusSource>,
    result_tx: UnboundedSender<Result<ClusterSnapshot, FetchError>>,
    result_rx: UnboundedReceiver<Result<ClusterSnapshot, FetchError>>,
    snapshot: Option<ClusterSnapshot>,
    last_success: Option<DateTime<Local>>,
    last_error: Option<FetchError>,
    polls: u64,
}

impl Poller {
    pub fn new(source: Arc<dyn StatusSource>, period_secs: u32, max_points: usize) -> Self {
        let (result_tx, result_rx) = unbounded_channel();

        Self {
            scheduler: PollScheduler::new(period_secs),
            store: SeriesStore::with_capacity(max_points),
            source,
            result_tx,
            result_rx,
            snapshot: None,
            last_success: None,
            last_error: None,
            polls: 0,
        }
    }

    pub fn start(&mut self) {
        if self.scheduler.start() {
            info!(period = self.scheduler.period(), "poll loop started");
        }
    }

    /// Drive the countdown; call once per second
    pub fn on_second(&mut self) {
        if self.scheduler.tick() {
            self.spawn_fetch();
        }
    }

    /// Fetch now. Returns false when a fetch is already outstanding.
    pub fn refresh(&mut self) -> bool {
        if self.scheduler.request_refresh() {
            debug!("manual refresh");
            self.spawn_fetch();
            true
        } else {
            debug!("refresh ignored, fetch already in flight");
            false
        }
    }

    fn spawn_fetch(&self) {
        let source = Arc::clone(&self.source);
        let tx = self.result_tx.clone();

        tokio::spawn(async move {
            let result = source.fetch().await;
            // Receiver lives as long as the poller
            let _ = tx.send(result);
        });
    }

    /// Apply a finished fetch if one is waiting (non-blocking)
    pub fn try_complete(&mut self) -> Option<PollEvent> {
        match self.result_rx.try_recv() {
            Ok(result) => Some(self.apply(result)),
            Err(_) => None,
        }
    }

    /// Wait for the outstanding fetch. Returns `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<PollEvent> {
        if self.scheduler.state() != PollState::Fetching {
            return None;
        }
        let result = self.result_rx.recv().await?;
        Some(self.apply(result))
    }

    fn apply(&mut self, result: Result<ClusterSnapshot, FetchError>) -> PollEvent {
        self.polls += 1;

        let event = match result {
            Ok(snapshot) => {
                let now = Utc::now().timestamp_millis();
                for node in &snapshot.nodes {
                    self.store.record(&node.host, now, node.delay_value());
                }

                let hosts = snapshot.nodes.len();
                debug!(hosts, "status poll ok");
                self.snapshot = Some(snapshot);
                self.last_success = Some(Local::now());
                self.last_error = None;
                PollEvent::Updated { hosts }
            }
            Err(e) => {
                warn!(error = %e, "status poll failed");
                self.last_error = Some(e.clone());
                PollEvent::Failed(e)
            }
        };

        self.scheduler.complete();
        event
    }

    pub fn state(&self) -> PollState {
        self.scheduler.state()
    }

    pub fn countdown(&self) -> Option<u32> {
        self.scheduler.countdown()
    }

    pub fn in_flight(&self) -> usize {
        usize::from(self.scheduler.state() == PollState::Fetching)
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    pub fn snapshot(&self) -> Option<&ClusterSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn last_success(&self) -> Option<DateTime<Local>> {
        self.last_success
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }
}
