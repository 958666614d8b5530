use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use voicewire_types::{OpCode, encode_envelope};

// Maximum length of array of latencies because we don't like to keep it
// around 10,000+ entries.
const LATENCIES_MAX_LEN: usize = 1000;

/// The server's interval is shortened by this factor so that a slow
/// network does not make us miss the deadline.
const INTERVAL_MARGIN: f64 = 0.75;

/// Keeps the control channel alive and notices when the peer stops answering.
///
/// Each cycle sleeps for the (shortened) interval, checks that the previous
/// heartbeat was acknowledged and sends a new one. A missed acknowledgement
/// calls the lost callback once per [`start`].
///
/// [`start`]: Heartbeater::start
pub(crate) struct Heartbeater {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    acknowledged: AtomicBool,
    lost_reported: AtomicBool,
    killed: AtomicBool,
    paused: watch::Sender<bool>,
    outbound: mpsc::UnboundedSender<String>,
    on_lost: Box<dyn Fn() + Send + Sync>,
    stats: Mutex<Stats>,
    epoch: Instant,
}

#[derive(Default)]
struct Stats {
    /// Indicates when the last heartbeat was sent.
    sent: Option<Instant>,

    // VecDeque is faster than Vec with this case here.
    latencies: VecDeque<Duration>,
}

impl Heartbeater {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        on_lost: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let (paused, _) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                acknowledged: AtomicBool::new(false),
                lost_reported: AtomicBool::new(false),
                killed: AtomicBool::new(false),
                paused,
                outbound,
                on_lost: Box::new(on_lost),
                stats: Mutex::new(Stats::default()),
                epoch: Instant::now(),
            }),
            task: Mutex::new(None),
        }
    }

    /// (Re)starts the cycle with the server-provided `interval`.
    ///
    /// Replaces any running cycle and re-arms the lost callback.
    pub fn start(&self, interval: Duration) {
        if self.shared.killed.load(Ordering::SeqCst) {
            return;
        }

        let interval = Duration::try_from_secs_f64(interval.as_secs_f64() * INTERVAL_MARGIN)
            .unwrap_or(interval);
        debug!(?interval, "starting heartbeats");

        let mut task = self.task.lock();
        if let Some(old) = task.take() {
            old.abort();
        }

        self.shared.lost_reported.store(false, Ordering::SeqCst);
        self.shared.stats.lock().sent = None;
        self.shared.paused.send_replace(false);
        *task = Some(tokio::spawn(cycle(self.shared.clone(), interval)));
    }

    /// Records an acknowledgement from the server.
    pub fn ack(&self) {
        self.shared.acknowledged.store(true, Ordering::SeqCst);

        let mut stats = self.shared.stats.lock();
        if let Some(sent) = stats.sent.take() {
            if stats.latencies.len() == LATENCIES_MAX_LEN {
                stats.latencies.pop_front();
            }

            let latency = sent.elapsed();
            stats.latencies.push_back(latency);
            trace!(?latency, "heartbeat acknowledged");
        }
    }

    pub fn pause(&self) {
        self.shared.paused.send_replace(true);
    }

    pub fn resume(&self) {
        if !self.shared.killed.load(Ordering::SeqCst) {
            self.shared.paused.send_replace(false);
        }
    }

    /// Stops the cycle for good.
    pub fn kill(&self) {
        if self.shared.killed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shared.paused.send_replace(true);
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        debug!("heartbeats stopped");
    }

    pub fn is_killed(&self) -> bool {
        self.shared.killed.load(Ordering::SeqCst)
    }

    /// Snapshot of the latencies observed so far.
    pub fn info(&self) -> HeartbeatInfo {
        let stats = self.shared.stats.lock();
        HeartbeatInfo {
            recent: stats.latencies.back().copied(),
            average: average(&stats.latencies),
            samples: stats.latencies.len(),
        }
    }
}

impl Drop for Heartbeater {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for Heartbeater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heartbeater")
            .field("paused", &*self.shared.paused.borrow())
            .field("killed", &self.shared.killed.load(Ordering::Relaxed))
            .field("latencies", &self.shared.stats.lock().latencies.len())
            .finish_non_exhaustive()
    }
}

async fn cycle(shared: Arc<Shared>, interval: Duration) {
    let mut paused = shared.paused.subscribe();
    loop {
        // Waiting on both sides of the sleep keeps a paused cycle from
        // firing the moment it is resumed with stale acknowledgement state.
        if paused.wait_for(|paused| !paused).await.is_err() {
            return;
        }
        tokio::time::sleep(interval).await;
        if paused.wait_for(|paused| !paused).await.is_err() {
            return;
        }

        if !shared.acknowledged.swap(false, Ordering::SeqCst)
            && !shared.lost_reported.swap(true, Ordering::SeqCst)
        {
            warn!("heartbeat was not acknowledged, connection is considered lost");
            (shared.on_lost)();
        }

        let nonce = u64::try_from(shared.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        let payload = match encode_envelope(OpCode::Heartbeat, &nonce) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(?error, "could not encode heartbeat");
                continue;
            }
        };

        shared.stats.lock().sent = Some(Instant::now());
        if shared.outbound.send(payload).is_err() {
            return;
        }
        trace!(nonce, "heartbeat sent");
    }
}

/// Heartbeat statistics of the connection as of the time when
/// [`VoiceClient::heartbeat`] is being called.
///
/// [`VoiceClient::heartbeat`]: super::VoiceClient::heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatInfo {
    /// Latency of the most recent acknowledged heartbeat.
    pub recent: Option<Duration>,

    /// Average over the retained latencies.
    pub average: Option<Duration>,

    /// How many latencies are retained.
    pub samples: usize,
}

fn average(latencies: &VecDeque<Duration>) -> Option<Duration> {
    // Clippy:
    // The value of LATENCIES_MAX_LEN is less than a million so we're
    // not concerned about the truncation or something.
    #[allow(clippy::cast_possible_truncation)]
    let len = latencies.len().min(LATENCIES_MAX_LEN) as u32;
    latencies
        .iter()
        .fold(Duration::ZERO, |acc, entry| acc + *entry)
        .checked_div(len)
}
