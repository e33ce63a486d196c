//! Ordered, latest-wins dispatch of progress writes.
//!
//! Writes are queued to one worker thread. Before each batch the worker
//! drains everything pending and keeps only the newest write per title and
//! kind, then applies them in sequence order. A failed write is logged and
//! dropped; the next navigation overwrites it anyway.
//!
//! Queued writes and synchronous beacons go through one [`Applier`], so a
//! store only ever sees one write at a time and never an older write after a
//! newer one for the same slot. Stores without a server-side sequence guard
//! rely on this.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use chrono::Utc;

use super::ports::{PersistencePort, ProgressStore, WatchPosition};

/// Strictly increasing sequence numbers, seeded from the wall clock so that
/// a later session always outranks an earlier one.
#[derive(Debug)]
pub struct Sequencer {
    last: AtomicI64,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    pub fn next(&self) -> i64 {
        let now = Utc::now().timestamp_micros();
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(current + 1);
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WriteOp {
    Progress { title_id: String, percent: u8 },
    Position(WatchPosition),
}

impl WriteOp {
    fn slot(&self) -> (String, u8) {
        match self {
            Self::Progress { title_id, .. } => (title_id.clone(), 0),
            Self::Position(position) => (position.title_id.clone(), 1),
        }
    }

    fn apply(&self, store: &dyn ProgressStore, seq: i64) -> anyhow::Result<()> {
        match self {
            Self::Progress { title_id, percent } => store.write_progress(title_id, *percent, seq),
            Self::Position(position) => store.write_position(position, seq),
        }
    }
}

/// Applies writes one at a time and drops any that a newer applied write
/// for the same slot already outranks.
struct Applier {
    store: Arc<dyn ProgressStore>,
    applied: Mutex<HashMap<(String, u8), i64>>,
}

impl Applier {
    fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self {
            store,
            applied: Mutex::new(HashMap::new()),
        }
    }

    fn apply(&self, seq: i64, op: &WriteOp) {
        // Held across the store call: an in-flight write finishes before the next starts.
        let mut applied = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = op.slot();
        if let Some(&newest) = applied.get(&slot)
            && newest > seq
        {
            tracing::debug!(title = %slot.0, seq, newest, "skipping outranked write");
            return;
        }
        match op.apply(self.store.as_ref(), seq) {
            Ok(()) => {
                applied.insert(slot, seq);
            }
            Err(err) => tracing::warn!(error = %err, seq, "progress write failed"),
        }
    }
}

#[derive(Debug)]
struct Queued {
    seq: i64,
    op: WriteOp,
}

/// [`PersistencePort`] over any [`ProgressStore`].
pub struct ProgressWriter {
    applier: Arc<Applier>,
    sequencer: Arc<Sequencer>,
    tx: Mutex<Option<Sender<Queued>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ProgressWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressWriter")
            .field("sequencer", &self.sequencer)
            .finish_non_exhaustive()
    }
}

impl ProgressWriter {
    pub fn spawn(store: Arc<dyn ProgressStore>) -> Self {
        let (tx, rx) = mpsc::channel::<Queued>();
        let applier = Arc::new(Applier::new(store));
        let worker_applier = Arc::clone(&applier);
        let worker = std::thread::Builder::new()
            .name("progress-writer".to_string())
            .spawn(move || run_worker(&worker_applier, rx));
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::error!(error = %err, "failed to start progress writer thread");
                None
            }
        };
        Self {
            applier,
            sequencer: Arc::new(Sequencer::new()),
            tx: Mutex::new(worker.is_some().then_some(tx)),
            worker: Mutex::new(worker),
        }
    }

    fn enqueue(&self, op: WriteOp) {
        let seq = self.sequencer.next();
        let sent = self
            .tx
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|tx| tx.send(Queued { seq, op: op.clone() })));
        match sent {
            Some(Ok(())) => {}
            // No worker: write inline rather than lose the update.
            _ => self.applier.apply(seq, &op),
        }
    }

    fn write_now(&self, op: WriteOp) {
        let seq = self.sequencer.next();
        self.applier.apply(seq, &op);
    }

    /// Stop accepting writes and wait until everything queued is applied.
    pub fn flush(&self) {
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
        let handle = self.worker.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            tracing::error!("progress writer thread panicked");
        }
    }
}

impl Drop for ProgressWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

impl PersistencePort for ProgressWriter {
    fn update_progress(&self, title_id: &str, percent: u8) {
        self.enqueue(WriteOp::Progress {
            title_id: title_id.to_string(),
            percent: percent.min(100),
        });
    }

    fn update_position(&self, title_id: &str, season_id: &str, episode_id: &str) {
        self.enqueue(WriteOp::Position(WatchPosition {
            title_id: title_id.to_string(),
            season_id: Some(season_id.to_string()),
            episode_id: Some(episode_id.to_string()),
        }));
    }

    fn read_progress(&self) -> HashMap<String, u8> {
        self.applier.store.load_progress().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to read stored progress");
            HashMap::new()
        })
    }

    fn read_positions(&self) -> HashMap<String, WatchPosition> {
        self.applier.store.load_positions().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to read stored positions");
            HashMap::new()
        })
    }

    fn beacon_progress(&self, title_id: &str, percent: u8) {
        self.write_now(WriteOp::Progress {
            title_id: title_id.to_string(),
            percent: percent.min(100),
        });
    }

    fn beacon_position(&self, title_id: &str, season_id: &str, episode_id: &str) {
        self.write_now(WriteOp::Position(WatchPosition {
            title_id: title_id.to_string(),
            season_id: Some(season_id.to_string()),
            episode_id: Some(episode_id.to_string()),
        }));
    }
}

fn run_worker(applier: &Applier, rx: Receiver<Queued>) {
    while let Ok(first) = rx.recv() {
        let mut pending = vec![first];
        pending.extend(rx.try_iter());
        for queued in coalesce(pending) {
            applier.apply(queued.seq, &queued.op);
        }
    }
    tracing::debug!("progress writer stopped");
}

/// Newest write per (title, kind), in ascending sequence order.
fn coalesce(pending: Vec<Queued>) -> Vec<Queued> {
    let mut latest: HashMap<(String, u8), Queued> = HashMap::new();
    for queued in pending {
        let slot = queued.op.slot();
        match latest.get(&slot) {
            Some(existing) if existing.seq > queued.seq => {}
            _ => {
                latest.insert(slot, queued);
            }
        }
    }
    let ordered: BTreeMap<i64, Queued> = latest
        .into_values()
        .map(|queued| (queued.seq, queued))
        .collect();
    ordered.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(seq: i64, title_id: &str, percent: u8) -> Queued {
        Queued {
            seq,
            op: WriteOp::Progress {
                title_id: title_id.to_string(),
                percent,
            },
        }
    }

    /// Accepts every write in arrival order, with no sequence guard of its own.
    #[derive(Default)]
    struct UnguardedStore {
        writes: Mutex<Vec<(i64, u8)>>,
    }

    impl ProgressStore for UnguardedStore {
        fn write_progress(&self, _title_id: &str, percent: u8, seq: i64) -> anyhow::Result<()> {
            self.writes.lock().expect("writes lock").push((seq, percent));
            Ok(())
        }

        fn write_position(&self, _position: &WatchPosition, _seq: i64) -> anyhow::Result<()> {
            Ok(())
        }

        fn load_progress(&self) -> anyhow::Result<HashMap<String, u8>> {
            Ok(HashMap::new())
        }

        fn load_positions(&self) -> anyhow::Result<HashMap<String, WatchPosition>> {
            Ok(HashMap::new())
        }
    }

    fn progress_op(percent: u8) -> WriteOp {
        WriteOp::Progress {
            title_id: "show".to_string(),
            percent,
        }
    }

    #[test]
    fn applier_drops_writes_outranked_by_an_applied_one() {
        let store = Arc::new(UnguardedStore::default());
        let applier = Applier::new(store.clone());
        applier.apply(20, &progress_op(60));
        applier.apply(10, &progress_op(40));
        applier.apply(30, &progress_op(70));

        let writes = store.writes.lock().expect("writes lock").clone();
        assert_eq!(writes, vec![(20, 60), (30, 70)]);
    }

    #[test]
    fn applier_tracks_titles_and_kinds_separately() {
        let store = Arc::new(UnguardedStore::default());
        let applier = Applier::new(store.clone());
        applier.apply(20, &progress_op(60));
        applier.apply(
            10,
            &WriteOp::Progress {
                title_id: "other".to_string(),
                percent: 10,
            },
        );

        assert_eq!(store.writes.lock().expect("writes lock").len(), 2);
    }

    #[test]
    fn sequencer_is_strictly_increasing() {
        let sequencer = Sequencer::new();
        let mut last = sequencer.next();
        for _ in 0..1000 {
            let next = sequencer.next();
            assert!(next > last, "{next} should be greater than {last}");
            last = next;
        }
    }

    #[test]
    fn coalesce_keeps_latest_write_per_title_in_sequence_order() {
        let batch = vec![
            progress(1, "a", 10),
            progress(2, "b", 20),
            progress(3, "a", 30),
            progress(4, "a", 40),
        ];
        let applied: Vec<(i64, WriteOp)> = coalesce(batch)
            .into_iter()
            .map(|queued| (queued.seq, queued.op))
            .collect();
        assert_eq!(
            applied,
            vec![
                (
                    2,
                    WriteOp::Progress {
                        title_id: "b".to_string(),
                        percent: 20
                    }
                ),
                (
                    4,
                    WriteOp::Progress {
                        title_id: "a".to_string(),
                        percent: 40
                    }
                ),
            ]
        );
    }

    #[test]
    fn coalesce_keeps_progress_and_position_apart() {
        let batch = vec![
            progress(1, "a", 10),
            Queued {
                seq: 2,
                op: WriteOp::Position(WatchPosition {
                    title_id: "a".to_string(),
                    season_id: Some("s1".to_string()),
                    episode_id: Some("e1".to_string()),
                }),
            },
        ];
        assert_eq!(coalesce(batch).len(), 2);
    }
}
