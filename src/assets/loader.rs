use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::assets::source::{ArrayKey, ArraySource, BufferKind};
use crate::catalog::model::Variation;
use crate::data::npy::decode_npy;
use crate::data::set::ArraySet;
use crate::foundation::core::ViewId;
use crate::foundation::error::{PointreelError, PointreelResult};

/// Loader tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOpts {
    /// Read granularity; progress is reported at most once per chunk.
    pub chunk_bytes: usize,
    /// Completed variations retained for instant re-selection. `0` disables caching.
    pub cache_capacity: usize,
    /// Stop reading as soon as a newer load for the same view is issued.
    pub abort_superseded: bool,
}

impl Default for LoaderOpts {
    fn default() -> Self {
        Self {
            chunk_bytes: 64 * 1024,
            cache_capacity: 4,
            abort_superseded: true,
        }
    }
}

/// Outcome of polling a [`PendingLoad`].
#[derive(Debug)]
pub enum LoadPoll {
    Pending,
    Loaded(Arc<ArraySet>),
    Failed(PointreelError),
    /// The worker stopped because a newer load for the same view was issued.
    Aborted,
}

enum LoadEvent {
    Progress(f32),
    Done(PointreelResult<Arc<ArraySet>>),
    Aborted,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    prefix: String,
    variation: String,
}

#[derive(Default)]
struct ResultCache {
    entries: HashMap<CacheKey, Arc<ArraySet>>,
    lru: VecDeque<CacheKey>,
}

impl ResultCache {
    fn get(&mut self, key: &CacheKey) -> Option<Arc<ArraySet>> {
        let hit = self.entries.get(key).cloned()?;
        self.touch(key);
        Some(hit)
    }

    fn insert(&mut self, key: CacheKey, set: Arc<ArraySet>, capacity: usize) {
        if capacity == 0 {
            return;
        }
        self.entries.insert(key.clone(), set);
        self.touch(&key);
        while self.lru.len() > capacity {
            if let Some(old) = self.lru.pop_front() {
                self.entries.remove(&old);
            }
        }
    }

    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.lru.iter().position(|k| k == key) {
            self.lru.remove(pos);
        }
        self.lru.push_back(key.clone());
    }
}

struct LoaderShared {
    source: Arc<dyn ArraySource>,
    opts: LoaderOpts,
    generations: Mutex<HashMap<ViewId, Arc<AtomicU64>>>,
    cache: Mutex<ResultCache>,
}

/// Supersession check handed to a worker.
struct Ticket {
    latest: Arc<AtomicU64>,
    generation: u64,
    abortable: bool,
}

impl Ticket {
    fn superseded(&self) -> bool {
        self.abortable && self.latest.load(Ordering::Acquire) != self.generation
    }
}

/// Resolves `(view, variation, path prefix)` into an [`ArraySet`] on a worker thread.
///
/// Cloning is cheap; clones share the source, the cache and the per-view generations.
#[derive(Clone)]
pub struct AssetLoader {
    shared: Arc<LoaderShared>,
}

impl std::fmt::Debug for AssetLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLoader")
            .field("opts", &self.shared.opts)
            .finish_non_exhaustive()
    }
}

impl AssetLoader {
    pub fn new(source: Arc<dyn ArraySource>, opts: LoaderOpts) -> Self {
        Self {
            shared: Arc::new(LoaderShared {
                source,
                opts,
                generations: Mutex::new(HashMap::new()),
                cache: Mutex::new(ResultCache::default()),
            }),
        }
    }

    pub fn opts(&self) -> &LoaderOpts {
        &self.shared.opts
    }

    /// Start loading every buffer of `variation` (one per channel plus class ids).
    ///
    /// `on_start` runs before this returns. `on_progress` runs from [`PendingLoad::poll`] on
    /// the caller's thread and only reaches `100.0` once every byte has arrived.
    #[tracing::instrument(skip_all, fields(view = %view, variation = %variation.name))]
    pub fn load(
        &self,
        view: ViewId,
        variation: &Variation,
        path_prefix: &str,
        on_start: impl FnOnce(),
        on_progress: impl FnMut(f32) + 'static,
    ) -> PendingLoad {
        let ticket = self.next_ticket(view);
        on_start();

        let cache_key = CacheKey {
            prefix: path_prefix.trim_matches('/').to_owned(),
            variation: variation.name.clone(),
        };
        let hit = self
            .shared
            .cache
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&cache_key);
        if let Some(set) = hit {
            tracing::debug!("served from cache");
            return PendingLoad::ready(view, &variation.name, set, on_progress);
        }

        let keys = buffer_keys(variation, path_prefix);
        let (tx, rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name(format!("pointreel-load-{}", view.0))
            .spawn(move || {
                let event = match read_variation(&shared, &keys, &ticket, &tx) {
                    Ok(Some(set)) => {
                        let set = Arc::new(set);
                        shared
                            .cache
                            .lock()
                            .unwrap_or_else(|p| p.into_inner())
                            .insert(cache_key, Arc::clone(&set), shared.opts.cache_capacity);
                        LoadEvent::Done(Ok(set))
                    }
                    Ok(None) => LoadEvent::Aborted,
                    Err(e) => LoadEvent::Done(Err(e)),
                };
                // The receiver may already be gone; nothing to report to then.
                let _ = tx.send(event);
            });

        if let Err(e) = spawned {
            tracing::warn!(error = %e, "failed to spawn loader worker");
            let (tx, rx) = mpsc::channel();
            let _ = tx.send(LoadEvent::Done(Err(PointreelError::load(format!(
                "failed to spawn loader worker: {e}"
            )))));
            return PendingLoad::streaming(view, &variation.name, rx, on_progress);
        }

        PendingLoad::streaming(view, &variation.name, rx, on_progress)
    }

    fn next_ticket(&self, view: ViewId) -> Ticket {
        let latest = Arc::clone(
            self.shared
                .generations
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .entry(view)
                .or_default(),
        );
        let generation = latest.fetch_add(1, Ordering::AcqRel) + 1;
        Ticket {
            latest,
            generation,
            abortable: self.shared.opts.abort_superseded,
        }
    }

    /// Forget supersession state for a view that is being torn down.
    pub fn forget_view(&self, view: ViewId) {
        let removed = self
            .shared
            .generations
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&view);
        // Bumping the counter makes any worker still running for this view stop early.
        if let Some(latest) = removed {
            latest.fetch_add(1, Ordering::AcqRel);
        }
    }
}

fn buffer_keys(variation: &Variation, prefix: &str) -> Vec<ArrayKey> {
    variation
        .channels
        .iter()
        .map(|c| BufferKind::Channel(c.name.clone()))
        .chain(std::iter::once(BufferKind::ClassIds))
        .map(|buffer| ArrayKey {
            prefix: prefix.to_owned(),
            variation: variation.name.clone(),
            buffer,
        })
        .collect()
}

/// Stream every buffer, then decode. `Ok(None)` means the ticket was superseded.
fn read_variation(
    shared: &LoaderShared,
    keys: &[ArrayKey],
    ticket: &Ticket,
    tx: &mpsc::Sender<LoadEvent>,
) -> PointreelResult<Option<ArraySet>> {
    let sizes = keys
        .iter()
        .map(|k| shared.source.byte_len(k))
        .collect::<PointreelResult<Vec<_>>>()?;
    let total: u64 = sizes.iter().sum();

    let mut chunk = vec![0u8; shared.opts.chunk_bytes.max(1)];
    let mut received = 0u64;
    let mut last_reported = -1.0f32;
    let mut buffers = Vec::with_capacity(keys.len());

    for (key, &size) in keys.iter().zip(&sizes) {
        if ticket.superseded() {
            return Ok(None);
        }
        let mut reader = shared.source.open(key)?;
        let mut buf = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
        loop {
            if ticket.superseded() {
                return Ok(None);
            }
            let n = reader.read(&mut chunk).map_err(|e| {
                PointreelError::load(format!("failed to read {:?}: {e}", key.buffer))
            })?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            received += n as u64;

            // 100 is reserved for "everything received".
            let pct = if total == 0 {
                0.0
            } else {
                ((received as f64 / total as f64) * 100.0).min(99.0) as f32
            };
            if pct.floor() > last_reported.floor() {
                last_reported = pct;
                let _ = tx.send(LoadEvent::Progress(pct));
            }
        }
        buffers.push(buf);
    }
    let _ = tx.send(LoadEvent::Progress(100.0));

    let (class_bytes, channel_bytes) = buffers
        .split_last()
        .ok_or_else(|| PointreelError::load("variation has no buffers"))?;
    let positions = channel_bytes
        .iter()
        .map(|b| decode_npy(b))
        .collect::<PointreelResult<Vec<_>>>()?;
    let classes = decode_npy(class_bytes)?;
    ArraySet::from_arrays(positions, &classes).map(Some)
}

/// Handle to an in-flight load.
///
/// Progress callbacks run from [`PendingLoad::poll`]. Once a terminal value (`Loaded`,
/// `Failed` or `Aborted`) has been returned, further polls return `Aborted`.
pub struct PendingLoad {
    view: ViewId,
    variation: String,
    state: PendingState,
    on_progress: Box<dyn FnMut(f32)>,
}

enum PendingState {
    Ready(Arc<ArraySet>),
    Streaming(mpsc::Receiver<LoadEvent>),
    Finished,
}

impl std::fmt::Debug for PendingLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLoad")
            .field("view", &self.view)
            .field("variation", &self.variation)
            .field("finished", &matches!(self.state, PendingState::Finished))
            .finish()
    }
}

impl PendingLoad {
    fn ready(
        view: ViewId,
        variation: &str,
        set: Arc<ArraySet>,
        on_progress: impl FnMut(f32) + 'static,
    ) -> Self {
        Self {
            view,
            variation: variation.to_owned(),
            state: PendingState::Ready(set),
            on_progress: Box::new(on_progress),
        }
    }

    fn streaming(
        view: ViewId,
        variation: &str,
        rx: mpsc::Receiver<LoadEvent>,
        on_progress: impl FnMut(f32) + 'static,
    ) -> Self {
        Self {
            view,
            variation: variation.to_owned(),
            state: PendingState::Streaming(rx),
            on_progress: Box::new(on_progress),
        }
    }

    pub fn view(&self) -> ViewId {
        self.view
    }

    pub fn variation(&self) -> &str {
        &self.variation
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, PendingState::Finished)
    }

    /// Drain worker events without blocking.
    pub fn poll(&mut self) -> LoadPoll {
        loop {
            let event = match &self.state {
                PendingState::Finished => return LoadPoll::Aborted,
                PendingState::Ready(set) => {
                    let set = Arc::clone(set);
                    self.state = PendingState::Finished;
                    (self.on_progress)(100.0);
                    return LoadPoll::Loaded(set);
                }
                PendingState::Streaming(rx) => match rx.try_recv() {
                    Ok(ev) => ev,
                    Err(TryRecvError::Empty) => return LoadPoll::Pending,
                    Err(TryRecvError::Disconnected) => {
                        self.state = PendingState::Finished;
                        return LoadPoll::Failed(PointreelError::load(
                            "loader worker exited without a result",
                        ));
                    }
                },
            };
            if let Some(done) = self.apply(event) {
                return done;
            }
        }
    }

    /// Block until the load resolves or `timeout` elapses (then `Pending`).
    pub fn wait(&mut self, timeout: Duration) -> LoadPoll {
        let deadline = Instant::now() + timeout;
        loop {
            let event = match &self.state {
                PendingState::Streaming(rx) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(left) {
                        Ok(ev) => ev,
                        Err(RecvTimeoutError::Timeout) => return LoadPoll::Pending,
                        Err(RecvTimeoutError::Disconnected) => return self.poll(),
                    }
                }
                _ => return self.poll(),
            };
            if let Some(done) = self.apply(event) {
                return done;
            }
        }
    }

    fn apply(&mut self, event: LoadEvent) -> Option<LoadPoll> {
        match event {
            LoadEvent::Progress(p) => {
                (self.on_progress)(p);
                None
            }
            LoadEvent::Done(Ok(set)) => {
                self.state = PendingState::Finished;
                Some(LoadPoll::Loaded(set))
            }
            LoadEvent::Done(Err(e)) => {
                self.state = PendingState::Finished;
                Some(LoadPoll::Failed(e))
            }
            LoadEvent::Aborted => {
                self.state = PendingState::Finished;
                Some(LoadPoll::Aborted)
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/loader.rs"]
mod tests;
