//! Streaming traversal
//!
//! A synchronized traversal runs on its own worker thread. The worker takes
//! the cache's read lock, sends one `(key, value)` pair per live entry into a
//! channel, and releases the lock when the walk ends. Two forms exist:
//!
//! - [`Traversal`] carries a stop signal. [`Traversal::stop`] (or dropping the
//!   handle) tells the worker to quit, drains whatever is buffered, and joins
//!   the worker, so the read lock is released by the time it returns.
//! - The bare [`Receiver`] from `traverse_simple` has no stop signal. The
//!   worker runs until every entry is sent. A consumer that keeps the
//!   receiver but stops reading leaves the worker blocked in `send`, holding
//!   the read lock, and every writer waits behind it. Dropping the receiver
//!   disconnects the channel and ends the walk.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::lru::LruCore;

/// Order in which a traversal visits entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Least recently used first
    #[default]
    Forward,
    /// Most recently used first
    Reverse,
}

/// Cancellable stream of `(key, value)` pairs
///
/// Iterate it directly or receive from [`stream`](Traversal::stream). Once
/// stopped, it yields nothing more.
pub struct Traversal<K, V> {
    rx: Receiver<(K, V)>,
    signal: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    stopped: bool,
}

impl<K, V> Traversal<K, V> {
    /// Traversal over pairs that are already in the channel
    pub(crate) fn buffered(rx: Receiver<(K, V)>) -> Self {
        Self {
            rx,
            signal: None,
            worker: None,
            stopped: false,
        }
    }

    /// The channel pairs arrive on
    pub fn stream(&self) -> &Receiver<(K, V)> {
        &self.rx
    }

    /// Whether [`stop`](Traversal::stop) has run
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Stop the walk and release its read lock
    ///
    /// Unconsumed pairs are discarded. Calling this again, or after the walk
    /// has finished, does nothing.
    pub fn stop(&mut self) {
        self.shutdown();
    }

    /// Stop the walk and return how many pairs were discarded
    fn shutdown(&mut self) -> usize {
        if self.stopped {
            return 0;
        }
        self.stopped = true;

        // Disconnecting the signal channel wakes the worker's select.
        drop(self.signal.take());
        let mut discarded = 0usize;
        while self.rx.recv().is_ok() {
            discarded += 1;
        }

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("traversal worker panicked");
            }
        }
        debug!(discarded, "traversal stopped");
        discarded
    }
}

impl<K, V> Iterator for Traversal<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.stopped {
            return None;
        }
        self.rx.recv().ok()
    }
}

impl<K, V> Drop for Traversal<K, V> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start a cancellable walk over a shared cache
pub(crate) fn spawn_traversal<K, V>(
    shared: &Arc<RwLock<LruCore<K, V>>>,
    direction: Direction,
    buffer: usize,
) -> Result<Traversal<K, V>>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let (signal, stop) = bounded::<()>(0);
    let (rx, worker) = spawn_walker(shared, buffer, move |core, tx| {
        for (key, value) in core.iter(direction) {
            // select! picks randomly among ready arms; check the signal first
            // so a drained channel cannot keep the walk going.
            if let Err(TryRecvError::Disconnected) = stop.try_recv() {
                debug!(?direction, "traversal cancelled");
                return;
            }
            select! {
                send(tx, (key.clone(), value.clone())) -> res => {
                    if res.is_err() {
                        return;
                    }
                }
                recv(stop) -> _ => {
                    debug!(?direction, "traversal cancelled");
                    return;
                }
            }
        }
        debug!(?direction, "traversal finished");
    })?;

    Ok(Traversal {
        rx,
        signal: Some(signal),
        worker: Some(worker),
        stopped: false,
    })
}

/// Start a run-to-completion walk over a shared cache
pub(crate) fn spawn_stream<K, V>(
    shared: &Arc<RwLock<LruCore<K, V>>>,
    direction: Direction,
    buffer: usize,
) -> Result<Receiver<(K, V)>>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let (rx, _worker) = spawn_walker(shared, buffer, move |core, tx| {
        for (key, value) in core.iter(direction) {
            if tx.send((key.clone(), value.clone())).is_err() {
                debug!(?direction, "stream receiver dropped");
                return;
            }
        }
        debug!(?direction, "stream finished");
    })?;
    Ok(rx)
}

/// Run `walk` on a worker thread under the cache's read lock
///
/// Returns once the worker holds the lock, so the walk sees the cache as it
/// was when the caller asked for it. The sender outlives the guard: once the
/// channel disconnects, the read lock is already released.
fn spawn_walker<K, V, F>(
    shared: &Arc<RwLock<LruCore<K, V>>>,
    buffer: usize,
    walk: F,
) -> Result<(Receiver<(K, V)>, JoinHandle<()>)>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    F: FnOnce(&LruCore<K, V>, &Sender<(K, V)>) + Send + 'static,
{
    let shared = Arc::clone(shared);
    let (tx, rx) = bounded(buffer);
    let (ready_tx, ready_rx) = bounded::<()>(1);

    let worker = thread::Builder::new()
        .name("lru-traversal".into())
        .spawn(move || {
            {
                let core = shared.read();
                debug!(size = core.size(), "traversal holds read lock");
                let _ = ready_tx.send(());
                walk(&*core, &tx);
            }
            drop(tx);
        })?;

    ready_rx.recv().map_err(|_| Error::WorkerExited)?;
    Ok((rx, worker))
}

/// Materialize a walk on the caller's thread
///
/// Used by the unsynchronized cache: the channel is sized to hold every
/// entry, so no worker or lock is needed.
pub(crate) fn collect_traversal<K, V>(core: &LruCore<K, V>, direction: Direction) -> Receiver<(K, V)>
where
    K: Clone,
    V: Clone,
{
    let (tx, rx) = bounded(core.size());
    for (key, value) in core.iter(direction) {
        // Cannot fail: the channel holds every entry and `rx` is alive.
        let _ = tx.try_send((key.clone(), value.clone()));
    }
    rx
}
