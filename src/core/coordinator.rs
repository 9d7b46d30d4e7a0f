//! Single-flight fetch coordination with cancel-and-replace semantics.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Default)]
struct Slot {
    // Bumped on every trigger and cancel; a completion only runs while its
    // ticket still matches.
    ticket: u64,
    task: Option<JoinHandle<()>>,
}

/// Keeps at most one fetch outstanding for a cache key.
///
/// Completions are applied while holding the slot lock and only if no
/// `trigger` or `cancel` happened since their fetch started, so a superseded
/// fetch can never publish its result.
pub struct RequestCoordinator {
    name: &'static str,
    slot: Arc<Mutex<Slot>>,
}

impl RequestCoordinator {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Cancels any outstanding fetch, then runs `fetch` in the background and
    /// hands its output to `complete` unless it is superseded first.
    pub async fn trigger<F, T, C, CF>(&self, fetch: F, complete: C)
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        C: FnOnce(T) -> CF + Send + 'static,
        CF: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock().await;
        Self::cancel_locked(self.name, &mut slot);

        let ticket = slot.ticket;
        let shared = Arc::clone(&self.slot);
        let name = self.name;
        debug!(coordinator = name, ticket, "Starting fetch");

        slot.task = Some(tokio::spawn(async move {
            let output = fetch.await;

            let mut slot = shared.lock().await;
            if slot.ticket != ticket {
                debug!(coordinator = name, ticket, "Dropping superseded fetch result");
                return;
            }
            slot.task = None;
            complete(output).await;
        }));
    }

    /// Drops the outstanding fetch, if any. Safe to call repeatedly.
    pub async fn cancel(&self) {
        let mut slot = self.slot.lock().await;
        Self::cancel_locked(self.name, &mut slot);
    }

    /// Whether a fetch has been started and has not completed or been cancelled.
    pub async fn is_pending(&self) -> bool {
        self.slot.lock().await.task.is_some()
    }

    fn cancel_locked(name: &'static str, slot: &mut Slot) {
        slot.ticket = slot.ticket.wrapping_add(1);
        if let Some(task) = slot.task.take() {
            debug!(coordinator = name, "Cancelling outstanding fetch");
            task.abort();
        }
    }
}
