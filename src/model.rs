// src/model.rs
// Lazily loaded model handles

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelLoadError {
    #[error("Model failed to load: {0}")]
    Failed(String),

    #[error("Model load was abandoned before completing")]
    Abandoned,
}

/// Observable state of a [`ModelSlot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

enum Slot<T> {
    Unloaded,
    Loading,
    Ready(Arc<T>),
    Failed(String),
}

/// Holds an expensive resource that is loaded once and shared afterwards.
///
/// `Unloaded -> Loading -> Ready | Failed`. Callers arriving while a load is in
/// flight wait for it instead of starting a second one. `Failed` is sticky
/// until [`ModelSlot::reset`].
pub struct ModelSlot<T> {
    slot: Mutex<Slot<T>>,
    loaded: Notify,
}

impl<T> Default for ModelSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ModelSlot<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Unloaded),
            loaded: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> ModelState {
        match &*self.lock() {
            Slot::Unloaded => ModelState::Unloaded,
            Slot::Loading => ModelState::Loading,
            Slot::Ready(_) => ModelState::Ready,
            Slot::Failed(_) => ModelState::Failed,
        }
    }

    /// Return the loaded model, running `loader` if nobody has yet
    pub async fn get_or_load<F, Fut>(&self, loader: F) -> Result<Arc<T>, ModelLoadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        let mut loader = Some(loader);

        loop {
            let notified = {
                let mut slot = self.lock();
                match &*slot {
                    Slot::Ready(model) => return Ok(model.clone()),
                    Slot::Failed(msg) => return Err(ModelLoadError::Failed(msg.clone())),
                    Slot::Loading | Slot::Unloaded => {}
                }
                if matches!(*slot, Slot::Unloaded) {
                    *slot = Slot::Loading;
                    break;
                }
                self.loaded.notified()
            };
            notified.await;
        }

        let load = loader.take().ok_or(ModelLoadError::Abandoned)?;
        let guard = LoadGuard { owner: self, armed: true };
        let result = load().await;
        guard.finish(result)
    }

    /// Drop a loaded or failed model so the next caller loads again
    pub fn reset(&self) {
        let mut slot = self.lock();
        if !matches!(*slot, Slot::Loading) {
            *slot = Slot::Unloaded;
        }
    }
}

/// Puts the slot back to `Unloaded` if the loading future is dropped midway
struct LoadGuard<'a, T> {
    owner: &'a ModelSlot<T>,
    armed: bool,
}

impl<'a, T> LoadGuard<'a, T> {
    fn finish(mut self, result: Result<T, String>) -> Result<Arc<T>, ModelLoadError> {
        self.armed = false;
        let outcome = {
            let mut slot = self.owner.lock();
            match result {
                Ok(model) => {
                    let model = Arc::new(model);
                    *slot = Slot::Ready(model.clone());
                    tracing::info!("Model loaded");
                    Ok(model)
                }
                Err(msg) => {
                    tracing::error!("Model load failed: {}", msg);
                    *slot = Slot::Failed(msg.clone());
                    Err(ModelLoadError::Failed(msg))
                }
            }
        };
        self.owner.loaded.notify_waiters();
        outcome
    }
}

impl<'a, T> Drop for LoadGuard<'a, T> {
    fn drop(&mut self) {
        if self.armed {
            *self.owner.lock() = Slot::Unloaded;
            self.owner.loaded.notify_waiters();
        }
    }
}
