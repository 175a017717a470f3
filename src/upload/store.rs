use super::types::UploadSnapshot;
use std::convert::Infallible;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Holds the latest snapshot and pushes every new one to subscribers.
#[derive(Default)]
pub struct SnapshotStore {
    current: Mutex<Option<Arc<UploadSnapshot>>>,
    listeners: Mutex<Vec<Sender<Arc<UploadSnapshot>>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first change.
    pub fn get(&self) -> Option<Arc<UploadSnapshot>> {
        lock(&self.current).clone()
    }

    pub fn subscribe(&self) -> Receiver<Arc<UploadSnapshot>> {
        let (sender, receiver) = channel();
        lock(&self.listeners).push(sender);
        receiver
    }

    pub fn read<R>(&self, f: impl FnOnce(&UploadSnapshot) -> R) -> R {
        match lock(&self.current).as_deref() {
            Some(snapshot) => f(snapshot),
            None => f(&UploadSnapshot::default()),
        }
    }

    /// Applies `f` to a copy of the current state and publishes the result.
    /// The state lock is held while notifying so emissions stay ordered.
    pub fn update<R>(&self, f: impl FnOnce(&mut UploadSnapshot) -> R) -> R {
        match self.try_update(|snapshot| Ok::<R, Infallible>(f(snapshot))) {
            Ok(result) => result,
            Err(never) => match never {},
        }
    }

    /// Like [`update`](Self::update), but publishes only when `f` succeeds.
    pub fn try_update<R, E>(
        &self,
        f: impl FnOnce(&mut UploadSnapshot) -> Result<R, E>,
    ) -> Result<R, E> {
        let mut current = lock(&self.current);
        let mut next = current.as_deref().cloned().unwrap_or_default();
        let result = f(&mut next)?;
        let next = Arc::new(next);
        *current = Some(Arc::clone(&next));

        lock(&self.listeners).retain(|listener| listener.send(Arc::clone(&next)).is_ok());
        Ok(result)
    }

    /// Drops every subscriber; their receivers see a disconnect.
    pub fn close(&self) {
        lock(&self.listeners).clear();
    }
}
