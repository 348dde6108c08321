//! Serializing actor: one worker thread owns the whole state of a named
//! store instance, and every operation passes through its channel. Reads
//! therefore observe all writes that completed before them, and concurrent
//! writes to one path resolve to last-processed-wins with no torn state.

use std::sync::mpsc;
use std::thread;

use crate::error::{FsError, FsResult};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Cloneable handle to a store actor. The worker thread exits once every
/// handle (and the registry's copy) has been dropped.
pub struct ActorHandle<S> {
    name: String,
    tx: mpsc::Sender<Job<S>>,
}

impl<S> Clone for ActorHandle<S> {
    fn clone(&self) -> Self {
        ActorHandle { name: self.name.clone(), tx: self.tx.clone() }
    }
}

impl<S: Send + 'static> ActorHandle<S> {
    /// Spawn the worker thread owning `state`.
    pub fn spawn(name: &str, state: S) -> FsResult<Self> {
        let (tx, rx) = mpsc::channel::<Job<S>>();
        let thread_name = format!("polyfs-{name}");
        thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let mut state = state;
                while let Ok(job) = rx.recv() {
                    job(&mut state);
                }
                tracing::debug!("store actor stopped");
            })
            .map_err(|e| FsError::unknown("failed to spawn store actor", e))?;
        Ok(ActorHandle { name: name.to_string(), tx })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `f` on the actor's state and wait for the result. Blocking is
    /// bounded by one store operation; the actor never does network I/O.
    pub fn call<R, F>(&self, f: F) -> FsResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut S) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(Box::new(move |state: &mut S| {
                let _ = reply_tx.send(f(state));
            }))
            .map_err(|_| self.gone())?;
        reply_rx.recv().map_err(|_| self.gone())
    }

    fn gone(&self) -> FsError {
        FsError::adapter("actor", format!("store actor '{}' is no longer running", self.name))
    }
}
