//! Owning-context marshalling.
//!
//! Caller-visible state lives inside an [`OwningContext`] and may only be
//! mutated there. Background work holds an [`OwnerHandle`] and posts closures
//! with [`OwnerHandle::run_on_owner`]; the context runs them in posting order
//! whenever its owner pumps it.
//!
//! ```text
//!  background task                       owning context
//!  ───────────────                       ──────────────
//!  run_on_owner(|s| ..) ──► queue ──►    run_pending() / run_next()
//!                                          task(&mut state)
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::error::Elapsed;

type OwnerTask<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Cloneable handle for posting work onto an [`OwningContext`].
pub struct OwnerHandle<S> {
    sender: mpsc::UnboundedSender<OwnerTask<S>>,
}

impl<S> Clone for OwnerHandle<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<S: 'static> OwnerHandle<S> {
    /// Queue `task` to run on the owning context.
    ///
    /// Returns `false` if the context has been dropped; the task is dropped
    /// without running.
    pub fn run_on_owner<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.sender.send(Box::new(task)).is_ok()
    }

    /// Whether the owning context has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Single owner of some state `S`, applying posted tasks in order.
pub struct OwningContext<S> {
    state: S,
    receiver: mpsc::UnboundedReceiver<OwnerTask<S>>,
    sender: mpsc::UnboundedSender<OwnerTask<S>>,
}

impl<S: 'static> OwningContext<S> {
    pub fn new(state: S) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            state,
            receiver,
            sender,
        }
    }

    pub fn handle(&self) -> OwnerHandle<S> {
        OwnerHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn into_state(self) -> S {
        self.state
    }

    /// Run every task already queued without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task(&mut self.state);
            ran += 1;
        }
        ran
    }

    /// Wait for the next task and run it.
    pub async fn run_next(&mut self) {
        // The context keeps its own sender, so the channel never closes here
        if let Some(task) = self.receiver.recv().await {
            task(&mut self.state);
        }
    }

    /// Run tasks as they arrive until `done` holds for the state.
    pub async fn run_until<P>(&mut self, mut done: P)
    where
        P: FnMut(&S) -> bool,
    {
        while !done(&self.state) {
            self.run_next().await;
        }
    }

    /// [`run_until`](Self::run_until) with an upper bound on the wait.
    pub async fn run_until_timeout<P>(&mut self, timeout: Duration, done: P) -> Result<(), Elapsed>
    where
        P: FnMut(&S) -> bool,
    {
        tokio::time::timeout(timeout, self.run_until(done)).await
    }

    /// Drive `future` to completion while applying posted tasks.
    pub async fn run_while<T>(&mut self, future: impl Future<Output = T>) -> T {
        tokio::pin!(future);
        loop {
            let next = tokio::select! {
                biased;
                out = &mut future => Err(out),
                Some(task) = self.receiver.recv() => Ok(task),
            };
            match next {
                Ok(task) => task(&mut self.state),
                Err(out) => {
                    self.run_pending();
                    return out;
                }
            }
        }
    }
}
