// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! CPU-awaitable completion handles for asynchronous GPU-side work.
//!
//! A [`Fence`] resolves exactly once, either successfully or with the
//! [`GpuTaskError`] raised by the task. Waiting never loses the error: every
//! waiter (and every clone of the fence) observes the same shared error value.

use crate::renderer::error::GpuTaskError;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// The final outcome of a fenced task.
pub type FenceResult = Result<(), Arc<GpuTaskError>>;

/// An error returned by [`Fence::wait_timeout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenceWaitError {
    /// The task did not finish within the allotted time.
    Timeout,
    /// The task finished with an error.
    Failed(Arc<GpuTaskError>),
}

impl fmt::Display for FenceWaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenceWaitError::Timeout => write!(f, "Timed out waiting for fence."),
            FenceWaitError::Failed(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for FenceWaitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FenceWaitError::Timeout => None,
            FenceWaitError::Failed(err) => Some(err.as_ref()),
        }
    }
}

enum FenceState {
    /// Nothing is ever sent on the channel: the signal dropping its sender
    /// disconnects it, which wakes every waiter at once.
    Pending(flume::Receiver<()>),
    Done(FenceResult),
}

struct FenceShared {
    label: String,
    complete: AtomicBool,
    state: Mutex<FenceState>,
}

/// A handle representing the completion of GPU-side work.
///
/// Cloning a fence is cheap; all clones observe the same completion.
#[derive(Clone)]
pub struct Fence {
    shared: Arc<FenceShared>,
}

impl fmt::Debug for Fence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fence")
            .field("label", &self.shared.label)
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// The completing side of a pending [`Fence`].
///
/// Dropping the signal without calling [`FenceSignal::complete`] resolves the
/// fence with [`GpuTaskError::SignalDropped`], so waiters never hang on an
/// abandoned task.
pub struct FenceSignal {
    sender: Option<flume::Sender<()>>,
    shared: Arc<FenceShared>,
}

impl Fence {
    /// Creates a fence that is already complete.
    pub fn signaled(label: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(FenceShared {
                label: label.into(),
                complete: AtomicBool::new(true),
                state: Mutex::new(FenceState::Done(Ok(()))),
            }),
        }
    }

    /// Creates a pending fence together with the signal that completes it.
    pub fn pending(label: impl Into<String>) -> (Self, FenceSignal) {
        let (sender, receiver) = flume::bounded(0);
        let shared = Arc::new(FenceShared {
            label: label.into(),
            complete: AtomicBool::new(false),
            state: Mutex::new(FenceState::Pending(receiver)),
        });
        let signal = FenceSignal {
            sender: Some(sender),
            shared: shared.clone(),
        };
        (Self { shared }, signal)
    }

    /// Runs `task` on a dedicated thread and returns a fence tracking it.
    ///
    /// A panic inside the task is converted into [`GpuTaskError::Panicked`].
    pub fn spawn<F>(label: impl Into<String>, task: F) -> Self
    where
        F: FnOnce() -> Result<(), GpuTaskError> + Send + 'static,
    {
        let label = label.into();
        let (fence, signal) = Self::pending(label.clone());
        let task_label = label.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("ember-fence-{label}"))
            .spawn(move || {
                let result =
                    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)) {
                        Ok(result) => result,
                        Err(payload) => Err(GpuTaskError::Panicked {
                            task: task_label,
                            message: panic_payload_to_string(&*payload),
                        }),
                    };
                signal.complete(result);
            });
        if let Err(e) = spawned {
            // The closure (and the signal inside it) is dropped, which resolves the fence.
            log::warn!("Fence '{}': failed to spawn task thread: {}", label, e);
        }
        fence
    }

    /// The debug label given at creation.
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Returns `true` once the task has finished, successfully or not.
    pub fn is_complete(&self) -> bool {
        self.shared.complete.load(Ordering::Acquire)
    }

    /// Blocks until the task finishes and returns its outcome.
    pub fn wait(&self) -> FenceResult {
        if let Some(receiver) = self.pending_receiver() {
            // Only disconnection can end the receive.
            let _ = receiver.recv();
        }
        self.outcome()
    }

    /// Like [`Fence::wait`], but gives up after `timeout`.
    ///
    /// Other threads waiting on clones of the same fence never delay the timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), FenceWaitError> {
        if let Some(receiver) = self.pending_receiver() {
            if let Err(flume::RecvTimeoutError::Timeout) = receiver.recv_timeout(timeout) {
                return Err(FenceWaitError::Timeout);
            }
        }
        self.outcome().map_err(FenceWaitError::Failed)
    }

    fn lock_state(&self) -> MutexGuard<'_, FenceState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// A receiver to block on, or `None` once the fence is done. The state lock
    /// is released before returning.
    fn pending_receiver(&self) -> Option<flume::Receiver<()>> {
        match &*self.lock_state() {
            FenceState::Pending(receiver) => Some(receiver.clone()),
            FenceState::Done(_) => None,
        }
    }

    fn outcome(&self) -> FenceResult {
        match &*self.lock_state() {
            FenceState::Done(result) => result.clone(),
            // The signal stores the outcome before disconnecting, so this is
            // only reachable if the signal vanished without resolving.
            FenceState::Pending(_) => Err(Arc::new(GpuTaskError::SignalDropped {
                task: self.shared.label.clone(),
            })),
        }
    }
}

impl FenceSignal {
    /// Resolves the fence with `result`.
    pub fn complete(mut self, result: Result<(), GpuTaskError>) {
        self.resolve(result.map_err(Arc::new));
    }

    fn resolve(&mut self, result: FenceResult) {
        if let Some(sender) = self.sender.take() {
            {
                let mut state = self
                    .shared
                    .state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                *state = FenceState::Done(result);
                self.shared.complete.store(true, Ordering::Release);
            }
            drop(sender);
        }
    }
}

impl Drop for FenceSignal {
    fn drop(&mut self) {
        if self.sender.is_some() {
            let task = self.shared.label.clone();
            self.resolve(Err(Arc::new(GpuTaskError::SignalDropped { task })));
        }
    }
}

fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
