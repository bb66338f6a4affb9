//! The dedicated engine thread and its startup gate
//!
//! All surface mutation happens on one persistent thread that owns the
//! [`RenderSession`]. Other threads communicate by submitting closures, which
//! execute strictly in submission order, interleaved with the engine's own
//! lifecycle/frame events. The thread outlives individual requests; hiding
//! the surface does not stop it.

use std::sync::mpsc::{self, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use log::{debug, trace};

use crate::session::RenderSession;
use crate::{Error, RenderSurface, Result};

/// How long the event pump waits when no submissions are pending
const EVENT_TICK: Duration = Duration::from_millis(5);

/// A "run later" submission: executes on the engine thread with exclusive
/// access to the session
pub type Task<S> = Box<dyn FnOnce(&mut RenderSession<S>) + Send>;

/// Handle to the running engine thread; cheap to clone
pub struct EngineHandle<S: RenderSurface> {
    tasks: Sender<Task<S>>,
}

impl<S: RenderSurface> Clone for EngineHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tasks: self.tasks.clone(),
        }
    }
}

impl<S: RenderSurface> EngineHandle<S> {
    /// Spawn the engine thread and block until it signals readiness
    ///
    /// The surface is constructed by `factory` on the engine thread itself,
    /// since most rendering engines require their surfaces to be built on the
    /// thread that will drive them. Returns [`Error::StartupTimeout`] if
    /// readiness is not signaled within `timeout`.
    pub fn spawn<F>(factory: F, timeout: Duration) -> Result<Self>
    where
        F: FnOnce() -> S + Send + 'static,
    {
        let (task_tx, task_rx) = mpsc::channel::<Task<S>>();
        let (ready_tx, ready_rx) = mpsc::channel::<()>();

        // the engine context lives for the process lifetime; never joined
        let _engine_thread = thread::Builder::new()
            .name("webshot-engine".into())
            .spawn(move || {
                let mut session = RenderSession::new(factory());
                debug!("engine context started");
                let _ = ready_tx.send(());

                loop {
                    // drain submissions in submission order
                    loop {
                        match task_rx.try_recv() {
                            Ok(task) => task(&mut session),
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Disconnected) => {
                                trace!("engine context shutting down");
                                return;
                            }
                        }
                    }

                    // pump lifecycle and frame events
                    if let Some(event) = session.surface.poll_event(EVENT_TICK) {
                        session.handle_event(event);
                    }
                }
            })
            .map_err(|e| Error::Other(format!("failed to spawn engine thread: {}", e)))?;

        trace!("waiting for engine context..");
        ready_rx
            .recv_timeout(timeout)
            .map_err(|_| Error::StartupTimeout(timeout))?;

        Ok(Self { tasks: task_tx })
    }

    /// Enqueue a closure for the engine thread
    pub fn submit(&self, task: Task<S>) -> Result<()> {
        self.tasks.send(task).map_err(|_| Error::EngineGone)
    }
}
