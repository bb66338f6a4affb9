//! The capture/print orchestrator
//!
//! [`WebShot`] is the public face of the core: an explicitly-owned handle
//! around the engine thread. `print` and `raster` are blocking and fully
//! serialized; only one request is ever in flight against the shared surface.

use std::sync::Mutex;
use std::time::Duration;

use log::debug;
use tokio::sync::oneshot;

use crate::engine::EngineHandle;
use crate::pagination::{fit_scale, page_grid};
use crate::session::{Outcome, RenderSession};
use crate::{effective_scale, Bitmap, Error, PrintJob, RenderRequest, RenderSurface, Result, Transform};

/// Default wait for the engine context's first activation
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Print points to screen pixels; raster output matches screen-resolution
/// expectations rather than print-point sizing
const RASTER_DPI_CORRECTION: f64 = 96.0 / 72.0;

struct StartState<S: RenderSurface> {
    factory: Option<Box<dyn FnOnce() -> S + Send>>,
    handle: Option<EngineHandle<S>>,
}

/// Blocking print/capture API backed by one persistent engine thread
///
/// Construct once at application startup and share by reference. The engine
/// thread is spawned lazily by [`WebShot::initialize`] and reused for the
/// process lifetime.
pub struct WebShot<S: RenderSurface> {
    state: Mutex<StartState<S>>,
    /// Serializes print/raster so requests never interleave on the surface
    ops: Mutex<()>,
}

impl<S: RenderSurface> WebShot<S> {
    /// Create the handle; `factory` builds the surface on the engine thread
    /// once [`WebShot::initialize`] is called
    pub fn new<F>(factory: F) -> Self
    where
        F: FnOnce() -> S + Send + 'static,
    {
        Self {
            state: Mutex::new(StartState {
                factory: Some(Box::new(factory)),
                handle: None,
            }),
            ops: Mutex::new(()),
        }
    }

    /// Start the engine thread if not already running
    ///
    /// Idempotent: concurrent callers all block until the one engine context
    /// is ready. Fails with [`Error::StartupTimeout`] if readiness is not
    /// signaled within 60 seconds.
    pub fn initialize(&self) -> Result<()> {
        self.initialize_with_timeout(DEFAULT_STARTUP_TIMEOUT)
    }

    /// [`WebShot::initialize`] with an explicit readiness timeout
    pub fn initialize_with_timeout(&self, timeout: Duration) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.handle.is_some() {
            return Ok(());
        }

        // a timed-out spawn consumes the factory; the surface may still be
        // held by the stuck thread, so startup cannot be retried
        let factory = state.factory.take().ok_or_else(|| {
            Error::Other("render surface was consumed by a previous failed startup".into())
        })?;

        state.handle = Some(EngineHandle::spawn(factory, timeout)?);
        Ok(())
    }

    fn handle(&self) -> Result<EngineHandle<S>> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .handle
            .clone()
            .ok_or(Error::NotStarted)
    }

    /// Print the rendered document, tiling it across as many pages as needed
    ///
    /// Blocks until every page has been emitted through `job`, or re-raises
    /// the first error reported by the engine. Zoom is forced to 1: vector
    /// prints must not pre-scale pixel content.
    pub fn print<J>(&self, job: J, request: RenderRequest) -> Result<()>
    where
        J: PrintJob<S> + 'static,
    {
        let _op = self.ops.lock().unwrap_or_else(|e| e.into_inner());
        let engine = self.handle()?;

        let mut request = request;
        request.zoom = 1.0;
        let scaled = request.scaled;
        let mut job = job;

        // runs once, on the first rendered frame after load
        self.load(&engine, request, move |session, _frame| {
            let layout = job.page_layout();

            if scaled {
                let scale = fit_scale(
                    session.surface.width(),
                    session.surface.height(),
                    layout.printable_width,
                    layout.printable_height,
                );
                session.surface.push_transform(Transform::Scale(scale, scale));
            }

            let use_scale = effective_scale(session.surface.transforms());
            debug!(
                "paper area: {},{}:{},{}",
                layout.left_margin as i64,
                layout.top_margin as i64,
                layout.printable_width as i64,
                layout.printable_height as i64
            );

            let grid = page_grid(
                session.surface.width(),
                session.surface.height(),
                use_scale,
                layout.printable_width,
                layout.printable_height,
            );
            debug!("document will be printed across {} pages", grid.pages());

            // one Translate, mutated in place per tile, row-major
            let tile = session.surface.transforms().len();
            session.surface.push_transform(Transform::Translate { x: 0.0, y: 0.0 });

            for row in 0..grid.rows {
                for col in 0..grid.columns {
                    session.surface.set_transform(
                        tile,
                        Transform::Translate {
                            x: -(col as f64) * layout.printable_width / use_scale,
                            y: -(row as f64) * layout.printable_height / use_scale,
                        },
                    );
                    job.print_page(&mut session.surface)?;
                }
            }

            session.surface.remove_transform(tile);
            session.complete(Outcome::Printed);
            Ok(true)
        })?;

        Ok(())
    }

    /// Capture the rendered, visually stabilized document as a bitmap
    ///
    /// Fails with [`Error::NotStarted`] if [`WebShot::initialize`] has not
    /// completed. Blocks until the engine produces the capture or an error.
    pub fn raster(&self, request: RenderRequest) -> Result<Bitmap> {
        let _op = self.ops.lock().unwrap_or_else(|e| e.into_inner());
        let engine = self.handle()?;

        // some engines only produce valid pixel captures from a showing
        // surface, even in headless-like usage
        engine.submit(Box::new(|session| session.surface.show_behind()))?;

        let mut request = request;
        request.web_width *= RASTER_DPI_CORRECTION;
        request.web_height *= RASTER_DPI_CORRECTION;

        // wait until the third rendered frame so layout and paint have
        // stabilized, then snapshot; later frames are not observed
        let outcome = self.load(&engine, request, |session, frame| {
            if frame == 3 {
                debug!("attempting image capture");
                let bitmap = session.surface.snapshot()?;
                session.complete(Outcome::Raster(bitmap));
            }
            Ok(frame >= 3)
        })?;

        match outcome {
            Outcome::Raster(bitmap) => Ok(bitmap),
            Outcome::Printed => Err(Error::Capture(
                "engine produced a print outcome for a raster request".into(),
            )),
        }
    }

    /// Shared load primitive: fresh completion signal, configure on the
    /// engine thread, arm the per-frame action, block until released
    fn load<A>(&self, engine: &EngineHandle<S>, request: RenderRequest, action: A) -> Result<Outcome>
    where
        A: FnMut(&mut RenderSession<S>, u32) -> Result<bool> + Send + 'static,
    {
        let (completion, released) = oneshot::channel();

        engine.submit(Box::new(move |session| {
            session.configure(&request, completion, Box::new(action));
        }))?;

        // released by the engine thread with success or the captured error
        released.blocking_recv().map_err(|_| Error::EngineGone)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullSurface;

    #[test]
    fn raster_before_initialize_is_not_started() {
        let shot = WebShot::new(|| NullSurface);
        match shot.raster(RenderRequest::html("<p>x</p>", 10.0, 10.0)) {
            Err(Error::NotStarted) => {}
            other => panic!("unexpected: {:?}", other.map(|b| (b.width, b.height))),
        }
    }

    #[test]
    fn initialize_is_idempotent() {
        let shot = WebShot::new(|| NullSurface);
        shot.initialize().expect("first start");
        shot.initialize().expect("second start is a no-op");
    }
}
