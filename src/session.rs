//! The render session: one surface, one request at a time
//!
//! `RenderSession` owns the single shared [`RenderSurface`] plus all mutable
//! per-request state (zoom, pinned height, load state, frame counter,
//! completion signal). It is constructed on the engine thread and only ever
//! touched from there; callers reach it through submitted closures.

use log::{debug, trace, warn};
use tokio::sync::oneshot;

use crate::{Bitmap, Error, RenderRequest, RenderSurface, Result, SurfaceEvent};

/// Script injected after load so captures are clipped instead of scrolled
const SUPPRESS_SCROLLBARS: &str =
    "document.documentElement.style.overflow = 'hidden'; null";

/// Script that measures the natural document height
const CONTENT_HEIGHT: &str =
    "Math.max(document.body.offsetHeight, document.body.scrollHeight)";

/// Load-worker state machine for the in-flight request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Terminal outcome carried by the completion signal
#[derive(Debug)]
pub enum Outcome {
    /// Pages were emitted through the print job
    Printed,
    /// A stabilized bitmap capture
    Raster(Bitmap),
}

/// Sender half of the single-use completion gate; one per request
pub type Completion = oneshot::Sender<Result<Outcome>>;

/// Invoked on every rendered frame after a successful load, with the frame
/// index counted from 1. Returning `Ok(true)` stops the frame clock.
pub type FrameAction<S> = Box<dyn FnMut(&mut RenderSession<S>, u32) -> Result<bool> + Send>;

pub struct RenderSession<S: RenderSurface> {
    pub surface: S,
    state: LoadState,
    page_zoom: f64,
    page_height: f64,
    /// True once the height for this request is pinned, either because the
    /// request supplied one or because it was measured after load
    height_fixed: bool,
    frames: u32,
    armed: bool,
    action: Option<FrameAction<S>>,
    completion: Option<Completion>,
}

impl<S: RenderSurface> RenderSession<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            state: LoadState::Idle,
            page_zoom: 1.0,
            page_height: 0.0,
            height_fixed: false,
            frames: 0,
            armed: false,
            action: None,
            completion: None,
        }
    }

    /// Configure the surface for a new request and begin loading
    ///
    /// Resets every additive property from the previous request: transforms
    /// are cleared, the frame clock is disarmed, and the measured-height flag
    /// is recomputed from the request so natural height is remeasured fresh
    /// per request.
    pub fn configure(&mut self, request: &RenderRequest, completion: Completion, action: FrameAction<S>) {
        self.completion = Some(completion);
        self.action = Some(action);
        self.state = LoadState::Loading;
        self.frames = 0;
        self.armed = false;

        self.page_zoom = request.zoom;
        let page_width = request.web_width * self.page_zoom;
        self.page_height = request.web_height * self.page_zoom;
        self.height_fixed = self.page_height > 0.0;

        trace!("setting starting size {}:{}", page_width, self.page_height);
        // floor at 1 so a zero-height request does not create a degenerate surface
        self.surface
            .set_size(page_width.max(1.0), self.page_height.max(1.0));

        self.surface.clear_transforms();
        self.surface.set_zoom(self.page_zoom);
        self.autosize();

        if request.plain_text {
            self.surface.load_content(&request.source, "text/html");
        } else {
            self.surface.load_url(&request.source);
        }
    }

    /// Dispatch one engine event to the lifecycle bridge / frame clock
    pub fn handle_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::Progress(done) => trace!("load progress: {}", done),
            SurfaceEvent::LoadFinished => self.on_load_finished(),
            SurfaceEvent::LoadFailed(message) => self.on_load_failed(message),
            SurfaceEvent::FrameRendered => self.on_frame(),
        }
    }

    /// The load worker succeeded: fix up the document and arm the frame clock
    ///
    /// Repeated success notifications for the same request (internal reloads)
    /// re-run only the scrollbar suppression; the height measurement and
    /// frame-clock arming are guarded so they happen once per request.
    fn on_load_finished(&mut self) {
        if self.completion.is_none() || self.state == LoadState::Failed {
            return;
        }
        trace!("load state: {:?} > Loaded", self.state);
        self.state = LoadState::Loaded;

        // clip the page rather than rendering scrollbars into the capture
        if let Err(err) = self.surface.execute_script(SUPPRESS_SCROLLBARS) {
            self.fail(err);
            return;
        }

        // width was pinned in configure (responsive content reflows to it);
        // now resolve the best-fit height if the request left it unmeasured
        if !self.height_fixed {
            let measured = match self.measure_content_height() {
                Ok(h) => h,
                Err(err) => {
                    self.fail(err);
                    return;
                }
            };
            self.page_height = measured * self.page_zoom;
            self.height_fixed = true;

            trace!("setting page height to {}", self.page_height);
            let width = self.surface.width();
            self.surface.set_size(width, self.page_height.max(1.0));
            self.autosize();
        }

        if !self.armed {
            self.armed = true;
        }
    }

    fn on_load_failed(&mut self, message: String) {
        self.state = LoadState::Failed;
        self.armed = false;
        self.fail(Error::Load(message));
    }

    /// One tick of the engine's frame clock
    fn on_frame(&mut self) {
        if !self.armed {
            return;
        }
        let Some(mut action) = self.action.take() else {
            return;
        };

        self.frames += 1;
        let frame = self.frames;
        match action(self, frame) {
            Ok(true) => self.armed = false,
            Ok(false) => self.action = Some(action),
            Err(err) => {
                self.armed = false;
                self.fail(err);
            }
        }
    }

    fn measure_content_height(&mut self) -> Result<f64> {
        let value = self.surface.execute_script(CONTENT_HEIGHT)?;
        value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| Error::Script(format!("content height query returned {}", value)))
    }

    /// Recompute preferred sizing, nudging the engine to repaint
    fn autosize(&mut self) {
        self.surface.autosize();
        if let Err(err) = self.surface.refresh_peer() {
            warn!("unable to refresh surface peer; blank pages may occur: {}", err);
        }
    }

    /// Release the completion signal with success; late calls are a no-op
    pub fn complete(&mut self, outcome: Outcome) {
        if let Some(completion) = self.completion.take() {
            let _ = completion.send(Ok(outcome));
        }
        self.surface.hide();
    }

    /// Release the completion signal with an error; late calls are a no-op
    pub fn fail(&mut self, err: Error) {
        if let Some(completion) = self.completion.take() {
            debug!("request failed: {}", err);
            let _ = completion.send(Err(err));
        }
        self.surface.hide();
    }

    #[cfg(test)]
    fn state(&self) -> LoadState {
        self.state
    }
}
