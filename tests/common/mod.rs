//! Shared test fixture: a scripted render surface and a recording print job
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use webshot::{Bitmap, Error, PageLayout, PrintJob, RenderSurface, Result, SurfaceEvent, Transform};

/// Everything the stub surface observed, for assertions after the surface
/// has moved onto the engine thread
#[derive(Default)]
pub struct Observed {
    /// (kind, source) per load: "content" or "url"
    pub loads: Vec<(String, String)>,
    pub sizes: Vec<(f64, f64)>,
    pub zooms: Vec<f64>,
    pub scripts: Vec<String>,
    pub snapshots: u32,
    pub shows: u32,
    pub hides: u32,
}

/// A render surface that replays a scripted event stream instead of loading
/// anything. Loading enqueues lifecycle events plus a run of rendered frames.
pub struct StubSurface {
    shared: Arc<Mutex<Observed>>,
    events: VecDeque<SurfaceEvent>,
    width: f64,
    height: f64,
    transforms: Vec<Transform>,
    /// Value the content-height query reports
    pub content_height: f64,
    /// When set, loads fail asynchronously with this message
    pub fail_load: Option<String>,
    /// Frames the engine "renders" after a successful load
    pub frames_after_load: u32,
    /// Emit the load-finished event twice, as an internal reload would
    pub double_load_finished: bool,
}

impl StubSurface {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Observed::default())),
            events: VecDeque::new(),
            width: 0.0,
            height: 0.0,
            transforms: Vec::new(),
            content_height: 480.0,
            fail_load: None,
            frames_after_load: 4,
            double_load_finished: false,
        }
    }

    /// Handle for inspecting the surface after it moves to the engine thread
    pub fn observed(&self) -> Arc<Mutex<Observed>> {
        self.shared.clone()
    }

    fn begin_load(&mut self) {
        self.events.clear();
        if let Some(message) = &self.fail_load {
            self.events.push_back(SurfaceEvent::LoadFailed(message.clone()));
            return;
        }
        self.events.push_back(SurfaceEvent::Progress(1.0));
        self.events.push_back(SurfaceEvent::LoadFinished);
        if self.double_load_finished {
            self.events.push_back(SurfaceEvent::LoadFinished);
        }
        for _ in 0..self.frames_after_load {
            self.events.push_back(SurfaceEvent::FrameRendered);
        }
    }
}

impl RenderSurface for StubSurface {
    fn set_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.shared.lock().unwrap().sizes.push((width, height));
    }

    fn set_zoom(&mut self, zoom: f64) {
        self.shared.lock().unwrap().zooms.push(zoom);
    }

    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn clear_transforms(&mut self) {
        self.transforms.clear();
    }

    fn push_transform(&mut self, transform: Transform) {
        self.transforms.push(transform);
    }

    fn set_transform(&mut self, index: usize, transform: Transform) {
        self.transforms[index] = transform;
    }

    fn remove_transform(&mut self, index: usize) {
        self.transforms.remove(index);
    }

    fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    fn load_content(&mut self, markup: &str, _mime_type: &str) {
        self.shared
            .lock()
            .unwrap()
            .loads
            .push(("content".into(), markup.to_string()));
        self.begin_load();
    }

    fn load_url(&mut self, url: &str) {
        self.shared
            .lock()
            .unwrap()
            .loads
            .push(("url".into(), url.to_string()));
        self.begin_load();
    }

    fn execute_script(&mut self, script: &str) -> Result<serde_json::Value> {
        self.shared.lock().unwrap().scripts.push(script.to_string());
        if script.contains("offsetHeight") {
            Ok(json!(self.content_height))
        } else {
            Ok(serde_json::Value::Null)
        }
    }

    fn snapshot(&mut self) -> Result<Bitmap> {
        self.shared.lock().unwrap().snapshots += 1;
        Ok(Bitmap::blank(self.width as u32, self.height as u32))
    }

    fn autosize(&mut self) {}

    fn show_behind(&mut self) {
        self.shared.lock().unwrap().shows += 1;
    }

    fn hide(&mut self) {
        self.shared.lock().unwrap().hides += 1;
    }

    fn poll_event(&mut self, timeout: Duration) -> Option<SurfaceEvent> {
        match self.events.pop_front() {
            Some(event) => Some(event),
            None => {
                std::thread::sleep(timeout);
                None
            }
        }
    }
}

/// A print job that records the surface's transform list at each page
pub struct RecordingJob {
    pub layout: PageLayout,
    pub pages: Arc<Mutex<Vec<Vec<Transform>>>>,
    /// Fail when about to emit this (zero-based) page
    pub fail_on_page: Option<usize>,
}

impl RecordingJob {
    pub fn new(printable_width: f64, printable_height: f64) -> Self {
        Self {
            layout: PageLayout {
                printable_width,
                printable_height,
                left_margin: 18.0,
                top_margin: 18.0,
            },
            pages: Arc::new(Mutex::new(Vec::new())),
            fail_on_page: None,
        }
    }

    pub fn pages(&self) -> Arc<Mutex<Vec<Vec<Transform>>>> {
        self.pages.clone()
    }
}

impl PrintJob<StubSurface> for RecordingJob {
    fn page_layout(&self) -> PageLayout {
        self.layout
    }

    fn print_page(&mut self, surface: &mut StubSurface) -> Result<()> {
        let mut pages = self.pages.lock().unwrap();
        if Some(pages.len()) == self.fail_on_page {
            return Err(Error::Print("printer jam".into()));
        }
        pages.push(surface.transforms().to_vec());
        Ok(())
    }
}
