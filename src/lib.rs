//! Webshot — off-screen HTML print and capture core
//!
//! Renders an HTML document off-screen using an embedded rendering engine and
//! exposes the result in two forms: a paginated vector print job, and a
//! rasterized bitmap capture.
//!
//! The rendering engine itself is a black box behind the [`RenderSurface`]
//! trait (load content, report lifecycle events, run script, snapshot, apply
//! transforms). This crate supplies the hard part around it: a single
//! persistent engine thread that owns the surface, a blocking
//! render-then-produce API for ordinary caller threads, and the tiling math
//! that splits an arbitrarily large rendered surface into printer-page-sized
//! tiles.
//!
//! # Example
//!
//! ```no_run
//! use webshot::{NullSurface, RenderRequest, WebShot};
//!
//! # fn main() -> webshot::Result<()> {
//! let shot = WebShot::new(|| NullSurface);
//! shot.initialize()?;
//!
//! let request = RenderRequest::html("<h1>hello</h1>", 8.5 * 72.0, 0.0);
//! let bitmap = shot.raster(request)?;
//! println!("captured {}x{}", bitmap.width, bitmap.height);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod engine;
pub mod pagination;
pub mod printer;
pub mod session;

pub use pagination::{fit_scale, page_grid, PageGrid};
pub use printer::{WebShot, DEFAULT_STARTUP_TIMEOUT};
pub use session::RenderSession;

/// A request to render one HTML document
///
/// Built by the caller, immutable once submitted. `web_width`/`web_height`
/// are in print points; a height of zero (or less) asks the engine to measure
/// the natural document height after the first successful load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Raw HTML markup, or a navigable URL (see `plain_text`)
    pub source: String,
    /// When true, `source` is loaded as raw markup and never fetched
    pub plain_text: bool,
    /// Requested content width
    pub web_width: f64,
    /// Requested content height; <= 0 means "measure after load"
    pub web_height: f64,
    /// Zoom factor applied to the surface (raster only; print forces 1)
    pub zoom: f64,
    /// Whether printed output should be scaled to fit the printable area
    pub scaled: bool,
}

impl RenderRequest {
    /// Request rendering of raw HTML markup
    pub fn html(markup: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            source: markup.into(),
            plain_text: true,
            web_width: width,
            web_height: height,
            zoom: 1.0,
            scaled: false,
        }
    }

    /// Request rendering of a navigable resource
    pub fn url(url: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            source: url.into(),
            plain_text: false,
            web_width: width,
            web_height: height,
            zoom: 1.0,
            scaled: false,
        }
    }
}

/// Printable-page geometry reported by the print subsystem
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageLayout {
    pub printable_width: f64,
    pub printable_height: f64,
    pub left_margin: f64,
    pub top_margin: f64,
}

/// An affine transform applied to the render surface
///
/// The surface keeps an ordered list of these; print tiling works by pushing
/// a fit-to-page `Scale` followed by a per-tile `Translate`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// Uniform or non-uniform scale (x factor, y factor)
    Scale(f64, f64),
    /// Offset in surface units
    Translate { x: f64, y: f64 },
}

/// Product of the x factors of all applied `Scale` transforms (1 if none)
pub fn effective_scale(transforms: &[Transform]) -> f64 {
    transforms.iter().fold(1.0, |acc, t| match t {
        Transform::Scale(sx, _) => acc * sx,
        Transform::Translate { .. } => acc,
    })
}

/// A portable raster capture: tightly packed RGBA8 pixels
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// An opaque white bitmap of the given dimensions
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0xff; (width as usize) * (height as usize) * 4],
        }
    }
}

/// Lifecycle and frame-clock events reported by the rendering engine
#[derive(Debug, Clone)]
pub enum SurfaceEvent {
    /// Load progress in [0, 1]; observability only
    Progress(f64),
    /// The load worker succeeded
    LoadFinished,
    /// The load worker reported an exception
    LoadFailed(String),
    /// One frame was rendered (the engine's frame clock)
    FrameRendered,
}

/// The embedded rendering engine, as consumed by this core
///
/// Implementations are driven exclusively from the dedicated engine thread:
/// no method is ever called concurrently. `poll_event` is the event pump; it
/// should block for at most `timeout` when no event is pending.
pub trait RenderSurface: Send + 'static {
    /// Pin the surface to the given dimensions
    fn set_size(&mut self, width: f64, height: f64);

    /// Set the zoom factor applied to the rendered content
    fn set_zoom(&mut self, zoom: f64);

    fn width(&self) -> f64;
    fn height(&self) -> f64;

    /// Remove every applied transform
    fn clear_transforms(&mut self);

    /// Append a transform to the ordered transform list
    fn push_transform(&mut self, transform: Transform);

    /// Replace the transform at `index` in place
    fn set_transform(&mut self, index: usize, transform: Transform);

    /// Remove the transform at `index`
    fn remove_transform(&mut self, index: usize);

    /// Currently applied transforms, in application order
    fn transforms(&self) -> &[Transform];

    /// Begin loading raw markup; completion arrives via `poll_event`
    fn load_content(&mut self, markup: &str, mime_type: &str);

    /// Begin loading a navigable resource; completion arrives via `poll_event`
    fn load_url(&mut self, url: &str);

    /// Evaluate script against the loaded document and return its value
    fn execute_script(&mut self, script: &str) -> Result<serde_json::Value>;

    /// Capture the current (transformed) surface as a bitmap
    fn snapshot(&mut self) -> Result<Bitmap>;

    /// Recompute the surface's own preferred size
    fn autosize(&mut self);

    /// Best-effort internal layout refresh; works around engines that paint
    /// blank pages after an off-screen resize. Failure is non-fatal.
    fn refresh_peer(&mut self) -> Result<()> {
        Ok(())
    }

    /// Make the surface visible but behind other windows. Some engines only
    /// produce valid pixel captures from a showing surface.
    fn show_behind(&mut self);

    /// Hide the surface again; must not stop the engine
    fn hide(&mut self);

    /// Pump the next lifecycle/frame event, waiting at most `timeout`
    fn poll_event(&mut self, timeout: Duration) -> Option<SurfaceEvent>;
}

/// One print job: page geometry plus the ability to emit a single page from
/// the current visible transformed surface
pub trait PrintJob<S: RenderSurface>: Send {
    /// Printable geometry for every page of this job
    fn page_layout(&self) -> PageLayout;

    /// Render the surface, as currently transformed, onto one physical page
    fn print_page(&mut self, surface: &mut S) -> Result<()>;
}

/// A surface that renders nothing; useful for doc examples and smoke tests
pub struct NullSurface;

impl RenderSurface for NullSurface {
    fn set_size(&mut self, _width: f64, _height: f64) {}
    fn set_zoom(&mut self, _zoom: f64) {}
    fn width(&self) -> f64 {
        0.0
    }
    fn height(&self) -> f64 {
        0.0
    }
    fn clear_transforms(&mut self) {}
    fn push_transform(&mut self, _transform: Transform) {}
    fn set_transform(&mut self, _index: usize, _transform: Transform) {}
    fn remove_transform(&mut self, _index: usize) {}
    fn transforms(&self) -> &[Transform] {
        &[]
    }
    fn load_content(&mut self, _markup: &str, _mime_type: &str) {}
    fn load_url(&mut self, _url: &str) {}
    fn execute_script(&mut self, _script: &str) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }
    fn snapshot(&mut self) -> Result<Bitmap> {
        Ok(Bitmap::blank(1, 1))
    }
    fn autosize(&mut self) {}
    fn show_behind(&mut self) {}
    fn hide(&mut self) {}
    fn poll_event(&mut self, timeout: Duration) -> Option<SurfaceEvent> {
        std::thread::sleep(timeout);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_request_defaults() {
        let req = RenderRequest::html("<p>hi</p>", 612.0, 0.0);
        assert!(req.plain_text);
        assert_eq!(req.zoom, 1.0);
        assert!(!req.scaled);
        assert_eq!(req.web_width, 612.0);
    }

    #[test]
    fn test_url_request_is_not_plain_text() {
        let req = RenderRequest::url("http://localhost/doc", 612.0, 792.0);
        assert!(!req.plain_text);
    }

    #[test]
    fn test_effective_scale_multiplies_scales_only() {
        let transforms = [
            Transform::Scale(0.5, 0.5),
            Transform::Translate { x: -10.0, y: 0.0 },
            Transform::Scale(0.5, 1.0),
        ];
        assert!((effective_scale(&transforms) - 0.25).abs() < 1e-12);
        assert_eq!(effective_scale(&[]), 1.0);
    }

    #[test]
    fn test_blank_bitmap_dimensions() {
        let b = Bitmap::blank(4, 3);
        assert_eq!(b.pixels.len(), 4 * 3 * 4);
        assert!(b.pixels.iter().all(|&p| p == 0xff));
    }
}
