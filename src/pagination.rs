//! Pure scaling and tiling math for paginated printing
//!
//! Everything here is derived per print request from the content bounds and
//! the printable-area bounds; nothing is stored.

/// How many printer-page tiles the rendered content spans
///
/// Tiles are walked in row-major order by the orchestrator: row 0 fully,
/// left to right, before row 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGrid {
    pub columns: u32,
    pub rows: u32,
    /// The effective scale the grid was computed under
    pub scale: f64,
}

impl PageGrid {
    /// Total number of pages the job will emit
    pub fn pages(&self) -> u32 {
        self.columns * self.rows
    }
}

/// Absorbs floating-point rounding so content that almost exactly fills N
/// pages is not pushed to N+1 (same units as the page-count ratio).
const PAGE_COUNT_EPSILON: f64 = 0.1;

/// Uniform scale factor that fits the surface within the printable area
/// without distortion
///
/// Width-based when the surface is at least as wide (proportionally) as the
/// printable area, height-based otherwise.
pub fn fit_scale(surface_width: f64, surface_height: f64, printable_width: f64, printable_height: f64) -> f64 {
    if surface_width / surface_height >= printable_width / printable_height {
        printable_width / surface_width
    } else {
        printable_height / surface_height
    }
}

/// Compute the page grid for the given content and printable-area bounds
///
/// `effective_scale` is the product of all scale transforms currently applied
/// to the surface (1 if none). Tiling must be computed after any fit-to-page
/// scale is applied, since scaling changes how many printable-area tiles the
/// content spans.
pub fn page_grid(
    content_width: f64,
    content_height: f64,
    effective_scale: f64,
    printable_width: f64,
    printable_height: f64,
) -> PageGrid {
    let columns = (content_width / printable_width * effective_scale - PAGE_COUNT_EPSILON)
        .ceil()
        .max(1.0) as u32;
    let rows = (content_height / printable_height * effective_scale - PAGE_COUNT_EPSILON)
        .ceil()
        .max(1.0) as u32;

    PageGrid {
        columns,
        rows,
        scale: effective_scale,
    }
}
