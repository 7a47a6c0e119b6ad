//! Terrain occupancy grid built from the level image
//!
//! The level is authored as an ordinary image: dark, opaque pixels are ground,
//! everything else is open air. At startup the image is decoded once into a
//! boolean grid with one cell per pixel, after which the grid never changes
//! and is shared read-only by every simulation tick.
//!
//! Coordinates follow the image convention: x grows right, y grows down, so
//! "above" means a smaller row index.

use image::RgbaImage;
use log::info;
use std::path::Path;

/// A pixel must be more opaque than this to count as ground.
const SOLID_ALPHA_MIN: u8 = 127;
/// A pixel's Rec. 601 luma must be below this to count as ground.
const SOLID_LUMA_MAX: f32 = 128.0;

/// Immutable solid/open lookup over the terrain, one cell per source pixel.
///
/// Queries take world coordinates as floats and truncate to cell resolution.
/// Anything outside the grid reports as open, so entities that stray past the
/// map edges simply fall until the respawn rule catches them.
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    /// Row-major solidity flags, `width * height` entries.
    cells: Vec<bool>,
}

impl OccupancyGrid {
    /// Decodes the image at `path` and classifies every pixel.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, image::ImageError> {
        let path = path.as_ref();
        let image = image::open(path)?.to_rgba8();
        let grid = Self::from_image(&image);
        info!(
            "Loaded terrain {} ({}x{}, {} solid cells)",
            path.display(),
            grid.width,
            grid.height,
            grid.solid_count()
        );
        Ok(grid)
    }

    /// Builds a grid from an already decoded RGBA image.
    pub fn from_image(image: &RgbaImage) -> Self {
        let width = image.width() as usize;
        let height = image.height() as usize;
        let mut cells = vec![false; width * height];

        for (x, y, pixel) in image.enumerate_pixels() {
            let [r, g, b, a] = pixel.0;
            cells[y as usize * width + x as usize] = is_ground_pixel(r, g, b, a);
        }

        Self {
            width,
            height,
            cells,
        }
    }

    /// Builds a grid directly from a predicate over `(col, row)`. Test levels
    /// are much easier to describe this way than as image fixtures.
    pub fn from_fn<F>(width: usize, height: usize, mut solid: F) -> Self
    where
        F: FnMut(usize, usize) -> bool,
    {
        let mut cells = vec![false; width * height];
        for row in 0..height {
            for col in 0..width {
                cells[row * width + col] = solid(col, row);
            }
        }

        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of solid cells, mostly useful for startup logging.
    pub fn solid_count(&self) -> usize {
        self.cells.iter().filter(|&&solid| solid).count()
    }

    /// Reports whether the cell containing `(x, y)` is solid.
    ///
    /// Out-of-bounds coordinates report open rather than erroring. Negative
    /// coordinates must be rejected before the integer cast: `as usize` on a
    /// negative float saturates to zero, which would alias the map edge.
    pub fn is_solid(&self, x: f32, y: f32) -> bool {
        if x < 0.0 || y < 0.0 {
            return false;
        }

        let col = x as usize;
        let row = y as usize;
        if col >= self.width || row >= self.height {
            return false;
        }

        self.cells[row * self.width + col]
    }

    /// Finds the open cell on top of the solid run containing `(x, y)`.
    ///
    /// Returns the row an entity should rest at: the first non-solid row when
    /// scanning upward from the queried cell. Returns `None` when the queried
    /// cell is not solid (nothing to stand on) or when the solid run extends
    /// to the top edge of the grid, in which case the column is fully buried
    /// and there is no valid surface to snap to.
    pub fn surface_above(&self, x: f32, y: f32) -> Option<f32> {
        if !self.is_solid(x, y) {
            return None;
        }

        let col = x as usize;
        let mut row = y as usize;
        while self.cells[row * self.width + col] {
            if row == 0 {
                return None;
            }
            row -= 1;
        }

        Some(row as f32)
    }
}

/// "Dark and opaque" pixel classification.
fn is_ground_pixel(r: u8, g: u8, b: u8, a: u8) -> bool {
    if a <= SOLID_ALPHA_MIN {
        return false;
    }
    let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    luma < SOLID_LUMA_MAX
}
