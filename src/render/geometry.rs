use kurbo::{Point, Rect, Size};

use crate::{config::DrawPolicy, foundation::core::GridSize};

/// Integer pixel rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.x + self.width),
            f64::from(self.y + self.height),
        )
    }

    /// Snap a rectangle to whole pixels, clipped to `bounds` and at least 1×1.
    fn from_rect_within(rect: Rect, bounds: PixelRect) -> Self {
        let clipped = rect.round().intersect(bounds.to_rect());
        let x0 = clipped.x0.max(f64::from(bounds.x)) as u32;
        let y0 = clipped.y0.max(f64::from(bounds.y)) as u32;
        let max_x = bounds.x + bounds.width - 1;
        let max_y = bounds.y + bounds.height - 1;
        let x0 = x0.min(max_x);
        let y0 = y0.min(max_y);
        let x1 = (clipped.x1 as u32).clamp(x0 + 1, max_x + 1);
        let y1 = (clipped.y1 as u32).clamp(y0 + 1, max_y + 1);
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn center(self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Partition of a `resolution × resolution` square into `n × n` cells.
///
/// Cell edges sit at `i * resolution / n` (integer division), so cells tile the square with no
/// gaps or overlap even when `resolution` is not a multiple of `n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellLayout {
    pub resolution: u32,
    pub grid: GridSize,
}

impl CellLayout {
    pub fn new(resolution: u32, grid: GridSize) -> Self {
        Self { resolution, grid }
    }

    pub fn cell_count(&self) -> usize {
        self.grid.cell_count()
    }

    /// Nominal cell side, `resolution / n`.
    pub fn cell_size(&self) -> f64 {
        f64::from(self.resolution) / f64::from(self.grid.get())
    }

    fn edge(&self, i: u32) -> u32 {
        let n = u64::from(self.grid.get());
        (u64::from(i) * u64::from(self.resolution) / n) as u32
    }

    /// Pixel bounds of the cell at row-major `index`: column `index % n`, row `index / n`.
    pub fn cell_rect(&self, index: usize) -> PixelRect {
        let n = usize::from(self.grid.get());
        let col = (index % n) as u32;
        let row = (index / n) as u32;
        let x0 = self.edge(col);
        let x1 = self.edge(col + 1);
        let y0 = self.edge(row);
        let y1 = self.edge(row + 1);
        PixelRect::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn cells(&self) -> impl Iterator<Item = PixelRect> + '_ {
        (0..self.cell_count()).map(|i| self.cell_rect(i))
    }
}

/// Region of a `width × height` source image that ends up visible in `cell`.
///
/// Stretch shows the whole image. Cover scales uniformly by
/// `max(cell_w / width, cell_h / height)` and centers, so only the middle
/// `cell_w / scale × cell_h / scale` region survives the clip to the cell.
pub fn source_crop(policy: DrawPolicy, width: u32, height: u32, cell: PixelRect) -> PixelRect {
    let full = PixelRect::new(0, 0, width.max(1), height.max(1));
    match policy {
        DrawPolicy::Stretch => full,
        DrawPolicy::Cover => {
            let (iw, ih) = (f64::from(full.width), f64::from(full.height));
            let (cw, ch) = (f64::from(cell.width), f64::from(cell.height));
            let scale = (cw / iw).max(ch / ih);
            let visible = Size::new(cw / scale, ch / scale);
            let crop = Rect::from_center_size(Point::new(iw / 2.0, ih / 2.0), visible);
            PixelRect::from_rect_within(crop, full)
        }
    }
}
