//! Row-major pixel buffers and pixel windows.

/// A single raster sample type.
///
/// Each channel stores its own sample type: elevation uses `f32` heights
/// with NaN as no-data, color uses packed RGB bytes.
pub trait Sample: Copy + Send + Sync + 'static {
    /// Value used for pixels not covered by any source.
    const NODATA: Self;

    /// Returns true if this sample carries no data.
    fn is_nodata(&self) -> bool;
}

impl Sample for f32 {
    const NODATA: Self = f32::NAN;

    fn is_nodata(&self) -> bool {
        self.is_nan()
    }
}

/// Packed 8-bit RGB color sample.
pub type Rgb = [u8; 3];

impl Sample for Rgb {
    const NODATA: Self = [0, 0, 0];

    // Black is a legitimate orthophoto value, so color never reports no-data.
    fn is_nodata(&self) -> bool {
        false
    }
}

/// A rectangular pixel region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelWindow {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Square window of side `side` at `(x, y)`.
    pub fn square(x: u32, y: u32, side: u32) -> Self {
        Self::new(x, y, side, side)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Owned row-major pixel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    width: u32,
    height: u32,
    data: Vec<T>,
}

impl<T: Sample> Grid<T> {
    /// Create a grid filled with `value`.
    pub fn filled(width: u32, height: u32, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Create a grid filled with the no-data value.
    pub fn nodata(width: u32, height: u32) -> Self {
        Self::filled(width, height, T::NODATA)
    }

    /// Wrap an existing buffer. Returns `None` if the length does not match.
    pub fn from_vec(width: u32, height: u32, data: Vec<T>) -> Option<Self> {
        (data.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Window covering the whole grid.
    pub fn bounds(&self) -> PixelWindow {
        PixelWindow::new(0, 0, self.width, self.height)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Sample at `(x, y)`. Panics if out of range.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> T {
        self.data[self.index(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// One row as a slice.
    pub fn row(&self, y: u32) -> &[T] {
        let start = self.index(0, y);
        &self.data[start..start + self.width as usize]
    }

    /// One column copied out.
    pub fn column(&self, x: u32) -> Vec<T> {
        (0..self.height).map(|y| self.get(x, y)).collect()
    }

    pub fn set_row(&mut self, y: u32, values: &[T]) {
        let start = self.index(0, y);
        let len = values.len().min(self.width as usize);
        self.data[start..start + len].copy_from_slice(&values[..len]);
    }

    pub fn set_column(&mut self, x: u32, values: &[T]) {
        for (y, value) in values.iter().take(self.height as usize).enumerate() {
            self.set(x, y as u32, *value);
        }
    }

    /// Copy `window` out into a new grid. The window must lie inside the grid.
    pub fn window(&self, window: PixelWindow) -> Grid<T> {
        debug_assert!(window.right() <= self.width && window.bottom() <= self.height);
        let mut data = Vec::with_capacity(window.width as usize * window.height as usize);
        for y in window.y..window.bottom() {
            let start = self.index(window.x, y);
            data.extend_from_slice(&self.data[start..start + window.width as usize]);
        }
        Grid {
            width: window.width,
            height: window.height,
            data,
        }
    }

    /// Copy `source` into this grid with its top-left at signed offset
    /// `(dx, dy)`, clipping whatever falls outside.
    pub fn blit(&mut self, source: &Grid<T>, dx: i64, dy: i64) {
        let x0 = dx.max(0);
        let y0 = dy.max(0);
        let x1 = (dx + source.width as i64).min(self.width as i64);
        let y1 = (dy + source.height as i64).min(self.height as i64);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let len = (x1 - x0) as usize;
        for y in y0..y1 {
            let src_start = source.index((x0 - dx) as u32, (y - dy) as u32);
            let dst_start = self.index(x0 as u32, y as u32);
            self.data[dst_start..dst_start + len]
                .copy_from_slice(&source.data[src_start..src_start + len]);
        }
    }
}

impl Grid<Rgb> {
    /// Convert into an `image` RGB buffer.
    pub fn into_rgb_image(self) -> image::RgbImage {
        let (width, height) = (self.width, self.height);
        let raw: Vec<u8> = self.data.into_iter().flatten().collect();
        image::RgbImage::from_raw(width, height, raw)
            .unwrap_or_else(|| image::RgbImage::new(width, height))
    }

    /// Build a grid from an `image` RGB buffer.
    pub fn from_rgb_image(image: &image::RgbImage) -> Self {
        let data = image.pixels().map(|p| p.0).collect();
        Grid {
            width: image.width(),
            height: image.height(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: u32, height: u32) -> Grid<f32> {
        let data = (0..width * height).map(|v| v as f32).collect();
        Grid::from_vec(width, height, data).unwrap()
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        assert!(Grid::<f32>::from_vec(2, 2, vec![0.0; 3]).is_none());
    }

    #[test]
    fn test_window_copies_region() {
        let grid = ramp(4, 4);
        let win = grid.window(PixelWindow::new(1, 2, 2, 2));
        assert_eq!(win.as_slice(), &[9.0, 10.0, 13.0, 14.0]);
    }

    #[test]
    fn test_blit_clips_negative_offset() {
        let mut target = Grid::<f32>::filled(3, 3, 0.0);
        let source = Grid::filled(2, 2, 7.0);
        target.blit(&source, -1, -1);
        assert_eq!(target.get(0, 0), 7.0);
        assert_eq!(target.get(1, 0), 0.0);
        assert_eq!(target.get(0, 1), 0.0);
    }

    #[test]
    fn test_blit_clips_past_edge() {
        let mut target = Grid::<f32>::filled(3, 3, 0.0);
        let source = Grid::filled(2, 2, 5.0);
        target.blit(&source, 2, 2);
        assert_eq!(target.get(2, 2), 5.0);
        assert_eq!(target.as_slice().iter().filter(|v| **v == 5.0).count(), 1);
    }

    #[test]
    fn test_rows_and_columns() {
        let mut grid = ramp(3, 2);
        assert_eq!(grid.row(1), &[3.0, 4.0, 5.0]);
        assert_eq!(grid.column(2), vec![2.0, 5.0]);
        grid.set_column(0, &[-1.0, -2.0]);
        grid.set_row(0, &[9.0, 9.0, 9.0]);
        assert_eq!(grid.as_slice(), &[9.0, 9.0, 9.0, -2.0, 4.0, 5.0]);
    }

    #[test]
    fn test_nodata_defaults() {
        let heights = Grid::<f32>::nodata(2, 1);
        assert!(heights.as_slice().iter().all(|v| v.is_nodata()));
        let colors = Grid::<Rgb>::nodata(2, 1);
        assert_eq!(colors.get(1, 0), [0, 0, 0]);
    }

    #[test]
    fn test_rgb_image_conversion() {
        let grid = Grid::from_vec(2, 1, vec![[1, 2, 3], [4, 5, 6]]).unwrap();
        let image = grid.clone().into_rgb_image();
        assert_eq!(image.get_pixel(1, 0).0, [4, 5, 6]);
        assert_eq!(Grid::from_rgb_image(&image), grid);
    }
}
