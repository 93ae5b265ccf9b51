use image::{Rgb, RgbImage};

use crate::region::Quad;

/// One decoded video frame as an interleaved RGB buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// A uniformly colored frame, mostly useful in tests.
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, Rgb(color)),
        }
    }

    /// Build a frame from raw interleaved rgb24 bytes. Returns `None` when
    /// the byte count does not match `width * height * 3`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(|image| Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.image.get_pixel(x, y).0
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.image.put_pixel(x, y, Rgb(color));
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.image.into_raw()
    }

    /// Fill the quadrilateral with a solid color, clipped to the frame.
    pub fn fill_quad(&mut self, quad: &Quad, color: [u8; 3]) {
        let (width, height) = (self.width(), self.height());
        for_each_quad_pixel(quad, width, height, |x, y| {
            self.image.put_pixel(x, y, Rgb(color));
        });
    }
}

/// A binary per-pixel mask with the same spatial dimensions as its frame.
///
/// Carried explicitly from mask time through inpainting so that masked
/// pixels are never re-derived from pixel values.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl RegionMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_masked(&self, x: u32, y: u32) -> bool {
        self.data[(y as usize) * (self.width as usize) + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32) {
        self.data[(y as usize) * (self.width as usize) + x as usize] = true;
    }

    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&masked| masked)
    }

    pub fn masked_count(&self) -> usize {
        self.data.iter().filter(|&&masked| masked).count()
    }

    /// Mark every pixel covered by the quadrilateral, clipped to the mask.
    pub fn fill_quad(&mut self, quad: &Quad) {
        let (width, height) = (self.width, self.height);
        for_each_quad_pixel(quad, width, height, |x, y| {
            self.data[(y as usize) * (width as usize) + x as usize] = true;
        });
    }
}

/// Scanline fill over an arbitrary quadrilateral using even-odd edge
/// crossings, clipped to `width` x `height`.
fn for_each_quad_pixel<F: FnMut(u32, u32)>(quad: &Quad, width: u32, height: u32, mut visit: F) {
    if width == 0 || height == 0 {
        return;
    }
    let ys = quad.points.iter().map(|p| p.y);
    let min_y = ys.clone().min().unwrap_or(0).max(0);
    let max_y = quad
        .points
        .iter()
        .map(|p| p.y)
        .max()
        .unwrap_or(0)
        .min(height as i32 - 1);

    for y in min_y..=max_y {
        let scan = y as f64 + 0.5;
        let mut crossings: Vec<f64> = Vec::with_capacity(4);
        for i in 0..4 {
            let a = quad.points[i];
            let b = quad.points[(i + 1) % 4];
            let (ay, by) = (a.y as f64, b.y as f64);
            if (ay <= scan && by > scan) || (by <= scan && ay > scan) {
                let t = (scan - ay) / (by - ay);
                crossings.push(a.x as f64 + t * (b.x - a.x) as f64);
            }
        }
        crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        for pair in crossings.chunks_exact(2) {
            let start = pair[0].floor().max(0.0) as u32;
            let end = pair[1].ceil().min(width as f64) as u32;
            for x in start..end {
                visit(x, y as u32);
            }
        }
    }
}
