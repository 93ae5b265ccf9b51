// Inpainting collaborator: plausibly reconstructs masked pixels from their
// surroundings so the original on-screen text disappears before the overlay.

use std::collections::VecDeque;

use crate::error::{Result, TextdubError};
use crate::frame::{Frame, RegionMask};

/// Fills masked pixels of a frame from the unmasked neighborhood.
pub trait Inpainter: Send + Sync {
    /// Return a new frame where every masked pixel has been reconstructed.
    /// The mask must have the frame's spatial dimensions.
    fn inpaint(&self, frame: &Frame, mask: &RegionMask) -> Result<Frame>;
}

/// Factory for creating inpainter instances
pub struct InpainterFactory;

impl InpainterFactory {
    /// Create the default inpainter implementation (diffusion-based)
    pub fn create_default() -> Box<dyn Inpainter> {
        Box::new(DiffusionInpainter::new(2))
    }
}

/// Boundary-inward diffusion fill.
///
/// Masked pixels are filled in breadth-first order from the mask boundary,
/// each taking the average of its already-known 4-neighbors, followed by a
/// configurable number of smoothing passes over the masked area. Fully
/// deterministic for a given frame and mask.
pub struct DiffusionInpainter {
    smoothing_passes: usize,
}

impl DiffusionInpainter {
    pub fn new(smoothing_passes: usize) -> Self {
        Self { smoothing_passes }
    }

    fn neighbors(x: u32, y: u32, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
        let (x, y) = (x as i64, y as i64);
        [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
            .into_iter()
            .filter(move |&(nx, ny)| nx >= 0 && ny >= 0 && nx < width as i64 && ny < height as i64)
            .map(|(nx, ny)| (nx as u32, ny as u32))
    }
}

impl Inpainter for DiffusionInpainter {
    fn inpaint(&self, frame: &Frame, mask: &RegionMask) -> Result<Frame> {
        if mask.width() != frame.width() || mask.height() != frame.height() {
            return Err(TextdubError::Inpaint(format!(
                "Mask {}x{} does not match frame {}x{}",
                mask.width(),
                mask.height(),
                frame.width(),
                frame.height()
            )));
        }

        let mut output = frame.clone();
        if mask.is_empty() {
            return Ok(output);
        }

        let (width, height) = (frame.width(), frame.height());
        let mut known = vec![false; (width as usize) * (height as usize)];
        let index = |x: u32, y: u32| (y as usize) * (width as usize) + x as usize;

        // Seed the frontier with masked pixels touching unmasked ones.
        let mut frontier = VecDeque::new();
        for y in 0..height {
            for x in 0..width {
                if !mask.is_masked(x, y) {
                    known[index(x, y)] = true;
                } else if Self::neighbors(x, y, width, height)
                    .any(|(nx, ny)| !mask.is_masked(nx, ny))
                {
                    frontier.push_back((x, y));
                }
            }
        }

        while let Some((x, y)) = frontier.pop_front() {
            if known[index(x, y)] {
                continue;
            }
            let mut sum = [0u32; 3];
            let mut count = 0u32;
            for (nx, ny) in Self::neighbors(x, y, width, height) {
                if known[index(nx, ny)] {
                    let pixel = output.pixel(nx, ny);
                    sum[0] += pixel[0] as u32;
                    sum[1] += pixel[1] as u32;
                    sum[2] += pixel[2] as u32;
                    count += 1;
                }
            }
            if count == 0 {
                // Fully enclosed by unknown pixels; revisit once neighbors fill in.
                frontier.push_back((x, y));
                continue;
            }
            output.put_pixel(
                x,
                y,
                [
                    (sum[0] / count) as u8,
                    (sum[1] / count) as u8,
                    (sum[2] / count) as u8,
                ],
            );
            known[index(x, y)] = true;
            for (nx, ny) in Self::neighbors(x, y, width, height) {
                if !known[index(nx, ny)] {
                    frontier.push_back((nx, ny));
                }
            }
        }

        // Smooth the filled area so the diffusion front does not leave seams.
        for _ in 0..self.smoothing_passes {
            let snapshot = output.clone();
            for y in 0..height {
                for x in 0..width {
                    if !mask.is_masked(x, y) {
                        continue;
                    }
                    let mut sum = [0u32; 3];
                    let mut count = 0u32;
                    let center = snapshot.pixel(x, y);
                    sum[0] += center[0] as u32;
                    sum[1] += center[1] as u32;
                    sum[2] += center[2] as u32;
                    count += 1;
                    for (nx, ny) in Self::neighbors(x, y, width, height) {
                        let pixel = snapshot.pixel(nx, ny);
                        sum[0] += pixel[0] as u32;
                        sum[1] += pixel[1] as u32;
                        sum[2] += pixel[2] as u32;
                        count += 1;
                    }
                    output.put_pixel(
                        x,
                        y,
                        [
                            (sum[0] / count) as u8,
                            (sum[1] / count) as u8,
                            (sum[2] / count) as u8,
                        ],
                    );
                }
            }
        }

        Ok(output)
    }
}
