use serde::{Deserialize, Serialize};

use crate::error::{Result, TextdubError};

/// A half-open frame interval `[start_frame, end_frame)` covering one scene.
///
/// Produced once per video by the scene detector; the pipeline consumes the
/// list through a single forward cursor and never revisits a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneBoundary {
    pub start_frame: u64,
    pub end_frame: u64,
}

impl SceneBoundary {
    pub fn new(start_frame: u64, end_frame: u64) -> Self {
        Self {
            start_frame,
            end_frame,
        }
    }

    pub fn len(&self) -> u64 {
        self.end_frame.saturating_sub(self.start_frame)
    }

    pub fn is_empty(&self) -> bool {
        self.end_frame <= self.start_frame
    }

    /// Start/end of the scene in seconds for the given frame rate.
    pub fn seconds(&self, fps: f64) -> (f64, f64) {
        (self.start_frame as f64 / fps, self.end_frame as f64 / fps)
    }
}

/// Validate that a boundary list is ascending, non-overlapping, and ends
/// within the video.
pub fn validate_boundaries(boundaries: &[SceneBoundary], frame_count: u64) -> Result<()> {
    let mut previous_end = 0u64;
    for boundary in boundaries {
        if boundary.is_empty() {
            return Err(TextdubError::Scene(format!(
                "Empty scene boundary [{}, {})",
                boundary.start_frame, boundary.end_frame
            )));
        }
        if boundary.start_frame < previous_end {
            return Err(TextdubError::Scene(format!(
                "Scene boundary [{}, {}) overlaps previous end {}",
                boundary.start_frame, boundary.end_frame, previous_end
            )));
        }
        previous_end = boundary.end_frame;
    }
    if previous_end > frame_count {
        return Err(TextdubError::Scene(format!(
            "Last scene ends at {} but the video has {} frames",
            previous_end, frame_count
        )));
    }
    Ok(())
}

/// An integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A detected text quadrilateral given by its four corners in reading order
/// (top-left, top-right, bottom-right, bottom-left).
///
/// The quad is not necessarily axis-aligned, but layout and overlay treat it
/// as axis-aligned via its top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quad {
    pub points: [Point; 4],
}

impl Quad {
    pub fn new(points: [Point; 4]) -> Self {
        Self { points }
    }

    /// Axis-aligned quad from a bounding rectangle.
    pub fn from_rect(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            points: [
                Point::new(x, y),
                Point::new(x + width, y),
                Point::new(x + width, y + height),
                Point::new(x, y + height),
            ],
        }
    }

    pub fn top_left(&self) -> Point {
        self.points[0]
    }

    pub fn bottom_right(&self) -> Point {
        self.points[2]
    }

    /// Horizontal extent of the axis-aligned treatment; zero when degenerate.
    pub fn width(&self) -> u32 {
        (self.bottom_right().x - self.top_left().x).max(0) as u32
    }

    /// Vertical extent of the axis-aligned treatment; zero when degenerate.
    pub fn height(&self) -> u32 {
        (self.bottom_right().y - self.top_left().y).max(0) as u32
    }
}

/// One recognizer hit: a quad, the recognized string, and its confidence in
/// `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub quad: Quad,
    pub text: String,
    pub confidence: f32,
}

/// A recognized text region with its translation.
///
/// Owned exclusively by the detection cache of the scene that produced it and
/// immutable once translation completes.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRegion {
    pub quad: Quad,
    pub source_text: String,
    pub translated_text: String,
}

impl TextRegion {
    pub fn new(quad: Quad, source_text: String, translated_text: String) -> Self {
        Self {
            quad,
            source_text,
            translated_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_extents_from_corners() {
        let quad = Quad::from_rect(10, 20, 100, 40);
        assert_eq!(quad.top_left(), Point::new(10, 20));
        assert_eq!(quad.bottom_right(), Point::new(110, 60));
        assert_eq!(quad.width(), 100);
        assert_eq!(quad.height(), 40);
    }

    #[test]
    fn test_degenerate_quad_has_zero_extent() {
        let quad = Quad::new([
            Point::new(50, 50),
            Point::new(40, 50),
            Point::new(30, 40),
            Point::new(50, 40),
        ]);
        assert_eq!(quad.width(), 0);
        assert_eq!(quad.height(), 0);
    }

    #[test]
    fn test_validate_boundaries_accepts_adjacent_scenes() {
        let boundaries = vec![SceneBoundary::new(0, 10), SceneBoundary::new(10, 25)];
        assert!(validate_boundaries(&boundaries, 25).is_ok());
    }

    #[test]
    fn test_validate_boundaries_rejects_overlap() {
        let boundaries = vec![SceneBoundary::new(0, 12), SceneBoundary::new(10, 25)];
        assert!(validate_boundaries(&boundaries, 25).is_err());
    }

    #[test]
    fn test_validate_boundaries_rejects_past_end() {
        let boundaries = vec![SceneBoundary::new(0, 30)];
        assert!(validate_boundaries(&boundaries, 25).is_err());
    }

    #[test]
    fn test_boundary_seconds() {
        let boundary = SceneBoundary::new(30, 60);
        let (start, end) = boundary.seconds(30.0);
        assert_eq!(start, 1.0);
        assert_eq!(end, 2.0);
    }
}
