// Text recognition collaborator
//
// Consumes one decoded frame and produces text quads with confidences. The
// default implementation shells out to tesseract in TSV mode.

pub mod tesseract;

use async_trait::async_trait;

pub use tesseract::TesseractRecognizer;

use crate::config::OcrConfig;
use crate::error::Result;
use crate::frame::Frame;
use crate::region::Detection;

/// Main trait for text recognition on decoded frames
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize text regions in one frame. Confidence filtering is the
    /// pipeline's responsibility; implementations return everything found.
    async fn recognize(&self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// Factory for creating text recognizer instances
pub struct TextRecognizerFactory;

impl TextRecognizerFactory {
    /// Create the default recognizer implementation (tesseract-based)
    pub fn create_recognizer(config: OcrConfig) -> Box<dyn TextRecognizer> {
        Box::new(TesseractRecognizer::new(config))
    }
}
