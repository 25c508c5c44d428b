//! OCR module: locating and reading text in screen captures
//!
//! This module provides:
//! - `OcrEngine` / `OcrEngineLoader`: the engine seam used by sessions
//! - `paddle`: PaddleOCR detection, classification and recognition on ONNX Runtime
//! - `db_postprocess`: turning a detection probability map into boxes
//! - `ctc`: character dictionary and greedy CTC decoding

mod ctc;
mod db_postprocess;
mod paddle;

use async_trait::async_trait;
use image::GrayImage;
use std::sync::Arc;

use crate::error::Result;
use crate::geometry::{BoundingBox, OcrResult};

pub use ctc::{greedy_decode, CharDictionary};
pub use db_postprocess::{boxes_from_prob_map, DbParams, PixelBox};
pub use paddle::{PaddleOcrEngine, PaddleOcrLoader};

/// Detection polygon, clockwise from the top-left corner
pub type Quad = [(f32, f32); 4];

/// One text region as reported by an engine
#[derive(Debug, Clone, PartialEq)]
pub struct TextDetection {
    pub quad: Quad,
    pub text: String,
    pub confidence: f32,
}

impl TextDetection {
    /// Box spanned by the polygon's top-left and bottom-right corners
    pub fn bounding_box(&self) -> BoundingBox {
        let (tl, br) = (self.quad[0], self.quad[2]);
        BoundingBox::from_corners((tl.0 as i32, tl.1 as i32), (br.0 as i32, br.1 as i32))
    }
}

/// A loaded text recognition engine
pub trait OcrEngine: Send + Sync {
    /// Detect and read text in `image`. `use_angle_cls` enables the
    /// orientation classifier on each detected line.
    fn recognize(&self, image: &GrayImage, use_angle_cls: bool) -> Result<Vec<TextDetection>>;
}

/// Creates engines for a language
#[async_trait]
pub trait OcrEngineLoader: Send + Sync {
    async fn load(&self, language: &str) -> Result<Arc<dyn OcrEngine>>;
}

/// Keep detections whose confidence is strictly above `confidence`.
///
/// Returns `None` rather than an empty list when nothing survives.
pub fn filter_detections(detections: &[TextDetection], confidence: f32) -> Option<Vec<OcrResult>> {
    let results: Vec<OcrResult> = detections
        .iter()
        .filter(|d| d.confidence > confidence)
        .map(|d| OcrResult::new(d.bounding_box(), d.text.clone()))
        .collect();

    if results.is_empty() {
        None
    } else {
        Some(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(text: &str, confidence: f32) -> TextDetection {
        TextDetection {
            quad: [(10.0, 20.0), (50.0, 20.0), (50.0, 80.0), (10.0, 80.0)],
            text: text.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_bounding_box_from_quad() {
        let bbox = detection("x", 0.9).bounding_box();
        assert_eq!(bbox, BoundingBox::new(10, 20, 40, 60));
    }

    #[test]
    fn test_threshold_is_strict() {
        let detections = vec![detection("at", 0.85), detection("above", 0.86)];
        let results = filter_detections(&detections, 0.85).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "above");
    }

    #[test]
    fn test_no_detections_is_none() {
        assert_eq!(filter_detections(&[], 0.85), None);
    }

    #[test]
    fn test_all_below_threshold_is_none() {
        let detections = vec![detection("a", 0.5), detection("b", 0.85)];
        assert_eq!(filter_detections(&detections, 0.85), None);
    }
}
