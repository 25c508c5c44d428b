//! PaddleOCR models on ONNX Runtime
//!
//! A language directory holds `det.onnx`, `rec.onnx`, `dict.txt` and
//! optionally `cls.onnx`.

use async_trait::async_trait;
use image::{imageops, imageops::FilterType, DynamicImage, GrayImage, RgbImage};
use ndarray::Array4;
use ort::{session::Session, value::Value};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::ctc::{greedy_decode, CharDictionary};
use super::db_postprocess::{boxes_from_prob_map, DbParams, PixelBox};
use super::{OcrEngine, OcrEngineLoader, TextDetection};
use crate::config::{model_subdir, OcrSettings, SETTINGS};
use crate::error::{AdbOcrError, Result};

const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const DET_STD: [f32; 3] = [0.229, 0.224, 0.225];
const REC_HEIGHT: u32 = 48;
const REC_MIN_WIDTH: u32 = 320;
const CLS_WIDTH: u32 = 192;
const CLS_THRESHOLD: f32 = 0.9;

fn build_session(path: &Path, intra_threads: usize) -> Result<Session> {
    if !path.exists() {
        return Err(AdbOcrError::ModelNotFound(path.display().to_string()));
    }

    info!("Loading OCR model from disk: {}", path.display());

    Session::builder()
        .map_err(AdbOcrError::ocr)?
        .with_intra_threads(intra_threads)
        .map_err(AdbOcrError::ocr)?
        .commit_from_file(path)
        .map_err(AdbOcrError::ocr)
}

/// Run a single-input model and copy out its first output
fn run_model(session: &Mutex<Session>, input: Array4<f32>) -> Result<(Vec<usize>, Vec<f32>)> {
    let shape: Vec<usize> = input.shape().to_vec();
    let (data, _offset) = input.into_raw_vec_and_offset();
    let shape_arr: [usize; 4] = [shape[0], shape[1], shape[2], shape[3]];
    let value = Value::from_array((shape_arr, data)).map_err(AdbOcrError::ocr)?;

    let mut session = session.lock();
    let outputs = session
        .run(ort::inputs![value])
        .map_err(AdbOcrError::ocr)?;

    let first_key = outputs
        .keys()
        .next()
        .ok_or_else(|| AdbOcrError::Ocr("model produced no outputs".to_string()))?;
    let (dims, values) = outputs[first_key]
        .try_extract_tensor::<f32>()
        .map_err(AdbOcrError::ocr)?;

    let dims: Vec<usize> = dims.iter().map(|&d| d as usize).collect();
    Ok((dims, values.to_vec()))
}

/// Target detection input size: longest side capped, both sides multiples of 32
fn det_input_size(width: u32, height: u32, max_side_len: u32) -> (u32, u32) {
    let longest = width.max(height).max(1) as f32;
    let ratio = if longest > max_side_len as f32 {
        max_side_len as f32 / longest
    } else {
        1.0
    };
    let round32 = |v: u32| -> u32 {
        let scaled = (v as f32 * ratio / 32.0).round() as u32 * 32;
        scaled.max(32)
    };
    (round32(width), round32(height))
}

/// Normalized `[1, 3, h, w]` tensor; columns past the image width stay zero
fn to_tensor(img: &RgbImage, padded_width: u32, mean: [f32; 3], std: [f32; 3]) -> Array4<f32> {
    let (w, h) = img.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, padded_width.max(w) as usize));
    for (x, y, pixel) in img.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - mean[c]) / std[c];
        }
    }
    tensor
}

/// Resize a text line to the recognition height keeping its aspect ratio
fn resize_line(crop: &RgbImage, height: u32, max_width: Option<u32>) -> RgbImage {
    let (w, h) = crop.dimensions();
    let mut width = ((height as f32 * w as f32 / h.max(1) as f32).ceil() as u32).max(1);
    if let Some(max) = max_width {
        width = width.min(max);
    }
    imageops::resize(crop, width, height, FilterType::Triangle)
}

/// PaddleOCR detection + recognition (+ optional orientation) pipeline
pub struct PaddleOcrEngine {
    det: Mutex<Session>,
    rec: Mutex<Session>,
    cls: Option<Mutex<Session>>,
    dict: CharDictionary,
    params: DbParams,
    max_side_len: u32,
}

impl PaddleOcrEngine {
    /// Load the models in `dir`
    pub fn from_dir(dir: &Path, settings: &OcrSettings) -> Result<Self> {
        let threads = settings.intra_threads;
        let det = build_session(&dir.join("det.onnx"), threads)?;
        let rec = build_session(&dir.join("rec.onnx"), threads)?;
        let dict = CharDictionary::load(&dir.join("dict.txt"))?;

        let cls_path = dir.join("cls.onnx");
        let cls = if cls_path.exists() {
            Some(Mutex::new(build_session(&cls_path, threads)?))
        } else {
            None
        };

        info!(
            "OCR engine initialized: dict_size={}, classifier={}",
            dict.len(),
            cls.is_some()
        );

        Ok(Self {
            det: Mutex::new(det),
            rec: Mutex::new(rec),
            cls,
            dict,
            params: DbParams {
                threshold: settings.det_threshold,
                box_threshold: settings.box_threshold,
                unclip_ratio: settings.unclip_ratio,
                ..DbParams::default()
            },
            max_side_len: settings.max_side_len,
        })
    }

    /// Text boxes in input image coordinates
    fn detect(&self, img: &RgbImage) -> Result<Vec<PixelBox>> {
        let (w, h) = img.dimensions();
        let (in_w, in_h) = det_input_size(w, h, self.max_side_len);
        let resized = imageops::resize(img, in_w, in_h, FilterType::Triangle);

        let (dims, prob) = run_model(&self.det, to_tensor(&resized, in_w, DET_MEAN, DET_STD))?;
        let (map_h, map_w) = match dims.as_slice() {
            [.., mh, mw] => (*mh as u32, *mw as u32),
            _ => {
                return Err(AdbOcrError::Ocr(format!(
                    "unexpected detection output shape: {:?}",
                    dims
                )))
            }
        };

        let sx = w as f32 / map_w as f32;
        let sy = h as f32 / map_h as f32;
        let boxes = boxes_from_prob_map(&prob, map_w, map_h, &self.params)
            .into_iter()
            .map(|b| PixelBox {
                x0: (b.x0 * sx).clamp(0.0, w as f32),
                y0: (b.y0 * sy).clamp(0.0, h as f32),
                x1: (b.x1 * sx).clamp(0.0, w as f32),
                y1: (b.y1 * sy).clamp(0.0, h as f32),
                score: b.score,
            })
            .filter(|b| b.width() >= 1.0 && b.height() >= 1.0)
            .collect();

        Ok(boxes)
    }

    /// Rotate lines the classifier thinks are upside down
    fn correct_orientation(&self, cls: &Mutex<Session>, crop: RgbImage) -> Result<RgbImage> {
        let line = resize_line(&crop, REC_HEIGHT, Some(CLS_WIDTH));
        let tensor = to_tensor(&line, CLS_WIDTH, [0.5; 3], [0.5; 3]);
        let (_, probs) = run_model(cls, tensor)?;

        match probs.as_slice() {
            [_, flipped, ..] if *flipped > CLS_THRESHOLD => Ok(imageops::rotate180(&crop)),
            _ => Ok(crop),
        }
    }

    fn read_line(&self, crop: &RgbImage) -> Result<(String, f32)> {
        let line = resize_line(crop, REC_HEIGHT, None);
        let padded = line.width().max(REC_MIN_WIDTH);
        let (dims, probs) = run_model(&self.rec, to_tensor(&line, padded, [0.5; 3], [0.5; 3]))?;

        let (steps, classes) = match dims.as_slice() {
            [_, s, c] => (*s, *c),
            [s, c] => (*s, *c),
            _ => {
                return Err(AdbOcrError::Ocr(format!(
                    "unexpected recognition output shape: {:?}",
                    dims
                )))
            }
        };

        Ok(greedy_decode(&probs, steps, classes, &self.dict))
    }
}

impl OcrEngine for PaddleOcrEngine {
    fn recognize(&self, image: &GrayImage, use_angle_cls: bool) -> Result<Vec<TextDetection>> {
        let rgb = DynamicImage::ImageLuma8(image.clone()).to_rgb8();
        let boxes = self.detect(&rgb)?;
        debug!("Detected {} text regions", boxes.len());

        let mut detections = Vec::with_capacity(boxes.len());
        for b in boxes {
            let mut crop = imageops::crop_imm(
                &rgb,
                b.x0 as u32,
                b.y0 as u32,
                b.width().ceil() as u32,
                b.height().ceil() as u32,
            )
            .to_image();

            // tall crops are vertical text
            if crop.height() as f32 >= crop.width() as f32 * 1.5 {
                crop = imageops::rotate270(&crop);
            }

            if use_angle_cls {
                if let Some(cls) = &self.cls {
                    crop = self.correct_orientation(cls, crop)?;
                }
            }

            let (text, confidence) = self.read_line(&crop)?;
            if text.is_empty() {
                continue;
            }

            debug!("OCR line: '{}' (confidence: {:.2})", text, confidence);
            detections.push(TextDetection {
                quad: [(b.x0, b.y0), (b.x1, b.y0), (b.x1, b.y1), (b.x0, b.y1)],
                text,
                confidence,
            });
        }

        Ok(detections)
    }
}

/// Loads `PaddleOcrEngine`s from `{model_dir}/{language}/`
#[derive(Debug, Clone)]
pub struct PaddleOcrLoader {
    model_dir: PathBuf,
}

impl PaddleOcrLoader {
    /// Loader over the configured model directory
    pub fn new() -> Self {
        Self {
            model_dir: SETTINGS.ocr.model_dir.clone(),
        }
    }

    pub fn with_model_dir(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    /// Directory the models for `language` are read from
    pub fn language_dir(&self, language: &str) -> Result<PathBuf> {
        let subdir = model_subdir(language)
            .ok_or_else(|| AdbOcrError::UnsupportedLanguage(language.to_string()))?;
        Ok(self.model_dir.join(subdir))
    }
}

impl Default for PaddleOcrLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrEngineLoader for PaddleOcrLoader {
    async fn load(&self, language: &str) -> Result<Arc<dyn OcrEngine>> {
        let dir = self.language_dir(language)?;
        let engine = tokio::task::spawn_blocking(move || PaddleOcrEngine::from_dir(&dir, &SETTINGS.ocr))
            .await
            .map_err(AdbOcrError::ocr)??;
        Ok(Arc::new(engine))
    }
}
