//! Differentiable-binarization post-processing: probability map to boxes

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::BTreeMap;

/// Thresholds applied to a detection probability map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbParams {
    pub threshold: f32,
    pub box_threshold: f32,
    pub unclip_ratio: f32,
    pub min_size: f32,
}

impl Default for DbParams {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            box_threshold: 0.6,
            unclip_ratio: 1.5,
            min_size: 3.0,
        }
    }
}

/// Axis-aligned box in probability-map pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub score: f32,
}

impl PixelBox {
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

#[derive(Debug, Clone, Copy)]
struct Extent {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

/// Mean probability inside the inclusive rectangle
fn box_score(prob: &[f32], width: u32, e: &Extent) -> f32 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for y in e.min_y..=e.max_y {
        let row = (y * width) as usize;
        for x in e.min_x..=e.max_x {
            sum += prob[row + x as usize];
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

/// Extract text boxes from a `height x width` probability map.
///
/// Boxes come back ordered top-to-bottom, then left-to-right for boxes on
/// roughly the same line.
pub fn boxes_from_prob_map(prob: &[f32], width: u32, height: u32, params: &DbParams) -> Vec<PixelBox> {
    if prob.len() < (width * height) as usize {
        return Vec::new();
    }

    let bitmap = GrayImage::from_fn(width, height, |x, y| {
        if prob[(y * width + x) as usize] > params.threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    });

    let labels = connected_components(&bitmap, Connectivity::Four, Luma([0u8]));

    let mut extents: BTreeMap<u32, Extent> = BTreeMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        extents
            .entry(label)
            .and_modify(|e| {
                e.min_x = e.min_x.min(x);
                e.min_y = e.min_y.min(y);
                e.max_x = e.max_x.max(x);
                e.max_y = e.max_y.max(y);
            })
            .or_insert(Extent {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            });
    }

    let mut boxes: Vec<PixelBox> = extents
        .values()
        .filter_map(|e| {
            let w = (e.max_x - e.min_x + 1) as f32;
            let h = (e.max_y - e.min_y + 1) as f32;
            if w.min(h) < params.min_size {
                return None;
            }

            let score = box_score(prob, width, e);
            if score < params.box_threshold {
                return None;
            }

            let distance = w * h * params.unclip_ratio / (2.0 * (w + h));
            let expanded = PixelBox {
                x0: (e.min_x as f32 - distance).max(0.0),
                y0: (e.min_y as f32 - distance).max(0.0),
                x1: (e.max_x as f32 + 1.0 + distance).min(width as f32),
                y1: (e.max_y as f32 + 1.0 + distance).min(height as f32),
                score,
            };
            if expanded.width().min(expanded.height()) < params.min_size + 2.0 {
                return None;
            }
            Some(expanded)
        })
        .collect();

    sort_reading_order(&mut boxes);
    boxes
}

fn sort_reading_order(boxes: &mut [PixelBox]) {
    boxes.sort_by(|a, b| {
        a.y0.partial_cmp(&b.y0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x0.partial_cmp(&b.x0).unwrap_or(std::cmp::Ordering::Equal))
    });

    // boxes within 10px vertically count as one line
    for i in 0..boxes.len().saturating_sub(1) {
        for j in (0..=i).rev() {
            let (a, b) = (boxes[j], boxes[j + 1]);
            if (b.y0 - a.y0).abs() < 10.0 && b.x0 < a.x0 {
                boxes.swap(j, j + 1);
            } else {
                break;
            }
        }
    }
}
