//! Character dictionary and greedy CTC decoding for recognition output

use std::path::Path;

use crate::error::{AdbOcrError, Result};

/// Recognition classes: index 0 is the CTC blank, then one entry per
/// dictionary line, then a trailing space
#[derive(Debug, Clone)]
pub struct CharDictionary {
    chars: Vec<String>,
}

impl CharDictionary {
    pub fn from_text(content: &str) -> Self {
        let mut chars = vec![String::new()];
        chars.extend(
            content
                .lines()
                .map(|l| l.trim_end_matches('\r'))
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
        chars.push(" ".to_string());
        Self { chars }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AdbOcrError::ModelNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_text(&content))
    }

    /// Number of classes including the blank
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.len() <= 2
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.chars.get(index).map(String::as_str)
    }
}

/// Greedy CTC decode of a `[steps, classes]` probability matrix.
///
/// Repeats collapse and blanks drop; the confidence is the mean probability
/// of the kept steps (0 when nothing is kept).
pub fn greedy_decode(
    probs: &[f32],
    steps: usize,
    classes: usize,
    dict: &CharDictionary,
) -> (String, f32) {
    let mut text = String::new();
    let mut kept = Vec::new();
    let mut prev: Option<usize> = None;

    for row in probs.chunks_exact(classes).take(steps) {
        let (best, best_prob) = row
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });

        if best != 0 && Some(best) != prev {
            if let Some(ch) = dict.get(best) {
                text.push_str(ch);
                kept.push(best_prob);
            }
        }
        prev = Some(best);
    }

    let confidence = if kept.is_empty() {
        0.0
    } else {
        kept.iter().sum::<f32>() / kept.len() as f32
    };

    (text, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot(classes: usize, index: usize, p: f32) -> Vec<f32> {
        let mut row = vec![(1.0 - p) / (classes - 1) as f32; classes];
        row[index] = p;
        row
    }

    #[test]
    fn test_dictionary_layout() {
        let dict = CharDictionary::from_text("a\r\nb\n\nc\n");
        assert_eq!(dict.len(), 5);
        assert_eq!(dict.get(0), Some(""));
        assert_eq!(dict.get(1), Some("a"));
        assert_eq!(dict.get(3), Some("c"));
        assert_eq!(dict.get(4), Some(" "));
        assert!(!dict.is_empty());
    }

    #[test]
    fn test_greedy_decode_collapses_and_drops_blanks() {
        let dict = CharDictionary::from_text("a\nb\n");
        let classes = dict.len();
        // a a blank a b b
        let rows = [
            one_hot(classes, 1, 0.9),
            one_hot(classes, 1, 0.8),
            one_hot(classes, 0, 0.9),
            one_hot(classes, 1, 0.7),
            one_hot(classes, 2, 1.0),
            one_hot(classes, 2, 0.6),
        ];
        let probs: Vec<f32> = rows.concat();
        let (text, confidence) = greedy_decode(&probs, rows.len(), classes, &dict);
        assert_eq!(text, "aab");
        assert!((confidence - (0.9 + 0.7 + 1.0) / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_greedy_decode_all_blank() {
        let dict = CharDictionary::from_text("a\n");
        let probs = one_hot(dict.len(), 0, 0.99);
        assert_eq!(greedy_decode(&probs, 1, dict.len(), &dict), (String::new(), 0.0));
    }

    #[test]
    fn test_missing_dictionary_file() {
        let err = CharDictionary::load(Path::new("/nonexistent/dict.txt")).unwrap_err();
        assert!(matches!(err, AdbOcrError::ModelNotFound(_)));
    }
}
