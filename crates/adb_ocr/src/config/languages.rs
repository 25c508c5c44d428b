//! OCR language codes and the model directory each one loads from

use phf::phf_map;

/// PaddleOCR language code -> model subdirectory under the model root
pub static OCR_LANGUAGES: phf::Map<&'static str, &'static str> = phf_map! {
    "ch" => "ch",
    "en" => "en",
    "chinese_cht" => "chinese_cht",
    "japan" => "japan",
    "korean" => "korean",
    "latin" => "latin",
    "arabic" => "arabic",
    "cyrillic" => "cyrillic",
    "devanagari" => "devanagari",
    "ta" => "tamil",
    "te" => "telugu",
    "ka" => "kannada",
    // common aliases
    "zh" => "ch",
    "cn" => "ch",
    "jp" => "japan",
    "ko" => "korean",
};

/// Resolve a language code to its model subdirectory
pub fn model_subdir(language: &str) -> Option<&'static str> {
    OCR_LANGUAGES.get(language.to_lowercase().as_str()).copied()
}

/// List every accepted language code
pub fn list_supported_languages() -> Vec<&'static str> {
    OCR_LANGUAGES.keys().copied().collect()
}
