//! Tesseract OCR through its command-line interface
//!
//! This crate runs the `tesseract` binary on in-memory images. Each call writes
//! the image to a scratch BMP, runs the engine once, reads back the text file it
//! produces and removes the scratch files again. Bounding boxes and confidence
//! scores are not extracted.

mod engine;
mod error;
mod processor;
mod scratch;

#[cfg(all(test, unix))]
mod test_support;

pub use engine::{check_engine, EngineConfig};
pub use error::{OcrError, Result};
pub use processor::{PersistImage, Recognizer};

use std::path::PathBuf;

use image::DynamicImage;

/// Recognizer using `tesseract` from `PATH`
pub fn create_recognizer() -> Recognizer {
    Recognizer::new()
}

/// Recognizer using a specific engine binary
pub fn create_recognizer_with_engine(program: impl Into<PathBuf>) -> Recognizer {
    Recognizer::with_config(EngineConfig::new(program))
}

/// One-shot recognition with the default engine
pub fn image_to_string(image: &DynamicImage, language: Option<&str>) -> Result<String> {
    create_recognizer().recognize(image, language)
}
