use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    /// The engine ran but exited with a non-zero status.
    ///
    /// `message` holds only the stderr lines that mention `Error`.
    #[error("OCR engine exited with status {status}{}", detail(.message))]
    Engine { status: i32, message: String },

    #[error("failed to launch OCR engine {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("OCR engine did not finish within {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl OcrError {
    /// Exit status reported by the engine, if it ran to completion.
    pub fn status(&self) -> Option<i32> {
        match self {
            OcrError::Engine { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<image::ImageError> for OcrError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => OcrError::Io(io),
            other => OcrError::Io(io::Error::new(io::ErrorKind::InvalidData, other)),
        }
    }
}

fn detail(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {message}")
    }
}

pub type Result<T> = std::result::Result<T, OcrError>;
