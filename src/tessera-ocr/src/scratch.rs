//! Temporary file pair for a single invocation
//!
//! Each invocation gets its own randomly named directory, so concurrent
//! invocations never share paths. Both files are removed when the
//! `ScratchFiles` value drops, whichever way the invocation ended.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::Result;

const SCRATCH_PREFIX: &str = "tess_";
const INPUT_NAME: &str = "input.bmp";
const OUTPUT_BASE_NAME: &str = "output";

pub(crate) struct ScratchFiles {
    input: PathBuf,
    output_base: PathBuf,
    output: PathBuf,
    // dropped last, after the files inside it are gone
    dir: TempDir,
}

impl ScratchFiles {
    /// Reserve a fresh scratch directory under `root`, or the system temp dir
    pub(crate) fn new(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        let input = dir.path().join(INPUT_NAME);
        let output_base = dir.path().join(OUTPUT_BASE_NAME);
        let output = output_base.with_extension("txt");

        debug!("scratch files in {:?}", dir.path());
        Ok(Self {
            input,
            output_base,
            output,
            dir,
        })
    }

    /// Where the image is written for the engine
    pub(crate) fn input(&self) -> &Path {
        &self.input
    }

    /// Base name handed to the engine; it appends `.txt` itself
    pub(crate) fn output_base(&self) -> &Path {
        &self.output_base
    }

    /// The text file the engine produces
    pub(crate) fn output(&self) -> &Path {
        &self.output
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in [&self.input, &self.output] {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("failed to remove scratch file {:?}: {}", path, e);
                }
            }
        }
    }
}
