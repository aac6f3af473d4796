use std::fs;
use std::path::Path;

use image::{ColorType, DynamicImage, ImageFormat};
use tracing::debug;

use crate::engine::{self, EngineConfig};
use crate::error::{OcrError, Result};
use crate::scratch::ScratchFiles;

/// An image that can write itself to disk in a format the engine reads
pub trait PersistImage {
    fn persist(&self, path: &Path) -> Result<()>;
}

impl PersistImage for DynamicImage {
    fn persist(&self, path: &Path) -> Result<()> {
        // The BMP encoder only takes 8-bit gray/rgb layouts
        match self.color() {
            ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => {
                self.save_with_format(path, ImageFormat::Bmp)?
            }
            _ => DynamicImage::ImageRgba8(self.to_rgba8())
                .save_with_format(path, ImageFormat::Bmp)?,
        }
        Ok(())
    }
}

impl<T: PersistImage + ?Sized> PersistImage for &T {
    fn persist(&self, path: &Path) -> Result<()> {
        (**self).persist(path)
    }
}

/// Runs the OCR engine on images, one subprocess per call
#[derive(Debug, Clone, Default)]
pub struct Recognizer {
    config: EngineConfig,
}

impl Recognizer {
    /// Recognizer for `tesseract` on `PATH`
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Recognize the text in `image`
    ///
    /// The image is written to a scratch BMP, the engine is run on it and its
    /// text output is read back with surrounding whitespace trimmed. The
    /// scratch files are gone by the time this returns, on success or error.
    pub fn recognize<I>(&self, image: &I, language: Option<&str>) -> Result<String>
    where
        I: PersistImage + ?Sized,
    {
        let scratch = ScratchFiles::new(self.config.temp_dir.as_deref())?;

        image.persist(scratch.input())?;
        debug!("persisted image to {:?}", scratch.input());

        let output = engine::run(&self.config, scratch.input(), scratch.output_base(), language)?;
        if !output.success() {
            return Err(OcrError::Engine {
                status: output.status,
                message: engine::error_lines(&output.stderr),
            });
        }

        let text = fs::read_to_string(scratch.output())?;
        debug!("recognized {} bytes of text", text.len());
        Ok(text.trim().to_string())
    }

    /// Recognize several images in sequence
    pub fn recognize_all<I>(&self, images: &[I], language: Option<&str>) -> Vec<Result<String>>
    where
        I: PersistImage,
    {
        images
            .iter()
            .map(|image| self.recognize(image, language))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// Image handle whose encoder always fails
    struct Unwritable;

    impl PersistImage for Unwritable {
        fn persist(&self, path: &Path) -> Result<()> {
            // leave a half-written file behind, the way a failed encoder would
            fs::write(path, b"BM")?;
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "disk is read-only").into())
        }
    }

    #[test]
    fn test_persist_dynamic_image_as_bmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.bmp");

        DynamicImage::new_rgb8(8, 4).persist(&path).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], b"BM");

        let wide = dir.path().join("wide.bmp");
        DynamicImage::new_rgb16(2, 2).persist(&wide).unwrap();
        assert_eq!(&fs::read(&wide).unwrap()[..2], b"BM");
    }

    #[test]
    fn test_persist_failure_is_io_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let recognizer = Recognizer::with_config(
            EngineConfig::new("/nonexistent/tessera-test-engine").with_temp_dir(root.path()),
        );

        let err = recognizer.recognize(&Unwritable, None).unwrap_err();
        match err {
            OcrError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_engine_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let recognizer = Recognizer::with_config(
            EngineConfig::new("/nonexistent/tessera-test-engine").with_temp_dir(root.path()),
        );

        let err = recognizer
            .recognize(&DynamicImage::new_luma8(4, 4), None)
            .unwrap_err();
        assert!(matches!(err, OcrError::Spawn { .. }));
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    mod with_engine {
        use super::super::*;
        use crate::test_support::fake_engine;
        use std::collections::HashSet;
        use std::path::PathBuf;
        use std::sync::Mutex;
        use std::time::{Duration, Instant};

        struct Fixture {
            root: tempfile::TempDir,
            _bin: tempfile::TempDir,
            recognizer: Recognizer,
        }

        impl Fixture {
            fn new(script: &str) -> Self {
                let bin = tempfile::tempdir().unwrap();
                let root = tempfile::tempdir().unwrap();
                let program = fake_engine(bin.path(), script);
                let recognizer = Recognizer::with_config(
                    EngineConfig::new(program).with_temp_dir(root.path()),
                );
                Self {
                    root,
                    _bin: bin,
                    recognizer,
                }
            }

            fn recognize(&self, language: Option<&str>) -> Result<String> {
                let result = self
                    .recognizer
                    .recognize(&DynamicImage::new_rgb8(16, 16), language);
                self.assert_clean();
                result
            }

            fn assert_clean(&self) {
                let leftovers: Vec<PathBuf> = fs::read_dir(self.root.path())
                    .unwrap()
                    .map(|e| e.unwrap().path())
                    .collect();
                assert!(leftovers.is_empty(), "scratch files leaked: {leftovers:?}");
            }
        }

        #[test]
        fn test_trims_output() {
            let fixture = Fixture::new(r#"printf '  Hello World \n' > "$2.txt""#);
            assert_eq!(fixture.recognize(None).unwrap(), "Hello World");
        }

        #[test]
        fn test_engine_failure_keeps_error_lines() {
            let fixture = Fixture::new(
                "printf 'Error: invalid image\\nWarning: low DPI\\n' >&2\nexit 1",
            );

            match fixture.recognize(None).unwrap_err() {
                OcrError::Engine { status, message } => {
                    assert_eq!(status, 1);
                    assert_eq!(message, "Error: invalid image");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[test]
        fn test_failure_ignores_partial_output() {
            let fixture = Fixture::new(
                "printf 'partial' > \"$2.txt\"\necho 'Error: out of memory' >&2\nexit 2",
            );
            let err = fixture.recognize(None).unwrap_err();
            assert_eq!(err.status(), Some(2));
        }

        #[test]
        fn test_missing_output_file_is_io_error() {
            let fixture = Fixture::new("exit 0");
            match fixture.recognize(None).unwrap_err() {
                OcrError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[test]
        fn test_language_flag() {
            let fixture = Fixture::new(r#"printf '%s' "$*" > "$2.txt""#);

            let plain = fixture.recognize(None).unwrap();
            assert_eq!(plain.split(' ').count(), 2);
            assert!(!plain.contains("-l"));

            let french = fixture.recognize(Some("fra")).unwrap();
            assert!(french.ends_with(" -l fra"), "args were: {french}");
        }

        #[test]
        fn test_engine_receives_bmp() {
            let fixture = Fixture::new(r#"head -c 2 "$1" > "$2.txt""#);
            assert_eq!(fixture.recognize(None).unwrap(), "BM");
        }

        #[test]
        fn test_timeout_cleans_up() {
            let bin = tempfile::tempdir().unwrap();
            let root = tempfile::tempdir().unwrap();
            let program = fake_engine(bin.path(), "exec sleep 10");
            let recognizer = Recognizer::with_config(
                EngineConfig::new(program)
                    .with_temp_dir(root.path())
                    .with_timeout(Duration::from_millis(200)),
            );

            let err = recognizer
                .recognize(&DynamicImage::new_rgb8(4, 4), None)
                .unwrap_err();
            assert!(matches!(err, OcrError::Timeout(_)));
            assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
        }

        #[test]
        fn test_background_child_does_not_hold_call_past_timeout() {
            let bin = tempfile::tempdir().unwrap();
            let root = tempfile::tempdir().unwrap();
            let program = fake_engine(bin.path(), "printf hi > \"$2.txt\"\nsleep 3 &\nexit 0");
            let recognizer = Recognizer::with_config(
                EngineConfig::new(program)
                    .with_temp_dir(root.path())
                    .with_timeout(Duration::from_millis(200)),
            );

            let started = Instant::now();
            let text = recognizer
                .recognize(&DynamicImage::new_rgb8(4, 4), None)
                .unwrap();
            assert_eq!(text, "hi");
            assert!(started.elapsed() < Duration::from_secs(2));
            assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
        }

        #[test]
        fn test_concurrent_calls_use_distinct_paths() {
            let fixture = Fixture::new(r#"printf '%s %s' "$1" "$2" > "$2.txt""#);
            let seen = Mutex::new(Vec::new());

            std::thread::scope(|s| {
                for _ in 0..8 {
                    s.spawn(|| {
                        let image = DynamicImage::new_rgb8(8, 8);
                        let text = fixture.recognizer.recognize(&image, None).unwrap();
                        seen.lock().unwrap().push(text);
                    });
                }
            });

            let seen = seen.into_inner().unwrap();
            let inputs: HashSet<&str> = seen
                .iter()
                .map(|t| t.split(' ').next().unwrap())
                .collect();
            let outputs: HashSet<&str> = seen
                .iter()
                .map(|t| t.split(' ').nth(1).unwrap())
                .collect();
            assert_eq!(inputs.len(), 8);
            assert_eq!(outputs.len(), 8);
            fixture.assert_clean();
        }

        #[test]
        fn test_recognize_all() {
            let fixture = Fixture::new(r#"printf 'page' > "$2.txt""#);
            let pages = vec![DynamicImage::new_rgb8(4, 4), DynamicImage::new_luma8(4, 4)];

            let results = fixture.recognizer.recognize_all(&pages, Some("eng"));
            assert_eq!(results.len(), 2);
            assert!(results.iter().all(|r| r.as_deref().ok() == Some("page")));
            fixture.assert_clean();
        }
    }
}
