//! tessera - print the text Tesseract finds in an image

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use tessera_ocr::{check_engine, EngineConfig, Recognizer};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Recognize the text in an image with the Tesseract OCR engine")]
#[command(version)]
struct Cli {
    /// Image file to recognize
    #[arg(required_unless_present = "check")]
    image: Option<PathBuf>,

    /// Recognition language passed to the engine (e.g. "fra")
    #[arg(short, long)]
    lang: Option<String>,

    /// OCR engine binary (default: tesseract from PATH)
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Kill the engine if it runs longer than this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Check that the OCR engine can be launched, then exit
    #[arg(long)]
    check: bool,
}

/// Parse arguments; usage errors exit with status 1
fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                err.exit();
            }
            let _ = err.print();
            std::process::exit(1);
        }
    }
}

fn main() -> Result<()> {
    let cli = parse_args();

    // stdout carries the recognized text, so logs go to stderr
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let mut engine = config.engine_config();
    if let Some(program) = cli.engine {
        engine = engine.with_program(program);
    }
    if let Some(secs) = cli.timeout {
        engine = engine.with_timeout(Duration::from_secs(secs));
    }
    debug!("engine config: {:?}", engine);

    if cli.check {
        return cmd_check(&engine);
    }

    let image = cli.image.context("no image given")?;
    let language = cli.lang.or(config.language);
    cmd_recognize(engine, &image, language.as_deref())
}

fn cmd_check(engine: &EngineConfig) -> Result<()> {
    if !check_engine(engine) {
        anyhow::bail!(
            "OCR engine {} could not be launched; install Tesseract or pass --engine",
            engine.program.display()
        );
    }

    println!("{}: OK", engine.program.display());
    Ok(())
}

fn cmd_recognize(engine: EngineConfig, path: &Path, language: Option<&str>) -> Result<()> {
    let image = image::open(path)
        .with_context(|| format!("Failed to open image {}", path.display()))?;
    debug!(
        "loaded {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );

    let text = Recognizer::with_config(engine)
        .recognize(&image, language)
        .with_context(|| format!("Failed to recognize text in {}", path.display()))?;

    println!("{text}");
    Ok(())
}
