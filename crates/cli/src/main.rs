use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use raw_renamer_core::{app_paths, load_config_from, run, AppConfig, Progress, RunOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "raw-renamer", version)]
#[command(
    about = "Copies raw photos (and their .xmp/.acr sidecars) into a folder, renamed to <camera>.<YYYY-MM-DD.HH-MM-SS>"
)]
struct Cli {
    /// Folder holding the raw files (searched recursively)
    source_dir: PathBuf,
    /// Folder receiving the renamed copies
    target_dir: PathBuf,
}

/// Drives one bar that stays hidden until the run knows its file count.
struct BarProgress {
    bar: ProgressBar,
}

impl Progress for BarProgress {
    fn begin(&mut self, total: u64) {
        self.bar.set_length(total);
        if let Ok(style) = ProgressStyle::with_template(
            "Processing files {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}<{eta_precise}]",
        ) {
            self.bar.set_style(style.progress_chars("##-"));
        }
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
    }

    fn advance(&mut self, _path: &Path) {
        self.bar.inc(1);
    }

    fn finish(&mut self) {
        self.bar.finish();
    }
}

/// Log sink that clears the bar while a line is written, then redraws it.
#[derive(Clone)]
struct BarWriter {
    bar: ProgressBar,
}

impl Write for BarWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bar.suspend(|| io::stdout().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

fn main() -> Result<()> {
    let bar = ProgressBar::hidden();
    let log_writer = BarWriter { bar: bar.clone() };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(move || log_writer.clone())
                .with_target(false)
                .without_time(),
        )
        .init();

    let cli = Cli::parse();
    let options = RunOptions {
        source_dir: cli.source_dir,
        target_dir: cli.target_dir,
        config: resolve_config()?,
    };

    let mut progress = BarProgress { bar };
    let report = run(&options, &mut progress)?;

    println!(
        "Copied {} files ({} sidecars), skipped {}, failed {}",
        report.copied, report.sidecars, report.skipped, report.failed
    );
    println!("Total elapsed: {:.2} s", report.elapsed.as_secs_f64());
    Ok(())
}

fn resolve_config() -> Result<AppConfig> {
    match app_paths() {
        Ok(paths) => {
            debug!("config file: {}", paths.config_path.display());
            load_config_from(&paths.config_path)
        }
        Err(err) => {
            warn!("using default settings: {err:#}");
            Ok(AppConfig::default())
        }
    }
}
