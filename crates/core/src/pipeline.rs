use crate::config::{normalize_extension, AppConfig};
use crate::error::{RenameError, SkipReason};
use crate::matcher::SidecarIndex;
use crate::materialize::{materialize, Materialized};
use crate::metadata::{extract_metadata, CanonicalName};
use crate::resolver::resolve_target;
use crate::scanner::scan_sources;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub config: AppConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub discovered: usize,
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub sidecars: usize,
    pub elapsed: Duration,
}

/// Per-file progress over a total known up front.
pub trait Progress {
    fn begin(&mut self, _total: u64) {}
    fn advance(&mut self, _path: &Path) {}
    fn finish(&mut self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {}

#[derive(Debug)]
pub enum FileOutcome {
    Copied(Materialized),
    Skipped(SkipReason),
    Failed(RenameError),
}

pub fn run(options: &RunOptions, progress: &mut dyn Progress) -> Result<RunReport> {
    let started = Instant::now();
    options.config.validate()?;

    if !options.source_dir.exists() {
        return Err(RenameError::SourceDirectoryNotFound(options.source_dir.clone()).into());
    }
    if !options.source_dir.is_dir() {
        return Err(RenameError::SourceNotDirectory(options.source_dir.clone()).into());
    }
    fs::create_dir_all(&options.target_dir).map_err(|source| RenameError::TargetDirectory {
        path: options.target_dir.clone(),
        source,
    })?;
    let target_dir = fs::canonicalize(&options.target_dir).with_context(|| {
        format!(
            "could not resolve target directory: {}",
            options.target_dir.display()
        )
    })?;

    let sources: Vec<PathBuf> = scan_sources(
        &options.source_dir,
        &options.config.primary_extension,
        Some(target_dir.as_path()),
    )?
    .collect();

    info!(
        "found {} .{} files under {}",
        sources.len(),
        normalize_extension(&options.config.primary_extension),
        options.source_dir.display()
    );

    let mut report = RunReport {
        discovered: sources.len(),
        ..RunReport::default()
    };
    progress.begin(sources.len() as u64);

    let mut sidecar_index = SidecarIndex::new();
    for source in &sources {
        match process_file(source, &target_dir, &options.config, &mut sidecar_index) {
            FileOutcome::Copied(done) => {
                report.copied += 1;
                report.sidecars += done.sidecars.len();
            }
            FileOutcome::Skipped(reason) => {
                warn!("skipped {}: {reason}", source.display());
                report.skipped += 1;
            }
            FileOutcome::Failed(err) => {
                error!("failed {}: {:#}", source.display(), anyhow::Error::from(err));
                report.failed += 1;
            }
        }
        progress.advance(source);
    }

    progress.finish();
    report.elapsed = started.elapsed();
    Ok(report)
}

/// Runs one source file through extract → resolve → materialize.
pub fn process_file(
    source: &Path,
    target_dir: &Path,
    config: &AppConfig,
    sidecar_index: &mut SidecarIndex,
) -> FileOutcome {
    let canonical = match extract_metadata(source, &config.metadata)
        .and_then(|record| CanonicalName::from_record(&record))
    {
        Ok(name) => name,
        Err(reason) => return FileOutcome::Skipped(reason),
    };

    let extension = source
        .extension()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default();
    let sidecars = sidecar_index.find(source, &config.sidecars);
    let sidecar_extensions: Vec<String> = sidecars.iter().map(|s| s.extension()).collect();
    let sidecar_extensions: Vec<&str> = sidecar_extensions.iter().map(String::as_str).collect();

    let target = resolve_target(target_dir, &canonical, &extension, &sidecar_extensions);
    match materialize(source, &target, &sidecars) {
        Ok(done) => FileOutcome::Copied(done),
        Err(err) => FileOutcome::Failed(err),
    }
}

#[cfg(test)]
mod tests {
    use super::{run, NoProgress, Progress, RunOptions};
    use crate::config::AppConfig;
    use crate::error::RenameError;
    use crate::packet::fixtures::{tiff_with_xmp, xmp_packet};
    use std::fs;
    use std::io::{self, Write};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    const DATE: &str = "2021-03-04T10:20:30.500000";
    const TOOL: &str = "NIKON D850 Ver.01.00";
    const CANONICAL: &str = "NIKON_D850.2021-03-04.10-20-30";

    fn write_nef(path: &Path, date: Option<&str>, tool: Option<&str>) -> Vec<u8> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dirs");
        }
        let bytes = tiff_with_xmp(&xmp_packet(date, tool));
        fs::write(path, &bytes).expect("write nef");
        bytes
    }

    fn options(source_dir: &Path, target_dir: &Path) -> RunOptions {
        RunOptions {
            source_dir: source_dir.to_path_buf(),
            target_dir: target_dir.to_path_buf(),
            config: AppConfig::default(),
        }
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read dir")
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("log buffer")).to_string()
        }
    }

    fn run_capturing_logs(options: &RunOptions) -> (super::RunReport, String) {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let report = tracing::subscriber::with_default(subscriber, || {
            run(options, &mut NoProgress).expect("run")
        });
        (report, logs.contents())
    }

    #[derive(Default)]
    struct Recorder {
        total: u64,
        seen: Vec<PathBuf>,
        finished: bool,
    }

    impl Progress for Recorder {
        fn begin(&mut self, total: u64) {
            self.total = total;
        }
        fn advance(&mut self, path: &Path) {
            self.seen.push(path.to_path_buf());
        }
        fn finish(&mut self) {
            self.finished = true;
        }
    }

    #[test]
    fn renames_by_device_and_capture_time() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        let bytes = write_nef(&src.join("A.nef"), Some(DATE), Some(TOOL));

        let report = run(&options(&src, &out), &mut NoProgress).expect("run");

        assert_eq!(report.copied, 1);
        assert_eq!(listing(&out), vec![format!("{CANONICAL}.nef")]);
        assert_eq!(
            fs::read(out.join(format!("{CANONICAL}.nef"))).expect("read copy"),
            bytes
        );
        assert!(src.join("A.nef").exists(), "source is never moved");
    }

    #[test]
    fn existing_target_gets_disambiguated() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        write_nef(&src.join("A.nef"), Some(DATE), Some(TOOL));
        fs::create_dir_all(&out).expect("out");
        fs::write(out.join(format!("{CANONICAL}.nef")), b"earlier").expect("seed");

        run(&options(&src, &out), &mut NoProgress).expect("run");

        assert_eq!(
            listing(&out),
            vec![format!("{CANONICAL}.nef"), format!("{CANONICAL}_1.nef")]
        );
        assert_eq!(
            fs::read(out.join(format!("{CANONICAL}.nef"))).expect("read seed"),
            b"earlier"
        );
    }

    #[test]
    fn same_capture_in_one_run_is_disambiguated() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        write_nef(&src.join("A.nef"), Some(DATE), Some(TOOL));
        write_nef(&src.join("burst/A.nef"), Some(DATE), Some(TOOL));
        write_nef(&src.join("burst/B.nef"), Some(DATE), Some(TOOL));

        let report = run(&options(&src, &out), &mut NoProgress).expect("run");

        assert_eq!(report.copied, 3);
        assert_eq!(
            listing(&out),
            vec![
                format!("{CANONICAL}.nef"),
                format!("{CANONICAL}_1.nef"),
                format!("{CANONICAL}_2.nef"),
            ]
        );
    }

    #[test]
    fn files_without_metadata_are_skipped_and_run_continues() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        fs::create_dir_all(&src).expect("src");
        fs::write(src.join("B.nef"), b"no xmp here").expect("write B");
        write_nef(&src.join("C.nef"), Some(DATE), Some(TOOL));
        write_nef(&src.join("D.nef"), Some("not a date"), Some(TOOL));
        write_nef(&src.join("E.nef"), Some(DATE), None);
        write_nef(&src.join("F.nef"), None, Some(TOOL));

        let mut progress = Recorder::default();
        let report = run(&options(&src, &out), &mut progress).expect("run");

        assert_eq!(report.discovered, 5);
        assert_eq!(report.copied, 1);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.failed, 0);
        assert_eq!(listing(&out), vec![format!("{CANONICAL}.nef")]);

        assert_eq!(progress.total, 5);
        assert_eq!(progress.seen.len(), 5);
        assert!(progress.finished);
    }

    #[test]
    fn sidecars_follow_the_primary() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        write_nef(&src.join("C.nef"), Some(DATE), Some(TOOL));
        fs::write(src.join("C.xmp"), b"<edits/>").expect("write xmp");
        fs::write(src.join("C.acr"), b"acr").expect("write acr");
        fs::write(src.join("Z.xmp"), b"<orphan/>").expect("write orphan");

        let report = run(&options(&src, &out), &mut NoProgress).expect("run");

        assert_eq!(report.sidecars, 2);
        assert_eq!(
            listing(&out),
            vec![
                format!("{CANONICAL}.acr"),
                format!("{CANONICAL}.nef"),
                format!("{CANONICAL}.xmp"),
            ]
        );
        assert_eq!(
            fs::read(out.join(format!("{CANONICAL}.xmp"))).expect("read xmp"),
            b"<edits/>"
        );
    }

    #[test]
    fn target_inside_source_is_not_rescanned() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = src.join("renamed");
        write_nef(&src.join("A.nef"), Some(DATE), Some(TOOL));

        run(&options(&src, &out), &mut NoProgress).expect("first run");
        let report = run(&options(&src, &out), &mut NoProgress).expect("second run");

        assert_eq!(report.discovered, 1);
        assert_eq!(
            listing(&out),
            vec![format!("{CANONICAL}.nef"), format!("{CANONICAL}_1.nef")]
        );
    }

    #[test]
    fn missing_source_directory_aborts_before_processing() {
        let temp = tempdir().expect("tempdir");
        let out = temp.path().join("out");

        let err = run(&options(&temp.path().join("missing"), &out), &mut NoProgress)
            .expect_err("missing source");
        assert!(matches!(
            err.downcast_ref::<RenameError>(),
            Some(RenameError::SourceDirectoryNotFound(_))
        ));
        assert!(!out.exists());
    }

    #[test]
    fn skip_warning_names_the_file() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        fs::create_dir_all(&src).expect("src");
        fs::write(src.join("B.nef"), b"no xmp here").expect("write B");

        let (report, logs) = run_capturing_logs(&options(&src, &out));

        assert_eq!(report.skipped, 1);
        let line = logs
            .lines()
            .find(|line| line.contains("WARN"))
            .expect("a warning is logged");
        assert!(line.contains("B.nef"), "warning was: {line}");
        assert!(line.contains("no embedded XMP metadata"), "warning was: {line}");
    }

    #[cfg(unix)]
    #[test]
    fn failed_primary_copy_is_counted_and_run_continues() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        write_nef(&src.join("A.nef"), Some(DATE), Some(TOOL));
        write_nef(&src.join("B.nef"), Some("2021-03-04T11:00:00"), Some(TOOL));
        fs::create_dir_all(&out).expect("out");
        // dangling link: the name looks free but the copy cannot be created
        std::os::unix::fs::symlink(
            temp.path().join("gone/A.nef"),
            out.join(format!("{CANONICAL}.nef")),
        )
        .expect("symlink");

        let (report, logs) = run_capturing_logs(&options(&src, &out));

        assert_eq!(report.discovered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.copied, 1);
        assert!(out.join("NIKON_D850.2021-03-04.11-00-00.nef").is_file());
        assert!(!temp.path().join("gone").exists());
        assert!(logs.contains("ERROR") && logs.contains("A.nef"), "logs were: {logs}");
    }

    #[test]
    fn file_as_source_aborts_without_creating_target() {
        let temp = tempdir().expect("tempdir");
        let file = temp.path().join("A.nef");
        write_nef(&file, Some(DATE), Some(TOOL));
        let out = temp.path().join("out");

        let err = run(&options(&file, &out), &mut NoProgress).expect_err("file source");
        assert!(matches!(
            err.downcast_ref::<RenameError>(),
            Some(RenameError::SourceNotDirectory(_))
        ));
        assert!(!out.exists());
    }

    #[test]
    fn device_name_that_sanitizes_to_nothing_is_skipped() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        write_nef(&src.join("A.nef"), Some(DATE), Some("... Ver.1"));

        let report = run(&options(&src, &out), &mut NoProgress).expect("run");

        assert_eq!(report.copied, 0);
        assert_eq!(report.skipped, 1);
        assert!(listing(&out).is_empty());
    }

    #[test]
    fn sidecar_of_other_stem_casing_is_not_taken() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        write_nef(&src.join("a.nef"), Some(DATE), Some(TOOL));
        fs::write(src.join("A.xmp"), b"<edits/>").expect("write xmp");

        let report = run(&options(&src, &out), &mut NoProgress).expect("run");

        assert_eq!(report.sidecars, 0);
        assert_eq!(listing(&out), vec![format!("{CANONICAL}.nef")]);
    }
}
