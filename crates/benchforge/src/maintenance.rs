//! Destructive operations: removing installed applications and purging
//! temporary files. Each runs behind a fixed countdown during which a user
//! interrupt aborts cleanly; once the window elapses there is no rollback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::common::error::BenchError;
use crate::common::fsutils::walk_to_depth;
use crate::common::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    Elapsed,
    Interrupted,
}

/// Grace period watcher. An interrupt received while waiting aborts the
/// pending operation before anything was touched; once the window has
/// elapsed, the next interrupt terminates the process with the default
/// signal action.
pub struct Countdown {
    interrupted: Arc<AtomicBool>,
}

impl Countdown {
    pub fn new() -> std::io::Result<Countdown> {
        let interrupted = Arc::new(AtomicBool::new(false));
        // Registration order matters: the conditional default runs first, so
        // a signal arriving with the flag already set terminates the process
        // instead of being swallowed.
        signal_hook::flag::register_conditional_default(
            signal_hook::consts::SIGINT,
            Arc::clone(&interrupted),
        )?;
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupted))?;
        Ok(Countdown { interrupted })
    }

    pub fn wait(&self, duration: Duration) -> CountdownOutcome {
        log::info!(
            "Proceeding in {}, interrupt to abort...",
            humantime::format_duration(duration)
        );
        let started = Instant::now();
        while started.elapsed() < duration {
            if self.interrupted.load(Ordering::Relaxed) {
                log::info!("Interrupted, nothing was removed.");
                return CountdownOutcome::Interrupted;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        // Grace period over; arm the conditional default so a later
        // interrupt still kills the process mid-removal
        self.interrupted.store(true, Ordering::Relaxed);
        CountdownOutcome::Elapsed
    }
}

/// Removes an installed application and its modulefiles twin. Returns false
/// when the countdown was interrupted. `app_spec` must be the full relative
/// path of the installation; shorter specs could be ambiguous and are
/// rejected.
pub fn remove_app(settings: &Settings, app_spec: &str) -> crate::Result<bool> {
    let segments: Vec<&str> = app_spec.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < settings.tree_depth {
        return Err(BenchError::ConfigError(format!(
            "application selection '{app_spec}' could be ambiguous; provide the full \
             installation path ({} segments)",
            settings.tree_depth
        )));
    }

    let app_dir = settings.build_path.join(segments.join("/"));
    if !app_dir.is_dir() {
        return Err(BenchError::not_found(
            format!("installed application at '{app_spec}'"),
            walk_to_depth(
                &settings.build_path,
                settings.tree_depth,
                &settings.module_basedir,
            )?,
        ));
    }

    log::info!("Removing application installed in {}", settings.rel_path(&app_dir));
    if Countdown::new()?.wait(settings.countdown) == CountdownOutcome::Interrupted {
        return Ok(false);
    }

    match std::fs::remove_dir_all(&app_dir) {
        Ok(()) => log::info!("Application removed."),
        Err(error) => log::warn!(
            "Failed to remove application directory {}: {error}. Skipping.",
            app_dir.display()
        ),
    }

    // Modulefile directory mirrors the app path without the trailing segment
    let module_dir = settings
        .build_path
        .join(&settings.module_basedir)
        .join(segments[..segments.len() - 1].join("/"));
    match std::fs::remove_dir_all(&module_dir) {
        Ok(()) => log::info!("Module removed."),
        Err(error) => log::warn!(
            "No associated module removed from {}: {error}. Skipping.",
            module_dir.display()
        ),
    }

    Ok(true)
}

fn is_temp_file(name: &str) -> bool {
    name.contains(".out")
        || name.contains(".err")
        || name.ends_with(".log")
        || name.starts_with("tmp.")
}

/// Deletes temporary files (job output, logs, tmp artifacts) under the base
/// directory. Returns the number of files removed.
pub fn clean_temp_files(settings: &Settings) -> crate::Result<usize> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(&settings.base_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_file() && is_temp_file(&name) {
            files.push(entry.path());
        }
    }
    files.sort();

    if files.is_empty() {
        log::info!("No temp files found.");
        return Ok(0);
    }

    log::info!("Found {} files to delete:", files.len());
    for file in &files {
        log::info!("  {}", settings.rel_path(file));
    }
    if Countdown::new()?.wait(settings.countdown) == CountdownOutcome::Interrupted {
        return Ok(0);
    }

    let mut tally = 0;
    for file in &files {
        match std::fs::remove_file(file) {
            Ok(()) => tally += 1,
            Err(error) => log::warn!("Error cleaning {}: {error}", file.display()),
        }
    }
    log::info!("Done, {tally} files successfully cleaned.");
    Ok(tally)
}

#[cfg(test)]
mod test {
    use super::{clean_temp_files, is_temp_file, remove_app};
    use crate::common::error::BenchError;
    use crate::common::settings::Settings;
    use std::time::Duration;

    fn settings(root: &std::path::Path) -> Settings {
        let mut settings = Settings::new(root, "frontera", "jdoe");
        settings.countdown = Duration::ZERO;
        settings
    }

    #[test]
    fn test_countdown_interrupt_aborts_then_rearms() {
        use super::{Countdown, CountdownOutcome};
        use std::sync::atomic::Ordering;

        let countdown = Countdown::new().unwrap();
        countdown.interrupted.store(true, Ordering::Relaxed);
        assert_eq!(
            countdown.wait(Duration::from_secs(1)),
            CountdownOutcome::Interrupted
        );

        let countdown = Countdown::new().unwrap();
        assert_eq!(countdown.wait(Duration::ZERO), CountdownOutcome::Elapsed);
        // Stays armed, so a later interrupt takes the default action and
        // terminates the process
        assert!(countdown.interrupted.load(Ordering::Relaxed));
    }

    #[test]
    fn test_is_temp_file() {
        assert!(is_temp_file("4641914.out"));
        assert!(is_temp_file("4641914.err.1"));
        assert!(is_temp_file("bench.log"));
        assert!(is_temp_file("tmp.build.batch"));
        assert!(!is_temp_file("bench_report.txt"));
    }

    #[test]
    fn test_remove_app_rejects_short_spec() {
        let dir = tempfile::tempdir().unwrap();
        let result = remove_app(&settings(dir.path()), "gromacs");
        assert!(matches!(result, Err(BenchError::ConfigError(_))));
    }

    #[test]
    fn test_remove_app_deletes_app_and_module() {
        let dir = tempfile::tempdir().unwrap();
        let spec = "frontera/intel19/impi19/gromacs/x86/2021";
        let app_dir = dir.path().join("build").join(spec);
        let module_dir = dir
            .path()
            .join("build/modulefiles/frontera/intel19/impi19/gromacs/x86");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::create_dir_all(&module_dir).unwrap();

        assert!(remove_app(&settings(dir.path()), spec).unwrap());
        assert!(!app_dir.exists());
        assert!(!module_dir.exists());
    }

    #[test]
    fn test_remove_app_unknown_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("build")).unwrap();
        let result = remove_app(&settings(dir.path()), "a/b/c/d/e/f");
        assert!(matches!(result, Err(BenchError::NotFoundError { .. })));
    }

    #[test]
    fn test_clean_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("123.out"), "x").unwrap();
        std::fs::write(dir.path().join("123.err"), "x").unwrap();
        std::fs::write(dir.path().join("keep.txt"), "x").unwrap();

        let removed = clean_temp_files(&settings(dir.path())).unwrap();
        assert_eq!(removed, 2);
        assert!(dir.path().join("keep.txt").exists());
    }
}
