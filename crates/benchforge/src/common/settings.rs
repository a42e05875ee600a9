use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::process::ExecPolicy;

pub const BUILD_REPORT_FILE: &str = "build_report.txt";
pub const BENCH_REPORT_FILE: &str = "bench_report.txt";

/// Explicit context value constructed once per invocation and passed by
/// reference into each component. There is no ambient global state.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the benchforge directory tree.
    pub base_dir: PathBuf,
    /// Name of the current system, used for system-specific profile subdirs.
    pub system: String,
    /// User that owns scheduler jobs submitted by this tool.
    pub user: String,

    /// Tree of installed applications.
    pub build_path: PathBuf,
    /// Tree of benchmark result directories.
    pub bench_path: PathBuf,
    /// Root of build/bench configuration profiles.
    pub config_path: PathBuf,
    pub build_cfg_dir: String,
    pub bench_cfg_dir: String,
    /// Subtree of `build_path` holding generated modulefiles, skipped when
    /// scanning for installed applications.
    pub module_basedir: String,

    /// Number of path segments identifying one installed application under
    /// `build_path`.
    pub tree_depth: usize,
    /// When no installed application matches, return a "needs build" outcome
    /// instead of failing.
    pub build_if_missing: bool,

    /// Delay between job submission and the single-shot visibility check.
    pub confirm_delay: Duration,
    /// Grace period before destructive operations during which an interrupt
    /// aborts cleanly.
    pub countdown: Duration,
    /// Policy for external tool invocations.
    pub exec: ExecPolicy,
}

impl Settings {
    pub fn new(base_dir: impl Into<PathBuf>, system: &str, user: &str) -> Settings {
        let base_dir = base_dir.into();
        Settings {
            build_path: base_dir.join("build"),
            bench_path: base_dir.join("results"),
            config_path: base_dir.join("config"),
            build_cfg_dir: "build".to_string(),
            bench_cfg_dir: "bench".to_string(),
            module_basedir: "modulefiles".to_string(),
            tree_depth: 6,
            build_if_missing: false,
            confirm_delay: Duration::from_secs(5),
            countdown: Duration::from_secs(10),
            exec: ExecPolicy::default(),
            base_dir,
            system: system.to_string(),
            user: user.to_string(),
        }
    }

    /// Replaces the base directory prefix for printing, so log output does not
    /// leak long absolute paths.
    pub fn rel_path(&self, path: &Path) -> String {
        match path.strip_prefix(&self.base_dir) {
            Ok(rel) => format!("$BF_HOME/{}", rel.display()),
            Err(_) => path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Settings;
    use std::path::Path;

    #[test]
    fn test_derived_paths() {
        let settings = Settings::new("/opt/benchforge", "frontera", "jdoe");
        assert_eq!(settings.build_path, Path::new("/opt/benchforge/build"));
        assert_eq!(settings.bench_path, Path::new("/opt/benchforge/results"));
        assert_eq!(settings.config_path, Path::new("/opt/benchforge/config"));
    }

    #[test]
    fn test_rel_path() {
        let settings = Settings::new("/opt/benchforge", "frontera", "jdoe");
        assert_eq!(
            settings.rel_path(Path::new("/opt/benchforge/results/run1")),
            "$BF_HOME/results/run1"
        );
        assert_eq!(settings.rel_path(Path::new("/tmp/other")), "/tmp/other");
    }
}
