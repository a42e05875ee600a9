//! Durable per-job key/value records, written once at submission and read
//! back by later invocations, standing in for a database while results are
//! pending capture.
//!
//! Report files are plain sectioned `key = value` text beside the job's
//! working directory. Writes are append-only; a superseded record is a new
//! file, never an in-place mutation. There is no locking or atomic-rename
//! discipline: concurrent invocations writing the same report file can race.
//! This is a known limitation of the format.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::Map;
use crate::common::kvfile::parse_sections;
use crate::common::settings::{BENCH_REPORT_FILE, BUILD_REPORT_FILE, Settings};
use crate::scheduler::JobId;

pub const BUILD_SECTION: &str = "build";
pub const BENCH_SECTION: &str = "bench";
pub const RESULT_SECTION: &str = "result";

/// Parsed report file: section name to key/value mapping, key case preserved.
#[derive(Debug, Clone, Default)]
pub struct Report {
    sections: Map<String, Map<String, String>>,
}

impl Report {
    pub fn section(&self, name: &str) -> Option<&Map<String, String>> {
        self.sections.get(name)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(String::as_str)
    }

    /// The job identifier of the most specific phase recorded in this report.
    pub fn job_id(&self) -> Option<JobId> {
        [BENCH_SECTION, BUILD_SECTION]
            .into_iter()
            .find_map(|section| self.get(section, "jobid"))
            .and_then(|id| id.parse().ok())
    }
}

/// Fields persisted for a build job.
#[derive(Debug, Clone)]
pub struct BuildRecord {
    pub username: String,
    pub system: String,
    pub code: String,
    pub version: String,
    pub build_label: String,
    pub compiler: String,
    pub mpi: String,
    pub module_use: String,
    pub modules: Vec<String>,
    pub opt_flags: String,
    pub bin_dir: String,
    pub exe_file: String,
    pub working_path: PathBuf,
    pub submit_time: DateTime<Local>,
    pub script: String,
    pub exec_mode: String,
    pub task_id: String,
    pub job_id: Option<JobId>,
    pub stdout: String,
    pub stderr: String,
}

/// Fields persisted for a bench job. When the benchmark depends on a built
/// application, the upstream build report's section is embedded so the
/// record stays self-contained.
#[derive(Debug, Clone)]
pub struct BenchRecord {
    pub build: Option<Map<String, String>>,
    pub working_path: PathBuf,
    pub system: String,
    pub launch_node: String,
    pub nodes: String,
    pub ranks_per_node: String,
    pub threads: String,
    pub gpus: String,
    pub dataset: String,
    pub start_time: DateTime<Local>,
    pub script: String,
    pub exec_mode: String,
    pub task_id: String,
    pub job_id: Option<JobId>,
    pub stdout: String,
    pub stderr: String,
    pub result: Map<String, String>,
}

pub struct ReportStore<'a> {
    settings: &'a Settings,
}

impl<'a> ReportStore<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        ReportStore { settings }
    }

    /// Reads a report from a file path, or from a directory by probing for
    /// the build report filename and then the bench report filename.
    /// A missing report is `Ok(None)`: state unknown, not an error.
    pub fn read(&self, path: &Path) -> crate::Result<Option<Report>> {
        let file = if path.is_file() {
            path.to_path_buf()
        } else if path.join(BUILD_REPORT_FILE).is_file() {
            path.join(BUILD_REPORT_FILE)
        } else if path.join(BENCH_REPORT_FILE).is_file() {
            path.join(BENCH_REPORT_FILE)
        } else {
            log::warn!(
                "Report file '{}' not found. Skipping.",
                self.settings.rel_path(path)
            );
            return Ok(None);
        };

        let text = std::fs::read_to_string(&file)?;
        let parsed = parse_sections(&text)
            .map_err(|error| format!("malformed report {}: {error}", file.display()))?;

        let mut sections: Map<String, Map<String, String>> = Map::new();
        for (name, entries) in parsed {
            sections.entry(name).or_default().extend(entries);
        }
        Ok(Some(Report { sections }))
    }

    pub fn write_build(&self, record: &BuildRecord, dir: &Path) -> crate::Result<PathBuf> {
        let mut content = vec![format!("[{BUILD_SECTION}]")];
        push_kv(&mut content, "username", &record.username);
        push_kv(&mut content, "system", &record.system);
        push_kv(&mut content, "code", &record.code);
        push_kv(&mut content, "version", &record.version);
        push_kv(&mut content, "build_label", &record.build_label);
        push_kv(&mut content, "compiler", &record.compiler);
        push_kv(&mut content, "mpi", &record.mpi);
        push_kv(&mut content, "module_use", &record.module_use);
        push_kv(&mut content, "modules", &record.modules.join(", "));
        push_kv(&mut content, "opt_flags", &record.opt_flags);
        push_kv(&mut content, "bin_dir", &record.bin_dir);
        push_kv(&mut content, "exe_file", &record.exe_file);
        push_kv(
            &mut content,
            "build_prefix",
            &record.working_path.display().to_string(),
        );
        push_kv(
            &mut content,
            "submit_time",
            &record.submit_time.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        push_kv(&mut content, "script", &record.script);
        push_kv(&mut content, "exec_mode", &record.exec_mode);
        push_kv(&mut content, "task_id", &record.task_id);
        push_jobid(&mut content, record.job_id);
        push_kv(&mut content, "stdout", &record.stdout);
        push_kv(&mut content, "stderr", &record.stderr);

        self.append(&content, &dir.join(BUILD_REPORT_FILE))
    }

    pub fn write_bench(&self, record: &BenchRecord, dir: &Path) -> crate::Result<PathBuf> {
        let mut content = Vec::new();
        if let Some(build) = &record.build {
            content.push(format!("[{BUILD_SECTION}]"));
            for (key, value) in build {
                push_kv(&mut content, key, value);
            }
        }

        content.push(format!("[{BENCH_SECTION}]"));
        push_kv(
            &mut content,
            "bench_prefix",
            &record.working_path.display().to_string(),
        );
        push_kv(&mut content, "system", &record.system);
        push_kv(&mut content, "launch_node", &record.launch_node);
        push_kv(&mut content, "nodes", &record.nodes);
        push_kv(&mut content, "ranks", &record.ranks_per_node);
        push_kv(&mut content, "threads", &record.threads);
        push_kv(&mut content, "gpus", &record.gpus);
        push_kv(&mut content, "dataset", &record.dataset);
        push_kv(
            &mut content,
            "start_time",
            &record.start_time.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        push_kv(&mut content, "script", &record.script);
        push_kv(&mut content, "exec_mode", &record.exec_mode);
        push_kv(&mut content, "task_id", &record.task_id);
        push_jobid(&mut content, record.job_id);
        push_kv(&mut content, "stdout", &record.stdout);
        push_kv(&mut content, "stderr", &record.stderr);

        content.push(format!("[{RESULT_SECTION}]"));
        for (key, value) in &record.result {
            push_kv(&mut content, key, value);
        }

        self.append(&content, &dir.join(BENCH_REPORT_FILE))
    }

    /// Appends report lines; prior content of the file is never overwritten.
    fn append(&self, content: &[String], file: &Path) -> crate::Result<PathBuf> {
        let mut out = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)?;
        for line in content {
            writeln!(out, "{line}")?;
        }
        log::debug!("Wrote report {}", self.settings.rel_path(file));
        Ok(file.to_path_buf())
    }

    /// The execution mode (scheduler/local/dry run) a job was started with.
    pub fn exec_mode(&self, phase: &str, dir: &Path) -> crate::Result<Option<String>> {
        Ok(self
            .read(dir)?
            .and_then(|report| report.get(phase, "exec_mode").map(str::to_string)))
    }

    /// The task identifier recorded for a job.
    pub fn task_id(&self, phase: &str, dir: &Path) -> crate::Result<Option<String>> {
        Ok(self
            .read(dir)?
            .and_then(|report| report.get(phase, "task_id").map(str::to_string)))
    }

    /// Binary location recorded in a build report, relative to the build
    /// tree: `(bin_dir, exe_file)`.
    pub fn build_exe(&self, build_rel_path: &str) -> crate::Result<Option<(String, String)>> {
        let dir = self.settings.build_path.join(build_rel_path);
        Ok(self.read(&dir)?.and_then(|report| {
            let bin_dir = report.get(BUILD_SECTION, "bin_dir")?.to_string();
            let exe_file = report.get(BUILD_SECTION, "exe_file")?.to_string();
            Some((bin_dir, exe_file))
        }))
    }
}

fn push_kv(content: &mut Vec<String>, key: &str, value: &str) {
    content.push(format!("{key:<15}= {value}"));
}

fn push_jobid(content: &mut Vec<String>, job_id: Option<JobId>) {
    if let Some(id) = job_id {
        push_kv(content, "jobid", &id.to_string());
    }
}

#[cfg(test)]
mod test {
    use super::{BENCH_SECTION, BUILD_SECTION, BenchRecord, BuildRecord, ReportStore};
    use crate::Map;
    use crate::common::settings::{BENCH_REPORT_FILE, BUILD_REPORT_FILE, Settings};
    use crate::scheduler::JobId;
    use chrono::Local;
    use std::path::Path;

    fn build_record() -> BuildRecord {
        BuildRecord {
            username: "jdoe".to_string(),
            system: "frontera".to_string(),
            code: "gromacs".to_string(),
            version: "2021".to_string(),
            build_label: "default".to_string(),
            compiler: "intel/19.1.1".to_string(),
            mpi: "impi/19.0.9".to_string(),
            module_use: String::new(),
            modules: vec!["intel/19.1.1".to_string(), "impi/19.0.9".to_string()],
            opt_flags: "-O3 -xCORE-AVX512".to_string(),
            bin_dir: "bin".to_string(),
            exe_file: "gmx_mpi".to_string(),
            working_path: "/scratch/builds/gromacs".into(),
            submit_time: Local::now(),
            script: "build.batch".to_string(),
            exec_mode: "sched".to_string(),
            task_id: "1".to_string(),
            job_id: Some(JobId::new(4641914)),
            stdout: "4641914.out".to_string(),
            stderr: "4641914.err".to_string(),
        }
    }

    fn bench_record() -> BenchRecord {
        BenchRecord {
            build: None,
            working_path: "/scratch/results/run1".into(),
            system: "frontera".to_string(),
            launch_node: "login01".to_string(),
            nodes: "4".to_string(),
            ranks_per_node: "56".to_string(),
            threads: "1".to_string(),
            gpus: "0".to_string(),
            dataset: "benchPEP".to_string(),
            start_time: Local::now(),
            script: "bench.batch".to_string(),
            exec_mode: "sched".to_string(),
            task_id: "2".to_string(),
            job_id: Some(JobId::new(4641920)),
            stdout: "4641920.out".to_string(),
            stderr: "4641920.err".to_string(),
            result: [("unit".to_string(), "ns/day".to_string())]
                .into_iter()
                .collect::<Map<_, _>>(),
        }
    }

    #[test]
    fn test_build_report_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(dir.path(), "frontera", "jdoe");
        let store = ReportStore::new(&settings);

        store.write_build(&build_record(), dir.path()).unwrap();
        let report = store.read(dir.path()).unwrap().unwrap();

        assert_eq!(report.get(BUILD_SECTION, "code"), Some("gromacs"));
        assert_eq!(report.get(BUILD_SECTION, "compiler"), Some("intel/19.1.1"));
        assert_eq!(report.job_id(), Some(JobId::new(4641914)));
    }

    #[test]
    fn test_bench_report_embeds_build_section() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(dir.path(), "frontera", "jdoe");
        let store = ReportStore::new(&settings);

        let mut record = bench_record();
        record.build = Some(
            [("code".to_string(), "gromacs".to_string())]
                .into_iter()
                .collect(),
        );
        store.write_bench(&record, dir.path()).unwrap();

        let report = store.read(dir.path()).unwrap().unwrap();
        assert_eq!(report.get(BUILD_SECTION, "code"), Some("gromacs"));
        assert_eq!(report.get(BENCH_SECTION, "nodes"), Some("4"));
        assert_eq!(report.get("result", "unit"), Some("ns/day"));
        // The bench jobid wins over any build jobid
        assert_eq!(report.job_id(), Some(JobId::new(4641920)));
    }

    #[test]
    fn test_read_probes_build_then_bench() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(dir.path(), "frontera", "jdoe");
        let store = ReportStore::new(&settings);

        store.write_bench(&bench_record(), dir.path()).unwrap();
        assert!(dir.path().join(BENCH_REPORT_FILE).is_file());
        let report = store.read(dir.path()).unwrap().unwrap();
        assert_eq!(report.get(BENCH_SECTION, "dataset"), Some("benchPEP"));

        store.write_build(&build_record(), dir.path()).unwrap();
        assert!(dir.path().join(BUILD_REPORT_FILE).is_file());
        let report = store.read(dir.path()).unwrap().unwrap();
        // Build report shadows the bench report when both exist
        assert!(report.section(BENCH_SECTION).is_none());
    }

    #[test]
    fn test_read_missing_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(dir.path(), "frontera", "jdoe");
        let store = ReportStore::new(&settings);

        assert!(store.read(dir.path()).unwrap().is_none());
        assert!(store.read(Path::new("/nonexistent/dir")).unwrap().is_none());
    }

    #[test]
    fn test_append_only() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(dir.path(), "frontera", "jdoe");
        let store = ReportStore::new(&settings);

        let path = store.write_build(&build_record(), dir.path()).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        store.write_build(&build_record(), dir.path()).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert!(second.starts_with(&first));
        assert!(second.len() > first.len());
    }

    #[test]
    fn test_exec_mode_and_task_id() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(dir.path(), "frontera", "jdoe");
        let store = ReportStore::new(&settings);

        store.write_bench(&bench_record(), dir.path()).unwrap();
        assert_eq!(
            store.exec_mode(BENCH_SECTION, dir.path()).unwrap(),
            Some("sched".to_string())
        );
        assert_eq!(
            store.task_id(BENCH_SECTION, dir.path()).unwrap(),
            Some("2".to_string())
        );
    }
}
