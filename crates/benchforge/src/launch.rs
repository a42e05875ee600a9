//! Submission flows for build and bench jobs: resolve the request, apply
//! command-line overrides, chain dependencies on still-active jobs, submit
//! and persist the job record.

use std::path::Path;

use chrono::Local;

use crate::Map;
use crate::common::error::BenchError;
use crate::common::settings::Settings;
use crate::config::matcher::{ConfigMatcher, MatchedApp, ProfileCriteria};
use crate::config::overload::OverloadEngine;
use crate::config::{
    CONFIG_SECTION, ConfigProfile, GENERAL_SECTION, MODULES_SECTION, REQUIREMENTS_SECTION,
    RESULT_SECTION, RUNTIME_SECTION,
};
use crate::modules::ModuleEnv;
use crate::report::{BUILD_SECTION, BenchRecord, BuildRecord, ReportStore};
use crate::scheduler::{Slurm, SubmittedJob};

/// Substring identifying build jobs among the user's active scheduler jobs.
/// Queued builds serialize only behind other builds, never behind running
/// benchmarks.
pub const BUILD_JOB_LABEL: &str = "build";

/// Job script prepared by the (out-of-scope) templating step, ready for
/// submission from its working directory.
pub struct JobSpec<'a> {
    pub working_dir: &'a Path,
    pub script: &'a str,
    pub task_id: String,
    pub exec_mode: String,
}

/// Resolves a buildable profile, applies overrides, submits the build job
/// and persists its record. The dependency clause is computed from the
/// user's still-active build jobs so queued builds serialize behind them.
pub fn submit_build(
    settings: &Settings,
    slurm: &Slurm,
    criteria: &ProfileCriteria,
    overrides: Map<String, String>,
    job: &JobSpec,
) -> crate::Result<SubmittedJob> {
    let matcher = ConfigMatcher::new(settings);
    let profile_path = matcher.match_profile(criteria)?;
    let mut profile = ConfigProfile::load(&profile_path)?;

    let mut engine = OverloadEngine::new(overrides);
    engine.apply(&mut profile)?;
    engine.check_unconsumed()?;

    // Requested modules must exist before we burn a scheduler job on them
    let module_use = profile
        .get(GENERAL_SECTION, "module_use")
        .map(|v| v.to_string())
        .unwrap_or_default();
    let mut modules = profile.section_strings(MODULES_SECTION);
    if !modules.is_empty() {
        let env = if module_use.is_empty() {
            ModuleEnv::new(settings)
        } else {
            ModuleEnv::new(settings).with_module_use(&module_use)
        };
        env.resolve_all(&mut modules)?;
    }

    let active = slurm.active_jobs(Some(BUILD_JOB_LABEL))?;
    let clause = Slurm::dependency_clause(&slurm.still_active(&active));
    let submitted = slurm.submit(job.working_dir, job.script, &clause)?;

    let record = BuildRecord {
        username: settings.user.clone(),
        system: settings.system.clone(),
        code: profile.require_str(GENERAL_SECTION, "code")?,
        version: profile.require_str(GENERAL_SECTION, "version")?,
        build_label: profile.require_str(CONFIG_SECTION, "build_label")?,
        compiler: modules.get("compiler").cloned().unwrap_or_default(),
        mpi: modules.get("mpi").cloned().unwrap_or_default(),
        module_use,
        modules: modules.values().cloned().collect(),
        opt_flags: profile.require_str(CONFIG_SECTION, "opt_flags")?,
        bin_dir: profile.require_str(CONFIG_SECTION, "bin_dir")?,
        exe_file: profile.require_str(CONFIG_SECTION, "exe")?,
        working_path: job.working_dir.to_path_buf(),
        submit_time: Local::now(),
        script: job.script.to_string(),
        exec_mode: job.exec_mode.clone(),
        task_id: job.task_id.clone(),
        job_id: Some(submitted.id),
        stdout: file_name(&submitted.stdout),
        stderr: file_name(&submitted.stderr),
    };
    ReportStore::new(settings).write_build(&record, job.working_dir)?;

    Ok(submitted)
}

/// Resolves a benchmark profile, applies overrides, matches its application
/// requirements against the installed tree, chains the job behind a still
/// running build of that application, submits and persists the record.
pub fn submit_bench(
    settings: &Settings,
    slurm: &Slurm,
    bench_label: &str,
    overrides: Map<String, String>,
    job: &JobSpec,
) -> crate::Result<SubmittedJob> {
    let matcher = ConfigMatcher::new(settings);
    let profile_path = matcher.find_bench_profile(bench_label)?;
    let mut profile = ConfigProfile::load(&profile_path)?;

    let mut engine = OverloadEngine::new(overrides);
    engine.apply(&mut profile)?;
    engine.check_unconsumed()?;

    let store = ReportStore::new(settings);
    let requirements = profile.section_strings(REQUIREMENTS_SECTION);
    let mut build_section = None;
    let mut dependency_candidates = Vec::new();

    if ConfigMatcher::needs_code(&requirements) {
        match matcher.match_installed_by(&requirements)? {
            MatchedApp::Installed(app) => {
                let build_dir = settings.build_path.join(&app);
                if let Some(report) = store.read(&build_dir)? {
                    if let Some(job_id) = report.job_id() {
                        dependency_candidates.push(job_id);
                    }
                    build_section = report.section(BUILD_SECTION).cloned();
                }
            }
            MatchedApp::NeedsBuild => {
                return Err(BenchError::ConfigError(format!(
                    "benchmark '{bench_label}' requires an application that is not installed; \
                     build it first"
                )));
            }
        }
    }

    let clause = Slurm::dependency_clause(&slurm.still_active(&dependency_candidates));
    let submitted = slurm.submit(job.working_dir, job.script, &clause)?;

    let record = BenchRecord {
        build: build_section,
        working_path: job.working_dir.to_path_buf(),
        system: settings.system.clone(),
        launch_node: gethostname::gethostname().to_string_lossy().into_owned(),
        nodes: profile.require_str(RUNTIME_SECTION, "nodes")?,
        ranks_per_node: profile.require_str(RUNTIME_SECTION, "ranks_per_node")?,
        threads: profile.require_str(RUNTIME_SECTION, "threads")?,
        gpus: profile
            .get(RUNTIME_SECTION, "gpus")
            .map(|v| v.to_string())
            .unwrap_or_else(|| "0".to_string()),
        dataset: profile.require_str(CONFIG_SECTION, "dataset")?,
        start_time: Local::now(),
        script: job.script.to_string(),
        exec_mode: job.exec_mode.clone(),
        task_id: job.task_id.clone(),
        job_id: Some(submitted.id),
        stdout: file_name(&submitted.stdout),
        stderr: file_name(&submitted.stderr),
        result: profile.section_strings(RESULT_SECTION),
    };
    store.write_bench(&record, job.working_dir)?;

    Ok(submitted)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
