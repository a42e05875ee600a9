pub mod nodelist;

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use itertools::Itertools;

use crate::common::process::{CommandRunner, CommandSpec, ToolError, ToolResult};
use crate::common::settings::Settings;
use crate::common::timeutils::parse_elapsed_seconds;

/// Scheduler job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u64);

impl JobId {
    pub fn new(id: u64) -> JobId {
        JobId(id)
    }

    pub fn as_num(&self) -> u64 {
        self.0
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(JobId(s.trim().parse()?))
    }
}

/// Why a job stopped being visible as active in the accounting system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    Completed,
    Cancelled,
    Error,
    Failed,
    Timeout,
    /// The accounting query failed and the configured policy assumed the job
    /// is finished.
    Unknown,
}

impl TerminalReason {
    pub fn from_token(token: &str) -> Option<TerminalReason> {
        match token {
            "COMPLETED" => Some(TerminalReason::Completed),
            "CANCELLED" => Some(TerminalReason::Cancelled),
            "ERROR" => Some(TerminalReason::Error),
            "FAILED" => Some(TerminalReason::Failed),
            "TIMEOUT" => Some(TerminalReason::Timeout),
            _ => None,
        }
    }
}

impl Display for TerminalReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let token = match self {
            TerminalReason::Completed => "COMPLETED",
            TerminalReason::Cancelled => "CANCELLED",
            TerminalReason::Error => "ERROR",
            TerminalReason::Failed => "FAILED",
            TerminalReason::Timeout => "TIMEOUT",
            TerminalReason::Unknown => "UNKNOWN",
        };
        f.write_str(token)
    }
}

/// Derived job state; never stored, recomputed per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// RUNNING, PENDING or any other non-terminal scheduler state.
    Active,
    Terminal(TerminalReason),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Terminal(_))
    }
}

/// Job state lookup, a seam so that result classification can be exercised
/// without a live scheduler.
pub trait StatusSource {
    fn status_of(&self, id: JobId) -> JobStatus;
}

/// Handle to a submitted job, with the stdout/stderr paths reported back to
/// the user.
#[derive(Debug, Clone)]
pub struct SubmittedJob {
    pub id: JobId,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

/// Client for the Slurm batch system. All invocations go through structured
/// argument vectors with the configured timeout policy.
pub struct Slurm {
    runner: CommandRunner,
    user: String,
    confirm_delay: Duration,
}

impl Slurm {
    pub fn new(settings: &Settings) -> Slurm {
        Slurm {
            runner: CommandRunner::new(settings.exec.clone()),
            user: settings.user.clone(),
            confirm_delay: settings.confirm_delay,
        }
    }

    /// Builds the dependency directive for a submission: run after any of
    /// the given jobs terminate, regardless of their exit status.
    pub fn dependency_clause(dependencies: &[JobId]) -> String {
        if dependencies.is_empty() {
            String::new()
        } else {
            format!(
                "--dependency=afterany:{}",
                dependencies.iter().map(|id| id.to_string()).join(":")
            )
        }
    }

    /// Submits `script` from `job_dir` and confirms queue visibility once
    /// after `confirm_delay`. This is a single-shot confirmation; if the job
    /// has not appeared yet, no further attempt is made.
    pub fn submit(
        &self,
        job_dir: &Path,
        script: &str,
        dependency_clause: &str,
    ) -> ToolResult<SubmittedJob> {
        let mut args = Vec::new();
        if !dependency_clause.is_empty() {
            args.push(dependency_clause.to_string());
        }
        args.push(job_dir.join(script).display().to_string());

        let output = self
            .runner
            .run_spec(CommandSpec::new("sbatch", args).in_dir(job_dir))?;
        let id = parse_sbatch_job_id(&output)?;

        log::info!(
            "Submitted job {id}, confirming queue visibility in {}",
            humantime::format_duration(self.confirm_delay)
        );
        std::thread::sleep(self.confirm_delay);

        match self.runner.run("squeue", &["-a", "--job", &id.to_string()]) {
            Ok(queue) => log::debug!("squeue output: {}", queue.trim()),
            Err(error) => log::warn!("Job {id} is not visible in the queue yet: {error}"),
        }

        Ok(SubmittedJob {
            id,
            stdout: job_dir.join(format!("{id}.out")),
            stderr: job_dir.join(format!("{id}.err")),
        })
    }

    /// Queries the accounting system for the job's state. Query failures
    /// surface as errors here; use [`Slurm::status_or_assume_complete`] for
    /// call sites that need the fallback policy.
    pub fn poll(&self, id: JobId) -> ToolResult<JobStatus> {
        let output = self
            .runner
            .run("sacct", &["-j", &id.to_string(), "--format", "State"])?;
        parse_sacct_state(&output)
    }

    /// The single query-failure policy of this tool: a failed or unparsable
    /// accounting query counts as `Terminal(Unknown)`. Dependency
    /// computation and result classification both rely on this optimistic
    /// fallback so that one broken query can never block submission forever.
    pub fn status_or_assume_complete(&self, id: JobId) -> JobStatus {
        match self.poll(id) {
            Ok(status) => status,
            Err(error) => {
                log::warn!("Cannot query state of job {id}, assuming it finished: {error}");
                JobStatus::Terminal(TerminalReason::Unknown)
            }
        }
    }

    /// Filters `candidates` down to jobs that are still active, forming the
    /// dependency set for the next submission.
    pub fn still_active(&self, candidates: &[JobId]) -> Vec<JobId> {
        candidates
            .iter()
            .copied()
            .filter(|id| !self.status_or_assume_complete(*id).is_terminal())
            .collect()
    }

    /// Jobs of the current user in RUNNING or PENDING state, ascending,
    /// optionally filtered by a label substring.
    pub fn active_jobs(&self, label_filter: Option<&str>) -> ToolResult<Vec<JobId>> {
        let output = self.runner.run("sacct", &["-u", &self.user])?;
        Ok(parse_active_jobs(&output, label_filter))
    }

    /// Nodes allocated to a job, decoded from the compact notation.
    pub fn nodelist(&self, id: JobId) -> ToolResult<Vec<String>> {
        let output = self.runner.run(
            "sacct",
            &["-X", "-P", "-j", &id.to_string(), "--format", "NodeList"],
        )?;
        let line = output
            .lines()
            .nth(1)
            .ok_or_else(|| ToolError::unparsable("sacct", "missing NodeList record"))?;
        nodelist::decode(line).map_err(|error| ToolError::unparsable("sacct", error))
    }

    /// Elapsed wallclock seconds of a job.
    pub fn elapsed_seconds(&self, id: JobId) -> ToolResult<u64> {
        let output = self
            .runner
            .run("sacct", &["-j", &id.to_string(), "--format", "elapsed"])?;
        let line = record_line(&output, "sacct")?;
        parse_elapsed_seconds(line).map_err(|error| ToolError::unparsable("sacct", error))
    }

    /// End timestamp of a job, as reported by the accounting tool.
    pub fn end_time(&self, id: JobId) -> ToolResult<String> {
        let output = self
            .runner
            .run("sacct", &["-j", &id.to_string(), "--format", "end"])?;
        Ok(record_line(&output, "sacct")?.trim().to_string())
    }
}

impl StatusSource for Slurm {
    fn status_of(&self, id: JobId) -> JobStatus {
        self.status_or_assume_complete(id)
    }
}

/// The first record line of accounting output: header, separator, record.
fn record_line<'a>(output: &'a str, program: &str) -> ToolResult<&'a str> {
    output
        .lines()
        .nth(2)
        .ok_or_else(|| ToolError::unparsable(program, "missing record line"))
}

fn parse_sbatch_job_id(output: &str) -> ToolResult<JobId> {
    output
        .lines()
        .map(|l| l.trim())
        .find(|l| l.to_lowercase().starts_with("submitted batch job"))
        .and_then(|l| l.split(' ').nth(3))
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| {
            ToolError::unparsable("sbatch", format!("missing job id in output\n{output}"))
        })
}

fn parse_sacct_state(output: &str) -> ToolResult<JobStatus> {
    let line = record_line(output, "sacct")?;
    // Strip annotation chars the accounting tool appends to the state token
    let token: String = line
        .chars()
        .filter(|c| !matches!(c, ' ' | '*' | '+'))
        .collect();
    Ok(match TerminalReason::from_token(&token) {
        Some(reason) => JobStatus::Terminal(reason),
        None => JobStatus::Active,
    })
}

fn parse_active_jobs(output: &str, label_filter: Option<&str>) -> Vec<JobId> {
    let mut jobs: Vec<JobId> = output
        .lines()
        .filter(|line| line.contains("RUNNING") || line.contains("PENDING"))
        .filter(|line| label_filter.is_none_or(|label| line.contains(label)))
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|token| token.parse().ok())
        .collect();
    jobs.sort();
    jobs.dedup();
    jobs
}
