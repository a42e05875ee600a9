use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Outcomes of external tool invocations, kept distinct so that callers can
/// react differently to a missing binary, a failed command and garbage output.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("`{0}` is not installed or not in PATH")]
    NotInstalled(String),
    #[error("cannot start `{program}`: {error}")]
    StartFailed {
        program: String,
        #[source]
        error: std::io::Error,
    },
    #[error("`{program}` exited with code {code}: {stderr}")]
    Failed {
        program: String,
        code: i32,
        stderr: String,
    },
    #[error("`{program}` did not finish within {}", humantime::format_duration(*limit))]
    TimedOut { program: String, limit: Duration },
    #[error("cannot parse `{program}` output: {detail}")]
    Unparsable { program: String, detail: String },
}

impl ToolError {
    pub fn unparsable(program: &str, detail: impl ToString) -> ToolError {
        ToolError::Unparsable {
            program: program.to_string(),
            detail: detail.to_string(),
        }
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Execution policy for external tools. The default reproduces the historical
/// best-effort behavior (a single attempt), made explicit and configurable.
#[derive(Debug, Clone)]
pub struct ExecPolicy {
    pub attempts: u32,
    pub timeout: Option<Duration>,
}

impl Default for ExecPolicy {
    fn default() -> Self {
        ExecPolicy {
            attempts: 1,
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Runs external tools with structured argument vectors (never through a
/// shell), applying the configured timeout and attempt policy.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    policy: ExecPolicy,
}

pub struct CommandSpec<'a> {
    pub program: &'a str,
    pub args: Vec<String>,
    pub current_dir: Option<&'a Path>,
    pub env: Vec<(String, String)>,
}

impl<'a> CommandSpec<'a> {
    pub fn new(program: &'a str, args: Vec<String>) -> Self {
        CommandSpec {
            program,
            args,
            current_dir: None,
            env: Vec::new(),
        }
    }

    pub fn in_dir(mut self, dir: &'a Path) -> Self {
        self.current_dir = Some(dir);
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }
}

impl CommandRunner {
    pub fn new(policy: ExecPolicy) -> Self {
        CommandRunner { policy }
    }

    pub fn run(&self, program: &str, args: &[&str]) -> ToolResult<String> {
        let args = args.iter().map(|a| a.to_string()).collect();
        self.run_spec(CommandSpec::new(program, args))
    }

    pub fn run_spec(&self, spec: CommandSpec) -> ToolResult<String> {
        if which::which(spec.program).is_err() {
            return Err(ToolError::NotInstalled(spec.program.to_string()));
        }

        let mut last_error = None;
        for attempt in 1..=self.policy.attempts.max(1) {
            if attempt > 1 {
                log::debug!("Retrying `{}` (attempt {attempt})", spec.program);
            }
            match self.run_once(&spec) {
                Ok(output) => return Ok(output),
                Err(error @ (ToolError::Failed { .. } | ToolError::TimedOut { .. })) => {
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }
        Err(last_error.expect("at least one attempt was made"))
    }

    fn run_once(&self, spec: &CommandSpec) -> ToolResult<String> {
        log::debug!("Running command `{} {}`", spec.program, spec.args.join(" "));

        let mut command = Command::new(spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = spec.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|error| ToolError::StartFailed {
            program: spec.program.to_string(),
            error,
        })?;

        // Drain both pipes concurrently; a child filling a pipe buffer must
        // never be able to block the wait loop below.
        let stdout_reader = spawn_pipe_reader(child.stdout.take());
        let stderr_reader = spawn_pipe_reader(child.stderr.take());

        let status = if let Some(limit) = self.policy.timeout {
            let started = Instant::now();
            loop {
                match child.try_wait() {
                    Ok(Some(status)) => break status,
                    Ok(None) if started.elapsed() >= limit => {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ToolError::TimedOut {
                            program: spec.program.to_string(),
                            limit,
                        });
                    }
                    Ok(None) => std::thread::sleep(Duration::from_millis(25)),
                    Err(error) => {
                        return Err(ToolError::StartFailed {
                            program: spec.program.to_string(),
                            error,
                        });
                    }
                }
            }
        } else {
            child.wait().map_err(|error| ToolError::StartFailed {
                program: spec.program.to_string(),
                error,
            })?
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(ToolError::Failed {
                program: spec.program.to_string(),
                code: status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        String::from_utf8(stdout)
            .map_err(|e| ToolError::unparsable(spec.program, format!("invalid UTF-8: {e:?}")))
    }
}

fn spawn_pipe_reader<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        buffer
    })
}

#[cfg(test)]
mod test {
    use super::{CommandRunner, CommandSpec, ExecPolicy, ToolError};
    use std::time::Duration;

    fn runner() -> CommandRunner {
        CommandRunner::new(ExecPolicy::default())
    }

    #[test]
    fn test_missing_binary_is_not_installed() {
        let error = runner()
            .run("definitely-not-a-real-binary-bf", &[])
            .unwrap_err();
        assert!(matches!(error, ToolError::NotInstalled(_)));
    }

    #[test]
    fn test_captures_stdout() {
        let output = runner().run("echo", &["hello"]).unwrap();
        assert_eq!(output.trim(), "hello");
    }

    #[test]
    fn test_nonzero_exit_is_failed() {
        let error = runner().run("false", &[]).unwrap_err();
        assert!(matches!(error, ToolError::Failed { .. }));
    }

    #[test]
    fn test_large_output_finishes_within_timeout() {
        // Output far beyond the pipe buffer size must not stall the child
        // into a spurious timeout
        let runner = CommandRunner::new(ExecPolicy {
            attempts: 1,
            timeout: Some(Duration::from_secs(3)),
        });
        let output = runner.run("seq", &["1", "100000"]).unwrap();
        assert!(output.starts_with("1\n"));
        assert!(output.trim_end().ends_with("100000"));
    }

    #[test]
    fn test_timeout_kills_command() {
        let runner = CommandRunner::new(ExecPolicy {
            attempts: 1,
            timeout: Some(Duration::from_millis(100)),
        });
        let error = runner
            .run_spec(CommandSpec::new("sleep", vec!["5".to_string()]))
            .unwrap_err();
        assert!(matches!(error, ToolError::TimedOut { .. }));
    }
}
