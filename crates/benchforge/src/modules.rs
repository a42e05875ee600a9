//! Environment-module capability, used to validate that requested compiler
//! and MPI modules are installable before a build is attempted.

use crate::Map;
use crate::common::error::BenchError;
use crate::common::process::{CommandRunner, CommandSpec, ToolError, ToolResult};
use crate::common::settings::Settings;

pub struct ModuleEnv {
    runner: CommandRunner,
    /// Extra module search path, prepended to MODULEPATH for every query.
    module_use: Option<String>,
}

impl ModuleEnv {
    pub fn new(settings: &Settings) -> ModuleEnv {
        ModuleEnv {
            runner: CommandRunner::new(settings.exec.clone()),
            module_use: None,
        }
    }

    pub fn with_module_use(mut self, path: &str) -> ModuleEnv {
        self.module_use = Some(path.to_string());
        self
    }

    fn spec<'a>(&self, program: &'a str, args: &[&str]) -> CommandSpec<'a> {
        let spec = CommandSpec::new(program, args.iter().map(|a| a.to_string()).collect());
        match &self.module_use {
            Some(extra) => {
                let path = match std::env::var("MODULEPATH") {
                    Ok(current) if !current.is_empty() => format!("{extra}:{current}"),
                    _ => extra.clone(),
                };
                spec.with_env("MODULEPATH", &path)
            }
            None => spec,
        }
    }

    /// List of default system modules, one full module name per line.
    pub fn list_defaults(&self) -> ToolResult<Vec<String>> {
        let output = self.runner.run_spec(self.spec("ml", &["-t", "-d", "av"]))?;
        Ok(output
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    /// Whether a module is available on this system.
    pub fn exists(&self, module: &str) -> ToolResult<bool> {
        match self.runner.run_spec(self.spec("module", &["spider", module])) {
            Ok(_) => Ok(true),
            Err(ToolError::Failed { .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Full module name of a possibly-default module, e.g. `intel` ->
    /// `intel/18.0.2`.
    pub fn resolve(&self, module: &str, defaults: &[String]) -> crate::Result<String> {
        if module.contains('/') {
            return Ok(module.to_string());
        }
        defaults
            .iter()
            .find(|line| line.starts_with(module))
            .cloned()
            .ok_or_else(|| BenchError::not_found(format!("module '{module}'"), defaults.to_vec()))
    }

    /// Confirms every requested module exists and replaces each with its
    /// full name. Keys with empty values are ignored.
    pub fn resolve_all(&self, modules: &mut Map<String, String>) -> crate::Result<()> {
        let defaults = self.list_defaults()?;
        for (key, module) in modules.iter_mut() {
            if module.is_empty() {
                continue;
            }
            if !self.exists(module)? {
                return Err(BenchError::not_found(
                    format!("{key} module '{module}'"),
                    defaults.clone(),
                ));
            }
            *module = self.resolve(module, &defaults)?;
        }
        Ok(())
    }
}

/// Converts a module name to a usable directory label, e.g. `intel/18.0.2`
/// -> `intel18`.
pub fn module_label(module: &str) -> String {
    match module.split_once('/') {
        Some((name, version)) => {
            let major = version.split('.').next().unwrap_or(version);
            format!("{name}{major}")
        }
        None => module.to_string(),
    }
}
