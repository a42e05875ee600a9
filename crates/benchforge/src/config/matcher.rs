use std::path::PathBuf;

use crate::Map;
use crate::common::error::BenchError;
use crate::common::fsutils::{files_with_extension, walk_to_depth};
use crate::common::settings::Settings;
use crate::config::{CONFIG_SECTION, ConfigProfile, GENERAL_SECTION};

const PROFILE_EXTENSION: &str = ".cfg";

/// Outcome of resolving an abstract application request against the tree of
/// installed builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchedApp {
    /// Exactly one installed application, as a relative path under the build
    /// tree.
    Installed(String),
    /// Nothing installed matches and `build_if_missing` is enabled; the
    /// caller should fall back to building from a profile.
    NeedsBuild,
}

/// Search fields identifying one buildable profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileCriteria {
    pub code: String,
    pub version: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Build,
    Bench,
}

pub struct ConfigMatcher<'a> {
    settings: &'a Settings,
}

impl<'a> ConfigMatcher<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        ConfigMatcher { settings }
    }

    /// Relative paths of all installed applications, sorted. The modulefiles
    /// subtree is not part of the application namespace.
    pub fn installed_apps(&self) -> crate::Result<Vec<String>> {
        Ok(walk_to_depth(
            &self.settings.build_path,
            self.settings.tree_depth,
            &self.settings.module_basedir,
        )?)
    }

    /// Resolves a user request string (substrings joined by `_`) to exactly
    /// one installed application.
    pub fn match_installed(&self, request: &str) -> crate::Result<MatchedApp> {
        let criteria: Vec<&str> = request.split('_').filter(|c| !c.is_empty()).collect();
        let installed = self.installed_apps()?;

        let matches: Vec<&String> = installed
            .iter()
            .filter(|app| criteria.iter().all(|c| app.contains(c)))
            .collect();

        match matches.len() {
            0 if self.settings.build_if_missing => {
                log::info!("No installed application matches '{request}', building instead");
                Ok(MatchedApp::NeedsBuild)
            }
            0 => Err(BenchError::not_found(
                format!("installed application for '{request}'"),
                installed.clone(),
            )),
            1 => Ok(MatchedApp::Installed(matches[0].clone())),
            _ => {
                // Exact match wins over substring matches
                if let Some(exact) = matches.iter().find(|app| app.as_str() == request) {
                    return Ok(MatchedApp::Installed((*exact).clone()));
                }
                Err(BenchError::ambiguous(
                    format!("installed applications for '{request}'"),
                    matches.into_iter().cloned().collect(),
                ))
            }
        }
    }

    /// Requirements-driven variant used by the bench path: every non-empty
    /// criteria value must occur in the candidate path.
    pub fn match_installed_by(&self, criteria: &Map<String, String>) -> crate::Result<MatchedApp> {
        let installed = self.installed_apps()?;
        let matches: Vec<&String> = installed
            .iter()
            .filter(|app| criteria.values().all(|value| app.contains(value.as_str())))
            .collect();

        match matches.len() {
            0 if self.settings.build_if_missing => Ok(MatchedApp::NeedsBuild),
            0 => Err(BenchError::not_found(
                format!("installed application for requirements {criteria:?}"),
                installed.clone(),
            )),
            1 => Ok(MatchedApp::Installed(matches[0].clone())),
            _ => Err(BenchError::ambiguous(
                format!("installed applications for requirements {criteria:?}"),
                matches.into_iter().cloned().collect(),
            )),
        }
    }

    /// True when the requirements section asks for a built application at
    /// all; an all-empty section means the benchmark needs no code.
    pub fn needs_code(criteria: &Map<String, String>) -> bool {
        criteria.values().any(|value| !value.is_empty())
    }

    /// Resolves search criteria to exactly one buildable profile. Zero and
    /// multiple matches are always fatal here; this already is the build
    /// source, so there is nothing to fall back to.
    pub fn match_profile(&self, criteria: &ProfileCriteria) -> crate::Result<PathBuf> {
        let profiles = self.profile_files(Phase::Build);
        let mut matches = Vec::new();
        let mut available = Vec::new();

        for path in &profiles {
            let profile = ConfigProfile::load(path)?;
            let code = profile.require_str(GENERAL_SECTION, "code")?;
            let version = profile.require_str(GENERAL_SECTION, "version")?;
            let label = profile.require_str(CONFIG_SECTION, "build_label")?;
            available.push(format!("{code} {version} {label}"));

            if code.contains(&criteria.code)
                && version.contains(&criteria.version)
                && label.contains(&criteria.label)
            {
                matches.push(path.clone());
            }
        }

        match matches.len() {
            0 => Err(BenchError::not_found(
                format!(
                    "application profile for code='{}' version='{}' label='{}'",
                    criteria.code, criteria.version, criteria.label
                ),
                available,
            )),
            1 => Ok(matches.remove(0)),
            _ => Err(BenchError::ambiguous(
                "application profiles",
                matches
                    .iter()
                    .map(|path| self.settings.rel_path(path))
                    .collect(),
            )),
        }
    }

    /// First bench profile whose filename contains `label`.
    pub fn find_bench_profile(&self, label: &str) -> crate::Result<PathBuf> {
        let profiles = self.profile_files(Phase::Bench);
        for path in &profiles {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.contains(label) {
                    return Ok(path.clone());
                }
            }
        }

        Err(BenchError::not_found(
            format!("benchmark profile matching '{label}'"),
            profiles
                .iter()
                .filter_map(|path| path.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect(),
        ))
    }

    /// Profile files for one phase: the phase directory plus an optional
    /// system-named subdirectory.
    pub fn profile_files(&self, phase: Phase) -> Vec<PathBuf> {
        let type_dir = match phase {
            Phase::Build => &self.settings.build_cfg_dir,
            Phase::Bench => &self.settings.bench_cfg_dir,
        };
        let search_path = self.settings.config_path.join(type_dir);

        let mut files = files_with_extension(&search_path, PROFILE_EXTENSION);
        let system_path = search_path.join(&self.settings.system);
        if system_path.is_dir() {
            files.extend(files_with_extension(&system_path, PROFILE_EXTENSION));
        }
        files
    }
}
