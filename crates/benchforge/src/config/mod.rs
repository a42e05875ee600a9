pub mod matcher;
pub mod overload;
pub mod value;

use std::path::{Path, PathBuf};

use crate::Map;
use crate::common::error::BenchError;
use crate::common::kvfile::parse_sections;
use crate::config::value::CfgValue;

pub const GENERAL_SECTION: &str = "general";
pub const CONFIG_SECTION: &str = "config";
pub const MODULES_SECTION: &str = "modules";
pub const RUNTIME_SECTION: &str = "runtime";
pub const RESULT_SECTION: &str = "result";
pub const REQUIREMENTS_SECTION: &str = "requirements";

/// One build or bench configuration profile, parsed from a flat `.cfg` file.
/// Values carry their tag from parse time onwards.
#[derive(Debug, Clone)]
pub struct ConfigProfile {
    path: PathBuf,
    sections: Map<String, Map<String, CfgValue>>,
}

impl ConfigProfile {
    pub fn load(path: &Path) -> crate::Result<ConfigProfile> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, path: &Path) -> crate::Result<ConfigProfile> {
        let parsed = parse_sections(text).map_err(|error| {
            BenchError::ConfigError(format!("malformed profile {}: {error}", path.display()))
        })?;

        let mut sections = Map::new();
        for (name, entries) in parsed {
            let section: &mut Map<String, CfgValue> = sections.entry(name).or_default();
            for (key, value) in entries {
                section.insert(key, CfgValue::parse(&value));
            }
        }

        Ok(ConfigProfile {
            path: path.to_path_buf(),
            sections,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn section(&self, name: &str) -> Option<&Map<String, CfgValue>> {
        self.sections.get(name)
    }

    pub fn sections_mut(&mut self) -> impl Iterator<Item = (&String, &mut Map<String, CfgValue>)> {
        self.sections.iter_mut()
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&CfgValue> {
        self.sections.get(section)?.get(key)
    }

    /// Missing sections or keys in the fixed per-phase schema are fatal.
    pub fn require(&self, section: &str, key: &str) -> crate::Result<&CfgValue> {
        self.get(section, key).ok_or_else(|| {
            BenchError::ConfigError(format!(
                "missing key [{section}] {key} in profile {}",
                self.path.display()
            ))
        })
    }

    pub fn require_str(&self, section: &str, key: &str) -> crate::Result<String> {
        Ok(self.require(section, key)?.to_string())
    }

    /// String values of one section, used for requirements-driven matching
    /// and report content.
    pub fn section_strings(&self, name: &str) -> Map<String, String> {
        self.section(name)
            .map(|section| {
                section
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::ConfigProfile;
    use std::path::Path;

    pub fn profile(text: &str) -> ConfigProfile {
        ConfigProfile::parse(text, Path::new("test.cfg")).unwrap()
    }
}

#[cfg(test)]
mod test {
    use super::testutil::profile;
    use super::*;

    #[test]
    fn test_load_tags_values() {
        let cfg = profile(
            "[general]\ncode = gromacs\n[runtime]\nnodes = 2\ncollect_hw = True\nthreads = 14\n",
        );
        assert_eq!(cfg.get(RUNTIME_SECTION, "nodes"), Some(&CfgValue::Int(2)));
        assert_eq!(
            cfg.get(RUNTIME_SECTION, "collect_hw"),
            Some(&CfgValue::Bool(true))
        );
        assert_eq!(
            cfg.get(GENERAL_SECTION, "code"),
            Some(&CfgValue::Str("gromacs".to_string()))
        );
    }

    #[test]
    fn test_require_missing_key() {
        let cfg = profile("[general]\ncode = gromacs\n");
        assert!(cfg.require(GENERAL_SECTION, "code").is_ok());
        assert!(cfg.require(GENERAL_SECTION, "version").is_err());
        assert!(cfg.require(CONFIG_SECTION, "build_label").is_err());
    }

    #[test]
    fn test_section_strings() {
        let cfg = profile("[requirements]\ncode = lammps\nversion = \n");
        let requirements = cfg.section_strings(REQUIREMENTS_SECTION);
        assert_eq!(requirements.get("code").map(String::as_str), Some("lammps"));
        assert_eq!(requirements.get("version").map(String::as_str), Some(""));
    }
}
