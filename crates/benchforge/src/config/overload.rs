use crate::Map;
use crate::common::error::BenchError;
use crate::config::ConfigProfile;

/// Applies user-supplied key/value overrides onto matched configurations.
/// Every override must be consumed by at least one real configuration key
/// before the engine is dropped; `check_unconsumed` enforces this.
#[derive(Debug, Default)]
pub struct OverloadEngine {
    pending: Map<String, String>,
}

impl OverloadEngine {
    pub fn new(overrides: Map<String, String>) -> Self {
        OverloadEngine { pending: overrides }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Applies pending overrides to every section of `config` in a single
    /// pass. A key present in multiple sections receives the same value in
    /// all of them; section traversal order cannot affect the result. The
    /// override string is coerced to the tag of the existing value, and a
    /// coercion failure is fatal.
    pub fn apply(&mut self, config: &mut ConfigProfile) -> crate::Result<()> {
        let mut consumed = Vec::new();

        for (key, raw) in &self.pending {
            let mut matched = false;
            for (section_name, section) in config.sections_mut() {
                if let Some(old) = section.get(key).cloned() {
                    let coerced = old.coerce(raw).map_err(|error| {
                        BenchError::ConfigError(format!(
                            "cannot overload [{section_name}] {key}: {error}"
                        ))
                    })?;
                    log::info!("Overloading {key}: '{old}' -> '{coerced}'");
                    section.insert(key.clone(), coerced);
                    matched = true;
                }
            }
            if matched {
                consumed.push(key.clone());
            }
        }

        for key in consumed {
            self.pending.remove(&key);
        }
        Ok(())
    }

    /// After all applicable configs were processed, any override that never
    /// matched a real key is a user error.
    pub fn check_unconsumed(&self) -> crate::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        Err(BenchError::OverrideError {
            unconsumed: self
                .pending
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::OverloadEngine;
    use crate::Map;
    use crate::common::error::BenchError;
    use crate::config::testutil::profile;
    use crate::config::value::CfgValue;

    fn overrides(pairs: &[(&str, &str)]) -> OverloadEngine {
        OverloadEngine::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Map<_, _>>(),
        )
    }

    #[test]
    fn test_int_coercion_and_consumption() {
        let mut cfg = profile("[runtime]\nnodes = 2\n");
        let mut engine = overrides(&[("nodes", "4")]);
        engine.apply(&mut cfg).unwrap();

        assert_eq!(cfg.get("runtime", "nodes"), Some(&CfgValue::Int(4)));
        assert!(engine.is_empty());
        assert!(engine.check_unconsumed().is_ok());
    }

    #[test]
    fn test_bool_accepts_literal_true_only() {
        let mut cfg = profile("[config]\ncollect_stats = False\n");
        let mut engine = overrides(&[("collect_stats", "True")]);
        engine.apply(&mut cfg).unwrap();
        assert_eq!(cfg.get("config", "collect_stats"), Some(&CfgValue::Bool(true)));

        let mut cfg = profile("[config]\ncollect_stats = True\n");
        let mut engine = overrides(&[("collect_stats", "yes")]);
        engine.apply(&mut cfg).unwrap();
        assert_eq!(
            cfg.get("config", "collect_stats"),
            Some(&CfgValue::Bool(false))
        );
    }

    #[test]
    fn test_coercion_failure_is_fatal_and_names_key() {
        let mut cfg = profile("[runtime]\nnodes = 2\n");
        let mut engine = overrides(&[("nodes", "four")]);
        match engine.apply(&mut cfg) {
            Err(BenchError::ConfigError(message)) => assert!(message.contains("nodes")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_key_in_multiple_sections_gets_same_value() {
        let mut cfg = profile("[build]\nthreads = 1\n[runtime]\nthreads = 8\n");
        let mut engine = overrides(&[("threads", "4")]);
        engine.apply(&mut cfg).unwrap();

        assert_eq!(cfg.get("build", "threads"), Some(&CfgValue::Int(4)));
        assert_eq!(cfg.get("runtime", "threads"), Some(&CfgValue::Int(4)));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut cfg = profile("[runtime]\nnodes = 2\n");
        let mut engine = overrides(&[("nodes", "4")]);
        engine.apply(&mut cfg).unwrap();
        let snapshot = cfg.get("runtime", "nodes").cloned();
        engine.apply(&mut cfg).unwrap();
        assert_eq!(cfg.get("runtime", "nodes").cloned(), snapshot);
    }

    #[test]
    fn test_unconsumed_override_is_error() {
        let mut cfg = profile("[runtime]\nnodes = 2\n");
        let mut engine = overrides(&[("unused_key", "x")]);
        engine.apply(&mut cfg).unwrap();

        match engine.check_unconsumed() {
            Err(BenchError::OverrideError { unconsumed }) => {
                assert_eq!(
                    unconsumed,
                    vec![("unused_key".to_string(), "x".to_string())]
                );
            }
            other => panic!("expected override error, got {other:?}"),
        }
    }
}
