//! Generation options.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenConfig {
    /// Render every numeric scalar as a string on the wire.
    pub number_as_string: bool,
    /// Skip functions whose types cannot be resolved instead of failing.
    pub skip_missing_table_of: bool,
    /// Collection cap used when a function carries no override.
    pub max_table_size: u32,
    /// Comment prefixes that introduce directives (`procgen:rename a => b`).
    pub markers: Vec<String>,
    /// Concurrent catalog lookups.
    pub workers: usize,
    /// Overall deadline of the gather phase.
    pub deadline_secs: u64,
    /// Package of the generated IDL schema.
    pub idl_package: String,
}

impl Default for GenConfig {
    fn default() -> Self {
        GenConfig {
            number_as_string: false,
            skip_missing_table_of: true,
            max_table_size: 1000,
            markers: vec!["procgen".to_string()],
            workers: 8,
            deadline_secs: 30,
            idl_package: "procgen".to_string(),
        }
    }
}

impl GenConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn is_marker(&self, word: &str) -> bool {
        self.markers.iter().any(|m| m.eq_ignore_ascii_case(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = GenConfig::from_json(r#"{"number_as_string": true, "workers": 2}"#)
            .expect("config");
        assert!(cfg.number_as_string);
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.max_table_size, 1000);
        assert!(cfg.is_marker("PROCGEN"));
    }
}
