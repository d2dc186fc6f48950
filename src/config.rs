use std::fs;

use anyhow::Context;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

/// Tuning knobs for a [`crate::Store`]. Everything has a sensible default;
/// deployments override the fields they care about from a TOML file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreOptions {
    /// Default page size for paginated queries that do not specify one.
    pub page_limit: i64,
    pub warning_min_molarity: f64,
    pub warning_max_molarity: f64,
    pub error_min_molarity: f64,
    pub error_max_molarity: f64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            page_limit: 15,
            warning_min_molarity: 1.0,
            warning_max_molarity: 5.0,
            error_min_molarity: 0.5,
            error_max_molarity: 10.0,
        }
    }
}

impl StoreOptions {
    /// # Errors
    /// Fails when the file cannot be read or is not valid TOML.
    pub fn from_toml_path(path: &Utf8Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path).context(format!("failed to read options from {path}"))?;

        Ok(toml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let options: StoreOptions = toml::from_str("page_limit = 50").unwrap();

        assert_eq!(options.page_limit, 50);
        assert_eq!(options.error_max_molarity, StoreOptions::default().error_max_molarity);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<StoreOptions>("page_limmit = 50").is_err());
    }
}
