use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Workflow variables available for `${name}` substitution in queries.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct VariablesConfig {
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

impl VariablesConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Load when a path is given, otherwise no variables.
    pub fn load_optional(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_variables_from_yaml() {
        let file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
        std::fs::write(
            file.path(),
            "variables:\n  limit: \"15\"\n  city: Utrecht\n",
        )
        .unwrap();

        let config = VariablesConfig::load(file.path()).unwrap();
        assert_eq!(config.variables.get("limit").map(String::as_str), Some("15"));
        assert_eq!(config.variables.get("city").map(String::as_str), Some("Utrecht"));
    }

    #[test]
    fn missing_path_yields_empty_variables() {
        let config = VariablesConfig::load_optional(None).unwrap();
        assert!(config.variables.is_empty());
    }
}
