//! `ModManifest`: a human-authored TOML sidecar describing a mod's identity
//! and dependency pins, carried alongside the binary symbol file.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl ModManifest {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        toml::from_str(&text).map_err(|source| ConfigError::Toml { path: path.display().to_string(), source })
    }

    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("ModManifest always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let manifest = ModManifest {
            name: "my_mod".into(),
            version: "1.2.3".into(),
            author: Some("a modder".into()),
            dependencies: BTreeMap::from([("base_game".to_string(), "1.0.0".to_string())]),
        };
        let text = manifest.to_toml_string();
        let parsed: ModManifest = toml::from_str(&text).unwrap();
        assert_eq!(parsed.name, "my_mod");
        assert_eq!(parsed.dependencies.get("base_game"), Some(&"1.0.0".to_string()));
    }
}
