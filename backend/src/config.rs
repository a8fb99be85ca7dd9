//! Backend configuration, deserialized from editor settings.

use std::path::PathBuf;

use serde::Deserialize;

/// Configuration for the ghc-mod backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    /// Extra directories prepended to `PATH` when resolving tools.
    #[serde(default)]
    pub add_to_path: Vec<PathBuf>,
    /// Also prepend the standard install locations
    /// (`~/.local/bin`, `~/.cabal/bin`).
    #[serde(default)]
    pub add_standard_dirs: bool,
    /// GHC options passed through to every session (each becomes a
    /// `-g <opt>` pair on the ghc-mod command line).
    #[serde(default)]
    pub ghc_opts: Vec<String>,
    /// Cabal sandbox directory to scan for package databases.
    #[serde(default)]
    pub sandbox: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_empty() {
        let config: BackendConfig = serde_json::from_str("{}").unwrap();
        assert!(config.add_to_path.is_empty());
        assert!(!config.add_standard_dirs);
        assert!(config.ghc_opts.is_empty());
        assert!(config.sandbox.is_none());
    }

    #[test]
    fn deserializes_all_fields() {
        let config: BackendConfig = serde_json::from_value(serde_json::json!({
            "add_to_path": ["/opt/ghc/bin"],
            "add_standard_dirs": true,
            "ghc_opts": ["-Wall"],
            "sandbox": "/proj/.cabal-sandbox"
        }))
        .unwrap();
        assert_eq!(config.add_to_path, vec![PathBuf::from("/opt/ghc/bin")]);
        assert!(config.add_standard_dirs);
        assert_eq!(config.ghc_opts, vec!["-Wall".to_string()]);
        assert_eq!(config.sandbox, Some(PathBuf::from("/proj/.cabal-sandbox")));
    }
}
