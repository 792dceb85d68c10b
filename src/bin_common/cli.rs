//! Config path resolution for binaries

use std::path::PathBuf;

/// Which configuration file to resolve
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Scanner configuration (config/scanner.yaml)
    Scanner,
    /// Explicit path
    Custom(String),
}

impl ConfigType {
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Scanner => "config/scanner.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    pub fn env_var_name(&self) -> &str {
        match self {
            ConfigType::Scanner => "SCANNER_CONFIG_PATH",
            ConfigType::Custom(_) => "CONFIG_PATH",
        }
    }
}

/// Config path from the type's environment variable, or its default
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Command line arguments without the program name
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_type_paths() {
        assert_eq!(ConfigType::Scanner.default_path(), "config/scanner.yaml");
        let custom = ConfigType::Custom("custom/path.yaml".to_string());
        assert_eq!(custom.default_path(), "custom/path.yaml");
    }

    #[test]
    fn test_config_type_env_vars() {
        assert_eq!(ConfigType::Scanner.env_var_name(), "SCANNER_CONFIG_PATH");
        assert_eq!(
            ConfigType::Custom(String::new()).env_var_name(),
            "CONFIG_PATH"
        );
    }
}
