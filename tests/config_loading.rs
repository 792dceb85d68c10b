//! Integration test: config path resolution and the shipped scanner config

use orderblock_scanner::bin_common::{load_config_from_env, ConfigType};
use orderblock_scanner::market_structure::{MitigationSource, OutputScope};
use orderblock_scanner::scanner::{ScannerConfig, TradingPair};
use std::env;

#[test]
fn test_scanner_config_default_path() {
    env::remove_var("SCANNER_CONFIG_PATH");

    let config_path = load_config_from_env(ConfigType::Scanner);
    assert_eq!(config_path.to_str().unwrap(), "config/scanner.yaml");
}

#[test]
fn test_custom_config() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    assert_eq!(custom.default_path(), "custom/path.yaml");
}

#[test]
fn test_shipped_config_parses() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/scanner.yaml");
    let contents = std::fs::read_to_string(path).unwrap();
    // Parsed without environment overrides
    let config = ScannerConfig::parse(&contents).unwrap();

    assert!(config.validate().is_ok());
    assert_eq!(config.workers.pool_size, 4);
    assert_eq!(config.buffer.retention, 500);
    assert_eq!(config.algorithm.swings_length, 50);
    assert_eq!(config.algorithm.mitigation, MitigationSource::HighLow);
    assert_eq!(config.algorithm.output_scope, OutputScope::Internal);
    assert_eq!(config.pairs[0], TradingPair::new("BTCUSDT", "1m"));
    assert_eq!(config.pairs.len(), 3);
}
