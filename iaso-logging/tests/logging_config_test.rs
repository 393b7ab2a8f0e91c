use iaso_logging::{
    build_env_filter, init_logging_from_config, init_simple_tracing, LogFormat, LogLevel,
    LoggingConfig,
};

#[test]
fn test_logging_config_integration() {
    let yaml_config = r#"
level: debug
format: json
directives:
  - iaso_caching=trace
include_location: true
"#;

    let config: LoggingConfig = serde_yaml::from_str(yaml_config).unwrap();

    assert_eq!(config.level, LogLevel::Debug);
    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.filter_directives(), "debug,iaso_caching=trace");

    init_logging_from_config(&config).unwrap();

    // A second initialisation is a no-op, not an error
    init_logging_from_config(&config).unwrap();
    init_simple_tracing("info").unwrap();
}

#[test]
fn test_minimal_logging_config() {
    let config = LoggingConfig::default();

    assert_eq!(config.level, LogLevel::Info);
    assert_eq!(config.format, LogFormat::Text);
    assert!(config.directives.is_empty());
    assert!(build_env_filter(&config).to_string().contains("info"));
}
