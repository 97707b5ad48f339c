use creative_proxy::config::*;
use figment::Jail;

// Helper function to create a valid config for testing
fn create_valid_config() -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.providers.bfl.api_key = Some("bfl-test-key".to_string());
    config.providers.bfl.api_base = Some("https://api.bfl.test".to_string());
    config
}

#[test]
fn test_config_validation_valid() {
    assert!(create_valid_config().validate().is_ok());
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_missing_credentials_are_not_a_startup_error() {
    let config = Config::default();
    assert!(config.providers.iter().all(|(_, detail)| detail.api_key().is_none()));
    assert!(config.validate().is_ok());
}

#[test]
fn test_server_config_validation() {
    let mut config = create_valid_config();
    config.server.port = 0;
    assert!(config.validate().is_err());

    let mut config = create_valid_config();
    config.server.request_timeout_seconds = 301;
    let err = config.validate().unwrap_err();
    assert!(format!("{:#}", err).contains("cannot exceed 300 seconds"));

    let mut config = create_valid_config();
    config.server.host = String::new();
    assert!(config.validate().is_err());
}

#[test]
fn test_provider_config_validation() {
    let mut detail = ProviderDetail::default();
    assert!(detail.validate().is_ok());

    detail.api_base = Some("ftp://api.example.com".to_string());
    assert!(detail.validate().is_err());

    let mut detail = ProviderDetail::default();
    detail.poll_interval_seconds = Some(10);
    detail.poll_timeout_seconds = Some(10);
    let err = detail.validate().unwrap_err();
    assert!(err.to_string().contains("shorter than poll timeout"));

    let mut detail = ProviderDetail::default();
    detail.poll_interval_seconds = Some(0);
    assert!(detail.validate().is_err());

    let mut detail = ProviderDetail::default();
    detail.timeout_seconds = 0;
    assert!(detail.validate().is_err());
}

#[test]
fn test_poll_window_uses_provider_defaults() {
    // Interval alone against BFL's 180s default ceiling
    let mut config = create_valid_config();
    config.providers.bfl.poll_interval_seconds = Some(600);
    let err = config.validate().unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("Provider 'bfl'"));
    assert!(message.contains("Poll interval (600s) must be shorter than poll timeout (180s)"));

    // Timeout alone against Seedance's 10s default interval
    let mut config = create_valid_config();
    config.providers.seedance.poll_timeout_seconds = Some(5);
    let err = config.validate().unwrap_err();
    assert!(format!("{:#}", err).contains("Provider 'seedance'"));

    // Image providers never poll
    let mut config = create_valid_config();
    config.providers.gemini.poll_interval_seconds = Some(600);
    assert!(config.validate().is_ok());

    let mut config = create_valid_config();
    config.providers.runway.poll_interval_seconds = Some(30);
    assert!(config.validate().is_ok());

    assert_eq!(ProvidersConfig::default_poll_window("bfl"), Some((3, 180)));
    assert_eq!(ProvidersConfig::default_poll_window("ideogram"), None);
}

#[test]
fn test_provider_validation_error_names_provider() {
    let mut config = create_valid_config();
    config.providers.runway.api_base = Some("runway.local".to_string());
    let err = config.validate().unwrap_err();
    assert!(format!("{:#}", err).contains("Provider 'runway'"));
}

#[test]
fn test_logging_and_security_validation() {
    let mut config = create_valid_config();
    config.logging.level = "verbose".to_string();
    assert!(config.validate().is_err());

    let mut config = create_valid_config();
    config.logging.format = "xml".to_string();
    assert!(config.validate().is_err());

    let mut config = create_valid_config();
    config.security.allowed_origins = vec!["app.example.com".to_string()];
    assert!(config.validate().is_err());

    config.security.allowed_origins = vec!["*".to_string(), "https://app.example.com".to_string()];
    assert!(config.validate().is_ok());
}

#[test]
fn test_provider_detail_helpers() {
    let mut detail = ProviderDetail::default();
    assert_eq!(detail.base_url("https://api.default.com/"), "https://api.default.com");
    assert_eq!(detail.model_or("default-model"), "default-model");

    detail.api_base = Some("http://127.0.0.1:9000/".to_string());
    detail.model = Some("custom".to_string());
    detail.api_key = Some("  ".to_string());
    assert_eq!(detail.base_url("https://api.default.com"), "http://127.0.0.1:9000");
    assert_eq!(detail.model_or("default-model"), "custom");
    assert!(detail.api_key().is_none());
}

#[test]
fn test_stripe_defaults() {
    let stripe = StripeConfig::default();
    assert_eq!(stripe.base_url(), "https://api.stripe.com");
    assert_eq!(stripe.webhook_tolerance_seconds, 300);
    assert!(stripe.secret_key().is_none());
    assert!(stripe.webhook_secret().is_none());
}

#[test]
fn test_load_config_defaults_without_file() {
    Jail::expect_with(|_jail| {
        let config = load_config("missing.toml").map_err(|e| e.to_string())?;
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.logging.format, "json");
        assert!(config.providers.gemini.enabled);
        Ok(())
    });
}

#[test]
fn test_load_config_from_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [server]
            host = "127.0.0.1"
            port = 8088

            [providers.bfl]
            api_key = "file-key"
            poll_interval_seconds = 2
            poll_timeout_seconds = 60

            [providers.recraft]
            enabled = false

            [logging]
            level = "debug"
            format = "pretty"
            "#,
        )?;

        let config = load_config("config.toml").map_err(|e| e.to_string())?;
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.providers.bfl.api_key(), Some("file-key"));
        assert_eq!(config.providers.bfl.poll_interval_seconds, Some(2));
        assert!(!config.providers.recraft.enabled);
        assert_eq!(config.logging.level, "debug");
        Ok(())
    });
}

#[test]
fn test_environment_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [server]
            port = 8088

            [providers.bfl]
            api_key = "file-key"
            "#,
        )?;
        jail.set_env("CREATIVE_PROXY_SERVER__PORT", "9090");
        jail.set_env("BFL_API_KEY", "env-key");
        jail.set_env("ARK_API_KEY", "ark-key");
        jail.set_env("RUNWAY_API_BASE", "http://127.0.0.1:7000");
        jail.set_env("STRIPE_WEBHOOK_SECRET", "whsec_env");

        let config = load_config("config.toml").map_err(|e| e.to_string())?;
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.providers.bfl.api_key(), Some("env-key"));
        assert_eq!(config.providers.seedance.api_key(), Some("ark-key"));
        assert_eq!(
            config.providers.runway.base_url("https://api.dev.runwayml.com"),
            "http://127.0.0.1:7000"
        );
        assert_eq!(config.stripe.webhook_secret(), Some("whsec_env"));
        Ok(())
    });
}

#[test]
fn test_invalid_file_fails_validation() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [providers.seedance]
            poll_interval_seconds = 30
            poll_timeout_seconds = 10
            "#,
        )?;

        let err = load_config("config.toml").unwrap_err();
        assert!(format!("{:#}", err).contains("validation failed"));
        Ok(())
    });
}
