use serde::{Deserialize, Serialize};
use figment::{Figment, providers::{Format, Toml, Env}};
use std::path::Path;
use anyhow::Context;

use crate::errors::AnyhowResult;

/// 主配置结构体
///
/// 包含代理服务的所有配置信息，从配置文件和环境变量加载。
/// 所有字段都有默认值，缺少提供商密钥不会导致启动失败，
/// 而是在请求到达对应路由时返回配置错误。
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 生成类提供商配置
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// 支付配置
    #[serde(default)]
    pub stripe: StripeConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 安全配置
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_request_size")]
    pub max_request_size_bytes: usize,
}

/// Per-provider settings. Every provider section has the same shape.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ProviderDetail {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub poll_interval_seconds: Option<u64>,
    #[serde(default)]
    pub poll_timeout_seconds: Option<u64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gemini: ProviderDetail,
    #[serde(default)]
    pub bfl: ProviderDetail,
    #[serde(default)]
    pub ideogram: ProviderDetail,
    #[serde(default)]
    pub recraft: ProviderDetail,
    #[serde(default)]
    pub runway: ProviderDetail,
    #[serde(default)]
    pub seedance: ProviderDetail,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct StripeConfig {
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_seconds: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SecurityConfig {
    #[serde(default = "default_cors_enabled")]
    pub cors_enabled: bool,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3000 }
fn default_request_timeout() -> u64 { 150 } // above the 120s provider default
fn default_max_request_size() -> usize { 10 * 1024 * 1024 } // 10MB, reference images arrive inline
fn default_provider_timeout() -> u64 { 120 }
fn default_enabled() -> bool { true }
fn default_webhook_tolerance() -> u64 { 300 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }
fn default_cors_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            max_request_size_bytes: default_max_request_size(),
        }
    }
}

impl Default for ProviderDetail {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            model: None,
            timeout_seconds: default_provider_timeout(),
            poll_interval_seconds: None,
            poll_timeout_seconds: None,
            enabled: default_enabled(),
        }
    }
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            api_base: None,
            webhook_tolerance_seconds: default_webhook_tolerance(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_enabled: default_cors_enabled(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Well-known credential and base-URL variables mapped onto config paths
const WELL_KNOWN_ENV: &[(&str, &str)] = &[
    ("GEMINI_API_KEY", "providers.gemini.api_key"),
    ("GEMINI_API_BASE", "providers.gemini.api_base"),
    ("BFL_API_KEY", "providers.bfl.api_key"),
    ("BFL_API_BASE", "providers.bfl.api_base"),
    ("IDEOGRAM_API_KEY", "providers.ideogram.api_key"),
    ("IDEOGRAM_API_BASE", "providers.ideogram.api_base"),
    ("RECRAFT_API_KEY", "providers.recraft.api_key"),
    ("RECRAFT_API_BASE", "providers.recraft.api_base"),
    ("RUNWAY_API_KEY", "providers.runway.api_key"),
    ("RUNWAY_API_BASE", "providers.runway.api_base"),
    ("ARK_API_KEY", "providers.seedance.api_key"),
    ("ARK_API_BASE", "providers.seedance.api_base"),
    ("STRIPE_SECRET_KEY", "stripe.secret_key"),
    ("STRIPE_WEBHOOK_SECRET", "stripe.webhook_secret"),
    ("STRIPE_API_BASE", "stripe.api_base"),
];

fn well_known_env() -> Env {
    Env::raw().filter_map(|key| {
        WELL_KNOWN_ENV
            .iter()
            .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
            .map(|(_, path)| (*path).into())
    })
}

/// 加载配置文件和环境变量
///
/// ## 功能说明
/// 按优先级合并配置源：配置文件 < `CREATIVE_PROXY_` 前缀环境变量 < 常用提供商环境变量
///
/// ## 内部实现逻辑
/// 1. 加载TOML配置文件（文件不存在时跳过）
/// 2. 加载以CREATIVE_PROXY_开头的环境变量，`__` 表示嵌套，例如
///    `CREATIVE_PROXY_SERVER__PORT=8080`
/// 3. 加载常用提供商变量（`BFL_API_KEY`、`STRIPE_SECRET_KEY` 等）
/// 4. 反序列化并调用validate()验证
///
/// ## 执行例子
/// ```rust,no_run
/// let config = creative_proxy::load_config("config.toml")?;
/// println!("Server will run on {}:{}", config.server.host, config.server.port);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config(path: impl AsRef<Path>) -> AnyhowResult<Config> {
    let path = path.as_ref();
    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("CREATIVE_PROXY_").split("__"))
        .merge(well_known_env())
        .extract()
        .with_context(|| format!("Failed to load configuration from {} or environment variables", path.display()))?;

    config.validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

impl Config {
    /// 验证整个配置的有效性
    ///
    /// ## 返回值
    /// - `Ok(())`: 配置验证通过
    /// - `Err(anyhow::Error)`: 配置验证失败，包含详细错误信息
    pub fn validate(&self) -> AnyhowResult<()> {
        self.server.validate()
            .context("Server configuration validation failed")?;

        for (name, provider) in self.providers.iter() {
            provider.validate()
                .with_context(|| format!("Provider '{}' configuration validation failed", name))?;

            if let Some((interval, timeout)) = ProvidersConfig::default_poll_window(name) {
                provider.validate_poll_window(interval, timeout)
                    .with_context(|| format!("Provider '{}' configuration validation failed", name))?;
            }
        }

        self.stripe.validate()
            .context("Stripe configuration validation failed")?;

        self.logging.validate()
            .context("Logging configuration validation failed")?;

        self.security.validate()
            .context("Security configuration validation failed")?;

        Ok(())
    }
}

impl ServerConfig {
    /// 验证服务器配置参数
    ///
    /// ## 参数验证规则
    /// - `host`: 不能为空字符串
    /// - `port`: 必须大于0
    /// - `request_timeout_seconds`: 1-300秒之间
    /// - `max_request_size_bytes`: 1字节-100MB之间
    pub fn validate(&self) -> AnyhowResult<()> {
        if self.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }

        if self.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("Request timeout must be greater than 0"));
        }

        if self.request_timeout_seconds > 300 {
            return Err(anyhow::anyhow!("Request timeout cannot exceed 300 seconds"));
        }

        if self.max_request_size_bytes == 0 {
            return Err(anyhow::anyhow!("Max request size must be greater than 0"));
        }

        if self.max_request_size_bytes > 100 * 1024 * 1024 {
            return Err(anyhow::anyhow!("Max request size cannot exceed 100MB"));
        }

        Ok(())
    }
}

impl ProvidersConfig {
    /// Iterate `(provider id, detail)` pairs in a stable order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ProviderDetail)> {
        [
            ("gemini", &self.gemini),
            ("bfl", &self.bfl),
            ("ideogram", &self.ideogram),
            ("recraft", &self.recraft),
            ("runway", &self.runway),
            ("seedance", &self.seedance),
        ]
        .into_iter()
    }

    /// Default `(interval, timeout)` seconds for providers that poll
    pub fn default_poll_window(name: &str) -> Option<(u64, u64)> {
        use crate::providers::{bfl, runway, seedance};

        match name {
            "bfl" => Some((bfl::provider::DEFAULT_POLL_INTERVAL_SECS, bfl::provider::DEFAULT_POLL_TIMEOUT_SECS)),
            "runway" => Some((runway::provider::DEFAULT_POLL_INTERVAL_SECS, runway::provider::DEFAULT_POLL_TIMEOUT_SECS)),
            "seedance" => Some((seedance::provider::DEFAULT_POLL_INTERVAL_SECS, seedance::provider::DEFAULT_POLL_TIMEOUT_SECS)),
            _ => None,
        }
    }
}

impl ProviderDetail {
    /// The configured credential, treating blank values as absent
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Base URL without a trailing slash, falling back to the provider default
    pub fn base_url(&self, default_base: &str) -> String {
        self.api_base
            .as_deref()
            .map(str::trim)
            .filter(|base| !base.is_empty())
            .unwrap_or(default_base)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn model_or<'a>(&'a self, default_model: &'a str) -> &'a str {
        self.model
            .as_deref()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or(default_model)
    }

    /// 验证提供商配置参数
    ///
    /// ## 参数验证规则
    /// - `api_base`: 如果提供，必须以http://或https://开头
    /// - `timeout_seconds`: 1-600秒之间
    /// - `poll_interval_seconds`: 大于0，且小于轮询超时
    /// - `api_key`: 可以缺失，缺失时请求返回500
    pub fn validate(&self) -> AnyhowResult<()> {
        if let Some(base) = &self.api_base {
            if !base.starts_with("http://") && !base.starts_with("https://") {
                return Err(anyhow::anyhow!("Provider API base URL must start with http:// or https://"));
            }
        }

        if self.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("Provider timeout must be greater than 0"));
        }

        if self.timeout_seconds > 600 {
            return Err(anyhow::anyhow!("Provider timeout cannot exceed 600 seconds"));
        }

        if self.poll_interval_seconds == Some(0) {
            return Err(anyhow::anyhow!("Poll interval must be greater than 0"));
        }

        if self.poll_timeout_seconds == Some(0) {
            return Err(anyhow::anyhow!("Poll timeout must be greater than 0"));
        }

        if let (Some(interval), Some(timeout)) = (self.poll_interval_seconds, self.poll_timeout_seconds) {
            if interval >= timeout {
                return Err(anyhow::anyhow!("Poll interval must be shorter than poll timeout"));
            }
        }

        Ok(())
    }

    /// 轮询窗口校验：未配置的一侧取提供商默认值
    pub fn validate_poll_window(&self, default_interval: u64, default_timeout: u64) -> AnyhowResult<()> {
        let interval = self.poll_interval_seconds.unwrap_or(default_interval);
        let timeout = self.poll_timeout_seconds.unwrap_or(default_timeout);
        if interval >= timeout {
            return Err(anyhow::anyhow!(
                "Poll interval ({}s) must be shorter than poll timeout ({}s)",
                interval, timeout
            ));
        }
        Ok(())
    }
}

impl StripeConfig {
    pub fn secret_key(&self) -> Option<&str> {
        self.secret_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_deref()
            .map(str::trim)
            .filter(|secret| !secret.is_empty())
    }

    pub fn base_url(&self) -> String {
        self.api_base
            .as_deref()
            .unwrap_or("https://api.stripe.com")
            .trim_end_matches('/')
            .to_string()
    }

    pub fn validate(&self) -> AnyhowResult<()> {
        if let Some(base) = &self.api_base {
            if !base.starts_with("http://") && !base.starts_with("https://") {
                return Err(anyhow::anyhow!("Stripe API base URL must start with http:// or https://"));
            }
        }

        if self.webhook_tolerance_seconds == 0 {
            return Err(anyhow::anyhow!("Webhook tolerance must be greater than 0"));
        }

        Ok(())
    }
}

impl LoggingConfig {
    /// 验证日志配置参数
    ///
    /// - `level`: 必须是 "trace", "debug", "info", "warn", "error" 之一
    /// - `format`: 必须是 "json", "pretty", "compact" 之一
    pub fn validate(&self) -> AnyhowResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level '{}': must be one of {:?}",
                self.level, valid_levels
            ));
        }

        let valid_formats = ["json", "pretty", "compact"];
        if !valid_formats.contains(&self.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format '{}': must be one of {:?}",
                self.format, valid_formats
            ));
        }

        Ok(())
    }
}

impl SecurityConfig {
    pub fn validate(&self) -> AnyhowResult<()> {
        if self.cors_enabled {
            for origin in &self.allowed_origins {
                if origin.is_empty() {
                    return Err(anyhow::anyhow!("Allowed origin cannot be empty"));
                }

                if origin != "*" && !origin.starts_with("http://") && !origin.starts_with("https://") {
                    return Err(anyhow::anyhow!(
                        "Allowed origin '{}' must be '*' or start with http:// or https://",
                        origin
                    ));
                }
            }
        }

        Ok(())
    }
}
