use clap::Parser;
use creative_proxy::{load_config, start_server, AppError};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Creative generation proxy
#[derive(Parser, Debug)]
#[command(name = "creative-proxy", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Override server.host
    #[arg(long)]
    host: Option<String>,

    /// Override server.port
    #[arg(long)]
    port: Option<u16>,
}

/// 主函数 - 创意生成代理服务的入口点
///
/// 负责加载配置、初始化日志系统并启动HTTP服务器
#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    // 加载配置文件和环境变量配置
    let mut config = load_config(&cli.config)
        .map_err(|e| AppError::ConfigError(format!("加载配置失败: {:#}", e)))?;

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // 初始化结构化日志系统
    init_tracing(&config.logging.level, &config.logging.format)?;

    let configured: Vec<&str> = config
        .providers
        .iter()
        .filter(|(_, detail)| detail.enabled && detail.api_key().is_some())
        .map(|(name, _)| name)
        .collect();

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        configured_providers = ?configured,
        stripe = config.stripe.secret_key().is_some(),
        "Configuration loaded successfully"
    );

    // 启动HTTP服务器，监听指定地址和端口
    start_server(config).await?;

    Ok(())
}

/// 初始化结构化日志系统
///
/// RUST_LOG优先；未设置时使用配置的日志级别。
/// 输出格式由logging.format决定：json、pretty或compact。
fn init_tracing(level: &str, format: &str) -> Result<(), AppError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("creative_proxy={},tower_http=debug", level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        "pretty" => registry.with(fmt::layer().pretty()).try_init(),
        "compact" => registry.with(fmt::layer().compact().with_target(false)).try_init(),
        _ => registry
            .with(fmt::layer().json().with_current_span(true).with_file(true).with_line_number(true))
            .try_init(),
    };

    result.map_err(|e| AppError::ConfigError(format!("Failed to initialize tracing: {}", e)))?;

    tracing::info!(log_format = format, "Structured logging system initialized");
    Ok(())
}
