//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, EngineKind};
use crate::domain::speech::USER_SCALE_MAX;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 环境变量前缀
const ENV_PREFIX: &str = "TTS_RELAY";

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `TTS_RELAY_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `TTS_RELAY_BOT__TOKEN=...`
/// - `TTS_RELAY_TTS__ENGINE=fake`
/// - `TTS_RELAY_TTS__URL=http://tts-server:8000`
/// - `TTS_RELAY_LOCAL__OUTPUT_DIR=data/voice`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("bot.token", "")?
        .set_default("bot.activity", "Mashiro")?
        .set_default("tts.engine", "http")?
        .set_default("tts.url", "http://localhost:8000")?
        .set_default("tts.timeout_secs", 30)?
        .set_default("tts.voice", "Haruka")?
        .set_default("tts.volume", 10)?
        .set_default("tts.speed", 10)?
        .set_default("audio.sink_buffer_bytes", 128 * 1024)?
        .set_default("audio.frame_bytes", 3840)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: TTS_RELAY_TTS__URL=http://tts-server:8000
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.tts.engine == EngineKind::Http && config.tts.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "TTS URL cannot be empty".to_string(),
        ));
    }

    if config.audio.sink_buffer_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "Sink buffer size cannot be 0".to_string(),
        ));
    }

    if config.audio.frame_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "Frame size cannot be 0".to_string(),
        ));
    }

    let scale = 0..=USER_SCALE_MAX;
    if !scale.contains(&config.tts.volume) {
        return Err(ConfigError::ValidationError(format!(
            "Default volume must be within 0..={}, got {}",
            USER_SCALE_MAX, config.tts.volume
        )));
    }
    if !scale.contains(&config.tts.speed) {
        return Err(ConfigError::ValidationError(format!(
            "Default speed must be within 0..={}, got {}",
            USER_SCALE_MAX, config.tts.speed
        )));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Bot Token: {}", if config.bot.token.is_empty() { "<unset>" } else { "<set>" });
    tracing::info!("Bot Activity: {}", config.bot.activity);
    tracing::info!("TTS Engine: {}", config.tts.engine);
    if config.tts.engine == EngineKind::Http {
        tracing::info!("TTS URL: {}", config.tts.url);
        tracing::info!("TTS Timeout: {}s", config.tts.timeout_secs);
    }
    tracing::info!(
        "TTS Defaults: voice={} volume={} speed={}",
        config.tts.voice,
        config.tts.volume,
        config.tts.speed
    );
    tracing::info!("Sink Buffer: {} bytes", config.audio.sink_buffer_bytes);
    tracing::info!("Frame Size: {} bytes", config.audio.frame_bytes);
    match &config.local.output_dir {
        Some(dir) => tracing::info!("Voice Output: {:?}", dir),
        None => tracing::info!("Voice Output: discarded"),
    }
    tracing::info!("Guilds: {}", config.local.guilds.len());
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
