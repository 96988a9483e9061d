//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

use crate::application::bot::{BotOptions, DEFAULT_ACTIVITY};
use crate::application::ports::{GuildInfo, VoiceChannelInfo};
use crate::application::services::{SinkConfig, DEFAULT_FRAME_BYTES, DEFAULT_SINK_BUFFER_BYTES};
use crate::domain::speech::TtsSettings;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 机器人配置
    #[serde(default)]
    pub bot: BotConfig,

    /// TTS 引擎配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 出站音频配置
    #[serde(default)]
    pub audio: AudioConfig,

    /// 本地平台配置
    #[serde(default)]
    pub local: LocalConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// 机器人选项
    pub fn bot_options(&self) -> BotOptions {
        BotOptions {
            activity: self.bot.activity.clone(),
            sink: self.audio.sink_config(),
        }
    }
}

/// 机器人配置
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// 登录令牌
    #[serde(default)]
    pub token: String,

    /// 就绪后显示的“正在玩”状态
    #[serde(default = "default_activity")]
    pub activity: String,
}

fn default_activity() -> String {
    DEFAULT_ACTIVITY.to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            activity: default_activity(),
        }
    }
}

/// 合成引擎类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// 外部 HTTP 合成服务
    #[default]
    Http,
    /// 离线正弦音引擎
    Fake,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Http => write!(f, "http"),
            EngineKind::Fake => write!(f, "fake"),
        }
    }
}

/// TTS 引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub engine: EngineKind,

    /// TTS 服务基础 URL
    #[serde(default = "default_tts_url")]
    pub url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,

    /// 默认音色
    #[serde(default = "default_voice")]
    pub voice: String,

    /// 默认音量（0..=20）
    #[serde(default = "default_scale")]
    pub volume: i32,

    /// 默认语速（0..=20，10 为正常语速）
    #[serde(default = "default_scale")]
    pub speed: i32,
}

fn default_tts_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_tts_timeout() -> u64 {
    30
}

fn default_voice() -> String {
    "Haruka".to_string()
}

fn default_scale() -> i32 {
    10
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            url: default_tts_url(),
            timeout_secs: default_tts_timeout(),
            voice: default_voice(),
            volume: default_scale(),
            speed: default_scale(),
        }
    }
}

impl TtsConfig {
    /// 初始 TTS 设置
    pub fn settings(&self) -> TtsSettings {
        TtsSettings::new(self.voice.clone(), self.volume, self.speed)
    }
}

/// 出站音频配置
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// 出站流缓冲区大小（字节）
    #[serde(default = "default_sink_buffer")]
    pub sink_buffer_bytes: usize,

    /// 单次写入大小（字节）
    #[serde(default = "default_frame_bytes")]
    pub frame_bytes: usize,
}

fn default_sink_buffer() -> usize {
    DEFAULT_SINK_BUFFER_BYTES
}

fn default_frame_bytes() -> usize {
    DEFAULT_FRAME_BYTES
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sink_buffer_bytes: default_sink_buffer(),
            frame_bytes: default_frame_bytes(),
        }
    }
}

impl AudioConfig {
    pub fn sink_config(&self) -> SinkConfig {
        SinkConfig {
            buffer_bytes: self.sink_buffer_bytes,
            frame_bytes: self.frame_bytes,
        }
    }
}

/// 本地平台配置
#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    /// 语音输出目录，未设置时丢弃音频
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// 服务器名册
    #[serde(default = "default_guilds")]
    pub guilds: Vec<GuildInfo>,
}

fn default_guilds() -> Vec<GuildInfo> {
    vec![GuildInfo {
        id: 1,
        name: "Local".to_string(),
        voice_channels: vec![
            VoiceChannelInfo {
                id: 100,
                name: "General".to_string(),
                position: 0,
            },
            VoiceChannelInfo {
                id: 101,
                name: "Music".to_string(),
                position: 1,
            },
        ],
    }]
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            guilds: default_guilds(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
