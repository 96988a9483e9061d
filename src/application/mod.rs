//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（ChatPlatform、SpeechEngine、AudioTranscoder、宿主回调）
//! - services: 会话管理、语音渲染、出站写入
//! - bot: 宿主应用使用的门面
//! - error: 应用层错误定义

pub mod bot;
pub mod error;
pub mod ports;
pub mod services;

// Re-exports
pub use bot::{BotOptions, HostHooks, TtsBot, DEFAULT_ACTIVITY};
pub use error::RelayError;
pub use ports::{
    AudioTranscoderPort, ChatPlatformPort, GuildInfo, InboundMessage, LogSink, PlatformError,
    PlatformEvent, ReadyListener, SettingsProvider, SpeechEnginePort, SynthesisRequest,
    TranscodeError, TtsError, VoiceChannelInfo, VoiceConnectionPort,
};
pub use services::{
    AudioSinkWriter, JoinOutcome, SessionHandle, SessionManager, SinkConfig, SpeechRenderer,
};
