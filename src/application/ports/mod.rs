//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层、宿主应用之间的抽象接口

mod audio_transcoder;
mod chat_platform;
mod host;
mod speech_engine;

pub use audio_transcoder::{AudioTranscoderPort, TranscodeError};
pub use chat_platform::{
    AuthorKind, ChannelContext, ChatPlatformPort, GuildInfo, InboundMessage, LogRecord,
    PcmStream, PlatformError, PlatformEvent, VoiceChannelInfo, VoiceConnectionPort,
};
pub use host::{LogSink, ReadyListener, SettingsProvider};
pub use speech_engine::{SpeechEnginePort, SynthesisRequest, TtsError};
