//! 应用层错误定义
//!
//! 语音管线统一的错误类型

use thiserror::Error;

use crate::application::ports::{PlatformError, TranscodeError, TtsError};

/// 语音管线错误
#[derive(Debug, Error)]
pub enum RelayError {
    /// 登录/启动失败
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// 加入语音频道失败
    #[error("Channel join error: {0}")]
    ChannelJoinError(String),

    /// 请求的音色未安装
    #[error("Voice not found: {0}")]
    VoiceNotFound(String),

    /// 合成引擎失败
    #[error("Synthesis error: {0}")]
    SynthesisError(String),

    /// 音频文件无法读取或解码
    #[error("Audio decode error: {0}")]
    AudioDecodeError(String),

    /// 出站流写入失败（包括写入过程中流被关闭）
    #[error("Stream write error: {0}")]
    StreamWriteError(String),

    /// 没有已连接的语音会话
    #[error("Not connected to a voice channel")]
    NotConnected,

    /// 平台调用失败
    #[error("Platform error: {0}")]
    PlatformError(String),
}

impl RelayError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionError(message.into())
    }

    pub fn join(message: impl Into<String>) -> Self {
        Self::ChannelJoinError(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::AudioDecodeError(message.into())
    }

    pub fn stream_write(message: impl Into<String>) -> Self {
        Self::StreamWriteError(message.into())
    }
}

impl From<TtsError> for RelayError {
    fn from(err: TtsError) -> Self {
        match err {
            TtsError::VoiceNotFound(voice) => Self::VoiceNotFound(voice),
            other => Self::SynthesisError(other.to_string()),
        }
    }
}

impl From<TranscodeError> for RelayError {
    fn from(err: TranscodeError) -> Self {
        Self::AudioDecodeError(err.to_string())
    }
}

impl From<PlatformError> for RelayError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotConnected => Self::NotConnected,
            other => Self::PlatformError(other.to_string()),
        }
    }
}
