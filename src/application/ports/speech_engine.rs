//! Speech Engine Port - 语音合成引擎抽象
//!
//! 定义 TTS 合成的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::audio::PcmBuffer;
use crate::domain::speech::EngineParams;

/// TTS 错误
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Voice not found: {0}")]
    VoiceNotFound(String),
}

/// 合成请求（引擎原生参数）
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub params: EngineParams,
}

/// Speech Engine Port
///
/// 合成不持有共享可变状态，可并发调用
#[async_trait]
pub trait SpeechEnginePort: Send + Sync {
    /// 已安装的音色
    async fn installed_voices(&self) -> Result<Vec<String>, TtsError>;

    /// 合成 PCM 音频，输出格式由引擎决定
    async fn synthesize(&self, request: SynthesisRequest) -> Result<PcmBuffer, TtsError>;
}
