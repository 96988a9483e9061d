//! Audio Transcoder Port - 音频转码抽象
//!
//! 把任意 PCM 或音频文件转换为语音线路格式（48 kHz / 16 位 / 立体声）

use thiserror::Error;

use crate::domain::audio::{AudioError, PcmBuffer};

/// 转码错误
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

impl From<AudioError> for TranscodeError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::UnsupportedEncoding(msg) => Self::UnsupportedFormat(msg),
            other => Self::InvalidInput(other.to_string()),
        }
    }
}

/// Audio Transcoder Port
///
/// 纯计算，不持有共享可变状态
pub trait AudioTranscoderPort: Send + Sync {
    /// 转换为线路格式；已是线路格式时原样返回
    fn to_wire_format(&self, buffer: PcmBuffer) -> Result<PcmBuffer, TranscodeError>;

    /// 解码完整的音频文件内容并转换为线路格式
    ///
    /// `extension` 为文件扩展名提示（如 "wav"）
    fn decode_to_wire_format(
        &self,
        data: &[u8],
        extension: Option<&str>,
    ) -> Result<PcmBuffer, TranscodeError>;
}
