//! Audio Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("无效的 PCM 格式: {0}")]
    InvalidFormat(String),

    #[error("无效的 WAV 数据: {0}")]
    InvalidWav(String),

    #[error("不支持的样本编码: {0}")]
    UnsupportedEncoding(String),
}
