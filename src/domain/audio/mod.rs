//! Audio Context - 音频限界上下文
//!
//! 职责:
//! - PCM 格式与缓冲的值对象
//! - 语音传输线路格式（48 kHz / 16 位 / 立体声）
//! - WAV 容器解析

mod errors;
mod value_objects;

#[cfg(test)]
pub(crate) mod test_support;

pub use errors::AudioError;
pub use value_objects::{
    PcmBuffer, PcmFormat, SampleEncoding, WIRE_CHANNELS, WIRE_SAMPLE_RATE,
};
