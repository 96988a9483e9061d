//! Speech Context - 语音合成限界上下文
//!
//! 职责:
//! - 合成请求与用户侧设置
//! - 用户刻度（0-20）到引擎原生刻度的映射

mod value_objects;

pub use value_objects::{
    EngineParams, SpeechRequest, TtsSettings, ENGINE_RATE_MAX, ENGINE_RATE_MIN,
    ENGINE_VOLUME_MAX, NEUTRAL_SPEED, USER_SCALE_MAX, VOLUME_MULTIPLIER,
};
