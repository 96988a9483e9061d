//! Speech Context - Value Objects

use serde::{Deserialize, Serialize};

/// 用户刻度上限（音量与语速均为 0..=20）
pub const USER_SCALE_MAX: i32 = 20;
/// 音量映射倍数
pub const VOLUME_MULTIPLIER: i32 = 5;
/// 语速中性值，映射到引擎语速 0
pub const NEUTRAL_SPEED: i32 = 10;
/// 引擎音量上限
pub const ENGINE_VOLUME_MAX: u8 = 100;
/// 引擎语速下限
pub const ENGINE_RATE_MIN: i8 = -10;
/// 引擎语速上限
pub const ENGINE_RATE_MAX: i8 = 10;

/// TTS 设置快照
///
/// 每次触发时从宿主读取，不做缓存
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtsSettings {
    pub voice: String,
    pub volume: i32,
    pub speed: i32,
}

impl TtsSettings {
    pub fn new(voice: impl Into<String>, volume: i32, speed: i32) -> Self {
        Self {
            voice: voice.into(),
            volume,
            speed,
        }
    }
}

/// 一次合成请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub volume: i32,
    pub speed: i32,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, settings: &TtsSettings) -> Self {
        Self {
            text: text.into(),
            voice: settings.voice.clone(),
            volume: settings.volume,
            speed: settings.speed,
        }
    }

    pub fn engine_params(&self) -> EngineParams {
        EngineParams::from_user_scale(self.volume, self.speed)
    }
}

/// 引擎原生参数
///
/// 不变量:
/// - volume 位于 0..=ENGINE_VOLUME_MAX
/// - rate 位于 ENGINE_RATE_MIN..=ENGINE_RATE_MAX
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineParams {
    pub volume: u8,
    pub rate: i8,
}

impl EngineParams {
    /// volume × 5、speed − 10，超出引擎范围时截断
    pub fn from_user_scale(volume: i32, speed: i32) -> Self {
        let volume = volume
            .saturating_mul(VOLUME_MULTIPLIER)
            .clamp(0, ENGINE_VOLUME_MAX as i32) as u8;
        let rate = speed
            .saturating_sub(NEUTRAL_SPEED)
            .clamp(ENGINE_RATE_MIN as i32, ENGINE_RATE_MAX as i32) as i8;
        Self { volume, rate }
    }
}
