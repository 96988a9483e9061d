//! Fake Speech Engine - 离线合成引擎
//!
//! 不调用真实 TTS 服务，按文本长度生成正弦音，用于测试和本地运行

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::application::ports::{SpeechEnginePort, SynthesisRequest, TtsError};
use crate::domain::audio::{PcmBuffer, PcmFormat, SampleEncoding};
use crate::domain::speech::ENGINE_VOLUME_MAX;

/// 保留的最近请求条数
const RECENT_REQUESTS: usize = 32;

/// Fake Speech Engine 配置
#[derive(Debug, Clone)]
pub struct FakeSpeechEngineConfig {
    /// 已安装的音色
    pub voices: Vec<String>,
    /// 输出采样率（单声道 16 位）
    pub sample_rate: u32,
    /// 正常语速下每个字符的时长（毫秒）
    pub ms_per_char: u64,
    /// 模拟合成延迟（毫秒）
    pub latency_ms: u64,
}

impl Default for FakeSpeechEngineConfig {
    fn default() -> Self {
        Self {
            voices: vec!["Haruka".to_string(), "Zira".to_string()],
            sample_rate: 22050,
            ms_per_char: 60,
            latency_ms: 0,
        }
    }
}

pub struct FakeSpeechEngine {
    config: FakeSpeechEngineConfig,
    requests: Mutex<VecDeque<SynthesisRequest>>,
}

impl FakeSpeechEngine {
    pub fn new(config: FakeSpeechEngineConfig) -> Self {
        tracing::info!(
            voices = ?config.voices,
            sample_rate = config.sample_rate,
            "FakeSpeechEngine initialized"
        );
        Self {
            config,
            requests: Mutex::new(VecDeque::with_capacity(RECENT_REQUESTS)),
        }
    }

    pub fn with_voices(voices: &[&str]) -> Self {
        Self::new(FakeSpeechEngineConfig {
            voices: voices.iter().map(|v| v.to_string()).collect(),
            ..Default::default()
        })
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.config.latency_ms = latency_ms;
        self
    }

    /// 最近收到的合成请求，按到达顺序，最多 RECENT_REQUESTS 条
    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests
            .lock()
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 语速每 +10 时长减半，-10 时长加倍
    fn duration_ms(&self, text: &str, rate: i8) -> u64 {
        let base = text.chars().count() as f64 * self.config.ms_per_char as f64;
        (base * 2f64.powf(-(rate as f64) / 10.0)) as u64
    }

    fn tone(&self, duration_ms: u64, volume: u8) -> Result<PcmBuffer, TtsError> {
        let sample_rate = self.config.sample_rate;
        let frames = (sample_rate as u64 * duration_ms / 1000) as usize;
        let amplitude = 12_000.0 * volume as f32 / ENGINE_VOLUME_MAX as f32;

        let mut data = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let sample = ((t * 330.0 * std::f32::consts::TAU).sin() * amplitude) as i16;
            data.extend_from_slice(&sample.to_le_bytes());
        }

        PcmBuffer::new(PcmFormat::new(sample_rate, 1, SampleEncoding::I16), data)
            .map_err(|e| TtsError::InvalidResponse(e.to_string()))
    }
}

impl Default for FakeSpeechEngine {
    fn default() -> Self {
        Self::new(FakeSpeechEngineConfig::default())
    }
}

#[async_trait]
impl SpeechEnginePort for FakeSpeechEngine {
    async fn installed_voices(&self) -> Result<Vec<String>, TtsError> {
        Ok(self.config.voices.clone())
    }

    async fn synthesize(&self, request: SynthesisRequest) -> Result<PcmBuffer, TtsError> {
        if !self.config.voices.contains(&request.voice) {
            return Err(TtsError::VoiceNotFound(request.voice));
        }

        if let Ok(mut seen) = self.requests.lock() {
            if seen.len() == RECENT_REQUESTS {
                seen.pop_front();
            }
            seen.push_back(request.clone());
        }

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        let duration_ms = self.duration_ms(&request.text, request.params.rate);
        tracing::debug!(
            text_len = request.text.len(),
            voice = %request.voice,
            duration_ms = duration_ms,
            "FakeSpeechEngine: generating tone"
        );

        self.tone(duration_ms, request.params.volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::speech::EngineParams;

    fn request(text: &str, volume: u8, rate: i8) -> SynthesisRequest {
        SynthesisRequest {
            text: text.to_string(),
            voice: "Haruka".to_string(),
            params: EngineParams { volume, rate },
        }
    }

    fn peak(buffer: &PcmBuffer) -> i16 {
        buffer
            .data()
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]).saturating_abs())
            .max()
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_duration_follows_text_and_rate() {
        let engine = FakeSpeechEngine::default();

        let normal = engine.synthesize(request("abcdefghij", 50, 0)).await.unwrap();
        let fast = engine.synthesize(request("abcdefghij", 50, 10)).await.unwrap();
        let slow = engine.synthesize(request("abcdefghij", 50, -10)).await.unwrap();

        assert_eq!(normal.duration_ms(), 600);
        assert_eq!(fast.duration_ms(), 300);
        assert_eq!(slow.duration_ms(), 1200);
    }

    #[tokio::test]
    async fn test_volume_scales_amplitude() {
        let engine = FakeSpeechEngine::default();

        let muted = engine.synthesize(request("hello", 0, 0)).await.unwrap();
        let full = engine.synthesize(request("hello", 100, 0)).await.unwrap();

        assert_eq!(peak(&muted), 0);
        assert!(peak(&full) > 11_000);
    }

    #[tokio::test]
    async fn test_request_log_keeps_most_recent() {
        let engine = FakeSpeechEngine::default();
        for i in 0..RECENT_REQUESTS + 8 {
            engine.synthesize(request(&format!("line {}", i), 50, 0)).await.unwrap();
        }

        let seen = engine.requests();
        assert_eq!(seen.len(), RECENT_REQUESTS);
        assert_eq!(seen[0].text, "line 8");
        assert_eq!(seen[RECENT_REQUESTS - 1].text, format!("line {}", RECENT_REQUESTS + 7));
    }

    #[tokio::test]
    async fn test_unknown_voice() {
        let engine = FakeSpeechEngine::with_voices(&["Zira"]);
        let result = engine.synthesize(request("hello", 50, 0)).await;
        assert!(matches!(result, Err(TtsError::VoiceNotFound(_))));
        assert!(engine.requests().is_empty());
    }
}
