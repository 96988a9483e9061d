//! HTTP Speech Engine - 调用外部 TTS HTTP 服务
//!
//! 实现 SpeechEnginePort trait，通过 HTTP 调用外部合成服务
//!
//! 外部 TTS API:
//! GET  {base_url}/api/tts/voices      -> {"voices": ["..."]}
//! POST {base_url}/api/tts/synthesize  -> audio/wav binary
//! Request: {"text": "...", "voice": "...", "volume": 0..=100, "rate": -10..=10}

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::{SpeechEnginePort, SynthesisRequest, TtsError};
use crate::domain::audio::PcmBuffer;

/// 合成请求体 (JSON)
#[derive(Debug, Serialize)]
struct SynthesizeBody<'a> {
    text: &'a str,
    voice: &'a str,
    volume: u8,
    rate: i8,
}

/// 音色列表响应
#[derive(Debug, Deserialize)]
struct VoicesResponse {
    voices: Vec<String>,
}

/// HTTP 合成引擎配置
#[derive(Debug, Clone)]
pub struct HttpSpeechEngineConfig {
    /// TTS 服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpSpeechEngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl HttpSpeechEngineConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP 合成引擎
pub struct HttpSpeechEngine {
    client: Client,
    config: HttpSpeechEngineConfig,
}

impl HttpSpeechEngine {
    pub fn new(config: HttpSpeechEngineConfig) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtsError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn voices_url(&self) -> String {
        format!("{}/api/tts/voices", self.config.base_url)
    }

    fn synthesize_url(&self) -> String {
        format!("{}/api/tts/synthesize", self.config.base_url)
    }
}

fn map_send_error(e: reqwest::Error) -> TtsError {
    if e.is_timeout() {
        TtsError::Timeout
    } else if e.is_connect() {
        TtsError::NetworkError(format!("Cannot connect to TTS service: {}", e))
    } else {
        TtsError::NetworkError(e.to_string())
    }
}

#[async_trait]
impl SpeechEnginePort for HttpSpeechEngine {
    async fn installed_voices(&self) -> Result<Vec<String>, TtsError> {
        let response = self
            .client
            .get(self.voices_url())
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TtsError::ServiceError(format!("HTTP {}: {}", status, error_text)));
        }

        let body: VoicesResponse = response
            .json()
            .await
            .map_err(|e| TtsError::InvalidResponse(format!("Invalid voice list: {}", e)))?;

        Ok(body.voices)
    }

    async fn synthesize(&self, request: SynthesisRequest) -> Result<PcmBuffer, TtsError> {
        let body = SynthesizeBody {
            text: &request.text,
            voice: &request.voice,
            volume: request.params.volume,
            rate: request.params.rate,
        };

        tracing::debug!(
            url = %self.synthesize_url(),
            text_len = request.text.len(),
            voice = %request.voice,
            "Sending synthesize request"
        );

        let response = self
            .client
            .post(self.synthesize_url())
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(TtsError::VoiceNotFound(request.voice));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TtsError::ServiceError(format!("HTTP {}: {}", status, error_text)));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| TtsError::InvalidResponse(format!("Failed to read audio: {}", e)))?;

        let pcm = PcmBuffer::from_wav_bytes(&audio)
            .map_err(|e| TtsError::InvalidResponse(e.to_string()))?;

        tracing::info!(
            voice = %request.voice,
            format = %pcm.format(),
            duration_ms = pcm.duration_ms(),
            audio_size = audio.len(),
            "Speech synthesis completed"
        );

        Ok(pcm)
    }
}
