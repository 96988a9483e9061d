//! Speech Renderer - 文本到线路格式 PCM
//!
//! 无共享可变状态，多个请求可以并行渲染；串行化只发生在 sink

use std::sync::Arc;
use std::time::Instant;

use crate::application::error::RelayError;
use crate::application::ports::{AudioTranscoderPort, SpeechEnginePort, SynthesisRequest, TtsError};
use crate::domain::audio::PcmBuffer;
use crate::domain::speech::SpeechRequest;

pub struct SpeechRenderer {
    engine: Arc<dyn SpeechEnginePort>,
    transcoder: Arc<dyn AudioTranscoderPort>,
}

impl SpeechRenderer {
    pub fn new(engine: Arc<dyn SpeechEnginePort>, transcoder: Arc<dyn AudioTranscoderPort>) -> Self {
        Self { engine, transcoder }
    }

    /// 渲染一次合成请求，输出 48 kHz / 16 位 / 立体声
    ///
    /// 音色未安装时由引擎报告 VoiceNotFound，不回退到默认音色
    pub async fn render(&self, request: &SpeechRequest) -> Result<PcmBuffer, RelayError> {
        let params = request.engine_params();
        let started = Instant::now();
        let raw = self
            .engine
            .synthesize(SynthesisRequest {
                text: request.text.clone(),
                voice: request.voice.clone(),
                params,
            })
            .await
            .map_err(|e| {
                if let TtsError::VoiceNotFound(_) = &e {
                    tracing::warn!(voice = %request.voice, "Requested voice is not installed");
                }
                RelayError::from(e)
            })?;

        let source_format = raw.format();
        let pcm = self
            .transcoder
            .to_wire_format(raw)
            .map_err(|e| RelayError::SynthesisError(format!("Cannot convert engine output: {}", e)))?;

        tracing::debug!(
            voice = %request.voice,
            text_len = request.text.chars().count(),
            engine_volume = params.volume,
            engine_rate = params.rate,
            source_format = %source_format,
            duration_ms = pcm.duration_ms(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Speech rendered"
        );

        Ok(pcm)
    }

    /// 引擎已安装的音色
    pub async fn installed_voices(&self) -> Result<Vec<String>, RelayError> {
        Ok(self.engine.installed_voices().await?)
    }
}
