//! PCM Converter - 基于 symphonia 的线路格式转换器
//!
//! 支持：
//! - 原始 PCM（u8 / i16 / i24 / i32 / f32）转换为 48 kHz / 16 位 / 立体声
//! - 音频文件（WAV、FLAC、MP3）解码后转换
//! - 简单线性重采样与声道重排

use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::application::ports::{AudioTranscoderPort, TranscodeError};
use crate::domain::audio::{PcmBuffer, PcmFormat, SampleEncoding, WIRE_CHANNELS, WIRE_SAMPLE_RATE};

/// 线路格式转换器
///
/// 无状态，可在多个任务间共享
#[derive(Debug, Default, Clone)]
pub struct PcmConverter;

/// 解码后的浮点交错样本
#[derive(Debug)]
struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: usize,
}

impl PcmConverter {
    pub fn new() -> Self {
        Self
    }

    /// 原始 PCM 字节解码为 [-1.0, 1.0] 浮点样本
    fn decode_raw(buffer: &PcmBuffer) -> DecodedAudio {
        let format = buffer.format();
        let data = buffer.data();
        let samples: Vec<f32> = match format.encoding {
            SampleEncoding::U8 => data.iter().map(|&b| (b as f32 - 128.0) / 128.0).collect(),
            SampleEncoding::I16 => data
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0)
                .collect(),
            SampleEncoding::I24 => data
                .chunks_exact(3)
                .map(|c| (i32::from_le_bytes([0, c[0], c[1], c[2]]) >> 8) as f32 / 8_388_608.0)
                .collect(),
            SampleEncoding::I32 => data
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32 / 2_147_483_648.0)
                .collect(),
            SampleEncoding::F32 => data
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        };

        DecodedAudio {
            samples,
            sample_rate: format.sample_rate,
            channels: format.channels as usize,
        }
    }

    /// 使用 symphonia 解码完整音频文件
    fn decode_container(data: &[u8], extension: Option<&str>) -> Result<DecodedAudio, TranscodeError> {
        let cursor = Cursor::new(data.to_vec());
        let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| TranscodeError::DecodingError(format!("Probe failed: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| TranscodeError::DecodingError("No audio track found".to_string()))?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| TranscodeError::DecodingError("Unknown sample rate".to_string()))?;

        let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| TranscodeError::DecodingError(format!("Decoder creation failed: {}", e)))?;

        let track_id = track.id;
        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    return Err(TranscodeError::DecodingError(format!("Packet read error: {}", e)));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(symphonia::core::errors::Error::DecodeError(e)) => {
                    tracing::warn!(error = %e, "Decode error, skipping packet");
                    continue;
                }
                Err(e) => {
                    return Err(TranscodeError::DecodingError(format!("Decode failed: {}", e)));
                }
            };

            let spec = *decoded.spec();
            let num_frames = decoded.frames();
            channels = spec.channels.count();
            let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend(&sample_buf.samples()[..num_frames * channels]);
        }

        if channels == 0 {
            return Err(TranscodeError::DecodingError("Unknown channel count".to_string()));
        }

        Ok(DecodedAudio {
            samples,
            sample_rate,
            channels,
        })
    }

    /// 声道重排为立体声：单声道复制到两侧，多声道取前两个
    fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
        match channels {
            2 => samples.to_vec(),
            1 => samples.iter().flat_map(|&s| [s, s]).collect(),
            n => samples.chunks_exact(n).flat_map(|frame| [frame[0], frame[1]]).collect(),
        }
    }

    /// 简单线性重采样
    fn resample(samples: &[f32], from_rate: u32, to_rate: u32, channels: usize) -> Vec<f32> {
        if from_rate == to_rate || samples.is_empty() {
            return samples.to_vec();
        }

        let ratio = to_rate as f64 / from_rate as f64;
        let frame_count = samples.len() / channels;
        let new_frame_count = (frame_count as f64 * ratio) as usize;
        let mut resampled = Vec::with_capacity(new_frame_count * channels);

        for i in 0..new_frame_count {
            let src_pos = i as f64 / ratio;
            let src_idx = src_pos as usize;
            let frac = (src_pos - src_idx as f64) as f32;

            for ch in 0..channels {
                let idx0 = src_idx * channels + ch;
                let idx1 = (src_idx + 1).min(frame_count - 1) * channels + ch;

                let s0 = samples.get(idx0).copied().unwrap_or(0.0);
                let s1 = samples.get(idx1).copied().unwrap_or(s0);
                resampled.push(s0 + (s1 - s0) * frac);
            }
        }

        resampled
    }

    /// 浮点样本转换为线路格式
    fn encode_wire(audio: DecodedAudio) -> PcmBuffer {
        let stereo = Self::to_stereo(&audio.samples, audio.channels);
        let resampled = Self::resample(&stereo, audio.sample_rate, WIRE_SAMPLE_RATE, WIRE_CHANNELS as usize);

        let pcm: Vec<i16> = resampled
            .iter()
            .map(|&s| (s * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16)
            .collect();

        PcmBuffer::from_wire_samples(&pcm)
    }
}

impl AudioTranscoderPort for PcmConverter {
    fn to_wire_format(&self, buffer: PcmBuffer) -> Result<PcmBuffer, TranscodeError> {
        let source = buffer.format();
        if source.is_wire() {
            return Ok(buffer);
        }

        let converted = Self::encode_wire(Self::decode_raw(&buffer));
        tracing::trace!(
            source_format = %source,
            source_bytes = buffer.len(),
            wire_bytes = converted.len(),
            "PCM converted to wire format"
        );
        Ok(converted)
    }

    fn decode_to_wire_format(
        &self,
        data: &[u8],
        extension: Option<&str>,
    ) -> Result<PcmBuffer, TranscodeError> {
        if data.is_empty() {
            return Err(TranscodeError::InvalidInput("empty audio data".to_string()));
        }

        let decoded = Self::decode_container(data, extension)?;
        let source = PcmFormat::new(decoded.sample_rate, decoded.channels as u16, SampleEncoding::F32);
        if decoded.samples.is_empty() {
            return Err(TranscodeError::DecodingError("no audio samples decoded".to_string()));
        }

        let converted = Self::encode_wire(decoded);
        tracing::debug!(
            source_format = %source,
            wire_bytes = converted.len(),
            "Audio file decoded to wire format"
        );
        Ok(converted)
    }
}
