//! Audio Context - Value Objects

use serde::{Deserialize, Serialize};

use super::AudioError;

/// 语音传输要求的采样率
pub const WIRE_SAMPLE_RATE: u32 = 48_000;
/// 语音传输要求的声道数
pub const WIRE_CHANNELS: u16 = 2;

/// 样本编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    /// 8 位无符号整数
    U8,
    /// 16 位有符号整数（小端）
    I16,
    /// 24 位有符号整数（小端，3 字节紧凑存储）
    I24,
    /// 32 位有符号整数（小端）
    I32,
    /// 32 位浮点（小端）
    F32,
}

impl SampleEncoding {
    pub fn bits_per_sample(&self) -> u16 {
        match self {
            Self::U8 => 8,
            Self::I16 => 16,
            Self::I24 => 24,
            Self::I32 | Self::F32 => 32,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample() as usize / 8
    }

    /// 根据 WAV fmt chunk 的格式码和位深推断编码
    pub fn from_wav(audio_format: u16, bits_per_sample: u16) -> Option<Self> {
        match (audio_format, bits_per_sample) {
            (1, 8) => Some(Self::U8),
            (1, 16) => Some(Self::I16),
            (1, 24) => Some(Self::I24),
            (1, 32) => Some(Self::I32),
            (3, 32) => Some(Self::F32),
            _ => None,
        }
    }
}

/// PCM 格式描述
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: SampleEncoding,
}

impl PcmFormat {
    /// 语音通道的固定线路格式: 48 kHz / 16 位 / 立体声
    pub const WIRE: PcmFormat = PcmFormat {
        sample_rate: WIRE_SAMPLE_RATE,
        channels: WIRE_CHANNELS,
        encoding: SampleEncoding::I16,
    };

    pub fn new(sample_rate: u32, channels: u16, encoding: SampleEncoding) -> Self {
        Self {
            sample_rate,
            channels,
            encoding,
        }
    }

    /// 每帧字节数（一帧包含所有声道各一个样本）
    pub fn block_align(&self) -> usize {
        self.channels as usize * self.encoding.bytes_per_sample()
    }

    pub fn byte_rate(&self) -> u64 {
        self.sample_rate as u64 * self.block_align() as u64
    }

    pub fn is_wire(&self) -> bool {
        *self == Self::WIRE
    }
}

impl std::fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}Hz/{}bit/{}ch",
            self.sample_rate,
            self.encoding.bits_per_sample(),
            self.channels
        )
    }
}

/// PCM 音频缓冲
///
/// 不变量:
/// - data 长度是 block_align 的整数倍
/// - sample_rate 与 channels 均大于 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBuffer {
    format: PcmFormat,
    data: Vec<u8>,
}

impl PcmBuffer {
    pub fn new(format: PcmFormat, data: Vec<u8>) -> Result<Self, AudioError> {
        if format.sample_rate == 0 {
            return Err(AudioError::InvalidFormat("sample rate cannot be 0".to_string()));
        }
        if format.channels == 0 {
            return Err(AudioError::InvalidFormat("channel count cannot be 0".to_string()));
        }
        let align = format.block_align();
        if data.len() % align != 0 {
            return Err(AudioError::InvalidFormat(format!(
                "data length {} is not a multiple of block align {}",
                data.len(),
                align
            )));
        }
        Ok(Self { format, data })
    }

    /// 由 16 位交错样本构造线路格式缓冲
    pub fn from_wire_samples(samples: &[i16]) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        // 奇数个样本时补零，保证按帧对齐
        if samples.len() % WIRE_CHANNELS as usize != 0 {
            data.extend_from_slice(&0i16.to_le_bytes());
        }
        Self {
            format: PcmFormat::WIRE,
            data,
        }
    }

    /// 解析 RIFF/WAVE 字节流
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self, AudioError> {
        if bytes.len() < 12 {
            return Err(AudioError::InvalidWav("WAV data too short".to_string()));
        }
        if &bytes[0..4] != b"RIFF" {
            return Err(AudioError::InvalidWav("missing RIFF header".to_string()));
        }
        if &bytes[8..12] != b"WAVE" {
            return Err(AudioError::InvalidWav("missing WAVE identifier".to_string()));
        }

        let mut pos = 12;
        let mut format: Option<PcmFormat> = None;

        while pos + 8 <= bytes.len() {
            let chunk_id = &bytes[pos..pos + 4];
            let chunk_size = u32::from_le_bytes([
                bytes[pos + 4],
                bytes[pos + 5],
                bytes[pos + 6],
                bytes[pos + 7],
            ]) as usize;
            let body_start = pos + 8;

            match chunk_id {
                b"fmt " => {
                    if chunk_size < 16 || body_start + 16 > bytes.len() {
                        return Err(AudioError::InvalidWav("invalid fmt chunk size".to_string()));
                    }
                    let fmt = &bytes[body_start..body_start + 16];
                    let mut audio_format = u16::from_le_bytes([fmt[0], fmt[1]]);
                    let channels = u16::from_le_bytes([fmt[2], fmt[3]]);
                    let sample_rate = u32::from_le_bytes([fmt[4], fmt[5], fmt[6], fmt[7]]);
                    let bits_per_sample = u16::from_le_bytes([fmt[14], fmt[15]]);

                    // WAVE_FORMAT_EXTENSIBLE: 真实格式码位于子格式 GUID 的前两个字节
                    if audio_format == 0xFFFE && chunk_size >= 26 && body_start + 26 <= bytes.len() {
                        audio_format =
                            u16::from_le_bytes([bytes[body_start + 24], bytes[body_start + 25]]);
                    }

                    let encoding = SampleEncoding::from_wav(audio_format, bits_per_sample)
                        .ok_or_else(|| {
                            AudioError::UnsupportedEncoding(format!(
                                "format code {} with {} bits",
                                audio_format, bits_per_sample
                            ))
                        })?;
                    format = Some(PcmFormat::new(sample_rate, channels, encoding));
                }
                b"data" => {
                    let format = format.ok_or_else(|| {
                        AudioError::InvalidWav("data chunk before fmt chunk".to_string())
                    })?;
                    // 流式写出的 WAV 可能把 data 长度写成 0 或超出实际长度
                    let available = bytes.len() - body_start;
                    let declared = if chunk_size == 0 { available } else { chunk_size };
                    let size = declared.min(available);
                    let size = size - size % format.block_align().max(1);
                    return Self::new(format, bytes[body_start..body_start + size].to_vec());
                }
                _ => {}
            }

            pos = body_start + chunk_size;
            // 对齐到偶数字节
            if chunk_size % 2 != 0 {
                pos += 1;
            }
        }

        if format.is_none() {
            Err(AudioError::InvalidWav("missing fmt chunk".to_string()))
        } else {
            Err(AudioError::InvalidWav("missing data chunk".to_string()))
        }
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 帧数
    pub fn frames(&self) -> usize {
        self.data.len() / self.format.block_align()
    }

    pub fn duration_ms(&self) -> u64 {
        (self.frames() as u64 * 1000) / self.format.sample_rate as u64
    }
}
