//! 测试用 WAV 构造工具

use super::{PcmFormat, SampleEncoding};

/// 以给定格式封装 PCM 数据为 WAV
pub(crate) fn wav_bytes(format: PcmFormat, data: &[u8]) -> Vec<u8> {
    let audio_format: u16 = if format.encoding == SampleEncoding::F32 { 3 } else { 1 };
    let mut wav = Vec::with_capacity(44 + data.len());

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&((36 + data.len()) as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&audio_format.to_le_bytes());
    wav.extend_from_slice(&format.channels.to_le_bytes());
    wav.extend_from_slice(&format.sample_rate.to_le_bytes());
    wav.extend_from_slice(&(format.byte_rate() as u32).to_le_bytes());
    wav.extend_from_slice(&(format.block_align() as u16).to_le_bytes());
    wav.extend_from_slice(&format.encoding.bits_per_sample().to_le_bytes());

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(data.len() as u32).to_le_bytes());
    wav.extend_from_slice(data);
    wav
}

/// 生成 16 位单声道正弦波 WAV
pub(crate) fn sine_wav(sample_rate: u32, frames: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let sample = ((t * 440.0 * std::f32::consts::TAU).sin() * 8000.0) as i16;
        data.extend_from_slice(&sample.to_le_bytes());
    }
    wav_bytes(PcmFormat::new(sample_rate, 1, SampleEncoding::I16), &data)
}
