//! Transcoder Adapter - 线路格式转换

mod pcm_converter;

pub use pcm_converter::PcmConverter;
