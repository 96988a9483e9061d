//! TTS Adapter - 合成引擎实现

mod fake_speech_engine;
mod http_speech_engine;

pub use fake_speech_engine::{FakeSpeechEngine, FakeSpeechEngineConfig};
pub use http_speech_engine::{HttpSpeechEngine, HttpSpeechEngineConfig};
