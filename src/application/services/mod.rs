//! 应用服务 - 语音管线的三个核心职责
//!
//! - session_manager: 语音会话生命周期
//! - speech_renderer: 文本合成为线路格式 PCM
//! - audio_sink_writer: 出站流的互斥写入

mod audio_sink_writer;
mod session_manager;
mod speech_renderer;

pub use audio_sink_writer::{AudioSinkWriter, SinkConfig, DEFAULT_FRAME_BYTES, DEFAULT_SINK_BUFFER_BYTES};
pub use session_manager::{JoinOutcome, SessionHandle, SessionManager};
pub use speech_renderer::SpeechRenderer;
