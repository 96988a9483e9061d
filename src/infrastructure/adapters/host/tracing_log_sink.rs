//! 把宿主日志转发到 tracing

use crate::application::ports::LogSink;

/// 宿主日志接收端，输出到 `tts_relay::host` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, message: &str) {
        tracing::info!(target: "tts_relay::host", "{}", message);
    }
}
