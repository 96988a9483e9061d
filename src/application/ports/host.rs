//! Host Ports - 宿主应用注入的回调接口
//!
//! 日志输出、就绪通知、TTS 设置读取

use crate::domain::speech::TtsSettings;

/// 日志接收端，接收可读的状态/错误文本
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

/// 就绪通知
pub trait ReadyListener: Send + Sync {
    fn on_ready(&self);
}

/// TTS 设置提供方，每次触发时同步读取
pub trait SettingsProvider: Send + Sync {
    fn tts_settings(&self) -> TtsSettings;
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

impl<F> ReadyListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_ready(&self) {
        self()
    }
}

impl SettingsProvider for TtsSettings {
    fn tts_settings(&self) -> TtsSettings {
        self.clone()
    }
}
