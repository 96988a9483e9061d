//! Shared Settings - 可在运行时修改的 TTS 设置

use std::sync::{Arc, RwLock};

use crate::application::ports::SettingsProvider;
use crate::domain::speech::TtsSettings;

/// 线程安全的 TTS 设置
///
/// 克隆后共享同一份数据；每次读取都返回当前值的快照
#[derive(Debug, Clone)]
pub struct SharedSettings {
    inner: Arc<RwLock<TtsSettings>>,
}

impl SharedSettings {
    pub fn new(settings: TtsSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut TtsSettings)) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
}

impl SettingsProvider for SharedSettings {
    fn tts_settings(&self) -> TtsSettings {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
