//! Platform Adapter - 聊天平台实现

mod local_platform;

pub use local_platform::{LocalChatPlatform, LocalVoiceConnection, VoiceOutput};
