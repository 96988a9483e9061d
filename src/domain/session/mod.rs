//! Session Context - 语音会话限界上下文
//!
//! 职责:
//! - 连接状态
//! - 当前加入的语音频道

mod aggregate;
mod value_objects;

pub use aggregate::VoiceSession;
pub use value_objects::{ChannelRef, ConnectionState};
