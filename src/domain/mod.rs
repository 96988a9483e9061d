//! Domain Layer - 领域层
//!
//! 包含三个限界上下文:
//! - Audio Context: PCM 格式与缓冲
//! - Speech Context: 合成请求与参数映射
//! - Session Context: 语音会话

pub mod audio;
pub mod session;
pub mod speech;

// 聊天触发指令
mod trigger;

pub use trigger::{parse_trigger, TRIGGER_PREFIX};
