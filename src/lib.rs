//! TTS Relay - 聊天消息到语音频道的 TTS 中继
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Audio: PCM 格式与缓冲
//! - Speech: TTS 设置与引擎参数映射
//! - Session: 语音会话状态
//! - Trigger: `!tts ` 触发前缀解析
//!
//! 应用层 (application/):
//! - Ports: 端口定义（ChatPlatform, SpeechEngine, AudioTranscoder, 宿主回调）
//! - Services: SessionManager, SpeechRenderer, AudioSinkWriter
//! - Bot: 宿主使用的 TtsBot 门面
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: HTTP/Fake 合成引擎, PCM 转换器, 本地聊天平台, 宿主回调实现
//! - Console: 控制台宿主命令解析

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{BotOptions, HostHooks, TtsBot};
pub use config::{load_config, AppConfig};
