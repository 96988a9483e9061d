//! Chat Platform Port - 聊天平台客户端抽象
//!
//! 登录、事件订阅、服务器/频道名册以及语音连接，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWrite;
use tokio::sync::broadcast;

use crate::domain::session::ConnectionState;

/// 平台错误
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Guild not found: {0}")]
    GuildNotFound(u64),

    #[error("Channel not found: {0}")]
    ChannelNotFound(u64),

    #[error("Voice connection failed: {0}")]
    VoiceConnection(String),
}

/// 服务器（guild）名册条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildInfo {
    pub id: u64,
    pub name: String,
    pub voice_channels: Vec<VoiceChannelInfo>,
}

/// 语音频道名册条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceChannelInfo {
    pub id: u64,
    pub name: String,
    /// 客户端中的显示位置，升序排列
    pub position: i32,
}

/// 平台日志记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub source: String,
    pub message: String,
}

/// 消息作者类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorKind {
    /// 普通用户或机器人发送的消息
    User,
    /// 系统消息（置顶通知、加入提示等）
    System,
}

/// 消息来源频道
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelContext {
    /// 服务器内的文字频道
    GuildText { guild: String, channel: String },
    /// 私信
    Direct { user: String },
}

/// 收到的聊天消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub author: AuthorKind,
    pub channel: ChannelContext,
    pub content: String,
}

impl InboundMessage {
    pub fn guild_text(
        guild: impl Into<String>,
        channel: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            author: AuthorKind::User,
            channel: ChannelContext::GuildText {
                guild: guild.into(),
                channel: channel.into(),
            },
            content: content.into(),
        }
    }
}

/// 平台事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    Ready,
    Log(LogRecord),
    Message(InboundMessage),
}

/// 语音通道的出站 PCM 字节流
pub type PcmStream = Box<dyn AsyncWrite + Send + Unpin>;

/// Voice Connection Port
///
/// 一次已建立的语音连接
#[async_trait]
pub trait VoiceConnectionPort: Send + Sync {
    fn channel_id(&self) -> u64;

    fn state(&self) -> ConnectionState;

    /// 创建出站 PCM 流（48 kHz / 16 位 / 立体声）
    ///
    /// `buffer_size` 为流内部缓冲区大小（字节）
    async fn create_pcm_stream(&self, buffer_size: usize) -> Result<PcmStream, PlatformError>;

    /// 断开连接。由此连接创建的所有流随之关闭，进行中的写入会收到 IO 错误
    async fn disconnect(&self) -> Result<(), PlatformError>;
}

/// Chat Platform Port
///
/// 聊天平台客户端，进程内单例
#[async_trait]
pub trait ChatPlatformPort: Send + Sync {
    async fn login(&self, token: &str) -> Result<(), PlatformError>;

    async fn start(&self) -> Result<(), PlatformError>;

    async fn stop(&self) -> Result<(), PlatformError>;

    async fn logout(&self) -> Result<(), PlatformError>;

    fn connection_state(&self) -> ConnectionState;

    /// 当前已加入的服务器，按平台枚举顺序
    fn guilds(&self) -> Result<Vec<GuildInfo>, PlatformError>;

    async fn connect_voice(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<Arc<dyn VoiceConnectionPort>, PlatformError>;

    /// 设置机器人的“正在玩”状态
    async fn set_activity(&self, name: &str) -> Result<(), PlatformError>;

    fn subscribe(&self) -> broadcast::Receiver<PlatformEvent>;
}
