//! Session Context - Aggregate Root

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ChannelRef, ConnectionState};

/// 语音会话聚合根
///
/// 不变量:
/// - 同一时刻至多存在一个会话（由 SessionManager 的槽位保证）
/// - 状态只能沿 Connecting → Connected → Disconnecting → Disconnected 前进
#[derive(Debug, Clone)]
pub struct VoiceSession {
    id: Uuid,
    channel: ChannelRef,
    state: ConnectionState,
    created_at: DateTime<Utc>,
    connected_at: Option<DateTime<Utc>>,
}

impl VoiceSession {
    /// 发起加入请求时创建，初始为 Connecting
    pub fn connecting(channel: ChannelRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel,
            state: ConnectionState::Connecting,
            created_at: Utc::now(),
            connected_at: None,
        }
    }

    pub fn mark_connected(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Connected;
            self.connected_at = Some(Utc::now());
        }
    }

    pub fn mark_disconnecting(&mut self) {
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected) {
            self.state = ConnectionState::Disconnecting;
        }
    }

    pub fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    // Getters
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn channel(&self) -> &ChannelRef {
        &self.channel
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.connected_at
    }
}
