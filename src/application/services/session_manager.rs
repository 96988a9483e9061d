//! Session Manager - 语音会话生命周期
//!
//! 同一时刻至多一个语音会话，存放在受检槽位中

use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::application::error::RelayError;
use crate::application::ports::{ChatPlatformPort, GuildInfo, VoiceChannelInfo, VoiceConnectionPort};
use crate::application::services::AudioSinkWriter;
use crate::domain::session::{ChannelRef, ConnectionState, VoiceSession};

/// 加入结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// 已连接到目标频道
    Joined(ChannelRef),
    /// 名册中找不到目标频道，未做任何连接
    ChannelNotFound,
}

struct ActiveSession {
    session: Mutex<VoiceSession>,
    connection: Arc<dyn VoiceConnectionPort>,
}

/// 已建立语音会话的句柄
///
/// 克隆开销很小，传递给需要会话的各个操作
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<ActiveSession>,
}

impl SessionHandle {
    pub(crate) fn new(session: VoiceSession, connection: Arc<dyn VoiceConnectionPort>) -> Self {
        Self {
            inner: Arc::new(ActiveSession {
                session: Mutex::new(session),
                connection,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.with_session(|s| s.id())
    }

    pub fn channel(&self) -> ChannelRef {
        self.with_session(|s| s.channel().clone())
    }

    /// 会话快照
    pub fn snapshot(&self) -> VoiceSession {
        self.with_session(|s| s.clone())
    }

    pub fn connection(&self) -> &Arc<dyn VoiceConnectionPort> {
        &self.inner.connection
    }

    /// 传输层当前是否处于已连接状态
    pub fn is_connected(&self) -> bool {
        self.inner.connection.state().is_connected()
    }

    fn with_session<T>(&self, f: impl FnOnce(&VoiceSession) -> T) -> T {
        let guard = self.inner.session.lock().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    fn update(&self, f: impl FnOnce(&mut VoiceSession)) {
        let mut guard = self.inner.session.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session", &self.snapshot())
            .field("transport", &self.inner.connection.state())
            .finish()
    }
}

/// 语音会话管理器
pub struct SessionManager {
    platform: Arc<dyn ChatPlatformPort>,
    writer: Arc<AudioSinkWriter>,
    slot: AsyncMutex<Option<SessionHandle>>,
}

impl SessionManager {
    pub fn new(platform: Arc<dyn ChatPlatformPort>, writer: Arc<AudioSinkWriter>) -> Self {
        Self {
            platform,
            writer,
            slot: AsyncMutex::new(None),
        }
    }

    /// 加入指定服务器的语音频道
    ///
    /// 频道按显示位置排序后按名称精确匹配，重名时取第一个。
    /// 已有会话时先离开旧频道。
    pub async fn join(&self, server: &str, channel: &str) -> Result<JoinOutcome, RelayError> {
        let guilds = self.platform.guilds()?;
        let target = find_voice_channel(&guilds, server, channel);

        let Some((guild, voice_channel)) = target else {
            tracing::info!(server = %server, channel = %channel, "Voice channel not found, nothing to join");
            return Ok(JoinOutcome::ChannelNotFound);
        };

        let channel_ref = ChannelRef {
            guild_id: guild.id,
            guild_name: guild.name.clone(),
            channel_id: voice_channel.id,
            channel_name: voice_channel.name.clone(),
        };

        let mut slot = self.slot.lock().await;
        if let Some(previous) = slot.take() {
            tracing::info!(channel = %previous.channel(), "Leaving previous voice channel before join");
            self.teardown(&previous).await;
        }

        let session = VoiceSession::connecting(channel_ref.clone());
        let connection = self
            .platform
            .connect_voice(channel_ref.guild_id, channel_ref.channel_id)
            .await
            .map_err(|e| RelayError::join(e.to_string()))?;

        let handle = SessionHandle::new(session, connection);
        handle.update(|s| s.mark_connected());

        tracing::info!(
            session_id = %handle.id(),
            guild = %channel_ref.guild_name,
            channel = %channel_ref.channel_name,
            "Voice session established"
        );

        *slot = Some(handle);
        Ok(JoinOutcome::Joined(channel_ref))
    }

    /// 离开当前语音频道，没有会话时为空操作
    pub async fn leave(&self) -> Result<(), RelayError> {
        let mut slot = self.slot.lock().await;
        match slot.take() {
            Some(handle) => {
                let result = self.teardown(&handle).await;
                tracing::info!(session_id = %handle.id(), "Voice session closed");
                result
            }
            None => {
                tracing::debug!("No voice session to leave");
                Ok(())
            }
        }
    }

    /// 当前会话；传输层已意外断开时关闭 sink、清空槽位并返回 None
    pub async fn current(&self) -> Option<SessionHandle> {
        let mut slot = self.slot.lock().await;
        let handle = slot.as_ref()?.clone();

        if handle.connection().state() == ConnectionState::Disconnected {
            tracing::warn!(session_id = %handle.id(), "Voice connection dropped, discarding session");
            *slot = None;
            if !self.writer.close().await {
                tracing::debug!(session_id = %handle.id(), "Write in flight, sink dropped by the writer");
            }
            handle.update(|s| s.mark_disconnected());
            return None;
        }

        Some(handle)
    }

    /// 当前会话的状态，没有会话时为 Disconnected
    pub async fn voice_state(&self) -> ConnectionState {
        match self.slot.lock().await.as_ref() {
            Some(handle) => handle.connection().state(),
            None => ConnectionState::Disconnected,
        }
    }

    /// 聊天平台传输层是否已连接
    pub fn is_connected(&self) -> bool {
        self.platform.connection_state().is_connected()
    }

    /// 已加入的服务器名称，按平台枚举顺序
    pub fn list_servers(&self) -> Result<Vec<String>, RelayError> {
        Ok(self
            .platform
            .guilds()?
            .into_iter()
            .map(|g| g.name)
            .collect())
    }

    /// 指定服务器的语音频道名称，按显示位置升序；服务器不存在时为空
    pub fn list_voice_channels(&self, server: &str) -> Result<Vec<String>, RelayError> {
        let guilds = self.platform.guilds()?;
        Ok(guilds
            .iter()
            .find(|g| g.name == server)
            .map(|g| {
                sorted_voice_channels(g)
                    .into_iter()
                    .map(|c| c.name.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// 关闭出站流并断开连接
    async fn teardown(&self, handle: &SessionHandle) -> Result<(), RelayError> {
        handle.update(|s| s.mark_disconnecting());

        if !self.writer.close().await {
            tracing::debug!(session_id = %handle.id(), "Write in flight, stream closes with the connection");
        }

        let result = handle.connection().disconnect().await;
        handle.update(|s| s.mark_disconnected());

        result.map_err(|e| {
            tracing::warn!(session_id = %handle.id(), error = %e, "Voice disconnect failed");
            RelayError::from(e)
        })
    }
}

/// 按显示位置升序排列语音频道（稳定排序，同位置保持枚举顺序）
fn sorted_voice_channels(guild: &GuildInfo) -> Vec<&VoiceChannelInfo> {
    let mut channels: Vec<&VoiceChannelInfo> = guild.voice_channels.iter().collect();
    channels.sort_by_key(|c| c.position);
    channels
}

fn find_voice_channel<'a>(
    guilds: &'a [GuildInfo],
    server: &str,
    channel: &str,
) -> Option<(&'a GuildInfo, &'a VoiceChannelInfo)> {
    let guild = guilds.iter().find(|g| g.name == server)?;
    sorted_voice_channels(guild)
        .into_iter()
        .find(|c| c.name == channel)
        .map(|c| (guild, c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audio::PcmBuffer;
    use crate::infrastructure::adapters::{LocalChatPlatform, PcmConverter, VoiceOutput};

    fn roster() -> Vec<GuildInfo> {
        vec![
            GuildInfo {
                id: 1,
                name: "Eorzea".to_string(),
                voice_channels: vec![
                    VoiceChannelInfo { id: 12, name: "Raid".to_string(), position: 2 },
                    VoiceChannelInfo { id: 10, name: "Lobby".to_string(), position: 0 },
                    VoiceChannelInfo { id: 11, name: "Raid".to_string(), position: 1 },
                ],
            },
            GuildInfo {
                id: 2,
                name: "Ishgard".to_string(),
                voice_channels: vec![VoiceChannelInfo { id: 20, name: "General".to_string(), position: 0 }],
            },
        ]
    }

    async fn setup() -> (Arc<LocalChatPlatform>, Arc<AudioSinkWriter>, SessionManager) {
        let platform = Arc::new(LocalChatPlatform::new(roster(), VoiceOutput::Discard));
        platform.login("token").await.unwrap();
        platform.start().await.unwrap();
        let writer = Arc::new(AudioSinkWriter::new(Arc::new(PcmConverter::new()), Default::default()));
        let manager = SessionManager::new(platform.clone(), writer.clone());
        (platform, writer, manager)
    }

    #[tokio::test]
    async fn test_channels_sorted_by_position() {
        let (_, _, manager) = setup().await;
        let channels = manager.list_voice_channels("Eorzea").unwrap();
        assert_eq!(channels, vec!["Lobby", "Raid", "Raid"]);
    }

    #[tokio::test]
    async fn test_unknown_server_lists_nothing() {
        let (_, _, manager) = setup().await;
        assert!(manager.list_voice_channels("Limsa").unwrap().is_empty());
        assert_eq!(manager.list_servers().unwrap(), vec!["Eorzea", "Ishgard"]);
    }

    #[tokio::test]
    async fn test_duplicate_name_picks_first_in_position_order() {
        let (_, _, manager) = setup().await;
        let outcome = manager.join("Eorzea", "Raid").await.unwrap();
        match outcome {
            JoinOutcome::Joined(channel) => assert_eq!(channel.channel_id, 11),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(manager.voice_state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_missing_channel_is_noop() {
        let (_, _, manager) = setup().await;
        let outcome = manager.join("Eorzea", "Nowhere").await.unwrap();
        assert_eq!(outcome, JoinOutcome::ChannelNotFound);
        assert!(manager.current().await.is_none());
    }

    #[tokio::test]
    async fn test_join_then_leave_leaves_no_sink() {
        let (_, writer, manager) = setup().await;
        manager.join("Ishgard", "General").await.unwrap();
        assert!(manager.current().await.is_some());

        manager.leave().await.unwrap();
        assert!(manager.current().await.is_none());
        assert!(!writer.has_sink().await);
        assert_eq!(manager.voice_state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_leave_without_join_is_noop() {
        let (_, writer, manager) = setup().await;
        manager.leave().await.unwrap();
        manager.leave().await.unwrap();
        assert!(!writer.has_sink().await);
    }

    #[tokio::test]
    async fn test_join_failure_leaves_no_session() {
        let (platform, _, manager) = setup().await;
        platform.stop().await.unwrap();

        let result = manager.join("Ishgard", "General").await;
        assert!(matches!(result, Err(RelayError::ChannelJoinError(_))));
        assert!(manager.current().await.is_none());
    }

    #[tokio::test]
    async fn test_rejoin_replaces_session() {
        let (_, _, manager) = setup().await;
        manager.join("Eorzea", "Lobby").await.unwrap();
        let first = manager.current().await.unwrap();

        manager.join("Ishgard", "General").await.unwrap();
        let second = manager.current().await.unwrap();

        assert_ne!(first.id(), second.id());
        assert!(!first.is_connected());
        assert_eq!(second.channel().channel_name, "General");
    }

    #[tokio::test]
    async fn test_dropped_connection_discards_session() {
        let (_, _, manager) = setup().await;
        manager.join("Eorzea", "Lobby").await.unwrap();
        let handle = manager.current().await.unwrap();

        handle.connection().disconnect().await.unwrap();
        assert!(manager.current().await.is_none());
        assert_eq!(handle.snapshot().state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_dropped_connection_closes_sink() {
        let (_, writer, manager) = setup().await;
        manager.join("Eorzea", "Lobby").await.unwrap();
        let handle = manager.current().await.unwrap();
        writer
            .write_speech(&handle, PcmBuffer::from_wire_samples(&[0i16; 64]))
            .await
            .unwrap();
        assert!(writer.has_sink().await);

        handle.connection().disconnect().await.unwrap();
        assert!(manager.current().await.is_none());
        assert!(!writer.has_sink().await);

        manager.leave().await.unwrap();
        assert!(!writer.has_sink().await);
    }

    #[tokio::test]
    async fn test_is_connected_follows_platform() {
        let (platform, _, manager) = setup().await;
        assert!(manager.is_connected());
        platform.stop().await.unwrap();
        assert!(!manager.is_connected());
    }
}
