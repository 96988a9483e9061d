//! Local Chat Platform - 进程内聊天平台
//!
//! 用固定的服务器名册模拟聊天平台：
//! - 事件通过 broadcast 通道分发
//! - 语音连接把出站 PCM 写入文件或直接丢弃
//! - 断开连接时，由该连接创建的所有流立即失效

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use tokio::io::{AsyncWrite, BufWriter};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    ChatPlatformPort, GuildInfo, InboundMessage, LogRecord, PcmStream, PlatformError,
    PlatformEvent, VoiceConnectionPort,
};
use crate::domain::session::ConnectionState;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const GATEWAY_SOURCE: &str = "Gateway";

/// 语音输出去向
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceOutput {
    /// 丢弃所有音频
    Discard,
    /// 每个出站流写入目录下的一个 .pcm 文件
    Directory(PathBuf),
}

/// 平台连接状态
#[derive(Debug, Default)]
struct ClientState {
    token: Option<String>,
    connection: Option<ConnectionState>,
    activity: Option<String>,
}

/// 进程内聊天平台
pub struct LocalChatPlatform {
    roster: Vec<GuildInfo>,
    output: VoiceOutput,
    events: broadcast::Sender<PlatformEvent>,
    state: RwLock<ClientState>,
    /// guild_id -> 语音连接（每个服务器至多一个）
    voice: DashMap<u64, Arc<LocalVoiceConnection>>,
}

impl LocalChatPlatform {
    pub fn new(roster: Vec<GuildInfo>, output: VoiceOutput) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            roster,
            output,
            events,
            state: RwLock::new(ClientState::default()),
            voice: DashMap::new(),
        }
    }

    /// 分发一个平台事件；没有订阅者时丢弃
    pub fn emit(&self, event: PlatformEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("No platform event subscribers");
        }
    }

    /// 模拟收到一条聊天消息
    pub fn inject_message(&self, message: InboundMessage) {
        self.emit(PlatformEvent::Message(message));
    }

    /// 当前“正在玩”状态
    pub fn activity(&self) -> Option<String> {
        self.read_state(|s| s.activity.clone())
    }

    fn log(&self, message: &str) {
        self.emit(PlatformEvent::Log(LogRecord {
            source: GATEWAY_SOURCE.to_string(),
            message: message.to_string(),
        }));
    }

    fn read_state<T>(&self, f: impl FnOnce(&ClientState) -> T) -> T {
        let guard = self.state.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    fn write_state<T>(&self, f: impl FnOnce(&mut ClientState) -> T) -> T {
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    fn require_connected(&self) -> Result<(), PlatformError> {
        if self.connection_state().is_connected() {
            Ok(())
        } else {
            Err(PlatformError::NotConnected)
        }
    }

    async fn disconnect_all_voice(&self) {
        let connections: Vec<Arc<LocalVoiceConnection>> =
            self.voice.iter().map(|entry| entry.value().clone()).collect();
        self.voice.clear();
        for connection in connections {
            let _ = connection.disconnect().await;
        }
    }
}

#[async_trait]
impl ChatPlatformPort for LocalChatPlatform {
    async fn login(&self, token: &str) -> Result<(), PlatformError> {
        if token.trim().is_empty() {
            return Err(PlatformError::Authentication("token is empty".to_string()));
        }
        self.write_state(|s| s.token = Some(token.to_string()));
        tracing::debug!("Local platform logged in");
        Ok(())
    }

    async fn start(&self) -> Result<(), PlatformError> {
        let logged_in = self.read_state(|s| s.token.is_some());
        if !logged_in {
            return Err(PlatformError::Authentication("not logged in".to_string()));
        }

        self.write_state(|s| s.connection = Some(ConnectionState::Connecting));
        self.log("Connecting");
        self.log("Unknown OpCode (Hello)");
        self.write_state(|s| s.connection = Some(ConnectionState::Connected));
        self.log("Connected");

        tracing::info!(guilds = self.roster.len(), "Local platform started");
        self.emit(PlatformEvent::Ready);
        Ok(())
    }

    async fn stop(&self) -> Result<(), PlatformError> {
        self.write_state(|s| s.connection = Some(ConnectionState::Disconnecting));
        self.disconnect_all_voice().await;
        self.write_state(|s| s.connection = Some(ConnectionState::Disconnected));
        self.log("Disconnected");
        Ok(())
    }

    async fn logout(&self) -> Result<(), PlatformError> {
        self.write_state(|s| {
            s.token = None;
            s.activity = None;
        });
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        self.read_state(|s| s.connection.unwrap_or(ConnectionState::Disconnected))
    }

    fn guilds(&self) -> Result<Vec<GuildInfo>, PlatformError> {
        let logged_in = self.read_state(|s| s.token.is_some());
        if !logged_in {
            return Err(PlatformError::NotConnected);
        }
        Ok(self.roster.clone())
    }

    async fn connect_voice(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<Arc<dyn VoiceConnectionPort>, PlatformError> {
        self.require_connected()?;

        let guild = self
            .roster
            .iter()
            .find(|g| g.id == guild_id)
            .ok_or(PlatformError::GuildNotFound(guild_id))?;
        if !guild.voice_channels.iter().any(|c| c.id == channel_id) {
            return Err(PlatformError::ChannelNotFound(channel_id));
        }

        if let Some((_, previous)) = self.voice.remove(&guild_id) {
            let _ = previous.disconnect().await;
        }

        let output_dir = match &self.output {
            VoiceOutput::Discard => None,
            VoiceOutput::Directory(dir) => {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| PlatformError::VoiceConnection(e.to_string()))?;
                Some(dir.clone())
            }
        };

        let connection = Arc::new(LocalVoiceConnection::new(channel_id, output_dir));
        self.voice.insert(guild_id, connection.clone());
        tracing::debug!(guild_id = guild_id, channel_id = channel_id, "Local voice connected");
        Ok(connection)
    }

    async fn set_activity(&self, name: &str) -> Result<(), PlatformError> {
        self.require_connected()?;
        self.write_state(|s| s.activity = Some(name.to_string()));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.events.subscribe()
    }
}

/// 进程内语音连接
pub struct LocalVoiceConnection {
    channel_id: u64,
    output_dir: Option<PathBuf>,
    closed: CancellationToken,
    streams: AtomicU32,
}

impl LocalVoiceConnection {
    fn new(channel_id: u64, output_dir: Option<PathBuf>) -> Self {
        Self {
            channel_id,
            output_dir,
            closed: CancellationToken::new(),
            streams: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl VoiceConnectionPort for LocalVoiceConnection {
    fn channel_id(&self) -> u64 {
        self.channel_id
    }

    fn state(&self) -> ConnectionState {
        if self.closed.is_cancelled() {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Connected
        }
    }

    async fn create_pcm_stream(&self, buffer_size: usize) -> Result<PcmStream, PlatformError> {
        if self.closed.is_cancelled() {
            return Err(PlatformError::NotConnected);
        }

        let seq = self.streams.fetch_add(1, Ordering::SeqCst);
        let target: Box<dyn AsyncWrite + Send + Unpin> = match &self.output_dir {
            Some(dir) => {
                let path = dir.join(format!("voice-{}-{}.pcm", self.channel_id, seq));
                let file = tokio::fs::File::create(&path)
                    .await
                    .map_err(|e| PlatformError::VoiceConnection(format!("{}: {}", path.display(), e)))?;
                tracing::debug!(path = %path.display(), "Voice output file created");
                Box::new(file)
            }
            None => Box::new(tokio::io::sink()),
        };

        Ok(Box::new(ClosableStream {
            inner: BufWriter::with_capacity(buffer_size.max(1), target),
            closed: self.closed.clone(),
        }))
    }

    async fn disconnect(&self) -> Result<(), PlatformError> {
        self.closed.cancel();
        Ok(())
    }
}

/// 连接断开后所有写入都返回 BrokenPipe
struct ClosableStream {
    inner: BufWriter<Box<dyn AsyncWrite + Send + Unpin>>,
    closed: CancellationToken,
}

fn broken_pipe() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "voice connection closed")
}

impl AsyncWrite for ClosableStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        if self.closed.is_cancelled() {
            return Poll::Ready(Err(broken_pipe()));
        }
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        if self.closed.is_cancelled() {
            return Poll::Ready(Err(broken_pipe()));
        }
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        if self.closed.is_cancelled() {
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
