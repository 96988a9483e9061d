//! TTS Bot - 宿主应用使用的门面
//!
//! 负责：
//! - 聊天平台的登录、启动与关闭
//! - 订阅平台事件（就绪、日志、聊天消息）
//! - 把会话管理、语音渲染、出站写入串成完整的播报流程
//!
//! 所有公开操作在边界处捕获错误，写入宿主日志后返回 bool 或空值。

use std::path::Path;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::application::error::RelayError;
use crate::application::ports::{
    AudioTranscoderPort, AuthorKind, ChannelContext, ChatPlatformPort, InboundMessage, LogRecord,
    LogSink, PlatformError, PlatformEvent, ReadyListener, SettingsProvider, SpeechEnginePort,
};
use crate::application::services::{
    AudioSinkWriter, JoinOutcome, SessionManager, SinkConfig, SpeechRenderer,
};
use crate::domain::parse_trigger;
use crate::domain::speech::{SpeechRequest, TtsSettings};

/// 默认的“正在玩”状态
pub const DEFAULT_ACTIVITY: &str = "Mashiro";

/// 平台传输层的无害诊断信息，不转发给宿主
const SUPPRESSED_LOG: &str = "Unknown OpCode (Hello)";

/// 宿主注入的回调
#[derive(Clone)]
pub struct HostHooks {
    pub log: Arc<dyn LogSink>,
    pub ready: Arc<dyn ReadyListener>,
    pub settings: Arc<dyn SettingsProvider>,
}

/// 机器人选项
#[derive(Debug, Clone)]
pub struct BotOptions {
    pub activity: String,
    pub sink: SinkConfig,
}

impl Default for BotOptions {
    fn default() -> Self {
        Self {
            activity: DEFAULT_ACTIVITY.to_string(),
            sink: SinkConfig::default(),
        }
    }
}

pub struct TtsBot {
    platform: Arc<dyn ChatPlatformPort>,
    sessions: SessionManager,
    renderer: SpeechRenderer,
    writer: Arc<AudioSinkWriter>,
    hooks: HostHooks,
    activity: String,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl TtsBot {
    pub fn new(
        platform: Arc<dyn ChatPlatformPort>,
        engine: Arc<dyn SpeechEnginePort>,
        transcoder: Arc<dyn AudioTranscoderPort>,
        hooks: HostHooks,
        options: BotOptions,
    ) -> Arc<Self> {
        let writer = Arc::new(AudioSinkWriter::new(transcoder.clone(), options.sink));
        Arc::new(Self {
            sessions: SessionManager::new(platform.clone(), writer.clone()),
            renderer: SpeechRenderer::new(engine, transcoder),
            platform,
            writer,
            hooks,
            activity: options.activity,
            event_task: Mutex::new(None),
        })
    }

    // ========================================================================
    // 生命周期
    // ========================================================================

    /// 订阅平台事件，登录并启动；失败不重试
    pub async fn init(self: &Arc<Self>, token: &str) -> bool {
        self.spawn_event_loop();

        let result = self.connect(token).await;

        match result {
            Ok(()) => {
                tracing::info!("Chat platform started");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Chat platform connection failed");
                self.log(&e.to_string());
                self.log("Error connecting to Discord.");
                false
            }
        }
    }

    async fn connect(&self, token: &str) -> Result<(), RelayError> {
        let started: Result<(), PlatformError> = async {
            self.platform.login(token).await?;
            self.platform.start().await
        }
        .await;
        started.map_err(|e| RelayError::connection(e.to_string()))
    }

    /// 离开语音频道，停止并登出
    pub async fn shutdown(&self) {
        if let Some(handle) = self.take_event_task() {
            handle.abort();
        }

        if let Err(e) = self.sessions.leave().await {
            tracing::warn!(error = %e, "Leaving voice channel during shutdown failed");
        }
        if let Err(e) = self.platform.stop().await {
            tracing::warn!(error = %e, "Platform stop failed");
        }
        if let Err(e) = self.platform.logout().await {
            tracing::warn!(error = %e, "Platform logout failed");
        }
        tracing::info!("TTS bot shut down");
    }

    /// 聊天平台传输层是否已连接
    pub fn is_connected(&self) -> bool {
        self.sessions.is_connected()
    }

    // ========================================================================
    // 名册与频道
    // ========================================================================

    pub fn servers(&self) -> Vec<String> {
        match self.sessions.list_servers() {
            Ok(servers) => servers,
            Err(e) => {
                self.log("Error loading servers.");
                self.log(&e.to_string());
                Vec::new()
            }
        }
    }

    pub fn voice_channels(&self, server: &str) -> Vec<String> {
        match self.sessions.list_voice_channels(server) {
            Ok(channels) => channels,
            Err(e) => {
                tracing::warn!(server = %server, error = %e, "Listing voice channels failed");
                Vec::new()
            }
        }
    }

    /// 加入语音频道
    ///
    /// 找不到频道时不做任何连接，仍返回 true
    pub async fn join_channel(&self, server: &str, channel: &str) -> bool {
        match self.sessions.join(server, channel).await {
            Ok(JoinOutcome::Joined(joined)) => {
                self.log(&format!("Joined channel: {}", joined.channel_name));
                true
            }
            Ok(JoinOutcome::ChannelNotFound) => true,
            Err(e) => {
                self.log("Error joining channel.");
                self.log(&e.to_string());
                false
            }
        }
    }

    /// 合成引擎已安装的音色，供宿主设置界面选择
    pub async fn voices(&self) -> Vec<String> {
        match self.renderer.installed_voices().await {
            Ok(voices) => voices,
            Err(e) => {
                tracing::warn!(error = %e, "Listing installed voices failed");
                self.log(&e.to_string());
                Vec::new()
            }
        }
    }

    pub async fn leave_channel(&self) {
        if let Err(e) = self.sessions.leave().await {
            self.log(&e.to_string());
        }
    }

    // ========================================================================
    // 播报
    // ========================================================================

    /// 合成并播放一段文本
    pub async fn speak(&self, text: &str, voice: &str, volume: i32, speed: i32) -> bool {
        let request = SpeechRequest::new(text, &TtsSettings::new(voice, volume, speed));
        match self.try_speak(&request).await {
            Ok(bytes) => {
                tracing::info!(voice = %voice, text_len = text.len(), bytes = bytes, "Speech delivered");
                true
            }
            Err(e) => {
                tracing::warn!(voice = %voice, error = %e, "Speech dropped");
                self.log(&e.to_string());
                false
            }
        }
    }

    /// 播放音频文件
    pub async fn speak_file(&self, path: &Path) -> bool {
        let result = match self.sessions.current().await {
            Some(session) => self.writer.write_file(&session, path).await,
            None => Err(RelayError::NotConnected),
        };

        match result {
            Ok(bytes) => {
                tracing::info!(path = %path.display(), bytes = bytes, "Audio file played");
                true
            }
            Err(RelayError::AudioDecodeError(reason)) => {
                self.log(&format!("Unable to read file: {}", reason));
                false
            }
            Err(e) => {
                self.log(&e.to_string());
                false
            }
        }
    }

    async fn try_speak(&self, request: &SpeechRequest) -> Result<u64, RelayError> {
        let session = self.sessions.current().await.ok_or(RelayError::NotConnected)?;
        let pcm = self.renderer.render(request).await?;
        self.writer.write_speech(&session, pcm).await
    }

    // ========================================================================
    // 平台事件
    // ========================================================================

    fn spawn_event_loop(self: &Arc<Self>) {
        let mut events = self.platform.subscribe();
        let bot: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(bot) = bot.upgrade() else { break };
                        bot.handle_event(event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped = skipped, "Platform events lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Platform event loop finished");
        });

        if let Some(previous) = self.replace_event_task(handle) {
            previous.abort();
        }
    }

    async fn handle_event(self: &Arc<Self>, event: PlatformEvent) {
        match event {
            PlatformEvent::Ready => self.on_ready().await,
            PlatformEvent::Log(record) => self.on_log(&record),
            PlatformEvent::Message(message) => self.on_message(message),
        }
    }

    async fn on_ready(&self) {
        if let Err(e) = self.platform.set_activity(&self.activity).await {
            tracing::warn!(activity = %self.activity, error = %e, "Setting activity failed");
        }
        self.log("TTS Bot in ready state. Populating servers...");
        self.hooks.ready.on_ready();
    }

    fn on_log(&self, record: &LogRecord) {
        if record.message == SUPPRESSED_LOG {
            return;
        }
        self.log(&format!("[{}] {}", record.source, record.message));
    }

    fn on_message(self: &Arc<Self>, message: InboundMessage) {
        if message.author != AuthorKind::User {
            return;
        }
        if !matches!(message.channel, ChannelContext::GuildText { .. }) {
            return;
        }
        let Some(payload) = parse_trigger(&message.content) else {
            return;
        };

        // 每次触发都重新读取设置
        let settings = self.hooks.settings.tts_settings();
        let text = payload.to_string();
        let bot = Arc::clone(self);
        tokio::spawn(async move {
            bot.speak(&text, &settings.voice, settings.volume, settings.speed).await;
        });
    }

    fn log(&self, message: &str) {
        self.hooks.log.log(message);
    }

    fn replace_event_task(&self, handle: JoinHandle<()>) -> Option<JoinHandle<()>> {
        let mut slot = self.event_task.lock().unwrap_or_else(|e| e.into_inner());
        slot.replace(handle)
    }

    fn take_event_task(&self) -> Option<JoinHandle<()>> {
        let mut slot = self.event_task.lock().unwrap_or_else(|e| e.into_inner());
        slot.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::application::ports::{GuildInfo, VoiceChannelInfo};
    use crate::infrastructure::adapters::{FakeSpeechEngine, LocalChatPlatform, PcmConverter, VoiceOutput};

    struct Harness {
        bot: Arc<TtsBot>,
        platform: Arc<LocalChatPlatform>,
        engine: Arc<FakeSpeechEngine>,
        logs: Arc<Mutex<Vec<String>>>,
        ready: Arc<AtomicUsize>,
        dir: tempfile::TempDir,
    }

    impl Harness {
        fn logs(&self) -> Vec<String> {
            self.logs.lock().unwrap().clone()
        }

        fn output_bytes(&self) -> u64 {
            std::fs::read_dir(self.dir.path())
                .map(|entries| {
                    entries
                        .filter_map(|e| e.ok())
                        .filter_map(|e| e.metadata().ok())
                        .map(|m| m.len())
                        .sum()
                })
                .unwrap_or(0)
        }
    }

    fn harness(settings: TtsSettings) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let roster = vec![GuildInfo {
            id: 1,
            name: "Eorzea".to_string(),
            voice_channels: vec![
                VoiceChannelInfo { id: 11, name: "Raid".to_string(), position: 1 },
                VoiceChannelInfo { id: 10, name: "Lobby".to_string(), position: 0 },
            ],
        }];
        let platform = Arc::new(LocalChatPlatform::new(
            roster,
            VoiceOutput::Directory(dir.path().to_path_buf()),
        ));
        let engine = Arc::new(FakeSpeechEngine::with_voices(&["Haruka"]));

        let logs = Arc::new(Mutex::new(Vec::new()));
        let ready = Arc::new(AtomicUsize::new(0));
        let hooks = HostHooks {
            log: {
                let logs = logs.clone();
                Arc::new(move |m: &str| logs.lock().unwrap().push(m.to_string()))
            },
            ready: {
                let ready = ready.clone();
                Arc::new(move || {
                    ready.fetch_add(1, Ordering::SeqCst);
                })
            },
            settings: Arc::new(settings),
        };

        let bot = TtsBot::new(
            platform.clone(),
            engine.clone(),
            Arc::new(PcmConverter::new()),
            hooks,
            BotOptions::default(),
        );

        Harness { bot, platform, engine, logs, ready, dir }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..300 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn test_init_failure_is_logged() {
        let h = harness(TtsSettings::new("Haruka", 10, 10));

        assert!(!h.bot.init("").await);
        assert!(!h.bot.is_connected());

        let logs = h.logs();
        assert!(logs.iter().any(|l| l.starts_with("Connection error: ")), "logs: {:?}", logs);
        assert_eq!(logs.last().map(String::as_str), Some("Error connecting to Discord."));
    }

    #[tokio::test]
    async fn test_ready_sets_activity_and_notifies_host() {
        let h = harness(TtsSettings::new("Haruka", 10, 10));
        assert!(h.bot.init("token").await);

        let ready = h.ready.clone();
        wait_until(|| ready.load(Ordering::SeqCst) == 1).await;

        assert!(h.bot.is_connected());
        assert_eq!(h.platform.activity().as_deref(), Some(DEFAULT_ACTIVITY));

        let logs = h.logs();
        assert!(logs.contains(&"TTS Bot in ready state. Populating servers...".to_string()));
        assert!(logs.contains(&"[Gateway] Connecting".to_string()));
        assert!(!logs.iter().any(|l| l.contains("Unknown OpCode (Hello)")));
    }

    #[tokio::test]
    async fn test_join_logs_and_missing_channel_still_succeeds() {
        let h = harness(TtsSettings::new("Haruka", 10, 10));
        h.bot.init("token").await;

        assert_eq!(h.bot.voice_channels("Eorzea"), vec!["Lobby", "Raid"]);
        assert!(h.bot.join_channel("Eorzea", "Nowhere").await);
        assert!(h.bot.sessions.current().await.is_none());

        assert!(h.bot.join_channel("Eorzea", "Lobby").await);
        assert!(h.logs().contains(&"Joined channel: Lobby".to_string()));
    }

    #[tokio::test]
    async fn test_trigger_message_is_spoken() {
        let h = harness(TtsSettings::new("Haruka", 12, 10));
        h.bot.init("token").await;
        h.bot.join_channel("Eorzea", "Lobby").await;

        h.platform.inject_message(InboundMessage::guild_text("Eorzea", "general", "!ttshello"));
        h.platform.inject_message(InboundMessage {
            author: AuthorKind::System,
            channel: ChannelContext::GuildText { guild: "Eorzea".to_string(), channel: "general".to_string() },
            content: "!tts pinned a message".to_string(),
        });
        h.platform.inject_message(InboundMessage {
            author: AuthorKind::User,
            channel: ChannelContext::Direct { user: "Alisaie".to_string() },
            content: "!tts whisper".to_string(),
        });
        h.platform.inject_message(InboundMessage::guild_text("Eorzea", "general", "!tts hello world"));

        let engine = h.engine.clone();
        wait_until(|| !engine.requests().is_empty()).await;
        wait_until(|| h.output_bytes() > 0).await;

        let requests = h.engine.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].text, "hello world");
        assert_eq!(requests[0].params.volume, 60);
        assert_eq!(requests[0].params.rate, 0);
    }

    #[tokio::test]
    async fn test_unknown_voice_is_dropped_without_sink() {
        let h = harness(TtsSettings::new("Haruka", 10, 10));
        h.bot.init("token").await;
        h.bot.join_channel("Eorzea", "Lobby").await;

        assert!(!h.bot.speak("hello", "Zira", 10, 10).await);
        assert!(h.logs().contains(&"Voice not found: Zira".to_string()));
        assert!(!h.bot.writer.has_sink().await);
        assert!(h.bot.sessions.current().await.is_some());
    }

    #[tokio::test]
    async fn test_speak_without_channel_fails() {
        let h = harness(TtsSettings::new("Haruka", 10, 10));
        h.bot.init("token").await;

        assert!(!h.bot.speak("hello", "Haruka", 10, 10).await);
        assert!(h.engine.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_logged() {
        let h = harness(TtsSettings::new("Haruka", 10, 10));
        h.bot.init("token").await;
        h.bot.join_channel("Eorzea", "Lobby").await;

        assert!(!h.bot.speak_file(Path::new("/nonexistent/chime.wav")).await);
        assert!(h.logs().iter().any(|l| l.starts_with("Unable to read file: ")));
    }

    #[tokio::test]
    async fn test_speak_file_writes_audio() {
        let h = harness(TtsSettings::new("Haruka", 10, 10));
        h.bot.init("token").await;
        h.bot.join_channel("Eorzea", "Lobby").await;

        let media = tempfile::tempdir().unwrap();
        let path = media.path().join("chime.wav");
        std::fs::write(&path, crate::domain::audio::test_support::sine_wav(44_100, 4410)).unwrap();

        assert!(h.bot.speak_file(&path).await);
        h.bot.leave_channel().await;
        assert!(h.output_bytes() >= 19_000);
    }

    #[tokio::test]
    async fn test_voices_come_from_engine() {
        let h = harness(TtsSettings::new("Haruka", 10, 10));
        assert_eq!(h.bot.voices().await, vec!["Haruka"]);
    }

    #[tokio::test]
    async fn test_servers_before_login_is_empty() {
        let h = harness(TtsSettings::new("Haruka", 10, 10));

        assert!(h.bot.servers().is_empty());
        assert!(h.logs().contains(&"Error loading servers.".to_string()));
    }

    #[tokio::test]
    async fn test_shutdown_disconnects() {
        let h = harness(TtsSettings::new("Haruka", 10, 10));
        h.bot.init("token").await;
        h.bot.join_channel("Eorzea", "Lobby").await;

        h.bot.shutdown().await;

        assert!(!h.bot.is_connected());
        assert!(h.bot.sessions.current().await.is_none());
        assert!(h.bot.servers().is_empty());
    }
}
