//! TTS Relay - 控制台宿主
//!
//! 从标准输入读取命令与聊天消息，驱动 TtsBot：
//! - `/servers`, `/channels <server>`, `/join <server>/<channel>`, `/leave`
//! - `/play <path>`, `/voices`, `/voice <name>`, `/volume <n>`, `/speed <n>`, `/quit`
//! - 其他行作为第一个服务器文本频道中的聊天消息

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use tts_relay::application::ports::{InboundMessage, SpeechEnginePort};
use tts_relay::application::{HostHooks, TtsBot};
use tts_relay::config::{load_config, print_config, AppConfig, EngineKind, LogConfig};
use tts_relay::infrastructure::adapters::{
    FakeSpeechEngine, HttpSpeechEngine, HttpSpeechEngineConfig, LocalChatPlatform, PcmConverter,
    SharedSettings, TracingLogSink, VoiceOutput,
};
use tts_relay::infrastructure::ConsoleCommand;

const CONSOLE_CHANNEL: &str = "console";

fn init_tracing(log: &LogConfig) {
    let log_filter = format!("{},tts_relay={}", log.level, log.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_engine(config: &AppConfig) -> anyhow::Result<Arc<dyn SpeechEnginePort>> {
    Ok(match config.tts.engine {
        EngineKind::Http => {
            let engine_config =
                HttpSpeechEngineConfig::new(&config.tts.url).with_timeout(config.tts.timeout_secs);
            Arc::new(HttpSpeechEngine::new(engine_config)?)
        }
        EngineKind::Fake => Arc::new(FakeSpeechEngine::default()),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config.log);
    tracing::info!("TTS Relay - console host");
    print_config(&config);

    let output = match &config.local.output_dir {
        Some(dir) => VoiceOutput::Directory(dir.clone()),
        None => VoiceOutput::Discard,
    };
    let platform = Arc::new(LocalChatPlatform::new(config.local.guilds.clone(), output));
    let settings = SharedSettings::new(config.tts.settings());

    let hooks = HostHooks {
        log: Arc::new(TracingLogSink),
        ready: Arc::new(|| tracing::info!("Host notified: bot ready")),
        settings: Arc::new(settings.clone()),
    };

    let bot = TtsBot::new(
        platform.clone(),
        build_engine(&config)?,
        Arc::new(PcmConverter::new()),
        hooks,
        config.bot_options(),
    );

    if !bot.init(&config.bot.token).await {
        anyhow::bail!("Bot failed to start, check TTS_RELAY_BOT__TOKEN");
    }

    let default_guild = config
        .local
        .guilds
        .first()
        .map(|g| g.name.clone())
        .unwrap_or_default();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal");
                None
            }
        };

        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            ConsoleCommand::Servers => {
                for server in bot.servers() {
                    println!("{}", server);
                }
            }
            ConsoleCommand::Channels(server) => {
                for channel in bot.voice_channels(&server) {
                    println!("{}", channel);
                }
            }
            ConsoleCommand::Join { server, channel } => {
                let ok = bot.join_channel(&server, &channel).await;
                println!("join: {}", ok);
            }
            ConsoleCommand::Leave => bot.leave_channel().await,
            ConsoleCommand::Play(path) => {
                let bot = bot.clone();
                tokio::spawn(async move {
                    bot.speak_file(&path).await;
                });
            }
            ConsoleCommand::Voices => {
                for voice in bot.voices().await {
                    println!("{}", voice);
                }
            }
            ConsoleCommand::Voice(voice) => settings.update(|s| s.voice = voice),
            ConsoleCommand::Volume(volume) => settings.update(|s| s.volume = volume),
            ConsoleCommand::Speed(speed) => settings.update(|s| s.speed = speed),
            ConsoleCommand::Quit => break,
            ConsoleCommand::Say(text) => {
                platform.inject_message(InboundMessage::guild_text(&default_guild, CONSOLE_CHANNEL, text));
            }
        }
    }

    bot.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}
