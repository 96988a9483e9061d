//! Console Commands - 控制台宿主的命令解析
//!
//! 以 `/` 开头的行是宿主命令，其余行作为聊天消息注入平台

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// 命令解析错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: /{0}")]
    Unknown(String),

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),
}

/// 控制台输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Servers,
    Channels(String),
    /// `/join <server>/<channel>`
    Join { server: String, channel: String },
    Leave,
    Play(PathBuf),
    /// 列出已安装音色
    Voices,
    Voice(String),
    Volume(i32),
    Speed(i32),
    Quit,
    /// 普通聊天消息
    Say(String),
}

fn required(arg: &str, name: &'static str) -> Result<String, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingArgument(name))
    } else {
        Ok(arg.to_string())
    }
}

fn number(arg: &str, name: &'static str) -> Result<i32, CommandError> {
    let arg = required(arg, name)?;
    arg.parse().map_err(|_| CommandError::InvalidNumber(arg))
}

impl FromStr for ConsoleCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let Some(command) = line.strip_prefix('/') else {
            return Ok(ConsoleCommand::Say(line.to_string()));
        };

        let (name, arg) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
        let arg = arg.trim();

        match name {
            "servers" => Ok(ConsoleCommand::Servers),
            "channels" => Ok(ConsoleCommand::Channels(required(arg, "server")?)),
            "join" => {
                let (server, channel) = arg
                    .split_once('/')
                    .ok_or(CommandError::MissingArgument("<server>/<channel>"))?;
                Ok(ConsoleCommand::Join {
                    server: required(server.trim(), "server")?,
                    channel: required(channel.trim(), "channel")?,
                })
            }
            "leave" => Ok(ConsoleCommand::Leave),
            "play" => Ok(ConsoleCommand::Play(PathBuf::from(required(arg, "path")?))),
            "voices" => Ok(ConsoleCommand::Voices),
            "voice" => Ok(ConsoleCommand::Voice(required(arg, "voice")?)),
            "volume" => Ok(ConsoleCommand::Volume(number(arg, "volume")?)),
            "speed" => Ok(ConsoleCommand::Speed(number(arg, "speed")?)),
            "quit" | "exit" => Ok(ConsoleCommand::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}
