//! 聊天触发指令解析

/// 触发前缀，大小写敏感，包含结尾空格
pub const TRIGGER_PREFIX: &str = "!tts ";

/// 取出触发指令后的朗读内容
///
/// 仅当消息以 `"!tts "` 开头时返回剩余部分
pub fn parse_trigger(content: &str) -> Option<&str> {
    content.strip_prefix(TRIGGER_PREFIX)
}
