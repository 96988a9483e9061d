//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod host;
pub mod platform;
pub mod transcoder;
pub mod tts;

pub use host::*;
pub use platform::*;
pub use transcoder::*;
pub use tts::*;
