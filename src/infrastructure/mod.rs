//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现，以及控制台宿主的命令解析

pub mod adapters;
pub mod console;

pub use console::{CommandError, ConsoleCommand};
