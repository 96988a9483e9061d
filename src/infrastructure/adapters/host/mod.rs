//! Host Adapter - 宿主回调的默认实现

mod shared_settings;
mod tracing_log_sink;

pub use shared_settings::SharedSettings;
pub use tracing_log_sink::TracingLogSink;
