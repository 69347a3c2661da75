//! QuantumEmit 核心模块
//!
//! 包含记录模型、二进制流解码器、模板引擎和格式化器。

pub mod decoder;
pub mod formatter;
pub mod printer;
pub mod record;
pub mod template;

pub use decoder::{DecodeError, DecodedRecord, MetricsDecoder, RecordDecoder};
pub use formatter::RecordFormatter;
pub use record::{EventTime, Record};
pub use template::Template;

/// 平台换行符
#[cfg(windows)]
pub const NEWLINE: &str = "\r\n";
/// 平台换行符
#[cfg(not(windows))]
pub const NEWLINE: &str = "\n";
