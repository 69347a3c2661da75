//! QuantumEmit - 遥测批次的 flush 时转换与投递
//!
//! 宿主把缓冲好的 MessagePack 批次（日志记录或指标上下文）交给输出实例，
//! 实例把批次解码、格式化后写入文件，或编码为 Prometheus remote write 请求
//! 发送到远端，并为整个批次返回一个 [`FlushOutcome`]。
//!
//! # 快速开始
//!
//! ```rust
//! use quantum_emit::config::OutputProperties;
//! use quantum_emit::sinks::{EventType, FlushOutcome, OutputInstance};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     quantum_emit::init_tracing();
//!
//!     let props = OutputProperties::new()
//!         .with("path", std::env::temp_dir().to_string_lossy().into_owned())
//!         .with("format", "plain");
//!     let output = OutputInstance::new("file", 0, &props).await?;
//!
//!     // 宿主提供的 MessagePack 批次
//!     let batch: Vec<u8> = Vec::new();
//!     let outcome = output.flush(&batch, "quantum_emit_doc.log", EventType::Logs).await;
//!     assert_eq!(outcome, FlushOutcome::Ok);
//!
//!     output.exit().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod error;
pub mod metrics;
pub mod sinks;

// 重新导出主要类型
pub use config::{
    load_config_from_file, load_config_from_str, validate_config, FileOutputConfig, OutputFormat,
    OutputProperties, QuantumEmitConfig, RemoteWriteConfig,
};
pub use diagnostics::{get_diagnostics, DiagnosticsSnapshot};
pub use error::{QuantumEmitError, Result};
pub use sinks::{EventType, FlushOutcome, OutputInstance};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// tracing 订阅器安装标记
static TRACING_INIT: OnceCell<bool> = OnceCell::new();

/// 安装 fmt 订阅器，日志级别来自 `RUST_LOG`（默认 `info`）
///
/// 可以重复调用；返回本进程中订阅器是否由 QuantumEmit 安装。
pub fn init_tracing() -> bool {
    *TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok()
    })
}
