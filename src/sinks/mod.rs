//! QuantumEmit Sinks 模块
//!
//! 提供输出插件的实现：文件输出与 Prometheus remote write 输出，以及按名字
//! 查找插件的注册表。

pub mod file;
pub mod registry;
pub mod remote_write;
pub mod traits;

// 重新导出主要类型
pub use file::{FileOutput, FilePlugin};
pub use registry::{find_plugin, OutputInstance, PLUGINS};
pub use remote_write::{
    classify_status, PayloadCompressor, RemoteWriteOutput, RemoteWritePlugin, SnappyCompressor,
};
pub use traits::{EventType, FlushOutcome, OutputContext, OutputPlugin};
