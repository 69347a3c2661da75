//! QuantumEmit 输出插件接口
//!
//! 每个输出由一个 [`OutputPlugin`] 描述：`init` 把配置键值对解析为实例
//! ([`OutputContext`])，宿主随后对实例反复调用 `flush`，最后调用 `exit`。
//!
//! # 使用示例
//!
//! ```rust
//! use quantum_emit::config::OutputProperties;
//! use quantum_emit::error::Result;
//! use quantum_emit::sinks::traits::{EventType, FlushOutcome, OutputContext, OutputPlugin};
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! struct NullPlugin;
//!
//! #[derive(Debug)]
//! struct NullOutput;
//!
//! #[async_trait]
//! impl OutputContext for NullOutput {
//!     async fn flush(&self, _batch: &[u8], _tag: &str, _event_type: EventType) -> FlushOutcome {
//!         FlushOutcome::Ok
//!     }
//! }
//!
//! #[async_trait]
//! impl OutputPlugin for NullPlugin {
//!     fn name(&self) -> &'static str {
//!         "null"
//!     }
//!
//!     fn description(&self) -> &'static str {
//!         "Discard every batch"
//!     }
//!
//!     fn event_types(&self) -> &'static [EventType] {
//!         &[EventType::Logs, EventType::Metrics]
//!     }
//!
//!     fn validate(&self, _props: &OutputProperties) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     async fn init(&self, _instance: &str, _props: &OutputProperties) -> Result<Box<dyn OutputContext>> {
//!         Ok(Box::new(NullOutput))
//!     }
//! }
//! ```

use crate::config::OutputProperties;
use crate::error::{QuantumEmitError, Result};
use async_trait::async_trait;
use std::fmt::{self, Debug};

/// 一次 flush 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushOutcome {
    /// 全部送达
    Ok,
    /// 暂时失败，宿主应保留批次稍后重试
    Retry,
    /// 永久失败，丢弃批次
    Error,
}

impl FlushOutcome {
    /// 按错误是否可恢复映射为结果
    pub fn from_error(err: &QuantumEmitError) -> Self {
        if err.is_recoverable() {
            FlushOutcome::Retry
        } else {
            FlushOutcome::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlushOutcome::Ok => "ok",
            FlushOutcome::Retry => "retry",
            FlushOutcome::Error => "error",
        }
    }
}

impl fmt::Display for FlushOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 批次的事件类型，由宿主提供
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Logs,
    Metrics,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Logs => f.write_str("logs"),
            EventType::Metrics => f.write_str("metrics"),
        }
    }
}

/// 已初始化的输出实例
///
/// 实例配置在 `init` 之后只读，因此 `flush` 只需要 `&self`，不同批次可以
/// 并发调用。
#[async_trait]
pub trait OutputContext: Send + Sync + Debug {
    /// 处理一个批次，整个批次只产生一个结果
    async fn flush(&self, batch: &[u8], tag: &str, event_type: EventType) -> FlushOutcome;

    /// 释放实例持有的资源
    async fn exit(&self) -> Result<()> {
        Ok(())
    }
}

/// 输出插件
#[async_trait]
pub trait OutputPlugin: Send + Sync + Debug {
    /// 注册名
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// 插件接受的事件类型
    fn event_types(&self) -> &'static [EventType];

    /// 只解析配置，不创建实例
    fn validate(&self, props: &OutputProperties) -> Result<()>;

    /// 创建实例；配置错误在这里返回
    async fn init(&self, instance: &str, props: &OutputProperties) -> Result<Box<dyn OutputContext>>;

    /// 是否接受指定事件类型
    fn accepts(&self, event_type: EventType) -> bool {
        self.event_types().contains(&event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    // 测试用的 Mock 输出
    #[derive(Debug, Default)]
    struct MockOutput {
        batches: Arc<AtomicU64>,
        should_fail: bool,
    }

    #[async_trait]
    impl OutputContext for MockOutput {
        async fn flush(&self, _batch: &[u8], _tag: &str, _event_type: EventType) -> FlushOutcome {
            if self.should_fail {
                return FlushOutcome::Retry;
            }
            self.batches.fetch_add(1, Ordering::Relaxed);
            FlushOutcome::Ok
        }
    }

    #[derive(Debug)]
    struct MockPlugin;

    #[async_trait]
    impl OutputPlugin for MockPlugin {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn description(&self) -> &'static str {
            "Mock output for testing"
        }

        fn event_types(&self) -> &'static [EventType] {
            &[EventType::Metrics]
        }

        fn validate(&self, props: &OutputProperties) -> Result<()> {
            props.ensure_known("mock", &["fail"])
        }

        async fn init(&self, _instance: &str, props: &OutputProperties) -> Result<Box<dyn OutputContext>> {
            self.validate(props)?;
            Ok(Box::new(MockOutput {
                should_fail: props.get("fail").is_some(),
                ..Default::default()
            }))
        }
    }

    #[test]
    fn test_outcome_from_error() {
        assert_eq!(
            FlushOutcome::from_error(&QuantumEmitError::network("refused")),
            FlushOutcome::Retry
        );
        assert_eq!(
            FlushOutcome::from_error(&QuantumEmitError::compression("boom")),
            FlushOutcome::Error
        );
        assert_eq!(FlushOutcome::Retry.to_string(), "retry");
        assert_eq!(EventType::Metrics.to_string(), "metrics");
    }

    #[tokio::test]
    async fn test_plugin_lifecycle() {
        let plugin = MockPlugin;
        assert!(plugin.accepts(EventType::Metrics));
        assert!(!plugin.accepts(EventType::Logs));

        let output = plugin.init("mock.0", &OutputProperties::new()).await.unwrap();
        assert_eq!(output.flush(b"", "tag", EventType::Metrics).await, FlushOutcome::Ok);
        assert!(output.exit().await.is_ok());

        let failing = plugin
            .init("mock.1", &OutputProperties::new().with("fail", "yes"))
            .await
            .unwrap();
        assert_eq!(failing.flush(b"", "tag", EventType::Metrics).await, FlushOutcome::Retry);
    }

    #[tokio::test]
    async fn test_init_rejects_unknown_property() {
        let err = MockPlugin
            .init("mock.0", &OutputProperties::new().with("colour", "red"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuantumEmitError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_concurrent_flushes() {
        let batches = Arc::new(AtomicU64::new(0));
        let output = Arc::new(MockOutput {
            batches: batches.clone(),
            should_fail: false,
        });
        let mut handles = vec![];

        for i in 0..10 {
            let output = Arc::clone(&output);
            handles.push(tokio::spawn(async move {
                output.flush(&[i as u8], "tag", EventType::Logs).await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), FlushOutcome::Ok);
        }
        assert_eq!(batches.load(Ordering::Relaxed), 10);
    }
}
