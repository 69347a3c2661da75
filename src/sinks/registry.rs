//! 输出插件注册表
//!
//! 插件在静态表中注册，按名字查找。[`OutputInstance`] 持有一个插件与它创建的
//! 实例，负责记录诊断数据并保证 `exit` 只调用一次。

use crate::config::{OutputProperties, OutputSection, QuantumEmitConfig};
use crate::error::{QuantumEmitError, Result};
use crate::sinks::file::FilePlugin;
use crate::sinks::remote_write::RemoteWritePlugin;
use crate::sinks::traits::{EventType, FlushOutcome, OutputContext, OutputPlugin};
use tracing::{debug, info, warn};

/// 已注册的插件
pub static PLUGINS: &[&dyn OutputPlugin] = &[&FilePlugin, &RemoteWritePlugin];

/// 按名字查找插件（不区分大小写）
pub fn find_plugin(name: &str) -> Option<&'static dyn OutputPlugin> {
    PLUGINS
        .iter()
        .copied()
        .find(|plugin| plugin.name().eq_ignore_ascii_case(name))
}

/// 一个已初始化的输出
#[derive(Debug)]
pub struct OutputInstance {
    name: String,
    plugin: &'static dyn OutputPlugin,
    context: Box<dyn OutputContext>,
}

impl OutputInstance {
    /// 查找插件并初始化实例
    ///
    /// 实例名为 `<plugin>.<index>`。
    pub async fn new(plugin_name: &str, index: usize, props: &OutputProperties) -> Result<Self> {
        let plugin = find_plugin(plugin_name).ok_or_else(|| {
            QuantumEmitError::config(format!("unknown output plugin '{}'", plugin_name))
        })?;
        let name = format!("{}.{}", plugin.name(), index);
        let context = plugin.init(&name, props).await?;
        crate::diagnostics::init_diagnostics();

        info!(instance = %name, description = plugin.description(), "output initialized");
        Ok(Self {
            name,
            plugin,
            context,
        })
    }

    /// 按配置文件中的全部段创建实例
    pub async fn from_config(config: &QuantumEmitConfig) -> Result<Vec<Self>> {
        let mut instances = Vec::with_capacity(config.outputs.len());
        for (index, OutputSection { name, properties }) in config.outputs.iter().enumerate() {
            instances.push(Self::new(name, index, properties).await?);
        }
        Ok(instances)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plugin(&self) -> &'static dyn OutputPlugin {
        self.plugin
    }

    /// 处理一个批次
    pub async fn flush(&self, batch: &[u8], tag: &str, event_type: EventType) -> FlushOutcome {
        if !self.plugin.accepts(event_type) {
            warn!(instance = %self.name, %event_type, "event type not supported by output");
        }

        let outcome = self.context.flush(batch, tag, event_type).await;
        if let Some(diagnostics) = crate::diagnostics::get_diagnostics_instance() {
            diagnostics.record_flush(outcome);
        }
        debug!(instance = %self.name, tag, %event_type, %outcome, bytes = batch.len(), "flush finished");
        outcome
    }

    /// 释放实例
    pub async fn exit(self) -> Result<()> {
        let result = self.context.exit().await;
        if let Err(e) = &result {
            warn!(instance = %self.name, error = %e, "output exit failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use tempfile::TempDir;

    #[test]
    fn test_find_plugin() {
        assert_eq!(find_plugin("file").map(|p| p.name()), Some("file"));
        assert_eq!(
            find_plugin("Prometheus_Remote_Write").map(|p| p.name()),
            Some("prometheus_remote_write")
        );
        assert!(find_plugin("kafka").is_none());
    }

    #[test]
    fn test_event_types() {
        let file = find_plugin("file").unwrap();
        assert!(file.accepts(EventType::Logs));
        assert!(file.accepts(EventType::Metrics));

        let remote = find_plugin("prometheus_remote_write").unwrap();
        assert!(!remote.accepts(EventType::Logs));
    }

    #[tokio::test]
    async fn test_instance_lifecycle() {
        let dir = TempDir::new().unwrap();
        let props = OutputProperties::new()
            .with("path", dir.path().to_string_lossy().into_owned())
            .with("format", "plain");
        let instance = OutputInstance::new("file", 0, &props).await.unwrap();
        assert_eq!(instance.name(), "file.0");

        let mut batch = Vec::new();
        rmpv::encode::write_value(
            &mut batch,
            &rmpv::Value::Array(vec![
                rmpv::Value::from(1),
                rmpv::Value::Map(vec![(rmpv::Value::from("k"), rmpv::Value::from("v"))]),
            ]),
        )
        .unwrap();

        assert_eq!(instance.flush(&batch, "t", EventType::Logs).await, FlushOutcome::Ok);
        assert!(crate::diagnostics::get_diagnostics().flushes_ok >= 1);
        instance.exit().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_plugin_and_bad_config() {
        let err = OutputInstance::new("kafka", 0, &OutputProperties::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("kafka"));

        let err = OutputInstance::new("file", 0, &OutputProperties::new().with("format", "xml"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuantumEmitError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_instances_from_config() {
        let config = load_config_from_str(
            r#"
            [[output]]
            name = "file"
            format = "csv"

            [[output]]
            name = "prometheus_remote_write"
            host = "127.0.0.1"
            port = 9090
            "#,
        )
        .unwrap();

        let instances = OutputInstance::from_config(&config).await.unwrap();
        let names: Vec<_> = instances.iter().map(|i| i.name().to_string()).collect();
        assert_eq!(names, vec!["file.0", "prometheus_remote_write.1"]);
    }
}
