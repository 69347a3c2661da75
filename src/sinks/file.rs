//! 文件输出插件
//!
//! 每次 flush 以追加模式打开目标文件，把整个批次渲染到内存缓冲区后一次性
//! 写入，然后关闭文件。实例之间不缓存文件句柄。

use crate::config::{FileOutputConfig, OutputFormat, OutputProperties};
use crate::core::decoder::RecordDecoder;
use crate::core::formatter::RecordFormatter;
use crate::error::Result;
use crate::metrics::{self, EncodeTarget};
use crate::sinks::traits::{EventType, FlushOutcome, OutputContext, OutputPlugin};
use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

/// 文件输出插件
#[derive(Debug, Default)]
pub struct FilePlugin;

#[async_trait]
impl OutputPlugin for FilePlugin {
    fn name(&self) -> &'static str {
        "file"
    }

    fn description(&self) -> &'static str {
        "Generate log file"
    }

    fn event_types(&self) -> &'static [EventType] {
        &[EventType::Logs, EventType::Metrics]
    }

    fn validate(&self, props: &OutputProperties) -> Result<()> {
        FileOutputConfig::from_properties(props).map(|_| ())
    }

    async fn init(&self, instance: &str, props: &OutputProperties) -> Result<Box<dyn OutputContext>> {
        let config = FileOutputConfig::from_properties(props)?;
        debug!(instance, ?config, "file output initialized");
        Ok(Box::new(FileOutput::new(instance, config)))
    }
}

/// 渲染统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct RenderStats {
    written: u64,
    skipped: u64,
}

/// 文件输出实例
#[derive(Debug)]
pub struct FileOutput {
    name: String,
    config: FileOutputConfig,
    formatter: RecordFormatter,
}

impl FileOutput {
    pub fn new<S: Into<String>>(name: S, config: FileOutputConfig) -> Self {
        let formatter = RecordFormatter::new(&config);
        Self {
            name: name.into(),
            config,
            formatter,
        }
    }

    /// 解码日志批次并逐条格式化
    ///
    /// 结构错误的记录被跳过；截断或无法解析的尾部结束解码，已渲染的记录保留。
    fn render_logs(
        &self,
        batch: &[u8],
        tag: &str,
        mut csv_header: bool,
        out: &mut Vec<u8>,
    ) -> Result<RenderStats> {
        let mut stats = RenderStats::default();

        for result in RecordDecoder::new(batch) {
            match result {
                Ok(decoded) => {
                    if self
                        .formatter
                        .format_record(tag, &decoded, &mut csv_header, out)?
                    {
                        stats.written += 1;
                    }
                }
                Err(e) if e.is_skippable() => {
                    warn!(instance = %self.name, error = %e, "skipping invalid record");
                    stats.skipped += 1;
                }
                Err(e) => {
                    warn!(instance = %self.name, error = %e, "stopped decoding batch");
                    break;
                }
            }
        }

        Ok(stats)
    }
}

#[async_trait]
impl OutputContext for FileOutput {
    async fn flush(&self, batch: &[u8], tag: &str, event_type: EventType) -> FlushOutcome {
        let path = self.config.resolve_path(tag);

        let mut file = match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) => {
                error!(instance = %self.name, path = %path.display(), error = %e, "error opening output file");
                return FlushOutcome::Error;
            }
        };

        let file_pos = match file.metadata().await {
            Ok(meta) => meta.len(),
            Err(e) => {
                error!(instance = %self.name, path = %path.display(), error = %e, "cannot stat output file");
                return FlushOutcome::Error;
            }
        };

        let diagnostics = crate::diagnostics::get_diagnostics_instance();
        let mut out = Vec::with_capacity(batch.len());

        match event_type {
            EventType::Metrics => {
                match metrics::encode_batch(
                    batch,
                    EncodeTarget::Text,
                    &self.config.add_labels,
                    &mut out,
                ) {
                    Ok(contexts) => {
                        if let Some(diagnostics) = &diagnostics {
                            diagnostics.add_contexts_encoded(contexts as u64);
                        }
                    }
                    Err(e) => {
                        error!(instance = %self.name, error = %e, "cannot encode metrics payload");
                        return FlushOutcome::from_error(&e);
                    }
                }
            }
            EventType::Logs if self.config.format == OutputFormat::Raw => {
                out.extend_from_slice(batch);
            }
            EventType::Logs => {
                let csv_header = self.config.format == OutputFormat::Csv
                    && self.config.csv_column_names
                    && file_pos == 0;
                match self.render_logs(batch, tag, csv_header, &mut out) {
                    Ok(stats) => {
                        if let Some(diagnostics) = &diagnostics {
                            diagnostics.add_records_written(stats.written);
                            diagnostics.add_records_skipped(stats.skipped);
                        }
                    }
                    Err(e) => {
                        error!(instance = %self.name, error = %e, "cannot render records");
                        return FlushOutcome::from_error(&e);
                    }
                }
            }
        }

        if let Err(e) = file.write_all(&out).await {
            error!(instance = %self.name, path = %path.display(), error = %e, "error writing output file");
            return FlushOutcome::Retry;
        }
        if let Err(e) = file.flush().await {
            error!(instance = %self.name, path = %path.display(), error = %e, "error flushing output file");
            return FlushOutcome::Retry;
        }

        if let Some(diagnostics) = &diagnostics {
            diagnostics.add_bytes_written(out.len() as u64);
        }
        debug!(instance = %self.name, path = %path.display(), bytes = out.len(), "batch written");
        FlushOutcome::Ok
    }
}
