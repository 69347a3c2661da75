//! 指标的文本编码
//!
//! 每个采样点一行：
//!
//! ```text
//! 2023-11-14T22:13:20.000000000Z http_requests_total{region="eu",method="GET"} = 42
//! ```

use super::context::{MetricFamily, MetricsContext};
use crate::core::NEWLINE;
use crate::error::{QuantumEmitError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::io::Write;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// 纳秒时间戳格式化为 RFC3339（UTC，9 位小数）
pub fn format_timestamp(nanos: u64) -> String {
    let secs = (nanos / NANOS_PER_SEC) as i64;
    let sub = (nanos % NANOS_PER_SEC) as u32;
    DateTime::<Utc>::from_timestamp(secs, sub)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// 把一个上下文编码为文本并追加到 `out`
pub fn encode_text(ctx: &MetricsContext, out: &mut Vec<u8>) -> Result<()> {
    for family in &ctx.families {
        encode_family(ctx, family, out)?;
    }
    Ok(())
}

fn encode_family(ctx: &MetricsContext, family: &MetricFamily, out: &mut Vec<u8>) -> Result<()> {
    for sample in &family.samples {
        if sample.label_values.len() != family.label_keys.len() {
            return Err(QuantumEmitError::encode(format!(
                "{}: {} label keys but {} label values",
                family.name,
                family.label_keys.len(),
                sample.label_values.len()
            )));
        }

        write!(out, "{} {}", format_timestamp(sample.timestamp), family.name)?;

        let labels: Vec<(&str, &str)> = ctx
            .static_labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(
                family
                    .label_keys
                    .iter()
                    .zip(&sample.label_values)
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            )
            .collect();
        if !labels.is_empty() {
            out.write_all(b"{")?;
            for (i, (k, v)) in labels.iter().enumerate() {
                if i > 0 {
                    out.write_all(b",")?;
                }
                write!(out, "{}=\"{}\"", k, v)?;
            }
            out.write_all(b"}")?;
        }

        write!(out, " = {}{}", sample.value, NEWLINE)?;
    }
    Ok(())
}
