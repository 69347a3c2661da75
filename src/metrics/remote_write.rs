//! Prometheus remote write 协议编码
//!
//! 消息定义与 `prometheus/prompb` 的 `WriteRequest` 保持字段号一致。多个
//! `WriteRequest` 编码结果直接拼接仍然是一个合法的 `WriteRequest`，因此同一
//! 批次的所有上下文可以追加到同一个缓冲区。

use super::context::{MetricFamily, MetricKind, MetricsContext};
use crate::error::{QuantumEmitError, Result};
use prost::Message;

/// 指标名标签
pub const METRIC_NAME_LABEL: &str = "__name__";

#[derive(Clone, PartialEq, prost::Message)]
pub struct WriteRequest {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
    #[prost(message, repeated, tag = "3")]
    pub metadata: Vec<MetricMetadata>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TimeSeries {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Sample {
    #[prost(double, tag = "1")]
    pub value: f64,
    /// 毫秒时间戳
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MetricMetadata {
    #[prost(enumeration = "MetricType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub metric_family_name: String,
    #[prost(string, tag = "4")]
    pub help: String,
    #[prost(string, tag = "5")]
    pub unit: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum MetricType {
    Unknown = 0,
    Counter = 1,
    Gauge = 2,
    Histogram = 3,
    Gaugehistogram = 4,
    Summary = 5,
    Info = 6,
    Stateset = 7,
}

impl From<MetricKind> for MetricType {
    fn from(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => MetricType::Counter,
            MetricKind::Gauge => MetricType::Gauge,
            MetricKind::Untyped => MetricType::Unknown,
        }
    }
}

/// 把一个上下文转换为 `WriteRequest`
pub fn build_write_request(ctx: &MetricsContext) -> Result<WriteRequest> {
    let mut request = WriteRequest::default();
    for family in &ctx.families {
        append_family(ctx, family, &mut request)?;
        request.metadata.push(MetricMetadata {
            r#type: MetricType::from(family.kind) as i32,
            metric_family_name: family.name.clone(),
            help: family.help.clone(),
            unit: String::new(),
        });
    }
    Ok(request)
}

fn append_family(ctx: &MetricsContext, family: &MetricFamily, request: &mut WriteRequest) -> Result<()> {
    for sample in &family.samples {
        if sample.label_values.len() != family.label_keys.len() {
            return Err(QuantumEmitError::encode(format!(
                "{}: {} label keys but {} label values",
                family.name,
                family.label_keys.len(),
                sample.label_values.len()
            )));
        }

        let mut labels: Vec<Label> = std::iter::once((METRIC_NAME_LABEL, family.name.as_str()))
            .chain(ctx.static_labels.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .chain(
                family
                    .label_keys
                    .iter()
                    .zip(&sample.label_values)
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            )
            .map(|(name, value)| Label {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect();
        labels.sort_by(|a, b| a.name.cmp(&b.name));

        request.timeseries.push(TimeSeries {
            labels,
            samples: vec![Sample {
                value: sample.value,
                timestamp: (sample.timestamp / 1_000_000) as i64,
            }],
        });
    }
    Ok(())
}

/// 把一个上下文编码并追加到 `out`
pub fn encode_remote_write(ctx: &MetricsContext, out: &mut Vec<u8>) -> Result<()> {
    let request = build_write_request(ctx)?;
    request
        .encode(out)
        .map_err(|e| QuantumEmitError::encode(format!("protobuf encoding failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> MetricsContext {
        let mut ctx = MetricsContext::new().with_family(
            MetricFamily::new("requests_total", MetricKind::Counter)
                .with_help("Total requests")
                .with_label_keys(&["method"])
                .with_sample(&["GET"], 42.0, 1_700_000_000_123_000_000),
        );
        ctx.add_label("app", "demo");
        ctx
    }

    #[test]
    fn test_labels_sorted_with_name() {
        let request = build_write_request(&context()).unwrap();
        assert_eq!(request.timeseries.len(), 1);

        let names: Vec<_> = request.timeseries[0]
            .labels
            .iter()
            .map(|l| l.name.as_str())
            .collect();
        assert_eq!(names, vec!["__name__", "app", "method"]);
        assert_eq!(request.timeseries[0].labels[0].value, "requests_total");
        assert_eq!(request.timeseries[0].samples[0].timestamp, 1_700_000_000_123);
        assert_eq!(request.metadata[0].r#type, MetricType::Counter as i32);
        assert_eq!(request.metadata[0].help, "Total requests");
    }

    #[test]
    fn test_concatenated_encodings_merge() {
        let mut out = Vec::new();
        encode_remote_write(&context(), &mut out).unwrap();
        encode_remote_write(&context(), &mut out).unwrap();

        let decoded = WriteRequest::decode(out.as_slice()).unwrap();
        assert_eq!(decoded.timeseries.len(), 2);
        assert_eq!(decoded.metadata.len(), 2);
    }

    #[test]
    fn test_label_mismatch_is_error() {
        let ctx = MetricsContext::new().with_family(
            MetricFamily::new("x", MetricKind::Gauge).with_sample(&["extra"], 1.0, 0),
        );
        assert!(encode_remote_write(&ctx, &mut Vec::new()).is_err());
    }
}
