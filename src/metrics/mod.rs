//! 指标编码适配器
//!
//! 逐个解码批次中的指标上下文，附加静态标签后编码为文本或 remote write
//! 协议。每个上下文编码完成后立即释放。

pub mod context;
pub mod remote_write;
pub mod text;

pub use context::{MetricFamily, MetricKind, MetricSample, MetricsContext};

use crate::core::decoder::{DecodeError, MetricsDecoder};
use crate::error::Result;
use tracing::{debug, warn};

/// 编码目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeTarget {
    /// 每个采样点一行文本
    Text,
    /// Prometheus `WriteRequest` protobuf
    RemoteWrite,
}

/// 编码整个指标批次，结果追加到 `out`，返回编码的上下文数量
///
/// 至少成功一个上下文之后，任何解码错误都只结束解码，已编码的上下文照常
/// 交付；一个都没有时返回解码错误（空批次为 [`DecodeError::Truncated`]）。
pub fn encode_batch(
    buf: &[u8],
    target: EncodeTarget,
    labels: &[(String, String)],
    out: &mut Vec<u8>,
) -> Result<usize> {
    let mut decoder = MetricsDecoder::new(buf);
    let mut encoded = 0usize;

    while let Some(result) = decoder.next_context() {
        let mut ctx = match result {
            Ok(ctx) => ctx,
            Err(DecodeError::Truncated { offset }) if encoded > 0 => {
                debug!(offset, contexts = encoded, "metrics batch exhausted");
                break;
            }
            Err(e) if encoded > 0 => {
                warn!(error = %e, contexts = encoded, "stopped decoding metrics batch");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        for (key, value) in labels {
            ctx.add_label(key.as_str(), value.as_str());
        }

        match target {
            EncodeTarget::Text => text::encode_text(&ctx, out)?,
            EncodeTarget::RemoteWrite => remote_write::encode_remote_write(&ctx, out)?,
        }
        encoded += 1;
    }

    Ok(encoded)
}
