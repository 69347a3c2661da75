//! Prometheus remote write 输出插件
//!
//! 把指标批次编码为 `WriteRequest`，经 snappy 压缩后以 HTTP POST 发送。
//! HTTP 客户端在 `init` 时创建并在实例内复用连接池。

use crate::config::{OutputProperties, RemoteWriteConfig};
use crate::error::{QuantumEmitError, Result};
use crate::metrics::{self, EncodeTarget};
use crate::sinks::traits::{EventType, FlushOutcome, OutputContext, OutputPlugin};
use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const REMOTE_WRITE_VERSION_HEADER: &str = "x-prometheus-remote-write-version";
const REMOTE_WRITE_VERSION: &str = "0.1.0";
const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";
const AGENT: &str = "QuantumEmit";

/// 负载压缩器
pub trait PayloadCompressor: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// 压缩负载；失败时批次被丢弃
    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>>;
}

/// snappy 块格式压缩
#[derive(Debug, Default, Clone, Copy)]
pub struct SnappyCompressor;

impl PayloadCompressor for SnappyCompressor {
    fn name(&self) -> &'static str {
        "snappy"
    }

    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        snap::raw::Encoder::new()
            .compress_vec(data)
            .map(Cow::Owned)
            .map_err(|e| QuantumEmitError::compression(e.to_string()))
    }
}

/// 按状态码分类：200..=205 为成功，其余都需要重试
pub fn classify_status(status: u16) -> FlushOutcome {
    if (200..=205).contains(&status) {
        FlushOutcome::Ok
    } else {
        FlushOutcome::Retry
    }
}

/// remote write 输出插件
#[derive(Debug, Default)]
pub struct RemoteWritePlugin;

#[async_trait]
impl OutputPlugin for RemoteWritePlugin {
    fn name(&self) -> &'static str {
        "prometheus_remote_write"
    }

    fn description(&self) -> &'static str {
        "Prometheus remote write"
    }

    fn event_types(&self) -> &'static [EventType] {
        &[EventType::Metrics]
    }

    fn validate(&self, props: &OutputProperties) -> Result<()> {
        let config = RemoteWriteConfig::from_properties(props)?;
        build_headers(&config)?;
        if let Some(proxy) = &config.proxy {
            parse_proxy(proxy)?;
        }
        Ok(())
    }

    async fn init(&self, instance: &str, props: &OutputProperties) -> Result<Box<dyn OutputContext>> {
        let config = RemoteWriteConfig::from_properties(props)?;
        debug!(instance, ?config, "remote write output initialized");
        Ok(Box::new(RemoteWriteOutput::new(instance, config)?))
    }
}

fn parse_proxy(proxy: &str) -> Result<reqwest::Proxy> {
    reqwest::Proxy::all(proxy)
        .map_err(|e| QuantumEmitError::config(format!("invalid proxy '{}': {}", proxy, e)))
}

/// 按发送顺序构建请求头
///
/// 同名头必须相邻：请求头表会把同名的值归并到第一次出现的位置，
/// 交错的同名头无法按配置顺序发送，因此在配置阶段拒绝。
fn build_headers(config: &RemoteWriteConfig) -> Result<Vec<(HeaderName, HeaderValue)>> {
    let mut headers = vec![
        (CONTENT_TYPE, HeaderValue::from_static(PROTOBUF_CONTENT_TYPE)),
        (
            HeaderName::from_static(REMOTE_WRITE_VERSION_HEADER),
            HeaderValue::from_static(REMOTE_WRITE_VERSION),
        ),
    ];

    if let Some(user) = &config.http_user {
        let credentials = format!("{}:{}", user, config.http_passwd);
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        let mut value = HeaderValue::from_str(&format!("Basic {}", encoded))
            .map_err(|e| QuantumEmitError::config(format!("invalid credentials: {}", e)))?;
        value.set_sensitive(true);
        headers.push((AUTHORIZATION, value));
    }

    headers.push((USER_AGENT, HeaderValue::from_static(AGENT)));

    for (key, value) in &config.headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| QuantumEmitError::config(format!("invalid header name '{}': {}", key, e)))?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            QuantumEmitError::config(format!("invalid value for header '{}': {}", key, e))
        })?;
        headers.push((name, value));
    }

    let mut seen = HashSet::new();
    for (i, (name, _)) in headers.iter().enumerate() {
        let repeats_previous = i > 0 && headers[i - 1].0 == *name;
        if !seen.insert(name.clone()) && !repeats_previous {
            return Err(QuantumEmitError::config(format!(
                "header '{}' must be configured contiguously to keep its position",
                name
            )));
        }
    }

    Ok(headers)
}

/// remote write 输出实例
#[derive(Debug)]
pub struct RemoteWriteOutput {
    name: String,
    config: RemoteWriteConfig,
    endpoint: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    client: reqwest::Client,
    compressor: Arc<dyn PayloadCompressor>,
}

impl RemoteWriteOutput {
    /// 使用 snappy 压缩创建实例
    pub fn new<S: Into<String>>(name: S, config: RemoteWriteConfig) -> Result<Self> {
        Self::with_compressor(name, config, Arc::new(SnappyCompressor))
    }

    /// 使用指定压缩器创建实例
    pub fn with_compressor<S: Into<String>>(
        name: S,
        config: RemoteWriteConfig,
        compressor: Arc<dyn PayloadCompressor>,
    ) -> Result<Self> {
        let headers = build_headers(&config)?;

        let builder = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms));
        let builder = match &config.proxy {
            Some(proxy) => builder.proxy(parse_proxy(proxy)?),
            None => builder.no_proxy(),
        };
        let client = builder.build().map_err(|e| {
            QuantumEmitError::InitializationError(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            name: name.into(),
            endpoint: config.endpoint(),
            config,
            headers,
            client,
            compressor,
        })
    }

    /// 压缩并发送一个已编码的负载
    async fn deliver(&self, payload: &[u8]) -> FlushOutcome {
        let compressed = match self.compressor.compress(payload) {
            Ok(compressed) => compressed,
            Err(e) => {
                error!(instance = %self.name, compressor = self.compressor.name(), error = %e, "cannot compress payload");
                return FlushOutcome::Error;
            }
        };
        let sent = compressed.len();

        let mut request = self.client.post(&self.endpoint);
        for (name, value) in &self.headers {
            request = request.header(name.clone(), value.clone());
        }

        let response = match request.body(compressed.into_owned()).send().await {
            Ok(response) => response,
            Err(e) => {
                let err = QuantumEmitError::network(e.to_string());
                error!(instance = %self.name, endpoint = %self.endpoint, error = %err, "no upstream connections available");
                return FlushOutcome::from_error(&err);
            }
        };

        let status = response.status().as_u16();
        let outcome = classify_status(status);
        let body = if self.config.log_response_payload {
            response.text().await.unwrap_or_default()
        } else {
            String::new()
        };

        match outcome {
            FlushOutcome::Ok => {
                if let Some(diagnostics) = crate::diagnostics::get_diagnostics_instance() {
                    diagnostics.add_bytes_sent(sent as u64);
                }
                if body.is_empty() {
                    debug!(instance = %self.name, status, bytes = sent, "payload delivered");
                } else {
                    info!(instance = %self.name, status, bytes = sent, response = %body, "payload delivered");
                }
            }
            FlushOutcome::Retry | FlushOutcome::Error => {
                error!(instance = %self.name, endpoint = %self.endpoint, status, response = %body, "remote write rejected");
            }
        }
        outcome
    }
}

#[async_trait]
impl OutputContext for RemoteWriteOutput {
    async fn flush(&self, batch: &[u8], _tag: &str, event_type: EventType) -> FlushOutcome {
        if event_type != EventType::Metrics {
            error!(instance = %self.name, %event_type, "remote write only accepts metrics");
            return FlushOutcome::Error;
        }

        let mut payload = Vec::new();
        match metrics::encode_batch(
            batch,
            EncodeTarget::RemoteWrite,
            &self.config.add_labels,
            &mut payload,
        ) {
            Ok(contexts) => {
                if let Some(diagnostics) = crate::diagnostics::get_diagnostics_instance() {
                    diagnostics.add_contexts_encoded(contexts as u64);
                }
            }
            Err(e) => {
                error!(instance = %self.name, error = %e, "cannot encode metrics payload");
                return FlushOutcome::Error;
            }
        }

        if payload.is_empty() {
            debug!(instance = %self.name, "nothing to send");
            return FlushOutcome::Ok;
        }

        self.deliver(&payload).await
    }
}
