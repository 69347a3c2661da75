//! 指标上下文模型
//!
//! 一个上下文包含若干指标族以及上下文级别的静态标签。上下文从 MessagePack
//! 解码得到，除追加静态标签外不再修改。

use rmpv::Value;
use serde::Deserialize;

/// 指标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricKind {
    Counter,
    Gauge,
    #[default]
    Untyped,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Untyped => "untyped",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "counter" => Some(MetricKind::Counter),
            "gauge" => Some(MetricKind::Gauge),
            "untyped" => Some(MetricKind::Untyped),
            _ => None,
        }
    }
}

/// 单个采样点
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// 标签值，与所属指标族的标签键一一对应
    pub label_values: Vec<String>,
    pub value: f64,
    /// 纳秒时间戳
    pub timestamp: u64,
}

/// 指标族
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub label_keys: Vec<String>,
    pub samples: Vec<MetricSample>,
}

impl MetricFamily {
    pub fn new<S: Into<String>>(name: S, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            kind,
            label_keys: Vec::new(),
            samples: Vec::new(),
        }
    }

    pub fn with_help<S: Into<String>>(mut self, help: S) -> Self {
        self.help = help.into();
        self
    }

    pub fn with_label_keys(mut self, keys: &[&str]) -> Self {
        self.label_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_sample(mut self, label_values: &[&str], value: f64, timestamp: u64) -> Self {
        self.samples.push(MetricSample {
            label_values: label_values.iter().map(|v| v.to_string()).collect(),
            value,
            timestamp,
        });
        self
    }
}

/// 已解码的指标上下文
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricsContext {
    /// 静态标签，作用于上下文中的所有指标族
    pub static_labels: Vec<(String, String)>,
    pub families: Vec<MetricFamily>,
}

#[derive(Deserialize, Default)]
struct RawMeta {
    #[serde(default)]
    labels: Vec<(String, String)>,
}

#[derive(Deserialize)]
struct RawSample {
    #[serde(default)]
    labels: Vec<String>,
    value: f64,
    #[serde(default)]
    timestamp: u64,
}

#[derive(Deserialize)]
struct RawFamily {
    name: String,
    #[serde(default)]
    help: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    samples: Vec<RawSample>,
}

#[derive(Deserialize)]
struct RawContext {
    #[serde(default)]
    meta: RawMeta,
    #[serde(default)]
    metrics: Vec<RawFamily>,
}

impl MetricsContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从解码后的 MessagePack 值构造
    pub fn from_value(value: Value) -> Result<Self, String> {
        if !value.is_map() {
            return Err(format!(
                "expected metrics context map, found {}",
                crate::core::decoder::type_name(&value)
            ));
        }
        let raw: RawContext = rmpv::ext::from_value(value).map_err(|e| e.to_string())?;

        let families = raw
            .metrics
            .into_iter()
            .map(|family| -> Result<MetricFamily, String> {
                let kind = match family.kind.as_deref() {
                    None => MetricKind::Untyped,
                    Some(s) => MetricKind::parse(s)
                        .ok_or_else(|| format!("unknown metric type '{}' for {}", s, family.name))?,
                };
                Ok(MetricFamily {
                    name: family.name,
                    help: family.help,
                    kind,
                    label_keys: family.labels,
                    samples: family
                        .samples
                        .into_iter()
                        .map(|s| MetricSample {
                            label_values: s.labels,
                            value: s.value,
                            timestamp: s.timestamp,
                        })
                        .collect(),
                })
            })
            .collect::<Result<_, String>>()?;

        Ok(Self {
            static_labels: raw.meta.labels,
            families,
        })
    }

    /// 追加一个静态标签
    pub fn add_label<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.static_labels.push((key.into(), value.into()));
    }

    pub fn with_family(mut self, family: MetricFamily) -> Self {
        self.families.push(family);
        self
    }

    /// 采样点总数
    pub fn sample_count(&self) -> usize {
        self.families.iter().map(|f| f.samples.len()).sum()
    }

    /// 转换为线上格式的 MessagePack 值
    pub fn to_value(&self) -> Value {
        let strings = |items: &[String]| {
            Value::Array(items.iter().map(|s| Value::from(s.as_str())).collect())
        };

        let meta = Value::Map(vec![(
            Value::from("labels"),
            Value::Array(
                self.static_labels
                    .iter()
                    .map(|(k, v)| Value::Array(vec![Value::from(k.as_str()), Value::from(v.as_str())]))
                    .collect(),
            ),
        )]);

        let metrics = self
            .families
            .iter()
            .map(|family| {
                let samples = family
                    .samples
                    .iter()
                    .map(|s| {
                        Value::Map(vec![
                            (Value::from("labels"), strings(&s.label_values)),
                            (Value::from("value"), Value::F64(s.value)),
                            (Value::from("timestamp"), Value::from(s.timestamp)),
                        ])
                    })
                    .collect();
                Value::Map(vec![
                    (Value::from("name"), Value::from(family.name.as_str())),
                    (Value::from("help"), Value::from(family.help.as_str())),
                    (Value::from("type"), Value::from(family.kind.as_str())),
                    (Value::from("labels"), strings(&family.label_keys)),
                    (Value::from("samples"), Value::Array(samples)),
                ])
            })
            .collect();

        Value::Map(vec![
            (Value::from("meta"), meta),
            (Value::from("metrics"), Value::Array(metrics)),
        ])
    }

    /// 编码为 MessagePack 字节
    pub fn to_msgpack(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        // Vec<u8> 写入不会失败
        let _ = rmpv::encode::write_value(&mut buf, &self.to_value());
        buf
    }
}
