//! 记录与时间戳定义
//!
//! 一条日志记录由事件时间和一个 MessagePack 结构化值组成。

use rmpv::Value;
use std::fmt;

/// 事件时间（秒 + 纳秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct EventTime {
    /// 秒
    pub sec: u64,
    /// 纳秒，范围 0..1_000_000_000
    pub nsec: u32,
}

impl EventTime {
    /// 创建新的事件时间
    pub fn new(sec: u64, nsec: u32) -> Self {
        Self { sec, nsec }
    }

    /// 以浮点秒表示
    pub fn as_f64(&self) -> f64 {
        self.sec as f64 + f64::from(self.nsec) / 1e9
    }

    /// 浮点秒文本，固定 6 位小数（例如 `10.500000`）
    pub fn to_float_string(&self) -> String {
        format!("{:.6}", self.as_f64())
    }

    /// 从浮点秒构造
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let sec = value.trunc();
        let nsec = ((value - sec) * 1e9).round().min(999_999_999.0);
        Some(Self::new(sec as u64, nsec as u32))
    }
}

/// `<sec>.<nsec>`，纳秒补齐到 9 位
impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

/// 一条已解码的日志记录
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 事件时间
    pub time: EventTime,
    /// 分组格式中的元数据（旧格式为 None）
    pub metadata: Option<Value>,
    /// 记录主体，通常是一个 map
    pub body: Value,
}

impl Record {
    /// 创建新的记录
    pub fn new(time: EventTime, body: Value) -> Self {
        Self {
            time,
            metadata: None,
            body,
        }
    }

    /// 主体是 map 时返回其键值对
    pub fn fields(&self) -> Option<&[(Value, Value)]> {
        match &self.body {
            Value::Map(entries) => Some(entries.as_slice()),
            _ => None,
        }
    }

    /// 按键的字节内容精确查找顶层字段
    pub fn lookup(&self, key: &[u8]) -> Option<&Value> {
        self.fields()?
            .iter()
            .find(|(k, _)| match k {
                Value::String(s) => s.as_bytes() == key,
                _ => false,
            })
            .map(|(_, v)| v)
    }
}
