//! 二进制记录流解码器
//!
//! 批次是若干个首尾相接的 MessagePack 值。解码器持有 `(buffer, offset)`
//! 状态，每次成功解码都会推进偏移量；可以通过 [`RecordDecoder::with_offset`]
//! 从任意偏移量重新开始。

use crate::core::record::{EventTime, Record};
use crate::metrics::MetricsContext;
use rmpv::Value;
use std::io::{self, Cursor};
use thiserror::Error;

/// 事件时间扩展类型
const EVENT_TIME_EXT_TYPE: i8 = 0;

/// 单个值允许的最大嵌套深度
const MAX_NESTING_DEPTH: usize = 64;

/// 解码错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// 剩余字节不足以构成一个完整单元
    #[error("insufficient data to decode next unit at offset {offset}")]
    Truncated { offset: usize },

    /// 无法解析的字节，流无法继续
    #[error("malformed payload at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    /// 完整的值，但结构不是合法记录；偏移量已越过该值
    #[error("invalid record at offset {offset}: {reason}")]
    InvalidRecord { offset: usize, reason: String },

    /// 批次中没有任何可解码单元
    #[error("payload contains no decodable units")]
    Empty,
}

impl DecodeError {
    /// 是否为可跳过的单条记录错误
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::InvalidRecord { .. })
    }
}

/// 一条解码结果，附带它在批次中占据的原始字节
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord<'a> {
    pub record: Record,
    pub raw: &'a [u8],
    /// 解码后的偏移量
    pub offset: usize,
}

/// 读取下一个 MessagePack 值，返回值和消耗的字节数
fn read_unit(buf: &[u8], offset: usize) -> Result<(Value, usize), DecodeError> {
    let mut cursor = Cursor::new(&buf[offset..]);
    match rmpv::decode::read_value_with_max_depth(&mut cursor, MAX_NESTING_DEPTH) {
        Ok(value) => Ok((value, cursor.position() as usize)),
        Err(e) if is_insufficient(&e) => Err(DecodeError::Truncated { offset }),
        Err(e) => Err(DecodeError::Malformed {
            offset,
            reason: e.to_string(),
        }),
    }
}

fn is_insufficient(err: &rmpv::decode::Error) -> bool {
    match err {
        rmpv::decode::Error::InvalidMarkerRead(e) | rmpv::decode::Error::InvalidDataRead(e) => {
            e.kind() == io::ErrorKind::UnexpectedEof
        }
        _ => false,
    }
}

/// 日志记录解码器
#[derive(Debug, Clone)]
pub struct RecordDecoder<'a> {
    buf: &'a [u8],
    offset: usize,
    finished: bool,
}

impl<'a> RecordDecoder<'a> {
    /// 从批次开头解码
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_offset(buf, 0)
    }

    /// 从指定偏移量解码
    pub fn with_offset(buf: &'a [u8], offset: usize) -> Self {
        Self {
            buf,
            offset: offset.min(buf.len()),
            finished: false,
        }
    }

    /// 当前偏移量
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 是否已消费完全部字节
    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.buf.len()
    }

    /// 解码下一条记录
    ///
    /// `InvalidRecord` 之后还可以继续调用；`Truncated` / `Malformed` 之后
    /// 解码器结束，后续调用返回 `None`。
    pub fn next_record(&mut self) -> Option<Result<DecodedRecord<'a>, DecodeError>> {
        if self.finished || self.is_exhausted() {
            return None;
        }

        let start = self.offset;
        let (value, consumed) = match read_unit(self.buf, start) {
            Ok(unit) => unit,
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };
        self.offset = start + consumed;

        let raw = &self.buf[start..self.offset];
        Some(
            record_from_value(value)
                .map(|record| DecodedRecord {
                    record,
                    raw,
                    offset: self.offset,
                })
                .map_err(|reason| DecodeError::InvalidRecord {
                    offset: start,
                    reason,
                }),
        )
    }
}

impl<'a> Iterator for RecordDecoder<'a> {
    type Item = Result<DecodedRecord<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}

/// `[time, body]` 或 `[[time, metadata], body]`
fn record_from_value(value: Value) -> Result<Record, String> {
    let mut items = match value {
        Value::Array(items) => items,
        other => return Err(format!("expected array, found {}", type_name(&other))),
    };
    if items.len() < 2 {
        return Err(format!("expected 2 elements, found {}", items.len()));
    }

    let body = items.swap_remove(1);
    let header = items.swap_remove(0);

    let (time, metadata) = match header {
        Value::Array(mut group) => {
            if group.is_empty() {
                return Err("empty record header".to_string());
            }
            let metadata = if group.len() > 1 {
                Some(group.swap_remove(1))
            } else {
                None
            };
            (decode_event_time(&group[0])?, metadata)
        }
        other => (decode_event_time(&other)?, None),
    };

    Ok(Record {
        time,
        metadata,
        body,
    })
}

/// 解码事件时间：扩展类型 0、整数秒或浮点秒
pub fn decode_event_time(value: &Value) -> Result<EventTime, String> {
    match value {
        Value::Ext(EVENT_TIME_EXT_TYPE, data) if data.len() == 8 => {
            let sec = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
            let nsec = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
            Ok(EventTime::new(u64::from(sec), nsec))
        }
        Value::Integer(i) => i
            .as_u64()
            .map(|sec| EventTime::new(sec, 0))
            .ok_or_else(|| format!("negative timestamp {}", i)),
        Value::F64(f) => EventTime::from_f64(*f).ok_or_else(|| format!("invalid timestamp {}", f)),
        Value::F32(f) => {
            EventTime::from_f64(f64::from(*f)).ok_or_else(|| format!("invalid timestamp {}", f))
        }
        other => Err(format!("unsupported timestamp type {}", type_name(other))),
    }
}

/// 编码事件时间为扩展类型 0
pub fn encode_event_time(time: EventTime) -> Value {
    let mut data = Vec::with_capacity(8);
    data.extend_from_slice(&(time.sec as u32).to_be_bytes());
    data.extend_from_slice(&time.nsec.to_be_bytes());
    Value::Ext(EVENT_TIME_EXT_TYPE, data)
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Boolean(_) => "boolean",
        Value::Integer(_) => "integer",
        Value::F32(_) | Value::F64(_) => "float",
        Value::String(_) => "string",
        Value::Binary(_) => "binary",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Ext(_, _) => "ext",
    }
}

/// 指标上下文解码器
#[derive(Debug, Clone)]
pub struct MetricsDecoder<'a> {
    buf: &'a [u8],
    offset: usize,
    finished: bool,
}

impl<'a> MetricsDecoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            finished: false,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 解码下一个指标上下文
    ///
    /// 到达末尾时返回 `Truncated`：这是否构成错误取决于此前是否已经
    /// 成功解码过上下文，由调用方判断。
    pub fn next_context(&mut self) -> Option<Result<MetricsContext, DecodeError>> {
        if self.finished {
            return None;
        }
        if self.offset >= self.buf.len() {
            self.finished = true;
            return Some(Err(DecodeError::Truncated {
                offset: self.offset,
            }));
        }

        let start = self.offset;
        let result = read_unit(self.buf, start).and_then(|(value, consumed)| {
            self.offset = start + consumed;
            MetricsContext::from_value(value).map_err(|reason| DecodeError::Malformed {
                offset: start,
                reason,
            })
        });
        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}

impl<'a> Iterator for MetricsDecoder<'a> {
    type Item = Result<MetricsContext, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_context()
    }
}
