//! 通用值打印与 JSON 渲染
//!
//! `print_value` 产生 CSV / LTSV / 模板使用的调试风格文本：字符串带双引号
//! 但不转义，map 使用 `{k=>v}`。`to_json` 把 MessagePack 值转换为保持键顺序的
//! JSON 值。

use rmpv::Value;
use serde_json::{Map, Number, Value as JsonValue};
use std::io::{self, Write};

/// 以通用格式打印一个值
pub fn print_value<W: Write>(out: &mut W, value: &Value) -> io::Result<()> {
    match value {
        Value::Nil => out.write_all(b"nil"),
        Value::Boolean(b) => write!(out, "{}", b),
        Value::Integer(i) => write!(out, "{}", i),
        Value::F32(f) => write!(out, "{:.6}", f),
        Value::F64(f) => write!(out, "{:.6}", f),
        Value::String(s) => {
            out.write_all(b"\"")?;
            out.write_all(s.as_bytes())?;
            out.write_all(b"\"")
        }
        Value::Binary(bytes) => {
            out.write_all(b"\"")?;
            out.write_all(bytes)?;
            out.write_all(b"\"")
        }
        Value::Array(items) => {
            out.write_all(b"[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_all(b", ")?;
                }
                print_value(out, item)?;
            }
            out.write_all(b"]")
        }
        Value::Map(entries) => {
            out.write_all(b"{")?;
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.write_all(b", ")?;
                }
                print_value(out, k)?;
                out.write_all(b"=>")?;
                print_value(out, v)?;
            }
            out.write_all(b"}")
        }
        Value::Ext(kind, data) => {
            write!(out, "(ext: {})\"", kind)?;
            out.write_all(data)?;
            out.write_all(b"\"")
        }
    }
}

/// 打印为字符串（非 UTF-8 字节会被替换）
pub fn print_to_string(value: &Value) -> String {
    let mut buf = Vec::new();
    // Vec<u8> 写入不会失败
    let _ = print_value(&mut buf, value);
    String::from_utf8_lossy(&buf).into_owned()
}

/// 转换为 JSON 值
pub fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Nil => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Integer(i) => match (i.as_u64(), i.as_i64()) {
            (Some(u), _) => JsonValue::Number(Number::from(u)),
            (None, Some(s)) => JsonValue::Number(Number::from(s)),
            (None, None) => JsonValue::Null,
        },
        Value::F32(f) => float_to_json(f64::from(*f)),
        Value::F64(f) => float_to_json(*f),
        Value::String(s) => JsonValue::String(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        Value::Binary(bytes) | Value::Ext(_, bytes) => {
            JsonValue::String(String::from_utf8_lossy(bytes).into_owned())
        }
        Value::Array(items) => JsonValue::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (k, v) in entries {
                let key = match k {
                    Value::String(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
                    other => print_to_string(other),
                };
                map.insert(key, to_json(v));
            }
            JsonValue::Object(map)
        }
    }
}

fn float_to_json(f: f64) -> JsonValue {
    Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number)
}

/// 渲染为 JSON 文本并追加到 `out`
///
/// `size_hint` 用于预留缓冲区：文本形式通常比二进制形式大。
pub fn write_json(out: &mut Vec<u8>, value: &Value, size_hint: usize) -> serde_json::Result<()> {
    out.reserve(size_hint);
    serde_json::to_writer(out, &to_json(value))
}
