//! 占位符模板引擎
//!
//! 模板在初始化时编译一次，每条记录求值一次。
//!
//! ```text
//! "{time} {message}"  +  {"message": "hi"} @ 10.5s  =>  "10.500000 hi\n"
//! ```
//!
//! 规则：
//! - `{` 开启占位符，直到下一个 `}`；
//! - 占位符内再次出现 `{` 时，之前缓冲的 `{...` 原样输出，新的 `{` 成为开启符；
//! - `{time}` 输出浮点秒；其他名字按顶层键查找，找不到时原样输出 `{name}`；
//! - 未闭合的 `{abc` 原样输出到模板末尾；
//! - 输出总以换行结尾。

use crate::core::printer::print_value;
use crate::core::record::Record;
use crate::core::NEWLINE;
use rmpv::Value;
use std::io::{self, Write};

/// 保留的时间占位符名
const TIME_PLACEHOLDER: &str = "time";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(Vec<u8>),
    Placeholder(String),
}

/// 已编译的模板
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// 编译模板字符串
    pub fn compile(source: &str) -> Self {
        let bytes = source.as_bytes();
        let mut segments = Vec::new();
        let mut literal = Vec::new();
        let mut open: Option<usize> = None;

        for (i, &b) in bytes.iter().enumerate() {
            match (b, open) {
                (b'{', Some(start)) => {
                    literal.extend_from_slice(&bytes[start..i]);
                    open = Some(i);
                }
                (b'{', None) => open = Some(i),
                (b'}', Some(start)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(source[start + 1..i].to_string()));
                    open = None;
                }
                (_, Some(_)) => {}
                (_, None) => literal.push(b),
            }
        }

        if let Some(start) = open {
            literal.extend_from_slice(&bytes[start..]);
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// 针对一条记录求值，结果追加到 `out`
    pub fn render<W: Write>(&self, record: &Record, out: &mut W) -> io::Result<()> {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.write_all(text)?,
                Segment::Placeholder(name) => render_placeholder(name, record, out)?,
            }
        }
        out.write_all(NEWLINE.as_bytes())
    }
}

fn render_placeholder<W: Write>(name: &str, record: &Record, out: &mut W) -> io::Result<()> {
    if name == TIME_PLACEHOLDER {
        return write!(out, "{:.6}", record.time.as_f64());
    }

    match record.lookup(name.as_bytes()) {
        Some(Value::String(s)) => out.write_all(s.as_bytes()),
        Some(other) => print_value(out, other),
        None => write!(out, "{{{}}}", name),
    }
}
