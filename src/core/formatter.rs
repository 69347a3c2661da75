//! 格式化层
//!
//! 把一条已解码的记录按配置的输出格式序列化到缓冲区。每种格式对应
//! [`OutputFormat`] 的一个变体，分派是穷尽匹配的。

use crate::config::{FileOutputConfig, OutputFormat};
use crate::core::decoder::DecodedRecord;
use crate::core::printer::{print_value, write_json};
use crate::core::template::Template;
use crate::core::NEWLINE;
use crate::error::Result;
use rmpv::Value;
use std::io::Write;

/// JSON 文本通常比 MessagePack 大，额外预留的字节数
const JSON_SIZE_SLACK: usize = 128;

/// 记录格式化器
#[derive(Debug, Clone)]
pub struct RecordFormatter {
    format: OutputFormat,
    delimiter: String,
    label_delimiter: String,
    template: Template,
}

impl RecordFormatter {
    /// 从文件输出配置创建格式化器，模板在此时编译
    pub fn new(config: &FileOutputConfig) -> Self {
        Self {
            format: config.format,
            delimiter: config.delimiter.clone(),
            label_delimiter: config.label_delimiter.clone(),
            template: Template::compile(&config.template),
        }
    }

    /// 格式化一条记录并追加到 `out`
    ///
    /// `csv_header` 为 true 时，第一条产生数据行的 CSV 记录会先写表头，
    /// 随后把标志清零。返回是否写入了内容。
    pub fn format_record(
        &self,
        tag: &str,
        decoded: &DecodedRecord<'_>,
        csv_header: &mut bool,
        out: &mut Vec<u8>,
    ) -> Result<bool> {
        let record = &decoded.record;
        match self.format {
            OutputFormat::Json => {
                write!(out, "{}: [{}, ", tag, record.time)?;
                write_json(out, &record.body, decoded.raw.len() + JSON_SIZE_SLACK)?;
                out.write_all(b"]")?;
                out.write_all(NEWLINE.as_bytes())?;
                Ok(true)
            }
            OutputFormat::Csv => match record.fields() {
                Some(fields) if !fields.is_empty() => {
                    if *csv_header {
                        self.write_csv_header(fields, out)?;
                        *csv_header = false;
                    }
                    write!(out, "{}", record.time)?;
                    for (_, value) in fields {
                        out.write_all(self.delimiter.as_bytes())?;
                        print_value(out, value)?;
                    }
                    out.write_all(NEWLINE.as_bytes())?;
                    Ok(true)
                }
                _ => Ok(false),
            },
            OutputFormat::Ltsv => match record.fields() {
                Some(fields) if !fields.is_empty() => {
                    write!(
                        out,
                        "\"time\"{}{}",
                        self.label_delimiter,
                        record.time.to_float_string()
                    )?;
                    for (key, value) in fields {
                        out.write_all(self.delimiter.as_bytes())?;
                        print_value(out, key)?;
                        out.write_all(self.label_delimiter.as_bytes())?;
                        print_value(out, value)?;
                    }
                    out.write_all(NEWLINE.as_bytes())?;
                    Ok(true)
                }
                _ => Ok(false),
            },
            OutputFormat::Plain => {
                write_json(out, &record.body, decoded.raw.len() + JSON_SIZE_SLACK)?;
                out.write_all(NEWLINE.as_bytes())?;
                Ok(true)
            }
            OutputFormat::Template => {
                self.template.render(record, out)?;
                Ok(true)
            }
            OutputFormat::Raw => {
                out.extend_from_slice(decoded.raw);
                Ok(true)
            }
        }
    }

    fn write_csv_header(&self, fields: &[(Value, Value)], out: &mut Vec<u8>) -> Result<()> {
        out.write_all(b"timestamp")?;
        for (key, _) in fields {
            out.write_all(self.delimiter.as_bytes())?;
            print_value(out, key)?;
        }
        out.write_all(NEWLINE.as_bytes())?;
        Ok(())
    }
}
