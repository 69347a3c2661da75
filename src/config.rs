//! 定义 QuantumEmit 输出插件的配置。
//!
//! 宿主以有序的键值对 ([`OutputProperties`]) 描述每个输出实例；各插件在
//! `init` 时把这些键值对解析成类型化的配置结构体，之后配置不再改变。
//! 配置文件使用 TOML，每个 `[[output]]` 段对应一个输出实例。

use crate::error::{QuantumEmitError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// --- 辅助函数，用于提供配置项的默认值 ---
fn default_template() -> String {
    "{time} {message}".to_string()
}
fn default_remote_host() -> String {
    "127.0.0.1".to_string()
}
fn default_remote_port() -> u16 {
    80
}
fn default_remote_uri() -> String {
    "/".to_string()
}
fn default_http_timeout_ms() -> u64 {
    30000
}

/// 有序、可重复的配置键值对
///
/// 键不区分大小写（统一转为小写保存）；同名键保持出现顺序。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputProperties {
    entries: Vec<(String, String)>,
}

impl OutputProperties {
    /// 创建空的属性表
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个键值对
    pub fn push<K: AsRef<str>, V: Into<String>>(&mut self, key: K, value: V) {
        self.entries
            .push((key.as_ref().to_ascii_lowercase(), value.into()));
    }

    /// 构建器风格的追加
    pub fn with<K: AsRef<str>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.push(key, value);
        self
    }

    /// 取最后一次出现的值
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 按出现顺序取全部值
    pub fn get_all<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> + 'a {
        let key = key.to_ascii_lowercase();
        self.entries
            .iter()
            .filter(move |(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 遍历全部键值对
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 检查是否存在未识别的键
    pub fn ensure_known(&self, plugin: &str, known: &[&str]) -> Result<()> {
        match self.entries.iter().find(|(k, _)| !known.contains(&k.as_str())) {
            Some((key, _)) => Err(QuantumEmitError::config(format!(
                "unknown configuration property '{}' for output '{}'",
                key, plugin
            ))),
            None => Ok(()),
        }
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for OutputProperties {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut props = Self::new();
        for (k, v) in iter {
            props.push(k, v);
        }
        props
    }
}

/// 解析布尔值
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(QuantumEmitError::config(format!(
            "invalid boolean '{}' for '{}'",
            value, key
        ))),
    }
}

/// 规范化分隔符
///
/// `tab` / `\t`、`space`、`comma` 映射为对应字符（不区分大小写）；单个字符
/// 按字面使用；其他值被拒绝。
pub fn resolve_delimiter(value: &str) -> Result<String> {
    match value.to_ascii_lowercase().as_str() {
        "\\t" | "tab" => return Ok("\t".to_string()),
        "space" => return Ok(" ".to_string()),
        "comma" => return Ok(",".to_string()),
        _ => {}
    }

    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c.to_string()),
        _ => Err(QuantumEmitError::config(format!(
            "unknown delimiter '{}', expected tab, space, comma or a single character",
            value
        ))),
    }
}

/// 拆分 `name value` 形式的配置值
pub fn parse_pair(key: &str, value: &str) -> Result<(String, String)> {
    let trimmed = value.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) if !rest.trim().is_empty() => {
            Ok((name.to_string(), rest.trim().to_string()))
        }
        _ => Err(QuantumEmitError::config(format!(
            "'{}' expects '<name> <value>', got '{}'",
            key, value
        ))),
    }
}

/// 文件输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `<tag>: [<sec>.<nsec>, {json}]`
    #[default]
    Json,
    Csv,
    Ltsv,
    /// 仅记录主体的 JSON
    Plain,
    Template,
    /// 原样写入批次字节（配置值 `msgpack`）
    Raw,
}

impl std::str::FromStr for OutputFormat {
    type Err = QuantumEmitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "ltsv" => Ok(OutputFormat::Ltsv),
            "plain" => Ok(OutputFormat::Plain),
            "template" => Ok(OutputFormat::Template),
            "msgpack" => Ok(OutputFormat::Raw),
            _ => Err(QuantumEmitError::config(format!("unknown format {}", s))),
        }
    }
}

impl OutputFormat {
    /// 格式默认的字段分隔符
    pub fn default_delimiter(&self) -> &'static str {
        match self {
            OutputFormat::Csv => ",",
            OutputFormat::Ltsv => "\t",
            OutputFormat::Json
            | OutputFormat::Plain
            | OutputFormat::Template
            | OutputFormat::Raw => "",
        }
    }

    /// 格式默认的标签分隔符
    pub fn default_label_delimiter(&self) -> &'static str {
        match self {
            OutputFormat::Ltsv => ":",
            OutputFormat::Json
            | OutputFormat::Csv
            | OutputFormat::Plain
            | OutputFormat::Template
            | OutputFormat::Raw => "",
        }
    }
}

/// 文件输出的配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutputConfig {
    /// 目录前缀
    pub path: Option<PathBuf>,
    /// 文件名（覆盖 tag）
    pub file: Option<String>,
    pub format: OutputFormat,
    /// 字段分隔符（已规范化）
    pub delimiter: String,
    /// 标签分隔符（已规范化）
    pub label_delimiter: String,
    pub template: String,
    /// 文件为空时为 csv 写表头
    pub csv_column_names: bool,
    /// 指标批次编码前附加的静态标签，保持配置顺序
    pub add_labels: Vec<(String, String)>,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        let format = OutputFormat::default();
        Self {
            path: None,
            file: None,
            format,
            delimiter: format.default_delimiter().to_string(),
            label_delimiter: format.default_label_delimiter().to_string(),
            template: default_template(),
            csv_column_names: false,
            add_labels: Vec::new(),
        }
    }
}

impl FileOutputConfig {
    pub const KNOWN_PROPERTIES: &'static [&'static str] = &[
        "path",
        "file",
        "format",
        "delimiter",
        "label_delimiter",
        "template",
        "csv_column_names",
        "add_label",
    ];

    /// 从键值对解析
    pub fn from_properties(props: &OutputProperties) -> Result<Self> {
        props.ensure_known("file", Self::KNOWN_PROPERTIES)?;

        let format = match props.get("format") {
            Some(value) => value.parse()?,
            None => OutputFormat::default(),
        };

        let delimiter = match props.get("delimiter") {
            Some(value) => resolve_delimiter(value)?,
            None => format.default_delimiter().to_string(),
        };
        let label_delimiter = match props.get("label_delimiter") {
            Some(value) => resolve_delimiter(value)?,
            None => format.default_label_delimiter().to_string(),
        };

        let csv_column_names = match props.get("csv_column_names") {
            Some(value) => parse_bool("csv_column_names", value)?,
            None => false,
        };

        Ok(Self {
            path: props.get("path").map(PathBuf::from),
            file: props.get("file").map(str::to_string),
            format,
            delimiter,
            label_delimiter,
            template: props
                .get("template")
                .map(str::to_string)
                .unwrap_or_else(default_template),
            csv_column_names,
            add_labels: props
                .get_all("add_label")
                .map(|v| parse_pair("add_label", v))
                .collect::<Result<_>>()?,
        })
    }

    /// 解析目标文件路径
    ///
    /// `path/file`、`path/tag`、`file`，否则为 `tag`。
    pub fn resolve_path(&self, tag: &str) -> PathBuf {
        match (&self.path, &self.file) {
            (Some(dir), Some(file)) => dir.join(file),
            (Some(dir), None) => dir.join(tag),
            (None, Some(file)) => PathBuf::from(file),
            (None, None) => PathBuf::from(tag),
        }
    }
}

/// 远程写入 (remote write) 输出的配置。
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteWriteConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub uri: String,
    /// `http://host:port`
    pub proxy: Option<String>,
    pub http_user: Option<String>,
    pub http_passwd: String,
    /// 额外的 HTTP 头，保持配置顺序
    pub headers: Vec<(String, String)>,
    /// 附加到每个指标族的标签，保持配置顺序
    pub add_labels: Vec<(String, String)>,
    pub log_response_payload: bool,
    pub http_timeout_ms: u64,
}

impl Default for RemoteWriteConfig {
    fn default() -> Self {
        Self {
            host: default_remote_host(),
            port: default_remote_port(),
            tls: false,
            uri: default_remote_uri(),
            proxy: None,
            http_user: None,
            http_passwd: String::new(),
            headers: Vec::new(),
            add_labels: Vec::new(),
            log_response_payload: true,
            http_timeout_ms: default_http_timeout_ms(),
        }
    }
}

// 安全的Debug实现，避免泄露敏感的认证信息
impl std::fmt::Debug for RemoteWriteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteWriteConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("uri", &self.uri)
            .field("proxy", &self.proxy)
            .field("http_user", &self.http_user.as_ref().map(|_| "[REDACTED]"))
            .field("http_passwd", &"[REDACTED]")
            .field("headers", &self.headers)
            .field("add_labels", &self.add_labels)
            .field("log_response_payload", &self.log_response_payload)
            .field("http_timeout_ms", &self.http_timeout_ms)
            .finish()
    }
}

impl RemoteWriteConfig {
    pub const KNOWN_PROPERTIES: &'static [&'static str] = &[
        "host",
        "port",
        "tls",
        "uri",
        "proxy",
        "http_user",
        "http_passwd",
        "header",
        "add_label",
        "log_response_payload",
        "http_timeout_ms",
    ];

    /// 从键值对解析
    pub fn from_properties(props: &OutputProperties) -> Result<Self> {
        props.ensure_known("prometheus_remote_write", Self::KNOWN_PROPERTIES)?;
        let defaults = Self::default();

        let port = match props.get("port") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|e| QuantumEmitError::config(format!("invalid port '{}': {}", value, e)))?,
            None => defaults.port,
        };
        let http_timeout_ms = match props.get("http_timeout_ms") {
            Some(value) => value.trim().parse::<u64>().map_err(|e| {
                QuantumEmitError::config(format!("invalid http_timeout_ms '{}': {}", value, e))
            })?,
            None => defaults.http_timeout_ms,
        };

        let uri = match props.get("uri") {
            Some(uri) if uri.starts_with('/') => uri.to_string(),
            Some(uri) => format!("/{}", uri),
            None => defaults.uri,
        };

        Ok(Self {
            host: props.get("host").map(str::to_string).unwrap_or(defaults.host),
            port,
            tls: match props.get("tls") {
                Some(value) => parse_bool("tls", value)?,
                None => defaults.tls,
            },
            uri,
            proxy: props.get("proxy").map(str::to_string),
            http_user: props.get("http_user").map(str::to_string),
            http_passwd: props
                .get("http_passwd")
                .map(str::to_string)
                .unwrap_or(defaults.http_passwd),
            headers: props
                .get_all("header")
                .map(|v| parse_pair("header", v))
                .collect::<Result<_>>()?,
            add_labels: props
                .get_all("add_label")
                .map(|v| parse_pair("add_label", v))
                .collect::<Result<_>>()?,
            log_response_payload: match props.get("log_response_payload") {
                Some(value) => parse_bool("log_response_payload", value)?,
                None => defaults.log_response_payload,
            },
            http_timeout_ms,
        })
    }

    /// 目标 URL
    pub fn endpoint(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, self.uri)
    }
}

/// 配置文件中的一个输出段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSection {
    /// 插件名
    pub name: String,
    pub properties: OutputProperties,
}

/// QuantumEmit 的顶层配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuantumEmitConfig {
    pub outputs: Vec<OutputSection>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    output: Vec<toml::Table>,
}

fn section_from_table(index: usize, table: toml::Table) -> Result<OutputSection> {
    let mut name = None;
    let mut properties = OutputProperties::new();

    for (key, value) in table {
        if key == "name" {
            match value {
                toml::Value::String(s) => name = Some(s),
                other => {
                    return Err(QuantumEmitError::config(format!(
                        "output #{}: 'name' must be a string, got {}",
                        index,
                        other.type_str()
                    )))
                }
            }
            continue;
        }

        match value {
            toml::Value::Array(items) => {
                for item in items {
                    properties.push(&key, scalar_to_string(index, &key, item)?);
                }
            }
            other => properties.push(&key, scalar_to_string(index, &key, other)?),
        }
    }

    let name = name.ok_or_else(|| {
        QuantumEmitError::config(format!("output #{} is missing 'name'", index))
    })?;
    Ok(OutputSection { name, properties })
}

fn scalar_to_string(index: usize, key: &str, value: toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        other => Err(QuantumEmitError::config(format!(
            "output #{}: unsupported value type {} for '{}'",
            index,
            other.type_str(),
            key
        ))),
    }
}

/// 用于从 TOML 字符串加载配置的辅助函数。
pub fn load_config_from_str(config_str: &str) -> Result<QuantumEmitConfig> {
    let raw: RawConfig = toml::from_str(config_str)
        .map_err(|e| QuantumEmitError::ConfigError(format!("TOML解析失败: {}", e)))?;

    let outputs = raw
        .output
        .into_iter()
        .enumerate()
        .map(|(i, table)| section_from_table(i, table))
        .collect::<Result<_>>()?;

    Ok(QuantumEmitConfig { outputs })
}

/// 从 TOML 文件加载配置
pub fn load_config_from_file(path: &Path) -> Result<QuantumEmitConfig> {
    if !path.exists() {
        return Err(QuantumEmitError::ConfigFileMissing(
            path.to_string_lossy().into_owned(),
        ));
    }

    let config_str = std::fs::read_to_string(path)?;
    load_config_from_str(&config_str)
}

/// 验证配置的有效性：每个段都必须对应已注册的插件且能被解析。
pub fn validate_config(config: &QuantumEmitConfig) -> Result<()> {
    for section in &config.outputs {
        let plugin = crate::sinks::registry::find_plugin(&section.name).ok_or_else(|| {
            QuantumEmitError::config(format!("unknown output plugin '{}'", section.name))
        })?;
        plugin.validate(&section.properties)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiter_normalization() {
        assert_eq!(resolve_delimiter("tab").unwrap(), "\t");
        assert_eq!(resolve_delimiter("TAB").unwrap(), "\t");
        assert_eq!(resolve_delimiter("\\t").unwrap(), "\t");
        assert_eq!(resolve_delimiter("space").unwrap(), " ");
        assert_eq!(resolve_delimiter("Comma").unwrap(), ",");
        assert_eq!(resolve_delimiter("|").unwrap(), "|");
        assert!(resolve_delimiter("pipe").is_err());
        assert!(resolve_delimiter("").is_err());
    }

    #[test]
    fn test_file_config_defaults() {
        let config = FileOutputConfig::from_properties(&OutputProperties::new()).unwrap();
        assert_eq!(config, FileOutputConfig::default());
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.template, "{time} {message}");
        assert!(!config.csv_column_names);
    }

    #[test]
    fn test_file_config_format_defaults_delimiters() {
        let csv = FileOutputConfig::from_properties(&OutputProperties::new().with("format", "CSV"))
            .unwrap();
        assert_eq!(csv.format, OutputFormat::Csv);
        assert_eq!(csv.delimiter, ",");

        let ltsv = FileOutputConfig::from_properties(
            &OutputProperties::new()
                .with("Format", "ltsv")
                .with("label_delimiter", "comma"),
        )
        .unwrap();
        assert_eq!(ltsv.delimiter, "\t");
        assert_eq!(ltsv.label_delimiter, ",");

        let raw = FileOutputConfig::from_properties(&OutputProperties::new().with("format", "msgpack"))
            .unwrap();
        assert_eq!(raw.format, OutputFormat::Raw);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let err = FileOutputConfig::from_properties(&OutputProperties::new().with("format", "xml"))
            .unwrap_err();
        assert!(matches!(err, QuantumEmitError::ConfigError(_)));
        assert!(err.to_string().contains("unknown format xml"));
    }

    #[test]
    fn test_unknown_delimiter_and_property_rejected() {
        assert!(FileOutputConfig::from_properties(
            &OutputProperties::new().with("delimiter", "semicolon")
        )
        .is_err());
        assert!(FileOutputConfig::from_properties(&OutputProperties::new().with("colour", "red"))
            .is_err());
        assert!(FileOutputConfig::from_properties(
            &OutputProperties::new().with("csv_column_names", "maybe")
        )
        .is_err());
    }

    #[test]
    fn test_file_config_add_labels() {
        let config = FileOutputConfig::from_properties(
            &OutputProperties::new()
                .with("add_label", "env prod")
                .with("add_label", "zone a"),
        )
        .unwrap();
        assert_eq!(
            config.add_labels,
            vec![
                ("env".to_string(), "prod".to_string()),
                ("zone".to_string(), "a".to_string()),
            ]
        );
        assert!(FileOutputConfig::from_properties(&OutputProperties::new().with("add_label", "env"))
            .is_err());
    }

    #[test]
    fn test_resolve_path() {
        let mut config = FileOutputConfig::default();
        assert_eq!(config.resolve_path("app.log"), PathBuf::from("app.log"));

        config.file = Some("out.txt".to_string());
        assert_eq!(config.resolve_path("app.log"), PathBuf::from("out.txt"));

        config.path = Some(PathBuf::from("/var/log"));
        assert_eq!(config.resolve_path("app.log"), PathBuf::from("/var/log/out.txt"));

        config.file = None;
        assert_eq!(config.resolve_path("app.log"), PathBuf::from("/var/log/app.log"));
    }

    #[test]
    fn test_remote_write_config_parsing() {
        let props = OutputProperties::new()
            .with("host", "metrics.local")
            .with("port", "9090")
            .with("uri", "api/v1/write")
            .with("http_user", "alice")
            .with("header", "X-Scope-OrgID tenant-a")
            .with("header", "X-Trace  one two")
            .with("add_label", "app demo")
            .with("add_label", "env prod")
            .with("log_response_payload", "off");
        let config = RemoteWriteConfig::from_properties(&props).unwrap();

        assert_eq!(config.endpoint(), "http://metrics.local:9090/api/v1/write");
        assert_eq!(config.http_user.as_deref(), Some("alice"));
        assert_eq!(config.http_passwd, "");
        assert_eq!(
            config.headers,
            vec![
                ("X-Scope-OrgID".to_string(), "tenant-a".to_string()),
                ("X-Trace".to_string(), "one two".to_string()),
            ]
        );
        assert_eq!(config.add_labels[1], ("env".to_string(), "prod".to_string()));
        assert!(!config.log_response_payload);
    }

    #[test]
    fn test_remote_write_config_rejects_bad_values() {
        assert!(RemoteWriteConfig::from_properties(&OutputProperties::new().with("port", "http"))
            .is_err());
        assert!(RemoteWriteConfig::from_properties(
            &OutputProperties::new().with("add_label", "lonely")
        )
        .is_err());
    }

    #[test]
    fn test_remote_write_debug_redacts_credentials() {
        let config = RemoteWriteConfig {
            http_user: Some("alice".to_string()),
            http_passwd: "s3cret".to_string(),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("alice"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_load_config_from_str() {
        let config = load_config_from_str(
            r#"
            [[output]]
            name = "file"
            path = "/tmp/out"
            format = "csv"
            csv_column_names = true

            [[output]]
            name = "prometheus_remote_write"
            port = 8080
            add_label = ["app demo", "env prod"]
            "#,
        )
        .unwrap();

        assert_eq!(config.outputs.len(), 2);
        assert_eq!(config.outputs[0].name, "file");
        assert_eq!(config.outputs[0].properties.get("csv_column_names"), Some("true"));
        let labels: Vec<_> = config.outputs[1].properties.get_all("add_label").collect();
        assert_eq!(labels, vec!["app demo", "env prod"]);
        assert_eq!(config.outputs[1].properties.get("port"), Some("8080"));

        validate_config(&config).unwrap();
    }

    #[test]
    fn test_validate_config_rejects_unknown_plugin() {
        let config = load_config_from_str("[[output]]\nname = \"kafka\"\n").unwrap();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config_from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, QuantumEmitError::ConfigFileMissing(_)));
    }
}
