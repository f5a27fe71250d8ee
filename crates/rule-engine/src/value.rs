//! 值转换
//!
//! 规则中的条件值和动作参数统一以字符串保存，评估时再按照主体字段声明的类型进行转换。
//! 转换失败返回 [`RuleError::Coercion`]，由调用方决定按"不匹配"或"跳过"处理。

use crate::error::{Result, RuleError};
use crate::models::ActionParameter;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    Integer,
    Decimal,
    Float,
    Boolean,
    DateTime,
    /// 枚举或其他类型，原样透传字符串
    Other,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
            Self::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// 运行时字段值
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    String(String),
    Integer(i64),
    Decimal(Decimal),
    Float(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Record(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 获取值的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
            Self::DateTime(_) => "datetime",
            Self::Record(_) => "record",
        }
    }

    /// 字符串形式，供 Contains / StartsWith / In 等字符串操作符使用
    ///
    /// 空值没有字符串形式。
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::String(s) => Some(s.clone()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Decimal(d) => Some(d.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Boolean(b) => Some(b.to_string()),
            Self::DateTime(dt) => Some(dt.to_rfc3339()),
            Self::Record(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v.render().unwrap_or_default()))
                    .collect();
                Some(format!("{{{}}}", parts.join(", ")))
            }
        }
    }

    /// 有序比较
    ///
    /// 只有数值、时间和字符串可比较；布尔、空值、记录以及 NaN 返回 `None`。
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Decimal(a), Self::Decimal(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Integer(a), Self::Decimal(b)) => Some(Decimal::from(*a).cmp(b)),
            (Self::Decimal(a), Self::Integer(b)) => Some(a.cmp(&Decimal::from(*b))),
            (Self::Integer(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// 可作为主体字段的 Rust 类型
///
/// 宿主为字段注册访问器时通过该 trait 得到字段类型，并在读写时与 [`FieldValue`] 互转。
/// 枚举类字段可自行实现本 trait，`KIND` 取 [`FieldKind::Other`]。
pub trait FieldType: Sized {
    const KIND: FieldKind;

    fn into_value(self) -> FieldValue;

    fn from_value(value: FieldValue) -> Result<Self>;
}

fn mismatch(expected: FieldKind, actual: &FieldValue) -> RuleError {
    RuleError::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

macro_rules! impl_field_type {
    ($ty:ty, $kind:ident) => {
        impl FieldType for $ty {
            const KIND: FieldKind = FieldKind::$kind;

            fn into_value(self) -> FieldValue {
                FieldValue::$kind(self)
            }

            fn from_value(value: FieldValue) -> Result<Self> {
                match value {
                    FieldValue::$kind(v) => Ok(v),
                    other => Err(mismatch(Self::KIND, &other)),
                }
            }
        }
    };
}

impl_field_type!(String, String);
impl_field_type!(i64, Integer);
impl_field_type!(Decimal, Decimal);
impl_field_type!(f64, Float);
impl_field_type!(bool, Boolean);
impl_field_type!(DateTime<Utc>, DateTime);

impl FieldType for i32 {
    const KIND: FieldKind = FieldKind::Integer;

    fn into_value(self) -> FieldValue {
        FieldValue::Integer(i64::from(self))
    }

    fn from_value(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Integer(v) => i32::try_from(v).map_err(|_| RuleError::TypeMismatch {
                expected: "i32".to_string(),
                actual: v.to_string(),
            }),
            other => Err(mismatch(Self::KIND, &other)),
        }
    }
}

impl<V: FieldType> FieldType for Option<V> {
    const KIND: FieldKind = V::KIND;

    fn into_value(self) -> FieldValue {
        self.map_or(FieldValue::Null, FieldType::into_value)
    }

    fn from_value(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Null => Ok(None),
            other => V::from_value(other).map(Some),
        }
    }
}

/// 记录参数的子字段声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordField {
    pub name: String,
    pub kind: FieldKind,
}

impl RecordField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// 将字符串转换为指定类型的值
///
/// - 字符串类型原样返回（包括空字符串），`None` 视为空值
/// - 布尔和其他类型的空文本视为空值
/// - 数值和时间类型要求非空文本，否则转换失败
pub fn coerce(raw: Option<&str>, kind: FieldKind) -> Result<FieldValue> {
    match kind {
        FieldKind::String => Ok(raw.map_or(FieldValue::Null, FieldValue::from)),
        FieldKind::Other => Ok(match raw {
            Some(s) if !s.is_empty() => FieldValue::from(s),
            _ => FieldValue::Null,
        }),
        FieldKind::Boolean => match raw.map(str::trim) {
            None | Some("") => Ok(FieldValue::Null),
            Some(s) => parse_bool(s)
                .map(FieldValue::Boolean)
                .ok_or_else(|| coercion_error(s, kind)),
        },
        FieldKind::Integer => {
            let text = literal(raw, kind)?;
            text.parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| coercion_error(text, kind))
        }
        FieldKind::Decimal => {
            let text = literal(raw, kind)?;
            Decimal::from_str(text)
                .or_else(|_| Decimal::from_scientific(text))
                .map(FieldValue::Decimal)
                .map_err(|_| coercion_error(text, kind))
        }
        FieldKind::Float => {
            let text = literal(raw, kind)?;
            text.parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| coercion_error(text, kind))
        }
        FieldKind::DateTime => {
            let text = literal(raw, kind)?;
            parse_datetime(text)
                .map(FieldValue::DateTime)
                .ok_or_else(|| coercion_error(text, kind))
        }
    }
}

/// 将命名参数组装为记录值
///
/// 按声明的子字段名（不区分大小写）查找同名参数并转换；缺失的子字段为空值，多余参数忽略。
pub fn coerce_record(params: &[ActionParameter], fields: &[RecordField]) -> Result<FieldValue> {
    let mut record = BTreeMap::new();

    for field in fields {
        let raw = params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(&field.name))
            .map(|p| p.value.as_str());

        let value = match raw {
            Some(text) => coerce(Some(text), field.kind)?,
            None => FieldValue::Null,
        };
        record.insert(field.name.clone(), value);
    }

    Ok(FieldValue::Record(record))
}

/// 数值和时间类型需要非空文本
fn literal(raw: Option<&str>, kind: FieldKind) -> Result<&str> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| coercion_error(raw.unwrap_or_default(), kind))
}

fn coercion_error(value: &str, kind: FieldKind) -> RuleError {
    RuleError::Coercion {
        value: value.to_string(),
        kind: kind.to_string(),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// 解析日期时间
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // ISO 8601 / RFC 3339
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // 不带时区的日期时间按 UTC 处理
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    // 纯日期取当天零点
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
