//! 规则操作符定义
//!
//! 规则以文本形式保存操作符，解析时不区分大小写。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 条件比较操作符
///
/// 无法识别的文本保留为 `Unknown`，评估结果恒为 false。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    In,
    NotIn,
    Unknown(String),
}

impl From<&str> for ComparisonOperator {
    fn from(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "EQUALS" => Self::Equals,
            "NOTEQUALS" => Self::NotEquals,
            "GREATERTHAN" => Self::GreaterThan,
            "LESSTHAN" => Self::LessThan,
            "GREATERTHANOREQUAL" => Self::GreaterThanOrEqual,
            "LESSTHANOREQUAL" => Self::LessThanOrEqual,
            "CONTAINS" => Self::Contains,
            "NOTCONTAINS" => Self::NotContains,
            "STARTSWITH" => Self::StartsWith,
            "ENDSWITH" => Self::EndsWith,
            "ISNULL" => Self::IsNull,
            "ISNOTNULL" => Self::IsNotNull,
            "IN" => Self::In,
            "NOTIN" => Self::NotIn,
            _ => Self::Unknown(token.to_string()),
        }
    }
}

impl From<String> for ComparisonOperator {
    fn from(token: String) -> Self {
        Self::from(token.as_str())
    }
}

impl From<ComparisonOperator> for String {
    fn from(op: ComparisonOperator) -> Self {
        op.to_string()
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equals => "Equals",
            Self::NotEquals => "NotEquals",
            Self::GreaterThan => "GreaterThan",
            Self::LessThan => "LessThan",
            Self::GreaterThanOrEqual => "GreaterThanOrEqual",
            Self::LessThanOrEqual => "LessThanOrEqual",
            Self::Contains => "Contains",
            Self::NotContains => "NotContains",
            Self::StartsWith => "StartsWith",
            Self::EndsWith => "EndsWith",
            Self::IsNull => "IsNull",
            Self::IsNotNull => "IsNotNull",
            Self::In => "In",
            Self::NotIn => "NotIn",
            Self::Unknown(token) => token.as_str(),
        };
        write!(f, "{}", s)
    }
}

/// 逻辑操作符，描述当前条件与下一个条件的组合方式
///
/// 无法识别的文本或 null 按 AND 处理。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    pub fn apply(self, left: bool, right: bool) -> bool {
        match self {
            Self::And => left && right,
            Self::Or => left || right,
        }
    }
}

impl From<&str> for LogicalOperator {
    fn from(token: &str) -> Self {
        if token.trim().eq_ignore_ascii_case("OR") {
            Self::Or
        } else {
            Self::And
        }
    }
}

impl From<String> for LogicalOperator {
    fn from(token: String) -> Self {
        Self::from(token.as_str())
    }
}

impl From<Option<String>> for LogicalOperator {
    fn from(token: Option<String>) -> Self {
        token.map(Self::from).unwrap_or_default()
    }
}

impl From<LogicalOperator> for String {
    fn from(op: LogicalOperator) -> Self {
        op.to_string()
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// 动作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ActionKind {
    SetProperty,
    InvokeMethod,
    SendNotification,
    LogMessage,
    Custom,
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim().to_ascii_uppercase().as_str() {
            "SETPROPERTY" => Ok(Self::SetProperty),
            "INVOKEMETHOD" => Ok(Self::InvokeMethod),
            "SENDNOTIFICATION" => Ok(Self::SendNotification),
            "LOGMESSAGE" => Ok(Self::LogMessage),
            "CUSTOM" => Ok(Self::Custom),
            _ => Err(format!("未知的动作类型: {}", token)),
        }
    }
}

impl TryFrom<String> for ActionKind {
    type Error = String;

    fn try_from(token: String) -> Result<Self, Self::Error> {
        token.parse()
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SetProperty => "SetProperty",
            Self::InvokeMethod => "InvokeMethod",
            Self::SendNotification => "SendNotification",
            Self::LogMessage => "LogMessage",
            Self::Custom => "Custom",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_operator_parse_case_insensitive() {
        assert_eq!(
            ComparisonOperator::from("GreaterThanOrEqual"),
            ComparisonOperator::GreaterThanOrEqual
        );
        assert_eq!(ComparisonOperator::from("notin"), ComparisonOperator::NotIn);
        assert_eq!(
            ComparisonOperator::from("Matches"),
            ComparisonOperator::Unknown("Matches".to_string())
        );
    }

    #[test]
    fn test_comparison_operator_serde() {
        let op: ComparisonOperator = serde_json::from_str("\"startswith\"").unwrap();
        assert_eq!(op, ComparisonOperator::StartsWith);
        assert_eq!(serde_json::to_string(&op).unwrap(), "\"StartsWith\"");

        let unknown: ComparisonOperator = serde_json::from_str("\"Between\"").unwrap();
        assert_eq!(unknown.to_string(), "Between");
    }

    #[test]
    fn test_logical_operator_defaults_to_and() {
        assert_eq!(LogicalOperator::from("or"), LogicalOperator::Or);
        assert_eq!(LogicalOperator::from("AND"), LogicalOperator::And);
        assert_eq!(LogicalOperator::from("XOR"), LogicalOperator::And);
        assert_eq!(LogicalOperator::default(), LogicalOperator::And);
    }

    #[test]
    fn test_logical_operator_null_is_and() {
        let op: LogicalOperator = serde_json::from_str("null").unwrap();
        assert_eq!(op, LogicalOperator::And);

        let op: LogicalOperator = serde_json::from_str("\"Or\"").unwrap();
        assert_eq!(op, LogicalOperator::Or);
    }

    #[test]
    fn test_logical_operator_apply() {
        assert!(!LogicalOperator::And.apply(true, false));
        assert!(LogicalOperator::Or.apply(false, true));
    }

    #[test]
    fn test_action_kind_parse() {
        assert_eq!("setproperty".parse::<ActionKind>(), Ok(ActionKind::SetProperty));
        assert_eq!("InvokeMethod".parse::<ActionKind>(), Ok(ActionKind::InvokeMethod));
        assert!("Teleport".parse::<ActionKind>().is_err());

        let err = serde_json::from_str::<ActionKind>("\"Teleport\"");
        assert!(err.is_err());
    }
}
