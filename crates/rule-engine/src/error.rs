//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("无法将 '{value}' 转换为 {kind}")]
    Coercion { value: String, kind: String },

    #[error("成员不存在: {0}")]
    MemberNotFound(String),

    #[error("成员只读: {0}")]
    ReadOnly(String),

    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("{0}")]
    ExecutionError(String),

    #[error("规则结构无效: {0}")]
    MalformedRule(String),

    #[error("规则校验失败: {0}")]
    Validation(String),

    #[error("规则未找到: {0}")]
    RuleNotFound(i64),

    #[error("通知发送失败: {0}")]
    Notification(String),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl RuleError {
    /// 构造动作执行错误，供宿主方法实现返回
    pub fn execution(message: impl Into<String>) -> Self {
        Self::ExecutionError(message.into())
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
