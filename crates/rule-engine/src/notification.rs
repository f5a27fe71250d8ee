//! 通知服务
//!
//! `SendNotification` 动作和内置的 `sendemail` 自定义动作通过 [`NotificationService`] 发送邮件。
//! 默认实现只记录日志，接入真实邮件服务时实现同一 trait 即可。

use crate::error::{Result, RuleError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

/// 邮件内容
///
/// 可由 JSON 文本解析，字段名接受 `to` / `To` 两种写法。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EmailMessage {
    #[serde(default, alias = "To")]
    pub to: Option<String>,
    #[serde(default, alias = "Subject")]
    pub subject: String,
    #[serde(default, alias = "Body")]
    pub body: String,
}

impl EmailMessage {
    pub fn from_json(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    /// 收件人，缺失或为空时报错
    pub fn recipient(&self) -> Result<&str> {
        self.to
            .as_deref()
            .map(str::trim)
            .filter(|to| !to.is_empty())
            .ok_or_else(|| RuleError::Notification("缺少收件人".to_string()))
    }
}

/// 邮件通知服务
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// 发送邮件
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// 记录日志的通知服务
#[derive(Debug, Default, Clone)]
pub struct LoggingNotificationService;

#[async_trait]
impl NotificationService for LoggingNotificationService {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message_id = Uuid::now_v7().to_string();

        info!(
            channel = "EMAIL",
            message_id = %message_id,
            to = %to,
            subject = %subject,
            body_len = body.len(),
            "模拟发送邮件通知"
        );

        Ok(())
    }
}
