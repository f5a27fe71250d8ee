//! 自定义动作
//!
//! `Custom` 动作按名称（不区分大小写）分发到注册的处理器。执行器不了解自定义动作的语义，
//! 只传递主体快照和原始参数文本。

use crate::error::Result;
use crate::notification::{EmailMessage, NotificationService};
use crate::subject::SubjectSnapshot;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// 自定义动作处理器
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomActionHandler: Send + Sync {
    async fn execute(&self, subject: &SubjectSnapshot, parameters: &str) -> Result<()>;
}

/// 自定义动作注册表
pub struct CustomActionRegistry {
    handlers: DashMap<String, Arc<dyn CustomActionHandler>>,
}

impl Default for CustomActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// 注册内置处理器：`sendemail`、`updateauditlog`、`triggerworkflow`
    pub fn with_defaults(notifier: Arc<dyn NotificationService>) -> Self {
        let registry = Self::new();
        registry.register("sendemail", Arc::new(SendEmailHandler::new(notifier)));
        registry.register("updateauditlog", Arc::new(AuditLogHandler));
        registry.register("triggerworkflow", Arc::new(WorkflowTriggerHandler));
        registry
    }

    /// 注册处理器，同名处理器会被替换
    pub fn register(&self, name: &str, handler: Arc<dyn CustomActionHandler>) {
        self.handlers.insert(name.to_lowercase(), handler);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.to_lowercase())
    }

    /// 已注册的动作名（小写、排序）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// 执行自定义动作
    ///
    /// 未注册的名称只记录警告，不视为错误。
    pub async fn execute(
        &self,
        name: &str,
        subject: &SubjectSnapshot,
        parameters: &str,
    ) -> Result<()> {
        // 先取出处理器再 await，避免跨 await 持有分片锁
        let handler = self
            .handlers
            .get(&name.to_lowercase())
            .map(|entry| Arc::clone(entry.value()));

        match handler {
            Some(handler) => handler.execute(subject, parameters).await,
            None => {
                warn!(action = %name, "Unknown custom action: {}", name);
                Ok(())
            }
        }
    }
}

/// 从 JSON 参数发送邮件
pub struct SendEmailHandler {
    notifier: Arc<dyn NotificationService>,
}

impl SendEmailHandler {
    pub fn new(notifier: Arc<dyn NotificationService>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl CustomActionHandler for SendEmailHandler {
    async fn execute(&self, _subject: &SubjectSnapshot, parameters: &str) -> Result<()> {
        let message = EmailMessage::from_json(parameters)?;
        let to = message.recipient()?;
        self.notifier
            .send_email(to, &message.subject, &message.body)
            .await
    }
}

/// 写入审计日志
pub struct AuditLogHandler;

#[async_trait]
impl CustomActionHandler for AuditLogHandler {
    async fn execute(&self, subject: &SubjectSnapshot, parameters: &str) -> Result<()> {
        info!(
            target: "rule_engine::audit",
            subject_type = %subject.target_type,
            "Audit: Rule executed on {} - {}",
            subject.target_type,
            parameters
        );
        Ok(())
    }
}

/// 触发外部工作流
pub struct WorkflowTriggerHandler;

#[async_trait]
impl CustomActionHandler for WorkflowTriggerHandler {
    async fn execute(&self, subject: &SubjectSnapshot, parameters: &str) -> Result<()> {
        info!(
            subject_type = %subject.target_type,
            "Triggering workflow: {}",
            parameters
        );
        Ok(())
    }
}
