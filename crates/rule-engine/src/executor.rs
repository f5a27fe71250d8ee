//! 动作执行器
//!
//! 按 `execution_order` 顺序执行匹配规则的动作。每个动作独立执行，失败记入错误列表后继续下一个动作。

use crate::custom::CustomActionRegistry;
use crate::error::Result;
use crate::models::{ActionParameters, ActionTrail, RuleAction};
use crate::notification::{EmailMessage, NotificationService};
use crate::operators::ActionKind;
use crate::subject::{Invocation, MethodParam, Subject};
use crate::value::{coerce, coerce_record};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 动作执行器
pub struct ActionExecutor {
    notifier: Arc<dyn NotificationService>,
    custom_actions: Arc<CustomActionRegistry>,
}

impl ActionExecutor {
    pub fn new(
        notifier: Arc<dyn NotificationService>,
        custom_actions: Arc<CustomActionRegistry>,
    ) -> Self {
        Self {
            notifier,
            custom_actions,
        }
    }

    /// 依次执行动作，结果写入 `trail`
    ///
    /// 成功记录 `"<类型>: <目标>"`，失败记录 `"Error executing action <id>: <原因>"`。
    pub async fn run_all<T: Subject>(
        &self,
        actions: &[RuleAction],
        subject: &mut T,
        trail: &mut ActionTrail,
    ) {
        for action in RuleAction::in_execution_order(actions) {
            match self.execute(action, subject).await {
                Ok(()) => {
                    counter!(
                        "rule_actions_total",
                        "action_type" => action.action_type.to_string(),
                        "status" => "success"
                    )
                    .increment(1);
                    trail.executed_actions.push(action.descriptor());
                }
                Err(e) => {
                    warn!(
                        action_id = action.id,
                        action = %action.descriptor(),
                        error = %e,
                        "动作执行失败"
                    );
                    counter!(
                        "rule_actions_total",
                        "action_type" => action.action_type.to_string(),
                        "status" => "failure"
                    )
                    .increment(1);
                    trail
                        .errors
                        .push(format!("Error executing action {}: {}", action.id, e));
                }
            }
        }
    }

    /// 执行单个动作
    pub async fn execute<T: Subject>(&self, action: &RuleAction, subject: &mut T) -> Result<()> {
        match action.action_type {
            ActionKind::SetProperty => {
                Self::set_property(action, subject);
                Ok(())
            }
            ActionKind::InvokeMethod => Self::invoke_method(action, subject).await,
            ActionKind::SendNotification => self.send_notification(action, subject).await,
            ActionKind::LogMessage => {
                info!(
                    target: "rule_engine::actions",
                    subject_type = T::target_type(),
                    action_id = action.id,
                    "{}",
                    action.payload()
                );
                Ok(())
            }
            ActionKind::Custom => {
                let snapshot = T::schema().snapshot(subject);
                self.custom_actions
                    .execute(&action.target, &snapshot, &action.payload())
                    .await
            }
        }
    }

    /// 字段缺失、只读、参数无法转换或类型不符时均不修改主体
    fn set_property<T: Subject>(action: &RuleAction, subject: &mut T) {
        let schema = T::schema();

        let kind = match schema.writable_kind(&action.target) {
            Ok(kind) => kind,
            Err(e) => {
                debug!(field = %action.target, error = %e, "字段不可写，跳过 SetProperty");
                return;
            }
        };

        let value = match coerce(action.first_value(), kind) {
            Ok(value) => value,
            Err(e) => {
                warn!(field = %action.target, error = %e, "参数转换失败，跳过 SetProperty");
                return;
            }
        };

        if let Err(e) = schema.set(subject, &action.target, value) {
            warn!(field = %action.target, error = %e, "字段赋值失败，跳过 SetProperty");
        }
    }

    async fn invoke_method<T: Subject>(action: &RuleAction, subject: &mut T) -> Result<()> {
        let schema = T::schema();

        let param = match schema.method_param(&action.target) {
            Ok(param) => param,
            Err(_) => {
                debug!(method = %action.target, "方法不存在，跳过 InvokeMethod");
                return Ok(());
            }
        };

        let argument = match param {
            MethodParam::None => None,
            MethodParam::Scalar(kind) => match coerce(action.first_value(), *kind) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(method = %action.target, error = %e, "参数转换失败，跳过 InvokeMethod");
                    return Ok(());
                }
            },
            MethodParam::Record(fields) => {
                let named = action
                    .parameters
                    .as_ref()
                    .map(ActionParameters::named)
                    .unwrap_or_default();
                match coerce_record(named, fields) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(method = %action.target, error = %e, "参数转换失败，跳过 InvokeMethod");
                        return Ok(());
                    }
                }
            }
        };

        match schema.invoke(subject, &action.target, argument)? {
            Invocation::Completed => Ok(()),
            Invocation::Pending(operation) => operation.await,
        }
    }

    async fn send_notification<T: Subject>(&self, action: &RuleAction, subject: &T) -> Result<()> {
        let message = Self::compose_email(action, subject)?;
        let to = message.recipient()?;
        self.notifier
            .send_email(to, &message.subject, &message.body)
            .await
    }

    /// 组装邮件
    ///
    /// 命名参数取 `To` / `Subject` / `Body`；文本参数为 JSON 时按邮件对象解析，否则作为正文。
    /// 未指定收件人时读取 `target` 指向的主体字段。
    fn compose_email<T: Subject>(action: &RuleAction, subject: &T) -> Result<EmailMessage> {
        let mut message = match &action.parameters {
            None => EmailMessage::default(),
            Some(ActionParameters::Text(text)) if text.trim_start().starts_with('{') => {
                EmailMessage::from_json(text)?
            }
            Some(ActionParameters::Text(text)) => EmailMessage {
                body: text.clone(),
                ..Default::default()
            },
            Some(params @ ActionParameters::Named(_)) => EmailMessage {
                to: params.get("To").map(str::to_string),
                subject: params.get("Subject").unwrap_or_default().to_string(),
                body: params.get("Body").unwrap_or_default().to_string(),
            },
        };

        let needs_recipient = message.to.as_deref().is_none_or(|to| to.trim().is_empty());
        if needs_recipient && !action.target.is_empty() {
            if let Ok(value) = T::schema().get(subject, &action.target) {
                message.to = value.render();
            }
        }

        Ok(message)
    }
}
