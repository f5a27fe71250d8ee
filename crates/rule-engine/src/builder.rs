//! 规则构建器

use crate::models::{ActionParameter, ActionParameters, Rule, RuleAction, RuleCondition};
use crate::operators::{ActionKind, ComparisonOperator, LogicalOperator};

/// 以链式调用构建规则
///
/// 条件和动作按添加顺序编号（从 1 开始）。
///
/// ```
/// use rule_engine::{ActionKind, RuleBuilder};
///
/// let rule = RuleBuilder::new("Large Order Discount", "Order")
///     .with_priority(8)
///     .add_condition("Amount", "GreaterThan", "500")
///     .add_condition("HasDiscount", "Equals", "False")
///     .add_action(ActionKind::InvokeMethod, "ApplyDiscount", Some("10"))
///     .build();
///
/// assert_eq!(rule.conditions.len(), 2);
/// assert_eq!(rule.actions[0].execution_order, 1);
/// ```
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    rule: Rule,
}

impl RuleBuilder {
    pub fn new(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            rule: Rule::new(name, target_type),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.rule.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.rule.priority = priority;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.rule.is_active = false;
        self
    }

    /// 添加以 AND 连接下一个条件的条件
    pub fn add_condition(
        self,
        property: &str,
        operator: impl Into<ComparisonOperator>,
        value: &str,
    ) -> Self {
        self.add_condition_with(property, operator, value, LogicalOperator::And)
    }

    pub fn add_condition_with(
        mut self,
        property: &str,
        operator: impl Into<ComparisonOperator>,
        value: &str,
        logical_operator: LogicalOperator,
    ) -> Self {
        let sequence = self.rule.conditions.len() as i32 + 1;
        self.rule.conditions.push(
            RuleCondition::new(property, operator, Some(value))
                .with_logical(logical_operator)
                .with_sequence(sequence),
        );
        self
    }

    /// 添加动作，`parameters` 为单个文本参数
    pub fn add_action(mut self, kind: ActionKind, target: &str, parameters: Option<&str>) -> Self {
        let order = self.next_action_order();
        let mut action = RuleAction::new(kind, target).with_order(order);
        action.parameters = parameters.map(ActionParameters::from);
        self.rule.actions.push(action);
        self
    }

    /// 添加带命名参数的动作
    pub fn add_named_action(mut self, kind: ActionKind, target: &str, parameters: &[(&str, &str)]) -> Self {
        let order = self.next_action_order();
        let named = parameters
            .iter()
            .map(|(name, value)| ActionParameter::new(*name, *value))
            .collect();
        self.rule.actions.push(
            RuleAction::new(kind, target)
                .with_parameters(ActionParameters::Named(named))
                .with_order(order),
        );
        self
    }

    pub fn build(self) -> Rule {
        self.rule
    }

    fn next_action_order(&self) -> i32 {
        self.rule.actions.len() as i32 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assigns_orders() {
        let rule = RuleBuilder::new("VIP Customer Upgrade", "Customer")
            .with_description("Upgrade customers to VIP")
            .with_priority(10)
            .add_condition("TotalPurchases", "GreaterThanOrEqual", "1000")
            .add_condition_with("IsVip", "Equals", "False", LogicalOperator::Or)
            .add_action(ActionKind::SetProperty, "IsVip", Some("True"))
            .add_named_action(
                ActionKind::SendNotification,
                "Email",
                &[("Subject", "Welcome"), ("Body", "You are VIP")],
            )
            .build();

        assert_eq!(rule.priority, 10);
        assert!(rule.is_active);
        assert_eq!(rule.description.as_deref(), Some("Upgrade customers to VIP"));

        let sequences: Vec<i32> = rule.conditions.iter().map(|c| c.sequence_order).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert_eq!(rule.conditions[1].logical_operator, LogicalOperator::Or);
        assert_eq!(
            rule.conditions[0].operator,
            ComparisonOperator::GreaterThanOrEqual
        );

        let orders: Vec<i32> = rule.actions.iter().map(|a| a.execution_order).collect();
        assert_eq!(orders, vec![1, 2]);
        assert_eq!(
            rule.actions[1].parameters.as_ref().unwrap().get("subject"),
            Some("Welcome")
        );
    }

    #[test]
    fn test_inactive() {
        let rule = RuleBuilder::new("off", "Order").inactive().build();
        assert!(!rule.is_active);
        assert!(rule.conditions.is_empty());
    }
}
