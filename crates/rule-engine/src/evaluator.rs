//! 条件评估器
//!
//! 单个条件按字段类型比较；一组条件按顺序求值后从左到右折叠，AND 与 OR 之间没有优先级。

use crate::error::{Result, RuleError};
use crate::models::RuleCondition;
use crate::operators::{ComparisonOperator, LogicalOperator};
use crate::subject::Subject;
use crate::value::{FieldKind, FieldValue, coerce};
use std::cmp::Ordering;
use tracing::debug;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估单个条件
    ///
    /// 字段不存在时返回 false。
    pub fn evaluate_one<T: Subject>(condition: &RuleCondition, subject: &T) -> bool {
        match T::schema().read(subject, &condition.property_name) {
            Ok((kind, field_value)) => Self::evaluate_value(condition, kind, &field_value),
            Err(e) => {
                debug!(
                    property = %condition.property_name,
                    error = %e,
                    "条件字段不存在，视为不匹配"
                );
                false
            }
        }
    }

    /// 用已读取的字段值评估条件
    ///
    /// # Arguments
    /// * `condition` - 条件定义
    /// * `kind` - 字段声明的类型，条件值按此类型转换
    /// * `field_value` - 字段当前值
    pub fn evaluate_value(
        condition: &RuleCondition,
        kind: FieldKind,
        field_value: &FieldValue,
    ) -> bool {
        let raw = condition.value.as_deref();

        match &condition.operator {
            ComparisonOperator::Equals => {
                Self::typed_operand(condition, kind).is_some_and(|expected| *field_value == expected)
            }
            ComparisonOperator::NotEquals => {
                Self::typed_operand(condition, kind).is_some_and(|expected| *field_value != expected)
            }
            ComparisonOperator::GreaterThan => {
                Self::ordered(condition, kind, field_value, Ordering::is_gt)
            }
            ComparisonOperator::LessThan => {
                Self::ordered(condition, kind, field_value, Ordering::is_lt)
            }
            ComparisonOperator::GreaterThanOrEqual => {
                Self::ordered(condition, kind, field_value, Ordering::is_ge)
            }
            ComparisonOperator::LessThanOrEqual => {
                Self::ordered(condition, kind, field_value, Ordering::is_le)
            }
            ComparisonOperator::Contains => {
                Self::text_test(field_value, raw, |text, pattern| text.contains(pattern))
            }
            ComparisonOperator::NotContains => match (field_value.render(), raw) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(text), Some(pattern)) => !text.contains(pattern),
            },
            ComparisonOperator::StartsWith => {
                Self::text_test(field_value, raw, |text, prefix| text.starts_with(prefix))
            }
            ComparisonOperator::EndsWith => {
                Self::text_test(field_value, raw, |text, suffix| text.ends_with(suffix))
            }
            ComparisonOperator::IsNull => field_value.is_null(),
            ComparisonOperator::IsNotNull => !field_value.is_null(),
            ComparisonOperator::In => Self::in_list(field_value, raw),
            ComparisonOperator::NotIn => !Self::in_list(field_value, raw),
            ComparisonOperator::Unknown(token) => {
                debug!(operator = %token, "未知的比较操作符，视为不匹配");
                false
            }
        }
    }

    /// 评估一组条件
    ///
    /// 条件按 `sequence_order` 稳定排序后逐个求值，再按前一个条件的逻辑操作符从左到右折叠。
    /// 空条件列表恒为 true。
    pub fn evaluate_all<T: Subject>(conditions: &[RuleCondition], subject: &T) -> bool {
        let ordered = RuleCondition::in_sequence(conditions);

        let results: Vec<bool> = ordered
            .iter()
            .map(|condition| Self::evaluate_one(condition, subject))
            .collect();

        // 最后一个条件的逻辑操作符不参与计算
        let operators: Vec<LogicalOperator> = ordered
            .iter()
            .take(ordered.len().saturating_sub(1))
            .map(|c| c.logical_operator)
            .collect();

        Self::fold(&results, &operators)
    }

    /// 从左到右折叠布尔结果
    ///
    /// `operators[i]` 连接 `results[i]` 与 `results[i + 1]`，例如
    /// `[a, b, c]` 与 `[AND, OR]` 计算为 `(a && b) || c`。
    pub fn fold(results: &[bool], operators: &[LogicalOperator]) -> bool {
        let Some((&first, rest)) = results.split_first() else {
            return true;
        };

        rest.iter()
            .zip(operators)
            .fold(first, |acc, (&next, op)| op.apply(acc, next))
    }

    /// 检查条件列表结构
    ///
    /// 字段名为空的条件无法评估，视为规则结构无效。
    pub fn check_conditions(conditions: &[RuleCondition]) -> Result<()> {
        if let Some(condition) = conditions
            .iter()
            .find(|c| c.property_name.trim().is_empty())
        {
            return Err(RuleError::MalformedRule(format!(
                "条件 {} 缺少字段名",
                condition.id
            )));
        }
        Ok(())
    }

    /// 将条件值转换为字段类型，失败时返回 None
    fn typed_operand(condition: &RuleCondition, kind: FieldKind) -> Option<FieldValue> {
        match coerce(condition.value.as_deref(), kind) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(
                    property = %condition.property_name,
                    error = %e,
                    "条件值转换失败，视为不匹配"
                );
                None
            }
        }
    }

    /// 有序比较，不可比较时为 false
    fn ordered<F>(condition: &RuleCondition, kind: FieldKind, field: &FieldValue, test: F) -> bool
    where
        F: Fn(Ordering) -> bool,
    {
        Self::typed_operand(condition, kind)
            .and_then(|expected| field.compare(&expected))
            .is_some_and(test)
    }

    /// 字段字符串形式与原始条件文本比较，任一方缺失时为 false
    fn text_test<F>(field: &FieldValue, raw: Option<&str>, test: F) -> bool
    where
        F: Fn(&str, &str) -> bool,
    {
        match (field.render(), raw) {
            (Some(text), Some(pattern)) => test(&text, pattern),
            _ => false,
        }
    }

    /// 逗号分隔列表的成员检查，元素按原文比较
    fn in_list(field: &FieldValue, raw: Option<&str>) -> bool {
        match (field.render(), raw) {
            (Some(text), Some(list)) => list.split(',').any(|item| item == text),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::{Customer, Order};
    use rust_decimal::Decimal;

    fn cond(property: &str, op: &str, value: &str) -> RuleCondition {
        RuleCondition::new(property, op, Some(value))
    }

    fn customer() -> Customer {
        Customer {
            name: "Jane Smith".to_string(),
            email: Some("jane@example.com".to_string()),
            age: 35,
            membership_level: "Gold".to_string(),
            total_purchases: Decimal::from(1500),
            ..Customer::default()
        }
    }

    #[test]
    fn test_equals_uses_coerced_value() {
        let c = customer();
        assert!(ConditionEvaluator::evaluate_one(&cond("TotalPurchases", "Equals", "1500.00"), &c));
        assert!(ConditionEvaluator::evaluate_one(&cond("IsVip", "Equals", "False"), &c));
        assert!(ConditionEvaluator::evaluate_one(&cond("MembershipLevel", "NotEquals", "Bronze"), &c));
        assert!(!ConditionEvaluator::evaluate_one(&cond("Age", "Equals", "36"), &c));
    }

    #[test]
    fn test_ordering_operators() {
        let c = customer();
        assert!(ConditionEvaluator::evaluate_one(&cond("TotalPurchases", "GreaterThanOrEqual", "1000"), &c));
        assert!(ConditionEvaluator::evaluate_one(&cond("TotalPurchases", "LessThanOrEqual", "1500"), &c));
        assert!(ConditionEvaluator::evaluate_one(&cond("Age", "LessThan", "65"), &c));
        assert!(!ConditionEvaluator::evaluate_one(&cond("Age", "GreaterThan", "35"), &c));
        assert!(ConditionEvaluator::evaluate_one(&cond("Name", "GreaterThan", "Adam"), &c));
    }

    #[test]
    fn test_ordering_on_boolean_is_false() {
        let c = customer();
        assert!(!ConditionEvaluator::evaluate_one(&cond("IsVip", "LessThan", "true"), &c));
        assert!(!ConditionEvaluator::evaluate_one(&cond("IsVip", "GreaterThanOrEqual", "false"), &c));
    }

    #[test]
    fn test_datetime_comparison() {
        let c = customer();
        assert!(ConditionEvaluator::evaluate_one(
            &cond("LastPurchaseDate", "GreaterThan", "2000-01-01"),
            &c
        ));
        assert!(ConditionEvaluator::evaluate_one(
            &cond("LastPurchaseDate", "LessThan", "2999-12-31T00:00:00Z"),
            &c
        ));
    }

    #[test]
    fn test_coercion_failure_is_fail_closed() {
        let c = customer();
        assert!(!ConditionEvaluator::evaluate_one(&cond("Age", "Equals", "thirty"), &c));
        assert!(!ConditionEvaluator::evaluate_one(&cond("Age", "NotEquals", "thirty"), &c));
        assert!(!ConditionEvaluator::evaluate_one(&cond("Age", "GreaterThan", ""), &c));
        assert!(!ConditionEvaluator::evaluate_one(
            &RuleCondition::new("TotalPurchases", "Equals", None),
            &c
        ));
    }

    #[test]
    fn test_missing_field_is_false() {
        let c = customer();
        assert!(!ConditionEvaluator::evaluate_one(&cond("Nickname", "Equals", "J"), &c));
        assert!(!ConditionEvaluator::evaluate_one(&cond("Nickname", "IsNull", ""), &c));
        assert!(!ConditionEvaluator::evaluate_one(&cond("Nickname", "NotIn", "a,b"), &c));
    }

    #[test]
    fn test_string_operators_use_raw_text() {
        let c = customer();
        assert!(ConditionEvaluator::evaluate_one(&cond("Name", "Contains", "Smith"), &c));
        assert!(ConditionEvaluator::evaluate_one(&cond("Name", "StartsWith", "Jane"), &c));
        assert!(ConditionEvaluator::evaluate_one(&cond("Email", "EndsWith", "@example.com"), &c));
        assert!(ConditionEvaluator::evaluate_one(&cond("Name", "NotContains", "Doe"), &c));

        // 数值字段按字符串形式匹配原始文本，不做二次转换
        assert!(ConditionEvaluator::evaluate_one(&cond("TotalPurchases", "StartsWith", "15"), &c));
        assert!(!ConditionEvaluator::evaluate_one(&cond("TotalPurchases", "Contains", "1500.0"), &c));
        assert!(ConditionEvaluator::evaluate_one(&cond("IsVip", "Contains", "fal"), &c));
    }

    #[test]
    fn test_string_operators_on_null_field() {
        let c = Customer {
            email: None,
            ..customer()
        };
        assert!(!ConditionEvaluator::evaluate_one(&cond("Email", "Contains", "@"), &c));
        assert!(ConditionEvaluator::evaluate_one(&cond("Email", "NotContains", "@"), &c));
        assert!(!ConditionEvaluator::evaluate_one(&cond("Email", "StartsWith", "j"), &c));
        assert!(!ConditionEvaluator::evaluate_one(&cond("Email", "EndsWith", "m"), &c));
    }

    #[test]
    fn test_string_operators_without_condition_text() {
        let c = customer();
        let contains = RuleCondition::new("Name", "Contains", None);
        let not_contains = RuleCondition::new("Name", "NotContains", None);
        assert!(!ConditionEvaluator::evaluate_one(&contains, &c));
        assert!(!ConditionEvaluator::evaluate_one(&not_contains, &c));
    }

    #[test]
    fn test_null_checks_ignore_value() {
        let with_email = customer();
        let without_email = Customer {
            email: None,
            ..customer()
        };

        let is_null = cond("Email", "IsNull", "whatever");
        let is_not_null = RuleCondition::new("Email", "IsNotNull", None);

        assert!(!ConditionEvaluator::evaluate_one(&is_null, &with_email));
        assert!(ConditionEvaluator::evaluate_one(&is_null, &without_email));
        assert!(ConditionEvaluator::evaluate_one(&is_not_null, &with_email));
        assert!(!ConditionEvaluator::evaluate_one(&is_not_null, &without_email));

        // 整数字段从不为空，IsNull 不会因为空的条件值而转换失败
        assert!(!ConditionEvaluator::evaluate_one(&cond("Age", "IsNull", ""), &with_email));
        assert!(ConditionEvaluator::evaluate_one(&cond("Age", "IsNotNull", ""), &with_email));
    }

    #[test]
    fn test_in_and_not_in() {
        let c = customer();
        assert!(ConditionEvaluator::evaluate_one(&cond("MembershipLevel", "In", "Silver,Gold,VIP"), &c));
        assert!(!ConditionEvaluator::evaluate_one(&cond("MembershipLevel", "NotIn", "Silver,Gold"), &c));
        assert!(ConditionEvaluator::evaluate_one(&cond("Age", "In", "30,35,40"), &c));

        // 元素按原文比较，不去除空格
        assert!(!ConditionEvaluator::evaluate_one(&cond("MembershipLevel", "In", "Silver, Gold"), &c));

        let no_email = Customer {
            email: None,
            ..customer()
        };
        assert!(!ConditionEvaluator::evaluate_one(&cond("Email", "In", "a@b.com"), &no_email));
        assert!(ConditionEvaluator::evaluate_one(&cond("Email", "NotIn", "a@b.com"), &no_email));
        assert!(ConditionEvaluator::evaluate_one(
            &RuleCondition::new("MembershipLevel", "NotIn", None),
            &c
        ));
    }

    #[test]
    fn test_unknown_operator_is_false() {
        let c = customer();
        assert!(!ConditionEvaluator::evaluate_one(&cond("Age", "Between", "30,40"), &c));
        assert!(!ConditionEvaluator::evaluate_one(&cond("Age", "", "35"), &c));
    }

    #[test]
    fn test_operator_tokens_are_case_insensitive() {
        let c = customer();
        assert!(ConditionEvaluator::evaluate_one(&cond("Age", "greaterthanorequal", "35"), &c));
        assert!(ConditionEvaluator::evaluate_one(&cond("Age", "EQUALS", "35"), &c));
    }

    #[test]
    fn test_empty_conditions_are_vacuously_true() {
        assert!(ConditionEvaluator::evaluate_all(&[], &customer()));
        assert!(ConditionEvaluator::evaluate_all(&[], &Order::default()));
    }

    #[test]
    fn test_single_condition_ignores_logical_operator() {
        let c = customer();
        for logical in [LogicalOperator::And, LogicalOperator::Or] {
            let matching = [cond("Age", "Equals", "35").with_logical(logical)];
            let failing = [cond("Age", "Equals", "99").with_logical(logical)];
            assert!(ConditionEvaluator::evaluate_all(&matching, &c));
            assert!(!ConditionEvaluator::evaluate_all(&failing, &c));
        }
    }

    #[test]
    fn test_fold_is_left_to_right_without_precedence() {
        use LogicalOperator::{And, Or};

        // (a, b, c, ops, expected)
        let table = [
            // (false && true) || true = true；若 AND 优先于 OR 结合右侧则为 false && (true || true) = false
            (false, true, true, [And, Or], true),
            // (true || false) && false = false；按优先级为 true || (false && false) = true
            (true, false, false, [Or, And], false),
            // (true && false) || true = true
            (true, false, true, [And, Or], true),
            // (false || true) && true = true
            (false, true, true, [Or, And], true),
            // (false && false) || false = false
            (false, false, false, [And, Or], false),
            // (true || false) || false = true
            (true, false, false, [Or, Or], true),
        ];

        for (a, b, c, ops, expected) in table {
            assert_eq!(
                ConditionEvaluator::fold(&[a, b, c], &ops),
                expected,
                "fold({a}, {b}, {c}, {ops:?})"
            );
        }
    }

    #[test]
    fn test_evaluate_all_folds_in_sequence_order() {
        // Amount>500 (AND), HasDiscount=false (OR), Status=Pending
        let order = Order {
            amount: Decimal::from(600),
            has_discount: true,
            status: "Pending".to_string(),
            ..Order::default()
        };

        let conditions = vec![
            cond("Status", "Equals", "Pending").with_sequence(3),
            cond("Amount", "GreaterThan", "500").with_sequence(1),
            cond("HasDiscount", "Equals", "false")
                .with_logical(LogicalOperator::Or)
                .with_sequence(2),
        ];

        // (true && false) || true
        assert!(ConditionEvaluator::evaluate_all(&conditions, &order));

        let not_pending = Order {
            status: "Shipped".to_string(),
            ..order
        };
        // (true && false) || false
        assert!(!ConditionEvaluator::evaluate_all(&conditions, &not_pending));
    }

    #[test]
    fn test_check_conditions() {
        assert!(ConditionEvaluator::check_conditions(&[cond("Age", "Equals", "1")]).is_ok());

        let malformed = [cond("  ", "Equals", "1")];
        assert!(matches!(
            ConditionEvaluator::check_conditions(&malformed),
            Err(RuleError::MalformedRule(_))
        ));
    }
}
