//! 规则引擎领域模型

use crate::operators::{ActionKind, ComparisonOperator, LogicalOperator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_active() -> bool {
    true
}

/// 规则定义
///
/// 条件按 `sequence_order`、动作按 `execution_order` 稳定排序后使用，评估过程中规则本身只读。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// 由规则存储分配
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// 规则适用的主体类型标签
    pub target_type: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// 数值越大越先评估
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

impl Rule {
    pub fn new(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: None,
            target_type: target_type.into(),
            is_active: true,
            priority: 0,
            created_at: Utc::now(),
            modified_at: None,
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// 名称或描述是否包含指定文本
    pub fn matches_filter(&self, filter: &str) -> bool {
        self.name.contains(filter)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.contains(filter))
    }
}

/// 条件定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    #[serde(default)]
    pub id: i64,
    /// 主体上的字段名
    pub property_name: String,
    pub operator: ComparisonOperator,
    /// 比较值，In / NotIn 时为逗号分隔列表
    #[serde(default)]
    pub value: Option<String>,
    /// 与下一个条件的组合方式，最后一个条件的该字段不参与计算
    #[serde(default)]
    pub logical_operator: LogicalOperator,
    #[serde(default)]
    pub sequence_order: i32,
}

impl RuleCondition {
    pub fn new(
        property_name: impl Into<String>,
        operator: impl Into<ComparisonOperator>,
        value: Option<&str>,
    ) -> Self {
        Self {
            id: 0,
            property_name: property_name.into(),
            operator: operator.into(),
            value: value.map(str::to_string),
            logical_operator: LogicalOperator::And,
            sequence_order: 0,
        }
    }

    pub fn with_logical(mut self, logical_operator: LogicalOperator) -> Self {
        self.logical_operator = logical_operator;
        self
    }

    pub fn with_sequence(mut self, sequence_order: i32) -> Self {
        self.sequence_order = sequence_order;
        self
    }

    /// 按 `sequence_order` 排序（相同序号保持原有顺序）
    pub fn in_sequence(conditions: &[Self]) -> Vec<&Self> {
        let mut ordered: Vec<&Self> = conditions.iter().collect();
        ordered.sort_by_key(|c| c.sequence_order);
        ordered
    }
}

/// 动作定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(default)]
    pub id: i64,
    pub action_type: ActionKind,
    /// 字段名、方法名或自定义动作名
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub parameters: Option<ActionParameters>,
    #[serde(default)]
    pub execution_order: i32,
}

impl RuleAction {
    pub fn new(action_type: ActionKind, target: impl Into<String>) -> Self {
        Self {
            id: 0,
            action_type,
            target: target.into(),
            parameters: None,
            execution_order: 0,
        }
    }

    pub fn with_parameters(mut self, parameters: ActionParameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_order(mut self, execution_order: i32) -> Self {
        self.execution_order = execution_order;
        self
    }

    /// 按 `execution_order` 排序（相同序号保持原有顺序）
    pub fn in_execution_order(actions: &[Self]) -> Vec<&Self> {
        let mut ordered: Vec<&Self> = actions.iter().collect();
        ordered.sort_by_key(|a| a.execution_order);
        ordered
    }

    /// 执行记录中的动作描述，如 `SetProperty: IsVip`
    pub fn descriptor(&self) -> String {
        format!("{}: {}", self.action_type, self.target)
    }

    /// 第一个参数值
    pub fn first_value(&self) -> Option<&str> {
        self.parameters.as_ref().and_then(ActionParameters::first_value)
    }

    /// 原始参数文本，自定义动作和日志动作直接使用
    pub fn payload(&self) -> String {
        self.parameters
            .as_ref()
            .map(ActionParameters::payload)
            .unwrap_or_default()
    }
}

/// 动作参数：单个文本或命名参数列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionParameters {
    Text(String),
    Named(Vec<ActionParameter>),
}

impl ActionParameters {
    pub fn first_value(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            Self::Named(params) => params.first().map(|p| p.value.as_str()),
        }
    }

    /// 按名称查找参数（不区分大小写）
    pub fn get(&self, name: &str) -> Option<&str> {
        self.named()
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }

    pub fn named(&self) -> &[ActionParameter] {
        match self {
            Self::Text(_) => &[],
            Self::Named(params) => params.as_slice(),
        }
    }

    /// 文本参数原样返回，命名参数序列化为 JSON 对象
    pub fn payload(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Named(params) => {
                let map: serde_json::Map<String, serde_json::Value> = params
                    .iter()
                    .map(|p| (p.name.clone(), serde_json::Value::String(p.value.clone())))
                    .collect();
                serde_json::Value::Object(map).to_string()
            }
        }
    }
}

impl From<&str> for ActionParameters {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// 命名参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionParameter {
    #[serde(alias = "parameter_name")]
    pub name: String,
    pub value: String,
    /// 可选的类型提示，如 "int"、"decimal"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl ActionParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            data_type: None,
        }
    }
}

/// 动作执行记录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionTrail {
    pub executed_actions: Vec<String>,
    pub errors: Vec<String>,
}

/// 一次评估调用的汇总结果
#[derive(Debug)]
pub struct EvaluationResult<'a, T> {
    pub success: bool,
    pub matched_rules: Vec<Rule>,
    pub executed_actions: Vec<String>,
    pub errors: Vec<String>,
    /// 调用方传入的同一个主体实例
    pub modified_object: &'a mut T,
}

impl<T> EvaluationResult<'_, T> {
    pub fn matched_rule_names(&self) -> Vec<&str> {
        self.matched_rules.iter().map(|r| r.name.as_str()).collect()
    }
}
