//! 业务规则引擎
//!
//! 以数据驱动的方式对任意主体（如客户、订单）评估规则，支持：
//! - JSON 规则定义，操作符和动作类型不区分大小写
//! - 条件按顺序从左到右组合（AND / OR 无优先级）
//! - 匹配后按顺序执行动作，单个动作失败相互隔离
//! - 可替换的规则存储、通知服务和自定义动作

pub mod builder;
pub mod custom;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod models;
pub mod notification;
pub mod operators;
pub mod samples;
pub mod store;
pub mod subject;
pub mod value;

pub use builder::RuleBuilder;
pub use custom::{CustomActionHandler, CustomActionRegistry};
pub use engine::{RuleEvaluator, RulesEngine};
pub use error::{Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use executor::ActionExecutor;
pub use models::{
    ActionParameter, ActionParameters, ActionTrail, EvaluationResult, Rule, RuleAction,
    RuleCondition,
};
pub use notification::{EmailMessage, LoggingNotificationService, NotificationService};
pub use operators::{ActionKind, ComparisonOperator, LogicalOperator};
pub use store::{InMemoryRuleStore, RuleStore};
pub use subject::{Invocation, MethodParam, Subject, SubjectSchema, SubjectSnapshot};
pub use value::{FieldKind, FieldType, FieldValue, RecordField};
