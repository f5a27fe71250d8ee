//! 规则评估编排
//!
//! [`RuleEvaluator`] 按给定顺序逐条评估规则，匹配后执行动作；[`RulesEngine`] 在其之上
//! 从规则存储获取规则，并提供规则维护的透传接口。

use crate::custom::CustomActionRegistry;
use crate::error::{Result, RuleError};
use crate::evaluator::ConditionEvaluator;
use crate::executor::ActionExecutor;
use crate::models::{ActionTrail, EvaluationResult, Rule};
use crate::notification::NotificationService;
use crate::store::RuleStore;
use crate::subject::Subject;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

/// 规则评估器
pub struct RuleEvaluator {
    executor: ActionExecutor,
}

impl RuleEvaluator {
    pub fn new(executor: ActionExecutor) -> Self {
        Self { executor }
    }

    /// 使用指定的通知服务和自定义动作注册表构建评估器
    pub fn with_services(
        notifier: Arc<dyn NotificationService>,
        custom_actions: Arc<CustomActionRegistry>,
    ) -> Self {
        Self::new(ActionExecutor::new(notifier, custom_actions))
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// 对主体评估一组规则
    ///
    /// 规则按传入顺序评估，不再按主体类型筛选。条件成立的规则记入 `matched_rules` 并执行其动作，
    /// 单个动作失败不影响后续动作和规则。规则结构无效时记录一条
    /// `"Error during rule evaluation: ..."`，`success` 置为 false，并停止评估剩余规则。
    #[instrument(skip(self, subject, rules), fields(target_type = T::target_type(), rule_count = rules.len()))]
    pub async fn evaluate<'a, T: Subject>(
        &self,
        subject: &'a mut T,
        rules: &[Rule],
    ) -> EvaluationResult<'a, T> {
        let start = Instant::now();
        let mut matched_rules = Vec::new();
        let mut trail = ActionTrail::default();

        let outcome = self
            .evaluate_rules(&mut *subject, rules, &mut matched_rules, &mut trail)
            .await;

        let success = match outcome {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "规则评估中止");
                trail
                    .errors
                    .push(format!("Error during rule evaluation: {}", e));
                false
            }
        };

        record_metrics(T::target_type(), success, matched_rules.len(), start);
        info!(
            matched = matched_rules.len(),
            executed = trail.executed_actions.len(),
            errors = trail.errors.len(),
            success,
            "规则评估完成"
        );

        EvaluationResult {
            success,
            matched_rules,
            executed_actions: trail.executed_actions,
            errors: trail.errors,
            modified_object: subject,
        }
    }

    /// 生成一个以失败结束、未评估任何规则的结果
    ///
    /// 耗时从 `start` 起算。
    fn failed<'a, T: Subject>(
        subject: &'a mut T,
        reason: &RuleError,
        start: Instant,
    ) -> EvaluationResult<'a, T> {
        error!(error = %reason, "规则评估中止");
        record_metrics(T::target_type(), false, 0, start);

        EvaluationResult {
            success: false,
            matched_rules: Vec::new(),
            executed_actions: Vec::new(),
            errors: vec![format!("Error during rule evaluation: {}", reason)],
            modified_object: subject,
        }
    }

    async fn evaluate_rules<T: Subject>(
        &self,
        subject: &mut T,
        rules: &[Rule],
        matched_rules: &mut Vec<Rule>,
        trail: &mut ActionTrail,
    ) -> Result<()> {
        for rule in rules {
            ConditionEvaluator::check_conditions(&rule.conditions).inspect_err(|_| {
                error!(rule_id = rule.id, rule_name = %rule.name, "规则结构无效");
            })?;

            if !ConditionEvaluator::evaluate_all(&rule.conditions, subject) {
                debug!(rule_id = rule.id, rule_name = %rule.name, "规则条件不成立");
                continue;
            }

            debug!(rule_id = rule.id, rule_name = %rule.name, "规则匹配");
            matched_rules.push(rule.clone());
            self.executor.run_all(&rule.actions, subject, trail).await;
        }
        Ok(())
    }
}

fn record_metrics(target_type: &str, success: bool, matched: usize, start: Instant) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "rule_evaluations_total",
        "target_type" => target_type.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!(
        "rule_evaluation_duration_seconds",
        "target_type" => target_type.to_string()
    )
    .record(start.elapsed().as_secs_f64());
    counter!("rules_matched_total", "target_type" => target_type.to_string())
        .increment(matched as u64);
}

/// 基于规则存储的规则引擎
pub struct RulesEngine {
    store: Arc<dyn RuleStore>,
    evaluator: RuleEvaluator,
}

impl RulesEngine {
    pub fn new(store: Arc<dyn RuleStore>, evaluator: RuleEvaluator) -> Self {
        Self { store, evaluator }
    }

    pub fn store(&self) -> &Arc<dyn RuleStore> {
        &self.store
    }

    pub fn evaluator(&self) -> &RuleEvaluator {
        &self.evaluator
    }

    /// 评估主体类型的全部启用规则
    pub async fn evaluate<'a, T: Subject>(&self, subject: &'a mut T) -> EvaluationResult<'a, T> {
        self.evaluate_matching(subject, None).await
    }

    /// 只评估名称或描述包含 `filter` 的启用规则
    pub async fn evaluate_filtered<'a, T: Subject>(
        &self,
        subject: &'a mut T,
        filter: &str,
    ) -> EvaluationResult<'a, T> {
        self.evaluate_matching(subject, Some(filter)).await
    }

    async fn evaluate_matching<'a, T: Subject>(
        &self,
        subject: &'a mut T,
        filter: Option<&str>,
    ) -> EvaluationResult<'a, T> {
        let start = Instant::now();
        match self.store.get_active_rules(T::target_type(), filter).await {
            Ok(rules) => self.evaluator.evaluate(subject, &rules).await,
            Err(e) => RuleEvaluator::failed(subject, &e, start),
        }
    }

    pub async fn get_rules_for_type(&self, target_type: &str) -> Result<Vec<Rule>> {
        self.store.get_rules_for_type(target_type).await
    }

    pub async fn get_rule(&self, id: i64) -> Result<Option<Rule>> {
        self.store.get_rule(id).await
    }

    pub async fn create_rule(&self, rule: Rule) -> Result<Rule> {
        self.store.create_rule(rule).await
    }

    pub async fn update_rule(&self, rule: Rule) -> Result<Rule> {
        self.store.update_rule(rule).await
    }

    pub async fn delete_rule(&self, id: i64) -> Result<bool> {
        self.store.delete_rule(id).await
    }
}
