//! 规则存储
//!
//! [`RuleStore`] 抽象规则目录的读取和维护，引擎只依赖该 trait。
//! [`InMemoryRuleStore`] 使用 DashMap 提供线程安全的内存实现，支持 JSON 加载和批量导入。

use crate::error::{Result, RuleError};
use crate::models::Rule;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{info, instrument, warn};

/// 规则名称最大长度
pub const MAX_RULE_NAME_LEN: usize = 100;

/// 规则存储接口
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// 获取某主体类型的全部规则（含未启用），按优先级降序
    async fn get_rules_for_type(&self, target_type: &str) -> Result<Vec<Rule>>;

    /// 获取启用的规则，可按名称或描述过滤，按优先级降序
    async fn get_active_rules(&self, target_type: &str, filter: Option<&str>)
    -> Result<Vec<Rule>>;

    async fn get_rule(&self, id: i64) -> Result<Option<Rule>>;

    /// 新建规则，返回分配了 ID 的规则
    async fn create_rule(&self, rule: Rule) -> Result<Rule>;

    /// 更新已有规则
    async fn update_rule(&self, rule: Rule) -> Result<Rule>;

    /// 删除规则，规则不存在时返回 false
    async fn delete_rule(&self, id: i64) -> Result<bool>;
}

/// 内存规则存储
#[derive(Clone)]
pub struct InMemoryRuleStore {
    rules: Arc<DashMap<i64, Rule>>,
    next_rule_id: Arc<AtomicI64>,
    /// 条件与动作共用的 ID 序列
    next_item_id: Arc<AtomicI64>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self {
            rules: Arc::new(DashMap::new()),
            next_rule_id: Arc::new(AtomicI64::new(1)),
            next_item_id: Arc::new(AtomicI64::new(1)),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 插入新规则
    ///
    /// 规则 ID 总是由存储分配，传入的 ID 会被忽略。
    #[instrument(skip(self, rule), fields(rule_name = %rule.name, target_type = %rule.target_type))]
    pub fn insert(&self, mut rule: Rule) -> Result<Rule> {
        validate(&rule)?;

        rule.id = self.next_rule_id.fetch_add(1, Ordering::Relaxed);
        rule.created_at = Utc::now();
        rule.modified_at = None;
        self.assign_item_ids(&mut rule);

        self.rules.insert(rule.id, rule.clone());
        info!("规则已创建: {} ({})", rule.id, rule.name);
        Ok(rule)
    }

    /// 替换已有规则，保留原创建时间
    #[instrument(skip(self, rule), fields(rule_id = rule.id))]
    pub fn replace(&self, mut rule: Rule) -> Result<Rule> {
        validate(&rule)?;

        let Some(mut entry) = self.rules.get_mut(&rule.id) else {
            warn!("更新不存在的规则: {}", rule.id);
            return Err(RuleError::RuleNotFound(rule.id));
        };

        rule.created_at = entry.created_at;
        rule.modified_at = Some(Utc::now());
        self.assign_item_ids(&mut rule);

        *entry = rule.clone();
        info!("规则已更新: {}", rule.id);
        Ok(rule)
    }

    /// 删除规则
    #[instrument(skip(self))]
    pub fn remove(&self, id: i64) -> bool {
        if self.rules.remove(&id).is_some() {
            info!("规则已删除: {}", id);
            true
        } else {
            warn!("删除不存在的规则: {}", id);
            false
        }
    }

    pub fn get(&self, id: i64) -> Option<Rule> {
        self.rules.get(&id).map(|r| r.clone())
    }

    /// 指定主体类型的规则快照，按优先级降序、ID 升序
    pub fn list_for_type(&self, target_type: &str) -> Vec<Rule> {
        let mut rules: Vec<Rule> = self
            .rules
            .iter()
            .filter(|r| r.target_type == target_type)
            .map(|r| r.value().clone())
            .collect();
        sort_by_priority(&mut rules);
        rules
    }

    /// 加载单条规则（JSON 对象）
    #[instrument(skip(self, json))]
    pub fn load_from_json(&self, json: &str) -> Result<i64> {
        let rule: Rule = serde_json::from_str(json)?;
        self.insert(rule).map(|r| r.id)
    }

    /// 批量加载规则
    ///
    /// 校验失败的规则被跳过并记录警告，返回成功加载的规则 ID。
    #[instrument(skip(self, rules))]
    pub fn load_batch(&self, rules: Vec<Rule>) -> Result<Vec<i64>> {
        let mut loaded_ids = Vec::with_capacity(rules.len());
        let mut errors = Vec::new();

        for rule in rules {
            let name = rule.name.clone();
            match self.insert(rule) {
                Ok(created) => loaded_ids.push(created.id),
                Err(e) => errors.push((name, e)),
            }
        }

        if !errors.is_empty() {
            warn!("批量加载部分失败: {:?}", errors);
        }

        info!(
            "批量加载完成: {} 成功, {} 失败",
            loaded_ids.len(),
            errors.len()
        );
        Ok(loaded_ids)
    }

    /// 从文件加载规则（JSON 数组）
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> Result<Vec<i64>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let rules: Vec<Rule> = serde_json::from_str(&content)?;
        self.load_batch(rules)
    }

    #[instrument(skip(self))]
    pub fn clear(&self) {
        let count = self.rules.len();
        self.rules.clear();
        info!("已清空 {} 条规则", count);
    }

    /// 规则统计
    pub fn stats(&self) -> RuleStoreStats {
        let mut rules_by_type = BTreeMap::new();
        let mut active_count = 0;

        for rule in self.rules.iter() {
            *rules_by_type.entry(rule.target_type.clone()).or_insert(0) += 1;
            if rule.is_active {
                active_count += 1;
            }
        }

        RuleStoreStats {
            rules_count: self.rules.len(),
            active_count,
            rules_by_type,
        }
    }

    fn assign_item_ids(&self, rule: &mut Rule) {
        for condition in rule.conditions.iter_mut().filter(|c| c.id == 0) {
            condition.id = self.next_item_id.fetch_add(1, Ordering::Relaxed);
        }
        for action in rule.actions.iter_mut().filter(|a| a.id == 0) {
            action.id = self.next_item_id.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for InMemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn get_rules_for_type(&self, target_type: &str) -> Result<Vec<Rule>> {
        Ok(self.list_for_type(target_type))
    }

    async fn get_active_rules(
        &self,
        target_type: &str,
        filter: Option<&str>,
    ) -> Result<Vec<Rule>> {
        let mut rules = self.list_for_type(target_type);
        rules.retain(|r| r.is_active && filter.is_none_or(|f| r.matches_filter(f)));
        Ok(rules)
    }

    async fn get_rule(&self, id: i64) -> Result<Option<Rule>> {
        Ok(self.get(id))
    }

    async fn create_rule(&self, rule: Rule) -> Result<Rule> {
        self.insert(rule)
    }

    async fn update_rule(&self, rule: Rule) -> Result<Rule> {
        self.replace(rule)
    }

    async fn delete_rule(&self, id: i64) -> Result<bool> {
        Ok(self.remove(id))
    }
}

/// 规则存储统计信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleStoreStats {
    pub rules_count: usize,
    pub active_count: usize,
    /// 按主体类型统计的规则数
    pub rules_by_type: BTreeMap<String, usize>,
}

/// 按优先级降序排序，优先级相同按 ID 升序
pub fn sort_by_priority(rules: &mut [Rule]) {
    rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
}

/// 规则结构校验
fn validate(rule: &Rule) -> Result<()> {
    if rule.name.trim().is_empty() {
        return Err(RuleError::Validation("规则名称不能为空".to_string()));
    }
    if rule.name.chars().count() > MAX_RULE_NAME_LEN {
        return Err(RuleError::Validation(format!(
            "规则名称不能超过 {} 个字符",
            MAX_RULE_NAME_LEN
        )));
    }
    if rule.target_type.trim().is_empty() {
        return Err(RuleError::Validation("主体类型不能为空".to_string()));
    }
    if rule
        .conditions
        .iter()
        .any(|c| c.property_name.trim().is_empty())
    {
        return Err(RuleError::Validation("条件字段名不能为空".to_string()));
    }
    Ok(())
}
