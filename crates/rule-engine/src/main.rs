//! 规则引擎演示程序
//!
//! 加载示例规则（或 `engine.rules_path` 指定的规则文件），对几个客户和订单执行评估并输出结果。

use anyhow::Result;
use chrono::{Duration, Utc};
use rule_engine::samples::{Customer, Order, seed_rules};
use rule_engine::{
    CustomActionRegistry, EvaluationResult, InMemoryRuleStore, LoggingNotificationService,
    NotificationService, RuleEvaluator, RulesEngine,
};
use rules_shared::config::AppConfig;
use rules_shared::observability;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

const SERVICE_NAME: &str = "rules-demo";

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig {
            service_name: SERVICE_NAME.to_string(),
            ..Default::default()
        }
    });

    let _guard = observability::init(&config.service_name, &config.observability).await?;
    info!("Starting {}...", config.service_name);

    let notifier: Arc<dyn NotificationService> = Arc::new(LoggingNotificationService);
    let custom_actions = if config.engine.register_default_custom_actions {
        CustomActionRegistry::with_defaults(notifier.clone())
    } else {
        CustomActionRegistry::new()
    };

    let store = Arc::new(InMemoryRuleStore::new());
    let engine = RulesEngine::new(
        store.clone(),
        RuleEvaluator::with_services(notifier, Arc::new(custom_actions)),
    );

    match &config.engine.rules_path {
        Some(path) => {
            let loaded = store.load_from_file(path)?;
            info!("Loaded {} rules from {}", loaded.len(), path);
        }
        None => {
            for rule in seed_rules(Utc::now()) {
                engine.create_rule(rule).await?;
            }
            println!("Sample rules created successfully!");
        }
    }

    run_demo(&engine).await?;

    info!("{} finished", config.service_name);
    Ok(())
}

async fn run_demo(engine: &RulesEngine) -> Result<()> {
    println!("\n=== Rules Engine Demo ===\n");

    println!("Demo 1: New Customer");
    let mut new_customer = Customer {
        id: 1,
        name: "John Doe".to_string(),
        email: Some("john@example.com".to_string()),
        age: 30,
        membership_level: "Bronze".to_string(),
        ..Default::default()
    };
    report(&engine.evaluate(&mut new_customer).await);
    println!();

    println!("Demo 2: High-Value Customer");
    let mut high_value = Customer {
        id: 2,
        name: "Jane Smith".to_string(),
        email: Some("jane@example.com".to_string()),
        age: 35,
        membership_level: "Gold".to_string(),
        total_purchases: Decimal::from(1500),
        ..Default::default()
    };
    report(&engine.evaluate(&mut high_value).await);
    println!("Customer VIP Status: {}", high_value.is_vip);
    println!();

    println!("Demo 3: Large Order");
    let mut large_order = Order {
        id: 101,
        customer_id: 2,
        amount: Decimal::from(750),
        ..Default::default()
    };
    report(&engine.evaluate(&mut large_order).await);
    println!("Order Discount Applied: {}", large_order.has_discount);
    println!("Discount Amount: ${}", large_order.discount_amount);
    println!();

    println!("Demo 4: Inactive Customer");
    let mut inactive = Customer {
        id: 3,
        name: "Bob Johnson".to_string(),
        email: Some("bob@example.com".to_string()),
        age: 45,
        membership_level: "Silver".to_string(),
        total_purchases: Decimal::from(500),
        last_purchase_date: Utc::now() - Duration::days(120),
        ..Default::default()
    };
    report(&engine.evaluate(&mut inactive).await);
    println!("Customer Status: {}", inactive.status);
    println!();

    println!("Demo 5: All Customer Rules");
    for rule in engine.get_rules_for_type("Customer").await? {
        println!(
            "- {}: {} (Priority: {})",
            rule.name,
            rule.description.as_deref().unwrap_or_default(),
            rule.priority
        );
    }

    Ok(())
}

fn report<T>(result: &EvaluationResult<'_, T>) {
    println!("Matched Rules: {}", result.matched_rules.len());
    println!("Executed Actions: {}", result.executed_actions.join(", "));
    if !result.errors.is_empty() {
        println!("Errors: {}", result.errors.join("; "));
    }
}
