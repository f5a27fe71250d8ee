//! 示例主体：客户与订单
//!
//! 演示程序和测试使用这两种主体，也展示了宿主如何为自己的类型注册访问表。

use crate::builder::RuleBuilder;
use crate::error::{Result, RuleError};
use crate::models::Rule;
use crate::operators::ActionKind;
use crate::subject::{Subject, SubjectSchema};
use crate::value::{FieldKind, FieldValue, RecordField};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::LazyLock;
use tracing::info;

/// 客户
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub age: i32,
    pub membership_level: String,
    pub total_purchases: Decimal,
    pub last_purchase_date: DateTime<Utc>,
    pub is_vip: bool,
    pub status: String,
    pub welcome_emails_sent: u32,
}

impl Default for Customer {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            email: None,
            age: 0,
            membership_level: "Bronze".to_string(),
            total_purchases: Decimal::ZERO,
            last_purchase_date: Utc::now(),
            is_vip: false,
            status: "Active".to_string(),
            welcome_emails_sent: 0,
        }
    }
}

impl Customer {
    pub fn upgrade_to_vip(&mut self) {
        self.is_vip = true;
        self.membership_level = "VIP".to_string();
        info!(customer_id = self.id, name = %self.name, "Customer upgraded to VIP");
    }

    pub fn send_welcome_email(&mut self) {
        self.welcome_emails_sent += 1;
        info!(
            customer_id = self.id,
            email = self.email.as_deref().unwrap_or("<none>"),
            "Welcome email sent"
        );
    }

    pub fn record_purchase(&mut self, amount: Decimal) -> Result<()> {
        self.total_purchases = self
            .total_purchases
            .checked_add(amount)
            .ok_or_else(|| RuleError::execution("purchase total overflow"))?;
        self.last_purchase_date = Utc::now();
        Ok(())
    }
}

async fn sync_to_crm(customer_id: i64) -> Result<()> {
    tokio::task::yield_now().await;
    info!(customer_id, "Customer synced to CRM");
    Ok(())
}

static CUSTOMER_SCHEMA: LazyLock<SubjectSchema<Customer>> = LazyLock::new(|| {
    SubjectSchema::new("Customer")
        .readonly_field("Id", |c: &Customer| c.id)
        .field("Name", |c: &Customer| c.name.clone(), |c, v| c.name = v)
        .field("Email", |c: &Customer| c.email.clone(), |c, v| c.email = v)
        .field("Age", |c: &Customer| c.age, |c, v| c.age = v)
        .field(
            "MembershipLevel",
            |c: &Customer| c.membership_level.clone(),
            |c, v| c.membership_level = v,
        )
        .field(
            "TotalPurchases",
            |c: &Customer| c.total_purchases,
            |c, v| c.total_purchases = v,
        )
        .field(
            "LastPurchaseDate",
            |c: &Customer| c.last_purchase_date,
            |c, v| c.last_purchase_date = v,
        )
        .field("IsVip", |c: &Customer| c.is_vip, |c, v| c.is_vip = v)
        .field("Status", |c: &Customer| c.status.clone(), |c, v| c.status = v)
        .readonly_field("WelcomeEmailsSent", |c: &Customer| {
            i64::from(c.welcome_emails_sent)
        })
        .method("UpgradeToVip", |c: &mut Customer| {
            c.upgrade_to_vip();
            Ok(())
        })
        .method("SendWelcomeEmail", |c: &mut Customer| {
            c.send_welcome_email();
            Ok(())
        })
        .method_with("RecordPurchase", |c: &mut Customer, amount: Decimal| {
            c.record_purchase(amount)
        })
        .async_method("SyncToCrm", |c: &mut Customer| Box::pin(sync_to_crm(c.id)))
});

impl Subject for Customer {
    fn schema() -> &'static SubjectSchema<Self> {
        &CUSTOMER_SCHEMA
    }
}

/// 订单
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub amount: Decimal,
    pub order_date: DateTime<Utc>,
    pub status: String,
    pub has_discount: bool,
    pub discount_amount: Decimal,
    pub promotion_code: Option<String>,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            id: 0,
            customer_id: 0,
            amount: Decimal::ZERO,
            order_date: Utc::now(),
            status: "Pending".to_string(),
            has_discount: false,
            discount_amount: Decimal::ZERO,
            promotion_code: None,
        }
    }
}

impl Order {
    /// 按百分比计算折扣金额，溢出时订单保持不变
    pub fn apply_discount(&mut self, percentage: Decimal) -> Result<()> {
        self.discount_amount = percentage
            .checked_div(Decimal::ONE_HUNDRED)
            .and_then(|rate| self.amount.checked_mul(rate))
            .ok_or_else(|| RuleError::execution("discount overflow"))?;
        self.has_discount = true;
        info!(
            order_id = self.id,
            percentage = %percentage,
            discount = %self.discount_amount,
            "Discount applied"
        );
        Ok(())
    }

    /// 已发货的订单不能取消
    pub fn cancel(&mut self) -> Result<()> {
        if self.status == "Shipped" {
            return Err(RuleError::execution(format!(
                "Order {} has already shipped",
                self.id
            )));
        }
        self.status = "Cancelled".to_string();
        Ok(())
    }
}

async fn notify_warehouse(order_id: i64) -> Result<()> {
    tokio::task::yield_now().await;
    info!(order_id, "Warehouse notified");
    Ok(())
}

static ORDER_SCHEMA: LazyLock<SubjectSchema<Order>> = LazyLock::new(|| {
    SubjectSchema::new("Order")
        .readonly_field("Id", |o: &Order| o.id)
        .readonly_field("CustomerId", |o: &Order| o.customer_id)
        .field("Amount", |o: &Order| o.amount, |o, v| o.amount = v)
        .field("OrderDate", |o: &Order| o.order_date, |o, v| o.order_date = v)
        .field("Status", |o: &Order| o.status.clone(), |o, v| o.status = v)
        .field("HasDiscount", |o: &Order| o.has_discount, |o, v| o.has_discount = v)
        .field(
            "DiscountAmount",
            |o: &Order| o.discount_amount,
            |o, v| o.discount_amount = v,
        )
        .field(
            "PromotionCode",
            |o: &Order| o.promotion_code.clone(),
            |o, v| o.promotion_code = v,
        )
        .method_with("ApplyDiscount", |o: &mut Order, percentage: Decimal| {
            o.apply_discount(percentage)
        })
        .record_method(
            "ApplyPromotion",
            vec![
                RecordField::new("Code", FieldKind::String),
                RecordField::new("Percentage", FieldKind::Decimal),
            ],
            |o: &mut Order, promotion| {
                let percentage = match promotion.get("Percentage") {
                    Some(FieldValue::Decimal(p)) => *p,
                    _ => return Err(RuleError::execution("promotion percentage is required")),
                };
                o.promotion_code = match promotion.get("Code") {
                    Some(FieldValue::String(code)) => Some(code.clone()),
                    _ => None,
                };
                o.apply_discount(percentage)
            },
        )
        .method("Cancel", Order::cancel)
        .async_method("NotifyWarehouse", |o: &mut Order| Box::pin(notify_warehouse(o.id)))
});

impl Subject for Order {
    fn schema() -> &'static SubjectSchema<Self> {
        &ORDER_SCHEMA
    }
}

/// 示例规则：VIP 升级、新客户欢迎、大额订单折扣、不活跃客户
///
/// 不活跃判断以 `now` 前 90 天为界。
pub fn seed_rules(now: DateTime<Utc>) -> Vec<Rule> {
    let inactive_since = (now - Duration::days(90)).to_rfc3339();

    vec![
        RuleBuilder::new("VIP Customer Upgrade", "Customer")
            .with_description("Upgrade customers to VIP when they have high total purchases")
            .with_priority(10)
            .add_condition("TotalPurchases", "GreaterThanOrEqual", "1000")
            .add_condition("IsVip", "Equals", "False")
            .add_action(ActionKind::SetProperty, "IsVip", Some("True"))
            .add_action(ActionKind::InvokeMethod, "UpgradeToVip", None)
            .build(),
        RuleBuilder::new("New Customer Welcome", "Customer")
            .with_description("Send welcome email to new customers")
            .with_priority(5)
            .add_condition("TotalPurchases", "Equals", "0")
            .add_action(ActionKind::InvokeMethod, "SendWelcomeEmail", None)
            .build(),
        RuleBuilder::new("Large Order Discount", "Order")
            .with_description("Apply 10% discount for orders over $500")
            .with_priority(8)
            .add_condition("Amount", "GreaterThan", "500")
            .add_condition("HasDiscount", "Equals", "False")
            .add_action(ActionKind::InvokeMethod, "ApplyDiscount", Some("10"))
            .build(),
        RuleBuilder::new("Inactive Customer Reactivation", "Customer")
            .with_description("Mark customers as inactive if no recent purchases")
            .with_priority(3)
            .add_condition("LastPurchaseDate", "LessThan", &inactive_since)
            .add_condition("Status", "Equals", "Active")
            .add_action(ActionKind::SetProperty, "Status", Some("Inactive"))
            .add_action(
                ActionKind::LogMessage,
                "",
                Some("Customer marked as inactive due to no recent purchases"),
            )
            .build(),
    ]
}
