//! PostgreSQL implementation of LedgerStore.
//!
//! A `LedgerUnit` runs inside one transaction. Updates are guarded with
//! `WHERE version = $expected` and bump the version; zero affected rows
//! rolls the transaction back with `LedgerError::Conflict`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::audit::{ActionHistory, ActionType};
use crate::domain::foundation::{
    ActionHistoryId, FranchiseId, InstallationRequestId, Money, PaymentId, ProductId,
    SubscriptionId, Timestamp, UserId,
};
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::subscription::{ConnectId, Subscription};
use crate::ports::{LedgerError, LedgerOp, LedgerStore, LedgerUnit};

const PAYMENT_GATEWAY_ID_KEY: &str = "payments_razorpay_payment_id_key";
const SUBSCRIPTION_GATEWAY_ID_KEY: &str = "subscriptions_razorpay_subscription_id_key";

const SUBSCRIPTION_COLUMNS: &str = r#"
    id, connect_id, razorpay_subscription_id, customer_id, product_id, franchise_id,
    installation_request_id, plan_name, monthly_amount_paise, deposit_amount_paise,
    status, start_date, end_date, current_period_start, current_period_end,
    next_payment_date, version, created_at, updated_at
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, user_id, subscription_id, franchise_id, amount_paise, payment_type, status,
    payment_method, razorpay_payment_id, razorpay_order_id, paid_date, version,
    created_at, updated_at
"#;

/// PostgreSQL implementation of the LedgerStore port.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Row Types
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    connect_id: String,
    razorpay_subscription_id: Option<String>,
    customer_id: String,
    product_id: String,
    franchise_id: String,
    installation_request_id: Option<Uuid>,
    plan_name: String,
    monthly_amount_paise: i64,
    deposit_amount_paise: i64,
    status: String,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    next_payment_date: DateTime<Utc>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = LedgerError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            connect_id: ConnectId::parse(row.connect_id).map_err(corrupt)?,
            razorpay_subscription_id: row.razorpay_subscription_id,
            customer_id: UserId::new(row.customer_id).map_err(corrupt)?,
            product_id: ProductId::new(row.product_id).map_err(corrupt)?,
            franchise_id: FranchiseId::new(row.franchise_id).map_err(corrupt)?,
            installation_request_id: row
                .installation_request_id
                .map(InstallationRequestId::from_uuid),
            plan_name: row.plan_name,
            monthly_amount: Money::from_paise(row.monthly_amount_paise),
            deposit_amount: Money::from_paise(row.deposit_amount_paise),
            status: row.status.parse().map_err(corrupt)?,
            start_date: Timestamp::from_datetime(row.start_date),
            end_date: row.end_date.map(Timestamp::from_datetime),
            current_period_start: Timestamp::from_datetime(row.current_period_start),
            current_period_end: Timestamp::from_datetime(row.current_period_end),
            next_payment_date: Timestamp::from_datetime(row.next_payment_date),
            version: row.version,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: String,
    subscription_id: Option<Uuid>,
    franchise_id: String,
    amount_paise: i64,
    payment_type: String,
    status: String,
    payment_method: String,
    razorpay_payment_id: Option<String>,
    razorpay_order_id: Option<String>,
    paid_date: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = LedgerError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            user_id: UserId::new(row.user_id).map_err(corrupt)?,
            subscription_id: row.subscription_id.map(SubscriptionId::from_uuid),
            franchise_id: FranchiseId::new(row.franchise_id).map_err(corrupt)?,
            amount: Money::from_paise(row.amount_paise),
            payment_type: row.payment_type.parse().map_err(corrupt)?,
            status: parse_payment_status(&row.status)?,
            method: row.payment_method.parse().map_err(corrupt)?,
            razorpay_payment_id: row.razorpay_payment_id,
            razorpay_order_id: row.razorpay_order_id,
            paid_date: row.paid_date.map(Timestamp::from_datetime),
            version: row.version,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ActionHistoryRow {
    id: Uuid,
    payment_id: Option<Uuid>,
    subscription_id: Option<Uuid>,
    action_type: String,
    from_status: Option<String>,
    to_status: Option<String>,
    performed_by: String,
    performed_by_role: String,
    comment: Option<String>,
    metadata: Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActionHistoryRow> for ActionHistory {
    type Error = LedgerError;

    fn try_from(row: ActionHistoryRow) -> Result<Self, Self::Error> {
        let metadata = match row.metadata {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(LedgerError::storage(format!(
                    "action_history {} has non-object metadata: {}",
                    row.id, other
                )))
            }
        };
        Ok(ActionHistory {
            id: ActionHistoryId::from_uuid(row.id),
            payment_id: row.payment_id.map(PaymentId::from_uuid),
            subscription_id: row.subscription_id.map(SubscriptionId::from_uuid),
            action_type: ActionType::parse(&row.action_type).ok_or_else(|| {
                LedgerError::storage(format!("Invalid action_type value: {}", row.action_type))
            })?,
            from_status: row.from_status,
            to_status: row.to_status,
            performed_by: row.performed_by,
            performed_by_role: row.performed_by_role.parse().map_err(corrupt)?,
            comment: row.comment,
            metadata,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

fn parse_payment_status(s: &str) -> Result<PaymentStatus, LedgerError> {
    match s {
        "PENDING" => Ok(PaymentStatus::Pending),
        "COMPLETED" => Ok(PaymentStatus::Completed),
        "FAILED" => Ok(PaymentStatus::Failed),
        "REFUNDED" => Ok(PaymentStatus::Refunded),
        _ => Err(LedgerError::storage(format!("Invalid payment status value: {}", s))),
    }
}

fn corrupt(err: impl std::fmt::Display) -> LedgerError {
    LedgerError::storage(format!("Invalid stored value: {}", err))
}

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> LedgerError {
    move |e| LedgerError::storage(format!("{}: {}", context, e))
}

fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint(),
        _ => None,
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Port Implementation
// ════════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn find_subscription_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, LedgerError> {
        let sql = format!("SELECT {} FROM subscriptions WHERE id = $1", SUBSCRIPTION_COLUMNS);
        sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to load subscription"))?
            .map(Subscription::try_from)
            .transpose()
    }

    async fn find_subscription_by_gateway_id(
        &self,
        gateway_id: &str,
    ) -> Result<Option<Subscription>, LedgerError> {
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE razorpay_subscription_id = $1",
            SUBSCRIPTION_COLUMNS
        );
        sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(gateway_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to load subscription by gateway id"))?
            .map(Subscription::try_from)
            .transpose()
    }

    async fn find_payment_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, LedgerError> {
        let sql = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);
        sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to load payment"))?
            .map(Payment::try_from)
            .transpose()
    }

    async fn find_payment_by_gateway_id(
        &self,
        gateway_id: &str,
    ) -> Result<Option<Payment>, LedgerError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE razorpay_payment_id = $1",
            PAYMENT_COLUMNS
        );
        sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(gateway_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to load payment by gateway id"))?
            .map(Payment::try_from)
            .transpose()
    }

    async fn find_payment_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<Payment>, LedgerError> {
        // Several attempts can share an order; the newest is the live one.
        let sql = format!(
            "SELECT {} FROM payments WHERE razorpay_order_id = $1 ORDER BY created_at DESC LIMIT 1",
            PAYMENT_COLUMNS
        );
        sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to load payment by order id"))?
            .map(Payment::try_from)
            .transpose()
    }

    async fn list_payments_for_subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Vec<Payment>, LedgerError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE subscription_id = $1 ORDER BY created_at ASC",
            PAYMENT_COLUMNS
        );
        sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list payments"))?
            .into_iter()
            .map(Payment::try_from)
            .collect()
    }

    async fn list_action_history(
        &self,
        id: &SubscriptionId,
    ) -> Result<Vec<ActionHistory>, LedgerError> {
        sqlx::query_as::<_, ActionHistoryRow>(
            r#"
            SELECT id, payment_id, subscription_id, action_type, from_status, to_status,
                   performed_by, performed_by_role, comment, metadata, created_at
            FROM action_history
            WHERE subscription_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list action history"))?
        .into_iter()
        .map(ActionHistory::try_from)
        .collect()
    }

    async fn commit(&self, unit: LedgerUnit) -> Result<(), LedgerError> {
        if unit.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        // An early return drops `tx`, which rolls back.
        for op in unit.into_ops() {
            match op {
                LedgerOp::InsertSubscription(subscription) => {
                    insert_subscription(&mut tx, &subscription).await?
                }
                LedgerOp::UpdateSubscription {
                    subscription,
                    expected_version,
                } => update_subscription(&mut tx, &subscription, expected_version).await?,
                LedgerOp::InsertPayment(payment) => insert_payment(&mut tx, &payment).await?,
                LedgerOp::UpdatePayment {
                    payment,
                    expected_version,
                } => update_payment(&mut tx, &payment, expected_version).await?,
                LedgerOp::AppendActionHistory(entry) => append_history(&mut tx, &entry).await?,
            }
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Helper Functions
// ════════════════════════════════════════════════════════════════════════════════

async fn insert_subscription(
    tx: &mut Transaction<'_, Postgres>,
    s: &Subscription,
) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        INSERT INTO subscriptions (
            id, connect_id, razorpay_subscription_id, customer_id, product_id, franchise_id,
            installation_request_id, plan_name, monthly_amount_paise, deposit_amount_paise,
            status, start_date, end_date, current_period_start, current_period_end,
            next_payment_date, version, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        "#,
    )
    .bind(s.id.as_uuid())
    .bind(s.connect_id.as_str())
    .bind(&s.razorpay_subscription_id)
    .bind(s.customer_id.as_str())
    .bind(s.product_id.as_str())
    .bind(s.franchise_id.as_str())
    .bind(s.installation_request_id.map(|id| *id.as_uuid()))
    .bind(&s.plan_name)
    .bind(s.monthly_amount.paise())
    .bind(s.deposit_amount.paise())
    .bind(s.status.as_str())
    .bind(s.start_date.as_datetime())
    .bind(s.end_date.as_ref().map(|d| *d.as_datetime()))
    .bind(s.current_period_start.as_datetime())
    .bind(s.current_period_end.as_datetime())
    .bind(s.next_payment_date.as_datetime())
    .bind(s.version)
    .bind(s.created_at.as_datetime())
    .bind(s.updated_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(|e| match (violated_constraint(&e), &s.razorpay_subscription_id) {
        (Some(SUBSCRIPTION_GATEWAY_ID_KEY), Some(gateway_id)) => {
            LedgerError::DuplicateSubscription(gateway_id.clone())
        }
        _ => LedgerError::storage(format!("Failed to insert subscription: {}", e)),
    })?;
    Ok(())
}

async fn update_subscription(
    tx: &mut Transaction<'_, Postgres>,
    s: &Subscription,
    expected_version: i64,
) -> Result<(), LedgerError> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions SET
            razorpay_subscription_id = $3,
            plan_name = $4,
            monthly_amount_paise = $5,
            deposit_amount_paise = $6,
            status = $7,
            end_date = $8,
            current_period_start = $9,
            current_period_end = $10,
            next_payment_date = $11,
            updated_at = $12,
            version = version + 1
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(s.id.as_uuid())
    .bind(expected_version)
    .bind(&s.razorpay_subscription_id)
    .bind(&s.plan_name)
    .bind(s.monthly_amount.paise())
    .bind(s.deposit_amount.paise())
    .bind(s.status.as_str())
    .bind(s.end_date.as_ref().map(|d| *d.as_datetime()))
    .bind(s.current_period_start.as_datetime())
    .bind(s.current_period_end.as_datetime())
    .bind(s.next_payment_date.as_datetime())
    .bind(s.updated_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(db_error("Failed to update subscription"))?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::Conflict {
            entity: "subscription",
            id: s.id.to_string(),
        });
    }
    Ok(())
}

async fn insert_payment(
    tx: &mut Transaction<'_, Postgres>,
    p: &Payment,
) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, user_id, subscription_id, franchise_id, amount_paise, payment_type, status,
            payment_method, razorpay_payment_id, razorpay_order_id, paid_date, version,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(p.id.as_uuid())
    .bind(p.user_id.as_str())
    .bind(p.subscription_id.map(|id| *id.as_uuid()))
    .bind(p.franchise_id.as_str())
    .bind(p.amount.paise())
    .bind(p.payment_type.as_str())
    .bind(p.status.as_str())
    .bind(p.method.as_str())
    .bind(&p.razorpay_payment_id)
    .bind(&p.razorpay_order_id)
    .bind(p.paid_date.as_ref().map(|d| *d.as_datetime()))
    .bind(p.version)
    .bind(p.created_at.as_datetime())
    .bind(p.updated_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(|e| duplicate_payment_or(e, p, "Failed to insert payment"))?;
    Ok(())
}

async fn update_payment(
    tx: &mut Transaction<'_, Postgres>,
    p: &Payment,
    expected_version: i64,
) -> Result<(), LedgerError> {
    let result = sqlx::query(
        r#"
        UPDATE payments SET
            status = $3,
            payment_method = $4,
            razorpay_payment_id = $5,
            razorpay_order_id = $6,
            amount_paise = $7,
            paid_date = $8,
            updated_at = $9,
            version = version + 1
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(p.id.as_uuid())
    .bind(expected_version)
    .bind(p.status.as_str())
    .bind(p.method.as_str())
    .bind(&p.razorpay_payment_id)
    .bind(&p.razorpay_order_id)
    .bind(p.amount.paise())
    .bind(p.paid_date.as_ref().map(|d| *d.as_datetime()))
    .bind(p.updated_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(|e| duplicate_payment_or(e, p, "Failed to update payment"))?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::Conflict {
            entity: "payment",
            id: p.id.to_string(),
        });
    }
    Ok(())
}

async fn append_history(
    tx: &mut Transaction<'_, Postgres>,
    h: &ActionHistory,
) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        INSERT INTO action_history (
            id, payment_id, subscription_id, action_type, from_status, to_status,
            performed_by, performed_by_role, comment, metadata, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(h.id.as_uuid())
    .bind(h.payment_id.map(|id| *id.as_uuid()))
    .bind(h.subscription_id.map(|id| *id.as_uuid()))
    .bind(h.action_type.as_str())
    .bind(&h.from_status)
    .bind(&h.to_status)
    .bind(&h.performed_by)
    .bind(h.performed_by_role.as_str())
    .bind(&h.comment)
    .bind(Value::Object(h.metadata.clone()))
    .bind(h.created_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(db_error("Failed to append action history"))?;
    Ok(())
}

fn duplicate_payment_or(err: sqlx::Error, p: &Payment, context: &str) -> LedgerError {
    match (violated_constraint(&err), &p.razorpay_payment_id) {
        (Some(PAYMENT_GATEWAY_ID_KEY), Some(gateway_id)) => {
            LedgerError::DuplicatePayment(gateway_id.clone())
        }
        _ => LedgerError::storage(format!("{}: {}", context, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserRole;

    #[test]
    fn payment_status_parses_stored_values() {
        assert_eq!(parse_payment_status("FAILED").unwrap(), PaymentStatus::Failed);
        assert!(parse_payment_status("failed").is_err());
    }

    #[test]
    fn subscription_row_round_trips_domain_types() {
        let now = Utc::now();
        let row = SubscriptionRow {
            id: Uuid::new_v4(),
            connect_id: "CNAB12CD34".into(),
            razorpay_subscription_id: Some("sub_1".into()),
            customer_id: "cust-1".into(),
            product_id: "prod-1".into(),
            franchise_id: "fr-1".into(),
            installation_request_id: None,
            plan_name: "Basic".into(),
            monthly_amount_paise: 50_000,
            deposit_amount_paise: 150_000,
            status: "PAUSED".into(),
            start_date: now,
            end_date: None,
            current_period_start: now,
            current_period_end: now + chrono::Duration::days(30),
            next_payment_date: now + chrono::Duration::days(30),
            version: 7,
            created_at: now,
            updated_at: now,
        };

        let sub = Subscription::try_from(row).unwrap();

        assert_eq!(sub.monthly_amount, Money::from_rupees(500));
        assert_eq!(sub.status.as_str(), "PAUSED");
        assert_eq!(sub.version, 7);
    }

    #[test]
    fn history_row_rejects_unknown_action_type() {
        let row = ActionHistoryRow {
            id: Uuid::new_v4(),
            payment_id: None,
            subscription_id: None,
            action_type: "SOMETHING_ELSE".into(),
            from_status: None,
            to_status: None,
            performed_by: "system".into(),
            performed_by_role: UserRole::Admin.as_str().into(),
            comment: None,
            metadata: Value::Null,
            created_at: Utc::now(),
        };

        assert!(ActionHistory::try_from(row).is_err());
    }
}
