//! PostgreSQL repository adapter.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use settlements_types::{
    OutboxEvent, PaymentRepository, Plan, RepoError, ServicePayment, ServicePaymentId,
    SubscriptionPayment,
    domain::events::{
        EVENT_PAYMENT_PROCESSED, EVENT_SERVICE_PAYMENT_COMPLETED, PaymentProcessedEvent,
        ServicePaymentCompletedEvent,
    },
    domain::outbox::MAX_PUBLISH_ATTEMPTS,
};

use crate::RETRY_BACKOFF_SECS;
use crate::types::{DbOutboxEvent, DbPlan, DbServicePayment, DbSubscriptionPayment};

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, amount, currency, gateway_session_id, \
     gateway_txn_ref, customer_email, description, status, created_at, completed_at";

const SERVICE_COLUMNS: &str = "id, work_order_id, service_request_id, owner_id, provider_id, \
     total_amount, fee_percentage, platform_fee, provider_amount, currency, gateway_charge_ref, \
     gateway_txn_ref, status, description, created_at, completed_at";

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository backed by conditional updates for the completion
/// transitions.
#[derive(Clone)]
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_tables_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_outbox_events_pg.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the database schema (for testing with existing pool).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        run_migrations(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))
    }
}

/// Inserts an outbox row inside the given transaction.
async fn insert_outbox_event(
    db_tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event_type: &str,
    payload: serde_json::Value,
    now: chrono::DateTime<Utc>,
) -> Result<(), RepoError> {
    sqlx::query(
        r#"INSERT INTO outbox_events (id, event_type, payload, status, created_at, attempts, next_attempt_at)
           VALUES ($1, $2, $3, 'PENDING', $4, 0, $4)"#,
    )
    .bind(Uuid::new_v4())
    .bind(event_type)
    .bind(payload)
    .bind(now)
    .execute(&mut **db_tx)
    .await
    .map_err(|e| RepoError::Database(e.to_string()))?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PaymentRepository for PostgresRepo {
    async fn list_plans(&self) -> Result<Vec<Plan>, RepoError> {
        let rows: Vec<DbPlan> = sqlx::query_as(
            r#"SELECT id, name, price, currency, billing_cycle, max_units, max_clients, features
               FROM plans ORDER BY id ASC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbPlan::into_domain).collect()
    }

    async fn find_plan(&self, plan_id: i64) -> Result<Option<Plan>, RepoError> {
        let row: Option<DbPlan> = sqlx::query_as(
            r#"SELECT id, name, price, currency, billing_cycle, max_units, max_clients, features
               FROM plans WHERE id = $1"#,
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbPlan::into_domain).transpose()
    }

    async fn find_subscription_payment_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<SubscriptionPayment>, RepoError> {
        let row: Option<DbSubscriptionPayment> = sqlx::query_as(&format!(
            "SELECT {} FROM subscription_payments WHERE gateway_session_id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbSubscriptionPayment::into_domain).transpose()
    }

    async fn complete_subscription_payment(
        &self,
        candidate: SubscriptionPayment,
        gateway_txn_ref: Option<&str>,
    ) -> Result<(SubscriptionPayment, bool), RepoError> {
        let session_id = candidate.gateway_session_id.clone();
        let now = Utc::now();

        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        // Converge the created-at-checkout and first-verification paths on
        // one row per session; the unique constraint arbitrates.
        sqlx::query(&format!(
            "INSERT INTO subscription_payments ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, NULL, $7, $8, 'Pending', $9, NULL) \
             ON CONFLICT (gateway_session_id) DO NOTHING",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(candidate.id.into_uuid())
        .bind(candidate.user_id)
        .bind(candidate.plan_id)
        .bind(candidate.amount.amount())
        .bind(candidate.amount.currency().to_string())
        .bind(&session_id)
        .bind(&candidate.customer_email)
        .bind(&candidate.description)
        .bind(candidate.created_at)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        // Conditional transition: at most one caller moves Pending ->
        // Completed for a session.
        let result = sqlx::query(
            r#"UPDATE subscription_payments
               SET status = 'Completed', gateway_txn_ref = $1, completed_at = $2
               WHERE gateway_session_id = $3 AND status = 'Pending'"#,
        )
        .bind(gateway_txn_ref)
        .bind(now)
        .bind(&session_id)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let won = result.rows_affected() == 1;

        let row: DbSubscriptionPayment = sqlx::query_as(&format!(
            "SELECT {} FROM subscription_payments WHERE gateway_session_id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(&session_id)
        .fetch_one(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let payment = row.into_domain()?;

        if won {
            let event = PaymentProcessedEvent::from_subscription(&payment);
            let payload = serde_json::to_value(&event)
                .map_err(|e| RepoError::Database(e.to_string()))?;
            insert_outbox_event(&mut db_tx, EVENT_PAYMENT_PROCESSED, payload, now).await?;
        }

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok((payment, won))
    }

    async fn mark_subscription_payment_refunded(
        &self,
        session_id: &str,
    ) -> Result<SubscriptionPayment, RepoError> {
        let result = sqlx::query(
            r#"UPDATE subscription_payments SET status = 'Refunded'
               WHERE gateway_session_id = $1 AND status = 'Completed'"#,
        )
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return match self.find_subscription_payment_by_session(session_id).await? {
                None => Err(RepoError::NotFound),
                Some(p) => Err(RepoError::Conflict(format!(
                    "Payment is {} and cannot be refunded",
                    p.status
                ))),
            };
        }

        self.find_subscription_payment_by_session(session_id)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn insert_service_payment(&self, payment: &ServicePayment) -> Result<(), RepoError> {
        sqlx::query(&format!(
            "INSERT INTO service_payments ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
            SERVICE_COLUMNS
        ))
        .bind(payment.id.into_uuid())
        .bind(payment.work_order_id)
        .bind(payment.service_request_id)
        .bind(payment.owner_id)
        .bind(payment.provider_id)
        .bind(payment.total_amount)
        .bind(payment.fee_percentage)
        .bind(payment.platform_fee)
        .bind(payment.provider_amount)
        .bind(payment.currency.to_string())
        .bind(&payment.gateway_charge_ref)
        .bind(&payment.gateway_txn_ref)
        .bind(payment.status.to_string())
        .bind(&payment.description)
        .bind(payment.created_at)
        .bind(payment.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find_service_payment(
        &self,
        id: ServicePaymentId,
    ) -> Result<Option<ServicePayment>, RepoError> {
        let row: Option<DbServicePayment> = sqlx::query_as(&format!(
            "SELECT {} FROM service_payments WHERE id = $1",
            SERVICE_COLUMNS
        ))
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbServicePayment::into_domain).transpose()
    }

    async fn find_service_payment_by_work_order(
        &self,
        work_order_id: i64,
    ) -> Result<Option<ServicePayment>, RepoError> {
        let row: Option<DbServicePayment> = sqlx::query_as(&format!(
            "SELECT {} FROM service_payments WHERE work_order_id = $1 ORDER BY created_at DESC LIMIT 1",
            SERVICE_COLUMNS
        ))
        .bind(work_order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbServicePayment::into_domain).transpose()
    }

    async fn complete_service_payment(
        &self,
        id: ServicePaymentId,
        gateway_charge_ref: &str,
        gateway_txn_ref: &str,
    ) -> Result<(ServicePayment, bool), RepoError> {
        let uuid = id.into_uuid();
        let now = Utc::now();

        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        let result = sqlx::query(
            r#"UPDATE service_payments
               SET status = 'Completed', gateway_charge_ref = $1, gateway_txn_ref = $2, completed_at = $3
               WHERE id = $4 AND status = 'Pending'"#,
        )
        .bind(gateway_charge_ref)
        .bind(gateway_txn_ref)
        .bind(now)
        .bind(uuid)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let won = result.rows_affected() == 1;

        let row: Option<DbServicePayment> = sqlx::query_as(&format!(
            "SELECT {} FROM service_payments WHERE id = $1",
            SERVICE_COLUMNS
        ))
        .bind(uuid)
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let payment = row.ok_or(RepoError::NotFound)?.into_domain()?;

        if won {
            let processed = PaymentProcessedEvent::from_service(&payment);
            let payload = serde_json::to_value(&processed)
                .map_err(|e| RepoError::Database(e.to_string()))?;
            insert_outbox_event(&mut db_tx, EVENT_PAYMENT_PROCESSED, payload, now).await?;

            let completed = ServicePaymentCompletedEvent::from_payment(&payment);
            let payload = serde_json::to_value(&completed)
                .map_err(|e| RepoError::Database(e.to_string()))?;
            insert_outbox_event(&mut db_tx, EVENT_SERVICE_PAYMENT_COMPLETED, payload, now).await?;
        }

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok((payment, won))
    }

    async fn mark_service_payment_refunded(
        &self,
        id: ServicePaymentId,
    ) -> Result<ServicePayment, RepoError> {
        let result = sqlx::query(
            r#"UPDATE service_payments SET status = 'Refunded'
               WHERE id = $1 AND status = 'Completed'"#,
        )
        .bind(id.into_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return match self.find_service_payment(id).await? {
                None => Err(RepoError::NotFound),
                Some(p) => Err(RepoError::Conflict(format!(
                    "Payment is {} and cannot be refunded",
                    p.status
                ))),
            };
        }

        self.find_service_payment(id).await?.ok_or(RepoError::NotFound)
    }

    async fn fetch_publishable_events(&self, limit: i64) -> Result<Vec<OutboxEvent>, RepoError> {
        let rows: Vec<DbOutboxEvent> = sqlx::query_as(
            r#"SELECT id, event_type, payload, status, created_at, processed_at, attempts, last_error
               FROM outbox_events
               WHERE status = 'PENDING' AND attempts < $1 AND next_attempt_at <= $2
               ORDER BY created_at ASC
               LIMIT $3"#,
        )
        .bind(MAX_PUBLISH_ATTEMPTS)
        .bind(Utc::now())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbOutboxEvent::into_domain).collect()
    }

    async fn mark_event_published(&self, id: Uuid) -> Result<(), RepoError> {
        sqlx::query(
            r#"UPDATE outbox_events SET status = 'PUBLISHED', processed_at = $1 WHERE id = $2"#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn record_publish_failure(&self, id: Uuid, error: &str) -> Result<(), RepoError> {
        let now = Utc::now();

        let attempts: Option<(i32,)> =
            sqlx::query_as(r#"SELECT attempts FROM outbox_events WHERE id = $1"#)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

        let attempts = attempts.ok_or(RepoError::NotFound)?.0 + 1;
        let status = if attempts >= MAX_PUBLISH_ATTEMPTS {
            "FAILED"
        } else {
            "PENDING"
        };
        // Incremental backoff: each failure pushes the next attempt further out.
        let next_attempt =
            now + chrono::Duration::seconds(RETRY_BACKOFF_SECS * i64::from(attempts));

        sqlx::query(
            r#"UPDATE outbox_events
               SET attempts = $1, last_error = $2, status = $3, next_attempt_at = $4, processed_at = $5
               WHERE id = $6"#,
        )
        .bind(attempts)
        .bind(error)
        .bind(status)
        .bind(next_attempt)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }
}
