//! Settlement Application Service
//!
//! Orchestrates domain operations through the ports. Contains NO
//! infrastructure logic - pure business orchestration.
//!
//! Checkout creation and the queries live here; the completion protocol is
//! in [`crate::completion`].

use std::sync::Arc;

use rust_decimal::Decimal;

use settlements_types::{
    AppError, CheckoutMetadata, CheckoutRequest, Currency, NotificationsFacade, PaymentProvider,
    PaymentRepository, PaymentStatus, Plan, PlanAudience, ProfilesFacade, RefundOutcome,
    ServicePayment, ServicePaymentId, ServicePaymentResponse, ServiceRequestsFacade,
    WorkOrdersFacade,
    dto::{
        CreateServiceCheckoutRequest, CreateSubscriptionCheckoutRequest, PaymentStatusResponse,
        ServiceCheckoutResponse, SubscriptionCheckoutResponse, UpgradePlanRequest,
        VerifySessionResponse, WorkOrderSummary,
    },
};

/// Work-order state required before an Owner may pay for it.
const PAYABLE_WORK_ORDER_STATUS: &str = "Resolved";

/// Fallback redirect targets when the caller does not supply any.
const DEFAULT_SUCCESS_URL: &str = "http://localhost:5173/payments/success";
const DEFAULT_CANCEL_URL: &str = "http://localhost:5173/payments/cancel";

/// Fallback equipment allowance when a plan does not specify one.
const DEFAULT_MAX_UNITS: i64 = 10;

/// Application service for the settlement engine.
///
/// Generic over `R: PaymentRepository` - the persistence adapter is injected
/// at compile time. The gateway and the sibling-service facades are trait
/// objects because configuration, not code, selects them.
pub struct SettlementService<R: PaymentRepository> {
    repo: R,
    gateway: Arc<dyn PaymentProvider>,
    profiles: Arc<dyn ProfilesFacade>,
    work_orders: Arc<dyn WorkOrdersFacade>,
    service_requests: Arc<dyn ServiceRequestsFacade>,
    notifications: Arc<dyn NotificationsFacade>,
    fee_percentage: Decimal,
}

impl<R: PaymentRepository> SettlementService<R> {
    /// Creates a new settlement service.
    pub fn new(
        repo: R,
        gateway: Arc<dyn PaymentProvider>,
        profiles: Arc<dyn ProfilesFacade>,
        work_orders: Arc<dyn WorkOrdersFacade>,
        service_requests: Arc<dyn ServiceRequestsFacade>,
        notifications: Arc<dyn NotificationsFacade>,
        fee_percentage: Decimal,
    ) -> Self {
        Self {
            repo,
            gateway,
            profiles,
            work_orders,
            service_requests,
            notifications,
            fee_percentage,
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub(crate) fn gateway(&self) -> &Arc<dyn PaymentProvider> {
        &self.gateway
    }

    pub(crate) fn profiles(&self) -> &Arc<dyn ProfilesFacade> {
        &self.profiles
    }

    pub(crate) fn work_orders(&self) -> &Arc<dyn WorkOrdersFacade> {
        &self.work_orders
    }

    pub(crate) fn notifications(&self) -> &Arc<dyn NotificationsFacade> {
        &self.notifications
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Checkout creation
    // ─────────────────────────────────────────────────────────────────────────

    /// Opens a gateway checkout session for a subscription plan.
    ///
    /// The amount always comes from the plan catalog; the request cannot
    /// override it. The session metadata carries `{userId, planId}` - the
    /// only context completion will have.
    pub async fn create_subscription_checkout(
        &self,
        req: CreateSubscriptionCheckoutRequest,
    ) -> Result<SubscriptionCheckoutResponse, AppError> {
        let plan = self
            .repo
            .find_plan(req.plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Plan {} not found", req.plan_id)))?;

        tracing::info!(
            user_id = req.user_id,
            plan_id = plan.id,
            "Creating subscription checkout session"
        );

        let metadata = CheckoutMetadata::Subscription {
            user_id: req.user_id,
            plan_id: plan.id,
        };

        let session = self
            .gateway
            .create_checkout(CheckoutRequest {
                amount: plan.price.amount(),
                currency: plan.price.currency(),
                product_name: format!("Subscription Plan #{}", plan.id),
                description: format!("Monthly subscription: {}", plan.name),
                success_url: req.success_url,
                cancel_url: req.cancel_url,
                metadata: metadata.to_map(),
            })
            .await
            .map_err(AppError::gateway_unavailable)?;

        let checkout_url = session
            .url
            .ok_or_else(|| AppError::Internal("Gateway returned no checkout URL".into()))?;

        tracing::info!(session_id = %session.id, "Subscription checkout session created");

        Ok(SubscriptionCheckoutResponse {
            session_id: session.id,
            checkout_url,
        })
    }

    /// Opens a gateway checkout session paying a Provider for a completed
    /// work order.
    ///
    /// Three-party authorization happens before any record is created: the
    /// requester must resolve to an Owner, the work order must be resolved
    /// with a positive cost, and the Owner must be the client on the linked
    /// service request. The `ServicePayment` is inserted `Pending` with the
    /// commission split already computed, so completion is a pure state
    /// transition.
    pub async fn create_service_checkout(
        &self,
        req: CreateServiceCheckoutRequest,
    ) -> Result<ServiceCheckoutResponse, AppError> {
        let owner_id = self
            .profiles
            .fetch_owner_id_by_user_id(req.user_id)
            .await
            .map_err(|e| AppError::facade_unavailable("profiles", e))?
            .ok_or_else(|| AppError::Forbidden("Only owners can pay for services".into()))?;

        tracing::info!(
            owner_id,
            work_order_id = req.work_order_id,
            "Owner creating payment for work order"
        );

        let work_order = self
            .work_orders
            .fetch_work_order(req.work_order_id)
            .await
            .map_err(|e| AppError::facade_unavailable("work-orders", e))?
            .ok_or_else(|| AppError::NotFound("Work order not found".into()))?;

        if work_order.status != PAYABLE_WORK_ORDER_STATUS {
            return Err(AppError::BadRequest(
                "Work order must be resolved before payment".into(),
            ));
        }

        let cost = work_order
            .cost
            .filter(|c| *c > Decimal::ZERO)
            .ok_or_else(|| AppError::BadRequest("Work order must have a valid cost".into()))?;

        let service_request_id = work_order.service_request_id.ok_or_else(|| {
            AppError::NotFound("Service request not found for work order".into())
        })?;

        let service_request = self
            .service_requests
            .fetch_service_request(service_request_id)
            .await
            .map_err(|e| AppError::facade_unavailable("service-requests", e))?
            .ok_or_else(|| AppError::NotFound("Service request not found".into()))?;

        if service_request.client_id != owner_id {
            return Err(AppError::Forbidden(
                "You can only pay for your own service requests".into(),
            ));
        }

        let provider_name = self
            .profiles
            .fetch_provider_company_name(service_request.company_id)
            .await
            .map_err(|e| AppError::facade_unavailable("profiles", e))?
            .ok_or_else(|| AppError::NotFound("Provider not found".into()))?;

        let payment = ServicePayment::new(
            work_order.id,
            service_request.id,
            owner_id,
            service_request.company_id,
            cost,
            self.fee_percentage,
            Currency::USD,
            format!("Service payment for Work Order #{}", work_order.number),
        )?;

        tracing::info!(
            total = %payment.total_amount,
            fee = %payment.platform_fee,
            provider_gets = %payment.provider_amount,
            "Payment breakdown computed"
        );

        self.repo.insert_service_payment(&payment).await?;

        let metadata = CheckoutMetadata::Service {
            service_payment_id: payment.id,
            work_order_id: payment.work_order_id,
            service_request_id: payment.service_request_id,
            owner_id: payment.owner_id,
            provider_id: payment.provider_id,
            total_amount: payment.total_amount,
            platform_fee: payment.platform_fee,
            provider_amount: payment.provider_amount,
        };

        let session = self
            .gateway
            .create_checkout(CheckoutRequest {
                amount: payment.total_amount,
                currency: payment.currency,
                product_name: format!("Service Payment: {}", work_order.title),
                description: format!("Work Order #{} - {}", work_order.number, provider_name),
                success_url: req.success_url.unwrap_or_else(|| DEFAULT_SUCCESS_URL.into()),
                cancel_url: req.cancel_url.unwrap_or_else(|| DEFAULT_CANCEL_URL.into()),
                metadata: metadata.to_map(),
            })
            .await
            .map_err(AppError::gateway_unavailable)?;

        let checkout_url = session
            .url
            .ok_or_else(|| AppError::Internal("Gateway returned no checkout URL".into()))?;

        tracing::info!(session_id = %session.id, payment_id = %payment.id, "Service checkout session created");

        Ok(ServiceCheckoutResponse {
            session_id: session.id,
            checkout_url,
            total_amount: payment.total_amount,
            platform_fee: payment.platform_fee,
            provider_amount: payment.provider_amount,
            platform_fee_percentage: payment.fee_percentage,
            work_order: WorkOrderSummary {
                id: work_order.id,
                number: work_order.number,
                title: work_order.title,
                provider_name,
            },
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Reads the gateway-side state of a checkout session. Pure read; the
    /// natural retry point for the completion protocol.
    pub async fn verify_checkout(&self, session_id: &str) -> Result<VerifySessionResponse, AppError> {
        let session = self
            .gateway
            .get_checkout(session_id)
            .await
            .map_err(AppError::gateway_unavailable)?;

        Ok(VerifySessionResponse {
            session_id: session.id,
            payment_status: session.status,
            customer_email: session.customer_email,
            amount_total: session.amount_total,
            currency: session.currency,
            metadata: session.metadata,
        })
    }

    /// Gets a plan by id.
    pub async fn get_plan(&self, plan_id: i64) -> Result<Plan, AppError> {
        self.repo
            .find_plan(plan_id)
            .await
            .map_err(Into::into)
            .and_then(|opt| {
                opt.ok_or_else(|| AppError::NotFound(format!("Plan {} not found", plan_id)))
            })
    }

    /// Lists the plans sold to one side of the marketplace.
    ///
    /// The catalog is partitioned by the id-range convention encoded in
    /// [`settlements_types::plan_audience`].
    pub async fn list_plans(&self, audience: PlanAudience) -> Result<Vec<Plan>, AppError> {
        let plans = self.repo.list_plans().await?;
        Ok(plans
            .into_iter()
            .filter(|p| p.audience() == audience)
            .collect())
    }

    /// Gets the service payment recorded for a work order.
    pub async fn get_service_payment_by_work_order(
        &self,
        work_order_id: i64,
    ) -> Result<ServicePaymentResponse, AppError> {
        self.repo
            .find_service_payment_by_work_order(work_order_id)
            .await
            .map_err(Into::into)
            .and_then(|opt| {
                opt.map(Into::into).ok_or_else(|| {
                    AppError::NotFound("Payment not found for this work order".into())
                })
            })
    }

    /// Checks the gateway-side status of a transaction.
    pub async fn get_payment_status(
        &self,
        provider: &str,
        transaction_ref: &str,
    ) -> Result<PaymentStatusResponse, AppError> {
        if !provider.eq_ignore_ascii_case(self.gateway.name()) {
            return Err(AppError::BadRequest(format!(
                "Provider {} is not configured; this deployment uses {}",
                provider,
                self.gateway.name()
            )));
        }

        let status = self
            .gateway
            .get_status(transaction_ref)
            .await
            .map_err(AppError::gateway_unavailable)?;

        Ok(PaymentStatusResponse {
            transaction_ref: transaction_ref.to_string(),
            provider: self.gateway.name().to_string(),
            status,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Upgrades a user's plan directly (no payment flow): delegates the
    /// limit update to the Profiles service and returns the new plan.
    #[tracing::instrument(skip(self))]
    pub async fn upgrade_plan(&self, req: UpgradePlanRequest) -> Result<Plan, AppError> {
        let plan = self
            .repo
            .find_plan(req.plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Plan {} not found", req.plan_id)))?;

        let max_units = plan.max_units.unwrap_or(DEFAULT_MAX_UNITS);
        let updated = self
            .profiles
            .update_owner_plan(req.user_id, plan.id, max_units)
            .await
            .map_err(|e| AppError::facade_unavailable("profiles", e))?;

        if !updated {
            return Err(AppError::BadRequest(
                "Failed to update owner profile with new subscription plan".into(),
            ));
        }

        tracing::info!(user_id = req.user_id, plan = %plan.name, "Subscription upgraded");
        Ok(plan)
    }

    /// Refunds a completed service payment at the gateway, then transitions
    /// the aggregate `Completed -> Refunded`.
    pub async fn refund_service_payment(
        &self,
        id: ServicePaymentId,
    ) -> Result<RefundOutcome, AppError> {
        let payment = self
            .repo
            .find_service_payment(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Service payment {} not found", id)))?;

        if payment.status != PaymentStatus::Completed {
            return Err(AppError::BadRequest(format!(
                "Only completed payments can be refunded; payment is {}",
                payment.status
            )));
        }

        let charge_ref = payment.gateway_charge_ref.as_deref().ok_or_else(|| {
            AppError::BadRequest("Payment has no gateway charge reference".into())
        })?;

        let result = self
            .gateway
            .refund(charge_ref, None)
            .await
            .map_err(AppError::gateway_unavailable)?;

        if !result.success {
            return Err(AppError::BadRequest(
                result
                    .error_message
                    .unwrap_or_else(|| "Refund failed".into()),
            ));
        }

        let updated = self.repo.mark_service_payment_refunded(id).await?;

        tracing::info!(payment_id = %id, refund_ref = ?result.refund_ref, "Service payment refunded");

        Ok(RefundOutcome {
            refund_ref: result.refund_ref,
            amount: result.amount,
            status: updated.status,
        })
    }

    /// Refunds a completed subscription payment by gateway session id.
    pub async fn refund_subscription_payment(
        &self,
        session_id: &str,
    ) -> Result<RefundOutcome, AppError> {
        let payment = self
            .repo
            .find_subscription_payment_by_session(session_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No payment found for session {}", session_id))
            })?;

        if payment.status != PaymentStatus::Completed {
            return Err(AppError::BadRequest(format!(
                "Only completed payments can be refunded; payment is {}",
                payment.status
            )));
        }

        let txn_ref = payment.gateway_txn_ref.as_deref().ok_or_else(|| {
            AppError::BadRequest("Payment has no gateway transaction reference".into())
        })?;

        let result = self
            .gateway
            .refund(txn_ref, None)
            .await
            .map_err(AppError::gateway_unavailable)?;

        if !result.success {
            return Err(AppError::BadRequest(
                result
                    .error_message
                    .unwrap_or_else(|| "Refund failed".into()),
            ));
        }

        let updated = self
            .repo
            .mark_subscription_payment_refunded(session_id)
            .await?;

        Ok(RefundOutcome {
            refund_ref: result.refund_ref,
            amount: result.amount,
            status: updated.status,
        })
    }
}
