//! The completion protocol.
//!
//! Both completion flows share the same shape, keyed by the gateway checkout
//! session id:
//!
//! 1. verify the session at the gateway (pure read; re-executable)
//! 2. resolve business identifiers from the session metadata
//! 3. claim the `Pending -> Completed` transition with a conditional write;
//!    replays and concurrent duplicates get the already-completed row back
//! 4. the transition, the payment record and the outbox events commit as one
//!    unit of work inside the repository
//! 5. mutate the counterparty exactly once - only the claim winner calls out
//! 6. report the outcome, flagging `downstream: pending` when the
//!    counterparty call did not go through
//!
//! A `Completed` aggregate is never reverted: once the gateway has captured
//! funds, that is ground truth. A failed counterparty call after the local
//! transition is an operational retry concern, not a reason to touch
//! financial state.

use settlements_types::{
    AppError, CheckoutMetadata, PaymentRepository, PaymentStatus, RepoError, SubscriptionPayment,
    dto::{
        CounterpartyKind, DownstreamStatus, ServicePaymentOutcome, UpgradeOutcome,
    },
};

use crate::service::SettlementService;

impl<R: PaymentRepository> SettlementService<R> {
    /// Completes a subscription plan upgrade after gateway checkout success.
    #[tracing::instrument(skip(self))]
    pub async fn complete_plan_upgrade(&self, session_id: &str) -> Result<UpgradeOutcome, AppError> {
        // 1. Verify at the gateway. Anything but "paid" is terminal and
        //    mutates nothing.
        let session = self
            .gateway()
            .get_checkout(session_id)
            .await
            .map_err(AppError::gateway_unavailable)?;

        if !session.status.is_paid() {
            return Err(AppError::GatewayDeclined {
                status: session.status,
                message: format!("Payment not completed. Status: {}", session.status),
            });
        }

        // 2. Resolve business identifiers from the session metadata.
        let metadata = CheckoutMetadata::from_map(&session.metadata)?;
        let CheckoutMetadata::Subscription { user_id, plan_id } = metadata else {
            return Err(AppError::BadRequest(
                "Checkout session is not a subscription payment".into(),
            ));
        };

        let plan = self
            .repo()
            .find_plan(plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Plan {} not found", plan_id)))?;

        // Resolve the counterparty before any mutation; a user with neither
        // profile is a terminal failure with no state change.
        let counterparty = if let Some(owner_id) = self
            .profiles()
            .fetch_owner_id_by_user_id(user_id)
            .await
            .map_err(|e| AppError::facade_unavailable("profiles", e))?
        {
            (CounterpartyKind::Owner, owner_id)
        } else if let Some(provider_id) = self
            .profiles()
            .fetch_provider_id_by_user_id(user_id)
            .await
            .map_err(|e| AppError::facade_unavailable("profiles", e))?
        {
            (CounterpartyKind::Provider, provider_id)
        } else {
            return Err(AppError::NotFound(format!(
                "No Owner or Provider profile found for user {}",
                user_id
            )));
        };

        // 3/4. Claim the transition. Checkout creation does not pre-insert a
        // subscription record, so the candidate row covers the
        // first-verification path; an existing row for the session wins the
        // conflict and this insert is a no-op.
        let candidate = SubscriptionPayment::new(
            user_id,
            plan_id,
            plan.price,
            session.id.clone(),
            session.customer_email.clone(),
            format!("Subscription to {}", plan.name),
        );

        let (payment, won) = self
            .repo()
            .complete_subscription_payment(candidate, session.payment_intent_ref.as_deref())
            .await?;

        if !won && payment.status != PaymentStatus::Completed {
            // Lost the claim to something other than a completion replay.
            return Err(AppError::BadRequest(format!(
                "Payment for session {} is {}",
                session_id, payment.status
            )));
        }

        // 5. Counterparty mutation, exactly once per won transition. A
        //    replay skips straight to the stored outcome.
        let mut downstream = DownstreamStatus::Settled;
        if won {
            let update = match counterparty {
                (CounterpartyKind::Owner, owner_id) => {
                    self.profiles()
                        .update_owner_plan(owner_id, plan.id, plan.max_units.unwrap_or(0))
                        .await
                }
                (CounterpartyKind::Provider, provider_id) => {
                    self.profiles()
                        .update_provider_plan(provider_id, plan.id, plan.max_clients.unwrap_or(0))
                        .await
                }
            };

            downstream = match update {
                Ok(true) => DownstreamStatus::Settled,
                Ok(false) => {
                    tracing::error!(
                        payment_id = %payment.id,
                        user_id,
                        "Profile plan update refused; payment recorded, downstream settlement pending"
                    );
                    DownstreamStatus::Pending
                }
                Err(e) => {
                    tracing::error!(
                        payment_id = %payment.id,
                        user_id,
                        error = %e,
                        "Profile plan update unreachable; payment recorded, downstream settlement pending"
                    );
                    DownstreamStatus::Pending
                }
            };

            tracing::info!(
                payment_id = %payment.id,
                user_id,
                plan_id,
                ?downstream,
                "Plan upgrade completed"
            );
        } else {
            tracing::info!(
                payment_id = %payment.id,
                session_id,
                "Duplicate completion replayed; returning prior result"
            );
        }

        let (user_type, _) = counterparty;
        Ok(UpgradeOutcome {
            payment_id: payment.id,
            user_type,
            plan_id: plan.id,
            plan_name: plan.name,
            max_units: matches!(user_type, CounterpartyKind::Owner)
                .then_some(plan.max_units)
                .flatten(),
            max_clients: matches!(user_type, CounterpartyKind::Provider)
                .then_some(plan.max_clients)
                .flatten(),
            transaction_ref: payment.gateway_txn_ref.clone(),
            downstream,
        })
    }

    /// Completes an Owner → Provider settlement after gateway checkout
    /// success.
    #[tracing::instrument(skip(self))]
    pub async fn complete_service_payment(
        &self,
        session_id: &str,
    ) -> Result<ServicePaymentOutcome, AppError> {
        // 1. Verify.
        let session = self
            .gateway()
            .get_checkout(session_id)
            .await
            .map_err(AppError::gateway_unavailable)?;

        if !session.status.is_paid() {
            return Err(AppError::GatewayDeclined {
                status: session.status,
                message: format!("Payment not completed. Status: {}", session.status),
            });
        }

        // 2. Resolve metadata. The ServicePayment was pre-created at
        //    checkout time; its id rides in the metadata.
        let metadata = CheckoutMetadata::from_map(&session.metadata)?;
        let CheckoutMetadata::Service {
            service_payment_id,
            provider_id,
            provider_amount,
            ..
        } = metadata
        else {
            return Err(AppError::BadRequest("Invalid payment type".into()));
        };

        tracing::info!(
            %service_payment_id,
            provider_id,
            amount = %provider_amount,
            "Processing service payment completion"
        );

        // 3/4. Claim the transition.
        let charge_ref = session
            .payment_intent_ref
            .clone()
            .unwrap_or_else(|| session.id.clone());

        let (payment, won) = self
            .repo()
            .complete_service_payment(service_payment_id, &charge_ref, &session.id)
            .await
            .map_err(|e| match e {
                RepoError::NotFound => {
                    AppError::NotFound(format!("Service payment {} not found", service_payment_id))
                }
                other => other.into(),
            })?;

        if !won && payment.status != PaymentStatus::Completed {
            return Err(AppError::BadRequest(format!(
                "Service payment {} is {}",
                service_payment_id, payment.status
            )));
        }

        // 5. Credit the provider exactly once, with the denormalized amount
        //    from the metadata.
        let mut downstream = DownstreamStatus::Settled;
        if won {
            downstream = match self
                .profiles()
                .update_provider_balance(provider_id, provider_amount)
                .await
            {
                Ok(true) => DownstreamStatus::Settled,
                Ok(false) => {
                    tracing::error!(
                        payment_id = %payment.id,
                        provider_id,
                        "Provider balance update refused; payment recorded, downstream settlement pending"
                    );
                    DownstreamStatus::Pending
                }
                Err(e) => {
                    tracing::error!(
                        payment_id = %payment.id,
                        provider_id,
                        error = %e,
                        "Provider balance update unreachable; payment recorded, downstream settlement pending"
                    );
                    DownstreamStatus::Pending
                }
            };

            // 8. Best-effort notification; never escalated.
            self.notify_provider_paid(&payment).await;
        } else {
            tracing::info!(
                payment_id = %payment.id,
                session_id,
                "Duplicate completion replayed; returning prior result"
            );
        }

        Ok(ServicePaymentOutcome {
            service_payment_id: payment.id,
            work_order_id: payment.work_order_id,
            provider_id: payment.provider_id,
            provider_amount: payment.provider_amount,
            transaction_ref: payment.gateway_charge_ref.clone(),
            downstream,
        })
    }

    /// Tells the paid Provider about the settlement. Failures are logged and
    /// swallowed.
    async fn notify_provider_paid(&self, payment: &settlements_types::ServicePayment) {
        let title = match self.work_orders().fetch_work_order(payment.work_order_id).await {
            Ok(Some(wo)) => wo.title,
            Ok(None) | Err(_) => format!("Work Order #{}", payment.work_order_id),
        };

        let provider_user_id = match self
            .profiles()
            .fetch_provider_user_id(payment.provider_id)
            .await
        {
            Ok(Some(user_id)) => user_id,
            Ok(None) => {
                tracing::warn!(
                    provider_id = payment.provider_id,
                    "No user found for provider; skipping payment notification"
                );
                return;
            }
            Err(e) => {
                tracing::warn!(
                    provider_id = payment.provider_id,
                    error = %e,
                    "Could not resolve provider user; skipping payment notification"
                );
                return;
            }
        };

        let message = format!(
            "Payment of ${:.2} received for service: {}",
            payment.provider_amount, title
        );

        match self
            .notifications()
            .create_in_app_notification(provider_user_id, "Payment Received", &message)
            .await
        {
            Ok(true) => {
                tracing::info!(provider_id = payment.provider_id, "Payment notification sent");
            }
            Ok(false) => {
                tracing::warn!(provider_id = payment.provider_id, "Payment notification refused");
            }
            Err(e) => {
                tracing::warn!(
                    provider_id = payment.provider_id,
                    error = %e,
                    "Payment notification failed"
                );
            }
        }
    }
}
