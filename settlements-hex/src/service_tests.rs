//! SettlementService unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use settlements_types::{
        AppError, BillingCycle, ChargeRequest, ChargeResult, CheckoutMetadata, CheckoutRequest,
        CheckoutSession, Currency, FacadeError, GatewayError, Money, NormalizedStatus,
        NotificationsFacade, OutboxEvent, PaymentProvider, PaymentRepository, PaymentStatus, Plan,
        PlanAudience, ProfilesFacade, RefundResult, RepoError, ServicePayment, ServicePaymentId,
        ServiceRequestData, ServiceRequestsFacade, SubscriptionPayment, WorkOrderData,
        WorkOrdersFacade,
        domain::events::{
            EVENT_PAYMENT_PROCESSED, EVENT_SERVICE_PAYMENT_COMPLETED, PaymentProcessedEvent,
            ServicePaymentCompletedEvent,
        },
        dto::{
            CreateServiceCheckoutRequest, CreateSubscriptionCheckoutRequest, DownstreamStatus,
            UpgradePlanRequest,
        },
    };

    use crate::SettlementService;

    // ─────────────────────────────────────────────────────────────────────────
    // In-memory port implementations
    // ─────────────────────────────────────────────────────────────────────────

    /// Simple in-memory repository honoring the CAS contract.
    pub struct MockRepo {
        plans: Mutex<Vec<Plan>>,
        subscription_payments: Mutex<HashMap<String, SubscriptionPayment>>,
        service_payments: Mutex<HashMap<ServicePaymentId, ServicePayment>>,
        outbox: Mutex<Vec<OutboxEvent>>,
    }

    impl MockRepo {
        pub fn new(plans: Vec<Plan>) -> Self {
            Self {
                plans: Mutex::new(plans),
                subscription_payments: Mutex::new(HashMap::new()),
                service_payments: Mutex::new(HashMap::new()),
                outbox: Mutex::new(Vec::new()),
            }
        }

        pub fn outbox_event_types(&self) -> Vec<String> {
            self.outbox
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.event_type.clone())
                .collect()
        }

        pub fn service_payment_count(&self) -> usize {
            self.service_payments.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PaymentRepository for MockRepo {
        async fn list_plans(&self) -> Result<Vec<Plan>, RepoError> {
            Ok(self.plans.lock().unwrap().clone())
        }

        async fn find_plan(&self, plan_id: i64) -> Result<Option<Plan>, RepoError> {
            Ok(self
                .plans
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.id == plan_id)
                .cloned())
        }

        async fn find_subscription_payment_by_session(
            &self,
            session_id: &str,
        ) -> Result<Option<SubscriptionPayment>, RepoError> {
            Ok(self
                .subscription_payments
                .lock()
                .unwrap()
                .get(session_id)
                .cloned())
        }

        async fn complete_subscription_payment(
            &self,
            candidate: SubscriptionPayment,
            gateway_txn_ref: Option<&str>,
        ) -> Result<(SubscriptionPayment, bool), RepoError> {
            let mut payments = self.subscription_payments.lock().unwrap();
            let entry = payments
                .entry(candidate.gateway_session_id.clone())
                .or_insert(candidate);

            if entry.status == PaymentStatus::Pending {
                entry
                    .mark_completed(gateway_txn_ref.map(str::to_string))
                    .map_err(RepoError::Domain)?;
                let event = PaymentProcessedEvent::from_subscription(entry);
                self.outbox.lock().unwrap().push(OutboxEvent::new(
                    EVENT_PAYMENT_PROCESSED,
                    serde_json::to_value(&event).unwrap(),
                ));
                Ok((entry.clone(), true))
            } else {
                Ok((entry.clone(), false))
            }
        }

        async fn mark_subscription_payment_refunded(
            &self,
            session_id: &str,
        ) -> Result<SubscriptionPayment, RepoError> {
            let mut payments = self.subscription_payments.lock().unwrap();
            let payment = payments.get_mut(session_id).ok_or(RepoError::NotFound)?;
            payment.mark_refunded().map_err(RepoError::Domain)?;
            Ok(payment.clone())
        }

        async fn insert_service_payment(&self, payment: &ServicePayment) -> Result<(), RepoError> {
            self.service_payments
                .lock()
                .unwrap()
                .insert(payment.id, payment.clone());
            Ok(())
        }

        async fn find_service_payment(
            &self,
            id: ServicePaymentId,
        ) -> Result<Option<ServicePayment>, RepoError> {
            Ok(self.service_payments.lock().unwrap().get(&id).cloned())
        }

        async fn find_service_payment_by_work_order(
            &self,
            work_order_id: i64,
        ) -> Result<Option<ServicePayment>, RepoError> {
            Ok(self
                .service_payments
                .lock()
                .unwrap()
                .values()
                .find(|p| p.work_order_id == work_order_id)
                .cloned())
        }

        async fn complete_service_payment(
            &self,
            id: ServicePaymentId,
            gateway_charge_ref: &str,
            gateway_txn_ref: &str,
        ) -> Result<(ServicePayment, bool), RepoError> {
            let mut payments = self.service_payments.lock().unwrap();
            let payment = payments.get_mut(&id).ok_or(RepoError::NotFound)?;

            if payment.status == PaymentStatus::Pending {
                payment
                    .mark_completed(gateway_charge_ref, gateway_txn_ref)
                    .map_err(RepoError::Domain)?;
                let mut outbox = self.outbox.lock().unwrap();
                let processed = PaymentProcessedEvent::from_service(payment);
                outbox.push(OutboxEvent::new(
                    EVENT_PAYMENT_PROCESSED,
                    serde_json::to_value(&processed).unwrap(),
                ));
                let completed = ServicePaymentCompletedEvent::from_payment(payment);
                outbox.push(OutboxEvent::new(
                    EVENT_SERVICE_PAYMENT_COMPLETED,
                    serde_json::to_value(&completed).unwrap(),
                ));
                Ok((payment.clone(), true))
            } else {
                Ok((payment.clone(), false))
            }
        }

        async fn mark_service_payment_refunded(
            &self,
            id: ServicePaymentId,
        ) -> Result<ServicePayment, RepoError> {
            let mut payments = self.service_payments.lock().unwrap();
            let payment = payments.get_mut(&id).ok_or(RepoError::NotFound)?;
            payment.mark_refunded().map_err(RepoError::Domain)?;
            Ok(payment.clone())
        }

        async fn fetch_publishable_events(&self, limit: i64) -> Result<Vec<OutboxEvent>, RepoError> {
            Ok(self
                .outbox
                .lock()
                .unwrap()
                .iter()
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn mark_event_published(&self, _id: Uuid) -> Result<(), RepoError> {
            Ok(())
        }

        async fn record_publish_failure(&self, _id: Uuid, _error: &str) -> Result<(), RepoError> {
            Ok(())
        }
    }

    /// Gateway double: sessions are seeded by tests; created checkouts are
    /// recorded.
    pub struct MockGateway {
        sessions: Mutex<HashMap<String, CheckoutSession>>,
        created: Mutex<Vec<CheckoutRequest>>,
        counter: AtomicUsize,
    }

    impl MockGateway {
        pub fn new() -> Self {
            Self {
                sessions: Mutex::new(HashMap::new()),
                created: Mutex::new(Vec::new()),
                counter: AtomicUsize::new(0),
            }
        }

        pub fn seed_session(
            &self,
            id: &str,
            status: NormalizedStatus,
            metadata: HashMap<String, String>,
            payment_intent_ref: Option<&str>,
        ) {
            self.sessions.lock().unwrap().insert(
                id.to_string(),
                CheckoutSession {
                    id: id.to_string(),
                    url: None,
                    status,
                    customer_email: Some("payer@example.com".to_string()),
                    amount_total: None,
                    currency: Some("USD".to_string()),
                    payment_intent_ref: payment_intent_ref.map(str::to_string),
                    metadata,
                },
            );
        }

        pub fn created_requests(&self) -> Vec<CheckoutRequest> {
            self.created.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PaymentProvider for MockGateway {
        fn name(&self) -> &'static str {
            "MockPay"
        }

        async fn create_charge(
            &self,
            request: ChargeRequest,
        ) -> Result<ChargeResult, GatewayError> {
            Ok(ChargeResult {
                success: true,
                transaction_ref: Some("txn_mock".to_string()),
                status: NormalizedStatus::Succeeded,
                error_message: None,
                amount: request.amount,
                currency: request.currency,
            })
        }

        async fn get_status(
            &self,
            _transaction_ref: &str,
        ) -> Result<NormalizedStatus, GatewayError> {
            Ok(NormalizedStatus::Succeeded)
        }

        async fn refund(
            &self,
            transaction_ref: &str,
            amount: Option<Decimal>,
        ) -> Result<RefundResult, GatewayError> {
            Ok(RefundResult {
                success: true,
                refund_ref: Some(format!("re_{}", transaction_ref)),
                amount: amount.unwrap_or(Decimal::ZERO),
                error_message: None,
            })
        }

        async fn create_checkout(
            &self,
            request: CheckoutRequest,
        ) -> Result<CheckoutSession, GatewayError> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            let id = format!("cs_mock_{}", n);
            let session = CheckoutSession {
                id: id.clone(),
                url: Some(format!("https://gateway.test/pay/{}", id)),
                status: NormalizedStatus::Pending,
                customer_email: None,
                amount_total: Some(request.amount),
                currency: Some(request.currency.to_string()),
                payment_intent_ref: None,
                metadata: request.metadata.clone(),
            };
            self.sessions
                .lock()
                .unwrap()
                .insert(id, session.clone());
            self.created.lock().unwrap().push(request);
            Ok(session)
        }

        async fn get_checkout(&self, session_id: &str) -> Result<CheckoutSession, GatewayError> {
            self.sessions
                .lock()
                .unwrap()
                .get(session_id)
                .cloned()
                .ok_or_else(|| GatewayError::NotFound(format!("Session {} not found", session_id)))
        }
    }

    /// Profiles double with call counters and failure switches.
    #[derive(Default)]
    pub struct MockProfiles {
        owners: Mutex<HashMap<i64, i64>>,
        providers: Mutex<HashMap<i64, i64>>,
        provider_users: Mutex<HashMap<i64, i64>>,
        company_names: Mutex<HashMap<i64, String>>,
        refuse_plan_updates: AtomicBool,
        refuse_balance_updates: AtomicBool,
        fail_balance_transport: AtomicBool,
        pub owner_plan_updates: AtomicUsize,
        pub provider_plan_updates: AtomicUsize,
        pub balance_updates: AtomicUsize,
        last_balance: Mutex<Option<(i64, Decimal)>>,
    }

    impl MockProfiles {
        pub fn with_owner(self, user_id: i64, owner_id: i64) -> Self {
            self.owners.lock().unwrap().insert(user_id, owner_id);
            self
        }

        pub fn with_provider(self, user_id: i64, provider_id: i64) -> Self {
            self.providers.lock().unwrap().insert(user_id, provider_id);
            self
        }

        pub fn with_provider_profile(self, provider_id: i64, user_id: i64, company: &str) -> Self {
            self.provider_users
                .lock()
                .unwrap()
                .insert(provider_id, user_id);
            self.company_names
                .lock()
                .unwrap()
                .insert(provider_id, company.to_string());
            self
        }

        pub fn refuse_plan_updates(&self) {
            self.refuse_plan_updates.store(true, Ordering::SeqCst);
        }

        pub fn refuse_balance_updates(&self) {
            self.refuse_balance_updates.store(true, Ordering::SeqCst);
        }

        pub fn fail_balance_transport(&self) {
            self.fail_balance_transport.store(true, Ordering::SeqCst);
        }

        pub fn last_balance(&self) -> Option<(i64, Decimal)> {
            *self.last_balance.lock().unwrap()
        }
    }

    #[async_trait]
    impl ProfilesFacade for MockProfiles {
        async fn fetch_owner_id_by_user_id(&self, user_id: i64) -> Result<Option<i64>, FacadeError> {
            Ok(self.owners.lock().unwrap().get(&user_id).copied())
        }

        async fn fetch_provider_id_by_user_id(
            &self,
            user_id: i64,
        ) -> Result<Option<i64>, FacadeError> {
            Ok(self.providers.lock().unwrap().get(&user_id).copied())
        }

        async fn update_owner_plan(
            &self,
            _owner_id: i64,
            _plan_id: i64,
            _max_units: i64,
        ) -> Result<bool, FacadeError> {
            self.owner_plan_updates.fetch_add(1, Ordering::SeqCst);
            Ok(!self.refuse_plan_updates.load(Ordering::SeqCst))
        }

        async fn update_provider_plan(
            &self,
            _provider_id: i64,
            _plan_id: i64,
            _max_clients: i64,
        ) -> Result<bool, FacadeError> {
            self.provider_plan_updates.fetch_add(1, Ordering::SeqCst);
            Ok(!self.refuse_plan_updates.load(Ordering::SeqCst))
        }

        async fn update_provider_balance(
            &self,
            provider_id: i64,
            amount: Decimal,
        ) -> Result<bool, FacadeError> {
            self.balance_updates.fetch_add(1, Ordering::SeqCst);
            if self.fail_balance_transport.load(Ordering::SeqCst) {
                return Err(FacadeError::Transport("connection refused".into()));
            }
            if self.refuse_balance_updates.load(Ordering::SeqCst) {
                return Ok(false);
            }
            *self.last_balance.lock().unwrap() = Some((provider_id, amount));
            Ok(true)
        }

        async fn fetch_provider_company_name(
            &self,
            provider_id: i64,
        ) -> Result<Option<String>, FacadeError> {
            Ok(self
                .company_names
                .lock()
                .unwrap()
                .get(&provider_id)
                .cloned())
        }

        async fn fetch_provider_user_id(
            &self,
            provider_id: i64,
        ) -> Result<Option<i64>, FacadeError> {
            Ok(self
                .provider_users
                .lock()
                .unwrap()
                .get(&provider_id)
                .copied())
        }
    }

    #[derive(Default)]
    pub struct MockWorkOrders {
        orders: Mutex<HashMap<i64, WorkOrderData>>,
    }

    impl MockWorkOrders {
        pub fn with_order(self, order: WorkOrderData) -> Self {
            self.orders.lock().unwrap().insert(order.id, order);
            self
        }
    }

    #[async_trait]
    impl WorkOrdersFacade for MockWorkOrders {
        async fn fetch_work_order(
            &self,
            work_order_id: i64,
        ) -> Result<Option<WorkOrderData>, FacadeError> {
            Ok(self.orders.lock().unwrap().get(&work_order_id).cloned())
        }
    }

    #[derive(Default)]
    pub struct MockServiceRequests {
        requests: Mutex<HashMap<i64, ServiceRequestData>>,
    }

    impl MockServiceRequests {
        pub fn with_request(self, request: ServiceRequestData) -> Self {
            self.requests.lock().unwrap().insert(request.id, request);
            self
        }
    }

    #[async_trait]
    impl ServiceRequestsFacade for MockServiceRequests {
        async fn fetch_service_request(
            &self,
            service_request_id: i64,
        ) -> Result<Option<ServiceRequestData>, FacadeError> {
            Ok(self
                .requests
                .lock()
                .unwrap()
                .get(&service_request_id)
                .cloned())
        }
    }

    #[derive(Default)]
    pub struct MockNotifications {
        pub sent: AtomicUsize,
    }

    #[async_trait]
    impl NotificationsFacade for MockNotifications {
        async fn create_in_app_notification(
            &self,
            _user_id: i64,
            _title: &str,
            _message: &str,
        ) -> Result<bool, FacadeError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Fixtures
    // ─────────────────────────────────────────────────────────────────────────

    fn plan(id: i64, name: &str, price: Decimal, max_units: Option<i64>, max_clients: Option<i64>) -> Plan {
        Plan {
            id,
            name: name.to_string(),
            price: Money::new(price, Currency::USD).unwrap(),
            billing_cycle: BillingCycle::Monthly,
            max_units,
            max_clients,
            features: vec![],
        }
    }

    fn catalog() -> Vec<Plan> {
        vec![
            plan(1, "Basic", dec!(18.99), Some(6), None),
            plan(2, "Standard", dec!(35.13), Some(12), None),
            plan(3, "Premium", dec!(67.56), Some(24), None),
            plan(4, "Small Company", dec!(40.51), None, Some(10)),
            plan(5, "Medium Company", dec!(81.08), None, Some(30)),
            plan(6, "Enterprise Premium", dec!(162.16), None, None),
        ]
    }

    fn resolved_work_order() -> WorkOrderData {
        WorkOrderData {
            id: 41,
            number: "WO-0041".to_string(),
            title: "Compressor overhaul".to_string(),
            status: "Resolved".to_string(),
            service_request_id: Some(12),
            cost: Some(dec!(100.00)),
        }
    }

    fn service_request_for(owner_id: i64) -> ServiceRequestData {
        ServiceRequestData {
            id: 12,
            client_id: owner_id,
            company_id: 9,
            status: "Completed".to_string(),
        }
    }

    struct Harness {
        service: SettlementService<MockRepo>,
        gateway: Arc<MockGateway>,
        profiles: Arc<MockProfiles>,
        notifications: Arc<MockNotifications>,
    }

    fn harness(
        profiles: MockProfiles,
        work_orders: MockWorkOrders,
        service_requests: MockServiceRequests,
    ) -> Harness {
        let gateway = Arc::new(MockGateway::new());
        let profiles = Arc::new(profiles);
        let notifications = Arc::new(MockNotifications::default());
        let service = SettlementService::new(
            MockRepo::new(catalog()),
            gateway.clone(),
            profiles.clone(),
            Arc::new(work_orders),
            Arc::new(service_requests),
            notifications.clone(),
            dec!(15.0),
        );
        Harness {
            service,
            gateway,
            profiles,
            notifications,
        }
    }

    fn subscription_metadata(user_id: i64, plan_id: i64) -> HashMap<String, String> {
        CheckoutMetadata::Subscription { user_id, plan_id }.to_map()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subscription completion
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_complete_upgrade_owner_happy_path() {
        let h = harness(
            MockProfiles::default().with_owner(7, 3),
            MockWorkOrders::default(),
            MockServiceRequests::default(),
        );
        h.gateway.seed_session(
            "cs_1",
            NormalizedStatus::Succeeded,
            subscription_metadata(7, 2),
            Some("pi_1"),
        );

        let outcome = h.service.complete_plan_upgrade("cs_1").await.unwrap();

        assert_eq!(outcome.plan_id, 2);
        assert_eq!(outcome.plan_name, "Standard");
        assert_eq!(outcome.max_units, Some(12));
        assert_eq!(outcome.downstream, DownstreamStatus::Settled);
        assert_eq!(outcome.transaction_ref.as_deref(), Some("pi_1"));
        assert_eq!(h.profiles.owner_plan_updates.load(Ordering::SeqCst), 1);

        let payment = h
            .service
            .repo()
            .find_subscription_payment_by_session("cs_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.amount.amount(), dec!(35.13));
        assert_eq!(
            h.service.repo().outbox_event_types(),
            vec![EVENT_PAYMENT_PROCESSED.to_string()]
        );
    }

    #[tokio::test]
    async fn test_complete_upgrade_provider_uses_client_limits() {
        let h = harness(
            MockProfiles::default().with_provider(8, 9),
            MockWorkOrders::default(),
            MockServiceRequests::default(),
        );
        h.gateway.seed_session(
            "cs_2",
            NormalizedStatus::Succeeded,
            subscription_metadata(8, 5),
            None,
        );

        let outcome = h.service.complete_plan_upgrade("cs_2").await.unwrap();

        assert_eq!(outcome.max_clients, Some(30));
        assert_eq!(outcome.max_units, None);
        assert_eq!(h.profiles.provider_plan_updates.load(Ordering::SeqCst), 1);
        assert_eq!(h.profiles.owner_plan_updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_complete_upgrade_is_idempotent() {
        let h = harness(
            MockProfiles::default().with_owner(7, 3),
            MockWorkOrders::default(),
            MockServiceRequests::default(),
        );
        h.gateway.seed_session(
            "cs_3",
            NormalizedStatus::Succeeded,
            subscription_metadata(7, 1),
            Some("pi_3"),
        );

        let first = h.service.complete_plan_upgrade("cs_3").await.unwrap();
        let second = h.service.complete_plan_upgrade("cs_3").await.unwrap();

        // Same settlement result both times; the counterparty is credited
        // exactly once across both calls.
        assert_eq!(first.payment_id, second.payment_id);
        assert_eq!(first.plan_id, second.plan_id);
        assert_eq!(second.downstream, DownstreamStatus::Settled);
        assert_eq!(h.profiles.owner_plan_updates.load(Ordering::SeqCst), 1);
        assert_eq!(h.service.repo().outbox_event_types().len(), 1);
    }

    #[tokio::test]
    async fn test_complete_upgrade_unpaid_session_mutates_nothing() {
        let h = harness(
            MockProfiles::default().with_owner(7, 3),
            MockWorkOrders::default(),
            MockServiceRequests::default(),
        );
        h.gateway.seed_session(
            "cs_4",
            NormalizedStatus::Pending,
            subscription_metadata(7, 2),
            None,
        );

        let result = h.service.complete_plan_upgrade("cs_4").await;

        assert!(matches!(result, Err(AppError::GatewayDeclined { .. })));
        assert!(
            h.service
                .repo()
                .find_subscription_payment_by_session("cs_4")
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(h.profiles.owner_plan_updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_complete_upgrade_missing_metadata_is_terminal() {
        let h = harness(
            MockProfiles::default().with_owner(7, 3),
            MockWorkOrders::default(),
            MockServiceRequests::default(),
        );
        h.gateway
            .seed_session("cs_5", NormalizedStatus::Succeeded, HashMap::new(), None);

        let result = h.service.complete_plan_upgrade("cs_5").await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert!(
            h.service
                .repo()
                .find_subscription_payment_by_session("cs_5")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_complete_upgrade_no_profile_mutates_nothing() {
        let h = harness(
            MockProfiles::default(),
            MockWorkOrders::default(),
            MockServiceRequests::default(),
        );
        h.gateway.seed_session(
            "cs_6",
            NormalizedStatus::Succeeded,
            subscription_metadata(99, 2),
            None,
        );

        let result = h.service.complete_plan_upgrade("cs_6").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(
            h.service
                .repo()
                .find_subscription_payment_by_session("cs_6")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_plan_update_failure_keeps_payment_completed() {
        let h = harness(
            MockProfiles::default().with_owner(7, 3),
            MockWorkOrders::default(),
            MockServiceRequests::default(),
        );
        h.profiles.refuse_plan_updates();
        h.gateway.seed_session(
            "cs_7",
            NormalizedStatus::Succeeded,
            subscription_metadata(7, 2),
            None,
        );

        let outcome = h.service.complete_plan_upgrade("cs_7").await.unwrap();

        // Money moved at the gateway: the record stays Completed and the
        // caller is told the downstream settlement is pending.
        assert_eq!(outcome.downstream, DownstreamStatus::Pending);
        let payment = h
            .service
            .repo()
            .find_subscription_payment_by_session("cs_7")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Service checkout creation
    // ─────────────────────────────────────────────────────────────────────────

    fn service_checkout_request() -> CreateServiceCheckoutRequest {
        CreateServiceCheckoutRequest {
            user_id: 7,
            work_order_id: 41,
            success_url: None,
            cancel_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_service_checkout_happy_path() {
        let h = harness(
            MockProfiles::default()
                .with_owner(7, 3)
                .with_provider_profile(9, 80, "CoolFix SA"),
            MockWorkOrders::default().with_order(resolved_work_order()),
            MockServiceRequests::default().with_request(service_request_for(3)),
        );

        let resp = h
            .service
            .create_service_checkout(service_checkout_request())
            .await
            .unwrap();

        // Work order cost 100.00 at 15% commission: 15.00 / 85.00.
        assert_eq!(resp.total_amount, dec!(100.00));
        assert_eq!(resp.platform_fee, dec!(15.00));
        assert_eq!(resp.provider_amount, dec!(85.00));
        assert_eq!(resp.work_order.provider_name, "CoolFix SA");

        let payment = h
            .service
            .repo()
            .find_service_payment_by_work_order(41)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.platform_fee + payment.provider_amount, payment.total_amount);

        // The split is carried bit-exact in the session metadata.
        let created = h.gateway.created_requests();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].metadata.get("totalAmount").unwrap(), "100.00");
        assert_eq!(created[0].metadata.get("platformFee").unwrap(), "15.00");
        assert_eq!(created[0].metadata.get("providerAmount").unwrap(), "85.00");
    }

    #[tokio::test]
    async fn test_create_service_checkout_non_owner_is_forbidden() {
        let h = harness(
            MockProfiles::default(), // user resolves to no owner profile
            MockWorkOrders::default().with_order(resolved_work_order()),
            MockServiceRequests::default().with_request(service_request_for(3)),
        );

        let result = h
            .service
            .create_service_checkout(service_checkout_request())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(h.service.repo().service_payment_count(), 0);
        assert!(h.gateway.created_requests().is_empty());
    }

    #[tokio::test]
    async fn test_create_service_checkout_unresolved_work_order_rejected() {
        let mut order = resolved_work_order();
        order.status = "InProgress".to_string();
        let h = harness(
            MockProfiles::default().with_owner(7, 3),
            MockWorkOrders::default().with_order(order),
            MockServiceRequests::default().with_request(service_request_for(3)),
        );

        let result = h
            .service
            .create_service_checkout(service_checkout_request())
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(h.service.repo().service_payment_count(), 0);
    }

    #[tokio::test]
    async fn test_create_service_checkout_missing_cost_rejected() {
        let mut order = resolved_work_order();
        order.cost = None;
        let h = harness(
            MockProfiles::default().with_owner(7, 3),
            MockWorkOrders::default().with_order(order),
            MockServiceRequests::default().with_request(service_request_for(3)),
        );

        let result = h
            .service
            .create_service_checkout(service_checkout_request())
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(h.service.repo().service_payment_count(), 0);
    }

    #[tokio::test]
    async fn test_create_service_checkout_for_foreign_request_forbidden() {
        let h = harness(
            MockProfiles::default().with_owner(7, 3),
            MockWorkOrders::default().with_order(resolved_work_order()),
            // The service request belongs to a different owner.
            MockServiceRequests::default().with_request(service_request_for(4)),
        );

        let result = h
            .service
            .create_service_checkout(service_checkout_request())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(h.service.repo().service_payment_count(), 0);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Service completion
    // ─────────────────────────────────────────────────────────────────────────

    /// Drives the creation flow and seeds a paid session for it; returns the
    /// session id.
    async fn created_and_paid(h: &Harness) -> String {
        let resp = h
            .service
            .create_service_checkout(service_checkout_request())
            .await
            .unwrap();
        let metadata = h
            .gateway
            .created_requests()
            .pop()
            .unwrap()
            .metadata;
        let paid_id = format!("{}_paid", resp.session_id);
        h.gateway
            .seed_session(&paid_id, NormalizedStatus::Succeeded, metadata, Some("pi_svc"));
        paid_id
    }

    fn service_harness() -> Harness {
        harness(
            MockProfiles::default()
                .with_owner(7, 3)
                .with_provider_profile(9, 80, "CoolFix SA"),
            MockWorkOrders::default().with_order(resolved_work_order()),
            MockServiceRequests::default().with_request(service_request_for(3)),
        )
    }

    #[tokio::test]
    async fn test_complete_service_payment_credits_provider_once() {
        let h = service_harness();
        let session_id = created_and_paid(&h).await;

        let outcome = h
            .service
            .complete_service_payment(&session_id)
            .await
            .unwrap();

        assert_eq!(outcome.provider_id, 9);
        assert_eq!(outcome.provider_amount, dec!(85.00));
        assert_eq!(outcome.downstream, DownstreamStatus::Settled);
        assert_eq!(h.profiles.balance_updates.load(Ordering::SeqCst), 1);
        assert_eq!(h.profiles.last_balance(), Some((9, dec!(85.00))));
        assert_eq!(h.notifications.sent.load(Ordering::SeqCst), 1);

        let payment = h
            .service
            .repo()
            .find_service_payment_by_work_order(41)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.gateway_charge_ref.as_deref(), Some("pi_svc"));
        assert_eq!(
            h.service.repo().outbox_event_types(),
            vec![
                EVENT_PAYMENT_PROCESSED.to_string(),
                EVENT_SERVICE_PAYMENT_COMPLETED.to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_complete_service_payment_replay_returns_same_result() {
        let h = service_harness();
        let session_id = created_and_paid(&h).await;

        let first = h
            .service
            .complete_service_payment(&session_id)
            .await
            .unwrap();
        let second = h
            .service
            .complete_service_payment(&session_id)
            .await
            .unwrap();

        assert_eq!(first.service_payment_id, second.service_payment_id);
        assert_eq!(first.provider_amount, second.provider_amount);
        // Exactly one credit across both calls.
        assert_eq!(h.profiles.balance_updates.load(Ordering::SeqCst), 1);
        assert_eq!(h.notifications.sent.load(Ordering::SeqCst), 1);
        assert_eq!(h.service.repo().outbox_event_types().len(), 2);
    }

    #[tokio::test]
    async fn test_complete_service_payment_unpaid_leaves_pending() {
        let h = service_harness();
        let resp = h
            .service
            .create_service_checkout(service_checkout_request())
            .await
            .unwrap();

        // The created session is still Pending at the gateway.
        let result = h.service.complete_service_payment(&resp.session_id).await;

        assert!(matches!(result, Err(AppError::GatewayDeclined { .. })));
        assert_eq!(h.profiles.balance_updates.load(Ordering::SeqCst), 0);
        let payment = h
            .service
            .repo()
            .find_service_payment_by_work_order(41)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_balance_transport_failure_keeps_payment_completed() {
        let h = service_harness();
        let session_id = created_and_paid(&h).await;
        h.profiles.fail_balance_transport();

        let outcome = h
            .service
            .complete_service_payment(&session_id)
            .await
            .unwrap();

        assert_eq!(outcome.downstream, DownstreamStatus::Pending);
        let payment = h
            .service
            .repo()
            .find_service_payment_by_work_order(41)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_refund_requires_completed_payment() {
        let h = service_harness();
        let session_id = created_and_paid(&h).await;

        let pending = h
            .service
            .repo()
            .find_service_payment_by_work_order(41)
            .await
            .unwrap()
            .unwrap();
        assert!(h.service.refund_service_payment(pending.id).await.is_err());

        h.service
            .complete_service_payment(&session_id)
            .await
            .unwrap();

        let refunded = h.service.refund_service_payment(pending.id).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries and commands
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_list_plans_partitions_catalog_by_id_range() {
        let h = harness(
            MockProfiles::default(),
            MockWorkOrders::default(),
            MockServiceRequests::default(),
        );

        let owner_plans = h.service.list_plans(PlanAudience::Owner).await.unwrap();
        let provider_plans = h.service.list_plans(PlanAudience::Provider).await.unwrap();

        assert_eq!(
            owner_plans.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(
            provider_plans.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![4, 5, 6]
        );
    }

    #[tokio::test]
    async fn test_upgrade_plan_command_delegates_to_profiles() {
        let h = harness(
            MockProfiles::default().with_owner(7, 3),
            MockWorkOrders::default(),
            MockServiceRequests::default(),
        );

        let plan = h
            .service
            .upgrade_plan(UpgradePlanRequest {
                user_id: 3,
                plan_id: 2,
            })
            .await
            .unwrap();

        assert_eq!(plan.id, 2);
        assert_eq!(h.profiles.owner_plan_updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upgrade_plan_command_surfaces_refusal() {
        let h = harness(
            MockProfiles::default().with_owner(7, 3),
            MockWorkOrders::default(),
            MockServiceRequests::default(),
        );
        h.profiles.refuse_plan_updates();

        let result = h
            .service
            .upgrade_plan(UpgradePlanRequest {
                user_id: 3,
                plan_id: 2,
            })
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_subscription_checkout_uses_catalog_price() {
        let h = harness(
            MockProfiles::default().with_owner(7, 3),
            MockWorkOrders::default(),
            MockServiceRequests::default(),
        );

        let resp = h
            .service
            .create_subscription_checkout(CreateSubscriptionCheckoutRequest {
                user_id: 7,
                plan_id: 3,
                success_url: "https://app.test/success".to_string(),
                cancel_url: "https://app.test/cancel".to_string(),
            })
            .await
            .unwrap();

        assert!(!resp.checkout_url.is_empty());
        let created = h.gateway.created_requests();
        assert_eq!(created[0].amount, dec!(67.56));
        assert_eq!(created[0].metadata.get("planId").unwrap(), "3");
        assert_eq!(created[0].metadata.get("userId").unwrap(), "7");
    }

    #[tokio::test]
    async fn test_payment_status_rejects_unconfigured_provider() {
        let h = harness(
            MockProfiles::default(),
            MockWorkOrders::default(),
            MockServiceRequests::default(),
        );

        let result = h.service.get_payment_status("OtherPay", "txn_1").await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let ok = h.service.get_payment_status("mockpay", "txn_1").await.unwrap();
        assert_eq!(ok.status, NormalizedStatus::Succeeded);
    }
}
