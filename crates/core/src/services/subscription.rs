//! Premium subscriptions paid through the payment gateway.
//!
//! Expiry is reconciled lazily: every read of a user's subscription, and
//! every new checkout, first closes an active subscription whose period has
//! ended.

use chrono::{Duration, Utc};
use livenest_common::{AppError, AppResult, IdGenerator, config::SubscriptionConfig};
use livenest_db::{
    entities::subscription::{self, SubscriptionPlan, SubscriptionStatus},
    repositories::SubscriptionRepository,
};
use sea_orm::Set;
use serde_json::json;

use crate::services::event_publisher::{
    EventPublisherService, events, publish_best_effort, user_channel,
};
use crate::services::pagination::clamp_limit;
use crate::services::payment::{
    OrderMetadata, PaymentGatewayRef, PaymentOrder, is_valid_order_ref,
};

/// Subscription service for business logic.
#[derive(Clone)]
pub struct SubscriptionService {
    subscription_repo: SubscriptionRepository,
    gateway: Option<PaymentGatewayRef>,
    event_publisher: Option<EventPublisherService>,
    plan: SubscriptionConfig,
    id_gen: IdGenerator,
}

impl SubscriptionService {
    /// Create a new subscription service.
    #[must_use]
    pub const fn new(subscription_repo: SubscriptionRepository, plan: SubscriptionConfig) -> Self {
        Self {
            subscription_repo,
            gateway: None,
            event_publisher: None,
            plan,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the payment gateway.
    pub fn set_gateway(&mut self, gateway: PaymentGatewayRef) {
        self.gateway = Some(gateway);
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Start a Premium purchase. Returns the order to approve.
    pub async fn checkout(&self, user_id: &str) -> AppResult<PaymentOrder> {
        if self.reconcile(user_id).await?.is_some() {
            return Err(AppError::InvalidOperation(
                "You already have an active Premium subscription".to_string(),
            ));
        }

        let order = self
            .gateway()?
            .create_order(
                self.plan.premium_price_cents,
                &self.plan.currency,
                &OrderMetadata {
                    user_id: user_id.to_string(),
                    description: format!("LiveNest Premium ({} days)", self.plan.duration_days),
                },
            )
            .await?;

        tracing::info!(user_id = %user_id, order_ref = %order.order_ref, "Created checkout order");
        Ok(order)
    }

    /// Capture an approved order and activate Premium.
    pub async fn capture(&self, user_id: &str, order_ref: &str) -> AppResult<subscription::Model> {
        if !is_valid_order_ref(order_ref) {
            return Err(AppError::InvalidOperation(
                "Invalid order reference".to_string(),
            ));
        }
        if self.reconcile(user_id).await?.is_some() {
            return Err(AppError::InvalidOperation(
                "You already have an active Premium subscription".to_string(),
            ));
        }
        if self
            .subscription_repo
            .find_by_order_ref(order_ref)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Order already captured".to_string()));
        }

        let gateway = self.gateway()?;
        // The order must have been created for this user before it is captured.
        if gateway.order_payer(order_ref).await?.as_deref() != Some(user_id) {
            tracing::warn!(user_id = %user_id, order_ref = %order_ref, "Capture of another user's order refused");
            return Err(AppError::Forbidden(
                "Order does not belong to this user".to_string(),
            ));
        }

        let captured = gateway.capture_order(order_ref).await?;
        if captured.payer_id.as_deref() != Some(user_id) {
            tracing::error!(user_id = %user_id, order_ref = %order_ref, "Captured order has a different payer");
            return Err(AppError::Forbidden(
                "Order does not belong to this user".to_string(),
            ));
        }
        if !captured.is_completed() {
            return Err(AppError::Upstream(format!(
                "Payment not completed: {}",
                captured.status
            )));
        }
        if captured.amount_cents != self.plan.premium_price_cents
            || !captured.currency.eq_ignore_ascii_case(&self.plan.currency)
        {
            tracing::error!(
                order_ref = %order_ref,
                amount = captured.amount_cents,
                currency = %captured.currency,
                "Captured amount does not match plan price"
            );
            return Err(AppError::Upstream(
                "Captured amount does not match plan price".to_string(),
            ));
        }

        let now = Utc::now().fixed_offset();
        let model = subscription::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            plan: Set(SubscriptionPlan::Premium),
            price_cents: Set(captured.amount_cents),
            currency: Set(captured.currency.to_uppercase()),
            order_ref: Set(Some(order_ref.to_string())),
            status: Set(SubscriptionStatus::Active),
            is_active: Set(true),
            start_date: Set(now),
            end_date: Set(Some(now + Duration::days(self.plan.duration_days))),
            created_at: Set(now),
            updated_at: Set(None),
        };
        let created = self.subscription_repo.activate(model, user_id).await?;

        tracing::info!(user_id = %user_id, subscription_id = %created.id, "Premium activated");

        publish_best_effort(
            self.event_publisher.as_ref(),
            &user_channel(user_id),
            events::SUBSCRIPTION,
            json!({ "status": created.status, "endDate": created.end_date }),
        )
        .await;

        Ok(created)
    }

    /// The user's active subscription, if any.
    pub async fn current(&self, user_id: &str) -> AppResult<Option<subscription::Model>> {
        self.reconcile(user_id).await
    }

    /// Cancel the user's active subscription.
    pub async fn cancel(&self, user_id: &str) -> AppResult<subscription::Model> {
        let active = self
            .reconcile(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No active subscription".to_string()))?;

        let cancelled = self
            .subscription_repo
            .close(active, SubscriptionStatus::Cancelled)
            .await?;

        tracing::info!(user_id = %user_id, subscription_id = %cancelled.id, "Subscription cancelled");
        Ok(cancelled)
    }

    /// All of the user's subscriptions, newest first.
    pub async fn history(
        &self,
        user_id: &str,
        limit: Option<u64>,
    ) -> AppResult<Vec<subscription::Model>> {
        self.reconcile(user_id).await?;
        self.subscription_repo
            .find_by_user(user_id, clamp_limit(limit))
            .await
    }

    /// Load the active subscription, expiring it first if its period ended.
    async fn reconcile(&self, user_id: &str) -> AppResult<Option<subscription::Model>> {
        let Some(active) = self.subscription_repo.find_active_by_user(user_id).await? else {
            return Ok(None);
        };

        if active.has_expired(Utc::now().fixed_offset()) {
            let expired = self
                .subscription_repo
                .close(active, SubscriptionStatus::Expired)
                .await?;
            tracing::info!(user_id = %user_id, subscription_id = %expired.id, "Subscription expired");
            return Ok(None);
        }

        Ok(Some(active))
    }

    fn gateway(&self) -> AppResult<&PaymentGatewayRef> {
        self.gateway
            .as_ref()
            .ok_or_else(|| AppError::Upstream("Payment gateway is not configured".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::event_publisher::testing::RecordingPublisher;
    use crate::services::payment::{CapturedOrder, PaymentGateway};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    struct FakeGateway {
        capture: CapturedOrder,
        captures: std::sync::Mutex<u32>,
    }

    #[async_trait::async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_order(
            &self,
            _amount_cents: i64,
            _currency: &str,
            _metadata: &OrderMetadata,
        ) -> AppResult<PaymentOrder> {
            Ok(PaymentOrder {
                order_ref: "ORDER-1".to_string(),
                approval_url: Some("https://paypal.example/approve".to_string()),
            })
        }

        async fn order_payer(&self, _order_ref: &str) -> AppResult<Option<String>> {
            Ok(self.capture.payer_id.clone())
        }

        async fn capture_order(&self, _order_ref: &str) -> AppResult<CapturedOrder> {
            *self.captures.lock().unwrap() += 1;
            Ok(self.capture.clone())
        }
    }

    fn completed(amount_cents: i64) -> CapturedOrder {
        CapturedOrder {
            status: "COMPLETED".to_string(),
            amount_cents,
            currency: "USD".to_string(),
            payer_id: Some("a".to_string()),
        }
    }

    fn test_subscription(end_in: Duration) -> subscription::Model {
        let now = Utc::now();
        subscription::Model {
            id: "s1".to_string(),
            user_id: "a".to_string(),
            plan: SubscriptionPlan::Premium,
            price_cents: 999,
            currency: "USD".to_string(),
            order_ref: Some("ORDER-0".to_string()),
            status: SubscriptionStatus::Active,
            is_active: true,
            start_date: (now - Duration::days(30)).into(),
            end_date: Some((now + end_in).into()),
            created_at: (now - Duration::days(30)).into(),
            updated_at: None,
        }
    }

    fn closed(mut sub: subscription::Model, status: SubscriptionStatus) -> subscription::Model {
        sub.status = status;
        sub.is_active = false;
        sub
    }

    fn service_with_gateway(
        db: MockDatabase,
        capture: CapturedOrder,
    ) -> (SubscriptionService, Arc<RecordingPublisher>, Arc<FakeGateway>) {
        let recorder = Arc::new(RecordingPublisher::default());
        let gateway = Arc::new(FakeGateway {
            capture,
            captures: std::sync::Mutex::new(0),
        });
        let mut service = SubscriptionService::new(
            SubscriptionRepository::new(Arc::new(db.into_connection())),
            SubscriptionConfig::default(),
        );
        service.set_gateway(gateway.clone());
        service.set_event_publisher(recorder.clone());
        (service, recorder, gateway)
    }

    fn service(
        db: MockDatabase,
        capture: CapturedOrder,
    ) -> (SubscriptionService, Arc<RecordingPublisher>) {
        let (service, recorder, _) = service_with_gateway(db, capture);
        (service, recorder)
    }

    fn user_flag_update() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    #[tokio::test]
    async fn test_checkout_returns_order() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<subscription::Model>::new()]);
        let (service, _) = service(db, completed(999));

        let order = service.checkout("a").await.unwrap();

        assert_eq!(order.order_ref, "ORDER-1");
    }

    #[tokio::test]
    async fn test_checkout_with_active_subscription_is_invalid() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_subscription(Duration::days(3))]]);
        let (service, _) = service(db, completed(999));

        let result = service.checkout("a").await;

        assert!(matches!(result, Err(AppError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_checkout_after_expiry_reconciles_first() {
        let expired = test_subscription(Duration::days(-1));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[expired.clone()]])
            .append_query_results([[closed(expired, SubscriptionStatus::Expired)]])
            .append_exec_results([user_flag_update()]);
        let (service, _) = service(db, completed(999));

        let order = service.checkout("a").await.unwrap();

        assert_eq!(order.order_ref, "ORDER-1");
    }

    #[tokio::test]
    async fn test_capture_activates_and_publishes() {
        let mut activated = test_subscription(Duration::days(30));
        activated.order_ref = Some("ORDER-1".to_string());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<subscription::Model>::new()])
            .append_query_results([Vec::<subscription::Model>::new()])
            .append_query_results([[activated]])
            .append_exec_results([user_flag_update()]);
        let (service, recorder) = service(db, completed(999));

        let sub = service.capture("a", "ORDER-1").await.unwrap();

        assert!(sub.is_active);
        let events = recorder.recorded();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "user:a");
        assert_eq!(events[0].1, events::SUBSCRIPTION);
    }

    #[tokio::test]
    async fn test_capture_incomplete_payment_is_upstream_failure() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<subscription::Model>::new()])
            .append_query_results([Vec::<subscription::Model>::new()]);
        let (service, recorder) = service(
            db,
            CapturedOrder {
                status: "PENDING".to_string(),
                amount_cents: 999,
                currency: "USD".to_string(),
                payer_id: Some("a".to_string()),
            },
        );

        let result = service.capture("a", "ORDER-1").await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert!(recorder.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_capture_amount_mismatch_is_upstream_failure() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<subscription::Model>::new()])
            .append_query_results([Vec::<subscription::Model>::new()]);
        let (service, _) = service(db, completed(1));

        let result = service.capture("a", "ORDER-1").await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_capture_of_another_users_order_is_forbidden() {
        // checkout by a, then capture by b
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<subscription::Model>::new()])
            .append_query_results([Vec::<subscription::Model>::new()])
            .append_query_results([Vec::<subscription::Model>::new()]);
        let (service, recorder, gateway) = service_with_gateway(db, completed(999));

        let order = service.checkout("a").await.unwrap();
        let result = service.capture("b", &order.order_ref).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(*gateway.captures.lock().unwrap(), 0);
        assert!(recorder.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_capture_with_mismatched_payer_is_forbidden() {
        struct SwappedGateway;

        #[async_trait::async_trait]
        impl PaymentGateway for SwappedGateway {
            async fn create_order(
                &self,
                _amount_cents: i64,
                _currency: &str,
                _metadata: &OrderMetadata,
            ) -> AppResult<PaymentOrder> {
                Err(AppError::Internal("not used".to_string()))
            }

            async fn order_payer(&self, _order_ref: &str) -> AppResult<Option<String>> {
                Ok(Some("b".to_string()))
            }

            async fn capture_order(&self, _order_ref: &str) -> AppResult<CapturedOrder> {
                Ok(completed(999))
            }
        }

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<subscription::Model>::new()])
            .append_query_results([Vec::<subscription::Model>::new()]);
        let mut service = SubscriptionService::new(
            SubscriptionRepository::new(Arc::new(db.into_connection())),
            SubscriptionConfig::default(),
        );
        service.set_gateway(Arc::new(SwappedGateway));

        let result = service.capture("b", "ORDER-1").await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_capture_rejects_malformed_order_ref() {
        let (service, _, gateway) = service_with_gateway(
            MockDatabase::new(DatabaseBackend::Postgres),
            completed(999),
        );

        let result = service.capture("a", "../v1/oauth2/token").await;

        assert!(matches!(result, Err(AppError::InvalidOperation(_))));
        assert_eq!(*gateway.captures.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_current_expires_overdue_subscription() {
        let expired = test_subscription(Duration::hours(-1));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[expired.clone()]])
            .append_query_results([[closed(expired, SubscriptionStatus::Expired)]])
            .append_exec_results([user_flag_update()]);
        let (service, _) = service(db, completed(999));

        assert!(service.current("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_without_subscription_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<subscription::Model>::new()]);
        let (service, _) = service(db, completed(999));

        let result = service.cancel("a").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_active_subscription() {
        let active = test_subscription(Duration::days(10));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[active.clone()]])
            .append_query_results([[closed(active, SubscriptionStatus::Cancelled)]])
            .append_exec_results([user_flag_update()]);
        let (service, _) = service(db, completed(999));

        let cancelled = service.cancel("a").await.unwrap();

        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
        assert!(!cancelled.is_active);
    }
}
