//! Mock payment gateway.
//!
//! Used by the integration tests and by dev mode when no Razorpay
//! credentials are configured. Supports:
//! - Call tracking
//! - Error injection

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::ports::{
    CreateGatewaySubscription, GatewaySubscription, PaymentGateway, PaymentGatewayError,
};

/// Mock payment gateway.
///
/// ```ignore
/// let mock = MockPaymentGateway::new();
/// mock.set_error(PaymentGatewayError::Transport("down".into()));
/// ```
#[derive(Clone, Default)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    created: Vec<CreateGatewaySubscription>,
    cancelled: Vec<String>,
    next_error: Option<PaymentGatewayError>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `error` until cleared.
    pub fn set_error(&self, error: PaymentGatewayError) {
        self.state().next_error = Some(error);
    }

    pub fn clear_error(&self) {
        self.state().next_error = None;
    }

    pub fn created(&self) -> Vec<CreateGatewaySubscription> {
        self.state().created.clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state().cancelled.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_subscription(
        &self,
        request: CreateGatewaySubscription,
    ) -> Result<GatewaySubscription, PaymentGatewayError> {
        let mut state = self.state();
        if let Some(error) = &state.next_error {
            return Err(error.clone());
        }
        state.created.push(request);
        let id = format!("sub_mock_{}", state.created.len());
        tracing::debug!(gateway_subscription_id = %id, "Mock gateway subscription created");
        Ok(GatewaySubscription {
            id,
            status: "created".to_string(),
            short_url: None,
        })
    }

    async fn cancel_subscription(
        &self,
        gateway_id: &str,
    ) -> Result<GatewaySubscription, PaymentGatewayError> {
        let mut state = self.state();
        if let Some(error) = &state.next_error {
            return Err(error.clone());
        }
        state.cancelled.push(gateway_id.to_string());
        Ok(GatewaySubscription {
            id: gateway_id.to_string(),
            status: "cancelled".to_string(),
            short_url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn request() -> CreateGatewaySubscription {
        CreateGatewaySubscription {
            plan_id: "plan_1".into(),
            total_count: 12,
            customer_notify: true,
            notes: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn tracks_calls_and_numbers_ids() {
        let mock = MockPaymentGateway::new();

        let first = mock.create_subscription(request()).await.unwrap();
        let second = mock.create_subscription(request()).await.unwrap();
        mock.cancel_subscription(&first.id).await.unwrap();

        assert_eq!(first.id, "sub_mock_1");
        assert_eq!(second.id, "sub_mock_2");
        assert_eq!(mock.cancelled(), vec!["sub_mock_1".to_string()]);
    }

    #[tokio::test]
    async fn injected_error_is_returned_until_cleared() {
        let mock = MockPaymentGateway::new();
        mock.set_error(PaymentGatewayError::Transport("down".into()));

        assert!(mock.create_subscription(request()).await.is_err());
        assert!(mock.created().is_empty());

        mock.clear_error();
        assert!(mock.cancel_subscription("sub_x").await.is_ok());
    }
}
