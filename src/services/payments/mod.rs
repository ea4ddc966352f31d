pub mod signature;
pub mod stripe;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::Money;

#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub payment_intent_id: String,
    pub client_secret: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        amount: Money,
        booking_id: &str,
        user_id: &str,
    ) -> anyhow::Result<PaymentIntent>;
}
