use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{PaymentGateway, PaymentIntent};
use crate::models::Money;

pub struct StripeGateway {
    secret_key: String,
    currency: String,
    client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(secret_key: String, currency: String) -> Self {
        Self {
            secret_key,
            currency,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: String,
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount: Money,
        booking_id: &str,
        user_id: &str,
    ) -> anyhow::Result<PaymentIntent> {
        anyhow::ensure!(!self.secret_key.is_empty(), "STRIPE_SECRET_KEY is not set");

        let amount = amount.cents().to_string();
        let intent: IntentResponse = self
            .client
            .post("https://api.stripe.com/v1/payment_intents")
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[
                ("amount", amount.as_str()),
                ("currency", self.currency.as_str()),
                ("metadata[booking_id]", booking_id),
                ("metadata[user_id]", user_id),
            ])
            .send()
            .await
            .context("failed to create Stripe payment intent")?
            .error_for_status()
            .context("Stripe API returned error")?
            .json()
            .await
            .context("failed to parse Stripe payment intent")?;

        Ok(PaymentIntent {
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
        })
    }
}

/// The parts of a Stripe event the webhook acts on.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: StripePaymentIntent,
}

#[derive(Debug, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

impl StripePaymentIntent {
    pub fn booking_id(&self) -> Option<&str> {
        self.metadata.get("booking_id").map(String::as_str)
    }
}
