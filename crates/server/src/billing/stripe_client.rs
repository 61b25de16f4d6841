use std::str::FromStr as _;

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use stripe::{
    CheckoutSession, CheckoutSessionMode, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCustomer, Currency, Customer, CustomerId, Metadata,
};

use super::{CheckoutParams, CheckoutSession as Session, PaymentClient};

/// Stripe-backed [`PaymentClient`]
pub struct StripeClient {
    client: Option<stripe::Client>,
}

impl StripeClient {
    /// Without a secret key every call fails with "not configured"
    pub fn new(secret_key: Option<String>) -> Self {
        Self {
            client: secret_key.map(stripe::Client::new),
        }
    }

    fn client(&self) -> Result<&stripe::Client> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow!("Stripe is not configured"))
    }
}

fn checkout_request(params: &CheckoutParams) -> Result<CreateCheckoutSession<'_>> {
    let customer =
        CustomerId::from_str(&params.customer_id).context("failed to parse Stripe customer ID")?;
    let mut metadata = Metadata::new();
    metadata.insert("user_id".to_string(), params.user_id.to_string());

    let mut request = CreateCheckoutSession::new();
    request.customer = Some(customer);
    request.mode = Some(CheckoutSessionMode::Payment);
    request.success_url = Some(params.success_url.as_str());
    request.cancel_url = Some(params.cancel_url.as_str());
    request.client_reference_id = Some(params.client_reference_id.as_str());
    request.metadata = Some(metadata);
    request.line_items = Some(vec![CreateCheckoutSessionLineItems {
        price_data: Some(CreateCheckoutSessionLineItemsPriceData {
            currency: Currency::USD,
            unit_amount: Some(params.unit_amount),
            product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                name: params.product_name.to_string(),
                description: Some(params.product_description.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        quantity: Some(1),
        ..Default::default()
    }]);

    Ok(request)
}

#[async_trait]
impl PaymentClient for StripeClient {
    async fn create_customer(&self, email: &str) -> Result<String> {
        let customer = Customer::create(
            self.client()?,
            CreateCustomer {
                email: Some(email),
                ..Default::default()
            },
        )
        .await?;

        Ok(customer.id.to_string())
    }

    async fn create_checkout_session(&self, params: &CheckoutParams) -> Result<Session> {
        let client = self.client()?;
        let session = CheckoutSession::create(client, checkout_request(params)?).await?;

        let url = session
            .url
            .ok_or_else(|| anyhow!("Stripe checkout session {} has no url", session.id))?;

        Ok(Session {
            id: session.id.to_string(),
            url,
        })
    }
}
