use crate::config::StripeConfig;
use crate::entities::{order_items, orders};
use crate::error::{AppError, AppResult};
use std::collections::HashMap;
use stripe::{
    CheckoutSession, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, Currency, Event, Webhook,
};

/// Checkout Session 创建结果
#[derive(Debug, Clone)]
pub struct CheckoutSessionInfo {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Clone)]
pub struct StripeService {
    client: Client,
    config: StripeConfig,
}

impl StripeService {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: Client::new(config.secret_key.clone()),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn redirect_url(template: &str, order_id: i64) -> String {
        template.replace("{ORDER_ID}", &order_id.to_string())
    }

    /// 为订单创建托管支付页面，metadata 与 client_reference_id 中都带上订单 id
    pub async fn create_checkout_session(
        &self,
        order: &orders::Model,
        items: &[order_items::Model],
    ) -> AppResult<CheckoutSessionInfo> {
        if !self.is_configured() {
            return Err(AppError::ConfigError("Stripe is not configured".to_string()));
        }

        let order_id = order.id.to_string();
        let success_url = Self::redirect_url(&self.config.success_url, order.id);
        let cancel_url = Self::redirect_url(&self.config.cancel_url, order.id);

        let mut line_items: Vec<CreateCheckoutSessionLineItems> = items
            .iter()
            .map(|item| CreateCheckoutSessionLineItems {
                quantity: Some(item.quantity as u64),
                price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                    currency: Currency::USD,
                    unit_amount: Some(item.unit_price_cents),
                    product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                        name: item.product_name.clone(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .collect();

        if order.shipping_cents > 0 {
            line_items.push(CreateCheckoutSessionLineItems {
                quantity: Some(1),
                price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                    currency: Currency::USD,
                    unit_amount: Some(order.shipping_cents),
                    product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                        name: "Shipping".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.success_url = Some(&success_url);
        params.cancel_url = Some(&cancel_url);
        params.client_reference_id = Some(&order_id);
        params.line_items = Some(line_items);
        params.metadata = Some(HashMap::from([
            ("order_id".to_string(), order_id.clone()),
            ("order_number".to_string(), order.order_number.clone()),
        ]));

        let session = CheckoutSession::create(&self.client, params).await?;

        log::info!(
            "Created Stripe checkout session {} for order {}",
            session.id,
            order.order_number
        );

        Ok(CheckoutSessionInfo {
            id: session.id.to_string(),
            url: session.url,
        })
    }

    /// 校验 Stripe-Signature 并解析事件
    pub fn verify_webhook_signature(&self, payload: &str, signature: &str) -> AppResult<Event> {
        if self.config.webhook_secret.is_empty() {
            return Err(AppError::ConfigError(
                "Stripe webhook secret is not configured".to_string(),
            ));
        }

        Webhook::construct_event(payload, signature, &self.config.webhook_secret)
            .map_err(|e| AppError::AuthError(format!("Invalid webhook signature: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stripe_service_creation() {
        let config = StripeConfig {
            secret_key: "sk_test_123".to_string(),
            webhook_secret: "whsec_123".to_string(),
            success_url: "https://shop.example.com/orders/{ORDER_ID}?paid=1".to_string(),
            cancel_url: "https://shop.example.com/cart".to_string(),
        };
        let service = StripeService::new(config);
        assert!(service.is_configured());
        assert_eq!(
            StripeService::redirect_url(&service.config.success_url, 12),
            "https://shop.example.com/orders/12?paid=1"
        );
    }

    #[test]
    fn test_webhook_rejects_bad_signature() {
        let service = StripeService::new(StripeConfig {
            secret_key: "sk_test_123".to_string(),
            webhook_secret: "whsec_123".to_string(),
            ..Default::default()
        });
        let result = service.verify_webhook_signature("{}", "t=1,v1=deadbeef");
        assert!(matches!(result, Err(AppError::AuthError(_))));
    }

    #[test]
    fn test_webhook_requires_secret() {
        let service = StripeService::new(StripeConfig::default());
        assert!(matches!(
            service.verify_webhook_signature("{}", "t=1,v1=x"),
            Err(AppError::ConfigError(_))
        ));
    }
}
