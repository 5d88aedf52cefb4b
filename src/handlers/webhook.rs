use crate::error::AppResult;
use crate::external::stripe::StripeService;
use crate::services::OrderService;
use actix_web::{HttpRequest, HttpResponse, Result, web};
use log::{error, info, warn};
use std::collections::HashMap;
use stripe::{CheckoutSession, CheckoutSessionPaymentStatus, Event, EventObject, EventType};

/// Stripe webhook处理器
///
/// 只关心 Checkout 完成事件，用于把订单标记为已支付
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    stripe_service: web::Data<StripeService>,
    order_service: web::Data<OrderService>,
) -> Result<HttpResponse> {
    let signature = match req.headers().get("stripe-signature") {
        Some(sig) => sig.to_str().unwrap_or(""),
        None => {
            warn!("Missing Stripe-Signature header");
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Missing Stripe-Signature header"
            })));
        }
    };

    let payload = std::str::from_utf8(&body).map_err(|_| {
        error!("Invalid UTF-8 in webhook payload");
        actix_web::error::ErrorBadRequest("Invalid payload encoding")
    })?;

    // 验证webhook签名
    let event = match stripe_service.verify_webhook_signature(payload, signature) {
        Ok(event) => event,
        Err(e) => {
            error!("Webhook signature verification failed: {e}");
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid signature"
            })));
        }
    };

    info!(
        "Received Stripe webhook event: {} ({})",
        event.type_, event.id
    );

    match handle_stripe_event(event, &order_service).await {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "received": true
        }))),
        Err(e) => {
            error!("Failed to process webhook event: {e}");
            // 返回200避免Stripe重试，订单可通过 /orders/{id}/pay 重新支付
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "received": true,
                "error": format!("Processing failed: {}", e)
            })))
        }
    }
}

async fn handle_stripe_event(event: Event, order_service: &OrderService) -> AppResult<()> {
    match event.type_ {
        EventType::CheckoutSessionCompleted | EventType::CheckoutSessionAsyncPaymentSucceeded => {
            let EventObject::CheckoutSession(session) = event.data.object else {
                warn!("Checkout event {} without a session object", event.id);
                return Ok(());
            };
            handle_checkout_completed(session, order_service).await
        }
        EventType::CheckoutSessionAsyncPaymentFailed | EventType::CheckoutSessionExpired => {
            if let EventObject::CheckoutSession(session) = event.data.object {
                warn!(
                    "Checkout session {} not paid (order {:?})",
                    session.id,
                    order_id_from(
                        session.client_reference_id.as_deref(),
                        session.metadata.as_ref()
                    )
                );
            }
            Ok(())
        }
        _ => {
            info!("Unhandled event type: {:?}", event.type_);
            Ok(())
        }
    }
}

async fn handle_checkout_completed(
    session: CheckoutSession,
    order_service: &OrderService,
) -> AppResult<()> {
    // 异步支付方式在 completed 时可能尚未到账
    if session.payment_status != CheckoutSessionPaymentStatus::Paid {
        info!(
            "Checkout session {} completed with payment status {:?}",
            session.id, session.payment_status
        );
        return Ok(());
    }

    let Some(order_id) = order_id_from(
        session.client_reference_id.as_deref(),
        session.metadata.as_ref(),
    ) else {
        warn!("Checkout session {} carries no order id", session.id);
        return Ok(());
    };

    let payment_intent_id = session
        .payment_intent
        .as_ref()
        .map(|p| p.id().to_string());

    info!(
        "Payment succeeded for order {order_id} via session {}",
        session.id
    );
    order_service
        .mark_paid(order_id, Some(session.id.to_string()), payment_intent_id)
        .await?;
    Ok(())
}

/// 优先 client_reference_id，其次 metadata.order_id
fn order_id_from(
    client_reference_id: Option<&str>,
    metadata: Option<&HashMap<String, String>>,
) -> Option<i64> {
    client_reference_id
        .and_then(|v| v.parse::<i64>().ok())
        .or_else(|| {
            metadata
                .and_then(|m| m.get("order_id"))
                .and_then(|v| v.parse::<i64>().ok())
        })
}

/// 配置webhook路由
pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhook").route("/stripe", web::post().to(stripe_webhook)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_from_session_fields() {
        let metadata = HashMap::from([("order_id".to_string(), "42".to_string())]);

        assert_eq!(order_id_from(Some("17"), Some(&metadata)), Some(17));
        assert_eq!(order_id_from(None, Some(&metadata)), Some(42));
        assert_eq!(order_id_from(Some("abc"), Some(&metadata)), Some(42));
        assert_eq!(order_id_from(None, None), None);
    }
}
