use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::{
    config::StripeConfig,
    errors::{AppError, AppResult},
    providers::http,
};

const PROVIDER_NAME: &str = "Stripe";
const SECRET_KEY_ENV: &str = "STRIPE_SECRET_KEY";
const CHECKOUT_MODES: &[&str] = &["payment", "subscription"];

/// Body of `POST /api/payments/checkout`
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub price_id: Option<String>,
    pub quantity: Option<u32>,
    pub customer_email: Option<String>,
    pub user_id: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum SessionResponse {
    Session {
        id: String,
        #[serde(default)]
        url: Option<String>,
    },
    Unknown(Value),
}

/// Minimal view of a webhook event
#[derive(Deserialize, Debug, Clone)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub livemode: bool,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> AppResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::validation(format!("{} is required", field)))
}

impl CheckoutRequest {
    /// Form fields for `POST /v1/checkout/sessions`
    pub fn to_form(&self) -> AppResult<Vec<(String, String)>> {
        let price_id = required(&self.price_id, "priceId")?;
        let success_url = required(&self.success_url, "successUrl")?;
        let cancel_url = required(&self.cancel_url, "cancelUrl")?;

        let quantity = self.quantity.unwrap_or(1);
        if quantity == 0 {
            return Err(AppError::validation("quantity must be at least 1"));
        }

        let mode = self.mode.as_deref().map(str::trim).unwrap_or("payment");
        if !CHECKOUT_MODES.contains(&mode) {
            return Err(AppError::validation(format!(
                "Unsupported checkout mode '{}', expected one of {:?}",
                mode, CHECKOUT_MODES
            )));
        }

        let mut form = vec![
            ("mode".to_string(), mode.to_string()),
            ("line_items[0][price]".to_string(), price_id.to_string()),
            ("line_items[0][quantity]".to_string(), quantity.to_string()),
            ("success_url".to_string(), success_url.to_string()),
            ("cancel_url".to_string(), cancel_url.to_string()),
        ];

        if let Some(email) = self.customer_email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            form.push(("customer_email".to_string(), email.to_string()));
        }
        if let Some(user_id) = self.user_id.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            form.push(("client_reference_id".to_string(), user_id.to_string()));
            form.push(("metadata[userId]".to_string(), user_id.to_string()));
        }

        Ok(form)
    }
}

/// 创建Stripe Checkout会话
///
/// ## 内部实现逻辑
/// 1. 验证请求字段（priceId、successUrl、cancelUrl）
/// 2. 检查STRIPE_SECRET_KEY，缺失时不发起网络请求
/// 3. 以表单编码发送请求，状态码映射与生成类提供商一致
pub async fn create_checkout_session(
    config: &StripeConfig,
    client: &Client,
    request: &CheckoutRequest,
) -> AppResult<CheckoutSession> {
    let form = request.to_form()?;
    let secret_key = config
        .secret_key()
        .ok_or_else(|| AppError::missing_credential(PROVIDER_NAME, SECRET_KEY_ENV))?;

    tracing::info!(provider = "stripe", user_id = ?request.user_id, "Creating checkout session");

    let payload = http::send_json(
        PROVIDER_NAME,
        client
            .post(format!("{}/v1/checkout/sessions", config.base_url()))
            .bearer_auth(secret_key)
            .timeout(Duration::from_secs(30))
            .form(&form),
    )
    .await?;

    match serde_json::from_value::<SessionResponse>(payload.clone()) {
        Ok(SessionResponse::Session { id, url }) => Ok(CheckoutSession { id, url }),
        _ => Err(http::unrecognized(PROVIDER_NAME, payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CheckoutRequest {
        CheckoutRequest {
            price_id: Some("price_123".to_string()),
            success_url: Some("https://app.example.com/ok".to_string()),
            cancel_url: Some("https://app.example.com/cancel".to_string()),
            ..CheckoutRequest::default()
        }
    }

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_form_defaults() {
        let form = valid().to_form().unwrap();
        assert_eq!(field(&form, "mode"), Some("payment"));
        assert_eq!(field(&form, "line_items[0][price]"), Some("price_123"));
        assert_eq!(field(&form, "line_items[0][quantity]"), Some("1"));
        assert!(field(&form, "customer_email").is_none());
        assert!(field(&form, "client_reference_id").is_none());
    }

    #[test]
    fn test_form_with_user() {
        let mut request = valid();
        request.user_id = Some("user-7".to_string());
        request.customer_email = Some("a@example.com".to_string());
        request.quantity = Some(3);
        request.mode = Some("subscription".to_string());
        let form = request.to_form().unwrap();
        assert_eq!(field(&form, "client_reference_id"), Some("user-7"));
        assert_eq!(field(&form, "metadata[userId]"), Some("user-7"));
        assert_eq!(field(&form, "customer_email"), Some("a@example.com"));
        assert_eq!(field(&form, "line_items[0][quantity]"), Some("3"));
        assert_eq!(field(&form, "mode"), Some("subscription"));
    }

    #[test]
    fn test_form_validation() {
        let mut request = valid();
        request.price_id = Some("  ".to_string());
        assert!(matches!(request.to_form(), Err(AppError::ValidationError(_))));

        let mut request = valid();
        request.quantity = Some(0);
        assert!(request.to_form().is_err());

        let mut request = valid();
        request.mode = Some("setup-intent".to_string());
        assert!(request.to_form().is_err());

        let mut request = valid();
        request.cancel_url = None;
        assert!(request.to_form().unwrap_err().message().contains("cancelUrl"));
    }
}
