//! Payment gateway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use livenest_common::{AppError, AppResult, config::PayPalConfig};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Shared payment gateway handle.
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;

/// Context attached to an order.
#[derive(Debug, Clone)]
pub struct OrderMetadata {
    /// Paying user
    pub user_id: String,
    /// Human-readable line item
    pub description: String,
}

/// A created, not yet captured, order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    pub order_ref: String,
    /// Where the buyer approves the payment
    pub approval_url: Option<String>,
}

/// Result of capturing an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOrder {
    /// Provider status, `COMPLETED` on success
    pub status: String,
    pub amount_cents: i64,
    pub currency: String,
    /// User the order was created for
    pub payer_id: Option<String>,
}

impl CapturedOrder {
    /// Whether the provider reports the capture as complete.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == "COMPLETED"
    }
}

/// Third-party payment processing.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an order for `amount_cents` in `currency`.
    async fn create_order(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: &OrderMetadata,
    ) -> AppResult<PaymentOrder>;

    /// User an existing order was created for.
    async fn order_payer(&self, order_ref: &str) -> AppResult<Option<String>>;

    /// Capture a buyer-approved order.
    async fn capture_order(&self, order_ref: &str) -> AppResult<CapturedOrder>;
}

/// Whether `order_ref` is safe to place in a provider URL path.
#[must_use]
pub fn is_valid_order_ref(order_ref: &str) -> bool {
    !order_ref.is_empty()
        && order_ref.len() <= 64
        && order_ref
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

fn check_order_ref(order_ref: &str) -> AppResult<()> {
    if is_valid_order_ref(order_ref) {
        Ok(())
    } else {
        Err(AppError::InvalidOperation(format!(
            "Invalid order reference: {order_ref}"
        )))
    }
}

/// `PayPal` Orders v2 REST client.
#[derive(Clone)]
pub struct PayPalGateway {
    client: reqwest::Client,
    config: PayPalConfig,
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Money {
    currency_code: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct Capture {
    amount: Money,
}

#[derive(Debug, Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
    custom_id: Option<String>,
    payments: Option<Payments>,
}

#[derive(Debug, Deserialize)]
struct OrderDetails {
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    status: String,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

impl PayPalGateway {
    /// Create a new `PayPal` client.
    pub fn new(config: PayPalConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    async fn access_token(&self) -> AppResult<String> {
        let response = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("PayPal auth request failed: {e}")))?;

        let token: AccessToken = Self::parse(response, "auth").await?;
        Ok(token.access_token)
    }

    async fn parse<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
        step: &str,
    ) -> AppResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "PayPal {step} failed with {status}: {body}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid PayPal {step} response: {e}")))
    }
}

#[async_trait]
impl PaymentGateway for PayPalGateway {
    async fn create_order(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: &OrderMetadata,
    ) -> AppResult<PaymentOrder> {
        let token = self.access_token().await?;

        let mut body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "custom_id": metadata.user_id,
                "description": metadata.description,
                "amount": {
                    "currency_code": currency,
                    "value": format_amount(amount_cents),
                },
            }],
        });
        if let (Some(return_url), Some(cancel_url)) =
            (&self.config.return_url, &self.config.cancel_url)
        {
            body["application_context"] = json!({
                "return_url": return_url,
                "cancel_url": cancel_url,
            });
        }

        let response = self
            .client
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("PayPal create order failed: {e}")))?;

        let order: OrderResponse = Self::parse(response, "create order").await?;
        let approval_url = order
            .links
            .into_iter()
            .find(|link| link.rel == "approve")
            .map(|link| link.href);

        tracing::info!(order_ref = %order.id, user_id = %metadata.user_id, "Created PayPal order");

        Ok(PaymentOrder {
            order_ref: order.id,
            approval_url,
        })
    }

    async fn order_payer(&self, order_ref: &str) -> AppResult<Option<String>> {
        check_order_ref(order_ref)?;
        let token = self.access_token().await?;

        let response = self
            .client
            .get(self.url(&format!("/v2/checkout/orders/{order_ref}")))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("PayPal order lookup failed: {e}")))?;

        let order: OrderDetails = Self::parse(response, "order lookup").await?;
        Ok(order
            .purchase_units
            .into_iter()
            .find_map(|unit| unit.custom_id))
    }

    async fn capture_order(&self, order_ref: &str) -> AppResult<CapturedOrder> {
        check_order_ref(order_ref)?;
        let token = self.access_token().await?;

        let response = self
            .client
            .post(self.url(&format!("/v2/checkout/orders/{order_ref}/capture")))
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("PayPal capture failed: {e}")))?;

        let captured: CaptureResponse = Self::parse(response, "capture").await?;
        let payer_id = captured
            .purchase_units
            .iter()
            .find_map(|unit| unit.custom_id.clone());
        let amount = captured
            .purchase_units
            .into_iter()
            .filter_map(|unit| unit.payments)
            .flat_map(|payments| payments.captures)
            .map(|capture| capture.amount)
            .next()
            .ok_or_else(|| AppError::Upstream("PayPal capture has no amount".to_string()))?;

        Ok(CapturedOrder {
            status: captured.status,
            amount_cents: parse_amount(&amount.value)?,
            currency: amount.currency_code,
            payer_id,
        })
    }
}

/// Format minor units as a decimal string (`999` -> `"9.99"`).
#[must_use]
pub fn format_amount(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Parse a decimal amount string into minor units (`"9.99"` -> `999`).
pub fn parse_amount(value: &str) -> AppResult<i64> {
    let invalid = || AppError::Upstream(format!("Invalid amount: {value}"));
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());

    let (whole, fraction) = value.split_once('.').unwrap_or((value, "0"));
    if !digits(whole) || !digits(fraction) || fraction.len() > 2 {
        return Err(invalid());
    }
    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let fraction: i64 = format!("{fraction:0<2}").parse().map_err(|_| invalid())?;
    whole
        .checked_mul(100)
        .and_then(|cents| cents.checked_add(fraction))
        .ok_or_else(invalid)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(999), "9.99");
        assert_eq!(format_amount(1000), "10.00");
        assert_eq!(format_amount(5), "0.05");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("9.99").unwrap(), 999);
        assert_eq!(parse_amount("10").unwrap(), 1000);
        assert_eq!(parse_amount("10.5").unwrap(), 1050);
        assert!(parse_amount("9.999").is_err());
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn test_parse_amount_rejects_signs_and_overflow() {
        assert!(parse_amount("9.-5").is_err());
        assert!(parse_amount("-0.50").is_err());
        assert!(parse_amount("+1.00").is_err());
        assert!(parse_amount("1.").is_err());
        assert!(parse_amount(".50").is_err());
        assert!(parse_amount("99999999999999999999").is_err());
        assert!(parse_amount(&format!("{}", i64::MAX / 10)).is_err());
    }

    #[test]
    fn test_order_ref_validation() {
        assert!(is_valid_order_ref("5O190127TN364715T"));
        assert!(is_valid_order_ref("ORDER-1"));
        assert!(!is_valid_order_ref(""));
        assert!(!is_valid_order_ref("../../v1/oauth2/token"));
        assert!(!is_valid_order_ref("abc?x=1"));
        assert!(!is_valid_order_ref("abc/capture"));
    }

    #[test]
    fn test_captured_order_completed() {
        let captured = CapturedOrder {
            status: "COMPLETED".to_string(),
            amount_cents: 999,
            currency: "USD".to_string(),
            payer_id: Some("u1".to_string()),
        };
        assert!(captured.is_completed());
    }
}
