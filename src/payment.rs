use log::{error, info};
use reqwest::Client;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::config::PaymentConfig;
use crate::repo::Product;

pub const CONFIRMED_STATUS: &str = "CONFIRMED";

#[derive(Debug)]
pub enum PaymentError {
    HttpError(reqwest::Error),
    StatusCodeError(u16),
    Gateway { code: String, message: String },
    InvalidResponse(String),
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentError::HttpError(e) => write!(f, "HTTP error: {}", e),
            PaymentError::StatusCodeError(code) => write!(f, "HTTP status code error: {}", code),
            PaymentError::Gateway { code, message } => {
                write!(f, "Payment gateway error {}: {}", code, message)
            }
            PaymentError::InvalidResponse(e) => write!(f, "Invalid gateway response: {}", e),
        }
    }
}

impl std::error::Error for PaymentError {}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::HttpError(err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentInit {
    pub payment_id: i64,
    pub payment_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentStatus {
    pub payment_id: Option<i64>,
    pub status: String,
}

impl PaymentStatus {
    pub fn is_confirmed(&self) -> bool {
        self.status == CONFIRMED_STATUS
    }
}

/// signs a request: top-level scalars plus the password, ordered by key,
/// concatenated and hashed with sha-256. nested objects (Receipt, DATA) are skipped
pub fn generate_token(request: &Map<String, Value>, password: &str) -> String {
    let mut values: Vec<(&str, String)> = request
        .iter()
        .filter(|(key, _)| key.as_str() != "Token")
        .filter_map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.as_str(), value))
        })
        .collect();
    values.push(("Password", password.to_string()));
    values.sort_by(|a, b| a.0.cmp(b.0));

    let concatenated: String = values.into_iter().map(|(_, value)| value).collect();
    hex::encode(Sha256::digest(concatenated.as_bytes()))
}

/// body of /v2/Init without the token; amounts are in kopecks
pub fn build_init_request(
    terminal_key: &str,
    taxation: &str,
    order_id: &str,
    description: &str,
    email: &str,
    product: &Product,
) -> Map<String, Value> {
    let amount = i64::from(product.price) * 100;
    let body = json!({
        "TerminalKey": terminal_key,
        "Amount": amount,
        "OrderId": order_id,
        "Description": description,
        "Receipt": {
            "Email": email,
            "Taxation": taxation,
            "Items": [{
                "Name": product.name,
                "Price": amount,
                "Quantity": 1,
                "Amount": amount,
                "Tax": "none",
            }],
        },
    });

    match body {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// gateway errors come back as 200 with Success=false
fn check_success(response: &Value) -> Result<(), PaymentError> {
    if response.get("Success").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }
    let code = match response.get("ErrorCode") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "unknown".to_string(),
    };
    let message = response
        .get("Details")
        .or_else(|| response.get("Message"))
        .and_then(Value::as_str)
        .unwrap_or("no details")
        .to_string();
    Err(PaymentError::Gateway { code, message })
}

/// PaymentId arrives as a string in Init and as a number in some GetState replies
fn payment_id_field(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn parse_init_response(response: &Value) -> Result<PaymentInit, PaymentError> {
    check_success(response)?;
    let payment_id = payment_id_field(response.get("PaymentId"))
        .ok_or_else(|| PaymentError::InvalidResponse("missing PaymentId".to_string()))?;
    let payment_url = response
        .get("PaymentURL")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| PaymentError::InvalidResponse("missing PaymentURL".to_string()))?
        .to_string();
    Ok(PaymentInit {
        payment_id,
        payment_url,
    })
}

pub fn parse_state_response(response: &Value) -> Result<PaymentStatus, PaymentError> {
    check_success(response)?;
    let first_payment = response
        .get("Payments")
        .and_then(Value::as_array)
        .and_then(|payments| payments.first());

    let status = response
        .get("Status")
        .and_then(Value::as_str)
        .or_else(|| first_payment.and_then(|p| p.get("Status")).and_then(Value::as_str))
        .ok_or_else(|| PaymentError::InvalidResponse("missing Status".to_string()))?
        .to_string();

    let payment_id = payment_id_field(response.get("PaymentId"))
        .or_else(|| payment_id_field(first_payment.and_then(|p| p.get("PaymentId"))));

    Ok(PaymentStatus { payment_id, status })
}

#[derive(Clone)]
pub struct PaymentClient {
    client: Client,
    terminal_key: String,
    password: String,
    base_url: String,
    taxation: String,
}

impl PaymentClient {
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            terminal_key: config.terminal_key.clone(),
            password: config.password.clone(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            taxation: config.taxation.clone(),
        })
    }

    async fn post(&self, method: &str, mut body: Map<String, Value>) -> Result<Value, PaymentError> {
        let token = generate_token(&body, &self.password);
        body.insert("Token".to_string(), Value::String(token));

        let url = format!("{}{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            error!("Payment gateway {} returned {}", method, response.status());
            return Err(PaymentError::StatusCodeError(response.status().as_u16()));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| PaymentError::InvalidResponse(e.to_string()))
    }

    pub async fn create_payment(
        &self,
        order_id: &str,
        description: &str,
        email: &str,
        product: &Product,
    ) -> Result<PaymentInit, PaymentError> {
        let body = build_init_request(
            &self.terminal_key,
            &self.taxation,
            order_id,
            description,
            email,
            product,
        );
        let response = self.post("/v2/Init", body).await?;
        let init = parse_init_response(&response)?;
        info!(
            "Initialised payment {} for order {}",
            init.payment_id, order_id
        );
        Ok(init)
    }

    pub async fn get_payment_status(&self, payment_id: i64) -> Result<PaymentStatus, PaymentError> {
        let mut body = Map::new();
        body.insert(
            "TerminalKey".to_string(),
            Value::String(self.terminal_key.clone()),
        );
        body.insert(
            "PaymentId".to_string(),
            Value::String(payment_id.to_string()),
        );
        let response = self.post("/v2/GetState", body).await?;
        parse_state_response(&response)
    }
}
