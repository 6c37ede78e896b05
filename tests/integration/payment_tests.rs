use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tg_funnel::config::PaymentConfig;
use tg_funnel::payment::{
    build_init_request, generate_token, parse_init_response, parse_state_response, PaymentClient,
    PaymentError,
};
use tg_funnel::repo::Product;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn product() -> Product {
    Product {
        id: 1,
        name: "Первый шаг".to_string(),
        info: "Доступ к каналу".to_string(),
        description: None,
        price: 2490,
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

#[test]
fn test_token_uses_sorted_scalars_and_password() {
    let request = object(json!({
        "TerminalKey": "TinkoffBankTest",
        "Amount": 249000,
        "OrderId": "50",
        "Description": "Первый шаг",
        "Receipt": {"Email": "a@b.ru"},
        "Token": "stale"
    }));

    // Amount, Description, OrderId, Password, TerminalKey
    let expected = sha256_hex("249000Первый шаг50secretTinkoffBankTest");
    assert_eq!(generate_token(&request, "secret"), expected);
}

#[test]
fn test_token_writes_booleans_lowercase() {
    let request = object(json!({"Recurrent": true, "TerminalKey": "TK"}));
    assert_eq!(generate_token(&request, "pw"), sha256_hex("pwtrueTK"));
}

#[test]
fn test_init_request_amounts_in_kopecks() {
    let request = build_init_request("TK", "usn_income", "50", "Первый шаг", "buyer@example.com", &product());

    assert_eq!(request["Amount"], json!(249000));
    assert_eq!(request["OrderId"], json!("50"));
    assert_eq!(request["Receipt"]["Email"], json!("buyer@example.com"));
    assert_eq!(request["Receipt"]["Taxation"], json!("usn_income"));
    let items = request["Receipt"]["Items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["Name"], json!("Первый шаг"));
    assert_eq!(items[0]["Quantity"], json!(1));
    assert_eq!(items[0]["Amount"], json!(249000));
    assert!(!request.contains_key("Token"));
}

#[test]
fn test_parse_init_response() {
    let init = parse_init_response(&json!({
        "Success": true,
        "ErrorCode": "0",
        "PaymentId": "3093639567",
        "PaymentURL": "https://securepay.tinkoff.ru/new/fU1ppgqa"
    }))
    .unwrap();
    assert_eq!(init.payment_id, 3093639567);
    assert_eq!(init.payment_url, "https://securepay.tinkoff.ru/new/fU1ppgqa");

    let numeric = parse_init_response(&json!({
        "Success": true,
        "PaymentId": 17,
        "PaymentURL": "https://pay.example.com/17"
    }))
    .unwrap();
    assert_eq!(numeric.payment_id, 17);

    let missing_url = parse_init_response(&json!({"Success": true, "PaymentId": 1}));
    assert!(matches!(missing_url, Err(PaymentError::InvalidResponse(_))));
}

#[test]
fn test_parse_gateway_error() {
    let err = parse_init_response(&json!({
        "Success": false,
        "ErrorCode": "204",
        "Message": "Неверный токен",
        "Details": "Проверьте пару TerminalKey/SecretKey"
    }))
    .unwrap_err();
    match err {
        PaymentError::Gateway { code, message } => {
            assert_eq!(code, "204");
            assert_eq!(message, "Проверьте пару TerminalKey/SecretKey");
        }
        other => panic!("expected a gateway error, got {:?}", other),
    }
}

#[test]
fn test_parse_state_response() {
    let status = parse_state_response(&json!({
        "Success": true,
        "Status": "CONFIRMED",
        "PaymentId": "700"
    }))
    .unwrap();
    assert!(status.is_confirmed());
    assert_eq!(status.payment_id, Some(700));

    let nested = parse_state_response(&json!({
        "Success": true,
        "Payments": [{"PaymentId": 701, "Status": "AUTHORIZED"}]
    }))
    .unwrap();
    assert!(!nested.is_confirmed());
    assert_eq!(nested.status, "AUTHORIZED");
    assert_eq!(nested.payment_id, Some(701));

    assert!(matches!(
        parse_state_response(&json!({"Success": true})),
        Err(PaymentError::InvalidResponse(_))
    ));
}

fn client_for(server: &MockServer) -> PaymentClient {
    PaymentClient::new(&PaymentConfig {
        terminal_key: "TK".to_string(),
        password: "pw".to_string(),
        api_url: format!("{}/", server.uri()),
        taxation: "usn_income".to_string(),
    })
    .unwrap()
}

/// json body of the only request the gateway received
async fn single_request_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.expect("request recording enabled");
    assert_eq!(requests.len(), 1);
    serde_json::from_slice(&requests[0].body).expect("request body is json")
}

#[tokio::test]
async fn test_create_payment_signs_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/Init"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Success": true,
            "PaymentId": "900",
            "PaymentURL": "https://pay.example.com/900"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server);

    let init = client
        .create_payment("55", "Первый шаг", "buyer@example.com", &product())
        .await
        .unwrap();
    assert_eq!(init.payment_id, 900);
    assert_eq!(init.payment_url, "https://pay.example.com/900");

    let request = single_request_body(&server).await;
    let mut unsigned = object(request.clone());
    let token = unsigned.remove("Token").expect("token missing");
    assert_eq!(token, json!(generate_token(&unsigned, "pw")));
    assert_eq!(request["OrderId"], json!("55"));
    assert_eq!(request["TerminalKey"], json!("TK"));
}

#[tokio::test]
async fn test_get_payment_status_reports_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/GetState"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Success": false,
            "ErrorCode": "7",
            "Message": "Покупатель не найден"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server);

    let err = client.get_payment_status(900).await.unwrap_err();
    assert!(matches!(err, PaymentError::Gateway { ref code, .. } if code == "7"));

    let request = single_request_body(&server).await;
    assert_eq!(request["PaymentId"], json!("900"));
}
