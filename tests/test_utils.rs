use std::sync::{Arc, Once};

use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::info;
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

use freshbooks_rs::{Client, Config, KeyPair, MemoryTokenStore, Token, TokenStore};

pub const ACCOUNT_ID: &str = "acct123";
pub const CLIENTS_PATH: &str = "/accounting/account/acct123/users/clients";
pub const INVOICES_PATH: &str = "/accounting/account/acct123/invoices/invoices";
pub const PAYMENTS_PATH: &str = "/payments/account/acct123";

static LOGGING_CONFIGURED: Once = Once::new();

/// Setup before test runs
pub fn do_setup() {
    LOGGING_CONFIGURED.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("trace")
            .with_test_writer()
            .init();
    });
    info!("Setting up test environment");
}

#[allow(dead_code)]
pub fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[allow(dead_code)]
pub fn token(access_token: &str, created_at: i64) -> Token {
    Token {
        access_token: access_token.to_string(),
        token_type: "Bearer".to_string(),
        expires_in: 3600,
        refresh_token: "refresh-me".to_string(),
        scope: Some("admin:all:legacy".to_string()),
        created_at,
    }
}

#[allow(dead_code)]
pub fn fresh_token() -> Token {
    token("fresh-access", now())
}

#[allow(dead_code)]
pub fn expired_token() -> Token {
    token("expired-access", now() - 7200)
}

#[allow(dead_code)]
pub fn test_config(server: &MockServer) -> Config {
    let key_pair = KeyPair::new(
        "client-id".to_string(),
        "client-secret".to_string(),
        "https://example.com/callback",
    )
    .unwrap();
    Config::new(key_pair, ACCOUNT_ID)
        .unwrap()
        .with_base_url(&server.uri())
        .unwrap()
}

/// A client backed by an in-memory store holding `token`.
#[allow(dead_code)]
pub fn test_client(server: &MockServer, token: Option<Token>) -> (Client, Arc<MemoryTokenStore>) {
    let store = Arc::new(match token {
        Some(token) => MemoryTokenStore::with_token(token),
        None => MemoryTokenStore::new(),
    });
    let client = Client::with_store(test_config(server), store.clone() as Arc<dyn TokenStore>)
        .unwrap();
    (client, store)
}

/// The JSON body the token endpoint answers with.
#[allow(dead_code)]
pub fn token_body(access_token: &str, refresh_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 43200,
        "refresh_token": refresh_token,
        "scope": "admin:all:legacy",
        "created_at": now(),
        "direct_buy_tokens": {}
    })
}

#[allow(dead_code)]
pub async fn mount_refresh(server: &MockServer, access_token: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access_token, "next-refresh")))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Wraps `result` in the accounting API's response envelope.
#[allow(dead_code)]
pub fn envelope(result: Value) -> Value {
    json!({ "response": { "result": result } })
}

#[allow(dead_code)]
pub fn client_record(userid: i64, email: &str, organization: &str) -> Value {
    json!({
        "id": userid,
        "userid": userid,
        "email": email,
        "organization": organization,
        "fname": "Olive",
        "lname": "Owner",
        "contacts": [
            {"contactid": 11, "email": "ann@example.com", "fname": "Ann", "lname": "Doe"},
            {"contactid": 12, "email": "bob@example.com", "fname": "Bob", "lname": "Doe"}
        ]
    })
}

#[allow(dead_code)]
pub fn invoice_record(id: i64, customerid: i64, organization: &str, status: &str) -> Value {
    json!({
        "id": id,
        "invoiceid": id,
        "customerid": customerid,
        "notes": "Thanks for your business",
        "create_date": "2024-02-01",
        "invoice_number": format!("{id:04}"),
        "organization": organization,
        "current_organization": organization,
        "amount": {"amount": "150.00", "code": "USD"},
        "outstanding": {"amount": "150.00", "code": "USD"},
        "v3_status": status,
        "po_number": null,
        "lines": [{
            "lineid": 1,
            "name": "Consulting",
            "description": "February",
            "qty": "3",
            "unit_cost": {"amount": "50.00", "code": "USD"},
            "amount": {"amount": "150.00", "code": "USD"}
        }],
        "contacts": [],
        "allowed_gateways": []
    })
}
