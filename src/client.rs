use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use oauth2::CsrfToken;
use reqwest::{header, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::sleep;
use url::Url;

use crate::config::Config;
use crate::endpoints::{FreshBooksEndpoint, Query, Resource};
use crate::entities::{
    client::{self as fb_client, FreshBooksClient, NewContact},
    invoice::{self, Invoice, InvoiceBuilder, ListParameters},
    payment::{self, PaymentOptions},
};
use crate::error::{Error, ErrorResponse, Result};
use crate::oauth;
use crate::token::{FileTokenStore, Token, TokenStore};

const MAX_RETRY_ATTEMPTS: usize = 3;
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Produces an authorization code when no usable token is available. Called from a
/// blocking thread.
pub type CodeSource = Arc<dyn Fn() -> Result<String> + Send + Sync>;

/// This is the client that is used for interacting with the FreshBooks API. It owns the
/// OAuth token lifecycle (load, refresh, persist) and the account context.
#[derive(Clone)]
pub struct Client {
    config: Arc<Config>,
    http_client: reqwest::Client,
    token_http_client: reqwest::Client,
    store: Arc<dyn TokenStore>,
    token: Arc<Mutex<Option<Token>>>,
    code_source: Option<CodeSource>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("account_id", &self.config.account_id)
            .field("base_url", &self.config.base_url.as_str())
            .field("store", &self.store)
            .field("prompt_for_code", &self.code_source.is_some())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client that keeps its token in the file named by `config.token_path`.
    pub fn new(config: Config) -> Result<Self> {
        let store = Arc::new(FileTokenStore::new(config.token_path.clone()));
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn TokenStore>) -> Result<Self> {
        Ok(Self {
            config: Arc::new(config),
            http_client: reqwest::Client::builder().build()?,
            token_http_client: oauth::build_token_http_client()?,
            store,
            token: Arc::new(Mutex::new(None)),
            code_source: None,
        })
    }

    /// Creates a client from `FRESHBOOKS_*` environment variables (and `.env`).
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?)
    }

    /// When enabled, a missing token or a failed refresh asks for an authorization code
    /// on the terminal instead of returning an error.
    #[must_use]
    pub fn with_code_prompt(mut self, enabled: bool) -> Self {
        self.code_source = enabled.then(terminal_code_source);
        self
    }

    /// Like [`Client::with_code_prompt`], but takes authorization codes from `source`.
    #[must_use]
    pub fn with_code_source(mut self, source: CodeSource) -> Self {
        self.code_source = Some(source);
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Generates the URL a user visits to produce an authorization code.
    pub fn authorize_url(&self) -> Result<(Url, CsrfToken)> {
        oauth::authorize_url(&self.config.key_pair, &self.config.base_url)
    }

    /// Exchanges an authorization code for a token and stores it, replacing any
    /// previous token.
    #[instrument(skip(self, code))]
    pub async fn authorize_with_code(&self, code: impl Into<String>) -> Result<Token> {
        let mut cached = self.token.lock().await;
        let token = self.exchange_code(code.into()).await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Forces a refresh of the stored token.
    #[instrument(skip(self))]
    pub async fn refresh_access_token(&self) -> Result<Token> {
        let mut cached = self.token.lock().await;
        let current = match cached.take() {
            Some(token) => token,
            None => self.load_stored().await?.ok_or(Error::NoToken)?,
        };
        let token = self.renew(&current).await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Returns a valid access token, acquiring or refreshing one if needed.
    #[instrument(skip(self))]
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        let token = match cached.take() {
            Some(token) => token,
            None => match self.load_stored().await? {
                Some(token) => token,
                None => {
                    info!("no stored token");
                    self.token_from_user().await?
                }
            },
        };

        let token = if token.is_expired() {
            debug!(expires_at = token.expires_at(), "token expired, refreshing");
            self.renew(&token).await?
        } else {
            token
        };

        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Returns true if there is no usable token or the current one has expired.
    pub async fn is_token_expired(&self) -> Result<bool> {
        let cached = self.token.lock().await;
        let token = match cached.as_ref() {
            Some(token) => Some(token.clone()),
            None => self.load_stored().await?,
        };
        Ok(token.is_none_or(|t| t.is_expired()))
    }

    async fn renew(&self, old: &Token) -> Result<Token> {
        let refreshed = oauth::exchange_refresh_token(
            &self.config.key_pair,
            &self.config.base_url,
            &self.token_http_client,
            &old.refresh_token,
        )
        .await;

        match refreshed {
            Ok(token) => {
                self.replace_stored(&token).await?;
                Ok(token)
            }
            Err(e) if self.code_source.is_some() => {
                warn!("refreshing the token failed, asking for a new authorization code: {e}");
                self.token_from_user().await
            }
            Err(e) => Err(e),
        }
    }

    async fn token_from_user(&self) -> Result<Token> {
        let Some(source) = self.code_source.clone() else {
            return Err(Error::NoToken);
        };
        let code = tokio::task::spawn_blocking(move || source())
            .await
            .map_err(|e| Error::CodePrompt(e.to_string()))??;
        self.exchange_code(code).await
    }

    async fn exchange_code(&self, code: String) -> Result<Token> {
        let token = oauth::exchange_authorization_code(
            &self.config.key_pair,
            &self.config.base_url,
            &self.token_http_client,
            code,
        )
        .await?;
        self.replace_stored(&token).await?;
        Ok(token)
    }

    /// Stores may touch the filesystem, so they run off the async workers.
    async fn load_stored(&self) -> Result<Option<Token>> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(|e| Error::TokenStore(e.to_string()))?
    }

    async fn replace_stored(&self, token: &Token) -> Result<()> {
        let store = Arc::clone(&self.store);
        let token = token.clone();
        tokio::task::spawn_blocking(move || {
            store.delete()?;
            store.save(&token)
        })
        .await
        .map_err(|e| Error::TokenStore(e.to_string()))?
    }

    /// Perform an authenticated `GET` request against the API.
    #[instrument(skip(self))]
    pub async fn get<R: DeserializeOwned>(
        &self,
        endpoint: FreshBooksEndpoint,
        query: &Query,
    ) -> Result<R> {
        self.send(Method::GET, &endpoint, query, None).await
    }

    /// Perform an authenticated `POST` request against the API.
    #[instrument(skip(self, data))]
    pub async fn post<R: DeserializeOwned, T: Serialize + fmt::Debug>(
        &self,
        endpoint: FreshBooksEndpoint,
        data: &T,
    ) -> Result<R> {
        let body = serde_json::to_value(data)?;
        trace!(json = %body, "POST body");
        self.send(Method::POST, &endpoint, &Query::new(), Some(body))
            .await
    }

    /// Perform an authenticated `PUT` request against the API.
    ///
    /// The payments API has no `PUT` operations, so those endpoints are rejected.
    #[instrument(skip(self, data))]
    pub async fn put<R: DeserializeOwned, T: Serialize + fmt::Debug>(
        &self,
        endpoint: FreshBooksEndpoint,
        data: &T,
    ) -> Result<R> {
        if endpoint.resource() == Resource::Payments {
            return Err(Error::InvalidEndpoint);
        }
        let body = serde_json::to_value(data)?;
        trace!(json = %body, "PUT body");
        self.send(Method::PUT, &endpoint, &Query::new(), Some(body))
            .await
    }

    /// Sends a request, retrying on rate limits and once after an authorization failure.
    async fn send<R: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &FreshBooksEndpoint,
        query: &Query,
        body: Option<Value>,
    ) -> Result<R> {
        let url = endpoint.to_url(&self.config.base_url, &self.config.account_id)?;
        let entity = endpoint.resource().entity_name();
        let mut rate_limited = 0;
        let mut refreshed = false;

        loop {
            let result = self
                .send_once(method.clone(), &url, query, body.as_ref(), entity)
                .await;

            match result {
                Err(Error::RateLimitExceeded { retry_after, .. })
                    if rate_limited < MAX_RETRY_ATTEMPTS =>
                {
                    rate_limited += 1;
                    let wait_time = retry_after.unwrap_or(DEFAULT_RETRY_AFTER);
                    warn!(
                        "Rate limit exceeded (attempt {}/{}), waiting for {:?} before retrying",
                        rate_limited, MAX_RETRY_ATTEMPTS, wait_time
                    );
                    sleep(wait_time).await;
                }
                Err(Error::Unauthorized { .. }) if !refreshed => {
                    warn!("access token rejected, refreshing and retrying once");
                    refreshed = true;
                    self.refresh_access_token().await?;
                }
                result => return result,
            }
        }
    }

    async fn send_once<R: DeserializeOwned>(
        &self,
        method: Method,
        url: &Url,
        query: &Query,
        body: Option<&Value>,
        entity: &str,
    ) -> Result<R> {
        let access_token = self.access_token().await?;
        trace!(%method, %url, ?query, "making request");

        let mut request = self
            .http_client
            .request(method, url.clone())
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/json");
        if !query.is_empty() {
            request = request.query(query.pairs());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        Self::handle_response(response, entity).await
    }

    #[instrument(skip(response))]
    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
        entity: &str,
    ) -> Result<T> {
        let status = response.status();
        let url = response.url().to_string();
        debug!("Response from {}: status={}, entity={}", url, status, entity);

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            warn!("Rate limit exceeded for {}: retry_after={:?}", url, retry_after);
            let text = response.text().await.unwrap_or_default();
            return Err(Error::RateLimitExceeded {
                retry_after,
                status_code: status,
                url,
                response_body: Some(text),
            });
        }

        let text = response.text().await?;
        debug!("Response body size: {} bytes", text.len());
        trace!("Response text:\n{}", text);

        match status {
            status if status.is_success() => normalize_response(&url, &text),
            StatusCode::NOT_FOUND => Err(Error::NotFound {
                entity: entity.to_string(),
                url,
                status_code: status,
                response_body: Some(text),
            }),
            StatusCode::UNAUTHORIZED => Err(Error::Unauthorized {
                url,
                response_body: Some(text),
            }),
            status => {
                error!("Unexpected status code: {}", status);
                match parse_error_envelope(&text) {
                    Some(errors) => Err(Error::Api(errors)),
                    None => Err(Error::UnexpectedStatus {
                        status_code: status,
                        url,
                        response_body: Some(text),
                    }),
                }
            }
        }
    }

    /// Access the clients API
    #[must_use]
    pub fn clients(&self) -> ClientsApi<'_> {
        ClientsApi { client: self }
    }

    /// Access the invoices API
    #[must_use]
    pub fn invoices(&self) -> InvoicesApi<'_> {
        InvoicesApi { client: self }
    }

    /// Access the payments API
    #[must_use]
    pub fn payments(&self) -> PaymentsApi<'_> {
        PaymentsApi { client: self }
    }
}

fn terminal_code_source() -> CodeSource {
    Arc::new(|| oauth::prompt_for_authorization_code(std::io::stdin().lock(), std::io::stdout()))
}

/// Unwraps the `{"response": {"result": ...}}` envelope.
///
/// Bodies without a `response` key (the payments API) are decoded as they are.
fn normalize_response<T: DeserializeOwned>(url: &str, text: &str) -> Result<T> {
    let value: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(text)
            .map_err(|e| Error::DeserializationError(e, Some(text.to_string())))?
    };

    let payload = match value {
        Value::Object(mut body) => match body.remove("response") {
            Some(Value::Object(mut response)) => match response.remove("result") {
                Some(result) => result,
                None => {
                    return Err(match parse_error_value(Value::Object(response)) {
                        Some(errors) => Error::Api(errors),
                        None => Error::UnexpectedResponse {
                            url: url.to_string(),
                            body: text.to_string(),
                        },
                    });
                }
            },
            Some(other) => {
                body.insert("response".to_string(), other);
                Value::Object(body)
            }
            None => Value::Object(body),
        },
        other => other,
    };

    serde_json::from_value(payload).map_err(|e| {
        error!("Failed to deserialize response from {}: {}", url, e);
        Error::DeserializationError(e, Some(text.to_string()))
    })
}

fn parse_error_envelope(text: &str) -> Option<ErrorResponse> {
    let mut value: Value = serde_json::from_str(text).ok()?;
    match value.get_mut("response").map(Value::take) {
        Some(response) => parse_error_value(response),
        None => parse_error_value(value),
    }
}

fn parse_error_value(value: Value) -> Option<ErrorResponse> {
    serde_json::from_value::<ErrorResponse>(value)
        .ok()
        .filter(|e| !e.errors.is_empty())
}

/// API handler for client (customer) endpoints
#[derive(Debug)]
pub struct ClientsApi<'a> {
    client: &'a Client,
}

impl ClientsApi<'_> {
    /// Retrieve every client, with contacts
    pub async fn list(&self) -> Result<Vec<FreshBooksClient>> {
        fb_client::list(self.client).await
    }

    /// Retrieve a single client by id
    pub async fn get(&self, client_id: i64) -> Result<FreshBooksClient> {
        fb_client::get(self.client, client_id).await
    }

    /// Find the client with this email address
    pub async fn get_by_email(&self, email: &str) -> Result<FreshBooksClient> {
        fb_client::get_by_email(self.client, email).await
    }

    /// Find the client whose organization name matches
    pub async fn get_by_org_name(&self, org_name: &str) -> Result<FreshBooksClient> {
        fb_client::get_by_org_name(self.client, org_name).await
    }

    /// Create a client and return it as stored by FreshBooks
    pub async fn create(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        organization: &str,
    ) -> Result<FreshBooksClient> {
        fb_client::create(self.client, first_name, last_name, email, organization).await
    }

    pub async fn delete(&self, client_id: i64) -> Result<()> {
        fb_client::delete(self.client, client_id).await
    }

    /// Add contacts, replacing existing ones with the same email
    pub async fn add_contacts(&self, client_id: i64, contacts: &[NewContact]) -> Result<()> {
        fb_client::add_contacts(self.client, client_id, contacts).await
    }

    pub async fn delete_contact(&self, client_id: i64, email: &str) -> Result<()> {
        fb_client::delete_contact(self.client, client_id, email).await
    }

    pub async fn update_contacts(&self, client_id: i64, contacts: &[NewContact]) -> Result<()> {
        fb_client::update_contacts(self.client, client_id, contacts).await
    }
}

/// API handler for invoice endpoints
#[derive(Debug)]
pub struct InvoicesApi<'a> {
    client: &'a Client,
}

impl InvoicesApi<'_> {
    /// List invoices matching the parameters
    pub async fn list(&self, parameters: ListParameters) -> Result<Vec<Invoice>> {
        invoice::list(self.client, &parameters).await
    }

    /// Get a single invoice by id
    pub async fn get(&self, invoice_id: i64) -> Result<Invoice> {
        invoice::get(self.client, invoice_id).await
    }

    pub async fn get_all_draft(&self) -> Result<Vec<Invoice>> {
        self.list(ListParameters::default().with_status(invoice::Status::Draft))
            .await
    }

    pub async fn get_all_for_org_name(&self, org_name: &str) -> Result<Vec<Invoice>> {
        self.list(ListParameters::for_org_name(org_name)).await
    }

    pub async fn get_all_for_client_id(&self, client_id: i64) -> Result<Vec<Invoice>> {
        self.list(ListParameters::for_client_id(client_id)).await
    }

    pub async fn get_draft_for_client_id(&self, client_id: i64) -> Result<Vec<Invoice>> {
        self.list(ListParameters::for_client_id(client_id).with_status(invoice::Status::Draft))
            .await
    }

    /// Create a new invoice
    pub async fn create(&self, builder: &InvoiceBuilder) -> Result<Invoice> {
        invoice::create(self.client, builder).await
    }

    /// Update fields of an invoice; `fields` is sent as the `invoice` object
    pub async fn update<T: Serialize + fmt::Debug>(
        &self,
        invoice_id: i64,
        fields: &T,
    ) -> Result<Invoice> {
        invoice::update(self.client, invoice_id, fields).await
    }

    pub async fn delete(&self, invoice_id: i64) -> Result<Invoice> {
        invoice::delete(self.client, invoice_id).await
    }

    /// Email the invoice to its contacts
    pub async fn send(&self, invoice_id: i64) -> Result<Invoice> {
        invoice::send(self.client, invoice_id).await
    }
}

/// API handler for payment endpoints
#[derive(Debug)]
pub struct PaymentsApi<'a> {
    client: &'a Client,
}

impl PaymentsApi<'_> {
    pub async fn get_default_payment_options(&self) -> Result<PaymentOptions> {
        payment::get_default_payment_options(self.client).await
    }

    /// Enable an online payment gateway on an invoice
    pub async fn add_payment_option_to_invoice(
        &self,
        invoice_id: i64,
        gateway_name: Option<&str>,
    ) -> Result<PaymentOptions> {
        payment::add_payment_option_to_invoice(self.client, invoice_id, gateway_name).await
    }
}
