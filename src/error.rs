use std::fmt;
use std::time::Duration;

use miette::Diagnostic;
use oauth2::HttpClientError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the FreshBooks token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

impl oauth2::ErrorResponse for OAuth2ErrorResponse {}

impl fmt::Display for OAuth2ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {description}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

pub type OAuth2RequestError =
    oauth2::RequestTokenError<HttpClientError<reqwest::Error>, OAuth2ErrorResponse>;

/// A single entry of the `errors` array FreshBooks returns for rejected requests.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub errno: Option<i64>,
    pub field: Option<String>,
    pub message: String,
    pub object: Option<String>,
    pub value: Option<serde_json::Value>,
}

/// The `response.errors` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub errors: Vec<ApiError>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(|e| match (&e.errno, &e.field) {
                (Some(errno), Some(field)) => format!("[{errno}] {field}: {}", e.message),
                (Some(errno), None) => format!("[{errno}] {}", e.message),
                (None, Some(field)) => format!("{field}: {}", e.message),
                (None, None) => e.message.clone(),
            })
            .collect();
        write!(f, "FreshBooks API Error: {}", messages.join("; "))
    }
}

/// Errors that can occur when interacting with the FreshBooks API.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("error making request: {0:?}")]
    #[diagnostic(
        code(freshbooks_rs::request_error),
        help("Check your network connection and FreshBooks API availability")
    )]
    Request(#[source] reqwest::Error),

    #[error("error decoding response: {0:?}")]
    #[diagnostic(
        code(freshbooks_rs::deserialization_error),
        help("The API returned data in an unexpected format")
    )]
    DeserializationError(#[source] serde_json::Error, Option<String>),

    #[error("could not reshape {entity} record: {record}")]
    #[diagnostic(
        code(freshbooks_rs::invalid_field),
        help("A field in the record did not have the expected type or format")
    )]
    InvalidField {
        entity: String,
        record: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("object not found: {entity} (url: {url})")]
    #[diagnostic(
        code(freshbooks_rs::not_found),
        help("Verify that the {entity} exists and that you have permission to access it")
    )]
    NotFound {
        entity: String,
        url: String,
        status_code: reqwest::StatusCode,
        response_body: Option<String>,
    },

    #[error("endpoint could not be parsed as a URL")]
    #[diagnostic(
        code(freshbooks_rs::invalid_endpoint),
        help("Check that the base URL and account id form a valid URL")
    )]
    InvalidEndpoint,

    /// A request rejected by the API with an `errors` envelope.
    #[error("{0}")]
    #[diagnostic(
        code(freshbooks_rs::api_error),
        help("Review the errors returned by the FreshBooks API")
    )]
    Api(ErrorResponse),

    #[error("response envelope had no result: {body}")]
    #[diagnostic(
        code(freshbooks_rs::unexpected_response),
        help("The API answered successfully but without a `result` object")
    )]
    UnexpectedResponse { url: String, body: String },

    #[error("unexpected status {status_code} from {url}")]
    #[diagnostic(
        code(freshbooks_rs::unexpected_status),
        help("The API returned a status code this client does not handle")
    )]
    UnexpectedStatus {
        status_code: reqwest::StatusCode,
        url: String,
        response_body: Option<String>,
    },

    #[error("unauthorized request to {url}")]
    #[diagnostic(
        code(freshbooks_rs::unauthorized),
        help("The access token was rejected; refresh it or authorize again")
    )]
    Unauthorized {
        url: String,
        response_body: Option<String>,
    },

    /// An error returned during `OAuth2` operations
    #[error("oauth2 error: {0:?}")]
    #[diagnostic(
        code(freshbooks_rs::oauth2_error),
        help("Verify your OAuth2 configuration and credentials")
    )]
    OAuth2(OAuth2RequestError),

    #[error("no oauth token is stored")]
    #[diagnostic(
        code(freshbooks_rs::no_token),
        help("Authorize with an authorization code from https://my.freshbooks.com/#/developer")
    )]
    NoToken,

    #[error("token store error: {0}")]
    #[diagnostic(
        code(freshbooks_rs::token_store),
        help("Check that the token file is readable, writable and contains valid JSON")
    )]
    TokenStore(String),

    #[error("could not read authorization code: {0}")]
    #[diagnostic(
        code(freshbooks_rs::code_prompt),
        help("Paste the authorization code shown on the FreshBooks developer page")
    )]
    CodePrompt(String),

    #[error("missing configuration variable {0}")]
    #[diagnostic(
        code(freshbooks_rs::missing_config),
        help("Set the variable in the environment or in a .env file")
    )]
    MissingConfig(String),

    #[error("invalid argument: {0}")]
    #[diagnostic(code(freshbooks_rs::invalid_argument))]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    #[diagnostic(code(freshbooks_rs::invalid_config))]
    InvalidConfig(String),

    /// Rate limit exceeded (HTTP 429 Too Many Requests)
    #[error("rate limit exceeded: retry after {retry_after:?}")]
    #[diagnostic(
        code(freshbooks_rs::rate_limit_exceeded),
        help("The FreshBooks API rate limit has been exceeded. Wait and retry.")
    )]
    RateLimitExceeded {
        retry_after: Option<Duration>,
        status_code: reqwest::StatusCode,
        url: String,
        response_body: Option<String>,
    },
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Request(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::DeserializationError(e, None)
    }
}

impl From<OAuth2RequestError> for Error {
    fn from(e: OAuth2RequestError) -> Self {
        Self::OAuth2(e)
    }
}

impl From<ErrorResponse> for Error {
    fn from(response: ErrorResponse) -> Self {
        Self::Api(response)
    }
}

/// Type alias for results from this crate.
pub type Result<O> = std::result::Result<O, Error>;
