use std::io::{BufRead, Write};
use std::time::Duration;

use oauth2::{
    basic::BasicTokenIntrospectionResponse, AuthType, AuthorizationCode, CsrfToken,
    EndpointNotSet, EndpointSet, RefreshToken, StandardRevocableToken,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, OAuth2ErrorResponse, Result};
use crate::token::Token;

pub const FRESHBOOKS_AUTH_URL: &str = "https://auth.freshbooks.com/oauth/authorize";
/// Path of the token endpoint relative to the API host.
pub const TOKEN_PATH: &str = "/auth/oauth/token";
/// Page where a user can generate an authorization code for their app.
pub const DEVELOPER_PAGE_URL: &str = "https://my.freshbooks.com/#/developer";

/// Stores the OAuth 2 client ID, client secret and registered redirect URI.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub(crate) client_id: oauth2::ClientId,
    pub(crate) client_secret: oauth2::ClientSecret,
    pub(crate) redirect_uri: oauth2::RedirectUrl,
}

impl KeyPair {
    pub fn new(client_id: String, client_secret: String, redirect_uri: &str) -> Result<Self> {
        Ok(Self {
            client_id: oauth2::ClientId::new(client_id),
            client_secret: oauth2::ClientSecret::new(client_secret),
            redirect_uri: oauth2::RedirectUrl::new(redirect_uri.to_string())
                .map_err(|e| Error::InvalidConfig(format!("redirect uri {redirect_uri:?}: {e}")))?,
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        self.client_id.as_str()
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        self.redirect_uri.as_str()
    }
}

pub type OAuthClient = oauth2::Client<
    OAuth2ErrorResponse,
    TokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    OAuth2ErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// The token type string (`Bearer`) as FreshBooks spells it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenType(pub String);

impl oauth2::TokenType for TokenType {}

/// Body of a successful token endpoint response.
///
/// FreshBooks also sends a `direct_buy_tokens` object which is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub(crate) access_token: oauth2::AccessToken,
    pub(crate) token_type: TokenType,
    pub(crate) expires_in: u64,
    pub(crate) refresh_token: Option<RefreshToken>,
    pub(crate) scope: Option<String>,
    pub(crate) created_at: Option<i64>,
}

impl oauth2::TokenResponse for TokenResponse {
    type TokenType = TokenType;

    fn access_token(&self) -> &oauth2::AccessToken {
        &self.access_token
    }

    fn token_type(&self) -> &TokenType {
        &self.token_type
    }

    fn expires_in(&self) -> Option<Duration> {
        Some(Duration::from_secs(self.expires_in))
    }

    fn refresh_token(&self) -> Option<&RefreshToken> {
        self.refresh_token.as_ref()
    }

    fn scopes(&self) -> Option<&Vec<oauth2::Scope>> {
        None
    }
}

#[instrument(skip(key_pair))]
pub(crate) fn build_oauth_client(key_pair: &KeyPair, base_url: &Url) -> Result<OAuthClient> {
    let token_url = base_url.join(TOKEN_PATH).map_err(|_| Error::InvalidEndpoint)?;
    let auth_url =
        oauth2::AuthUrl::new(FRESHBOOKS_AUTH_URL.to_string()).map_err(|_| Error::InvalidEndpoint)?;

    Ok(oauth2::Client::new(key_pair.client_id.clone())
        .set_client_secret(key_pair.client_secret.clone())
        .set_auth_uri(auth_url)
        .set_token_uri(oauth2::TokenUrl::from_url(token_url))
        .set_redirect_uri(key_pair.redirect_uri.clone())
        .set_auth_type(AuthType::RequestBody))
}

/// The token endpoint must not follow redirects.
pub(crate) fn build_token_http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

/// Generates the URL a user visits to grant this app access.
#[instrument(skip(key_pair))]
pub fn authorize_url(key_pair: &KeyPair, base_url: &Url) -> Result<(Url, CsrfToken)> {
    Ok(build_oauth_client(key_pair, base_url)?
        .authorize_url(CsrfToken::new_random)
        .url())
}

/// Exchanges an authorization code for a token.
#[instrument(skip(key_pair, http_client, code))]
pub(crate) async fn exchange_authorization_code(
    key_pair: &KeyPair,
    base_url: &Url,
    http_client: &reqwest::Client,
    code: String,
) -> Result<Token> {
    let response = build_oauth_client(key_pair, base_url)?
        .exchange_code(AuthorizationCode::new(code))
        .request_async(http_client)
        .await?;
    debug!("exchanged authorization code for token");
    Ok(Token::from_response(response))
}

/// Trades a refresh token for a fresh token.
#[instrument(skip_all)]
pub(crate) async fn exchange_refresh_token(
    key_pair: &KeyPair,
    base_url: &Url,
    http_client: &reqwest::Client,
    refresh_token: &str,
) -> Result<Token> {
    let refresh_token = RefreshToken::new(refresh_token.to_string());
    let response = build_oauth_client(key_pair, base_url)?
        .exchange_refresh_token(&refresh_token)
        .add_extra_param("redirect_uri", key_pair.redirect_uri.as_str().to_owned())
        .request_async(http_client)
        .await?;
    debug!("refreshed access token");
    Ok(Token::from_response(response))
}

/// Asks the user for an authorization code on `writer` and reads it from `reader`.
pub fn prompt_for_authorization_code<R: BufRead, W: Write>(
    mut reader: R,
    mut writer: W,
) -> Result<String> {
    write!(
        writer,
        "Please go here and get an auth code: {DEVELOPER_PAGE_URL}, then enter it here: "
    )
    .and_then(|()| writer.flush())
    .map_err(|e| Error::CodePrompt(e.to_string()))?;

    let mut line = String::new();
    reader
        .read_line(&mut line)
        .map_err(|e| Error::CodePrompt(e.to_string()))?;

    let code = line.trim();
    if code.is_empty() {
        return Err(Error::CodePrompt("no code entered".to_string()));
    }
    Ok(code.to_string())
}
