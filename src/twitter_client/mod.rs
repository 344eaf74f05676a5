pub mod api;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use hyper::client::HttpConnector;
use hyper::header::HeaderMap;
use hyper::{Body, Client, Method, Request, StatusCode};
use hyper_tls::HttpsConnector;
use log::{debug, trace};
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AccessToken, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use std::fmt;
use std::fs;
use thiserror::Error;
use url::Url;

const ACCESS_TOKEN_PATH: &str = "./var/.access_token";

/// Which side of the followship an endpoint serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    Followers,
    Friends,
}

impl Relation {
    // Twitter's v2 endpoints call friends "following"
    fn endpoint(self) -> &'static str {
        match self {
            Relation::Followers => "followers",
            Relation::Friends => "following",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Followers => write!(f, "followers"),
            Relation::Friends => write!(f, "friends"),
        }
    }
}

/// API failure as seen by the rest of the tool; transport details stay here.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("rate limit exceeded, window resets at {reset}")]
    RateLimited { reset: DateTime<Utc> },
    #[error("twitter api returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone)]
pub struct TwitterClient {
    https_client: Client<HttpsConnector<HttpConnector>>,
    twitter_client_id: String,
    twitter_client_secret: String,
    access_token: Option<AccessToken>,
}

impl TwitterClient {
    pub fn new(twitter_client_id: &str, twitter_client_secret: &str) -> Self {
        let https = HttpsConnector::new();
        let https_client = Client::builder().build::<_, hyper::Body>(https);
        Self {
            https_client,
            twitter_client_id: twitter_client_id.to_string(),
            twitter_client_secret: twitter_client_secret.to_string(),
            access_token: None,
        }
    }

    pub fn save_access_token(&self) -> Result<()> {
        let access_token = self
            .access_token
            .as_ref()
            .ok_or(anyhow!("No token to save"))?;
        let access_token = serde_json::to_string(&access_token)?;
        fs::create_dir_all("./var")?;
        fs::write(ACCESS_TOKEN_PATH, access_token)?;
        Ok(())
    }

    pub fn load_access_token(&mut self) -> Result<()> {
        let access_token = fs::read_to_string(ACCESS_TOKEN_PATH)
            .with_context(|| format!("unable to read '{ACCESS_TOKEN_PATH}'"))?;
        let access_token = serde_json::from_str(&access_token)?;
        self.access_token = Some(access_token);
        Ok(())
    }

    pub async fn authorize(&mut self) -> Result<()> {
        let oauth_client = BasicClient::new(
            ClientId::new(self.twitter_client_id.clone()),
            Some(ClientSecret::new(self.twitter_client_secret.clone())),
            AuthUrl::new("https://twitter.com/i/oauth2/authorize".to_string())?,
            Some(TokenUrl::new(
                "https://api.twitter.com/2/oauth2/token".to_string(),
            )?),
        )
        .set_redirect_uri(RedirectUrl::new("https://localhost:8080".to_string())?);
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, _csrf_token) = oauth_client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("tweet.read".to_string()))
            .add_scope(Scope::new("users.read".to_string()))
            .add_scope(Scope::new("follows.read".to_string()))
            .add_scope(Scope::new("offline.access".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        // User browses here to complete OAuth flow
        println!("Browse to: {auth_url}");

        let mut callback_url = String::new();
        println!("Enter callback url:");
        std::io::stdin().read_line(&mut callback_url)?;
        let callback_url = Url::parse(&callback_url)?;

        let mut expected_csrf_state = None;
        let mut authorization_code = None;

        for (key, value) in callback_url.query_pairs() {
            if key == "state" {
                expected_csrf_state = Some(String::from(value));
            } else if key == "code" {
                authorization_code = Some(String::from(value));
            }
        }

        let _expected_csrf_state =
            expected_csrf_state.ok_or(anyhow!("Missing `state` param from callback"))?;
        let authorization_code =
            authorization_code.ok_or(anyhow!("Missing `code` param from callback"))?;

        let token_result = oauth_client
            .exchange_code(AuthorizationCode::new(authorization_code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(async_http_client)
            .await?;

        self.access_token = Some(token_result.access_token().clone());
        Ok(())
    }

    async fn get(&self, uri: String) -> Result<hyper::body::Bytes> {
        let access_token = self.access_token.as_ref().ok_or(anyhow!("Unauthorized"))?;
        trace!("GET {uri}");
        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", access_token.secret()))
            .body(Body::empty())?;

        let resp = self.https_client.request(req).await?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let reset = rate_limit_reset(resp.headers());
            return Err(ApiError::RateLimited { reset }.into());
        }
        let body = hyper::body::to_bytes(resp.into_body()).await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }
            .into());
        }
        Ok(body)
    }

    pub async fn user_by_username(&self, screen_name: &str) -> Result<api::User> {
        let uri = format!("https://api.twitter.com/2/users/by/username/{screen_name}");
        let resp = self.get(uri).await?;
        let resp: api::Response<api::User, ()> = serde_json::from_slice(&resp)?;
        resp.data
            .ok_or_else(|| anyhow!("No such user '{screen_name}'"))
    }

    pub async fn relation_page(
        &self,
        relation: Relation,
        user_id: &str,
        pagination_token: Option<&String>,
    ) -> Result<(Vec<api::User>, Option<String>)> {
        let mut uri = Url::parse(&format!(
            "https://api.twitter.com/2/users/{user_id}/{}",
            relation.endpoint()
        ))?;

        uri.query_pairs_mut()
            .append_pair("max_results", "1000")
            .append_pair("user.fields", "username");

        if let Some(pagination_token) = pagination_token {
            uri.query_pairs_mut()
                .append_pair("pagination_token", pagination_token);
        }

        let resp = self.get(uri.to_string()).await?;
        let resp: api::Response<Vec<api::User>, ()> = serde_json::from_slice(&resp)?;

        let users = resp.data.unwrap_or_default();
        let next_pagination_token = resp.meta.and_then(|meta| meta.next_token);
        debug!(
            "fetched one {relation} page for user {user_id} ({} users)",
            users.len()
        );

        Ok((users, next_pagination_token))
    }
}

fn rate_limit_reset(headers: &HeaderMap) -> DateTime<Utc> {
    headers
        .get("x-rate-limit-reset")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        // header missing or garbled: assume a full 15-minute window
        .unwrap_or_else(|| Utc::now() + Duration::minutes(15))
}
