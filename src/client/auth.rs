// File: ./src/client/auth.rs
//! OAuth2 credential handling for the Tasks API.
//!
//! Credentials come from two files under the data directory:
//! `credentials.json` (the OAuth client downloaded from the Google Cloud
//! console) and `token.json` (the access/refresh token pair written after
//! `gsync auth`). Tokens refresh transparently; only the first authorization
//! is interactive.
use crate::client::core::{HttpClient, build_http_client};
use crate::context::{AppContext, SharedContext};
use crate::storage::LocalStorage;
use anyhow::{Context as _, Result, anyhow, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use http::Request;
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::{Arc, Mutex};

pub const TASKS_SCOPE: &str = "https://www.googleapis.com/auth/tasks";
const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

// --- Client secrets ---

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// The Google console wraps desktop-app secrets in an `installed` object.
#[derive(Deserialize)]
struct InstalledWrapper {
    installed: ClientSecrets,
}

impl ClientSecrets {
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx
            .get_credentials_path()
            .ok_or_else(|| anyhow!("Could not determine credentials path"))?;
        if !path.exists() {
            bail!(
                "Credentials file not found at '{}'.\n\
                 Download an OAuth client id (Desktop app) from the Google Cloud \
                 console and save it there.",
                path.display()
            );
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read credentials file '{}'", path.display()))?;

        if let Ok(wrapped) = serde_json::from_str::<InstalledWrapper>(&raw) {
            return Ok(wrapped.installed);
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse credentials file '{}'", path.display()))
    }
}

// --- Stored token ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
}

impl StoredToken {
    /// Expired (with a one minute skew margin so a token never dies mid-pass).
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now + Duration::seconds(60)
    }

    pub fn load(ctx: &dyn AppContext) -> Option<Self> {
        let path = ctx.get_token_path()?;
        if !path.exists() {
            return None;
        }
        LocalStorage::with_lock(&path, || Ok(fs::read_to_string(&path)?))
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    pub fn save(&self, ctx: &dyn AppContext) -> Result<()> {
        let path = ctx
            .get_token_path()
            .ok_or_else(|| anyhow!("Could not determine token path"))?;
        LocalStorage::with_lock(&path, || {
            let json = serde_json::to_string_pretty(self)?;
            LocalStorage::atomic_write(&path, json)?;
            Ok(())
        })
    }
}

/// Wire format of the OAuth token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

// --- Authenticator ---

#[derive(Clone, Debug)]
pub struct Authenticator {
    ctx: SharedContext,
    secrets: ClientSecrets,
    token_uri: String,
    http: HttpClient,
    // In-memory copy so a pass does not re-read token.json per request.
    token: Arc<Mutex<Option<StoredToken>>>,
}

impl Authenticator {
    pub fn new(ctx: SharedContext, secrets: ClientSecrets, auth_base_url: &str) -> Result<Self> {
        let token_uri = secrets
            .token_uri
            .clone()
            .unwrap_or_else(|| format!("{}/token", auth_base_url.trim_end_matches('/')));
        let http = build_http_client().map_err(anyhow::Error::msg)?;
        Ok(Self {
            ctx,
            secrets,
            token_uri,
            http,
            token: Arc::new(Mutex::new(None)),
        })
    }

    /// The consent URL the user opens during `gsync auth`.
    pub fn authorize_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            AUTH_ENDPOINT,
            self.secrets.client_id,
            REDIRECT_URI.replace(':', "%3A"),
            TASKS_SCOPE.replace(':', "%3A").replace('/', "%2F"),
        )
    }

    /// Return a valid access token, refreshing and persisting when needed.
    pub async fn ensure_token(&self) -> Result<String> {
        let cached = self.token.lock().unwrap().clone();
        let current = cached.or_else(|| StoredToken::load(self.ctx.as_ref()));

        if let Some(token) = &current
            && !token.is_expired(Utc::now())
        {
            *self.token.lock().unwrap() = Some(token.clone());
            return Ok(token.access_token.clone());
        }

        let refresh = current
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .ok_or_else(|| {
                anyhow!("No usable Google Tasks token. Run `gsync auth` to authorize this machine.")
            })?;

        log::info!("Access token expired; refreshing");
        let body = format!("grant_type=refresh_token&refresh_token={}", refresh);
        let refreshed = self.token_request(&body, Some(refresh.clone())).await?;
        refreshed.save(self.ctx.as_ref())?;

        let access = refreshed.access_token.clone();
        *self.token.lock().unwrap() = Some(refreshed);
        Ok(access)
    }

    /// Exchange a pasted authorization code for a token pair and persist it.
    pub async fn exchange_code(&self, code: &str) -> Result<StoredToken> {
        let body = format!(
            "grant_type=authorization_code&code={}&redirect_uri={}",
            code.trim(),
            REDIRECT_URI.replace(':', "%3A"),
        );
        let token = self.token_request(&body, None).await?;
        token.save(self.ctx.as_ref())?;
        *self.token.lock().unwrap() = Some(token.clone());
        Ok(token)
    }

    async fn token_request(
        &self,
        form_body: &str,
        fallback_refresh: Option<String>,
    ) -> Result<StoredToken> {
        // Client id/secret go in an HTTP Basic header (RFC 6749 §2.3.1).
        let basic = STANDARD.encode(format!(
            "{}:{}",
            self.secrets.client_id, self.secrets.client_secret
        ));
        let req = Request::builder()
            .method("POST")
            .uri(self.token_uri.clone())
            .header(
                http::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .header(http::header::AUTHORIZATION, format!("Basic {}", basic))
            .body(form_body.to_string())?;

        let resp = self
            .http
            .request(req)
            .await
            .map_err(|e| anyhow!("Token endpoint unreachable: {}", e))?;
        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| anyhow!("Failed to read token response: {}", e))?
            .to_bytes();

        if !status.is_success() {
            bail!(
                "Token endpoint returned HTTP {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(&bytes)
            );
        }

        let parsed: TokenResponse =
            serde_json::from_slice(&bytes).context("Failed to parse token response")?;
        Ok(StoredToken {
            access_token: parsed.access_token,
            // The refresh grant usually omits the refresh token; keep the
            // one we already have.
            refresh_token: parsed.refresh_token.or(fallback_refresh),
            expiry: Utc::now() + Duration::seconds(parsed.expires_in.max(0)),
        })
    }
}
