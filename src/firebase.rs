//! Firebase Authentication and Cloud Firestore over their REST APIs.
//!
//! Response parsing and URL building are plain functions so they can be tested without a
//! network; the HTTP clients themselves are behind the `remote` feature.

use serde::Deserialize;

use crate::error::AuthError;
use crate::models::{Credentials, Identity, Timestamp};

const IDENTITY_TOOLKIT: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN: &str = "https://securetoken.googleapis.com/v1/token";
const FIRESTORE: &str = "https://firestore.googleapis.com/v1";

/// Tokens this close to expiry are refreshed before use.
pub const REFRESH_MARGIN_MS: Timestamp = 60 * 1000;
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

pub fn sign_up_url(api_key: &str) -> String {
    format!("{IDENTITY_TOOLKIT}/accounts:signUp?key={api_key}")
}

pub fn sign_in_url(api_key: &str) -> String {
    format!("{IDENTITY_TOOLKIT}/accounts:signInWithPassword?key={api_key}")
}

pub fn refresh_url(api_key: &str) -> String {
    format!("{SECURE_TOKEN}?key={api_key}")
}

/// `users/{uid}` in the project's default database.
pub fn document_url(project_id: &str, uid: &str) -> String {
    format!("{FIRESTORE}/projects/{project_id}/databases/(default)/documents/users/{uid}")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordAuthResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

fn expires_at(expires_in: &str, now: Timestamp) -> Timestamp {
    let secs = expires_in
        .trim()
        .parse::<i64>()
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    now + secs * 1000
}

/// Parses a `signUp`/`signInWithPassword` success body.
pub fn parse_password_auth(
    body: &str,
    fallback_email: &str,
    now: Timestamp,
) -> Result<Identity, AuthError> {
    let resp: PasswordAuthResponse = serde_json::from_str(body)
        .map_err(|err| AuthError::Provider(format!("invalid auth response: {err}")))?;
    let email = if resp.email.is_empty() {
        fallback_email.to_string()
    } else {
        resp.email
    };
    Ok(Identity {
        uid: resp.local_id,
        email,
        credentials: Some(Credentials {
            id_token: resp.id_token,
            refresh_token: resp.refresh_token,
            expires_at: expires_at(&resp.expires_in, now),
        }),
    })
}

/// Parses a secure-token refresh body into fresh credentials for `uid`.
pub fn parse_refresh(body: &str, uid: &str, now: Timestamp) -> Result<Credentials, AuthError> {
    let resp: RefreshResponse = serde_json::from_str(body)
        .map_err(|err| AuthError::Provider(format!("invalid refresh response: {err}")))?;
    if resp.user_id != uid {
        return Err(AuthError::SessionExpired);
    }
    Ok(Credentials {
        id_token: resp.id_token,
        refresh_token: resp.refresh_token,
        expires_at: expires_at(&resp.expires_in, now),
    })
}

/// Maps a non-success auth response to an [`AuthError`].
pub fn auth_error_from_body(status: u16, body: &str) -> AuthError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => {
            AuthError::from_code(&envelope.error.message)
        }
        _ => AuthError::Provider(format!("http {status}")),
    }
}

pub fn needs_refresh(credentials: &Credentials, now: Timestamp) -> bool {
    credentials.expires_at - now <= REFRESH_MARGIN_MS
}

#[cfg(feature = "remote")]
pub use client::{FirebaseAuth, FirestoreDocuments};

#[cfg(feature = "remote")]
mod client {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::StatusCode;

    use super::*;
    use crate::clock::Clock;
    use crate::config::FirebaseConfig;
    use crate::error::StoreError;
    use crate::firestore::{decode_document, encode_document};
    use crate::identity::IdentityProvider;
    use crate::models::TasksDocument;
    use crate::storage::SessionCache;
    use crate::sync::DocumentStore;

    const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

    fn build_client() -> Result<reqwest::Client, String> {
        reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))
    }

    /// Email/password accounts through Firebase Authentication.
    pub struct FirebaseAuth {
        http: reqwest::Client,
        api_key: String,
        clock: Arc<dyn Clock>,
        cache: Option<SessionCache>,
        current: Mutex<Option<Identity>>,
    }

    impl FirebaseAuth {
        pub fn new(
            config: &FirebaseConfig,
            clock: Arc<dyn Clock>,
            cache: Option<SessionCache>,
        ) -> Result<Self, String> {
            Ok(Self {
                http: build_client()?,
                api_key: config.api_key.trim().to_string(),
                clock,
                cache,
                current: Mutex::new(None),
            })
        }

        async fn password_auth(
            &self,
            url: String,
            email: &str,
            password: &str,
        ) -> Result<Identity, AuthError> {
            let email = crate::identity::normalize_credentials(email, password)?;
            let payload = serde_json::json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            });
            let resp = self
                .http
                .post(url)
                .json(&payload)
                .send()
                .await
                .map_err(|err| AuthError::Transport(err.to_string()))?;
            let status = resp.status();
            let text = resp
                .text()
                .await
                .map_err(|err| AuthError::Transport(err.to_string()))?;
            if !status.is_success() {
                return Err(auth_error_from_body(status.as_u16(), &text));
            }
            let identity = parse_password_auth(&text, &email, self.clock.now_ms())?;
            self.remember(&identity);
            Ok(identity)
        }

        async fn refresh(&self, identity: &Identity) -> Result<Identity, AuthError> {
            let Some(credentials) = identity.credentials.as_ref() else {
                return Err(AuthError::SessionExpired);
            };
            let resp = self
                .http
                .post(refresh_url(&self.api_key))
                .form(&[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", credentials.refresh_token.as_str()),
                ])
                .send()
                .await
                .map_err(|err| AuthError::Transport(err.to_string()))?;
            let status = resp.status();
            let text = resp
                .text()
                .await
                .map_err(|err| AuthError::Transport(err.to_string()))?;
            if !status.is_success() {
                return Err(auth_error_from_body(status.as_u16(), &text));
            }
            let credentials = parse_refresh(&text, &identity.uid, self.clock.now_ms())?;
            let refreshed = Identity {
                credentials: Some(credentials),
                ..identity.clone()
            };
            log::debug!("refreshed id token uid={}", refreshed.uid);
            self.remember(&refreshed);
            Ok(refreshed)
        }

        fn remember(&self, identity: &Identity) {
            {
                let mut current = self.current.lock().expect("auth state poisoned");
                *current = Some(identity.clone());
            }
            if let Some(cache) = &self.cache {
                if let Err(err) = cache.save(identity) {
                    log::warn!("failed to save session cache: {err}");
                }
            }
        }

        fn forget(&self) {
            {
                let mut current = self.current.lock().expect("auth state poisoned");
                *current = None;
            }
            if let Some(cache) = &self.cache {
                cache.clear();
            }
        }

        /// A valid ID token for `identity`, refreshing it when close to expiry.
        pub async fn bearer_token(&self, identity: &Identity) -> Result<String, StoreError> {
            let known = {
                let current = self.current.lock().expect("auth state poisoned");
                current
                    .as_ref()
                    .filter(|known| known.uid == identity.uid)
                    .cloned()
            };
            let known = known.unwrap_or_else(|| identity.clone());
            let Some(credentials) = known.credentials.as_ref() else {
                return Err(StoreError::Unauthorized);
            };
            if !needs_refresh(credentials, self.clock.now_ms()) {
                return Ok(credentials.id_token.clone());
            }
            match self.refresh(&known).await {
                Ok(refreshed) => refreshed
                    .credentials
                    .map(|c| c.id_token)
                    .ok_or(StoreError::Unauthorized),
                Err(AuthError::Transport(message)) => Err(StoreError::Transport(message)),
                Err(err) => {
                    log::warn!("token refresh failed uid={}: {err}", identity.uid);
                    Err(StoreError::Unauthorized)
                }
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for FirebaseAuth {
        async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
            self.password_auth(sign_up_url(&self.api_key), email, password)
                .await
        }

        async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
            self.password_auth(sign_in_url(&self.api_key), email, password)
                .await
        }

        async fn sign_out(&self, identity: &Identity) {
            log::info!("signing out uid={}", identity.uid);
            self.forget();
        }

        async fn restore(&self) -> Option<Identity> {
            let cached = self.cache.as_ref()?.load()?;
            let fresh = cached
                .credentials
                .as_ref()
                .is_some_and(|c| !needs_refresh(c, self.clock.now_ms()));
            if fresh {
                self.remember(&cached);
                return Some(cached);
            }
            match self.refresh(&cached).await {
                Ok(identity) => Some(identity),
                Err(AuthError::Transport(message)) => {
                    // Offline at startup: keep the session, the next token use retries.
                    log::warn!("could not refresh cached session: {message}");
                    self.remember(&cached);
                    Some(cached)
                }
                Err(err) => {
                    log::info!("cached session is no longer valid: {err}");
                    self.forget();
                    None
                }
            }
        }
    }

    /// One Firestore document per user at `users/{uid}`, holding `{ tasks: [...] }`.
    pub struct FirestoreDocuments {
        http: reqwest::Client,
        project_id: String,
        auth: Arc<FirebaseAuth>,
    }

    impl FirestoreDocuments {
        pub fn new(config: &FirebaseConfig, auth: Arc<FirebaseAuth>) -> Result<Self, String> {
            Ok(Self {
                http: build_client()?,
                project_id: config.project_id.trim().to_string(),
                auth,
            })
        }
    }

    fn status_error(status: StatusCode, body: String) -> StoreError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized,
            _ => StoreError::Http {
                status: status.as_u16(),
                body,
            },
        }
    }

    #[async_trait]
    impl DocumentStore for FirestoreDocuments {
        async fn read(&self, identity: &Identity) -> Result<Option<TasksDocument>, StoreError> {
            let token = self.auth.bearer_token(identity).await?;
            let resp = self
                .http
                .get(document_url(&self.project_id, &identity.uid))
                .bearer_auth(token)
                .send()
                .await
                .map_err(|err| StoreError::Transport(err.to_string()))?;
            let status = resp.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            let text = resp
                .text()
                .await
                .map_err(|err| StoreError::Transport(err.to_string()))?;
            if !status.is_success() {
                return Err(status_error(status, text));
            }
            let value: serde_json::Value = serde_json::from_str(&text)?;
            decode_document(&value).map(Some)
        }

        async fn write(
            &self,
            identity: &Identity,
            document: &TasksDocument,
        ) -> Result<(), StoreError> {
            let token = self.auth.bearer_token(identity).await?;
            // PATCH without an update mask replaces the whole document.
            let resp = self
                .http
                .patch(document_url(&self.project_id, &identity.uid))
                .bearer_auth(token)
                .json(&encode_document(document))
                .send()
                .await
                .map_err(|err| StoreError::Transport(err.to_string()))?;
            let status = resp.status();
            if status.is_success() {
                return Ok(());
            }
            let text = resp.text().await.unwrap_or_default();
            Err(status_error(status, text))
        }
    }
}
