// src/client/session.rs

//! Broker session: authorize, submit, poll
//!
//! A session logs in with Basic credentials, keeps the returned cookie fresh,
//! submits one export payload and polls its job until the broker reports
//! completion.

use crate::error::{Error, Result};
use crate::export::ExportComponents;
use crate::http::{METADATA_TIMEOUT, RetryClient};
use crate::job::{Job, JobId};
use crate::registry::{URI_BASE, URI_COMPONENTS};
use crate::token::{SESSION_COOKIE, decode_claims};
use crate::version::VersionInfo;
use chrono::{DateTime, Utc};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Response, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

/// Pause between two polls
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls before giving up on a job (about one hour)
pub const MAX_POLLS: u32 = 3600;

/// Refresh the cookie once it has less than this left
pub const REFRESH_WINDOW: chrono::Duration = chrono::Duration::seconds(30);

/// Assumed lifetime when the broker's cookie carries no readable expiry
const FALLBACK_TTL: chrono::Duration = chrono::Duration::minutes(5);

/// Log poll progress every this many polls
const POLL_LOG_EVERY: u32 = 30;

/// Polling cadence and limits
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub refresh_window: chrono::Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            max_polls: MAX_POLLS,
            refresh_window: REFRESH_WINDOW,
        }
    }
}

/// The broker's session cookie and when it expires
#[derive(Debug, Clone)]
pub struct SessionCredential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionCredential {
    /// Parse a `Set-Cookie` value, if it carries the session cookie
    pub fn from_set_cookie(value: &str) -> Option<Self> {
        let mut attributes = value.split(';').map(str::trim);
        let (name, token) = attributes.next()?.split_once('=')?;
        if name != SESSION_COOKIE || token.is_empty() {
            return None;
        }

        let expires_at = attributes
            .filter_map(|attr| attr.split_once('='))
            .find(|(key, _)| key.eq_ignore_ascii_case("expires"))
            .and_then(|(_, date)| DateTime::parse_from_rfc2822(date).ok())
            .map(|date| date.with_timezone(&Utc))
            .or_else(|| decode_claims(token).and_then(|claims| claims.expires_at()))
            .unwrap_or_else(|| Utc::now() + FALLBACK_TTL);

        Some(Self {
            token: token.to_string(),
            expires_at,
        })
    }

    pub fn needs_refresh(&self, window: chrono::Duration) -> bool {
        self.expires_at - Utc::now() < window
    }

    fn cookie_header(&self) -> String {
        format!("{}={}", SESSION_COOKIE, self.token)
    }
}

fn credential_from(response: &Response) -> Option<SessionCredential> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(SessionCredential::from_set_cookie)
}

/// Client side of the broker protocol
pub struct BrokerSession {
    base: String,
    user: String,
    pass: String,
    client: RetryClient,
    options: SessionOptions,
    credential: Option<SessionCredential>,
}

impl BrokerSession {
    /// Session against the broker at `broker_url` (scheme, host, port)
    pub fn new(broker_url: &str, user: &str, pass: &str) -> Result<Self> {
        Ok(Self {
            base: format!("{}{}", broker_url.trim_end_matches('/'), URI_BASE),
            user: user.to_string(),
            pass: pass.to_string(),
            client: RetryClient::new(METADATA_TIMEOUT)?,
            options: SessionOptions::default(),
            credential: None,
        })
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn credential(&self) -> Option<&SessionCredential> {
        self.credential.as_ref()
    }

    /// Liveness check; anything but 200 is an error
    pub async fn check_status(&self) -> Result<()> {
        let url = format!("{}/status", self.base);
        let response = self
            .client
            .send(self.client.inner().get(&url))
            .await
            .map_err(|e| Error::RegistryError(format!("broker status GET {url}: {e}")))?;
        if response.status() != StatusCode::OK {
            return Err(Error::RegistryError(format!(
                "broker status GET {url}: {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Broker version and build
    pub async fn fetch_version(&self) -> Result<VersionInfo> {
        let url = format!("{}/version", self.base);
        let response = self
            .client
            .send(self.client.inner().get(&url))
            .await
            .map_err(|e| Error::RegistryError(format!("broker version GET {url}: {e}")))?;
        if response.status() != StatusCode::OK {
            return Err(Error::RegistryError(format!(
                "broker version GET {url}: {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::ParseError(format!("broker version: {e}")))
    }

    /// Log in with Basic credentials and keep the session cookie
    pub async fn authorize(&mut self) -> Result<()> {
        let url = format!("{}/login", self.base);
        let request = self
            .client
            .inner()
            .get(&url)
            .basic_auth(&self.user, Some(&self.pass));
        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| Error::AuthError(format!("GET {url}: {e}")))?;

        if response.status() != StatusCode::OK {
            return Err(Error::AuthError(format!(
                "login as '{}' at {}: {}",
                self.user,
                self.base,
                response.status()
            )));
        }

        let credential = credential_from(&response).ok_or_else(|| {
            Error::AuthError(format!("no '{SESSION_COOKIE}' cookie in login response"))
        })?;
        debug!("Session valid until {}", credential.expires_at);
        self.credential = Some(credential);
        Ok(())
    }

    /// Renew the session cookie if it expires within the refresh window.
    ///
    /// An expired cookie, or one the broker no longer accepts, is replaced
    /// by logging in again.
    pub async fn refresh_if_needed(&mut self) -> Result<()> {
        let Some(current) = &self.credential else {
            return self.authorize().await;
        };
        if !current.needs_refresh(self.options.refresh_window) {
            return Ok(());
        }
        if current.expires_at <= Utc::now() {
            debug!("Session expired at {}, logging in again", current.expires_at);
            return self.authorize().await;
        }

        let url = format!("{}/refresh", self.base);
        let request = self
            .client
            .inner()
            .get(&url)
            .header(COOKIE, current.cookie_header());
        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| Error::AuthError(format!("GET {url}: {e}")))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("Session rejected by {}, logging in again", self.base);
            return self.authorize().await;
        }
        if response.status() != StatusCode::OK {
            return Err(Error::AuthError(format!(
                "session refresh at {}: {}",
                self.base,
                response.status()
            )));
        }

        let credential = credential_from(&response).ok_or_else(|| {
            Error::AuthError(format!("no '{SESSION_COOKIE}' cookie in refresh response"))
        })?;
        debug!("Session refreshed until {}", credential.expires_at);
        self.credential = Some(credential);
        Ok(())
    }

    fn cookie(&self) -> Result<String> {
        self.credential
            .as_ref()
            .map(SessionCredential::cookie_header)
            .ok_or_else(|| Error::AuthError("not logged in".to_string()))
    }

    /// Submit an export payload; the broker answers with a fresh job at once
    pub async fn submit(&mut self, export: &ExportComponents, repository: &str) -> Result<Job> {
        self.refresh_if_needed().await?;
        let url = format!("{}{}", self.base, URI_COMPONENTS);
        let request = self
            .client
            .inner()
            .post(&url)
            .query(&[("repository", repository)])
            .header(COOKIE, self.cookie()?)
            .json(export);
        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| Error::SubmitError(format!("POST {url}: {e}")))?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SubmitError(format!(
                "POST {url}: {status} {}",
                body.trim()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::SubmitError(format!("malformed job from {url}: {e}")))
    }

    /// Poll a job until it completes or the poll budget runs out
    pub async fn poll(&mut self, id: JobId) -> Result<Job> {
        let url = format!("{}{}", self.base, URI_COMPONENTS);
        for attempt in 1..=self.options.max_polls {
            self.refresh_if_needed().await?;
            let request = self
                .client
                .inner()
                .get(&url)
                .query(&[("uuid", id.to_string())])
                .header(COOKIE, self.cookie()?);
            let response = self
                .client
                .send(request)
                .await
                .map_err(|e| Error::SubmitError(format!("poll of job {id}: {e}")))?;

            match response.status() {
                StatusCode::OK => {}
                StatusCode::NOT_FOUND => {
                    return Err(Error::NotFoundError(format!("job {id} at {}", self.base)));
                }
                status => {
                    return Err(Error::SubmitError(format!("poll of job {id}: {status}")));
                }
            }

            let job: Job = response
                .json()
                .await
                .map_err(|e| Error::SubmitError(format!("malformed job {id}: {e}")))?;
            if job.complete {
                return Ok(job);
            }

            if attempt % POLL_LOG_EVERY == 0 {
                debug!("Job {} still running after {} polls", id, attempt);
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }

        Err(Error::TimeoutError(format!(
            "job {id} did not complete after {} polls",
            self.options.max_polls
        )))
    }

    /// Authorize, submit and wait for the job's messages
    pub async fn replicate(
        &mut self,
        export: &ExportComponents,
        repository: &str,
    ) -> Result<Vec<String>> {
        self.authorize().await?;
        let job = self.submit(export, repository).await?;
        info!(
            "Submitted {} assets for repository '{}' as job {}",
            export.asset_count(),
            repository,
            job.id
        );
        let finished = self.poll(job.id).await?;
        Ok(finished.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_from_cookie_expires() {
        let credential = SessionCredential::from_set_cookie(
            "token=abc.def.ghi; Expires=Fri, 16 Oct 2026 10:00:00 GMT; Path=/; HttpOnly",
        )
        .unwrap();
        assert_eq!(credential.token, "abc.def.ghi");
        assert_eq!(credential.expires_at.to_rfc3339(), "2026-10-16T10:00:00+00:00");
    }

    #[test]
    fn test_other_cookies_ignored() {
        assert!(SessionCredential::from_set_cookie("session=x; Path=/").is_none());
        assert!(SessionCredential::from_set_cookie("token=; Path=/").is_none());
    }

    #[test]
    fn test_needs_refresh() {
        let soon = SessionCredential {
            token: "t".to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(10),
        };
        let later = SessionCredential {
            token: "t".to_string(),
            expires_at: Utc::now() + chrono::Duration::minutes(4),
        };
        assert!(soon.needs_refresh(REFRESH_WINDOW));
        assert!(!later.needs_refresh(REFRESH_WINDOW));
    }

    #[test]
    fn test_base_url() {
        let session = BrokerSession::new("http://relay:8181/", "u", "p").unwrap();
        assert_eq!(session.base, "http://relay:8181/service/rest");
    }
}
