//! HTTP client for the secondary OAuth/session identity service.
//!
//! An application-level `error` field in a 200 response signals a logical
//! refusal; callers must treat it as a refusal and must not overwrite stored
//! tokens (`spec.md` §4.2).

mod error;

use std::time::Duration;

pub use error::IdentityClientError;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, IdentityClientError>;

#[derive(Clone, derive_more::Debug)]
pub struct IdentityClient {
	http: reqwest::Client,
	base_url: reqwest::Url,
}

#[derive(Debug, Serialize)]
struct RefreshTokenRequest<'a> {
	refresh_token: &'a str,
}

#[derive(derive_more::Debug, Deserialize)]
pub struct RefreshTokenResponse {
	#[debug(skip)]
	#[serde(default)]
	pub access_token: String,
	#[debug(skip)]
	#[serde(default)]
	pub refresh_token: String,
	#[serde(default)]
	pub expires_in: i64,
	#[serde(default)]
	pub scope: String,
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
}

#[derive(Debug, Serialize)]
struct RefreshSessionRequest<'a> {
	session_token: &'a str,
}

#[derive(derive_more::Debug, Deserialize)]
pub struct RefreshSessionResponse {
	#[debug(skip)]
	#[serde(default)]
	pub session_token: String,
	#[debug(skip)]
	#[serde(default)]
	pub identity_token: String,
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
}

#[derive(Debug, Serialize)]
struct TerminateSessionRequest<'a> {
	session_token: &'a str,
}

impl IdentityClient {
	pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
		let http = reqwest::Client::builder()
			.timeout(Duration::from_secs(10))
			.build()?;
		let base_url = reqwest::Url::parse(base_url.as_ref())
			.map_err(|e| IdentityClientError::Protocol {
				status: reqwest::StatusCode::BAD_REQUEST,
				body: format!("invalid identity service base url: {e}"),
			})?;
		Ok(Self { http, base_url })
	}

	fn endpoint(&self, segment: &str) -> reqwest::Url {
		self.base_url
			.join(segment)
			.expect("identity client endpoint segments are static and valid")
	}

	async fn post_json<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
		&self,
		url: reqwest::Url,
		req: &Req,
	) -> Result<Resp> {
		let response = self.http.post(url).json(req).send().await?;
		let status = response.status();
		let bytes = response.bytes().await?;
		if !status.is_success() {
			return Err(IdentityClientError::Protocol {
				status,
				body: String::from_utf8_lossy(&bytes).into_owned(),
			});
		}
		serde_json::from_slice(&bytes).map_err(IdentityClientError::Decode)
	}

	#[tracing::instrument(skip(self, refresh_token))]
	pub async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshTokenResponse> {
		let resp: RefreshTokenResponse = self
			.post_json(self.endpoint("oauth/token/refresh"), &RefreshTokenRequest { refresh_token })
			.await?;
		if let Some(error) = resp.error.clone() {
			return Err(IdentityClientError::LogicalRefusal {
				error,
				error_description: resp.error_description.clone(),
			});
		}
		Ok(resp)
	}

	#[tracing::instrument(skip(self, session_token))]
	pub async fn refresh_session(&self, session_token: &str) -> Result<RefreshSessionResponse> {
		let resp: RefreshSessionResponse = self
			.post_json(self.endpoint("session/refresh"), &RefreshSessionRequest { session_token })
			.await?;
		if let Some(error) = resp.error.clone() {
			return Err(IdentityClientError::LogicalRefusal {
				error,
				error_description: resp.error_description.clone(),
			});
		}
		Ok(resp)
	}

	/// Best-effort; callers must not let a termination failure block local
	/// cleanup (`spec.md` §4.2).
	#[tracing::instrument(skip(self, session_token))]
	pub async fn terminate_session(&self, session_token: &str) -> Result<()> {
		let url = self.endpoint("session/terminate");
		let response = self
			.http
			.post(url)
			.json(&TerminateSessionRequest { session_token })
			.send()
			.await?;
		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(IdentityClientError::Protocol { status, body });
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use serde_json::json;
	use wiremock::matchers::{method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	#[tokio::test]
	async fn refresh_token_success() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/oauth/token/refresh"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"access_token": "new-access",
				"refresh_token": "new-refresh",
				"expires_in": 3600,
				"scope": "profile",
			})))
			.mount(&server)
			.await;

		let client = IdentityClient::new(format!("{}/", server.uri())).unwrap();
		let resp = client.refresh_token("old-refresh").await.unwrap();
		assert_eq!(resp.access_token, "new-access");
		assert_eq!(resp.expires_in, 3600);
	}

	#[tokio::test]
	async fn refresh_token_logical_refusal_is_not_protocol_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/oauth/token/refresh"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"error": "invalid_grant",
				"error_description": "refresh token expired",
			})))
			.mount(&server)
			.await;

		let client = IdentityClient::new(format!("{}/", server.uri())).unwrap();
		let err = client.refresh_token("old-refresh").await.unwrap_err();
		assert!(matches!(err, IdentityClientError::LogicalRefusal { .. }));
		assert!(!err.is_retryable());
	}

	#[tokio::test]
	async fn terminate_session_surfaces_protocol_errors_but_is_best_effort_for_callers() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/session/terminate"))
			.respond_with(ResponseTemplate::new(503))
			.mount(&server)
			.await;

		let client = IdentityClient::new(format!("{}/", server.uri())).unwrap();
		let err = client.terminate_session("tok").await.unwrap_err();
		assert!(matches!(err, IdentityClientError::Protocol { .. }));
	}
}
