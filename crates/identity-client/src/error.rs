#[derive(thiserror::Error, Debug)]
pub enum IdentityClientError {
	#[error("request to identity service failed to send")]
	Transport(#[from] reqwest::Error),

	#[error("identity service responded with status {status}: {body}")]
	Protocol { status: reqwest::StatusCode, body: String },

	#[error("failed to decode identity service response")]
	Decode(#[source] serde_json::Error),

	/// An application-level refusal returned under HTTP 200. Callers must
	/// not overwrite stored tokens when they see this variant.
	#[error("identity service refused the request: {error}{}", error_description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
	LogicalRefusal {
		error: String,
		error_description: Option<String>,
	},
}

impl IdentityClientError {
	pub fn is_retryable(&self) -> bool {
		!matches!(self, Self::LogicalRefusal { .. } | Self::Decode(_))
	}
}
