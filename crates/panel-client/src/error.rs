use reqwest::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum PanelClientError {
	#[error("request to {url} failed to send")]
	Transport {
		url: String,
		#[source]
		source: reqwest::Error,
	},

	#[error("panel responded to {url} with status {status}: {body}")]
	Protocol {
		url: String,
		status: StatusCode,
		body: String,
	},

	#[error("failed to decode panel response body from {url}")]
	Decode {
		url: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("panel base url {0:?} is not a valid url")]
	InvalidBaseUrl(String),
}

impl PanelClientError {
	/// Whether this failure is one the queue layer should retry. Decode and
	/// bad-base-url failures are not transient; everything else might be.
	pub fn is_retryable(&self) -> bool {
		!matches!(self, Self::Decode { .. } | Self::InvalidBaseUrl(_))
	}
}
