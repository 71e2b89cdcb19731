use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use serde::Serialize;
use sqlx::PgPool;

const CACHE_TTL: Duration = Duration::from_secs(30);
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct CachedUrls {
	urls: Arc<Vec<String>>,
	fetched_at: Instant,
}

/// Caches the enabled system-scope webhook URL list behind an `ArcSwap`,
/// the same load/check-expiry/refetch-on-miss shape used for periodically
/// refreshed remote values elsewhere in this workspace. This avoids a DB
/// round trip on every terminal-state notification when a run immediately
/// re-triggers another within the TTL window.
pub struct WebhookUrlCache {
	pool: PgPool,
	inner: ArcSwap<Option<CachedUrls>>,
}

impl WebhookUrlCache {
	pub fn new(pool: PgPool) -> Self {
		Self { pool, inner: ArcSwap::from_pointee(None) }
	}

	async fn urls(&self) -> Result<Arc<Vec<String>>, sqlx::Error> {
		if let Some(cached) = self.inner.load().as_ref() {
			if cached.fetched_at.elapsed() < CACHE_TTL {
				return Ok(Arc::clone(&cached.urls));
			}
		}

		let urls: Vec<String> = sqlx::query_scalar(
			"SELECT url FROM webhooks WHERE scope = 'system' AND enabled = true",
		)
		.fetch_all(&self.pool)
		.await?;
		let urls = Arc::new(urls);
		self.inner.store(Arc::new(Some(CachedUrls { urls: Arc::clone(&urls), fetched_at: Instant::now() })));
		Ok(urls)
	}
}

#[derive(Debug, Serialize)]
struct EmbedField {
	name: String,
	value: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	inline: Option<bool>,
}

#[derive(Debug, Serialize)]
struct Embed {
	title: String,
	description: String,
	color: u32,
	fields: Vec<EmbedField>,
	timestamp: String,
	footer: EmbedFooter,
}

#[derive(Debug, Serialize)]
struct EmbedFooter {
	text: String,
}

#[derive(Debug, Serialize)]
struct WebhookPayload {
	embeds: [Embed; 1],
}

const COLOR_COMPLETED: u32 = 0x2ecc71;
const COLOR_FAILED: u32 = 0xe74c3c;
const COLOR_CANCELLED: u32 = 0x95a5a6;

pub struct SyncOutcome<'a> {
	pub sync_log_id: &'a str,
	pub status: &'a str,
	pub items_processed: Option<i64>,
	pub failed_step: Option<&'a str>,
}

fn build_payload(outcome: &SyncOutcome<'_>) -> WebhookPayload {
	let (title, color) = match outcome.status {
		"COMPLETED" => ("Sync completed", COLOR_COMPLETED),
		"FAILED" => ("Sync failed", COLOR_FAILED),
		_ => ("Sync cancelled", COLOR_CANCELLED),
	};

	let mut fields = vec![EmbedField {
		name: "Sync log".to_string(),
		value: outcome.sync_log_id.to_string(),
		inline: Some(true),
	}];
	if let Some(processed) = outcome.items_processed {
		fields.push(EmbedField {
			name: "Items processed".to_string(),
			value: processed.to_string(),
			inline: Some(true),
		});
	}
	if let Some(step) = outcome.failed_step {
		fields.push(EmbedField {
			name: "Failed step".to_string(),
			value: step.to_string(),
			inline: Some(true),
		});
	}

	WebhookPayload {
		embeds: [Embed {
			title: title.to_string(),
			description: format!("status: {}", outcome.status),
			color,
			fields,
			timestamp: chrono::Utc::now().to_rfc3339(),
			footer: EmbedFooter { text: "panel-sync".to_string() },
		}],
	}
}

/// Fans out the terminal-state payload to every enabled system-scope
/// webhook concurrently. Runs on a background `reqwest::Client` detached
/// from the calling task's cancellation, so a just-cancelled sync still
/// notifies (`spec.md` §4.5). A non-204 response is logged and never
/// retried.
pub async fn fan_out(http: &reqwest::Client, cache: &WebhookUrlCache, outcome: SyncOutcome<'_>) {
	let urls = match cache.urls().await {
		Ok(urls) => urls,
		Err(error) => {
			tracing::warn!(%error, "failed to load webhook urls, skipping fan-out");
			return;
		}
	};
	if urls.is_empty() {
		return;
	}

	let payload = build_payload(&outcome);
	let deliveries = urls.iter().map(|url| deliver(http, url, &payload));
	futures::future::join_all(deliveries).await;
}

async fn deliver(http: &reqwest::Client, url: &str, payload: &WebhookPayload) {
	let result = http.post(url).timeout(WEBHOOK_TIMEOUT).json(payload).send().await;
	match result {
		Ok(response) if response.status().as_u16() == 204 => {}
		Ok(response) => {
			tracing::warn!(url, status = %response.status(), "webhook endpoint returned a non-204 response");
		}
		Err(error) => {
			tracing::warn!(url, %error, "webhook delivery failed");
		}
	}
}
