// Source Gateway - retrieves the two independent source collections.
// Transport and response-shape checking only; no business logic here.
// Transport failures propagate unmodified so the sync run aborts entirely.

use crate::models::{AllocationTree, Summary};
use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Seam between the sync pipeline and the external data source. `Sync` is
/// required because the two fetches run concurrently on scoped threads.
pub trait SourceGateway: Sync {
    fn fetch_summaries(&self) -> Result<Vec<Summary>>;
    fn fetch_allocation_trees(&self) -> Result<Vec<AllocationTree>>;
}

// ============================================================================
// HTTP GATEWAY
// ============================================================================

/// Production gateway against the source's JSON API:
/// GET {base}/summaries and GET {base}/allocations, each an array of records.
pub struct HttpGateway {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Extension point for callers that need their own deadline; the core
    /// pipeline itself imposes no timeouts or retries.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(HttpGateway {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch one collection and check its shape: a 2xx status with a JSON
    /// array of the expected record type. Anything else is a transport error.
    fn fetch_collection<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Source unreachable: GET {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Source returned non-success status {} for GET {}", status, url);
        }

        response
            .json::<Vec<T>>()
            .with_context(|| format!("Malformed response body from GET {}", url))
    }
}

impl SourceGateway for HttpGateway {
    fn fetch_summaries(&self) -> Result<Vec<Summary>> {
        self.fetch_collection("summaries")
    }

    fn fetch_allocation_trees(&self) -> Result<Vec<AllocationTree>> {
        self.fetch_collection("allocations")
    }
}

// ============================================================================
// TESTS
// ============================================================================
