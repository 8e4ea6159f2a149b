//! HTTP trace collector.
//!
//! POSTs each [`TraceRecord`] as JSON to a configured endpoint. Any non-2xx
//! status is a rejection.

use async_trait::async_trait;
use std::time::Duration;

use crate::ports::{TraceCollector, TraceError, TraceRecord};

#[derive(Debug, Clone)]
pub struct HttpTraceCollector {
    http_client: reqwest::Client,
    url: String,
}

impl HttpTraceCollector {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TraceError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TraceError::Request(e.to_string()))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TraceCollector for HttpTraceCollector {
    async fn collect(&self, record: TraceRecord) -> Result<(), TraceError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&record)
            .send()
            .await
            .map_err(|e| TraceError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TraceError::Rejected(response.status().as_u16()));
        }

        tracing::debug!(url = %self.url, code = %record.code, "trace collected");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
