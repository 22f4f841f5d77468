//! # Remote Authority Client
//!
//! HTTP/JSON client for the remote authority, behind the [`RemoteAuthority`]
//! trait so the engine and service can run against an in-memory fake in
//! tests.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Remote Authority Protocol                           │
//! │                                                                         │
//! │  GET  /api/status         → {"status":"ok"}       reachability probe   │
//! │                             (NO auth headers - an expired key must     │
//! │                              not make the shop look offline)           │
//! │                                                                         │
//! │  GET  /api/sync           → full snapshot          pull path           │
//! │  POST /api/sync           → per-batch result       push path           │
//! │                                                                         │
//! │  POST /api/print-receipt  → best-effort                                │
//! │  POST /api/print-report   → best-effort; 404 means the authority       │
//! │                             never implemented it → successful no-op    │
//! │                                                                         │
//! │  Auth: X-API-KEY + Authorization: Bearer on everything but /status     │
//! │  401/403 → AuthRequired (retries will not self-heal)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use duka_core::{ClosingReport, CreditCustomer, Product, SyncOperation, Transaction};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Wire Types
// =============================================================================

/// Full authoritative snapshot returned by `GET /api/sync`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSnapshot {
    /// All transactions the authority knows about.
    #[serde(default)]
    pub transactions: Vec<Transaction>,

    /// All credit customers with authoritative balances.
    #[serde(default)]
    pub credit_customers: Vec<CreditCustomer>,

    /// The current product catalog.
    #[serde(default)]
    pub products: Vec<Product>,
}

/// Request body for `POST /api/sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    /// Operations in queue (FIFO) order.
    pub operations: Vec<SyncOperation>,
}

/// Outcome for a single operation when the authority enumerates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    /// The operation id this outcome refers to.
    pub id: String,

    /// Whether the authority applied the operation.
    pub success: bool,

    /// Error description for failed operations.
    #[serde(default)]
    pub error: Option<String>,
}

/// Response body for `POST /api/sync`.
///
/// A bare `{"success": true}` acknowledges the whole batch. When `results`
/// is present the engine acknowledges per operation instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    /// Whole-batch acknowledgement flag.
    #[serde(default = "default_success")]
    pub success: bool,

    /// Optional per-operation outcomes.
    #[serde(default)]
    pub results: Option<Vec<OperationOutcome>>,
}

impl Default for PushResponse {
    /// A bare acknowledgement, the same as an empty `{}` response body.
    fn default() -> Self {
        PushResponse {
            success: default_success(),
            results: None,
        }
    }
}

fn default_success() -> bool {
    true
}

/// Request body for `POST /api/print-receipt`. The authority expects the
/// sale wrapped under a `transaction` key, not a bare object.
#[derive(Debug, Serialize)]
struct PrintReceiptRequest<'a> {
    transaction: &'a Transaction,
}

/// Request body for `POST /api/print-report`.
#[derive(Debug, Serialize)]
struct PrintReportRequest<'a> {
    report: &'a ClosingReport,
}

// =============================================================================
// Remote Authority Trait
// =============================================================================

/// The seam between the offline core and the network.
///
/// Production uses [`HttpRemote`]; tests substitute scripted fakes.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Lightweight reachability check. No credentials.
    async fn probe(&self) -> SyncResult<()>;

    /// Fetches the authority's full snapshot.
    async fn fetch_snapshot(&self) -> SyncResult<RemoteSnapshot>;

    /// Pushes a FIFO batch of operations as one ordered request.
    async fn push_operations(&self, operations: &[SyncOperation]) -> SyncResult<PushResponse>;

    /// Requests a receipt print. Best-effort.
    async fn print_receipt(&self, transaction: &Transaction) -> SyncResult<()>;

    /// Requests a closing-report print. Best-effort; an authority that
    /// never implemented the endpoint answers 404, which is a no-op here.
    async fn print_report(&self, report: &ClosingReport) -> SyncResult<()>;
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// reqwest-backed [`RemoteAuthority`].
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpRemote {
    /// Builds a client with the config's bounded request timeout.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.sync.request_timeout())
            .build()?;

        Ok(HttpRemote {
            client,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            api_key: config.api_key().to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Adds the credential headers used on every authenticated endpoint.
    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("X-API-KEY", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// Maps a non-success status to the error taxonomy.
    async fn check(response: reqwest::Response) -> SyncResult<reqwest::Response> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::AuthRequired);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::RemoteRejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl RemoteAuthority for HttpRemote {
    async fn probe(&self) -> SyncResult<()> {
        // Deliberately unauthenticated: the probe answers "is the server
        // there", not "is my key valid".
        let response = self.client.get(self.url("/api/status")).send().await?;
        Self::check(response).await?;

        debug!("Status probe succeeded");
        Ok(())
    }

    async fn fetch_snapshot(&self) -> SyncResult<RemoteSnapshot> {
        let response = self
            .authed(self.client.get(self.url("/api/sync")))
            .send()
            .await?;
        let response = Self::check(response).await?;

        let snapshot: RemoteSnapshot = response.json().await?;
        debug!(
            transactions = snapshot.transactions.len(),
            credit_customers = snapshot.credit_customers.len(),
            products = snapshot.products.len(),
            "Fetched remote snapshot"
        );

        Ok(snapshot)
    }

    async fn push_operations(&self, operations: &[SyncOperation]) -> SyncResult<PushResponse> {
        let body = PushRequest {
            operations: operations.to_vec(),
        };

        let response = self
            .authed(self.client.post(self.url("/api/sync")))
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let outcome: PushResponse = response.json().await?;
        debug!(
            count = operations.len(),
            success = outcome.success,
            "Pushed operation batch"
        );

        Ok(outcome)
    }

    async fn print_receipt(&self, transaction: &Transaction) -> SyncResult<()> {
        let response = self
            .authed(self.client.post(self.url("/api/print-receipt")))
            .json(&PrintReceiptRequest { transaction })
            .send()
            .await?;
        Self::check(response).await?;

        Ok(())
    }

    async fn print_report(&self, report: &ClosingReport) -> SyncResult<()> {
        let response = self
            .authed(self.client.post(self.url("/api/print-report")))
            .json(&PrintReportRequest { report })
            .send()
            .await?;

        // The desktop authority predates this endpoint; 404 is "printed
        // nowhere, successfully".
        if response.status() == StatusCode::NOT_FOUND {
            debug!("print-report endpoint not implemented on remote, treating as no-op");
            return Ok(());
        }

        Self::check(response).await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_request_wire_format() {
        let op = SyncOperation::new(
            duka_core::SyncOperationKind::CreateTransaction,
            "t1",
            json!({ "id": "t1" }),
        );
        let body = PushRequest {
            operations: vec![op],
        };

        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("operations").is_some());
        assert_eq!(
            value["operations"][0]["kind"],
            json!("create-transaction")
        );
        assert!(value["operations"][0].get("entityId").is_some());
    }

    #[test]
    fn test_print_bodies_wrap_their_entity() {
        let tx = Transaction {
            id: "t1".into(),
            items: vec![],
            total: 0,
            payment_method: duka_core::PaymentMethod::Cash,
            timestamp: chrono::Utc::now(),
            cashier: None,
            credit_customer_id: None,
            credit_customer_name: None,
            status: duka_core::TransactionStatus::Completed,
        };
        let body = serde_json::to_value(&PrintReceiptRequest { transaction: &tx }).unwrap();
        assert_eq!(body["transaction"]["id"], json!("t1"));

        let report = duka_core::aggregate(&[], "2024-01-01".parse().unwrap());
        let body = serde_json::to_value(&PrintReportRequest { report: &report }).unwrap();
        assert_eq!(body["report"]["date"], json!("2024-01-01"));
    }

    #[test]
    fn test_push_response_defaults_to_whole_batch_ack() {
        let parsed: PushResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.success);
        assert!(parsed.results.is_none());
    }

    #[test]
    fn test_push_response_with_per_operation_outcomes() {
        let parsed: PushResponse = serde_json::from_str(
            r#"{
                "success": false,
                "results": [
                    { "id": "op-1", "success": true },
                    { "id": "op-2", "success": false, "error": "stale balance" }
                ]
            }"#,
        )
        .unwrap();

        let results = parsed.results.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert_eq!(results[1].error.as_deref(), Some("stale balance"));
    }

    #[test]
    fn test_snapshot_tolerates_missing_sections() {
        let parsed: RemoteSnapshot =
            serde_json::from_str(r#"{ "products": [] }"#).unwrap();
        assert!(parsed.transactions.is_empty());
        assert!(parsed.credit_customers.is_empty());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = SyncConfig::new("https://pos.example.com/", "key");
        let remote = HttpRemote::new(&config).unwrap();
        assert_eq!(remote.url("/api/status"), "https://pos.example.com/api/status");
    }
}
