//! Monday.com board sink.
//!
//! Each completed session becomes one board item, created with the
//! `create_item` GraphQL mutation. Column ids come from config, falling back
//! to the built-in board layout.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use docintake_config::defaults::default_workbook_columns;
use docintake_config::{ColumnSpec, WorkbookConfig};
use docintake_core::{Submission, WorkbookSink};
use docintake_logging::redact_fields;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::columns::{column_values, expand_make_model, item_name};

const CREATE_ITEM: &str = "mutation ($boardId: ID!, $itemName: String!, $columnValues: JSON!) {
  create_item (board_id: $boardId, item_name: $itemName, column_values: $columnValues) { id }
}";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct MondaySink {
    client: Client,
    api_url: String,
    api_token: String,
    api_version: String,
    board_id: String,
    columns: BTreeMap<String, ColumnSpec>,
}

impl MondaySink {
    pub fn from_config(config: &WorkbookConfig) -> Result<Self> {
        let api_token = config
            .api_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .context("workbook.apiToken is required")?;
        let board_id = config
            .board_id
            .clone()
            .filter(|b| !b.trim().is_empty())
            .context("workbook.boardId is required")?;
        let columns = config
            .columns
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(default_workbook_columns);
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: config.api_url().to_string(),
            api_token,
            api_version: config.api_version().to_string(),
            board_id,
            columns,
        })
    }

    /// GraphQL variables for one submission.
    pub fn variables(&self, session_id: &str, submission: &Submission) -> Value {
        let mut fields = submission.flattened();
        expand_make_model(&mut fields);
        let values = column_values(&fields, &self.columns);
        json!({
            "boardId": self.board_id,
            "itemName": item_name(&fields, session_id),
            // The API takes column values as a JSON-encoded string.
            "columnValues": Value::Object(values).to_string(),
        })
    }
}

/// The created item id, or the GraphQL errors as an error.
fn created_item_id(response: &Value) -> Result<String> {
    if let Some(errors) = response.get("errors").and_then(Value::as_array).filter(|e| !e.is_empty()) {
        let messages: Vec<&str> = errors
            .iter()
            .map(|e| e.get("message").and_then(Value::as_str).unwrap_or("unknown error"))
            .collect();
        bail!("Monday.com rejected the item: {}", messages.join("; "));
    }
    let id = &response["data"]["create_item"]["id"];
    id.as_str()
        .map(str::to_string)
        .or_else(|| id.as_u64().map(|n| n.to_string()))
        .ok_or_else(|| anyhow!("unexpected Monday.com response: {response}"))
}

#[async_trait]
impl WorkbookSink for MondaySink {
    fn name(&self) -> &str {
        "monday"
    }

    async fn submit(&self, session_id: &str, submission: &Submission) -> Result<()> {
        let variables = self.variables(session_id, submission);
        debug!(session = %session_id, fields = ?redact_fields(&submission.flattened()), "Creating Monday.com item");

        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_token)
            .header("API-Version", &self.api_version)
            .json(&json!({ "query": CREATE_ITEM, "variables": variables }))
            .send()
            .await
            .context("Monday.com request failed")?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            bail!("Monday.com returned {status}: {body}");
        }
        let body: Value = res.json().await.context("Failed to parse Monday.com response")?;
        let item_id = created_item_id(&body)?;
        info!(session = %session_id, board = %self.board_id, item = %item_id, "Monday.com item created");
        Ok(())
    }
}
