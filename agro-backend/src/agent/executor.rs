//! Tool execution stage.
//!
//! Fans the flagged tools out to the gateway concurrently and collects the
//! results back in [`ToolKind`] declaration order. Each result is passed
//! through its family gate to decide the `used` verdict; a gateway transport
//! error becomes a per-tool error outcome and never aborts the stage.

use futures_util::future::join_all;
use serde_json::{json, Map, Value};

use crate::agent::analysis::{QueryAnalysis, ToolFamily, ToolKind};
use crate::mcp::{GatewayPayload, ToolGateway};

/// Outcome of one tool invocation after its family gate.
///
/// `payload` and `error` never coexist: a used tool carries data, an unused
/// one carries the reason.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub tool: ToolKind,
    pub payload: Option<Value>,
    pub error: Option<String>,
    pub used: bool,
}

impl ToolOutcome {
    fn used(tool: ToolKind, payload: Value) -> Self {
        ToolOutcome {
            tool,
            payload: Some(payload),
            error: None,
            used: true,
        }
    }

    fn unused(tool: ToolKind, error: impl Into<String>) -> Self {
        ToolOutcome {
            tool,
            payload: None,
            error: Some(error.into()),
            used: false,
        }
    }
}

/// All tool outcomes for one request, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ToolExecution {
    pub outcomes: Vec<ToolOutcome>,
    /// Wire names of the tools whose gate passed, in declaration order.
    pub tools_used: Vec<String>,
}

impl ToolExecution {
    pub fn used_outcomes(&self) -> impl Iterator<Item = &ToolOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.used)
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.used)
            .map(|outcome| outcome.tool.as_ref())
            .collect()
    }

    /// Wire-name keyed map of payloads and errors, fed to synthesis.
    pub fn results_value(&self) -> Value {
        let mut map = Map::new();
        for outcome in &self.outcomes {
            let value = match &outcome.payload {
                Some(payload) => payload.clone(),
                None => json!({ "error": outcome.error.clone().unwrap_or_default() }),
            };
            map.insert(outcome.tool.as_ref().to_string(), value);
        }
        Value::Object(map)
    }
}

/// Run every flagged tool and gate the results.
pub async fn execute_tools(
    gateway: &dyn ToolGateway,
    analysis: &QueryAnalysis,
    message: &str,
) -> ToolExecution {
    let requested = analysis.requested_tools();
    if requested.is_empty() {
        return ToolExecution::default();
    }

    log::info!(
        "[EXECUTOR] Running {} tool(s): {:?}",
        requested.len(),
        requested.iter().map(|k| k.as_ref()).collect::<Vec<_>>()
    );

    let calls = requested.iter().map(|kind| {
        let params = analysis.gateway_params(*kind, message);
        async move { gateway.call(kind.as_ref(), params).await }
    });
    // join_all preserves input order, so outcomes line up with `requested`.
    let results = join_all(calls).await;

    let outcomes: Vec<ToolOutcome> = requested
        .into_iter()
        .zip(results)
        .map(|(kind, result)| gate(kind, result))
        .collect();

    let tools_used = outcomes
        .iter()
        .filter(|outcome| outcome.used)
        .map(|outcome| outcome.tool.as_ref().to_string())
        .collect();

    ToolExecution {
        outcomes,
        tools_used,
    }
}

/// Apply the family gate for one tool result.
fn gate(kind: ToolKind, result: Result<GatewayPayload, String>) -> ToolOutcome {
    let payload = match result {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("[EXECUTOR] {} transport failure: {}", kind.as_ref(), e);
            return ToolOutcome::unused(kind, format!("Tool call failed: {}", e));
        }
    };

    if let Some(error) = payload.error {
        return ToolOutcome::unused(kind, error);
    }

    match kind.family() {
        ToolFamily::Market => {
            if market_has_records(&payload) {
                ToolOutcome::used(kind, payload.into_value())
            } else {
                ToolOutcome::unused(kind, "No price data available")
            }
        }
        ToolFamily::Search => {
            if search_has_results(&payload) {
                ToolOutcome::used(kind, payload.into_value())
            } else {
                ToolOutcome::unused(kind, "No search results available")
            }
        }
        ToolFamily::Advisory => ToolOutcome::used(kind, payload.into_value()),
    }
}

fn market_has_records(payload: &GatewayPayload) -> bool {
    payload
        .data
        .as_ref()
        .and_then(|data| data.get("records"))
        .and_then(Value::as_array)
        .map(|records| !records.is_empty())
        .unwrap_or(false)
}

fn search_has_results(payload: &GatewayPayload) -> bool {
    let results = payload.results.as_ref().or_else(|| {
        payload
            .data
            .as_ref()
            .and_then(|data| data.get("results"))
    });
    results
        .and_then(Value::as_array)
        .map(|results| !results.is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testkit::MockGateway;

    fn analysis_with(flags: &str) -> QueryAnalysis {
        crate::agent::analysis::parse_analysis(flags).unwrap()
    }

    #[tokio::test]
    async fn test_market_gate_requires_records() {
        let gateway = MockGateway::new()
            .script(
                "crop-price",
                Ok(GatewayPayload::data(json!({"records": [{"modal_price": "2275"}]}))),
            )
            .script("mandi-price", Ok(GatewayPayload::data(json!({"records": []}))));
        let analysis = analysis_with(r#"{"needs_crop_price": true, "needs_mandi_price": true}"#);

        let execution = execute_tools(&gateway, &analysis, "wheat price").await;

        assert_eq!(execution.tools_used, vec!["crop-price"]);
        assert!(execution.outcomes[0].used);
        assert!(!execution.outcomes[1].used);
        assert_eq!(
            execution.outcomes[1].error.as_deref(),
            Some("No price data available")
        );
        assert!(execution.outcomes[1].payload.is_none());
    }

    #[tokio::test]
    async fn test_search_gate_requires_results() {
        let gateway = MockGateway::new().script(
            "search",
            Ok(GatewayPayload::from_response(json!({"results": []}))),
        );
        let analysis = analysis_with(r#"{"needs_web_search": true}"#);

        let execution = execute_tools(&gateway, &analysis, "query").await;

        assert!(execution.tools_used.is_empty());
        assert_eq!(
            execution.outcomes[0].error.as_deref(),
            Some("No search results available")
        );
    }

    #[tokio::test]
    async fn test_search_gate_accepts_results_under_data() {
        let gateway = MockGateway::new().script(
            "search",
            Ok(GatewayPayload::from_response(
                json!({"success": true, "data": {"results": [{"title": "MSP announced"}]}}),
            )),
        );
        let analysis = analysis_with(r#"{"needs_web_search": true}"#);

        let execution = execute_tools(&gateway, &analysis, "query").await;

        assert_eq!(execution.tools_used, vec!["search"]);
    }

    #[tokio::test]
    async fn test_advisory_gate_accepts_any_non_error() {
        let gateway = MockGateway::new()
            .script("weather", Ok(GatewayPayload::data(json!({"forecast": "dry"}))))
            .script("soil-health", Ok(GatewayPayload::error("station offline")));
        let analysis = analysis_with(r#"{"needs_weather": true, "needs_soil_health": true}"#);

        let execution = execute_tools(&gateway, &analysis, "irrigation advice").await;

        assert_eq!(execution.tools_used, vec!["weather"]);
        assert_eq!(
            execution.outcomes.iter().map(|o| o.tool).collect::<Vec<_>>(),
            vec![ToolKind::SoilHealth, ToolKind::Weather]
        );
        let soil = &execution.outcomes[0];
        assert!(!soil.used);
        assert_eq!(soil.error.as_deref(), Some("station offline"));
    }

    #[tokio::test]
    async fn test_transport_error_becomes_outcome() {
        let gateway = MockGateway::new().script("weather", Err("connection refused".to_string()));
        let analysis = analysis_with(r#"{"needs_weather": true}"#);

        let execution = execute_tools(&gateway, &analysis, "rain?").await;

        assert!(execution.tools_used.is_empty());
        assert_eq!(
            execution.outcomes[0].error.as_deref(),
            Some("Tool call failed: connection refused")
        );
    }

    #[tokio::test]
    async fn test_results_value_maps_payloads_and_errors() {
        let gateway = MockGateway::new()
            .script(
                "crop-price",
                Ok(GatewayPayload::data(json!({"records": [{"modal_price": "2275"}]}))),
            )
            .script("weather", Err("timeout".to_string()));
        let analysis = analysis_with(r#"{"needs_crop_price": true, "needs_weather": true}"#);

        let execution = execute_tools(&gateway, &analysis, "plan sowing").await;
        let results = execution.results_value();

        assert_eq!(results["crop-price"]["records"][0]["modal_price"], "2275");
        assert_eq!(results["weather"]["error"], "Tool call failed: timeout");
    }

    #[tokio::test]
    async fn test_no_flags_no_calls() {
        let gateway = MockGateway::new();
        let analysis = analysis_with(r#"{"is_agricultural": true}"#);

        let execution = execute_tools(&gateway, &analysis, "hello").await;

        assert!(execution.outcomes.is_empty());
        assert!(execution.tools_used.is_empty());
        assert!(gateway.calls.lock().is_empty());
    }
}
