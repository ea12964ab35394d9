//! Data synthesis stage.
//!
//! Optional second model call that correlates the tool results before the
//! final answer is written. It only runs for moderate or complex queries
//! that actually produced tool data. This stage never fails the request:
//! a malformed model reply degrades to a fallback outcome and a completion
//! error degrades to an error outcome, both keeping the raw tool results
//! so the response stage can still ground its answer.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::AsRefStr;

use crate::agent::analysis::{strip_code_fence, QueryAnalysis};
use crate::agent::executor::ToolExecution;
use crate::ai::{CompletionBackend, Message, MessageRole};
use crate::models::Complexity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SynthesisType {
    /// Pass-through; the synthesis model was not consulted.
    Simple,
    Moderate,
    Complex,
    /// Model replied but the reply could not be decoded.
    Fallback,
    /// Completion call itself failed.
    Error,
}

/// Result of the synthesis stage, degraded variants included.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisOutcome {
    pub key_insights: Vec<String>,
    pub data_correlations: Vec<Value>,
    pub risk_factors: Vec<String>,
    pub opportunities: Vec<String>,
    pub confidence_score: f64,
    pub synthesis_type: SynthesisType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis_summary: Option<String>,
    /// Raw tool results, carried on the simple and degraded variants so the
    /// response stage still has the data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_results: Option<Value>,
    pub duration_seconds: f64,
}

impl SynthesisOutcome {
    fn degraded(
        synthesis_type: SynthesisType,
        confidence_score: f64,
        raw_results: Value,
        duration_seconds: f64,
    ) -> Self {
        SynthesisOutcome {
            key_insights: Vec::new(),
            data_correlations: Vec::new(),
            risk_factors: Vec::new(),
            opportunities: Vec::new(),
            confidence_score,
            synthesis_type,
            synthesis_summary: None,
            raw_results: Some(raw_results),
            duration_seconds,
        }
    }
}

/// What the synthesis model is asked to return.
#[derive(Debug, Deserialize)]
struct SynthesisModelOutput {
    #[serde(default)]
    key_insights: Vec<String>,
    #[serde(default)]
    data_correlations: Vec<Value>,
    #[serde(default)]
    risk_factors: Vec<String>,
    #[serde(default)]
    opportunities: Vec<String>,
    #[serde(default = "default_synthesis_confidence")]
    confidence_score: f64,
    #[serde(default)]
    synthesis_summary: Option<String>,
}

fn default_synthesis_confidence() -> f64 {
    0.7
}

/// Analysis-level gate: synthesis runs only for moderate and complex
/// queries that produced tool data.
pub fn should_run(analysis: &QueryAnalysis, execution: &ToolExecution) -> bool {
    matches!(
        analysis.complexity_level,
        Complexity::Moderate | Complexity::Complex
    ) && !execution.tools_used.is_empty()
}

fn parse_synthesis(raw: &str) -> Result<SynthesisModelOutput, serde_json::Error> {
    serde_json::from_str(strip_code_fence(raw))
}

fn system_prompt(analysis: &QueryAnalysis) -> String {
    let mut prompt = String::from(
        r#"You are a data synthesis specialist for Indian agriculture.
You are given JSON results from agricultural data tools. Correlate them and
respond with ONLY a JSON object, no other text:

{
  "key_insights": ["..."],
  "data_correlations": [{"sources": ["..."], "finding": "..."}],
  "risk_factors": ["..."],
  "opportunities": ["..."],
  "confidence_score": 0.8,
  "synthesis_summary": "..."
}

Keep every entry short and concrete. Only state what the data supports."#,
    );

    if !analysis.synthesis_requirements.is_empty() {
        prompt.push_str("\n\nFocus on:\n");
        for requirement in &analysis.synthesis_requirements {
            prompt.push_str("- ");
            prompt.push_str(requirement);
            prompt.push('\n');
        }
    }

    prompt
}

/// Run the synthesis stage. Always returns an outcome with its duration
/// recorded; see [`SynthesisType`] for the degradation ladder.
pub async fn synthesize(
    completion: &dyn CompletionBackend,
    analysis: &QueryAnalysis,
    execution: &ToolExecution,
) -> SynthesisOutcome {
    let started = Instant::now();
    let raw_results = execution.results_value();

    if !should_run(analysis, execution) {
        return SynthesisOutcome::degraded(
            SynthesisType::Simple,
            1.0,
            raw_results,
            started.elapsed().as_secs_f64(),
        );
    }

    let tier = match analysis.complexity_level {
        Complexity::Complex => SynthesisType::Complex,
        _ => SynthesisType::Moderate,
    };

    let results_json =
        serde_json::to_string_pretty(&raw_results).unwrap_or_else(|_| raw_results.to_string());
    let messages = vec![
        Message {
            role: MessageRole::System,
            content: system_prompt(analysis),
        },
        Message {
            role: MessageRole::User,
            content: format!("Tool results:\n{}", results_json),
        },
    ];

    match completion.generate(messages).await {
        Ok(raw) => match parse_synthesis(&raw) {
            Ok(output) => SynthesisOutcome {
                key_insights: output.key_insights,
                data_correlations: output.data_correlations,
                risk_factors: output.risk_factors,
                opportunities: output.opportunities,
                confidence_score: output.confidence_score,
                synthesis_type: tier,
                synthesis_summary: output.synthesis_summary,
                raw_results: None,
                duration_seconds: started.elapsed().as_secs_f64(),
            },
            Err(e) => {
                log::warn!("[SYNTHESIS] Unparseable synthesis output ({}), degrading", e);
                SynthesisOutcome::degraded(
                    SynthesisType::Fallback,
                    0.6,
                    raw_results,
                    started.elapsed().as_secs_f64(),
                )
            }
        },
        Err(e) => {
            log::warn!("[SYNTHESIS] Completion failed ({}), degrading", e);
            SynthesisOutcome::degraded(
                SynthesisType::Error,
                0.5,
                raw_results,
                started.elapsed().as_secs_f64(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::analysis::parse_analysis;
    use crate::agent::executor::execute_tools;
    use crate::agent::testkit::{MockGateway, ScriptedBackend};
    use crate::mcp::GatewayPayload;
    use serde_json::json;

    async fn price_execution(gateway: &MockGateway) -> (QueryAnalysis, ToolExecution) {
        let analysis = parse_analysis(
            r#"{"complexity_level": "moderate", "needs_crop_price": true,
                "synthesis_requirements": ["price trend"]}"#,
        )
        .unwrap();
        let execution = execute_tools(gateway, &analysis, "wheat price trend").await;
        (analysis, execution)
    }

    fn priced_gateway() -> MockGateway {
        MockGateway::new().script(
            "crop-price",
            Ok(GatewayPayload::data(json!({"records": [{"modal_price": "2275"}]}))),
        )
    }

    #[tokio::test]
    async fn test_gate_requires_complexity_and_tool_data() {
        let gateway = priced_gateway();
        let (mut analysis, execution) = price_execution(&gateway).await;
        assert!(should_run(&analysis, &execution));

        analysis.complexity_level = Complexity::Simple;
        assert!(!should_run(&analysis, &execution));

        analysis.complexity_level = Complexity::Complex;
        assert!(!should_run(&analysis, &ToolExecution::default()));
    }

    #[tokio::test]
    async fn test_direct_call_below_gate_passes_through() {
        let gateway = priced_gateway();
        let (mut analysis, execution) = price_execution(&gateway).await;
        analysis.complexity_level = Complexity::Simple;

        let completion = ScriptedBackend::new(vec![]);
        let outcome = synthesize(&completion, &analysis, &execution).await;

        assert_eq!(outcome.synthesis_type, SynthesisType::Simple);
        assert!(outcome.raw_results.is_some());
        assert_eq!(completion.call_count(), 0);
    }

    #[tokio::test]
    async fn test_typed_success_uses_complexity_tier() {
        let gateway = priced_gateway();
        let (analysis, execution) = price_execution(&gateway).await;

        let reply = json!({
            "key_insights": ["prices firm"],
            "data_correlations": [{"sources": ["crop-price"], "finding": "stable"}],
            "risk_factors": ["rain next week"],
            "opportunities": ["sell after holiday"],
            "confidence_score": 0.85,
            "synthesis_summary": "hold a few days"
        })
        .to_string();
        let completion = ScriptedBackend::new(vec![Ok(reply)]);

        let outcome = synthesize(&completion, &analysis, &execution).await;

        assert_eq!(outcome.synthesis_type, SynthesisType::Moderate);
        assert_eq!(outcome.key_insights, vec!["prices firm"]);
        assert_eq!(outcome.risk_factors, vec!["rain next week"]);
        assert!((outcome.confidence_score - 0.85).abs() < f64::EPSILON);
        assert!(outcome.raw_results.is_none());
        assert!(outcome.duration_seconds >= 0.0);
    }

    #[tokio::test]
    async fn test_unparseable_reply_degrades_to_fallback() {
        let gateway = priced_gateway();
        let (analysis, execution) = price_execution(&gateway).await;
        let completion =
            ScriptedBackend::new(vec![Ok("The data suggests prices are firm.".to_string())]);

        let outcome = synthesize(&completion, &analysis, &execution).await;

        assert_eq!(outcome.synthesis_type, SynthesisType::Fallback);
        assert!((outcome.confidence_score - 0.6).abs() < f64::EPSILON);
        let raw = outcome.raw_results.unwrap();
        assert_eq!(raw["crop-price"]["records"][0]["modal_price"], "2275");
    }

    #[tokio::test]
    async fn test_completion_failure_degrades_to_error() {
        let gateway = priced_gateway();
        let (analysis, execution) = price_execution(&gateway).await;
        let completion = ScriptedBackend::new(vec![Err("api down".to_string())]);

        let outcome = synthesize(&completion, &analysis, &execution).await;

        assert_eq!(outcome.synthesis_type, SynthesisType::Error);
        assert!((outcome.confidence_score - 0.5).abs() < f64::EPSILON);
        assert!(outcome.raw_results.is_some());
        assert!(outcome.duration_seconds >= 0.0);
    }

    #[tokio::test]
    async fn test_synthesis_prompt_carries_requirements() {
        let gateway = priced_gateway();
        let (analysis, execution) = price_execution(&gateway).await;
        let completion = ScriptedBackend::new(vec![Ok("{}".to_string())]);

        synthesize(&completion, &analysis, &execution).await;

        let prompt = completion.system_prompt_of_call(0);
        assert!(prompt.contains("price trend"));
    }
}
