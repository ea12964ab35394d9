//! Four-stage advisory pipeline.
//!
//! analyze -> execute tools -> synthesize (conditional) -> respond.
//! Non-agricultural messages stop after analysis with a canned rejection;
//! that branch is a designed terminal state, not an error. The pipeline is
//! shared across requests and holds no per-request mutable state; history
//! comes in as a parameter and persistence stays with the caller.

pub mod analysis;
pub mod executor;
pub mod markdown;
pub mod respond;
pub mod synthesis;

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::ai::CompletionBackend;
use crate::knowledge::KnowledgeBase;
use crate::locale::{self, Language};
use crate::mcp::ToolGateway;
use crate::models::{ChatTurn, Complexity};

/// One stage transition in the reasoning trace returned to clients.
/// Deserialize is for replaying the trace out of a cached reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub step: String,
    pub agent: String,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Wall-clock stage durations in seconds.
#[derive(Debug, Clone, Serialize)]
pub struct StageTimings {
    pub total_duration: f64,
    pub analysis_duration: f64,
    pub execution_duration: f64,
    pub synthesis_duration: f64,
    pub response_duration: f64,
}

/// Everything the HTTP layer needs to answer one chat request.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub message: String,
    pub language: Language,
    pub tools_used: Vec<String>,
    pub reasoning_steps: Vec<ReasoningStep>,
    pub complexity_level: Complexity,
    pub confidence: f64,
    pub performance: StageTimings,
}

pub struct AgentPipeline {
    completion: Arc<dyn CompletionBackend>,
    gateway: Arc<dyn ToolGateway>,
    knowledge: Arc<KnowledgeBase>,
}

impl AgentPipeline {
    pub fn new(
        completion: Arc<dyn CompletionBackend>,
        gateway: Arc<dyn ToolGateway>,
        knowledge: Arc<KnowledgeBase>,
    ) -> Self {
        AgentPipeline {
            completion,
            gateway,
            knowledge,
        }
    }

    /// Run the full pipeline for one message.
    ///
    /// `Err` means a completion transport failure in the analysis or
    /// response stage; every other problem is absorbed into the outcome.
    pub async fn process_message(
        &self,
        message: &str,
        history: &[ChatTurn],
    ) -> Result<PipelineOutcome, String> {
        let total_started = Instant::now();
        log::info!(
            "[PIPELINE] Processing message ({} chars, {} history turns)",
            message.chars().count(),
            history.len()
        );

        let analysis_started = Instant::now();
        let analysis = analysis::analyze(self.completion.as_ref(), message).await?;
        let analysis_duration = analysis_started.elapsed().as_secs_f64();

        let mut reasoning_steps = vec![ReasoningStep {
            step: "enhanced_analysis".to_string(),
            agent: "Query Analyzer".to_string(),
            duration_seconds: analysis_duration,
            result: Some(json!({
                "is_agricultural": analysis.is_agricultural,
                "language": analysis.language,
                "complexity_level": analysis.complexity_level,
                "requested_tools": analysis
                    .requested_tools()
                    .iter()
                    .map(|kind| kind.as_ref())
                    .collect::<Vec<_>>(),
                "confidence": analysis.confidence,
            })),
        }];

        if !analysis.is_agricultural {
            log::info!("[PIPELINE] Non-agricultural message, rejecting");
            return Ok(PipelineOutcome {
                message: locale::rejection_message(analysis.language).to_string(),
                language: analysis.language,
                tools_used: Vec::new(),
                reasoning_steps,
                complexity_level: analysis.complexity_level,
                confidence: analysis.confidence,
                performance: StageTimings {
                    total_duration: total_started.elapsed().as_secs_f64(),
                    analysis_duration,
                    execution_duration: 0.0,
                    synthesis_duration: 0.0,
                    response_duration: 0.0,
                },
            });
        }

        let execution_started = Instant::now();
        let execution = executor::execute_tools(self.gateway.as_ref(), &analysis, message).await;
        let execution_duration = execution_started.elapsed().as_secs_f64();
        reasoning_steps.push(ReasoningStep {
            step: "tool_execution".to_string(),
            agent: "Tool Executor".to_string(),
            duration_seconds: execution_duration,
            result: Some(json!({ "tools_used": execution.tools_used })),
        });

        let synthesis = if synthesis::should_run(&analysis, &execution) {
            let outcome =
                synthesis::synthesize(self.completion.as_ref(), &analysis, &execution).await;
            reasoning_steps.push(ReasoningStep {
                step: "data_synthesis".to_string(),
                agent: "Data Synthesizer".to_string(),
                duration_seconds: outcome.duration_seconds,
                result: Some(json!({
                    "synthesis_type": outcome.synthesis_type,
                    "confidence": outcome.confidence_score,
                })),
            });
            Some(outcome)
        } else {
            None
        };
        let synthesis_duration = synthesis
            .as_ref()
            .map(|outcome| outcome.duration_seconds)
            .unwrap_or(0.0);

        let response_started = Instant::now();
        let answer = respond::respond(
            self.completion.as_ref(),
            &self.knowledge,
            message,
            &analysis,
            &execution,
            synthesis.as_ref(),
            history,
        )
        .await?;
        let response_duration = response_started.elapsed().as_secs_f64();
        reasoning_steps.push(ReasoningStep {
            step: "response_generation".to_string(),
            agent: "Response Generator".to_string(),
            duration_seconds: response_duration,
            result: None,
        });

        let mut tools_used = execution.tools_used;
        if tools_used.is_empty() {
            // Pure-model answers are attributed to the model itself.
            tools_used.push(self.completion.model_id().to_string());
        }

        let total_duration = total_started.elapsed().as_secs_f64();
        log::info!(
            "[PIPELINE] Done in {:.2}s (tools: {:?})",
            total_duration,
            tools_used
        );

        Ok(PipelineOutcome {
            message: answer,
            language: analysis.language,
            tools_used,
            reasoning_steps,
            complexity_level: analysis.complexity_level,
            confidence: analysis.confidence,
            performance: StageTimings {
                total_duration,
                analysis_duration,
                execution_duration,
                synthesis_duration,
                response_duration,
            },
        })
    }
}
