//! Response generation stage.
//!
//! Third model call: turn the analysis, tool data, synthesis and knowledge
//! snippets into one localized plain-text answer. The system prompt carries
//! all per-request context; conversation history rides along as chat turns.

use crate::agent::analysis::QueryAnalysis;
use crate::agent::executor::ToolExecution;
use crate::agent::markdown;
use crate::agent::synthesis::{SynthesisOutcome, SynthesisType};
use crate::ai::{CompletionBackend, Message, MessageRole};
use crate::knowledge::KnowledgeBase;
use crate::models::ChatTurn;

/// How many trailing history turns ride along in the prompt.
const HISTORY_WINDOW: usize = 6;

pub(crate) fn build_system_prompt(
    knowledge: &KnowledgeBase,
    message: &str,
    analysis: &QueryAnalysis,
    execution: &ToolExecution,
    synthesis: Option<&SynthesisOutcome>,
) -> String {
    let language_name = analysis.language.name();
    let mut prompt = format!(
        "You are an experienced agricultural advisor helping Indian farmers.\nThe farmer is asking in {}.\n",
        language_name
    );

    for outcome in execution.used_outcomes() {
        if let Some(payload) = &outcome.payload {
            let payload_json =
                serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
            prompt.push_str(&format!(
                "\n{}:\n{}\n",
                outcome.tool.context_label(),
                payload_json
            ));
        }
    }

    let failed = execution.failed_names();
    if !failed.is_empty() {
        prompt.push_str(&format!(
            "\nNote: Could not fetch data from: {}. Acknowledge this limitation if relevant to the query.\n",
            failed.join(", ")
        ));
    }

    if let Some(synthesis) = synthesis {
        if synthesis.synthesis_type != SynthesisType::Simple {
            if !synthesis.key_insights.is_empty() {
                prompt.push_str("\nKey Insights from Data Analysis:\n");
                for insight in &synthesis.key_insights {
                    prompt.push_str(&format!("- {}\n", insight));
                }
            }
            if !synthesis.data_correlations.is_empty() {
                prompt.push_str("\nData Correlations Found:\n");
                for correlation in &synthesis.data_correlations {
                    prompt.push_str(&format!("- {}\n", correlation));
                }
            }
            if !synthesis.risk_factors.is_empty() {
                prompt.push_str("\nRisk Factors to Consider:\n");
                for risk in &synthesis.risk_factors {
                    prompt.push_str(&format!("- {}\n", risk));
                }
            }
            if !synthesis.opportunities.is_empty() {
                prompt.push_str("\nOpportunities Identified:\n");
                for opportunity in &synthesis.opportunities {
                    prompt.push_str(&format!("- {}\n", opportunity));
                }
            }
        }
    }

    let crop = knowledge.extract_crop(message);
    let hits = knowledge.retrieve(message, crop);
    if !hits.is_empty() {
        prompt.push_str("\nRELEVANT AGRICULTURAL KNOWLEDGE:\n");
        for hit in &hits {
            prompt.push_str(&format!("- {}\n", hit.content));
        }
    }

    prompt.push_str(&format!(
        "\nFORMAT RULES:\n\
         - Respond ONLY in {}.\n\
         - Plain text only. No markdown, no asterisks, no headers.\n\
         - Short sentences a farmer can follow on a phone call.\n\
         - For price questions: commodity, market, price per quintal and date, under 100 words.\n\
         - Give practical steps, not theory.\n\
         - If data was unavailable, say so briefly and still give general guidance.",
        language_name
    ));

    prompt
}

/// Run the response stage. A completion failure here is fatal for the
/// request and propagates to the caller.
pub async fn respond(
    completion: &dyn CompletionBackend,
    knowledge: &KnowledgeBase,
    message: &str,
    analysis: &QueryAnalysis,
    execution: &ToolExecution,
    synthesis: Option<&SynthesisOutcome>,
    history: &[ChatTurn],
) -> Result<String, String> {
    let system = build_system_prompt(knowledge, message, analysis, execution, synthesis);

    let mut messages = Vec::with_capacity(HISTORY_WINDOW + 2);
    messages.push(Message {
        role: MessageRole::System,
        content: system,
    });

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    for turn in &history[start..] {
        let role = match turn.role.as_str() {
            "user" => MessageRole::User,
            "assistant" => MessageRole::Assistant,
            _ => continue,
        };
        messages.push(Message {
            role,
            content: turn.content.clone(),
        });
    }

    messages.push(Message {
        role: MessageRole::User,
        content: message.to_string(),
    });

    let reply = completion.generate(messages).await?;
    Ok(markdown::clean_markdown(&reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::analysis::parse_analysis;
    use crate::agent::executor::execute_tools;
    use crate::agent::synthesis::synthesize;
    use crate::agent::testkit::{MockGateway, ScriptedBackend};
    use crate::mcp::GatewayPayload;
    use serde_json::json;

    #[tokio::test]
    async fn test_prompt_carries_used_tool_data_and_caveat() {
        let gateway = MockGateway::new()
            .script(
                "crop-price",
                Ok(GatewayPayload::data(json!({"records": [{"modal_price": "2275"}]}))),
            )
            .script("weather", Err("connection refused".to_string()));
        let analysis = parse_analysis(
            r#"{"language": "hi", "needs_crop_price": true, "needs_weather": true}"#,
        )
        .unwrap();
        let execution = execute_tools(&gateway, &analysis, "wheat price").await;

        let knowledge = KnowledgeBase::new();
        let prompt = build_system_prompt(&knowledge, "wheat price", &analysis, &execution, None);

        assert!(prompt.contains("Hindi"));
        assert!(prompt.contains("Current Crop Price Data"));
        assert!(prompt.contains("2275"));
        assert!(prompt.contains("Could not fetch data from: weather"));
        assert!(!prompt.contains("Weather Data:"));
    }

    #[tokio::test]
    async fn test_prompt_includes_synthesis_sections_for_non_simple() {
        let gateway = MockGateway::new().script(
            "crop-price",
            Ok(GatewayPayload::data(json!({"records": [{"modal_price": "2275"}]}))),
        );
        let analysis = parse_analysis(
            r#"{"complexity_level": "moderate", "needs_crop_price": true}"#,
        )
        .unwrap();
        let execution = execute_tools(&gateway, &analysis, "sell now?").await;

        let reply = json!({
            "key_insights": ["prices firm this week"],
            "risk_factors": ["storm forecast"],
            "opportunities": ["mandi demand high"]
        })
        .to_string();
        let completion = ScriptedBackend::new(vec![Ok(reply)]);
        let synthesis = synthesize(&completion, &analysis, &execution).await;

        let knowledge = KnowledgeBase::new();
        let prompt =
            build_system_prompt(&knowledge, "sell now?", &analysis, &execution, Some(&synthesis));

        assert!(prompt.contains("Key Insights from Data Analysis:"));
        assert!(prompt.contains("prices firm this week"));
        assert!(prompt.contains("Risk Factors to Consider:"));
        assert!(prompt.contains("Opportunities Identified:"));
    }

    #[test]
    fn test_prompt_adds_knowledge_for_known_crops() {
        let knowledge = KnowledgeBase::new();
        let analysis = parse_analysis(r#"{"language": "en"}"#).unwrap();
        let execution = ToolExecution::default();

        let message = "when should I sow wheat";
        let prompt = build_system_prompt(&knowledge, message, &analysis, &execution, None);

        assert!(prompt.contains("RELEVANT AGRICULTURAL KNOWLEDGE:"));
        assert!(prompt.to_lowercase().contains("wheat"));
    }

    #[tokio::test]
    async fn test_respond_maps_history_and_cleans_markdown() {
        let completion = ScriptedBackend::new(vec![Ok("**Sow** in early November.".to_string())]);
        let knowledge = KnowledgeBase::new();
        let analysis = parse_analysis(r#"{"language": "en"}"#).unwrap();
        let execution = ToolExecution::default();

        use crate::locale::Language;
        let mut history = Vec::new();
        for i in 0..5 {
            history.push(ChatTurn::user(format!("question {}", i), Language::En));
            history.push(ChatTurn::assistant(
                format!("answer {}", i),
                Language::En,
                Vec::new(),
            ));
        }

        let answer = respond(
            &completion,
            &knowledge,
            "when to sow wheat",
            &analysis,
            &execution,
            None,
            &history,
        )
        .await
        .unwrap();

        assert_eq!(answer, "Sow in early November.");

        let calls = completion.calls.lock();
        let messages = &calls[0];
        // system + 6 history turns + current message
        assert_eq!(messages.len(), 8);
        assert_eq!(messages[1].content, "question 2");
        assert_eq!(messages.last().unwrap().content, "when to sow wheat");
    }
}
