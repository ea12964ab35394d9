//! Query analysis stage.
//!
//! First model call of the pipeline: classify the farmer's message into a
//! typed [`QueryAnalysis`] (agricultural or not, language, complexity, which
//! tools to run and with what parameters). Model output is JSON; decoding is
//! deliberately forgiving. A malformed reply degrades to
//! [`QueryAnalysis::fallback`] instead of failing the request, so only a
//! completion transport error propagates out of this stage.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator};

use crate::ai::{CompletionBackend, Message, MessageRole};
use crate::locale::Language;
use crate::models::Complexity;

/// Gate family deciding how a tool's `used` verdict is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFamily {
    /// Price lookups; used only when records came back.
    Market,
    /// Web search; used only when results came back.
    Search,
    /// Advisory data; used whenever the gateway reported no error.
    Advisory,
}

/// The seven remote tools, in execution and reporting order.
///
/// Declaration order is load-bearing: tool fan-out results are collected in
/// this order, which keeps `tools_used` and the response context
/// deterministic for a given analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ToolKind {
    CropPrice,
    MandiPrice,
    Search,
    SoilHealth,
    Weather,
    PestIdentifier,
    SchemeTool,
}

impl ToolKind {
    pub fn family(self) -> ToolFamily {
        match self {
            ToolKind::CropPrice | ToolKind::MandiPrice => ToolFamily::Market,
            ToolKind::Search => ToolFamily::Search,
            ToolKind::SoilHealth
            | ToolKind::Weather
            | ToolKind::PestIdentifier
            | ToolKind::SchemeTool => ToolFamily::Advisory,
        }
    }

    /// Section title for this tool's data in the response prompt.
    pub fn context_label(self) -> &'static str {
        match self {
            ToolKind::CropPrice => "Current Crop Price Data",
            ToolKind::MandiPrice => "Mandi Price Data",
            ToolKind::Search => "Web Search Results",
            ToolKind::SoilHealth => "Soil Health Data",
            ToolKind::Weather => "Weather Data",
            ToolKind::PestIdentifier => "Pest Identification Data",
            ToolKind::SchemeTool => "Government Scheme Data",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CropPriceParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commodity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemeToolParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
}

/// Typed analysis of one farmer message.
///
/// Every field tolerates being absent so a partially well-formed model reply
/// still decodes; a reply that is not JSON at all is replaced wholesale by
/// [`QueryAnalysis::fallback`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    #[serde(default = "default_true")]
    pub is_agricultural: bool,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub complexity_level: Complexity,
    #[serde(default)]
    pub needs_crop_price: bool,
    #[serde(default)]
    pub needs_mandi_price: bool,
    #[serde(default)]
    pub needs_web_search: bool,
    #[serde(default)]
    pub needs_soil_health: bool,
    #[serde(default)]
    pub needs_weather: bool,
    #[serde(default)]
    pub needs_pest_identifier: bool,
    #[serde(default)]
    pub needs_scheme_tool: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_price_params: Option<CropPriceParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandi_price_params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_health_params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pest_identifier_params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme_tool_params: Option<SchemeToolParams>,
    #[serde(default)]
    pub reasoning_steps: Vec<String>,
    #[serde(default)]
    pub synthesis_requirements: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_true() -> bool {
    true
}

fn default_confidence() -> f64 {
    0.8
}

impl QueryAnalysis {
    /// Safe analysis substituted when the model reply cannot be decoded.
    /// Treats the message as agricultural so the farmer still gets an
    /// answer, with no tools and reduced confidence.
    pub fn fallback() -> Self {
        QueryAnalysis {
            is_agricultural: true,
            language: Language::En,
            complexity_level: Complexity::Simple,
            needs_crop_price: false,
            needs_mandi_price: false,
            needs_web_search: false,
            needs_soil_health: false,
            needs_weather: false,
            needs_pest_identifier: false,
            needs_scheme_tool: false,
            crop_price_params: None,
            mandi_price_params: None,
            search_query: None,
            soil_health_params: None,
            weather_params: None,
            pest_identifier_params: None,
            scheme_tool_params: None,
            reasoning_steps: vec!["Falling back to general agricultural guidance".to_string()],
            synthesis_requirements: Vec::new(),
            confidence: 0.5,
        }
    }

    pub fn requested(&self, kind: ToolKind) -> bool {
        match kind {
            ToolKind::CropPrice => self.needs_crop_price,
            ToolKind::MandiPrice => self.needs_mandi_price,
            ToolKind::Search => self.needs_web_search,
            ToolKind::SoilHealth => self.needs_soil_health,
            ToolKind::Weather => self.needs_weather,
            ToolKind::PestIdentifier => self.needs_pest_identifier,
            ToolKind::SchemeTool => self.needs_scheme_tool,
        }
    }

    /// Flagged tools in declaration order.
    pub fn requested_tools(&self) -> Vec<ToolKind> {
        ToolKind::iter().filter(|kind| self.requested(*kind)).collect()
    }

    /// Gateway parameters for one tool invocation. `message` backs the
    /// search query when the analysis did not provide one.
    pub fn gateway_params(&self, kind: ToolKind, message: &str) -> Value {
        match kind {
            ToolKind::CropPrice => self
                .crop_price_params
                .as_ref()
                .and_then(|p| serde_json::to_value(p).ok())
                .unwrap_or_else(|| json!({})),
            ToolKind::MandiPrice => self.mandi_price_params.clone().unwrap_or_else(|| json!({})),
            ToolKind::Search => {
                let query = self
                    .search_query
                    .clone()
                    .unwrap_or_else(|| message.to_string());
                json!({ "query": query, "num_results": 5 })
            }
            ToolKind::SoilHealth => self.soil_health_params.clone().unwrap_or_else(|| json!({})),
            ToolKind::Weather => self.weather_params.clone().unwrap_or_else(|| json!({})),
            ToolKind::PestIdentifier => self
                .pest_identifier_params
                .clone()
                .unwrap_or_else(|| json!({})),
            ToolKind::SchemeTool => self
                .scheme_tool_params
                .as_ref()
                .and_then(|p| serde_json::to_value(p).ok())
                .unwrap_or_else(|| json!({})),
        }
    }
}

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());

/// Unwrap a fenced code block when the model added one, else trim.
pub(crate) fn strip_code_fence(raw: &str) -> &str {
    match CODE_FENCE.captures(raw) {
        Some(captures) => captures.get(1).map_or(raw.trim(), |m| m.as_str()),
        None => raw.trim(),
    }
}

pub(crate) fn parse_analysis(raw: &str) -> Result<QueryAnalysis, serde_json::Error> {
    serde_json::from_str(strip_code_fence(raw))
}

fn system_prompt() -> String {
    r#"You are the query analyzer for an Indian farmer advisory service.
Analyze the farmer's message and respond with ONLY a JSON object, no other
text, using exactly these fields:

{
  "is_agricultural": true,
  "language": "en",
  "complexity_level": "simple",
  "needs_crop_price": false,
  "needs_mandi_price": false,
  "needs_web_search": false,
  "needs_soil_health": false,
  "needs_weather": false,
  "needs_pest_identifier": false,
  "needs_scheme_tool": false,
  "crop_price_params": {"state": "...", "commodity": "...", "district": "..."},
  "mandi_price_params": {},
  "search_query": "...",
  "soil_health_params": {},
  "weather_params": {},
  "pest_identifier_params": {},
  "scheme_tool_params": {"damage_type": "...", "crop_type": "...", "state": "...", "district": "..."},
  "reasoning_steps": ["..."],
  "synthesis_requirements": ["..."],
  "confidence": 0.8
}

Guidelines:
- is_agricultural: false ONLY when the message has no farming relevance at all
  (jokes, movies, programming help). Greetings from a farmer count as agricultural.
- language: the code of the language the farmer wrote in, one of
  en, hi, ta, te, mr, bn, gu, kn, ml, pa.
- complexity_level: "simple" for one factual question, "moderate" when two or
  more data sources must be combined, "complex" for multi-step planning or
  season-long decisions.
- Set a needs_* flag only when live data would materially improve the answer.
- crop_price_params / mandi_price_params need Indian state and commodity
  names in English (e.g. "Punjab", "Wheat").
- search_query: a concise English web query, only when needs_web_search.
- Include a params object only for tools you flagged.
- reasoning_steps: short notes on how you decided.
- synthesis_requirements: what a cross-source synthesis should focus on, only
  for moderate or complex queries.
- confidence: 0.0 to 1.0 for this analysis."#
        .to_string()
}

/// Run the analysis stage. `Err` only on completion transport failure.
pub async fn analyze(
    completion: &dyn CompletionBackend,
    message: &str,
) -> Result<QueryAnalysis, String> {
    let messages = vec![
        Message {
            role: MessageRole::System,
            content: system_prompt(),
        },
        Message {
            role: MessageRole::User,
            content: message.to_string(),
        },
    ];

    let raw = completion.generate(messages).await?;

    match parse_analysis(&raw) {
        Ok(analysis) => Ok(analysis),
        Err(e) => {
            log::warn!("[ANALYSIS] Unparseable analysis output ({}), using fallback", e);
            Ok(QueryAnalysis::fallback())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_are_kebab_case() {
        assert_eq!(ToolKind::CropPrice.as_ref(), "crop-price");
        assert_eq!(ToolKind::MandiPrice.as_ref(), "mandi-price");
        assert_eq!(ToolKind::Search.as_ref(), "search");
        assert_eq!(ToolKind::SoilHealth.as_ref(), "soil-health");
        assert_eq!(ToolKind::Weather.as_ref(), "weather");
        assert_eq!(ToolKind::PestIdentifier.as_ref(), "pest-identifier");
        assert_eq!(ToolKind::SchemeTool.as_ref(), "scheme-tool");
    }

    #[test]
    fn test_families() {
        assert_eq!(ToolKind::CropPrice.family(), ToolFamily::Market);
        assert_eq!(ToolKind::MandiPrice.family(), ToolFamily::Market);
        assert_eq!(ToolKind::Search.family(), ToolFamily::Search);
        assert_eq!(ToolKind::Weather.family(), ToolFamily::Advisory);
        assert_eq!(ToolKind::SchemeTool.family(), ToolFamily::Advisory);
    }

    #[test]
    fn test_parse_full_analysis_with_fence() {
        let raw = r#"```json
{
  "is_agricultural": true,
  "language": "hi",
  "complexity_level": "moderate",
  "needs_crop_price": true,
  "needs_weather": true,
  "crop_price_params": {"state": "Punjab", "commodity": "Wheat"},
  "reasoning_steps": ["price question", "weather affects decision"],
  "synthesis_requirements": ["combine price with forecast"],
  "confidence": 0.92
}
```"#;
        let analysis = parse_analysis(raw).unwrap();
        assert!(analysis.is_agricultural);
        assert_eq!(analysis.language, Language::Hi);
        assert_eq!(analysis.complexity_level, Complexity::Moderate);
        assert_eq!(
            analysis.requested_tools(),
            vec![ToolKind::CropPrice, ToolKind::Weather]
        );
        let params = analysis.crop_price_params.as_ref().unwrap();
        assert_eq!(params.state.as_deref(), Some("Punjab"));
        assert_eq!(params.commodity.as_deref(), Some("Wheat"));
        assert!((analysis.confidence - 0.92).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_sparse_analysis_fills_defaults() {
        let analysis = parse_analysis(r#"{"language": "ta"}"#).unwrap();
        assert!(analysis.is_agricultural);
        assert_eq!(analysis.language, Language::Ta);
        assert_eq!(analysis.complexity_level, Complexity::Simple);
        assert!(analysis.requested_tools().is_empty());
        assert!((analysis.confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unparseable_output_is_an_error() {
        assert!(parse_analysis("I think this is about wheat prices.").is_err());
        assert!(parse_analysis("").is_err());
    }

    #[test]
    fn test_fallback_shape() {
        let fallback = QueryAnalysis::fallback();
        assert!(fallback.is_agricultural);
        assert_eq!(fallback.language, Language::En);
        assert_eq!(fallback.complexity_level, Complexity::Simple);
        assert!(fallback.requested_tools().is_empty());
        assert_eq!(fallback.reasoning_steps.len(), 1);
        assert!((fallback.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_requested_tools_follow_declaration_order() {
        let analysis = parse_analysis(
            r#"{"needs_scheme_tool": true, "needs_crop_price": true, "needs_web_search": true}"#,
        )
        .unwrap();
        assert_eq!(
            analysis.requested_tools(),
            vec![ToolKind::CropPrice, ToolKind::Search, ToolKind::SchemeTool]
        );
    }

    #[test]
    fn test_search_params_fall_back_to_message() {
        let analysis = parse_analysis(r#"{"needs_web_search": true}"#).unwrap();
        let params = analysis.gateway_params(ToolKind::Search, "pm kisan latest installment");
        assert_eq!(params["query"], "pm kisan latest installment");
        assert_eq!(params["num_results"], 5);

        let analysis =
            parse_analysis(r#"{"needs_web_search": true, "search_query": "wheat msp 2024"}"#)
                .unwrap();
        let params = analysis.gateway_params(ToolKind::Search, "ignored");
        assert_eq!(params["query"], "wheat msp 2024");
    }

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }
}
