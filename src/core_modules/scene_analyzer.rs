// THEORY:
// The `SceneAnalyzer` turns the newest thermal image into a short list of
// human-readable observations by asking the vision service and then digging a
// structured answer out of whatever free text comes back.
//
// Key architectural principles:
// 1.  **Fault-Tolerant Extraction**: Model replies are noisy. They wrap JSON in
//     prose and code fences, or skip the JSON entirely. Extraction follows a fixed
//     recipe: take the first ```json fence (or `{}` when there is none), parse it,
//     take the value of the last declared key, drop its first slot, stringify the
//     rest. Any step that fails yields an empty assessment.
// 2.  **Tagged Outcome**: Internally the result is an `Extraction`, either
//     `Parsed` or `Degraded` with a reason. Callers only see a `SceneAssessment`,
//     but the log can tell "the service replied unusably" apart from "the service
//     is down" (which is an `AnalysisServiceError` and propagates).
// 3.  **Compatibility Quirk**: The prompt reserves the first element of the summary
//     array. Dropping it is part of the contract with the prompt and is on by
//     default; `drop_first_summary_item` turns it off.

use crate::core_modules::utils::image_helper::image_helper;
use crate::core_modules::vision_service::{
    ANALYSIS_PROMPT, AnalysisServiceError, VisionRequest, VisionService,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";
const EMPTY_OBJECT: &str = "{}";

/// Why a reply produced no usable observations.
#[derive(Debug, Clone, PartialEq)]
pub enum DegradeReason {
    /// The candidate text was not valid JSON.
    MalformedJson(String),
    /// The candidate parsed, but not to an object.
    NotAnObject,
    /// The object had no keys (also the no-fence case).
    EmptyObject,
    /// The last key's value was not an array.
    NotASequence,
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradeReason::MalformedJson(err) => write!(f, "malformed json: {err}"),
            DegradeReason::NotAnObject => write!(f, "top-level value is not an object"),
            DegradeReason::EmptyObject => write!(f, "object has no keys"),
            DegradeReason::NotASequence => write!(f, "last key is not an array"),
        }
    }
}

/// Outcome of pulling observations out of a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Parsed(Vec<String>),
    Degraded {
        /// Whether a ```json fence was present in the reply.
        fence_found: bool,
        reason: DegradeReason,
    },
}

impl Extraction {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Extraction::Degraded { .. })
    }
}

/// The observations for the newest frame. Empty when analysis degraded or failed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SceneAssessment(Vec<String>);

impl SceneAssessment {
    pub fn new(items: Vec<String>) -> Self {
        Self(items)
    }

    pub fn items(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The text panel: a heading followed by one bullet per observation.
    pub fn render_panel(&self) -> String {
        let bullets: Vec<String> = self.0.iter().map(|item| format!("• {item}")).collect();
        format!("Analysis:\n\n{}", bullets.join("\n\n"))
    }
}

impl From<&Extraction> for SceneAssessment {
    fn from(extraction: &Extraction) -> Self {
        match extraction {
            Extraction::Parsed(items) => Self(items.clone()),
            Extraction::Degraded { .. } => Self::default(),
        }
    }
}

/// Inner text of the first ```json fence, closed by the next ``` after at least
/// one character.
pub fn fenced_json(reply: &str) -> Option<&str> {
    let open = reply.find(JSON_FENCE)?;
    let rest = &reply[open + JSON_FENCE.len()..];
    let first = rest.chars().next()?.len_utf8();
    let close = rest[first..].find(FENCE)? + first;
    Some(&rest[..close])
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Applies the extraction recipe to a raw reply.
pub fn extract_observations(reply: &str, drop_first_summary_item: bool) -> Extraction {
    let fenced = fenced_json(reply);
    let fence_found = fenced.is_some();
    let degraded = |reason| Extraction::Degraded {
        fence_found,
        reason,
    };

    let parsed: Value = match serde_json::from_str(fenced.unwrap_or(EMPTY_OBJECT)) {
        Ok(value) => value,
        Err(err) => return degraded(DegradeReason::MalformedJson(err.to_string())),
    };
    let Value::Object(object) = parsed else {
        return degraded(DegradeReason::NotAnObject);
    };
    // `preserve_order` keeps declaration order, so the last entry is the last key.
    let Some((_, last)) = object.iter().next_back() else {
        return degraded(DegradeReason::EmptyObject);
    };
    let Value::Array(items) = last else {
        return degraded(DegradeReason::NotASequence);
    };

    let skip = usize::from(drop_first_summary_item);
    Extraction::Parsed(items.iter().skip(skip).map(stringify).collect())
}

/// Base64 JPEG of the artifact at `path`.
pub fn encode_artifact(path: &Path) -> Result<String, AnalysisServiceError> {
    let bytes = image_helper::jpeg_bytes(path).map_err(|source| AnalysisServiceError::Artifact {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(STANDARD.encode(bytes))
}

/// One completed round trip to the vision service.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneAnalysis {
    pub raw_reply: String,
    pub extraction: Extraction,
}

impl SceneAnalysis {
    pub fn assessment(&self) -> SceneAssessment {
        SceneAssessment::from(&self.extraction)
    }
}

pub struct SceneAnalyzer<S> {
    service: S,
    prompt: String,
    drop_first_summary_item: bool,
}

impl<S: VisionService> SceneAnalyzer<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            prompt: ANALYSIS_PROMPT.to_string(),
            drop_first_summary_item: true,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn drop_first_summary_item(mut self, drop: bool) -> Self {
        self.drop_first_summary_item = drop;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Sends the artifact to the service once and extracts observations.
    /// Only service and artifact failures are errors; unusable replies are not.
    pub async fn analyze(&self, artifact: &Path) -> Result<SceneAnalysis, AnalysisServiceError> {
        let request = VisionRequest {
            prompt: self.prompt.clone(),
            image_base64: encode_artifact(artifact)?,
        };
        let raw_reply = self.service.complete(&request).await?;
        debug!(reply = %raw_reply, "vision service reply");

        let extraction = extract_observations(&raw_reply, self.drop_first_summary_item);
        match &extraction {
            Extraction::Parsed(items) => {
                debug!(observations = items.len(), "scene assessment extracted");
            }
            Extraction::Degraded { fence_found, reason } => {
                warn!(fence_found, %reason, "vision reply unusable, assessment left empty");
            }
        }

        Ok(SceneAnalysis {
            raw_reply,
            extraction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_summary_and_drops_first_slot() {
        let reply = "Here you go:\n```json\n{\"a\":1,\"b\":[0,\"x\",\"y\"]}\n```";
        assert_eq!(
            extract_observations(reply, true),
            Extraction::Parsed(vec!["x".to_string(), "y".to_string()])
        );
    }

    #[test]
    fn keeps_first_slot_when_toggled_off() {
        let reply = "```json\n{\"b\":[\"head\",\"x\"]}\n```";
        assert_eq!(
            extract_observations(reply, false),
            Extraction::Parsed(vec!["head".to_string(), "x".to_string()])
        );
    }

    #[test]
    fn non_string_items_are_stringified() {
        let reply = "```json{\"s\":[null, 3, true, \"t\", [1,2], {\"k\":\"v\"}]}```";
        assert_eq!(
            extract_observations(reply, true),
            Extraction::Parsed(vec![
                "3".to_string(),
                "true".to_string(),
                "t".to_string(),
                "[1,2]".to_string(),
                "{\"k\":\"v\"}".to_string(),
            ])
        );
    }

    #[test]
    fn uses_last_declared_key_not_alphabetical_last() {
        let reply = "```json\n{\"zeta\": [0, \"wrong\"], \"alpha\": [0, \"right\"]}\n```";
        assert_eq!(
            extract_observations(reply, true),
            Extraction::Parsed(vec!["right".to_string()])
        );
    }

    #[test]
    fn missing_fence_degrades_to_empty_object() {
        let extraction = extract_observations("{\"a\": [0, \"x\"]}", true);
        assert_eq!(
            extraction,
            Extraction::Degraded {
                fence_found: false,
                reason: DegradeReason::EmptyObject
            }
        );
        assert!(SceneAssessment::from(&extraction).is_empty());
    }

    #[test]
    fn malformed_json_degrades() {
        let extraction = extract_observations("```json\n{\"a\": [0, \"x\"\n```", true);
        assert!(matches!(
            extraction,
            Extraction::Degraded {
                fence_found: true,
                reason: DegradeReason::MalformedJson(_)
            }
        ));
    }

    #[test]
    fn non_array_last_value_degrades() {
        let extraction = extract_observations("```json\n{\"a\": [0], \"b\": \"text\"}\n```", true);
        assert_eq!(
            extraction,
            Extraction::Degraded {
                fence_found: true,
                reason: DegradeReason::NotASequence
            }
        );
    }

    #[test]
    fn top_level_array_degrades() {
        let extraction = extract_observations("```json\n[0, 1]\n```", true);
        assert!(matches!(
            extraction,
            Extraction::Degraded {
                reason: DegradeReason::NotAnObject,
                ..
            }
        ));
    }

    #[test]
    fn short_summary_arrays_yield_empty_but_parsed() {
        let reply = "```json\n{\"a\": []}\n```";
        assert_eq!(extract_observations(reply, true), Extraction::Parsed(vec![]));
    }

    #[test]
    fn fence_takes_first_block_and_needs_content() {
        assert_eq!(fenced_json("x ```json {} ``` y ```json [] ```"), Some(" {} "));
        assert_eq!(fenced_json("```json"), None);
        assert_eq!(fenced_json("```json {\"a\":1}"), None);
        assert_eq!(fenced_json("```json```"), None);
        assert_eq!(fenced_json("```json``` ```"), Some("``` "));
    }

    #[test]
    fn panel_renders_bullets() {
        let assessment = SceneAssessment::new(vec!["one".to_string(), "two".to_string()]);
        assert_eq!(assessment.render_panel(), "Analysis:\n\n• one\n\n• two");
        assert_eq!(SceneAssessment::default().render_panel(), "Analysis:\n\n");
    }
}
