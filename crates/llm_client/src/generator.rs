//! Advisory generation with an ordered model fallback chain.

use crate::client::GenerativeTransport;
use crate::types::{DecodingParams, GenerationRequest, TransportError};
use common::{Advisory, Error};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct AdvisoryGenerator {
    transport: Arc<dyn GenerativeTransport>,
    models: Vec<String>,
    decoding: DecodingParams,
}

impl AdvisoryGenerator {
    pub fn new(transport: Arc<dyn GenerativeTransport>, models: Vec<String>) -> Self {
        Self {
            transport,
            models,
            decoding: DecodingParams::deterministic(),
        }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Try each model in order; the first non-empty text wins.
    /// Returns the winning model id with its text.
    pub async fn generate_text(&self, prompt: &str) -> Result<(String, String), Error> {
        let mut last_err: Option<TransportError> = None;

        for model_id in &self.models {
            let request = GenerationRequest {
                model_id: model_id.clone(),
                prompt: prompt.to_string(),
                decoding: self.decoding.clone(),
            };

            match self.transport.generate_text(&request).await {
                Ok(text) if !text.trim().is_empty() => {
                    return Ok((model_id.clone(), text.trim().to_string()));
                }
                Ok(_) => {
                    warn!("Model {} returned empty text", model_id);
                    last_err = Some(TransportError::EmptyResponse);
                }
                Err(e) => {
                    warn!("Model {} failed: {}", model_id, e);
                    last_err = Some(e);
                }
            }
        }

        Err(Error::GenerationFailed(match last_err {
            Some(e) => format!(
                "all {} models failed; last error: {}",
                self.models.len(),
                e
            ),
            None => "no models configured".to_string(),
        }))
    }

    #[instrument(skip_all)]
    pub async fn generate(&self, prompt: &str) -> Result<Advisory, Error> {
        let (model_id, text) = self.generate_text(prompt).await?;
        let advisory = parse_advisory(&text)?;
        info!(
            "Advisory generated by {}: safe_to_go_out={} recommendations={}",
            model_id,
            advisory.safe_to_go_out,
            advisory.recommendations.len()
        );
        Ok(advisory)
    }
}

/// First balanced `{...}` substring of `text`, skipping braces inside JSON strings.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse model text into an `Advisory`. All three fields must be present
/// with the right types; nothing is coerced.
pub fn parse_advisory(text: &str) -> Result<Advisory, Error> {
    let json = extract_json_object(text).ok_or_else(|| {
        Error::MalformedAdvisory("no JSON object found in model output".into())
    })?;

    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::MalformedAdvisory(format!("invalid JSON: {e}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| Error::MalformedAdvisory("output is not a JSON object".into()))?;

    let safe_to_go_out = object
        .get("safe_to_go_out")
        .and_then(Value::as_bool)
        .ok_or_else(|| Error::MalformedAdvisory("safe_to_go_out must be a boolean".into()))?;

    let risk_summary = object
        .get("risk_summary")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedAdvisory("risk_summary must be a string".into()))?
        .to_string();

    let recommendations = object
        .get("recommendations")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::MalformedAdvisory("recommendations must be an array".into()))?
        .iter()
        .map(|r| {
            r.as_str().map(str::to_string).ok_or_else(|| {
                Error::MalformedAdvisory("recommendations must contain only strings".into())
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Advisory {
        safe_to_go_out,
        risk_summary,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Mutex, MutexGuard};

    const VALID: &str = concat!(
        r#"{"safe_to_go_out": true, "risk_summary": "Low risk.", "#,
        r#""recommendations": ["Enjoy a walk"]}"#
    );
    const UNSAFE: &str = r#"{"safe_to_go_out": false, "risk_summary": "x", "recommendations": []}"#;
    const PROSE_WITHOUT_FIELDS: &str =
        "Sure! Here is the data: {\"safe_to_go_out\": true, \"oops\": 1}";

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().expect("mock mutex should not be poisoned")
    }

    // Scripted transport: per-model outcome, records call order.
    struct MockTransport {
        outcomes: HashMap<String, Result<String, String>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockTransport {
        fn new(outcomes: Vec<(&str, Result<&str, &str>)>) -> Self {
            Self {
                outcomes: outcomes
                    .into_iter()
                    .map(|(m, r)| {
                        let outcome = r.map(str::to_string).map_err(str::to_string);
                        (m.to_string(), outcome)
                    })
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            lock(&self.calls).clone()
        }
    }

    #[async_trait]
    impl GenerativeTransport for MockTransport {
        async fn generate_text(
            &self,
            request: &GenerationRequest,
        ) -> Result<String, TransportError> {
            lock(&self.calls).push(request.model_id.clone());
            assert_eq!(request.decoding, DecodingParams::deterministic());
            match self.outcomes.get(&request.model_id) {
                Some(Ok(text)) => Ok(text.clone()),
                Some(Err(msg)) => Err(TransportError::ApiError(msg.clone())),
                None => Err(TransportError::HttpStatus {
                    status: 404,
                    body: "model not found".into(),
                }),
            }
        }
    }

    fn models(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|m| m.to_string()).collect()
    }

    #[tokio::test]
    async fn test_fallback_stops_at_first_success() {
        let transport = Arc::new(MockTransport::new(vec![
            ("m1", Err("quota exceeded")),
            ("m2", Err("unavailable")),
            ("m3", Ok(VALID)),
            ("m4", Ok(UNSAFE)),
        ]));
        let order = models(&["m1", "m2", "m3", "m4"]);
        let generator = AdvisoryGenerator::new(transport.clone(), order);

        let advisory = generator.generate("prompt").await.expect("m3 should succeed");
        assert!(advisory.safe_to_go_out);
        assert_eq!(advisory.risk_summary, "Low risk.");
        assert_eq!(transport.calls(), models(&["m1", "m2", "m3"]));
    }

    #[tokio::test]
    async fn test_empty_text_falls_through_to_next_model() {
        let transport = Arc::new(MockTransport::new(vec![
            ("m1", Ok("   ")),
            ("m2", Ok(VALID)),
        ]));
        let generator = AdvisoryGenerator::new(transport.clone(), models(&["m1", "m2"]));

        let (winner, _) = generator.generate_text("p").await.expect("m2 should win");
        assert_eq!(winner, "m2");
    }

    #[tokio::test]
    async fn test_all_models_failing_surfaces_last_error() {
        let transport = Arc::new(MockTransport::new(vec![
            ("m1", Err("first failure")),
            ("m2", Err("second failure")),
        ]));
        let generator = AdvisoryGenerator::new(transport.clone(), models(&["m1", "m2"]));

        match generator.generate("p").await {
            Err(Error::GenerationFailed(msg)) => {
                assert!(msg.contains("second failure"), "got: {msg}");
                assert!(!msg.contains("first failure"));
            }
            other => panic!("expected GenerationFailed, got {other:?}"),
        }
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_no_models_is_generation_failed() {
        let transport = Arc::new(MockTransport::new(vec![]));
        let generator = AdvisoryGenerator::new(transport, Vec::new());
        assert!(matches!(
            generator.generate("p").await,
            Err(Error::GenerationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_winner_does_not_try_later_models() {
        let transport = Arc::new(MockTransport::new(vec![
            ("m1", Ok(PROSE_WITHOUT_FIELDS)),
            ("m2", Ok(VALID)),
        ]));
        let generator = AdvisoryGenerator::new(transport.clone(), models(&["m1", "m2"]));

        assert!(matches!(
            generator.generate("p").await,
            Err(Error::MalformedAdvisory(_))
        ));
        assert_eq!(transport.calls(), models(&["m1"]));
    }

    #[test]
    fn test_extract_tolerates_surrounding_prose() {
        let text = "Here you go:\n```json\n{\"a\": {\"b\": \"}\"}}\n```\nAnything else? {\"c\": 1}";
        assert_eq!(extract_json_object(text), Some("{\"a\": {\"b\": \"}\"}}"));
    }

    #[test]
    fn test_extract_handles_escaped_quotes() {
        let text = r#"{"s": "say \"{hi}\""} trailing"#;
        assert_eq!(extract_json_object(text), Some(r#"{"s": "say \"{hi}\""}"#));
    }

    #[test]
    fn test_extract_unbalanced_is_none() {
        assert_eq!(extract_json_object("{\"a\": 1"), None);
        assert_eq!(extract_json_object("no braces"), None);
    }

    #[test]
    fn test_missing_fields_is_malformed() {
        let result = parse_advisory(PROSE_WITHOUT_FIELDS);
        assert!(matches!(result, Err(Error::MalformedAdvisory(_))));
    }

    #[test]
    fn test_wrong_types_are_not_coerced() {
        for text in [
            r#"{"safe_to_go_out": "true", "risk_summary": "s", "recommendations": []}"#,
            r#"{"safe_to_go_out": true, "risk_summary": 3, "recommendations": []}"#,
            r#"{"safe_to_go_out": true, "risk_summary": "s", "recommendations": "wear a mask"}"#,
            r#"{"safe_to_go_out": true, "risk_summary": "s", "recommendations": ["ok", 2]}"#,
        ] {
            assert!(
                matches!(parse_advisory(text), Err(Error::MalformedAdvisory(_))),
                "should reject: {text}"
            );
        }
    }

    #[test]
    fn test_valid_output_parses() {
        let advisory = parse_advisory(&format!("```json\n{VALID}\n```")).expect("valid advisory");
        assert_eq!(advisory.recommendations, vec!["Enjoy a walk".to_string()]);
    }
}
