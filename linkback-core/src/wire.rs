//! Formato de requisição e o subconjunto consumido das respostas do anotador remoto.
//!
//! Os campos de diagnóstico (commonness, pagerank, ...) são opcionais na leitura:
//! só `start`, `end`, `id` e o ranking de candidatos são essenciais.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::annotation::Mention;
use crate::error::{AnnotationError, AnnotationResult};

/// Corpo enviado ao serviço.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spans: Option<Vec<SpanConstraint>>,
    pub text: String,
}

impl RequestPayload {
    pub fn text(text: &str) -> Self {
        Self {
            spans: None,
            text: text.to_string(),
        }
    }

    /// Payload com restrições de span, ordenadas por posição para que a chave
    /// de cache não dependa da ordem de iteração das mentions.
    pub fn with_mentions<'a, I>(text: &str, mentions: I) -> Self
    where
        I: IntoIterator<Item = &'a Mention>,
    {
        let mut spans: Vec<SpanConstraint> = mentions
            .into_iter()
            .map(|m| SpanConstraint {
                start: m.position,
                end: m.end(),
            })
            .collect();
        spans.sort_by_key(|s| (s.start, s.end));
        Self {
            spans: Some(spans),
            text: text.to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        // Struct com campos primitivos: a serialização não falha
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpanConstraint {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Timing {
    #[serde(default)]
    pub total: u64,
}

/// Resposta dos endpoints `tag` e `disambiguate`.
#[derive(Debug, Clone, Deserialize)]
pub struct TagResponse {
    #[serde(default)]
    pub time: Timing,
    pub annotations: Vec<WireAnnotation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAnnotation {
    pub start: usize,
    pub end: usize,
    pub id: i64,
    #[serde(default)]
    pub rho: f64,
    #[serde(default)]
    pub link_prob: f64,
    #[serde(default)]
    pub commonness: f64,
    #[serde(default)]
    pub ambiguity: u32,
    #[serde(default)]
    pub local_coherence: f64,
    #[serde(default)]
    pub page_rank: f64,
    #[serde(default)]
    pub ranking: Vec<WireCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCandidate {
    pub id: i64,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub commonness: f64,
    #[serde(default)]
    pub page_rank: f64,
    #[serde(default)]
    pub synonymy: u32,
}

/// Resposta do endpoint `spot`.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotResponse {
    pub spots: Vec<WireSpot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireSpot {
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub ranking: Vec<WireCandidate>,
}

/// Converte o JSON já recebido no formato esperado.
pub fn parse<T: DeserializeOwned>(value: serde_json::Value) -> AnnotationResult<T> {
    serde_json::from_value(value).map_err(|e| AnnotationError::Unparsable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_without_spans() {
        let p = RequestPayload::text("obama paris");
        assert_eq!(p.to_json(), r#"{"text":"obama paris"}"#);
    }

    #[test]
    fn test_payload_spans_are_sorted() {
        let mentions = [Mention::new(10, 5), Mention::new(0, 3)];
        let p = RequestPayload::with_mentions("x", mentions.iter());
        assert_eq!(
            p.to_json(),
            r#"{"spans":[{"start":0,"end":3},{"start":10,"end":15}],"text":"x"}"#
        );
    }

    #[test]
    fn test_parse_minimal_annotation() {
        let value = json!({
            "annotations": [{"start": 0, "end": 5, "id": 42, "ranking": [{"id": 42}, {"id": 7}]}]
        });
        let resp: TagResponse = parse(value).unwrap();
        assert_eq!(resp.time.total, 0);
        assert_eq!(resp.annotations[0].ranking.len(), 2);
    }

    #[test]
    fn test_parse_diagnostics() {
        let value = json!({
            "time": {"total": 17},
            "annotations": [{
                "start": 0, "end": 5, "id": 42, "rho": 0.4, "linkProb": 0.9,
                "commonness": 0.8, "ambiguity": 3, "localCoherence": 0.1, "pageRank": 0.2,
                "ranking": [{"id": 42, "score": 0.7, "commonness": 0.8, "pageRank": 0.2, "synonymy": 5}]
            }]
        });
        let resp: TagResponse = parse(value).unwrap();
        let ann = &resp.annotations[0];
        assert_eq!(resp.time.total, 17);
        assert_eq!(ann.link_prob, 0.9);
        assert_eq!(ann.ambiguity, 3);
        assert_eq!(ann.ranking[0].synonymy, 5);
    }

    #[test]
    fn test_missing_field_is_unparsable() {
        let err = parse::<SpotResponse>(json!({"annotations": []})).unwrap_err();
        assert!(matches!(err, AnnotationError::Unparsable(_)));
    }
}
