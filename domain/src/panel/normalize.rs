//! Oracle output normalization.
//!
//! Repairs the oracle's JSON-ish text into the canonical panel shape before
//! schema validation. Three kinds of drift are reconciled:
//!
//! | Drift | Example | Canonical |
//! |-------|---------|-----------|
//! | Key names | `"Dr. Hypothesis"`, `"ACTION"`, `"tests"` | `hypothesis`, `action`, `orders` |
//! | Types | `"contradictions": "none noted"` | `["none noted"]` |
//! | Missing sections | no `"checklist"` | `{}` |
//!
//! Key-name drift is resolved through the alias tables below: for each
//! canonical key, the ordered list of accepted source keys is tried and the
//! first present, non-null value wins. New aliases are added to the tables,
//! not to the code.
//!
//! This layer does not enforce the full schema; see [`super::schema`].

use super::persona::Persona;
use serde_json::{Map, Value};
use thiserror::Error;

/// Certainty used when the oracle omits it or sends something non-numeric
pub const DEFAULT_CERTAINTY: f64 = 0.5;

/// Maximum number of differential entries kept from `top3`
pub const MAX_DIFFERENTIAL: usize = 3;

/// Accepted source keys per persona section, in priority order
const PERSONA_ALIASES: &[(Persona, &[&str])] = &[
    (
        Persona::Hypothesis,
        &["Dr. Hypothesis", "hypothesis", "Hypothesis"],
    ),
    (
        Persona::TestChooser,
        &[
            "Dr. Test-Chooser",
            "test_chooser",
            "Dr. Test Chooser",
            "testChooser",
        ],
    ),
    (
        Persona::Challenger,
        &["Dr. Challenger", "challenger", "Challenger"],
    ),
    (
        Persona::Stewardship,
        &["Dr. Stewardship", "stewardship", "Stewardship"],
    ),
    (
        Persona::Checklist,
        &["Dr. Checklist", "checklist", "Checklist"],
    ),
];

/// Accepted source keys for fields inside a persona section
const SECTION_FIELD_ALIASES: &[(Persona, &str, &[&str])] = &[
    (Persona::Hypothesis, "top3", &["top3", "differential"]),
    (Persona::TestChooser, "tests", &["tests", "proposed_tests"]),
];

/// Challenger fields that are sometimes returned as a bare string
const CHALLENGER_LIST_FIELDS: &[&str] = &["anchoring_risks", "contradictions", "falsification_tests"];

/// Accepted source keys for consensus fields
const CONSENSUS_ALIASES: &[(&str, &[&str])] = &[
    ("action", &["action", "ACTION", "Action"]),
    ("rationale", &["rationale", "reasoning"]),
    ("questions", &["questions", "questions_json"]),
    ("orders", &["orders", "orders_json", "tests"]),
    ("diagnosis", &["diagnosis", "diagnosis_json"]),
    ("certainty", &["certainty", "confidence"]),
];

/// Keys searched when `diagnosis` arrives as an object
const DIAGNOSIS_OBJECT_KEYS: &[&str] = &["diagnosis", "dx", "name"];

/// Structural parse failure of the raw oracle text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("oracle returned empty output")]
    Empty,

    #[error("oracle output is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("oracle output is JSON but not an object")]
    NotAnObject,
}

/// Oracle output in canonical key layout, not yet schema-checked
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedOutput(Value);

impl NormalizedOutput {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Parse and normalize raw oracle text.
///
/// Accepts a bare JSON object, an object inside a Markdown code fence, or an
/// object embedded in prose. Anything else is a [`ParseError`].
pub fn normalize(raw: &str) -> Result<NormalizedOutput, ParseError> {
    let root = parse_object(raw)?;
    Ok(normalize_object(&root))
}

/// Normalize an already-parsed JSON object.
pub fn normalize_object(root: &Map<String, Value>) -> NormalizedOutput {
    let empty = Map::new();
    let personas = root
        .get("personas")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let consensus = root
        .get("consensus")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut out = Map::new();
    out.insert(
        "personas".to_string(),
        Value::Object(normalize_personas(personas)),
    );
    out.insert(
        "consensus".to_string(),
        Value::Object(normalize_consensus(consensus)),
    );
    NormalizedOutput(Value::Object(out))
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let candidates = [
        Some(trimmed),
        strip_code_fence(trimmed),
        outermost_braces(trimmed),
    ];

    let mut first_error = None;
    for candidate in candidates.into_iter().flatten() {
        let error = match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => return Ok(map),
            Ok(_) => ParseError::NotAnObject,
            Err(e) => ParseError::InvalidJson(e.to_string()),
        };
        first_error.get_or_insert(error);
    }

    Err(first_error.unwrap_or(ParseError::Empty))
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    // Drop the info string ("json", "plan", ...)
    let body_start = rest.find('\n')? + 1;
    let body = &rest[body_start..];
    Some(body.trim_end().strip_suffix("```").unwrap_or(body).trim())
}

fn outermost_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// First present, non-null value among `aliases`.
fn resolve<'a>(map: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
}

fn normalize_personas(personas: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();

    for (persona, aliases) in PERSONA_ALIASES {
        let section = match resolve(personas, aliases) {
            Some(Value::Object(section)) => Value::Object(normalize_section(*persona, section)),
            // Non-object sections pass through for the validator to reject
            Some(other) => other.clone(),
            None => Value::Object(Map::new()),
        };
        out.insert(persona.key().to_string(), section);
    }

    out
}

fn normalize_section(persona: Persona, section: &Map<String, Value>) -> Map<String, Value> {
    let mut out = section.clone();

    for (owner, canonical, aliases) in SECTION_FIELD_ALIASES {
        if *owner != persona {
            continue;
        }
        if let Some(value) = resolve(section, aliases).cloned() {
            for alias in aliases.iter() {
                out.remove(*alias);
            }
            out.insert(canonical.to_string(), value);
        }
    }

    match persona {
        Persona::Hypothesis => {
            if let Some(Value::Array(entries)) = out.get_mut("top3") {
                entries.truncate(MAX_DIFFERENTIAL);
            }
        }
        Persona::Challenger => {
            for field in CHALLENGER_LIST_FIELDS {
                let coerced = to_string_list(out.get(*field));
                out.insert(field.to_string(), coerced);
            }
        }
        _ => {}
    }

    out
}

fn normalize_consensus(consensus: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    let field = |canonical: &str| {
        CONSENSUS_ALIASES
            .iter()
            .find(|(key, _)| *key == canonical)
            .and_then(|(_, aliases)| resolve(consensus, aliases))
    };

    let action = match field("action") {
        Some(Value::String(label)) => Value::String(label.trim().to_uppercase()),
        Some(other) => other.clone(),
        None => Value::String("ASK".to_string()),
    };
    out.insert("action".to_string(), action);

    if let Some(rationale) = field("rationale") {
        out.insert("rationale".to_string(), rationale.clone());
    }

    for list in ["questions", "orders"] {
        if let Some(value) = field(list) {
            let coerced = match value {
                Value::String(_) => to_string_list(Some(value)),
                other => other.clone(),
            };
            out.insert(list.to_string(), coerced);
        }
    }

    if let Some(diagnosis) = field("diagnosis") {
        out.insert("diagnosis".to_string(), unwrap_diagnosis(diagnosis));
    }

    out.insert(
        "certainty".to_string(),
        Value::from(coerce_certainty(field("certainty"))),
    );

    out
}

/// Bare string → one-element list, array → unchanged, anything else → empty.
fn to_string_list(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Array(items)) => Value::Array(items.clone()),
        Some(Value::String(s)) if !s.trim().is_empty() => Value::Array(vec![Value::String(s.clone())]),
        _ => Value::Array(Vec::new()),
    }
}

fn unwrap_diagnosis(value: &Value) -> Value {
    match value {
        Value::Object(map) => DIAGNOSIS_OBJECT_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find(|v| v.is_string())
            .cloned()
            .unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

fn coerce_certainty(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => DEFAULT_CERTAINTY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn consensus_of(raw: &str) -> Value {
        normalize(raw).unwrap().into_value()["consensus"].clone()
    }

    #[test]
    fn test_display_name_keys_map_to_canonical_keys() {
        let raw = r#"{
            "personas": {
                "Dr. Hypothesis": {"top3": [{"dx": "Asthma", "probability": 0.5, "key_features": []}]},
                "Dr. Test-Chooser": {"tests": ["Spirometry"]},
                "stewardship": {"vetoed_tests": ["CT chest"]}
            },
            "consensus": {"action": "ORDER", "orders": ["Spirometry"]}
        }"#;

        let value = normalize(raw).unwrap().into_value();
        let personas = &value["personas"];
        assert_eq!(personas["hypothesis"]["top3"][0]["dx"], "Asthma");
        assert_eq!(personas["test_chooser"]["tests"], json!(["Spirometry"]));
        assert_eq!(personas["stewardship"]["vetoed_tests"], json!(["CT chest"]));
        assert_eq!(personas["checklist"], json!({}));
    }

    #[test]
    fn test_every_persona_display_name_is_an_alias() {
        for persona in Persona::ALL {
            let (_, aliases) = PERSONA_ALIASES
                .iter()
                .find(|(p, _)| *p == persona)
                .unwrap();
            assert_eq!(aliases[0], persona.display_name());
            assert!(aliases.contains(&persona.key()));
        }
    }

    #[test]
    fn test_display_name_wins_over_canonical_key() {
        let raw = r#"{"personas": {
            "Dr. Checklist": {"safety_flags": ["first"]},
            "checklist": {"safety_flags": ["second"]}
        }}"#;
        let value = normalize(raw).unwrap().into_value();
        assert_eq!(value["personas"]["checklist"]["safety_flags"], json!(["first"]));
    }

    #[test]
    fn test_consensus_aliases_and_case_drift() {
        let consensus = consensus_of(
            r#"{"consensus": {"ACTION": "order", "tests": ["CXR"], "certainty": "0.7"}}"#,
        );
        assert_eq!(consensus["action"], "ORDER");
        assert_eq!(consensus["orders"], json!(["CXR"]));
        assert_eq!(consensus["certainty"], 0.7);
    }

    #[test]
    fn test_diagnosis_json_object_is_unwrapped() {
        let consensus = consensus_of(
            r#"{"consensus": {"action": "COMMIT", "diagnosis_json": {"diagnosis": "Gout"}}}"#,
        );
        assert_eq!(consensus["diagnosis"], "Gout");
    }

    #[test]
    fn test_certainty_defaults_and_clamps() {
        assert_eq!(consensus_of(r#"{"consensus": {}}"#)["certainty"], 0.5);
        assert_eq!(
            consensus_of(r#"{"consensus": {"certainty": "high"}}"#)["certainty"],
            0.5
        );
        assert_eq!(
            consensus_of(r#"{"consensus": {"certainty": 0}}"#)["certainty"],
            0.0
        );
        assert_eq!(
            consensus_of(r#"{"consensus": {"certainty": 4.2}}"#)["certainty"],
            1.0
        );
    }

    #[test]
    fn test_missing_action_defaults_to_ask() {
        assert_eq!(consensus_of(r#"{"consensus": {}}"#)["action"], "ASK");
    }

    #[test]
    fn test_rationale_is_not_invented() {
        assert!(consensus_of(r#"{"consensus": {"action": "ASK"}}"#)
            .get("rationale")
            .is_none());
    }

    #[test]
    fn test_challenger_strings_become_lists() {
        let raw = r#"{"personas": {"challenger": {
            "contradictions": "Normal CRP argues against sepsis",
            "falsification_tests": ["Blood culture"]
        }}}"#;
        let challenger = normalize(raw).unwrap().into_value()["personas"]["challenger"].clone();
        assert_eq!(
            challenger["contradictions"],
            json!(["Normal CRP argues against sepsis"])
        );
        assert_eq!(challenger["falsification_tests"], json!(["Blood culture"]));
        assert_eq!(challenger["anchoring_risks"], json!([]));
    }

    #[test]
    fn test_bare_string_questions_become_list() {
        let consensus =
            consensus_of(r#"{"consensus": {"action": "ASK", "questions": "Any fever?"}}"#);
        assert_eq!(consensus["questions"], json!(["Any fever?"]));
    }

    #[test]
    fn test_section_field_aliases() {
        let raw = r#"{"personas": {
            "hypothesis": {"differential": [
                {"dx": "A", "probability": 0.4, "key_features": []},
                {"dx": "B", "probability": 0.3, "key_features": []},
                {"dx": "C", "probability": 0.2, "key_features": []},
                {"dx": "D", "probability": 0.1, "key_features": []}
            ]},
            "test_chooser": {"proposed_tests": ["ECG"]}
        }}"#;
        let personas = normalize(raw).unwrap().into_value()["personas"].clone();
        assert_eq!(personas["hypothesis"]["top3"].as_array().unwrap().len(), 3);
        assert!(personas["hypothesis"].get("differential").is_none());
        assert_eq!(personas["test_chooser"]["tests"], json!(["ECG"]));
    }

    #[test]
    fn test_fenced_and_embedded_json_are_accepted() {
        let fenced = "```json\n{\"consensus\": {\"action\": \"ask\"}}\n```";
        assert_eq!(consensus_of(fenced)["action"], "ASK");

        let prose = "Here is the panel output: {\"consensus\": {\"action\": \"COMMIT\"}} Thanks.";
        assert_eq!(consensus_of(prose)["action"], "COMMIT");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(normalize("   "), Err(ParseError::Empty));
        assert!(matches!(
            normalize("I cannot comply."),
            Err(ParseError::InvalidJson(_))
        ));
        assert_eq!(normalize("[1, 2, 3]"), Err(ParseError::NotAnObject));
        assert!(normalize("{\"consensus\": ").is_err());
    }
}
