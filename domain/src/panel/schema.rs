//! Strict panel schema validation with deterministic fallback.
//!
//! [`validate`] checks a [`NormalizedOutput`] against the panel contract and
//! builds the typed [`PanelOutput`]. [`accept`] wraps the whole
//! normalize → validate outcome: any parse or schema failure is replaced by
//! [`fallback_output`], so the flow always receives a well-formed turn.
//!
//! Contract summary:
//!
//! - `personas` and every persona section are objects; list fields are
//!   lists of strings; `top3` entries have a string `dx`, a `probability`
//!   in [0, 1] and string `key_features`; `consistency_ok` is a bool.
//! - `consensus.action` is one of ASK / ORDER / COMMIT, and the matching
//!   payload is present: non-empty `questions`, non-empty `orders`, or a
//!   non-blank `diagnosis`.
//! - `consensus.certainty` is a number in [0, 1]; `rationale`, when present,
//!   is a string.

use super::action::PanelAction;
use super::normalize::{NormalizedOutput, ParseError};
use super::output::{
    ChallengerSection, ChecklistSection, ConsensusDecision, DifferentialEntry, HypothesisSection,
    PanelConsensus, PanelOutput, PersonaSections, StewardshipSection, TestChooserSection,
};
use serde_json::{Map, Value};

/// Clarifying question used by the fallback turn
pub const FALLBACK_QUESTION: &str = "Could you clarify your symptoms?";

/// Rationale literal used by the fallback turn and by rationale synthesis
/// when nothing else applies
pub const FALLBACK_RATIONALE: &str = "Fallback default";

/// One schema violation, addressed by a JSON-path-like location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl SchemaViolation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Why a turn was replaced by the fallback
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    Parse(ParseError),
    Schema(Vec<SchemaViolation>),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::Parse(e) => write!(f, "parse failure: {}", e),
            FallbackReason::Schema(violations) => {
                let joined = violations
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "schema violations: {}", joined)
            }
        }
    }
}

/// Result of [`accept`]: always a usable output, plus the reason when it
/// is the fallback
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOutput {
    pub output: PanelOutput,
    pub fallback: Option<FallbackReason>,
}

impl ValidatedOutput {
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// The deterministic safe output: empty personas, ASK one clarifying question.
pub fn fallback_output() -> PanelOutput {
    PanelOutput {
        personas: PersonaSections::default(),
        consensus: PanelConsensus {
            decision: ConsensusDecision::Ask {
                questions: vec![FALLBACK_QUESTION.to_string()],
            },
            rationale: Some(FALLBACK_RATIONALE.to_string()),
            certainty: 0.0,
        },
    }
}

/// Turn a normalize result into a usable output, falling back on any failure.
pub fn accept(normalized: Result<NormalizedOutput, ParseError>) -> ValidatedOutput {
    let reason = match normalized {
        Ok(normalized) => match validate(&normalized) {
            Ok(output) => {
                return ValidatedOutput {
                    output,
                    fallback: None,
                };
            }
            Err(violations) => FallbackReason::Schema(violations),
        },
        Err(e) => FallbackReason::Parse(e),
    };

    ValidatedOutput {
        output: fallback_output(),
        fallback: Some(reason),
    }
}

/// Validate a normalized output against the panel schema.
pub fn validate(normalized: &NormalizedOutput) -> Result<PanelOutput, Vec<SchemaViolation>> {
    let mut v = Validator::default();
    let root = normalized.as_value();

    let personas = match root.get("personas") {
        Some(Value::Object(map)) => v.personas(map),
        _ => {
            v.fail("personas", "required object");
            PersonaSections::default()
        }
    };

    let consensus = match root.get("consensus") {
        Some(Value::Object(map)) => v.consensus(map),
        _ => {
            v.fail("consensus", "required object");
            None
        }
    };

    match consensus {
        Some(consensus) if v.violations.is_empty() => Ok(PanelOutput {
            personas,
            consensus,
        }),
        _ => Err(v.violations),
    }
}

#[derive(Default)]
struct Validator {
    violations: Vec<SchemaViolation>,
}

impl Validator {
    fn fail(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(SchemaViolation::new(path, message));
    }

    fn personas(&mut self, map: &Map<String, Value>) -> PersonaSections {
        let mut sections = PersonaSections::default();

        if let Some(section) = self.section(map, "hypothesis") {
            sections.hypothesis = HypothesisSection {
                top3: self.differential(section),
            };
        }
        if let Some(section) = self.section(map, "test_chooser") {
            sections.test_chooser = TestChooserSection {
                tests: self.string_list(section, "personas.test_chooser", "tests"),
            };
        }
        if let Some(section) = self.section(map, "challenger") {
            let path = "personas.challenger";
            sections.challenger = ChallengerSection {
                anchoring_risks: self.string_list(section, path, "anchoring_risks"),
                contradictions: self.string_list(section, path, "contradictions"),
                falsification_tests: self.string_list(section, path, "falsification_tests"),
            };
        }
        if let Some(section) = self.section(map, "stewardship") {
            let path = "personas.stewardship";
            sections.stewardship = StewardshipSection {
                vetoed_tests: self.string_list(section, path, "vetoed_tests"),
                cheaper_alternatives: self.string_list(section, path, "cheaper_alternatives"),
            };
        }
        if let Some(section) = self.section(map, "checklist") {
            let consistency_ok = match section.get("consistency_ok") {
                None | Some(Value::Null) => None,
                Some(Value::Bool(b)) => Some(*b),
                Some(_) => {
                    self.fail("personas.checklist.consistency_ok", "expected bool");
                    None
                }
            };
            sections.checklist = ChecklistSection {
                consistency_ok,
                safety_flags: self.string_list(section, "personas.checklist", "safety_flags"),
            };
        }

        sections
    }

    /// Absent or null sections are empty; anything else must be an object.
    fn section<'a>(
        &mut self,
        personas: &'a Map<String, Value>,
        key: &str,
    ) -> Option<&'a Map<String, Value>> {
        match personas.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::Object(section)) => Some(section),
            Some(_) => {
                self.fail(format!("personas.{}", key), "expected object");
                None
            }
        }
    }

    fn string_list(&mut self, map: &Map<String, Value>, path: &str, key: &str) -> Vec<String> {
        match map.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => self.strings(value, &format!("{}.{}", path, key)),
        }
    }

    fn strings(&mut self, value: &Value, path: &str) -> Vec<String> {
        let Some(items) = value.as_array() else {
            self.fail(path, "expected array of strings");
            return Vec::new();
        };

        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => out.push(s.to_string()),
                None => self.fail(format!("{}[{}]", path, i), "expected string"),
            }
        }
        out
    }

    fn differential(&mut self, section: &Map<String, Value>) -> Vec<DifferentialEntry> {
        let path = "personas.hypothesis.top3";
        let entries = match section.get("top3") {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                self.fail(path, "expected array");
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            let entry_path = format!("{}[{}]", path, i);
            let Some(entry) = entry.as_object() else {
                self.fail(entry_path, "expected object");
                continue;
            };

            let dx = entry.get("dx").and_then(Value::as_str);
            if dx.is_none() {
                self.fail(format!("{}.dx", entry_path), "expected string");
            }

            let probability = entry.get("probability").and_then(Value::as_f64);
            match probability {
                Some(p) if (0.0..=1.0).contains(&p) => {}
                Some(_) => self.fail(format!("{}.probability", entry_path), "must be in [0, 1]"),
                None => self.fail(format!("{}.probability", entry_path), "expected number"),
            }

            let key_features = match entry.get("key_features") {
                Some(value) => self.strings(value, &format!("{}.key_features", entry_path)),
                None => {
                    self.fail(format!("{}.key_features", entry_path), "required");
                    Vec::new()
                }
            };

            if let (Some(dx), Some(probability)) = (dx, probability) {
                out.push(DifferentialEntry {
                    dx: dx.to_string(),
                    probability,
                    key_features,
                });
            }
        }
        out
    }

    fn consensus(&mut self, map: &Map<String, Value>) -> Option<PanelConsensus> {
        let action = match map.get("action").and_then(Value::as_str) {
            Some(label) => match label.parse::<PanelAction>() {
                Ok(action) => Some(action),
                Err(e) => {
                    self.fail("consensus.action", e);
                    None
                }
            },
            None => {
                self.fail("consensus.action", "required string");
                None
            }
        };

        let rationale = match map.get("rationale") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.fail("consensus.rationale", "expected string");
                None
            }
        };

        let certainty = match map.get("certainty").and_then(Value::as_f64) {
            Some(c) if (0.0..=1.0).contains(&c) => Some(c),
            Some(_) => {
                self.fail("consensus.certainty", "must be in [0, 1]");
                None
            }
            None => {
                self.fail("consensus.certainty", "expected number");
                None
            }
        };

        let decision = match action? {
            PanelAction::Ask => {
                let questions = self.string_list(map, "consensus", "questions");
                if questions.is_empty() {
                    self.fail("consensus.questions", "ASK requires at least one question");
                }
                ConsensusDecision::Ask { questions }
            }
            PanelAction::Order => {
                let orders = self.string_list(map, "consensus", "orders");
                if orders.is_empty() {
                    self.fail("consensus.orders", "ORDER requires at least one order");
                }
                ConsensusDecision::Order { orders }
            }
            PanelAction::Commit => match map.get("diagnosis").and_then(Value::as_str) {
                Some(d) if !d.trim().is_empty() => ConsensusDecision::Commit {
                    diagnosis: d.to_string(),
                },
                _ => {
                    self.fail("consensus.diagnosis", "COMMIT requires a diagnosis string");
                    return None;
                }
            },
        };

        Some(PanelConsensus {
            decision,
            rationale,
            certainty: certainty?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::normalize::normalize;

    fn run(raw: &str) -> ValidatedOutput {
        accept(normalize(raw))
    }

    #[test]
    fn test_valid_ask_passes() {
        let result = run(
            r#"{"personas":{},"consensus":{"action":"ASK","questions":["Any fever?"],"certainty":0.4}}"#,
        );
        assert!(!result.is_fallback());
        assert_eq!(
            result.output.consensus.decision,
            ConsensusDecision::Ask {
                questions: vec!["Any fever?".to_string()]
            }
        );
        assert_eq!(result.output.consensus.certainty, 0.4);
        assert!(result.output.consensus.rationale.is_none());
    }

    #[test]
    fn test_non_json_falls_back() {
        let result = run("I cannot comply.");
        assert!(matches!(result.fallback, Some(FallbackReason::Parse(_))));
        assert_eq!(result.output, fallback_output());
        assert_eq!(result.output.action(), PanelAction::Ask);
        assert_eq!(
            result.output.consensus.rationale.as_deref(),
            Some(FALLBACK_RATIONALE)
        );
    }

    #[test]
    fn test_unknown_action_falls_back() {
        let result = run(r#"{"consensus":{"action":"REFER","certainty":0.3}}"#);
        let Some(FallbackReason::Schema(violations)) = result.fallback else {
            panic!("expected schema fallback");
        };
        assert!(violations.iter().any(|v| v.path == "consensus.action"));
    }

    #[test]
    fn test_action_without_payload_falls_back() {
        for raw in [
            r#"{"consensus":{"action":"ASK","questions":[]}}"#,
            r#"{"consensus":{"action":"ORDER"}}"#,
            r#"{"consensus":{"action":"COMMIT","diagnosis":"  "}}"#,
        ] {
            assert!(run(raw).is_fallback(), "expected fallback for {}", raw);
        }
    }

    #[test]
    fn test_payload_for_other_actions_is_dropped() {
        let result = run(
            r#"{"consensus":{"action":"ORDER","orders":["CXR"],"questions":["Cough?"],"diagnosis":"CAP"}}"#,
        );
        assert_eq!(
            result.output.consensus.decision,
            ConsensusDecision::Order {
                orders: vec!["CXR".to_string()]
            }
        );
    }

    #[test]
    fn test_bad_probability_falls_back() {
        let result = run(
            r#"{"personas":{"hypothesis":{"top3":[{"dx":"Flu","probability":1.4,"key_features":[]}]}},
                "consensus":{"action":"ASK","questions":["Onset?"]}}"#,
        );
        let Some(FallbackReason::Schema(violations)) = result.fallback else {
            panic!("expected schema fallback");
        };
        assert_eq!(violations[0].path, "personas.hypothesis.top3[0].probability");
    }

    #[test]
    fn test_non_string_list_item_falls_back() {
        let result = run(
            r#"{"personas":{"stewardship":{"vetoed_tests":["MRI", 3]}},
                "consensus":{"action":"ORDER","orders":["MRI"]}}"#,
        );
        assert!(result.is_fallback());
    }

    #[test]
    fn test_non_object_section_falls_back() {
        let result = run(
            r#"{"personas":{"Dr. Hypothesis":"Probably viral"},
                "consensus":{"action":"ASK","questions":["Duration?"]}}"#,
        );
        let Some(FallbackReason::Schema(violations)) = result.fallback else {
            panic!("expected schema fallback");
        };
        assert_eq!(violations[0].path, "personas.hypothesis");
    }

    #[test]
    fn test_garbage_inputs_always_produce_a_usable_output() {
        for raw in ["", "null", "42", "{", "{}", "```json\n```", "{\"personas\": []}"] {
            let result = run(raw);
            let action = result.output.action();
            assert!(PanelAction::ALL.contains(&action));
        }
    }

    #[test]
    fn test_full_commit_round_trip() {
        let result = run(
            r#"{
              "personas": {
                "Dr. Hypothesis": {"top3": [{"dx": "Pneumonia", "probability": 0.8, "key_features": ["fever", "crackles"]}]},
                "Dr. Checklist": {"consistency_ok": true, "safety_flags": []}
              },
              "consensus": {"action": "commit", "diagnosis": "Pneumonia", "rationale": "Classic picture", "certainty": 0.85}
            }"#,
        );
        assert!(!result.is_fallback());
        let output = result.output;
        assert_eq!(output.action(), PanelAction::Commit);
        assert_eq!(output.personas.hypothesis.top3[0].key_features.len(), 2);
        assert_eq!(output.personas.checklist.consistency_ok, Some(true));
    }
}
