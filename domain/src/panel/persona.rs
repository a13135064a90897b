//! The five panel personas and the persona-emphasis hints
//!
//! A single reasoning oracle simulates all five personas in one response.
//! When the panel loops, one [`PersonaHint`] is injected into the next
//! system instruction to shift emphasis without discarding context.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A member of the diagnostic panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Hypothesis,
    TestChooser,
    Challenger,
    Stewardship,
    Checklist,
}

impl Persona {
    pub const ALL: [Persona; 5] = [
        Persona::Hypothesis,
        Persona::TestChooser,
        Persona::Challenger,
        Persona::Stewardship,
        Persona::Checklist,
    ];

    /// Canonical snake_case key used in the panel output
    pub fn key(&self) -> &'static str {
        match self {
            Persona::Hypothesis => "hypothesis",
            Persona::TestChooser => "test_chooser",
            Persona::Challenger => "challenger",
            Persona::Stewardship => "stewardship",
            Persona::Checklist => "checklist",
        }
    }

    /// Human display label, which the oracle sometimes uses as the key
    pub fn display_name(&self) -> &'static str {
        match self {
            Persona::Hypothesis => "Dr. Hypothesis",
            Persona::TestChooser => "Dr. Test-Chooser",
            Persona::Challenger => "Dr. Challenger",
            Persona::Stewardship => "Dr. Stewardship",
            Persona::Checklist => "Dr. Checklist",
        }
    }

    /// The persona's responsibility, as stated in the panel charter
    pub fn mandate(&self) -> &'static str {
        match self {
            Persona::Hypothesis => {
                "maintain a probability-ranked differential diagnosis with the top 3 most likely conditions."
            }
            Persona::TestChooser => {
                "propose up to 3 diagnostic tests that maximally discriminate the leading hypotheses."
            }
            Persona::Challenger => {
                "act as devil's advocate: identify potential anchoring bias, highlight contradictory evidence and propose tests that could falsify the current leading diagnosis."
            }
            Persona::Stewardship => {
                "enforce cost-conscious care, advocating for cheaper alternatives when diagnostically equivalent and vetoing low-yield expensive tests."
            }
            Persona::Checklist => {
                "perform silent quality control to ensure the panel maintains internal consistency across their reasoning."
            }
        }
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Persona-emphasis directive injected when the panel repeats itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaHint {
    ChallengerLeads,
    HypothesisWidens,
    StewardshipQuestions,
    ChecklistAudits,
}

impl PersonaHint {
    pub const ALL: [PersonaHint; 4] = [
        PersonaHint::ChallengerLeads,
        PersonaHint::HypothesisWidens,
        PersonaHint::StewardshipQuestions,
        PersonaHint::ChecklistAudits,
    ];

    /// Sentence appended to the system instruction
    pub fn directive(&self) -> &'static str {
        match self {
            PersonaHint::ChallengerLeads => {
                "Let Dr. Challenger take a leading role in this round."
            }
            PersonaHint::HypothesisWidens => {
                "Let Dr. Hypothesis reconsider less likely differentials."
            }
            PersonaHint::StewardshipQuestions => {
                "Let Dr. Stewardship question test efficiency this round."
            }
            PersonaHint::ChecklistAudits => {
                "Let Dr. Checklist ensure logical consistency of prior steps."
            }
        }
    }

    /// The persona this hint puts in front
    pub fn persona(&self) -> Persona {
        match self {
            PersonaHint::ChallengerLeads => Persona::Challenger,
            PersonaHint::HypothesisWidens => Persona::Hypothesis,
            PersonaHint::StewardshipQuestions => Persona::Stewardship,
            PersonaHint::ChecklistAudits => Persona::Checklist,
        }
    }
}

impl std::fmt::Display for PersonaHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.directive())
    }
}

/// Pick one hint uniformly at random from [`PersonaHint::ALL`].
pub fn choose_hint<R: Rng + ?Sized>(rng: &mut R) -> PersonaHint {
    PersonaHint::ALL[rng.gen_range(0..PersonaHint::ALL.len())]
}
