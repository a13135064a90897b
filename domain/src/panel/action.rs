//! Panel action taxonomy

use serde::{Deserialize, Serialize};

/// The three actions a panel turn can converge on (Value Object)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PanelAction {
    /// Ask the patient clarifying questions
    Ask,
    /// Order diagnostic tests
    Order,
    /// Commit to a diagnosis
    Commit,
}

impl PanelAction {
    /// All actions, in taxonomy order
    pub const ALL: [PanelAction; 3] = [PanelAction::Ask, PanelAction::Order, PanelAction::Commit];

    /// Canonical wire label ("ASK", "ORDER", "COMMIT")
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelAction::Ask => "ASK",
            PanelAction::Order => "ORDER",
            PanelAction::Commit => "COMMIT",
        }
    }

    pub fn is_commit(&self) -> bool {
        matches!(self, PanelAction::Commit)
    }
}

impl std::fmt::Display for PanelAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PanelAction {
    type Err = String;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ASK" => Ok(PanelAction::Ask),
            "ORDER" => Ok(PanelAction::Order),
            "COMMIT" => Ok(PanelAction::Commit),
            other => Err(format!(
                "Unknown panel action: {}. Valid: ASK, ORDER, COMMIT",
                other
            )),
        }
    }
}
