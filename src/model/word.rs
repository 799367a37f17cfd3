//! Words and their mastery levels

use serde::{Deserialize, Serialize};

use crate::types::WordId;

/// How well the user knows a word, as rated during a scored session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryLevel {
    #[default]
    Unrated,
    Hard,
    Normal,
    Easy,
}

impl MasteryLevel {
    /// Highest score a single word can contribute
    pub const MAX_SCORE: u32 = 2;

    /// Score used for test results. Hard counts the same as unrated.
    pub fn score(self) -> u32 {
        match self {
            MasteryLevel::Unrated | MasteryLevel::Hard => 0,
            MasteryLevel::Normal => 1,
            MasteryLevel::Easy => 2,
        }
    }

    pub fn all() -> [MasteryLevel; 4] {
        [MasteryLevel::Unrated, MasteryLevel::Hard, MasteryLevel::Normal, MasteryLevel::Easy]
    }
}

impl std::fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MasteryLevel::Unrated => write!(f, "unrated"),
            MasteryLevel::Hard => write!(f, "hard"),
            MasteryLevel::Normal => write!(f, "normal"),
            MasteryLevel::Easy => write!(f, "easy"),
        }
    }
}

impl std::str::FromStr for MasteryLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unrated" => Ok(MasteryLevel::Unrated),
            "hard" | "h" => Ok(MasteryLevel::Hard),
            "normal" | "n" => Ok(MasteryLevel::Normal),
            "easy" | "e" => Ok(MasteryLevel::Easy),
            other => Err(format!("unknown mastery level '{}'", other)),
        }
    }
}

/// A single entry in a note's word list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub id: WordId,
    pub text: String,
    pub meaning: String,
    #[serde(default)]
    pub mastery_level: MasteryLevel,
}

impl Word {
    pub fn new(text: impl Into<String>, meaning: impl Into<String>) -> Self {
        Self {
            id: WordId::generate(),
            text: text.into(),
            meaning: meaning.into(),
            mastery_level: MasteryLevel::Unrated,
        }
    }

    /// Copy of this word for another library: fresh id, rating cleared
    pub fn fresh_copy(&self) -> Self {
        Self::new(self.text.clone(), self.meaning.clone())
    }
}
