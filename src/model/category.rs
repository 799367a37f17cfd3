//! Note categories

use serde::{Deserialize, Serialize};

/// Category a note or listing is filed under.
///
/// Stored as a lowercase string. Unrecognized stored values map to
/// `Unknown` rather than to any real category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Language,
    Exam,
    Certificate,
    Academic,
    Hobby,
    #[default]
    Other,
    Unknown,
}

impl Category {
    /// Total mapping from a stored string to a category
    pub fn from_stored(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "language" => Category::Language,
            "exam" => Category::Exam,
            "certificate" => Category::Certificate,
            "academic" => Category::Academic,
            "hobby" => Category::Hobby,
            "other" => Category::Other,
            _ => Category::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Language => "language",
            Category::Exam => "exam",
            Category::Certificate => "certificate",
            Category::Academic => "academic",
            Category::Hobby => "hobby",
            Category::Other => "other",
            Category::Unknown => "unknown",
        }
    }

    /// Categories a user can pick when authoring a note
    pub fn selectable() -> &'static [Category] {
        &[
            Category::Language,
            Category::Exam,
            Category::Certificate,
            Category::Academic,
            Category::Hobby,
            Category::Other,
        ]
    }
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        Category::from_stored(&raw)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    /// Strict parse for user input; stored data goes through `from_stored`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Category::from_stored(s) {
            Category::Unknown => Err(format!(
                "unknown category '{}'. Available: {}",
                s,
                Category::selectable().iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
            )),
            category => Ok(category),
        }
    }
}
