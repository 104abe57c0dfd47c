//! Query-string search forms for the list screens.
//!
//! Every field is optional and validation cannot fail; an empty value means
//! "no filter".

use serde::{Deserialize, Serialize};

/// Case-insensitive "starts with" predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix(String);

impl Prefix {
    /// Returns `None` for blank input, which callers treat as match-all.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Prefix(trimmed.to_lowercase()))
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        candidate.to_lowercase().starts_with(&self.0)
    }

    /// `LIKE` pattern for a lower-cased column, using the MySQL default
    /// escape character.
    pub fn like_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.0.len() + 1);
        for ch in self.0.chars() {
            if matches!(ch, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(ch);
        }
        pattern.push('%');
        pattern
    }
}

fn cleaned(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DishTypeSearch {
    #[serde(default)]
    pub name: Option<String>,
}

impl DishTypeSearch {
    /// The value the search box should be re-rendered with.
    pub fn cleaned(&self) -> DishTypeSearch {
        DishTypeSearch {
            name: Some(cleaned(&self.name)),
        }
    }

    pub fn predicate(&self) -> Option<Prefix> {
        self.name.as_deref().and_then(Prefix::new)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DishSearch {
    #[serde(default)]
    pub name: Option<String>,
}

impl DishSearch {
    pub fn cleaned(&self) -> DishSearch {
        DishSearch {
            name: Some(cleaned(&self.name)),
        }
    }

    pub fn predicate(&self) -> Option<Prefix> {
        self.name.as_deref().and_then(Prefix::new)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CookSearch {
    #[serde(default)]
    pub username: Option<String>,
}

impl CookSearch {
    pub fn cleaned(&self) -> CookSearch {
        CookSearch {
            username: Some(cleaned(&self.username)),
        }
    }

    pub fn predicate(&self) -> Option<Prefix> {
        self.username.as_deref().and_then(Prefix::new)
    }
}
