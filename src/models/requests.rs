use serde::{Deserialize, Serialize};
use validator::Validate;

/// Login form submission
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
}

/// Fresh search parameters, as the search endpoint expects them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub breeds: Vec<String>,
    #[serde(rename = "zipCodes")]
    pub zip_codes: Vec<String>,
    #[serde(rename = "ageMin")]
    pub age_min: Option<u8>,
    #[serde(rename = "ageMax")]
    pub age_max: Option<u8>,
    pub size: u32,
    pub sort: String,
}

impl SearchQuery {
    /// Query-string pairs; list parameters repeat their key
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(self.breeds.len() + self.zip_codes.len() + 4);

        for breed in &self.breeds {
            pairs.push(("breeds", breed.clone()));
        }
        for zip in &self.zip_codes {
            pairs.push(("zipCodes", zip.clone()));
        }
        if let Some(min) = self.age_min {
            pairs.push(("ageMin", min.to_string()));
        }
        if let Some(max) = self.age_max {
            pairs.push(("ageMax", max.to_string()));
        }
        pairs.push(("size", self.size.to_string()));
        pairs.push(("sort", self.sort.clone()));

        pairs
    }
}

/// Opaque server-issued pagination token (a relative URL).
///
/// Only ever echoed back verbatim. `display_offset` peeks at its `from`
/// parameter to number pages for display and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Result offset this cursor points at, if it carries one
    pub fn display_offset(&self) -> Option<u32> {
        let query = self.0.split_once('?').map(|(_, q)| q)?;

        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "from")
            .and_then(|(_, value)| value.parse().ok())
    }
}

/// What a single page fetch asks the server for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    /// First page of a new criteria value
    Fresh(SearchQuery),
    /// Adjacent page, addressed by a server cursor
    Cursor(PageCursor),
}

impl PageRequest {
    pub fn display_offset(&self) -> u32 {
        match self {
            PageRequest::Fresh(_) => 0,
            PageRequest::Cursor(cursor) => cursor.display_offset().unwrap_or(0),
        }
    }
}

/// Location lookup body for `/locations/search`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSearchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub size: u32,
}
