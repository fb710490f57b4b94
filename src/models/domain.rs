use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Adoptable dog as returned by the batch lookup endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dog {
    pub id: String,
    pub name: String,
    pub age: u8,
    pub breed: String,
    #[serde(rename = "zip_code")]
    pub zip_code: String,
    #[serde(rename = "img")]
    pub image_url: String,
}

/// Geographic location record from the locations search endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "zip_code")]
    pub zip_code: String,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub county: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Label shown on a location pill, e.g. `Boston, MA (02108)`
    pub fn display_text(&self) -> String {
        format!("{}, {} ({})", self.city, self.state, self.zip_code)
    }
}

/// A user-chosen location filter; `zip` is the dedup key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedLocation {
    pub zip: String,
    #[serde(rename = "displayText")]
    pub display_text: String,
}

impl From<&Location> for SelectedLocation {
    fn from(location: &Location) -> Self {
        Self {
            zip: location.zip_code.clone(),
            display_text: location.display_text(),
        }
    }
}

/// Authenticated user identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
}

impl User {
    /// Stable per-user partition key: the trimmed, lower-cased email
    pub fn key(&self) -> String {
        normalize_user_key(&self.email)
    }
}

pub fn normalize_user_key(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Breed,
    Name,
    Age,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Breed => "breed",
            SortField::Name => "name",
            SortField::Age => "age",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Server-side sort, sent as `field:order`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field.as_str(), self.order.as_str())
    }
}

impl FromStr for SortSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, order) = s.split_once(':').unwrap_or((s, "asc"));

        let field = match field.trim().to_lowercase().as_str() {
            "breed" => SortField::Breed,
            "name" => SortField::Name,
            "age" => SortField::Age,
            other => return Err(format!("Unknown sort field: {}", other)),
        };
        let order = match order.trim().to_lowercase().as_str() {
            "asc" => SortOrder::Asc,
            "desc" => SortOrder::Desc,
            other => return Err(format!("Unknown sort order: {}", other)),
        };

        Ok(Self { field, order })
    }
}
