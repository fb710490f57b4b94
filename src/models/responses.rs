use serde::{Deserialize, Serialize};
use crate::models::domain::Location;
use crate::models::requests::PageCursor;

/// Response of `/dogs/search`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "resultIds")]
    pub result_ids: Vec<String>,
    pub total: u32,
    #[serde(default)]
    pub next: Option<PageCursor>,
    #[serde(default)]
    pub prev: Option<PageCursor>,
}

/// Response of `/locations/search`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSearchResponse {
    pub results: Vec<Location>,
    pub total: u32,
}

/// Response of `/dogs/match`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResponse {
    #[serde(rename = "match")]
    pub matched: String,
}
