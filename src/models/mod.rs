// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{Dog, Location, SelectedLocation, User, SortField, SortOrder, SortSpec, normalize_user_key};
pub use requests::{LoginRequest, SearchQuery, PageCursor, PageRequest, LocationSearchRequest};
pub use responses::{SearchResponse, LocationSearchResponse, MatchResponse};
