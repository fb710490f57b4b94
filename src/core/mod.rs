// Search engine exports
pub mod criteria;
pub mod debounce;
pub mod error;
pub mod favorites;
pub mod location;
pub mod orchestrator;
pub mod pager;
pub mod session;

pub use criteria::{SearchCriteria, parse_age_input};
pub use debounce::Debouncer;
pub use error::SearchError;
pub use favorites::FavoritesSet;
pub use location::{LocationResolver, filter_candidates};
pub use orchestrator::{SearchOrchestrator, OrchestratorConfig, FetchOutcome, PageView};
pub use pager::{ResultPager, PaginationState, PagerStatus, PageTicket, LoadedPage, order_by_ids};
pub use session::{SessionContext, format_remaining};
