use crate::core::debounce::Debouncer;
use crate::core::error::SearchError;
use crate::models::{Location, LocationSearchRequest};
use crate::services::DogApi;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;

/// Keep only locations whose city contains `query` (case-insensitive) or
/// whose zip code contains it.
pub fn filter_candidates(query: &str, locations: Vec<Location>) -> Vec<Location> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    locations
        .into_iter()
        .filter(|loc| loc.city.to_lowercase().contains(&needle) || loc.zip_code.contains(&needle))
        .collect()
}

#[derive(Debug, Default)]
struct ResolverState {
    generation: u64,
    query: String,
    candidates: Vec<Location>,
    loading: bool,
    error: Option<SearchError>,
}

struct ResolverInner {
    api: Arc<dyn DogApi>,
    lookup_size: u32,
    state: Mutex<ResolverState>,
    debouncer: Debouncer,
}

/// Debounced free-text to location candidate lookup.
///
/// Each lookup is tagged with the query generation it was issued for; a
/// response for an older query never replaces the candidates.
#[derive(Clone)]
pub struct LocationResolver {
    inner: Arc<ResolverInner>,
}

impl LocationResolver {
    pub fn new(api: Arc<dyn DogApi>, delay: Duration, lookup_size: u32) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                api,
                lookup_size,
                state: Mutex::new(ResolverState::default()),
                debouncer: Debouncer::new(delay),
            }),
        }
    }

    /// Feed raw text from the input box.
    ///
    /// Empty text clears the candidates at once without a lookup; anything
    /// else is looked up after the debounce window.
    pub async fn set_query(&self, raw: &str) {
        let query = raw.trim().to_string();

        if query.is_empty() {
            self.inner.debouncer.cancel();
            let mut state = self.inner.state.lock().await;
            state.generation += 1;
            state.query.clear();
            state.candidates.clear();
            state.loading = false;
            return;
        }

        {
            // Anything still in flight now answers an outdated query
            let mut state = self.inner.state.lock().await;
            state.generation += 1;
            state.query = query.clone();
        }

        let weak: Weak<ResolverInner> = Arc::downgrade(&self.inner);
        self.inner.debouncer.schedule(async move {
            if let Some(inner) = weak.upgrade() {
                let resolver = LocationResolver { inner };
                if let Err(e) = resolver.lookup(&query).await {
                    tracing::warn!("Location lookup for '{}' failed: {}", query, e);
                }
            }
        });
    }

    /// Look `query` up immediately.
    ///
    /// Returns the filtered candidates of this lookup; they are only made
    /// visible if no newer query was issued in the meantime.
    pub async fn lookup(&self, query: &str) -> Result<Vec<Location>, SearchError> {
        let query = query.trim().to_string();

        let generation = {
            let mut state = self.inner.state.lock().await;
            state.generation += 1;
            state.query = query.clone();
            if query.is_empty() {
                state.candidates.clear();
                state.loading = false;
                return Ok(Vec::new());
            }
            state.loading = true;
            state.generation
        };

        let request = LocationSearchRequest {
            city: Some(query.clone()),
            size: self.inner.lookup_size,
        };
        let result = self.inner.api.search_locations(&request).await;

        let mut state = self.inner.state.lock().await;
        let current = state.generation == generation;

        match result {
            Ok(response) => {
                let candidates = filter_candidates(&query, response.results);
                if current {
                    state.candidates = candidates.clone();
                    state.loading = false;
                    state.error = None;
                } else {
                    tracing::debug!("Discarding stale location results for '{}'", query);
                }
                Ok(candidates)
            }
            Err(e) => {
                let err = SearchError::from(e);
                if current {
                    state.loading = false;
                    state.error = Some(err.clone());
                }
                Err(err)
            }
        }
    }

    pub async fn query(&self) -> String {
        self.inner.state.lock().await.query.clone()
    }

    pub async fn candidates(&self) -> Vec<Location> {
        self.inner.state.lock().await.candidates.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.state.lock().await.loading
    }

    pub async fn error(&self) -> Option<SearchError> {
        self.inner.state.lock().await.error.clone()
    }

    pub async fn dismiss_error(&self) {
        self.inner.state.lock().await.error = None;
    }

    /// Forget the query, cancel the pending lookup and drop late responses
    pub async fn reset(&self) {
        self.inner.debouncer.cancel();
        let mut state = self.inner.state.lock().await;
        let generation = state.generation + 1;
        *state = ResolverState {
            generation,
            ..Default::default()
        };
    }
}
