use crate::config::Settings;
use crate::core::{
    criteria::{parse_age_input, SearchCriteria},
    debounce::Debouncer,
    error::SearchError,
    favorites::FavoritesSet,
    location::LocationResolver,
    pager::{order_by_ids, LoadedPage, PageTicket, PagerStatus, ResultPager},
    session::SessionContext,
};
use crate::models::{Dog, Location, LoginRequest, PageRequest, SortField, SortOrder, SortSpec, User};
use crate::services::{DogApi, PersistedSnapshot, SnapshotStore};
use chrono::Utc;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use validator::Validate;

/// Tunables of the search engine
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub page_size: u32,
    pub input_debounce: Duration,
    pub location_debounce: Duration,
    pub location_lookup_size: u32,
    pub session_duration: chrono::Duration,
    pub default_sort: SortSpec,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            input_debounce: Duration::from_millis(400),
            location_debounce: Duration::from_millis(300),
            location_lookup_size: 10000,
            session_duration: chrono::Duration::seconds(3600),
            default_sort: SortSpec::default(),
        }
    }
}

impl From<&Settings> for OrchestratorConfig {
    fn from(settings: &Settings) -> Self {
        let default_sort = settings.search.default_sort.parse().unwrap_or_else(|e| {
            tracing::warn!("Invalid default sort '{}' ({}), using breed:asc", settings.search.default_sort, e);
            SortSpec::default()
        });

        Self {
            page_size: settings.search.page_size,
            input_debounce: Duration::from_millis(settings.search.input_debounce_ms),
            location_debounce: Duration::from_millis(settings.search.location_debounce_ms),
            location_lookup_size: settings.search.location_lookup_size,
            session_duration: chrono::Duration::seconds(settings.session.duration_secs),
            default_sort,
        }
    }
}

/// What became of a page fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The page is now displayed
    Applied,
    /// A newer request took over; this result was dropped
    Superseded,
    /// Nothing to navigate to; no request was made
    Skipped,
    /// The criteria did not change; no request was made
    Unchanged,
}

/// Display-ready view of the current page
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub dogs: Vec<Dog>,
    pub total: u32,
    pub current_page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
    pub status: PagerStatus,
}

struct EngineState {
    session: Option<SessionContext>,
    criteria: SearchCriteria,
    pager: ResultPager,
    favorites: FavoritesSet,
    match_result: Option<String>,
    breeds: Option<Vec<String>>,
    last_error: Option<SearchError>,
    /// Bumped on every login and logout; async work started under an older
    /// epoch must not touch state
    epoch: u64,
}

impl EngineState {
    fn new(config: &OrchestratorConfig) -> Self {
        Self {
            session: None,
            criteria: SearchCriteria::new().with_sort(config.default_sort),
            pager: ResultPager::new(config.page_size),
            favorites: FavoritesSet::new(),
            match_result: None,
            breeds: None,
            last_error: None,
            epoch: 0,
        }
    }

    /// Back to a logged-out state, invalidating every in-flight page fetch
    fn clear(&mut self, config: &OrchestratorConfig) {
        let mut pager = std::mem::replace(&mut self.pager, ResultPager::new(config.page_size));
        pager.clear();
        *self = Self {
            pager,
            epoch: self.epoch + 1,
            ..Self::new(config)
        };
    }

    fn snapshot(&self) -> PersistedSnapshot {
        PersistedSnapshot {
            criteria: self.criteria.to_snapshot(),
            selected_locations: self.criteria.locations().to_vec(),
            favorites: self.favorites.dogs().to_vec(),
            match_result: self.match_result.clone(),
        }
    }
}

struct Inner {
    api: Arc<dyn DogApi>,
    store: Arc<dyn SnapshotStore>,
    config: OrchestratorConfig,
    state: Mutex<EngineState>,
    age_min_input: Debouncer,
    age_max_input: Debouncer,
    locations: LocationResolver,
}

/// Top-level controller of search, pagination, favorites and match.
///
/// # Flow
/// 1. A criteria mutator produces a new criteria value
/// 2. If it differs, the value is saved and the pager restarts at offset 0
/// 3. One search is issued; its ids are resolved to dogs in one batch
/// 4. The page is applied only if no newer request started meanwhile
///
/// Cloning is cheap and every clone drives the same engine. State is
/// never locked across a network call.
#[derive(Clone)]
pub struct SearchOrchestrator {
    inner: Arc<Inner>,
}

impl SearchOrchestrator {
    pub fn new(api: Arc<dyn DogApi>, store: Arc<dyn SnapshotStore>, config: OrchestratorConfig) -> Self {
        let locations = LocationResolver::new(
            Arc::clone(&api),
            config.location_debounce,
            config.location_lookup_size,
        );

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(EngineState::new(&config)),
                age_min_input: Debouncer::new(config.input_debounce),
                age_max_input: Debouncer::new(config.input_debounce),
                api,
                store,
                config,
                locations,
            }),
        }
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    // ----- session -----

    /// Authenticate and restore this user's saved filters and favorites
    pub async fn login(&self, name: &str, email: &str) -> Result<(), SearchError> {
        let request = LoginRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
        };
        request.validate()?;

        // Nothing typed or looked up under the previous session may land in this one
        self.cancel_pending_input();
        self.inner.locations.reset().await;

        if let Err(e) = self.inner.api.login(&request.name, &request.email).await {
            tracing::error!("Login failed for {}: {}", request.email, e);
            return Err(e.into());
        }

        let user = User {
            name: request.name,
            email: request.email,
        };
        let session = SessionContext::start(user, self.inner.config.session_duration, Utc::now());
        let restored = self.inner.store.load(session.user_key());

        let mut state = self.inner.state.lock().await;
        state.clear(&self.inner.config);

        if let Some(snapshot) = restored {
            tracing::debug!("Restoring saved state for {}", session.user_key());
            state.criteria = SearchCriteria::from_snapshot(&snapshot.criteria, &snapshot.selected_locations);
            state.favorites = FavoritesSet::from_dogs(snapshot.favorites);
            state.match_result = snapshot.match_result;
        }

        tracing::info!(
            "Session started for {} (expires {})",
            session.user_key(),
            session.expires_at()
        );
        state.session = Some(session);

        Ok(())
    }

    /// End the session. A failing remote logout is logged and local state is
    /// cleared regardless.
    pub async fn logout(&self) {
        self.cancel_pending_input();

        if let Err(e) = self.inner.api.logout().await {
            tracing::warn!("Remote logout failed, clearing local session anyway: {}", e);
        }

        self.inner.locations.reset().await;

        let mut state = self.inner.state.lock().await;
        if let Some(session) = &state.session {
            tracing::info!("Session ended for {}", session.user_key());
        }
        state.clear(&self.inner.config);
    }

    pub async fn is_logged_in(&self) -> bool {
        self.inner.state.lock().await.session.is_some()
    }

    pub async fn user(&self) -> Option<User> {
        let state = self.inner.state.lock().await;
        state.session.as_ref().map(|s| s.user().clone())
    }

    pub async fn session_remaining(&self) -> Option<chrono::Duration> {
        let state = self.inner.state.lock().await;
        state.session.as_ref().map(|s| s.remaining(Utc::now()))
    }

    /// Log out if the session has run out. Returns whether it had.
    pub async fn expire_if_due(&self) -> bool {
        let expired = {
            let state = self.inner.state.lock().await;
            state
                .session
                .as_ref()
                .is_some_and(|s| s.is_expired(Utc::now()))
        };

        if expired {
            tracing::info!("Session expired");
            self.logout().await;
        }
        expired
    }

    // ----- reads -----

    pub async fn criteria(&self) -> SearchCriteria {
        self.inner.state.lock().await.criteria.clone()
    }

    pub async fn page(&self) -> PageView {
        let state = self.inner.state.lock().await;
        let pager = &state.pager;

        PageView {
            dogs: pager.dogs().to_vec(),
            total: pager.pagination().total,
            current_page: pager.current_page(),
            total_pages: pager.total_pages(),
            has_next: pager.has_next(),
            has_prev: pager.has_prev(),
            status: pager.status(),
        }
    }

    pub async fn favorites(&self) -> FavoritesSet {
        self.inner.state.lock().await.favorites.clone()
    }

    pub async fn match_result(&self) -> Option<String> {
        self.inner.state.lock().await.match_result.clone()
    }

    /// The matched dog, if the match still refers to a favorite
    pub async fn matched_dog(&self) -> Option<Dog> {
        let state = self.inner.state.lock().await;
        state
            .match_result
            .as_deref()
            .and_then(|id| state.favorites.get(id))
            .cloned()
    }

    pub async fn last_error(&self) -> Option<SearchError> {
        self.inner.state.lock().await.last_error.clone()
    }

    pub async fn dismiss_error(&self) {
        self.inner.state.lock().await.last_error = None;
    }

    pub fn location_resolver(&self) -> &LocationResolver {
        &self.inner.locations
    }

    /// All breeds, fetched once per session
    pub async fn breeds(&self) -> Result<Vec<String>, SearchError> {
        let epoch = {
            let state = self.inner.state.lock().await;
            if let Some(breeds) = state.breeds.clone() {
                return Ok(breeds);
            }
            state.epoch
        };

        let breeds = match self.inner.api.fetch_breeds().await {
            Ok(breeds) => breeds,
            Err(e) => return Err(self.surface(e.into()).await),
        };

        let mut state = self.inner.state.lock().await;
        if state.session.is_some() && state.epoch == epoch {
            state.breeds = Some(breeds.clone());
        }
        Ok(breeds)
    }

    // ----- criteria -----

    pub async fn add_breed(&self, breed: &str) -> Result<FetchOutcome, SearchError> {
        self.update_criteria(|c| c.with_breed(breed)).await
    }

    pub async fn remove_breed(&self, breed: &str) -> Result<FetchOutcome, SearchError> {
        self.update_criteria(|c| c.without_breed(breed)).await
    }

    pub async fn add_location(&self, zip: &str, label: &str) -> Result<FetchOutcome, SearchError> {
        self.update_criteria(|c| c.with_location(zip, label)).await
    }

    /// Pick a lookup candidate: add it as a filter and clear the lookup box
    pub async fn select_location(&self, location: &Location) -> Result<FetchOutcome, SearchError> {
        self.inner.locations.reset().await;
        self.add_location(&location.zip_code, &location.display_text()).await
    }

    pub async fn remove_location(&self, zip: &str) -> Result<FetchOutcome, SearchError> {
        self.update_criteria(|c| c.without_location(zip)).await
    }

    pub async fn set_age_min(&self, age_min: Option<u8>) -> Result<FetchOutcome, SearchError> {
        self.update_criteria(|c| c.with_age_min(age_min)).await
    }

    pub async fn set_age_max(&self, age_max: Option<u8>) -> Result<FetchOutcome, SearchError> {
        self.update_criteria(|c| c.with_age_max(age_max)).await
    }

    pub async fn set_sort(&self, field: SortField, order: SortOrder) -> Result<FetchOutcome, SearchError> {
        self.update_criteria(|c| c.with_sort(SortSpec::new(field, order))).await
    }

    /// Replace the criteria in one step, issuing at most one search
    pub async fn apply_criteria(&self, criteria: SearchCriteria) -> Result<FetchOutcome, SearchError> {
        self.update_criteria(|_| criteria).await
    }

    /// Raw keystrokes in the minimum-age box.
    ///
    /// Invalid text is rejected immediately; valid text is applied once
    /// typing pauses. Must be called from within a tokio runtime.
    pub fn input_age_min(&self, raw: &str) -> Result<(), SearchError> {
        let value = parse_age_input(raw)?;
        let weak = Arc::downgrade(&self.inner);

        self.inner.age_min_input.schedule(async move {
            if let Some(engine) = Self::from_weak(&weak) {
                if let Err(e) = engine.set_age_min(value).await {
                    tracing::warn!("Debounced minimum age update failed: {}", e);
                }
            }
        });
        Ok(())
    }

    /// Raw keystrokes in the maximum-age box, see [`Self::input_age_min`]
    pub fn input_age_max(&self, raw: &str) -> Result<(), SearchError> {
        let value = parse_age_input(raw)?;
        let weak = Arc::downgrade(&self.inner);

        self.inner.age_max_input.schedule(async move {
            if let Some(engine) = Self::from_weak(&weak) {
                if let Err(e) = engine.set_age_max(value).await {
                    tracing::warn!("Debounced maximum age update failed: {}", e);
                }
            }
        });
        Ok(())
    }

    /// Abandon typed input that has not been applied yet
    pub fn cancel_pending_input(&self) {
        self.inner.age_min_input.cancel();
        self.inner.age_max_input.cancel();
    }

    async fn update_criteria<F>(&self, change: F) -> Result<FetchOutcome, SearchError>
    where
        F: FnOnce(&SearchCriteria) -> SearchCriteria,
    {
        let ticket = {
            let mut guard = self.inner.state.lock().await;
            let state = &mut *guard;

            let next = change(&state.criteria);
            if next == state.criteria {
                return Ok(FetchOutcome::Unchanged);
            }

            state.criteria = next;
            self.persist(state);

            let request = state.pager.reset_request(&state.criteria);
            state.pager.begin(request)
        };

        self.run(ticket).await
    }

    // ----- pagination -----

    /// Fetch the first page of the current criteria
    pub async fn reset_and_search(&self) -> Result<FetchOutcome, SearchError> {
        let ticket = {
            let mut guard = self.inner.state.lock().await;
            let state = &mut *guard;
            let request = state.pager.reset_request(&state.criteria);
            state.pager.begin(request)
        };

        self.run(ticket).await
    }

    pub async fn go_next(&self) -> Result<FetchOutcome, SearchError> {
        let ticket = {
            let mut state = self.inner.state.lock().await;
            match state.pager.next_request() {
                Some(request) => state.pager.begin(request),
                None => return Ok(FetchOutcome::Skipped),
            }
        };

        self.run(ticket).await
    }

    pub async fn go_prev(&self) -> Result<FetchOutcome, SearchError> {
        let ticket = {
            let mut state = self.inner.state.lock().await;
            match state.pager.prev_request() {
                Some(request) => state.pager.begin(request),
                None => return Ok(FetchOutcome::Skipped),
            }
        };

        self.run(ticket).await
    }

    async fn run(&self, ticket: PageTicket) -> Result<FetchOutcome, SearchError> {
        let result = self.load_page(&ticket).await;

        let mut state = self.inner.state.lock().await;
        match result {
            Ok(Some(page)) => {
                if state.pager.complete(&ticket, page) {
                    state.last_error = None;
                    Ok(FetchOutcome::Applied)
                } else {
                    Ok(FetchOutcome::Superseded)
                }
            }
            Ok(None) => Ok(FetchOutcome::Superseded),
            Err(err) => {
                if state.pager.fail(&ticket) {
                    tracing::error!("Search failed: {}", err);
                    state.last_error = Some(err.clone());
                    Err(err)
                } else {
                    tracing::debug!("Ignoring failure of superseded search: {}", err);
                    Ok(FetchOutcome::Superseded)
                }
            }
        }
    }

    /// Search, then resolve the ids in one batch. `None` once superseded.
    async fn load_page(&self, ticket: &PageTicket) -> Result<Option<LoadedPage>, SearchError> {
        let response = self.inner.api.search(ticket.request()).await?;

        if !self.inner.state.lock().await.pager.is_current(ticket) {
            tracing::debug!("Search superseded before resolving {} ids", response.result_ids.len());
            return Ok(None);
        }

        let dogs = if response.result_ids.is_empty() {
            Vec::new()
        } else {
            let dogs = self.inner.api.fetch_dogs(&response.result_ids).await?;
            order_by_ids(&response.result_ids, dogs)
        };

        if let PageRequest::Fresh(query) = ticket.request() {
            tracing::debug!("Search {:?} matched {} dogs", query, response.total);
        }

        Ok(Some(LoadedPage { response, dogs }))
    }

    // ----- favorites and match -----

    /// Returns whether `dog` is now a favorite
    pub async fn toggle_favorite(&self, dog: &Dog) -> bool {
        let mut state = self.inner.state.lock().await;
        let now_favorite = state.favorites.toggle(dog);
        self.persist(&state);
        now_favorite
    }

    pub async fn clear_favorites(&self) {
        let mut state = self.inner.state.lock().await;
        state.favorites.clear();
        self.persist(&state);
    }

    /// Ask the server to pick one favorite.
    ///
    /// Fails fast without a request when there are no favorites. A match
    /// that is no longer a favorite resolves to `None`, as does one that
    /// arrives after the session ended.
    pub async fn generate_match(&self) -> Result<Option<Dog>, SearchError> {
        let (ids, epoch) = {
            let mut state = self.inner.state.lock().await;
            if state.favorites.is_empty() {
                let err = SearchError::Validation(
                    "Add at least one favorite before generating a match".to_string(),
                );
                state.last_error = Some(err.clone());
                return Err(err);
            }
            (state.favorites.ids(), state.epoch)
        };

        let result = self.inner.api.match_dogs(&ids).await;

        let mut state = self.inner.state.lock().await;
        if state.epoch != epoch {
            tracing::debug!("Dropping match issued under an ended session");
            return Ok(None);
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let err = SearchError::from(e);
                tracing::error!("{}", err);
                state.last_error = Some(err.clone());
                return Err(err);
            }
        };

        state.match_result = Some(response.matched.clone());
        self.persist(&state);

        let dog = state.favorites.get(&response.matched).cloned();
        if dog.is_none() {
            tracing::warn!("Matched dog {} is not among the favorites", response.matched);
        }
        Ok(dog)
    }

    // ----- helpers -----

    async fn surface(&self, err: SearchError) -> SearchError {
        tracing::error!("{}", err);
        self.inner.state.lock().await.last_error = Some(err.clone());
        err
    }

    fn persist(&self, state: &EngineState) {
        let Some(session) = &state.session else {
            return;
        };

        if let Err(e) = self.inner.store.save(session.user_key(), &state.snapshot()) {
            tracing::warn!("Failed to save state for {}: {}", session.user_key(), e);
        }
    }
}
