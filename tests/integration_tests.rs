// Integration tests for the search engine

use async_trait::async_trait;
use dogfinder::core::{FetchOutcome, OrchestratorConfig, PagerStatus, SearchError, SearchOrchestrator};
use dogfinder::models::{
    Dog, Location, LocationSearchRequest, LocationSearchResponse, MatchResponse, PageCursor, PageRequest,
    SearchResponse, SortField, SortOrder,
};
use dogfinder::services::{ApiError, DogApi, FetchClient, MemorySnapshotStore, PersistedSnapshot, SnapshotStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PAGE_SIZE: u32 = 25;

fn create_dog(n: usize, breed: &str) -> Dog {
    Dog {
        id: format!("d{}", n),
        name: format!("Dog {}", n),
        age: (n % 12) as u8,
        breed: breed.to_string(),
        zip_code: "02108".to_string(),
        image_url: format!("https://img.test/d{}.jpg", n),
    }
}

fn create_location(city: &str, zip: &str) -> Location {
    Location {
        zip_code: zip.to_string(),
        city: city.to_string(),
        state: "MA".to_string(),
        county: "Suffolk".to_string(),
        latitude: 42.36,
        longitude: -71.06,
    }
}

/// In-memory stand-in for the search API.
///
/// 63 dogs: odd ids are Labradors, even ids Beagles, plus three Poodles.
/// The batch lookup answers in reverse order on purpose.
#[derive(Default)]
struct FakeApi {
    dogs: Vec<Dog>,
    calls: Mutex<Vec<String>>,
    requests: Mutex<Vec<PageRequest>>,
    search_delays: Mutex<HashMap<String, u64>>,
    locations: Mutex<HashMap<String, (u64, Vec<Location>)>>,
    match_id: Mutex<Option<String>>,
    match_delay: AtomicU64,
    fail_search: AtomicBool,
    fail_logout: AtomicBool,
    fail_locations: AtomicBool,
}

impl FakeApi {
    fn new() -> Self {
        let mut dogs: Vec<Dog> = (1..=60)
            .map(|n| create_dog(n, if n % 2 == 1 { "Labrador" } else { "Beagle" }))
            .collect();
        dogs.extend((61..=63).map(|n| create_dog(n, "Poodle")));

        Self {
            dogs,
            ..Default::default()
        }
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn last_request(&self) -> Option<PageRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn delay_search(&self, breeds: &[&str], millis: u64) {
        self.search_delays
            .lock()
            .unwrap()
            .insert(breeds.join(","), millis);
    }

    fn respond_to_location(&self, query: &str, millis: u64, results: Vec<Location>) {
        self.locations
            .lock()
            .unwrap()
            .insert(query.to_string(), (millis, results));
    }

    fn page_for(&self, breeds: &[String], from: u32, size: u32) -> SearchResponse {
        let matching: Vec<&Dog> = self
            .dogs
            .iter()
            .filter(|d| breeds.is_empty() || breeds.contains(&d.breed))
            .collect();
        let total = matching.len() as u32;

        let breed_params: String = breeds.iter().map(|b| format!("&breeds={}", b)).collect();
        let cursor = |offset: u32| PageCursor::new(format!("/dogs/search?size={}&from={}{}", size, offset, breed_params));

        SearchResponse {
            result_ids: matching
                .iter()
                .skip(from as usize)
                .take(size as usize)
                .map(|d| d.id.clone())
                .collect(),
            total,
            next: (from + size < total).then(|| cursor(from + size)),
            prev: (from > 0).then(|| cursor(from.saturating_sub(size))),
        }
    }
}

fn parse_cursor(cursor: &PageCursor) -> (Vec<String>, u32, u32) {
    let query = cursor.as_str().split_once('?').map(|(_, q)| q).unwrap_or("");
    let mut breeds = Vec::new();
    let mut from = 0;
    let mut size = PAGE_SIZE;

    for (key, value) in query.split('&').filter_map(|p| p.split_once('=')) {
        match key {
            "breeds" => breeds.push(value.to_string()),
            "from" => from = value.parse().unwrap(),
            "size" => size = value.parse().unwrap(),
            _ => {}
        }
    }
    (breeds, from, size)
}

#[async_trait]
impl DogApi for FakeApi {
    async fn login(&self, _name: &str, _email: &str) -> Result<(), ApiError> {
        self.record("login");
        Ok(())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.record("logout");
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(ApiError::ApiError {
                status: 500,
                message: "logout unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_breeds(&self) -> Result<Vec<String>, ApiError> {
        self.record("breeds");
        Ok(vec!["Beagle".to_string(), "Labrador".to_string(), "Poodle".to_string()])
    }

    async fn search(&self, request: &PageRequest) -> Result<SearchResponse, ApiError> {
        self.record("search");
        self.requests.lock().unwrap().push(request.clone());

        let (breeds, from, size) = match request {
            PageRequest::Fresh(query) => (query.breeds.clone(), 0, query.size),
            PageRequest::Cursor(cursor) => parse_cursor(cursor),
        };

        let delay = self
            .search_delays
            .lock()
            .unwrap()
            .get(&breeds.join(","))
            .copied()
            .unwrap_or(0);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail_search.load(Ordering::SeqCst) {
            return Err(ApiError::ApiError {
                status: 500,
                message: "search backend down".to_string(),
            });
        }

        Ok(self.page_for(&breeds, from, size))
    }

    async fn fetch_dogs(&self, ids: &[String]) -> Result<Vec<Dog>, ApiError> {
        self.record("fetch_dogs");
        let mut found: Vec<Dog> = self
            .dogs
            .iter()
            .filter(|d| ids.contains(&d.id))
            .cloned()
            .collect();
        found.reverse();
        Ok(found)
    }

    async fn search_locations(
        &self,
        request: &LocationSearchRequest,
    ) -> Result<LocationSearchResponse, ApiError> {
        self.record("locations");
        let city = request.city.clone().unwrap_or_default();
        let (delay, results) = self
            .locations
            .lock()
            .unwrap()
            .get(&city)
            .cloned()
            .unwrap_or_default();

        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail_locations.load(Ordering::SeqCst) {
            return Err(ApiError::ApiError {
                status: 503,
                message: "locations unavailable".to_string(),
            });
        }

        Ok(LocationSearchResponse {
            total: results.len() as u32,
            results,
        })
    }

    async fn match_dogs(&self, ids: &[String]) -> Result<MatchResponse, ApiError> {
        self.record("match");
        let matched = self
            .match_id
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| ids[0].clone());

        let delay = self.match_delay.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(MatchResponse { matched })
    }
}

fn create_engine(api: &Arc<FakeApi>, store: &Arc<MemorySnapshotStore>) -> SearchOrchestrator {
    create_engine_with(api, store, OrchestratorConfig::default())
}

fn create_engine_with(
    api: &Arc<FakeApi>,
    store: &Arc<MemorySnapshotStore>,
    config: OrchestratorConfig,
) -> SearchOrchestrator {
    let api: Arc<dyn DogApi> = api.clone();
    let store: Arc<dyn SnapshotStore> = store.clone();
    SearchOrchestrator::new(api, store, config)
}

async fn logged_in() -> (Arc<FakeApi>, Arc<MemorySnapshotStore>, SearchOrchestrator) {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemorySnapshotStore::new());
    let engine = create_engine(&api, &store);
    engine.login("Ada", "ada@example.com").await.unwrap();
    (api, store, engine)
}

fn ids(dogs: &[Dog]) -> Vec<&str> {
    dogs.iter().map(|d| d.id.as_str()).collect()
}

#[tokio::test]
async fn test_first_page_in_server_order() {
    let (api, _store, engine) = logged_in().await;

    let outcome = engine.reset_and_search().await.unwrap();
    assert_eq!(outcome, FetchOutcome::Applied);

    let page = engine.page().await;
    let expected: Vec<String> = (1..=25).map(|n| format!("d{}", n)).collect();
    assert_eq!(ids(&page.dogs), expected.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(page.total, 63);
    assert_eq!(page.current_page, 1);
    assert_eq!(page.total_pages, 3);
    assert!(page.has_next);
    assert!(!page.has_prev);
    assert_eq!(page.status, PagerStatus::Loaded);
    assert_eq!(api.count("fetch_dogs"), 1);
}

#[tokio::test]
async fn test_criteria_change_resets_to_first_page() {
    let (api, _store, engine) = logged_in().await;

    engine.reset_and_search().await.unwrap();
    engine.go_next().await.unwrap();
    engine.go_next().await.unwrap();
    assert_eq!(engine.page().await.current_page, 3);

    let outcome = engine.add_breed("Poodle").await.unwrap();
    assert_eq!(outcome, FetchOutcome::Applied);

    match api.last_request() {
        Some(PageRequest::Fresh(query)) => assert_eq!(query.breeds, vec!["Poodle"]),
        other => panic!("expected a fresh search, got {:?}", other),
    }

    let page = engine.page().await;
    assert_eq!(page.current_page, 1);
    assert_eq!(page.total_pages, 1);
    assert_eq!(ids(&page.dogs), vec!["d61", "d62", "d63"]);
}

#[tokio::test]
async fn test_unchanged_criteria_issue_no_search() {
    let (api, _store, engine) = logged_in().await;

    engine.add_breed("Poodle").await.unwrap();
    let searches = api.count("search");

    assert_eq!(engine.add_breed("Poodle").await.unwrap(), FetchOutcome::Unchanged);
    assert_eq!(engine.add_breed("  ").await.unwrap(), FetchOutcome::Unchanged);
    assert_eq!(api.count("search"), searches);
}

#[tokio::test]
async fn test_navigation_without_cursor_is_noop() {
    let (api, _store, engine) = logged_in().await;

    engine.add_breed("Poodle").await.unwrap();
    let before = engine.page().await;
    let searches = api.count("search");

    assert_eq!(engine.go_next().await.unwrap(), FetchOutcome::Skipped);
    assert_eq!(engine.go_prev().await.unwrap(), FetchOutcome::Skipped);
    assert_eq!(api.count("search"), searches);
    assert_eq!(engine.page().await, before);
}

#[tokio::test]
async fn test_next_then_prev() {
    let (api, _store, engine) = logged_in().await;

    engine.add_breed("Labrador").await.unwrap();
    assert_eq!(engine.go_next().await.unwrap(), FetchOutcome::Applied);

    let page = engine.page().await;
    assert_eq!(page.current_page, 2);
    assert!(!page.has_next);
    assert!(page.has_prev);
    assert_eq!(page.dogs.len(), 5);

    // The cursor went out exactly as the server issued it
    match api.last_request() {
        Some(PageRequest::Cursor(cursor)) => {
            assert_eq!(cursor.as_str(), "/dogs/search?size=25&from=25&breeds=Labrador")
        }
        other => panic!("expected a cursor request, got {:?}", other),
    }

    assert_eq!(engine.go_prev().await.unwrap(), FetchOutcome::Applied);
    let page = engine.page().await;
    assert_eq!(page.current_page, 1);
    assert_eq!(page.dogs[0].id, "d1");
}

#[tokio::test(start_paused = true)]
async fn test_stale_search_is_discarded() {
    let (api, _store, engine) = logged_in().await;
    api.delay_search(&["Labrador"], 500);
    api.delay_search(&["Labrador", "Poodle"], 10);

    let (first, second) = tokio::join!(engine.add_breed("Labrador"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.add_breed("Poodle").await
    });

    assert_eq!(first.unwrap(), FetchOutcome::Superseded);
    assert_eq!(second.unwrap(), FetchOutcome::Applied);

    let page = engine.page().await;
    assert_eq!(page.total, 33);
    assert!(page.dogs.iter().all(|d| d.breed == "Labrador" || d.breed == "Poodle"));
    // The superseded search never resolved its ids
    assert_eq!(api.count("fetch_dogs"), 1);
}

#[tokio::test]
async fn test_failed_fetch_keeps_displayed_page() {
    let (api, _store, engine) = logged_in().await;
    engine.reset_and_search().await.unwrap();

    api.fail_search.store(true, Ordering::SeqCst);
    let err = engine.add_breed("Beagle").await.unwrap_err();
    assert!(matches!(err, SearchError::Request(ref msg) if msg.contains("search backend down")));

    let page = engine.page().await;
    assert_eq!(page.dogs.len(), 25);
    assert_eq!(page.current_page, 1);
    assert_eq!(page.status, PagerStatus::Loaded);
    assert_eq!(engine.last_error().await, Some(err));

    engine.dismiss_error().await;
    assert_eq!(engine.last_error().await, None);

    // Retrying is up to the user
    api.fail_search.store(false, Ordering::SeqCst);
    assert_eq!(engine.reset_and_search().await.unwrap(), FetchOutcome::Applied);
    assert!(engine.page().await.dogs.iter().all(|d| d.breed == "Beagle"));
}

#[tokio::test]
async fn test_match_requires_favorites() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemorySnapshotStore::new());
    let engine = create_engine(&api, &store);

    let err = engine.generate_match().await.unwrap_err();
    assert!(matches!(err, SearchError::Validation(_)));
    assert_eq!(api.total_calls(), 0);
    assert_eq!(engine.last_error().await, Some(err));
}

#[tokio::test]
async fn test_match_resolves_from_favorites() {
    let (api, _store, engine) = logged_in().await;
    engine.reset_and_search().await.unwrap();

    let page = engine.page().await;
    engine.toggle_favorite(&page.dogs[0]).await;
    engine.toggle_favorite(&page.dogs[3]).await;
    *api.match_id.lock().unwrap() = Some("d4".to_string());

    let matched = engine.generate_match().await.unwrap();
    assert_eq!(matched.map(|d| d.id), Some("d4".to_string()));
    assert_eq!(engine.match_result().await, Some("d4".to_string()));

    // Unfavoriting the winner leaves a match that resolves to nothing
    engine.toggle_favorite(&page.dogs[3]).await;
    assert_eq!(engine.match_result().await, Some("d4".to_string()));
    assert_eq!(engine.matched_dog().await, None);
}

#[tokio::test]
async fn test_match_outside_favorites_is_not_an_error() {
    let (api, _store, engine) = logged_in().await;
    engine.toggle_favorite(&create_dog(7, "Labrador")).await;
    *api.match_id.lock().unwrap() = Some("d999".to_string());

    assert_eq!(engine.generate_match().await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_match_from_ended_session_is_dropped() {
    let (api, store, engine) = logged_in().await;
    engine.toggle_favorite(&create_dog(1, "Labrador")).await;
    api.match_delay.store(500, Ordering::SeqCst);

    let (matched, _) = tokio::join!(engine.generate_match(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.logout().await;
        engine.login("Bob", "bob@example.com").await.unwrap();
    });

    assert_eq!(matched.unwrap(), None);
    assert_eq!(engine.user().await.map(|u| u.name), Some("Bob".to_string()));
    assert_eq!(engine.match_result().await, None);
    assert_eq!(store.load("bob@example.com").and_then(|s| s.match_result), None);
    assert_eq!(store.load("ada@example.com").and_then(|s| s.match_result), None);
}

#[tokio::test]
async fn test_favorites_survive_paging_and_filters() {
    let (_api, _store, engine) = logged_in().await;
    engine.reset_and_search().await.unwrap();

    let first = engine.page().await.dogs[0].clone();
    assert!(engine.toggle_favorite(&first).await);

    engine.go_next().await.unwrap();
    engine.add_breed("Poodle").await.unwrap();

    let favorites = engine.favorites().await;
    assert_eq!(favorites.ids(), vec![first.id.clone()]);

    // Toggled off from outside the current page
    assert!(!engine.toggle_favorite(&first).await);
    assert!(engine.favorites().await.is_empty());
}

#[tokio::test]
async fn test_logout_clears_state_even_when_remote_fails() {
    let (api, _store, engine) = logged_in().await;
    engine.add_breed("Labrador").await.unwrap();
    let dog = engine.page().await.dogs[0].clone();
    engine.toggle_favorite(&dog).await;

    api.fail_logout.store(true, Ordering::SeqCst);
    engine.logout().await;

    assert_eq!(api.count("logout"), 1);
    assert!(!engine.is_logged_in().await);
    assert_eq!(engine.user().await, None);
    assert!(engine.favorites().await.is_empty());
    assert!(engine.criteria().await.breeds().is_empty());

    let page = engine.page().await;
    assert!(page.dogs.is_empty());
    assert_eq!(page.current_page, 0);
    assert_eq!(page.status, PagerStatus::Idle);
}

#[tokio::test]
async fn test_state_is_saved_per_user() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemorySnapshotStore::new());
    let engine = create_engine(&api, &store);

    engine.login("Ada", "ada@example.com").await.unwrap();
    engine.add_breed("Beagle").await.unwrap();
    engine.add_location("02108", "Boston, MA (02108)").await.unwrap();
    engine.set_sort(SortField::Age, SortOrder::Desc).await.unwrap();
    let dog = engine.page().await.dogs[0].clone();
    engine.toggle_favorite(&dog).await;
    engine.logout().await;

    engine.login("Bob", "bob@example.com").await.unwrap();
    assert!(engine.criteria().await.breeds().is_empty());
    assert!(engine.favorites().await.is_empty());
    engine.logout().await;

    engine.login("Ada", "  ADA@Example.com ").await.unwrap();
    let criteria = engine.criteria().await;
    assert_eq!(criteria.breeds(), &["Beagle".to_string()]);
    assert_eq!(criteria.locations()[0].display_text, "Boston, MA (02108)");
    assert_eq!(criteria.sort().to_string(), "age:desc");
    assert_eq!(engine.favorites().await.ids(), vec![dog.id]);
}

#[tokio::test]
async fn test_corrupt_snapshot_is_ignored() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemorySnapshotStore::new());
    store.put_raw("ada@example.com", "{\"criteria\": 42");
    let engine = create_engine(&api, &store);

    engine.login("Ada", "ada@example.com").await.unwrap();
    assert!(engine.criteria().await.breeds().is_empty());
    assert_eq!(engine.last_error().await, None);

    // The next change overwrites the corrupt blob
    engine.add_breed("Poodle").await.unwrap();
    let snapshot = store.load("ada@example.com").unwrap();
    assert_eq!(snapshot.criteria.breeds, vec!["Poodle"]);
}

#[tokio::test]
async fn test_invalid_login_sends_nothing() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemorySnapshotStore::new());
    let engine = create_engine(&api, &store);

    let err = engine.login("", "not-an-email").await.unwrap_err();
    assert!(matches!(err, SearchError::Validation(_)));
    assert_eq!(api.total_calls(), 0);
    assert!(!engine.is_logged_in().await);
}

#[tokio::test(start_paused = true)]
async fn test_age_typing_is_debounced() {
    let (api, _store, engine) = logged_in().await;

    engine.input_age_min("1").unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.input_age_min("12").unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.input_age_min("3").unwrap();

    assert_eq!(api.count("search"), 0);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(api.count("search"), 1);
    assert_eq!(engine.criteria().await.age_min(), Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_age_typing_rejected() {
    let (api, _store, engine) = logged_in().await;

    assert!(matches!(engine.input_age_max("-2"), Err(SearchError::Validation(_))));
    assert!(matches!(engine.input_age_max("two"), Err(SearchError::Validation(_))));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(api.count("search"), 0);
    assert_eq!(engine.criteria().await.age_max(), None);
}

#[tokio::test(start_paused = true)]
async fn test_age_typing_clamps_other_bound() {
    let (_api, _store, engine) = logged_in().await;
    engine.set_age_max(Some(4)).await.unwrap();

    engine.input_age_min("9").unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let criteria = engine.criteria().await;
    assert_eq!(criteria.age_min(), Some(9));
    assert_eq!(criteria.age_max(), Some(9));
}

#[tokio::test(start_paused = true)]
async fn test_pending_input_dropped_on_logout() {
    let (api, _store, engine) = logged_in().await;

    engine.input_age_min("4").unwrap();
    engine.logout().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(api.count("search"), 0);
    assert_eq!(engine.criteria().await.age_min(), None);
}

#[tokio::test(start_paused = true)]
async fn test_login_drops_previous_session_work() {
    let (api, store, engine) = logged_in().await;
    api.respond_to_location("Boston", 0, vec![create_location("Boston", "02108")]);
    engine.location_resolver().lookup("Boston").await.unwrap();

    engine.input_age_min("7").unwrap();
    engine.login("Bob", "bob@example.com").await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(api.count("search"), 0);
    assert_eq!(engine.criteria().await.age_min(), None);
    assert_eq!(store.load("bob@example.com").and_then(|s| s.criteria.age_min), None);
    assert!(engine.location_resolver().candidates().await.is_empty());
    assert_eq!(engine.location_resolver().query().await, "");
}

#[tokio::test(start_paused = true)]
async fn test_pending_input_dropped_with_engine() {
    let (api, _store, engine) = logged_in().await;

    engine.input_age_min("4").unwrap();
    drop(engine);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(api.count("search"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stale_location_response_discarded() {
    let (api, _store, engine) = logged_in().await;
    api.respond_to_location(
        "Bos",
        500,
        vec![create_location("Boston", "02108"), create_location("Bossier City", "71111")],
    );
    api.respond_to_location(
        "Boston",
        10,
        vec![
            create_location("Boston", "02108"),
            create_location("South Boston", "02127"),
            create_location("Worcester", "01602"),
        ],
    );

    let resolver = engine.location_resolver();
    let (stale, fresh) = tokio::join!(resolver.lookup("Bos"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        resolver.lookup("Boston").await
    });

    // The stale lookup still reports its own results to its caller
    assert_eq!(stale.unwrap().len(), 2);
    assert_eq!(fresh.unwrap().len(), 2);

    let cities: Vec<String> = resolver.candidates().await.into_iter().map(|l| l.city).collect();
    assert_eq!(cities, vec!["Boston", "South Boston"]);
    assert_eq!(resolver.query().await, "Boston");
}

#[tokio::test(start_paused = true)]
async fn test_location_typing_debounced_and_empty_query_skips_lookup() {
    let (api, _store, engine) = logged_in().await;
    api.respond_to_location("Bos", 0, vec![create_location("Boston", "02108")]);
    let resolver = engine.location_resolver();

    resolver.set_query("B").await;
    resolver.set_query("Bo").await;
    resolver.set_query(" Bos ").await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(api.count("locations"), 1);
    assert_eq!(resolver.candidates().await.len(), 1);

    resolver.set_query("   ").await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(api.count("locations"), 1);
    assert!(resolver.candidates().await.is_empty());
}

#[tokio::test]
async fn test_location_error_cleared_by_next_lookup() {
    let (api, _store, engine) = logged_in().await;
    api.respond_to_location("Boston", 0, vec![create_location("Boston", "02108")]);
    let resolver = engine.location_resolver();

    api.fail_locations.store(true, Ordering::SeqCst);
    assert!(resolver.lookup("Boston").await.is_err());
    assert!(matches!(resolver.error().await, Some(SearchError::Request(_))));

    api.fail_locations.store(false, Ordering::SeqCst);
    assert_eq!(resolver.lookup("Boston").await.unwrap().len(), 1);
    assert_eq!(resolver.error().await, None);
    assert!(!resolver.is_loading().await);
}

#[tokio::test]
async fn test_apply_criteria_searches_once() {
    let (api, _store, engine) = logged_in().await;

    let criteria = engine
        .criteria()
        .await
        .with_breed("Labrador")
        .with_location("02108", "Boston, MA (02108)")
        .with_age_min(Some(2))
        .with_age_max(Some(5));

    assert_eq!(engine.apply_criteria(criteria.clone()).await.unwrap(), FetchOutcome::Applied);
    assert_eq!(api.count("search"), 1);
    assert_eq!(engine.criteria().await, criteria);

    assert_eq!(engine.apply_criteria(criteria).await.unwrap(), FetchOutcome::Unchanged);
    assert_eq!(api.count("search"), 1);
}

#[tokio::test]
async fn test_select_location_adds_pill() {
    let (api, _store, engine) = logged_in().await;
    api.respond_to_location("Boston", 0, vec![create_location("Boston", "02108")]);

    let candidates = engine.location_resolver().lookup("Boston").await.unwrap();
    let outcome = engine.select_location(&candidates[0]).await.unwrap();
    assert_eq!(outcome, FetchOutcome::Applied);

    let criteria = engine.criteria().await;
    assert_eq!(criteria.locations()[0].zip, "02108");
    assert_eq!(criteria.locations()[0].display_text, "Boston, MA (02108)");
    assert!(engine.location_resolver().candidates().await.is_empty());

    match api.last_request() {
        Some(PageRequest::Fresh(query)) => assert_eq!(query.zip_codes, vec!["02108"]),
        other => panic!("expected a fresh search, got {:?}", other),
    }
}

#[tokio::test]
async fn test_breeds_loaded_once_per_session() {
    let (api, _store, engine) = logged_in().await;

    let breeds = engine.breeds().await.unwrap();
    assert_eq!(breeds.len(), 3);
    engine.breeds().await.unwrap();
    assert_eq!(api.count("breeds"), 1);

    engine.logout().await;
    engine.login("Ada", "ada@example.com").await.unwrap();
    engine.breeds().await.unwrap();
    assert_eq!(api.count("breeds"), 2);
}

#[tokio::test]
async fn test_expired_session_logs_out() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemorySnapshotStore::new());
    let config = OrchestratorConfig {
        session_duration: chrono::Duration::zero(),
        ..Default::default()
    };
    let engine = create_engine_with(&api, &store, config);

    engine.login("Ada", "ada@example.com").await.unwrap();
    assert!(engine.expire_if_due().await);
    assert!(!engine.is_logged_in().await);
    assert_eq!(api.count("logout"), 1);

    // Nothing left to expire
    assert!(!engine.expire_if_due().await);
}

#[tokio::test]
async fn test_session_countdown() {
    let (_api, _store, engine) = logged_in().await;

    let remaining = engine.session_remaining().await.unwrap();
    assert!(remaining <= chrono::Duration::seconds(3600));
    assert!(remaining > chrono::Duration::seconds(3500));
    assert!(!engine.expire_if_due().await);
}

#[tokio::test]
async fn test_end_to_end_against_http_fixture() {
    let mut server = mockito::Server::new_async().await;

    let login = server
        .mock("POST", "/auth/login")
        .with_status(200)
        .with_header("set-cookie", "fetch-access-token=token-1; HttpOnly")
        .create_async()
        .await;
    let search = server
        .mock("GET", "/dogs/search")
        .match_header("cookie", "fetch-access-token=token-1")
        .match_query(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("breeds".into(), "Labrador".into()),
            mockito::Matcher::UrlEncoded("ageMin".into(), "2".into()),
            mockito::Matcher::UrlEncoded("ageMax".into(), "5".into()),
            mockito::Matcher::UrlEncoded("size".into(), "25".into()),
            mockito::Matcher::UrlEncoded("sort".into(), "age:asc".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"resultIds":["d1","d2"],"total":2,"next":null,"prev":null}"#)
        .expect(1)
        .create_async()
        .await;
    let dogs = server
        .mock("POST", "/dogs")
        .match_body(mockito::Matcher::Json(serde_json::json!(["d1", "d2"])))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[
                {"id":"d2","img":"https://img.test/d2.jpg","name":"Bo","age":5,"zip_code":"02108","breed":"Labrador"},
                {"id":"d1","img":"https://img.test/d1.jpg","name":"Ace","age":2,"zip_code":"02108","breed":"Labrador"}
            ]"#,
        )
        .create_async()
        .await;

    // Criteria arrive as this user's saved state, so the first search is the only one
    let store = Arc::new(MemorySnapshotStore::new());
    store
        .save(
            "ada@example.com",
            &serde_json::from_value::<PersistedSnapshot>(serde_json::json!({
                "criteria": {
                    "breeds": ["Labrador"],
                    "ageMin": 2,
                    "ageMax": 5,
                    "sortField": "age",
                    "sortOrder": "asc"
                }
            }))
            .unwrap(),
        )
        .unwrap();

    let api: Arc<dyn DogApi> = Arc::new(FetchClient::new(server.url(), Duration::from_secs(5)));
    let store_dyn: Arc<dyn SnapshotStore> = store.clone();
    let engine = SearchOrchestrator::new(api, store_dyn, OrchestratorConfig::default());

    engine.login("Ada", "ada@example.com").await.unwrap();
    assert_eq!(engine.reset_and_search().await.unwrap(), FetchOutcome::Applied);

    let page = engine.page().await;
    assert_eq!(ids(&page.dogs), vec!["d1", "d2"]);
    assert_eq!(page.current_page, 1);
    assert_eq!(page.total_pages, 1);
    assert!(!page.has_next);
    assert!(!page.has_prev);

    assert_eq!(engine.go_next().await.unwrap(), FetchOutcome::Skipped);
    assert_eq!(engine.go_prev().await.unwrap(), FetchOutcome::Skipped);

    login.assert_async().await;
    search.assert_async().await;
    dogs.assert_async().await;
}
