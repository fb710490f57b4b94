use crate::core::error::SearchError;
use crate::models::{SearchQuery, SelectedLocation, SortSpec};
use crate::services::CriteriaSnapshot;

/// Immutable set of active filters and sort.
///
/// Every mutator returns a new value, so a caller detects a change with
/// `==`. Breeds and locations keep insertion order without duplicates.
/// When both age bounds are set, `age_min <= age_max` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchCriteria {
    breeds: Vec<String>,
    locations: Vec<SelectedLocation>,
    age_min: Option<u8>,
    age_max: Option<u8>,
    sort: SortSpec,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn breeds(&self) -> &[String] {
        &self.breeds
    }

    pub fn locations(&self) -> &[SelectedLocation] {
        &self.locations
    }

    pub fn zip_codes(&self) -> impl Iterator<Item = &str> {
        self.locations.iter().map(|l| l.zip.as_str())
    }

    pub fn age_min(&self) -> Option<u8> {
        self.age_min
    }

    pub fn age_max(&self) -> Option<u8> {
        self.age_max
    }

    pub fn sort(&self) -> SortSpec {
        self.sort
    }

    pub fn with_breed(&self, breed: &str) -> Self {
        let breed = breed.trim();
        if breed.is_empty() || self.breeds.iter().any(|b| b == breed) {
            return self.clone();
        }

        let mut next = self.clone();
        next.breeds.push(breed.to_string());
        next
    }

    pub fn without_breed(&self, breed: &str) -> Self {
        let breed = breed.trim();
        let mut next = self.clone();
        next.breeds.retain(|b| b != breed);
        next
    }

    pub fn with_location(&self, zip: &str, label: &str) -> Self {
        let zip = zip.trim();
        if zip.is_empty() || self.locations.iter().any(|l| l.zip == zip) {
            return self.clone();
        }

        let label = label.trim();
        let mut next = self.clone();
        next.locations.push(SelectedLocation {
            zip: zip.to_string(),
            display_text: if label.is_empty() { zip.to_string() } else { label.to_string() },
        });
        next
    }

    pub fn without_location(&self, zip: &str) -> Self {
        let zip = zip.trim();
        let mut next = self.clone();
        next.locations.retain(|l| l.zip != zip);
        next
    }

    /// Raising the minimum above the maximum drags the maximum up with it
    pub fn with_age_min(&self, age_min: Option<u8>) -> Self {
        let mut next = self.clone();
        next.age_min = age_min;
        if let (Some(min), Some(max)) = (age_min, next.age_max) {
            if min > max {
                next.age_max = Some(min);
            }
        }
        next
    }

    /// Lowering the maximum below the minimum drags the minimum down with it
    pub fn with_age_max(&self, age_max: Option<u8>) -> Self {
        let mut next = self.clone();
        next.age_max = age_max;
        if let (Some(min), Some(max)) = (next.age_min, age_max) {
            if max < min {
                next.age_min = Some(max);
            }
        }
        next
    }

    pub fn with_sort(&self, sort: SortSpec) -> Self {
        let mut next = self.clone();
        next.sort = sort;
        next
    }

    /// Parameters for the first page of results under these criteria
    pub fn to_query(&self, page_size: u32) -> SearchQuery {
        SearchQuery {
            breeds: self.breeds.clone(),
            zip_codes: self.zip_codes().map(str::to_string).collect(),
            age_min: self.age_min,
            age_max: self.age_max,
            size: page_size,
            sort: self.sort.to_string(),
        }
    }

    pub fn to_snapshot(&self) -> CriteriaSnapshot {
        CriteriaSnapshot {
            breeds: self.breeds.clone(),
            zip_codes: self.zip_codes().map(str::to_string).collect(),
            age_min: self.age_min,
            age_max: self.age_max,
            sort_field: self.sort.field,
            sort_order: self.sort.order,
        }
    }

    /// Rebuild criteria from saved state, replaying it through the mutators
    /// so a hand-edited snapshot cannot break the invariants.
    pub fn from_snapshot(snapshot: &CriteriaSnapshot, labels: &[SelectedLocation]) -> Self {
        let mut criteria = snapshot
            .breeds
            .iter()
            .fold(Self::new(), |c, breed| c.with_breed(breed));

        for zip in &snapshot.zip_codes {
            let label = labels
                .iter()
                .find(|l| &l.zip == zip)
                .map(|l| l.display_text.as_str())
                .unwrap_or(zip.as_str());
            criteria = criteria.with_location(zip, label);
        }

        criteria
            .with_age_min(snapshot.age_min)
            .with_age_max(snapshot.age_max)
            .with_sort(SortSpec::new(snapshot.sort_field, snapshot.sort_order))
    }
}

/// Parse raw age-field text.
///
/// Empty text clears the bound. Non-numeric or negative input is rejected
/// here and never reaches [`SearchCriteria`].
pub fn parse_age_input(raw: &str) -> Result<Option<u8>, SearchError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let value: i64 = raw
        .parse()
        .map_err(|_| SearchError::Validation(format!("Age must be a whole number, got '{}'", raw)))?;

    if value < 0 {
        return Err(SearchError::Validation("Age cannot be negative".to_string()));
    }

    u8::try_from(value)
        .map(Some)
        .map_err(|_| SearchError::Validation(format!("Age {} is out of range", value)))
}
