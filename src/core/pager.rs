use crate::core::criteria::SearchCriteria;
use crate::models::{Dog, PageCursor, PageRequest, SearchResponse};
use std::collections::HashMap;

/// Lifecycle of the displayed page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerStatus {
    Idle,
    Loading,
    Loaded,
}

/// Cursor-based pagination position
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaginationState {
    pub cursor_next: Option<PageCursor>,
    pub cursor_prev: Option<PageCursor>,
    pub total: u32,
    /// Offset of the displayed page; only ever taken from a completed fetch
    pub page_offset: u32,
}

impl PaginationState {
    /// 1-based page number, 0 when there are no results
    pub fn current_page(&self, page_size: u32) -> u32 {
        if self.total == 0 {
            0
        } else {
            self.page_offset / page_size.max(1) + 1
        }
    }

    pub fn total_pages(&self, page_size: u32) -> u32 {
        self.total.div_ceil(page_size.max(1))
    }
}

/// An in-flight page fetch: the generation it belongs to and what it asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTicket {
    generation: u64,
    request: PageRequest,
}

impl PageTicket {
    pub fn request(&self) -> &PageRequest {
        &self.request
    }
}

/// A fetched page: the id list plus the dogs resolved from it
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub response: SearchResponse,
    pub dogs: Vec<Dog>,
}

/// Owns the current page and the cursor protocol.
///
/// Fetching is split in two halves so the network call can run without
/// holding the pager: `begin` hands out a ticket, and `complete`/`fail`
/// apply the outcome only when that ticket is still the newest one.
#[derive(Debug, Clone)]
pub struct ResultPager {
    page_size: u32,
    status: PagerStatus,
    pagination: PaginationState,
    result_ids: Vec<String>,
    dogs: Vec<Dog>,
    generation: u64,
    loaded_once: bool,
}

impl ResultPager {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            status: PagerStatus::Idle,
            pagination: PaginationState::default(),
            result_ids: Vec::new(),
            dogs: Vec::new(),
            generation: 0,
            loaded_once: false,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn status(&self) -> PagerStatus {
        self.status
    }

    pub fn pagination(&self) -> &PaginationState {
        &self.pagination
    }

    pub fn result_ids(&self) -> &[String] {
        &self.result_ids
    }

    pub fn dogs(&self) -> &[Dog] {
        &self.dogs
    }

    pub fn current_page(&self) -> u32 {
        self.pagination.current_page(self.page_size)
    }

    pub fn total_pages(&self) -> u32 {
        self.pagination.total_pages(self.page_size)
    }

    pub fn has_next(&self) -> bool {
        self.pagination.cursor_next.is_some() && self.current_page() < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.pagination.cursor_prev.is_some()
    }

    /// Request for the first page of `criteria`
    pub fn reset_request(&self, criteria: &SearchCriteria) -> PageRequest {
        PageRequest::Fresh(criteria.to_query(self.page_size))
    }

    /// Request for the following page, or `None` when there is nowhere to go
    pub fn next_request(&self) -> Option<PageRequest> {
        if !self.has_next() {
            return None;
        }
        self.pagination.cursor_next.clone().map(PageRequest::Cursor)
    }

    pub fn prev_request(&self) -> Option<PageRequest> {
        self.pagination.cursor_prev.clone().map(PageRequest::Cursor)
    }

    /// Start a fetch, superseding any fetch still in flight
    pub fn begin(&mut self, request: PageRequest) -> PageTicket {
        self.generation += 1;
        self.status = PagerStatus::Loading;

        PageTicket {
            generation: self.generation,
            request,
        }
    }

    pub fn is_current(&self, ticket: &PageTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Replace the displayed page. Returns `false` for a superseded ticket.
    pub fn complete(&mut self, ticket: &PageTicket, page: LoadedPage) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!(
                "Discarding stale page (generation {} < {})",
                ticket.generation,
                self.generation
            );
            return false;
        }

        self.pagination = PaginationState {
            cursor_next: page.response.next,
            cursor_prev: page.response.prev,
            total: page.response.total,
            page_offset: ticket.request.display_offset(),
        };
        self.result_ids = page.response.result_ids;
        self.dogs = page.dogs;
        self.status = PagerStatus::Loaded;
        self.loaded_once = true;

        true
    }

    /// Settle a failed fetch, keeping whatever page is displayed.
    ///
    /// There is no separate error status: a failure collapses straight back
    /// to `Loaded` (or `Idle` before the first page) and the error itself is
    /// reported to the caller. Returns `false` for a superseded ticket.
    pub fn fail(&mut self, ticket: &PageTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }

        self.status = if self.loaded_once {
            PagerStatus::Loaded
        } else {
            PagerStatus::Idle
        };
        true
    }

    /// Drop the page and invalidate every outstanding ticket
    pub fn clear(&mut self) {
        let generation = self.generation + 1;
        *self = Self::new(self.page_size);
        self.generation = generation;
    }
}

/// Arrange `dogs` in the order of `ids`; ids the lookup did not return are skipped
pub fn order_by_ids(ids: &[String], dogs: Vec<Dog>) -> Vec<Dog> {
    let mut by_id: HashMap<String, Dog> = dogs
        .into_iter()
        .map(|dog| (dog.id.clone(), dog))
        .collect();

    ids.iter()
        .filter_map(|id| {
            let dog = by_id.remove(id);
            if dog.is_none() {
                tracing::debug!("Search returned id {} but the lookup did not", id);
            }
            dog
        })
        .collect()
}
