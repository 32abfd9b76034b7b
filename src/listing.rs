//! Paged result accumulation shared by browse, search and account lists.
//!
//! Page 1 replaces the accumulated items and any later page appends. A
//! single request may be in flight per listing. Changing the key starts a new
//! generation, and responses tagged with an older generation are dropped.

use crate::tmdb::{Category, MediaItem, MediaType, Page};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    Browse {
        media_type: MediaType,
        category: Option<Category>,
    },
    Search {
        term: String,
    },
    Genre {
        media_type: MediaType,
        genre_id: u32,
    },
}

impl Query {
    pub fn media_type(&self) -> Option<MediaType> {
        match self {
            Query::Browse { media_type, .. } | Query::Genre { media_type, .. } => Some(*media_type),
            Query::Search { .. } => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Query::Browse {
                media_type,
                category: Some(category),
            } => format!("{} · {}", media_type.display_name(), category.display_name()),
            Query::Browse {
                media_type,
                category: None,
            } => format!("{} · Discover", media_type.display_name()),
            Query::Search { term } => format!("Search · \"{term}\""),
            Query::Genre { media_type, .. } => format!("{} · Genre", media_type.display_name()),
        }
    }
}

/// Identifies one page request so the response can be matched to its query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub generation: u64,
    pub page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Replaced,
    Appended,
    Stale,
}

#[derive(Debug, Clone)]
pub struct Listing<K> {
    key: K,
    items: Vec<MediaItem>,
    current_page: u32,
    total_pages: u32,
    loading_more: bool,
    generation: u64,
    in_flight: Option<Ticket>,
}

impl<K: Clone + PartialEq> Listing<K> {
    pub fn new(key: K) -> Self {
        Self {
            key,
            items: Vec::new(),
            current_page: 1,
            total_pages: 1,
            loading_more: false,
            generation: 0,
            in_flight: None,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_loading_more(&self) -> bool {
        self.loading_more
    }

    pub fn has_more(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Switches to a new query. Returns false if the key is unchanged.
    pub fn set_key(&mut self, key: K) -> bool {
        if self.key == key {
            return false;
        }
        self.key = key;
        self.reset();
        true
    }

    pub fn reset(&mut self) {
        self.items.clear();
        self.current_page = 1;
        self.total_pages = 1;
        self.loading_more = false;
        self.in_flight = None;
        self.generation += 1;
    }

    /// Starts over from page 1 for the current key.
    pub fn start_first_page(&mut self) -> Ticket {
        self.reset();
        let ticket = Ticket {
            generation: self.generation,
            page: 1,
        };
        self.in_flight = Some(ticket);
        ticket
    }

    /// Next page ticket, or `None` while a request is in flight or the last
    /// page has been reached.
    pub fn request_next(&mut self) -> Option<Ticket> {
        if self.in_flight.is_some() || !self.has_more() {
            return None;
        }
        let ticket = Ticket {
            generation: self.generation,
            page: self.current_page + 1,
        };
        self.in_flight = Some(ticket);
        self.loading_more = true;
        Some(ticket)
    }

    pub fn apply(&mut self, ticket: Ticket, page: Page<MediaItem>) -> Applied {
        if ticket.generation != self.generation {
            return Applied::Stale;
        }
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
            self.loading_more = false;
        }
        let total = page.total_pages.max(1);
        if ticket.page <= 1 {
            self.items = page.results;
            self.current_page = 1;
            self.total_pages = total;
            Applied::Replaced
        } else {
            self.items.extend(page.results);
            self.current_page = ticket.page;
            self.total_pages = total.max(self.current_page);
            Applied::Appended
        }
    }

    /// A failed fetch keeps the items and releases the in-flight guard.
    pub fn fail(&mut self, ticket: Ticket) -> bool {
        if ticket.generation != self.generation || self.in_flight != Some(ticket) {
            return false;
        }
        self.in_flight = None;
        self.loading_more = false;
        true
    }

    /// Whether a cursor at `position` is within `threshold` items of the end.
    pub fn near_end(&self, position: usize, threshold: usize) -> bool {
        !self.items.is_empty() && position + threshold >= self.items.len()
    }

    pub fn maybe_load_more(&mut self, position: usize, threshold: usize) -> Option<Ticket> {
        if self.near_end(position, threshold) {
            self.request_next()
        } else {
            None
        }
    }

    /// Drops every item with the given id. Returns how many were removed.
    pub fn remove_by_id(&mut self, id: u64) -> usize {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        before - self.items.len()
    }
}
