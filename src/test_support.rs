//! In-process fakes for the service seams.

use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use crate::auth::AuthorizationSurface;
use crate::data::{AccountRef, AccountService, AuthService, CatalogService, MarkRequest};
use crate::listing::Query;
use crate::tmdb::{
    self, CollectionKind, Genre, MediaDetails, MediaItem, MediaType, Page, StatusResponse,
};

pub fn items(ids: &[u64]) -> Vec<MediaItem> {
    ids.iter()
        .map(|id| MediaItem {
            id: *id,
            title: Some(format!("Title {id}")),
            genre_ids: vec![28],
            ..Default::default()
        })
        .collect()
}

pub fn page_of(ids: &[u64], page: u32, total_pages: u32) -> Page<MediaItem> {
    Page {
        page,
        results: items(ids),
        total_pages,
        total_results: 0,
    }
}

pub struct FakeAuth {
    request_token: String,
    session: Result<String, String>,
    account_id: u64,
    exchanged: Mutex<Vec<String>>,
    lookups: Mutex<usize>,
}

impl FakeAuth {
    pub fn new(request_token: &str, session: Result<String, String>) -> Self {
        Self {
            request_token: request_token.to_string(),
            session,
            account_id: 1,
            exchanged: Mutex::new(Vec::new()),
            lookups: Mutex::new(0),
        }
    }

    pub fn with_account(mut self, account_id: u64) -> Self {
        self.account_id = account_id;
        self
    }

    pub fn exchanged(&self) -> Vec<String> {
        self.exchanged.lock().clone()
    }

    pub fn account_lookups(&self) -> usize {
        *self.lookups.lock()
    }
}

impl AuthService for FakeAuth {
    fn create_request_token(&self) -> Result<String> {
        Ok(self.request_token.clone())
    }

    fn create_session(&self, request_token: &str) -> Result<String> {
        self.exchanged.lock().push(request_token.to_string());
        self.session.clone().map_err(|err| anyhow!(err))
    }

    fn account(&self, _session_id: &str) -> Result<tmdb::Account> {
        *self.lookups.lock() += 1;
        Ok(tmdb::Account {
            id: self.account_id,
            username: "tester".into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMark {
    pub kind: CollectionKind,
    pub account_id: u64,
    pub session_id: String,
    pub media_type: MediaType,
    pub media_id: u64,
    pub flag: bool,
}

pub struct FakeAccount {
    reply: Result<StatusResponse, String>,
    pages: Mutex<VecDeque<Page<MediaItem>>>,
    marks: Mutex<Vec<RecordedMark>>,
    lists: Mutex<Vec<(CollectionKind, MediaType, u32)>>,
}

impl FakeAccount {
    pub fn replying(reply: Result<StatusResponse, String>) -> Self {
        Self {
            reply,
            pages: Mutex::new(VecDeque::new()),
            marks: Mutex::new(Vec::new()),
            lists: Mutex::new(Vec::new()),
        }
    }

    pub fn with_pages(self, pages: Vec<Page<MediaItem>>) -> Self {
        *self.pages.lock() = pages.into();
        self
    }

    pub fn marks(&self) -> Vec<RecordedMark> {
        self.marks.lock().clone()
    }

    pub fn lists(&self) -> Vec<(CollectionKind, MediaType, u32)> {
        self.lists.lock().clone()
    }
}

impl AccountService for FakeAccount {
    fn mark(&self, request: &MarkRequest<'_>) -> Result<StatusResponse> {
        self.marks.lock().push(RecordedMark {
            kind: request.kind,
            account_id: request.account.account_id,
            session_id: request.account.session_id.to_string(),
            media_type: request.media_type,
            media_id: request.media_id,
            flag: request.flag,
        });
        self.reply.clone().map_err(|err| anyhow!(err))
    }

    fn list(
        &self,
        kind: CollectionKind,
        _account: &AccountRef<'_>,
        media_type: MediaType,
        page: u32,
    ) -> Result<Page<MediaItem>> {
        self.lists.lock().push((kind, media_type, page));
        self.pages
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow!("no page queued"))
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    pub genres: Vec<Genre>,
    pages: Mutex<VecDeque<Page<MediaItem>>>,
    requests: Mutex<Vec<(Query, u32)>>,
}

impl FakeCatalog {
    pub fn with_pages(pages: Vec<Page<MediaItem>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<(Query, u32)> {
        self.requests.lock().clone()
    }
}

impl CatalogService for FakeCatalog {
    fn genres(&self, _media_type: MediaType) -> Result<Vec<Genre>> {
        Ok(self.genres.clone())
    }

    fn fetch_page(&self, query: &Query, page: u32) -> Result<Page<MediaItem>> {
        self.requests.lock().push((query.clone(), page));
        self.pages
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow!("no page queued"))
    }

    fn details(&self, _media_type: MediaType, id: u64) -> Result<MediaDetails> {
        Err(anyhow!("no details for {id}"))
    }
}

/// Surface that reports closed after a fixed number of polls.
pub struct FakeSurface {
    close_after: u32,
    pub polls: u32,
    pub opened: Option<String>,
}

impl FakeSurface {
    pub fn closing_after(polls: u32) -> Self {
        Self {
            close_after: polls,
            polls: 0,
            opened: None,
        }
    }

    pub fn never_closing() -> Self {
        Self::closing_after(u32::MAX)
    }
}

impl AuthorizationSurface for FakeSurface {
    fn open(&mut self, url: &str) -> Result<()> {
        self.opened = Some(url.to_string());
        Ok(())
    }

    fn is_closed(&mut self) -> Result<bool> {
        self.polls = self.polls.saturating_add(1);
        Ok(self.polls > self.close_after)
    }
}
