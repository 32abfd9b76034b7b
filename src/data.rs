use std::sync::Arc;

use anyhow::{Context, Result};

use crate::listing::Query;
use crate::tmdb::{
    self, CollectionKind, Genre, MediaDetails, MediaItem, MediaType, Page, StatusResponse,
};

pub trait CatalogService: Send + Sync {
    fn genres(&self, media_type: MediaType) -> Result<Vec<Genre>>;
    fn fetch_page(&self, query: &Query, page: u32) -> Result<Page<MediaItem>>;
    fn details(&self, media_type: MediaType, id: u64) -> Result<MediaDetails>;
}

pub trait AccountService: Send + Sync {
    fn mark(&self, request: &MarkRequest<'_>) -> Result<StatusResponse>;
    fn list(
        &self,
        kind: CollectionKind,
        account: &AccountRef<'_>,
        media_type: MediaType,
        page: u32,
    ) -> Result<Page<MediaItem>>;
}

pub trait AuthService: Send + Sync {
    fn create_request_token(&self) -> Result<String>;
    fn create_session(&self, request_token: &str) -> Result<String>;
    fn account(&self, session_id: &str) -> Result<tmdb::Account>;
}

/// Account id plus the session that authorizes requests against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountRef<'a> {
    pub account_id: u64,
    pub session_id: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkRequest<'a> {
    pub kind: CollectionKind,
    pub account: AccountRef<'a>,
    pub media_type: MediaType,
    pub media_id: u64,
    pub flag: bool,
}

pub struct TmdbCatalogService {
    client: Arc<tmdb::Client>,
}

impl TmdbCatalogService {
    pub fn new(client: Arc<tmdb::Client>) -> Self {
        Self { client }
    }
}

impl CatalogService for TmdbCatalogService {
    fn genres(&self, media_type: MediaType) -> Result<Vec<Genre>> {
        self.client
            .genres(media_type)
            .with_context(|| format!("fetch {} genres", media_type.as_str()))
    }

    fn fetch_page(&self, query: &Query, page: u32) -> Result<Page<MediaItem>> {
        match query {
            Query::Browse {
                media_type,
                category: Some(category),
            } => self
                .client
                .category(*media_type, *category, page)
                .with_context(|| format!("fetch {} page {page}", category.as_str())),
            Query::Browse {
                media_type,
                category: None,
            } => self
                .client
                .discover(*media_type, page, None)
                .with_context(|| format!("discover {} page {page}", media_type.as_str())),
            Query::Genre {
                media_type,
                genre_id,
            } => self
                .client
                .discover(*media_type, page, Some(*genre_id))
                .with_context(|| format!("discover genre {genre_id} page {page}")),
            Query::Search { term } => self
                .client
                .search_multi(term, page)
                .with_context(|| format!("search {term:?} page {page}")),
        }
    }

    fn details(&self, media_type: MediaType, id: u64) -> Result<MediaDetails> {
        self.client
            .details(media_type, id)
            .with_context(|| format!("fetch {} {id} details", media_type.as_str()))
    }
}

pub struct TmdbAccountService {
    client: Arc<tmdb::Client>,
}

impl TmdbAccountService {
    pub fn new(client: Arc<tmdb::Client>) -> Self {
        Self { client }
    }
}

impl AccountService for TmdbAccountService {
    fn mark(&self, request: &MarkRequest<'_>) -> Result<StatusResponse> {
        self.client
            .mark(
                request.kind,
                request.account.account_id,
                request.account.session_id,
                request.media_type,
                request.media_id,
                request.flag,
            )
            .with_context(|| format!("update {}", request.kind.display_name()))
    }

    fn list(
        &self,
        kind: CollectionKind,
        account: &AccountRef<'_>,
        media_type: MediaType,
        page: u32,
    ) -> Result<Page<MediaItem>> {
        self.client
            .account_list(kind, account.account_id, account.session_id, media_type, page)
            .with_context(|| format!("fetch {} page {page}", kind.display_name()))
    }
}

pub struct TmdbAuthService {
    client: Arc<tmdb::Client>,
}

impl TmdbAuthService {
    pub fn new(client: Arc<tmdb::Client>) -> Self {
        Self { client }
    }
}

impl AuthService for TmdbAuthService {
    fn create_request_token(&self) -> Result<String> {
        self.client
            .create_request_token()
            .context("request authentication token")
    }

    fn create_session(&self, request_token: &str) -> Result<String> {
        self.client
            .create_session(request_token)
            .context("exchange request token for session")
    }

    fn account(&self, session_id: &str) -> Result<tmdb::Account> {
        self.client.account(session_id).context("fetch account")
    }
}
