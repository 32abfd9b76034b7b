use std::fmt;
use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3/";
pub const DEFAULT_AUTHENTICATE_URL: &str = "https://www.themoviedb.org/authenticate/";
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/";
pub const DEFAULT_IMAGE_SIZE: &str = "w500";
pub const DEFAULT_LANGUAGE: &str = "en-US";
pub const FALLBACK_POSTER: &str = "fallback_image_url";
pub const YOUTUBE_WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// TMDB status codes carried in mutation responses.
pub const STATUS_CREATED: i64 = 1;
pub const STATUS_UPDATED: i64 = 12;
pub const STATUS_DELETED: i64 = 13;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("tmdb: unauthorized: {0}")]
    Unauthorized(String),
    #[error("tmdb: resource not found: {0}")]
    NotFound(String),
    #[error("tmdb: rate limited")]
    RateLimited,
    #[error("tmdb: api error {status}: {message}")]
    Status { status: u16, message: String },
    #[error("tmdb: request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("tmdb: decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("tmdb: invalid url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }

    /// Path segment used by the account collection endpoints.
    pub fn collection_segment(&self) -> &'static str {
        match self {
            MediaType::Movie => "movies",
            MediaType::Tv => "tv",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MediaType::Movie => "Movies",
            MediaType::Tv => "TV Shows",
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "TV show",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            MediaType::Movie => MediaType::Tv,
            MediaType::Tv => MediaType::Movie,
        }
    }

    pub fn categories(&self) -> &'static [Category] {
        match self {
            MediaType::Movie => &MOVIE_CATEGORIES,
            MediaType::Tv => &TV_CATEGORIES,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "movie" | "movies" => Some(MediaType::Movie),
            "tv" | "show" | "shows" => Some(MediaType::Tv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    NowPlaying,
    Popular,
    TopRated,
    Upcoming,
    AiringToday,
    OnTheAir,
}

pub const MOVIE_CATEGORIES: [Category; 4] = [
    Category::NowPlaying,
    Category::Popular,
    Category::TopRated,
    Category::Upcoming,
];

pub const TV_CATEGORIES: [Category; 4] = [
    Category::AiringToday,
    Category::OnTheAir,
    Category::Popular,
    Category::TopRated,
];

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::NowPlaying => "now_playing",
            Category::Popular => "popular",
            Category::TopRated => "top_rated",
            Category::Upcoming => "upcoming",
            Category::AiringToday => "airing_today",
            Category::OnTheAir => "on_the_air",
        }
    }

    pub fn display_name(&self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Which account-scoped collection a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Watchlist,
    Favorites,
}

impl CollectionKind {
    pub fn path_segment(&self) -> &'static str {
        match self {
            CollectionKind::Watchlist => "watchlist",
            CollectionKind::Favorites => "favorite",
        }
    }

    /// Name of the boolean flag in the mutation body.
    pub fn flag_name(&self) -> &'static str {
        self.path_segment()
    }

    pub fn sort_by(&self) -> &'static str {
        match self {
            CollectionKind::Watchlist => "created_at.desc",
            CollectionKind::Favorites => "created_at.asc",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CollectionKind::Watchlist => "watchlist",
            CollectionKind::Favorites => "favorites",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MediaItem {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    /// Only present on multi-search results.
    #[serde(default)]
    pub media_type: Option<String>,
}

impl MediaItem {
    pub fn display_title(&self) -> &str {
        non_empty(self.title.as_deref())
            .or_else(|| non_empty(self.name.as_deref()))
            .unwrap_or("Untitled")
    }

    pub fn display_date(&self) -> &str {
        non_empty(self.release_date.as_deref())
            .or_else(|| non_empty(self.first_air_date.as_deref()))
            .unwrap_or("Unknown")
    }

    pub fn overview_text(&self) -> &str {
        non_empty(self.overview.as_deref()).unwrap_or("No overview available.")
    }

    /// Media type tagged by the API, falling back to the one the item was listed under.
    pub fn kind_or(&self, fallback: MediaType) -> MediaType {
        self.media_type
            .as_deref()
            .and_then(MediaType::parse)
            .unwrap_or(fallback)
    }

    pub fn is_person(&self) -> bool {
        self.media_type.as_deref() == Some("person")
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

pub fn poster_url(image_base: &str, size: &str, poster_path: Option<&str>) -> String {
    match non_empty(poster_path) {
        Some(path) => format!(
            "{}/{}/{}",
            image_base.trim_end_matches('/'),
            size.trim_matches('/'),
            path.trim_start_matches('/')
        ),
        None => FALLBACK_POSTER.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingClass {
    Green,
    Orange,
    Red,
}

pub fn rating_class(vote: f64) -> RatingClass {
    if vote >= 8.0 {
        RatingClass::Green
    } else if vote >= 5.0 {
        RatingClass::Orange
    } else {
        RatingClass::Red
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default = "first_page")]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Genre {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GenreList {
    #[serde(default)]
    genres: Vec<Genre>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status_code: i64,
    #[serde(default)]
    pub status_message: String,
    #[serde(default)]
    pub success: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Added,
    AlreadyPresent,
    Removed,
    Rejected,
}

impl StatusResponse {
    pub fn outcome(&self) -> MutationOutcome {
        match self.status_code {
            STATUS_CREATED => MutationOutcome::Added,
            STATUS_UPDATED => MutationOutcome::AlreadyPresent,
            STATUS_DELETED => MutationOutcome::Removed,
            _ => MutationOutcome::Rejected,
        }
    }
}

impl fmt::Display for StatusResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.status_message.is_empty() {
            write!(f, "status {}", self.status_code)
        } else {
            write!(f, "{} (status {})", self.status_message, self.status_code)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RequestTokenResponse {
    #[serde(default)]
    request_token: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    session_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Account {
    pub id: u64,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub site: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VideoList {
    #[serde(default)]
    pub results: Vec<Video>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaDetails {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub number_of_seasons: Option<u32>,
    #[serde(default)]
    pub number_of_episodes: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub videos: VideoList,
}

impl MediaDetails {
    pub fn display_title(&self) -> &str {
        non_empty(self.title.as_deref())
            .or_else(|| non_empty(self.name.as_deref()))
            .unwrap_or("Untitled")
    }

    pub fn display_date(&self) -> &str {
        non_empty(self.release_date.as_deref())
            .or_else(|| non_empty(self.first_air_date.as_deref()))
            .unwrap_or("Unknown")
    }

    /// First YouTube video, preferring ones tagged as trailers.
    pub fn trailer_url(&self) -> Option<String> {
        let youtube = || {
            self.videos
                .results
                .iter()
                .filter(|video| video.site.eq_ignore_ascii_case("youtube") && !video.key.is_empty())
        };
        youtube()
            .find(|video| video.kind.eq_ignore_ascii_case("trailer"))
            .or_else(|| youtube().next())
            .map(|video| format!("{}{}", YOUTUBE_WATCH_URL, video.key))
    }
}

#[derive(Debug, Clone, Serialize)]
struct MarkRequest<'a> {
    media_type: &'a str,
    media_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    watchlist: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    favorite: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub access_token: String,
    pub user_agent: String,
    pub base_url: Option<String>,
    pub language: Option<String>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    access_token: String,
    user_agent: String,
    base_url: Url,
    language: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        if config.access_token.trim().is_empty() {
            anyhow::bail!("tmdb client access token required");
        }
        if config.user_agent.trim().is_empty() {
            anyhow::bail!("tmdb client user agent required");
        }
        let mut base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(Duration::from_secs(20))
                .build()?,
        };

        Ok(Client {
            http,
            access_token: config.access_token.trim().to_string(),
            user_agent: config.user_agent,
            base_url,
            language: config
                .language
                .filter(|lang| !lang.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        })
    }

    pub fn create_request_token(&self) -> Result<String, ApiError> {
        let resp = self.request(Method::GET, "authentication/token/new", &[], None::<&()>)?;
        let payload: RequestTokenResponse = decode(resp, "request token")?;
        if payload.request_token.is_empty() {
            return Err(ApiError::Status {
                status: 200,
                message: "missing request token".into(),
            });
        }
        Ok(payload.request_token)
    }

    pub fn create_session(&self, request_token: &str) -> Result<String, ApiError> {
        let body = serde_json::json!({ "request_token": request_token });
        let resp = self.request(Method::POST, "authentication/session/new", &[], Some(&body))?;
        let payload: SessionResponse = decode(resp, "session")?;
        if payload.session_id.is_empty() {
            return Err(ApiError::Status {
                status: 200,
                message: "missing session id".into(),
            });
        }
        Ok(payload.session_id)
    }

    pub fn account(&self, session_id: &str) -> Result<Account, ApiError> {
        let params = [("session_id".to_string(), session_id.to_string())];
        let resp = self.request(Method::GET, "account", &params, None::<&()>)?;
        decode(resp, "account")
    }

    pub fn genres(&self, media_type: MediaType) -> Result<Vec<Genre>, ApiError> {
        let path = format!("genre/{}/list", media_type.as_str());
        let params = [("language".to_string(), self.language.clone())];
        let resp = self.request(Method::GET, &path, &params, None::<&()>)?;
        let list: GenreList = decode(resp, "genre list")?;
        Ok(list.genres)
    }

    pub fn discover(
        &self,
        media_type: MediaType,
        page: u32,
        genre: Option<u32>,
    ) -> Result<Page<MediaItem>, ApiError> {
        let path = format!("discover/{}", media_type.as_str());
        let mut params = vec![
            ("include_adult".to_string(), "false".to_string()),
            ("include_video".to_string(), "false".to_string()),
            ("language".to_string(), self.language.clone()),
            ("page".to_string(), page.max(1).to_string()),
            ("sort_by".to_string(), "popularity.desc".to_string()),
        ];
        if let Some(genre) = genre {
            params.push(("with_genres".to_string(), genre.to_string()));
        }
        let resp = self.request(Method::GET, &path, &params, None::<&()>)?;
        decode(resp, "discover page")
    }

    pub fn category(
        &self,
        media_type: MediaType,
        category: Category,
        page: u32,
    ) -> Result<Page<MediaItem>, ApiError> {
        let path = format!("{}/{}", media_type.as_str(), category.as_str());
        let params = [
            ("language".to_string(), self.language.clone()),
            ("page".to_string(), page.max(1).to_string()),
        ];
        let resp = self.request(Method::GET, &path, &params, None::<&()>)?;
        decode(resp, "category page")
    }

    /// Multi search; person results are dropped since they carry no media.
    pub fn search_multi(&self, term: &str, page: u32) -> Result<Page<MediaItem>, ApiError> {
        let params = [
            ("query".to_string(), term.to_string()),
            ("page".to_string(), page.max(1).to_string()),
        ];
        let resp = self.request(Method::GET, "search/multi", &params, None::<&()>)?;
        let mut page: Page<MediaItem> = decode(resp, "search page")?;
        page.results.retain(|item| !item.is_person());
        Ok(page)
    }

    pub fn details(&self, media_type: MediaType, id: u64) -> Result<MediaDetails, ApiError> {
        let path = format!("{}/{}", media_type.as_str(), id);
        let params = [
            ("append_to_response".to_string(), "videos".to_string()),
            ("language".to_string(), self.language.clone()),
        ];
        let resp = self.request(Method::GET, &path, &params, None::<&()>)?;
        decode(resp, "details")
    }

    pub fn account_list(
        &self,
        kind: CollectionKind,
        account_id: u64,
        session_id: &str,
        media_type: MediaType,
        page: u32,
    ) -> Result<Page<MediaItem>, ApiError> {
        let path = format!(
            "account/{}/{}/{}",
            account_id,
            kind.path_segment(),
            media_type.collection_segment()
        );
        let params = [
            ("language".to_string(), self.language.clone()),
            ("page".to_string(), page.max(1).to_string()),
            ("sort_by".to_string(), kind.sort_by().to_string()),
            ("session_id".to_string(), session_id.to_string()),
        ];
        let resp = self.request(Method::GET, &path, &params, None::<&()>)?;
        decode(resp, "account list")
    }

    /// Adds or removes an item. TMDB reports the outcome in the body even for
    /// non-2xx statuses, so any decodable status body is returned as-is. A 2xx
    /// without a status code comes back as code 0 with `success` set.
    pub fn mark(
        &self,
        kind: CollectionKind,
        account_id: u64,
        session_id: &str,
        media_type: MediaType,
        media_id: u64,
        flag: bool,
    ) -> Result<StatusResponse, ApiError> {
        let path = format!("account/{}/{}", account_id, kind.path_segment());
        let params = [("session_id".to_string(), session_id.to_string())];
        let body = MarkRequest {
            media_type: media_type.as_str(),
            media_id,
            watchlist: (kind == CollectionKind::Watchlist).then_some(flag),
            favorite: (kind == CollectionKind::Favorites).then_some(flag),
        };
        let resp = self.send(Method::POST, &path, &params, Some(&body))?;
        let status = resp.status();
        let body = resp.text()?;
        match serde_json::from_str::<StatusResponse>(&body) {
            Ok(payload) if payload.status_code != 0 => Ok(payload),
            _ if status.is_success() => Ok(StatusResponse {
                status_code: 0,
                status_message: String::new(),
                success: Some(true),
            }),
            _ => Err(status_error(status, &body)),
        }
    }

    fn request<B>(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&B>,
    ) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let resp = self.send(method, path, params, body)?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            Err(status_error(status, &body))
        }
    }

    fn send<B>(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&B>,
    ) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let mut url = self.base_url.join(path.trim_start_matches('/'))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }

        let mut req = self
            .http
            .request(method, url)
            .header(USER_AGENT, self.user_agent.clone())
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token));
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok(req.send()?)
    }
}

fn decode<T: DeserializeOwned>(resp: Response, what: &'static str) -> Result<T, ApiError> {
    resp.json::<T>()
        .map_err(|source| ApiError::Decode { what, source })
}

fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<StatusResponse>(body)
        .ok()
        .filter(|payload| !payload.status_message.is_empty())
        .map(|payload| payload.status_message)
        .unwrap_or_else(|| body.trim().to_string());
    match status.as_u16() {
        401 => ApiError::Unauthorized(message),
        404 => ApiError::NotFound(message),
        429 => ApiError::RateLimited,
        code => ApiError::Status {
            status: code,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> Client {
        Client::new(ClientConfig {
            access_token: "token".into(),
            user_agent: "moviepedia-test".into(),
            base_url: Some(server.url()),
            language: None,
            http_client: None,
        })
        .unwrap()
    }

    #[test]
    fn requires_access_token() {
        let err = Client::new(ClientConfig {
            user_agent: "ua".into(),
            ..Default::default()
        });
        assert!(err.is_err());
    }

    #[test]
    fn discover_sends_browse_parameters() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/discover/movie")
            .match_header("authorization", "Bearer token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "2".into()),
                Matcher::UrlEncoded("sort_by".into(), "popularity.desc".into()),
                Matcher::UrlEncoded("include_adult".into(), "false".into()),
                Matcher::UrlEncoded("include_video".into(), "false".into()),
                Matcher::UrlEncoded("language".into(), "en-US".into()),
                Matcher::UrlEncoded("with_genres".into(), "28".into()),
            ]))
            .with_body(
                r#"{"page":2,"total_pages":5,"results":[{"id":7,"title":"Heat","genre_ids":[28,80],"vote_average":8.3}]}"#,
            )
            .create();

        let page = client_for(&server)
            .discover(MediaType::Movie, 2, Some(28))
            .unwrap();
        mock.assert();
        assert_eq!(page.total_pages, 5);
        assert_eq!(page.results[0].display_title(), "Heat");
        assert_eq!(page.results[0].genre_ids, vec![28, 80]);
    }

    #[test]
    fn search_drops_people() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/search/multi")
            .match_query(Matcher::UrlEncoded("query".into(), "dune".into()))
            .with_body(
                r#"{"page":1,"total_pages":1,"results":[
                    {"id":1,"title":"Dune","media_type":"movie","genre_ids":[878]},
                    {"id":2,"name":"Frank Herbert","media_type":"person"},
                    {"id":3,"name":"Dune: Prophecy","media_type":"tv","genre_ids":[10765]}
                ]}"#,
            )
            .create();

        let page = client_for(&server).search_multi("dune", 1).unwrap();
        let ids: Vec<u64> = page.results.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(page.results[1].kind_or(MediaType::Movie), MediaType::Tv);
    }

    #[test]
    fn mark_posts_flag_and_decodes_status() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/account/42/watchlist")
            .match_query(Matcher::UrlEncoded("session_id".into(), "abc".into()))
            .match_body(Matcher::Json(serde_json::json!({
                "media_type": "tv",
                "media_id": 99,
                "watchlist": true
            })))
            .with_status(201)
            .with_body(r#"{"status_code":12,"status_message":"The item/record was updated successfully."}"#)
            .create();

        let status = client_for(&server)
            .mark(CollectionKind::Watchlist, 42, "abc", MediaType::Tv, 99, true)
            .unwrap();
        mock.assert();
        assert_eq!(status.outcome(), MutationOutcome::AlreadyPresent);
    }

    #[test]
    fn mark_reports_rejection_body() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/account/42/favorite")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"status_code":3,"status_message":"Authentication failed."}"#)
            .create();

        let status = client_for(&server)
            .mark(CollectionKind::Favorites, 42, "abc", MediaType::Movie, 5, true)
            .unwrap();
        assert_eq!(status.outcome(), MutationOutcome::Rejected);
        assert_eq!(status.status_message, "Authentication failed.");
    }

    #[test]
    fn mark_without_status_body_is_not_an_add() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/account/42/watchlist")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("")
            .create();

        let status = client_for(&server)
            .mark(CollectionKind::Watchlist, 42, "abc", MediaType::Movie, 5, true)
            .unwrap();
        assert_eq!(status.status_code, 0);
        assert_eq!(status.success, Some(true));
        assert_eq!(status.outcome(), MutationOutcome::Rejected);
    }

    #[test]
    fn maps_unauthorized_listing() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/genre/tv/list")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"status_code":7,"status_message":"Invalid API key"}"#)
            .create();

        let err = client_for(&server).genres(MediaType::Tv).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref msg) if msg == "Invalid API key"));
    }

    #[test]
    fn poster_url_falls_back() {
        assert_eq!(
            poster_url("https://image.tmdb.org/t/p/", "w500", Some("/abc.jpg")),
            "https://image.tmdb.org/t/p/w500/abc.jpg"
        );
        assert_eq!(poster_url(DEFAULT_IMAGE_BASE_URL, "w500", None), FALLBACK_POSTER);
        assert_eq!(poster_url(DEFAULT_IMAGE_BASE_URL, "w500", Some("")), FALLBACK_POSTER);
    }

    #[test]
    fn trailer_prefers_youtube_trailer() {
        let details: MediaDetails = serde_json::from_str(
            r#"{"id":1,"title":"X","videos":{"results":[
                {"key":"vimeo1","site":"Vimeo","type":"Trailer"},
                {"key":"teaser","site":"YouTube","type":"Teaser"},
                {"key":"main","site":"YouTube","type":"Trailer"}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(
            details.trailer_url().as_deref(),
            Some("https://www.youtube.com/watch?v=main")
        );
    }

    #[test]
    fn category_labels_are_title_cased() {
        assert_eq!(Category::NowPlaying.display_name(), "Now Playing");
        assert_eq!(Category::OnTheAir.display_name(), "On The Air");
        assert_eq!(rating_class(8.0), RatingClass::Green);
        assert_eq!(rating_class(6.1), RatingClass::Orange);
        assert_eq!(rating_class(4.9), RatingClass::Red);
    }
}
