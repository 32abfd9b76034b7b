use std::cell::Cell;
use std::io::{self, Stdout};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Padding, Paragraph, Tabs, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::wrap;
use tracing::{debug, warn};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::auth::{BrowserSurface, SurfaceHandle};
use crate::collections::{Action, CollectionQuery, Collections, Mutation, Target};
use crate::data::CatalogService;
use crate::genres::{self, DropdownState, GenreFocus, GenreTable, MenuKey, Shelf};
use crate::listing::{Applied, Listing, Query, Ticket};
use crate::notify::{AuthPrompt, Notification, NotificationKind, Notifications};
use crate::session;
use crate::tmdb::{
    self, Category, CollectionKind, Genre, MediaDetails, MediaItem, MediaType, Page, RatingClass,
};

const COLOR_BG: Color = Color::Rgb(13, 37, 63);
const COLOR_PANEL_BG: Color = Color::Rgb(16, 30, 48);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(28, 52, 80);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(40, 72, 108);
const COLOR_BORDER_IDLE: Color = Color::Rgb(40, 60, 86);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(1, 180, 228);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(232, 237, 245);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(169, 184, 201);
const COLOR_ACCENT: Color = Color::Rgb(1, 180, 228);
const COLOR_SUCCESS: Color = Color::Rgb(144, 206, 161);
const COLOR_WARNING: Color = Color::Rgb(245, 180, 90);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const CARD_WIDTH: usize = 26;
const SHELF_HEIGHT: u16 = 5;

fn rating_color(vote: f64) -> Color {
    match tmdb::rating_class(vote) {
        RatingClass::Green => COLOR_SUCCESS,
        RatingClass::Orange => COLOR_WARNING,
        RatingClass::Red => COLOR_ERROR,
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Truncates to `width` display columns, marking the cut with an ellipsis.
fn truncate_to_width(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

fn pad_to_width(text: &str, width: usize) -> String {
    let truncated = truncate_to_width(text, width);
    let fill = width.saturating_sub(UnicodeWidthStr::width(truncated.as_str()));
    format!("{truncated}{}", " ".repeat(fill))
}

/// First index of a window of `visible` slots that keeps `selected` in view.
fn scroll_offset(selected: usize, current: usize, visible: usize) -> usize {
    if visible == 0 {
        return selected;
    }
    if selected < current {
        selected
    } else if selected >= current + visible {
        selected + 1 - visible
    } else {
        current
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Tab {
    Browse,
    Watchlist,
    Favorites,
}

const TABS: [Tab; 3] = [Tab::Browse, Tab::Watchlist, Tab::Favorites];

impl Tab {
    fn title(self) -> &'static str {
        match self {
            Tab::Browse => "Browse",
            Tab::Watchlist => "Watchlist",
            Tab::Favorites => "Favorites",
        }
    }

    fn index(self) -> usize {
        TABS.iter().position(|tab| *tab == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        TABS[(self.index() + 1) % TABS.len()]
    }

    fn previous(self) -> Self {
        TABS[(self.index() + TABS.len() - 1) % TABS.len()]
    }

    fn collection(self) -> Option<CollectionKind> {
        match self {
            Tab::Browse => None,
            Tab::Watchlist => Some(CollectionKind::Watchlist),
            Tab::Favorites => Some(CollectionKind::Favorites),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Normal,
    Search,
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        if self.last_tick.elapsed() >= Duration::from_millis(80) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = Instant::now();
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

enum DetailState {
    Loading,
    Loaded(Box<MediaDetails>),
    Failed(String),
}

struct DetailView {
    request_id: u64,
    title: String,
    media_type: MediaType,
    state: DetailState,
}

#[derive(Default)]
struct AuthModal {
    link: Option<String>,
    handle: Option<SurfaceHandle>,
    status: String,
}

enum AsyncResponse {
    Genres {
        media_type: MediaType,
        result: Result<Vec<Genre>>,
    },
    Page {
        ticket: Ticket,
        result: Result<Page<MediaItem>>,
    },
    CollectionPage {
        kind: CollectionKind,
        ticket: Ticket,
        result: Result<Page<MediaItem>>,
    },
    Mutation {
        mutation: Mutation,
    },
    Details {
        request_id: u64,
        result: Result<MediaDetails>,
    },
    AuthUrl {
        url: String,
    },
    Login {
        result: Result<String>,
    },
}

pub struct Options {
    pub status_message: String,
    pub catalog: Arc<dyn CatalogService>,
    pub collections: Arc<Collections>,
    pub session: Arc<session::Manager>,
    pub auth_redirect_uri: String,
    pub image_base_url: String,
    pub image_size: String,
    pub notification_duration: Duration,
    pub default_media_type: MediaType,
    pub load_more_threshold: usize,
    pub config_path: String,
}

pub struct Model {
    status_message: String,
    catalog: Arc<dyn CatalogService>,
    collections: Arc<Collections>,
    session: Arc<session::Manager>,
    auth_redirect_uri: String,
    image_base_url: String,
    image_size: String,
    config_path: String,
    tab: Tab,
    input_mode: InputMode,
    search_input: String,
    media_type: MediaType,
    category: Option<Category>,
    genres: GenreTable,
    browse: Listing<Query>,
    watchlist: Listing<CollectionQuery>,
    favorites: Listing<CollectionQuery>,
    cursor_shelf: usize,
    cursor_item: usize,
    shelf_offset: Cell<usize>,
    list_index: usize,
    menus: DropdownState,
    notifications: Notifications,
    auth_prompt: AuthPrompt,
    auth_modal: AuthModal,
    detail: Option<DetailView>,
    load_more_threshold: usize,
    browse_cancel: Option<Arc<AtomicBool>>,
    login_in_progress: bool,
    needs_redraw: bool,
    spinner: Spinner,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    next_request_id: u64,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let media_type = opts.default_media_type;
        let collection_key = |kind| CollectionQuery { kind, media_type };
        Self {
            status_message: opts.status_message,
            catalog: opts.catalog,
            collections: opts.collections,
            session: opts.session,
            auth_redirect_uri: opts.auth_redirect_uri,
            image_base_url: opts.image_base_url,
            image_size: opts.image_size,
            config_path: opts.config_path,
            tab: Tab::Browse,
            input_mode: InputMode::Normal,
            search_input: String::new(),
            media_type,
            category: None,
            genres: GenreTable::new(),
            browse: Listing::new(Query::Browse {
                media_type,
                category: None,
            }),
            watchlist: Listing::new(collection_key(CollectionKind::Watchlist)),
            favorites: Listing::new(collection_key(CollectionKind::Favorites)),
            cursor_shelf: 0,
            cursor_item: 0,
            shelf_offset: Cell::new(0),
            list_index: 0,
            menus: DropdownState::default(),
            notifications: Notifications::new(opts.notification_duration),
            auth_prompt: AuthPrompt::default(),
            auth_modal: AuthModal::default(),
            detail: None,
            load_more_threshold: opts.load_more_threshold.max(1),
            browse_cancel: None,
            login_in_progress: false,
            needs_redraw: true,
            spinner: Spinner::new(),
            response_tx,
            response_rx,
            next_request_id: 1,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.start();

        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        if let Some(handle) = self.auth_modal.handle.take() {
            handle.cancel();
        }
        result
    }

    fn start(&mut self) {
        self.load_genres(MediaType::Movie);
        self.load_genres(MediaType::Tv);
        self.reload_browse();
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }
            if self.notifications.tick(Instant::now()) {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                            }
                        }
                        self.mark_dirty();
                    }
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn next_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }

    fn is_loading(&self) -> bool {
        self.browse.is_loading()
            || self.watchlist.is_loading()
            || self.favorites.is_loading()
            || self.login_in_progress
            || matches!(
                self.detail.as_ref().map(|d| &d.state),
                Some(DetailState::Loading)
            )
    }

    fn auth_modal_visible(&self) -> bool {
        self.login_in_progress || self.auth_prompt.is_visible(self.session.is_authenticated())
    }

    fn collection(&self, kind: CollectionKind) -> &Listing<CollectionQuery> {
        match kind {
            CollectionKind::Watchlist => &self.watchlist,
            CollectionKind::Favorites => &self.favorites,
        }
    }

    fn collection_mut(&mut self, kind: CollectionKind) -> &mut Listing<CollectionQuery> {
        match kind {
            CollectionKind::Watchlist => &mut self.watchlist,
            CollectionKind::Favorites => &mut self.favorites,
        }
    }

    fn genre_focus(&self) -> Option<GenreFocus> {
        match self.browse.key() {
            Query::Genre {
                media_type,
                genre_id,
            } => Some(GenreFocus {
                media_type: *media_type,
                genre_id: *genre_id,
            }),
            _ => None,
        }
    }

    fn browse_shelves(&self) -> Vec<Shelf<'_>> {
        genres::shelves(self.browse.items(), &self.genres, self.genre_focus())
    }

    // --- keys -------------------------------------------------------------

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if code == KeyCode::Esc && self.notifications.handle_escape() {
            return Ok(false);
        }
        if self.auth_modal_visible() {
            return self.handle_auth_modal_key(code);
        }
        if self.input_mode == InputMode::Search {
            self.handle_search_key(code);
            return Ok(false);
        }
        if self.detail.is_some() {
            return self.handle_detail_key(code);
        }

        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Esc => {
                if self.menus.any_open() {
                    self.menus.close_all();
                } else if self.tab == Tab::Browse && !matches!(self.browse.key(), Query::Browse { .. }) {
                    self.reload_browse_with(self.default_query());
                }
            }
            KeyCode::Tab => self.switch_tab(self.tab.next()),
            KeyCode::BackTab => self.switch_tab(self.tab.previous()),
            KeyCode::Char('1') => self.switch_tab(Tab::Browse),
            KeyCode::Char('2') => self.switch_tab(Tab::Watchlist),
            KeyCode::Char('3') => self.switch_tab(Tab::Favorites),
            KeyCode::Char('/') => {
                self.switch_tab(Tab::Browse);
                self.input_mode = InputMode::Search;
                self.search_input.clear();
                self.status_message = "Search movies and TV shows. Enter to search, Esc to cancel.".into();
            }
            KeyCode::Char('m') => self.toggle_media_type(),
            KeyCode::Char('c') if self.tab == Tab::Browse => self.cycle_category(),
            KeyCode::Char('g') if self.tab == Tab::Browse => self.cycle_genre(),
            KeyCode::Char('G') if self.tab == Tab::Browse => {
                self.reload_browse_with(self.default_query());
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_vertical(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_vertical(-1),
            KeyCode::Char('l') | KeyCode::Right => self.move_horizontal(1),
            KeyCode::Char('h') | KeyCode::Left => self.move_horizontal(-1),
            KeyCode::PageDown => self.move_vertical(5),
            KeyCode::PageUp => self.move_vertical(-5),
            KeyCode::Home => self.jump_to_top(),
            KeyCode::Char(' ') if self.tab == Tab::Browse => self.toggle_selected_menu(),
            KeyCode::Char('w') => self.add_selected(CollectionKind::Watchlist),
            KeyCode::Char('f') => self.add_selected(CollectionKind::Favorites),
            KeyCode::Char('x') | KeyCode::Delete => self.remove_selected(),
            KeyCode::Enter => self.open_details(),
            KeyCode::Char('r') => self.refresh_current_tab(),
            KeyCode::Char('s') => {
                self.auth_prompt.reoffer();
                if self.session.is_authenticated() {
                    self.status_message = "Already signed in. Press S to sign out.".into();
                }
            }
            KeyCode::Char('S') => self.sign_out(),
            _ => {}
        }
        Ok(false)
    }

    fn handle_search_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.search_input.clear();
                self.status_message = "Search cancelled.".into();
            }
            KeyCode::Enter => {
                self.input_mode = InputMode::Normal;
                let term = self.search_input.trim().to_string();
                if term.is_empty() {
                    self.reload_browse_with(self.default_query());
                } else {
                    self.reload_browse_with(Query::Search { term });
                }
            }
            KeyCode::Backspace => {
                self.search_input.pop();
            }
            KeyCode::Char(ch) => self.search_input.push(ch),
            _ => {}
        }
    }

    fn handle_detail_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Backspace => self.detail = None,
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('t') => self.open_trailer()?,
            KeyCode::Char('w') => self.add_selected(CollectionKind::Watchlist),
            KeyCode::Char('f') => self.add_selected(CollectionKind::Favorites),
            _ => {}
        }
        Ok(false)
    }

    fn handle_auth_modal_key(&mut self, code: KeyCode) -> Result<bool> {
        if self.login_in_progress {
            match code {
                KeyCode::Enter => {
                    if let Some(handle) = &self.auth_modal.handle {
                        handle.confirm();
                        self.auth_modal.status = "Completing sign-in…".into();
                    }
                }
                KeyCode::Char('y') => self.copy_auth_link_to_clipboard()?,
                KeyCode::Esc => {
                    if let Some(handle) = &self.auth_modal.handle {
                        handle.cancel();
                    }
                    self.auth_modal.status = "Cancelling…".into();
                }
                _ => {}
            }
            return Ok(false);
        }

        match code {
            KeyCode::Char('a') | KeyCode::Enter => self.start_authentication(),
            KeyCode::Esc | KeyCode::Char('c') => {
                self.auth_prompt.dismiss();
                self.status_message = "Browsing signed out. Press s to sign in.".into();
            }
            KeyCode::Char('q') => return Ok(true),
            _ => {}
        }
        Ok(false)
    }

    // --- navigation -------------------------------------------------------

    fn switch_tab(&mut self, tab: Tab) {
        if self.tab == tab {
            return;
        }
        self.tab = tab;
        self.menus.close_all();
        self.list_index = 0;
        if let Some(kind) = tab.collection() {
            if !self.session.is_authenticated() {
                self.auth_prompt.reoffer();
                self.status_message = format!("Sign in to see your {}.", kind.display_name());
                return;
            }
            let listing = self.collection(kind);
            if listing.items().is_empty() && !listing.is_loading() {
                self.reload_collection(kind);
            }
        }
    }

    fn default_query(&self) -> Query {
        Query::Browse {
            media_type: self.media_type,
            category: self.category,
        }
    }

    fn toggle_media_type(&mut self) {
        match self.tab.collection() {
            None => {
                self.media_type = self.media_type.toggle();
                self.category = None;
                self.reload_browse_with(self.default_query());
            }
            Some(kind) => {
                let key = *self.collection(kind).key();
                let next = CollectionQuery {
                    media_type: key.media_type.toggle(),
                    ..key
                };
                self.collection_mut(kind).set_key(next);
                self.list_index = 0;
                self.reload_collection(kind);
            }
        }
    }

    fn cycle_category(&mut self) {
        let categories = self.media_type.categories();
        self.category = match self.category {
            None => categories.first().copied(),
            Some(current) => categories
                .iter()
                .position(|c| *c == current)
                .and_then(|idx| categories.get(idx + 1))
                .copied(),
        };
        self.reload_browse_with(self.default_query());
    }

    fn cycle_genre(&mut self) {
        if !self.genres.is_loaded(self.media_type) {
            self.status_message = "Genres are still loading…".into();
            self.load_genres(self.media_type);
            return;
        }
        let current = self.genre_focus().map(|focus| focus.genre_id);
        match self.genres.cycle(self.media_type, current) {
            Some(genre_id) => self.reload_browse_with(Query::Genre {
                media_type: self.media_type,
                genre_id,
            }),
            None => self.reload_browse_with(self.default_query()),
        }
    }

    fn move_vertical(&mut self, delta: i32) {
        match self.tab {
            Tab::Browse => {
                let count = self.browse_shelves().len();
                if count == 0 {
                    return;
                }
                self.cursor_shelf = step(self.cursor_shelf, delta, count);
                self.cursor_item = 0;
            }
            Tab::Watchlist | Tab::Favorites => {
                let Some(kind) = self.tab.collection() else {
                    return;
                };
                let count = self.collection(kind).items().len();
                if count == 0 {
                    return;
                }
                self.list_index = step(self.list_index, delta, count);
            }
        }
        self.maybe_load_more();
    }

    fn move_horizontal(&mut self, delta: i32) {
        if self.tab != Tab::Browse {
            return;
        }
        let len = self
            .browse_shelves()
            .get(self.cursor_shelf)
            .map(|shelf| shelf.entries.len())
            .unwrap_or(0);
        if len == 0 {
            return;
        }
        self.cursor_item = step(self.cursor_item, delta, len);
        self.maybe_load_more();
    }

    fn jump_to_top(&mut self) {
        self.menus.close_all();
        self.cursor_shelf = 0;
        self.cursor_item = 0;
        self.shelf_offset.set(0);
        self.list_index = 0;
    }

    fn clamp_cursors(&mut self) {
        let shelves = self.browse_shelves();
        let shelf_count = shelves.len();
        let entry_count = shelves
            .get(self.cursor_shelf.min(shelf_count.saturating_sub(1)))
            .map(|shelf| shelf.entries.len())
            .unwrap_or(0);
        drop(shelves);
        self.cursor_shelf = self.cursor_shelf.min(shelf_count.saturating_sub(1));
        self.cursor_item = self.cursor_item.min(entry_count.saturating_sub(1));
        if let Some(kind) = self.tab.collection() {
            let len = self.collection(kind).items().len();
            self.list_index = self.list_index.min(len.saturating_sub(1));
        }
    }

    /// Scroll trigger: the cursor nearing the last rendered items.
    fn browse_near_end(&self) -> bool {
        let shelves = self.browse_shelves();
        if shelves.is_empty() {
            return false;
        }
        if self.genre_focus().is_some() || shelves.len() == 1 {
            let len = shelves[0].entries.len();
            return self.cursor_item + self.load_more_threshold >= len;
        }
        self.cursor_shelf + self.load_more_threshold >= shelves.len()
    }

    fn maybe_load_more(&mut self) {
        match self.tab.collection() {
            None => {
                if !self.browse_near_end() {
                    return;
                }
                if let Some(ticket) = self.browse.request_next() {
                    self.status_message = format!("Loading page {}…", ticket.page);
                    self.spawn_browse_fetch(ticket);
                }
            }
            Some(kind) => {
                let position = self.list_index;
                let threshold = self.load_more_threshold;
                if let Some(ticket) = self.collection_mut(kind).maybe_load_more(position, threshold) {
                    self.spawn_collection_fetch(kind, ticket);
                }
            }
        }
    }

    // --- selection --------------------------------------------------------

    fn selected_browse_entry(&self) -> Option<(MediaItem, MenuKey)> {
        let shelves = self.browse_shelves();
        let entry = shelves.get(self.cursor_shelf)?.entries.get(self.cursor_item)?;
        Some((entry.item.clone(), entry.menu_key()))
    }

    /// Selected item plus the media type it was listed under.
    fn selected_item(&self) -> Option<(MediaItem, MediaType)> {
        match self.tab.collection() {
            None => self
                .selected_browse_entry()
                .map(|(item, _)| (item, self.browse.key().media_type().unwrap_or(self.media_type))),
            Some(kind) => {
                let listing = self.collection(kind);
                listing
                    .items()
                    .get(self.list_index)
                    .cloned()
                    .map(|item| (item, listing.key().media_type))
            }
        }
    }

    fn toggle_selected_menu(&mut self) {
        if let Some((item, key)) = self.selected_browse_entry() {
            if self.menus.toggle(key) {
                self.status_message = format!(
                    "{}: w add to watchlist · f add to favorites",
                    item.display_title()
                );
            }
        }
    }

    // --- remote work ------------------------------------------------------

    fn load_genres(&mut self, media_type: MediaType) {
        let catalog = self.catalog.clone();
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = catalog.genres(media_type);
            let _ = tx.send(AsyncResponse::Genres { media_type, result });
        });
    }

    fn reload_browse(&mut self) {
        let ticket = self.browse.start_first_page();
        self.cursor_shelf = 0;
        self.cursor_item = 0;
        self.shelf_offset.set(0);
        self.menus.close_all();
        self.status_message = format!("Loading {}…", self.browse.key().describe());
        self.spinner.reset();
        self.spawn_browse_fetch(ticket);
    }

    fn reload_browse_with(&mut self, query: Query) {
        self.browse.set_key(query);
        self.reload_browse();
    }

    fn spawn_browse_fetch(&mut self, ticket: Ticket) {
        if let Some(flag) = self.browse_cancel.take() {
            flag.store(true, Ordering::SeqCst);
        }
        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.browse_cancel = Some(cancel_flag.clone());

        let query = self.browse.key().clone();
        let catalog = self.catalog.clone();
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let result = catalog.fetch_page(&query, ticket.page);
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(AsyncResponse::Page { ticket, result });
        });
    }

    fn reload_collection(&mut self, kind: CollectionKind) {
        if !self.session.is_authenticated() {
            self.auth_prompt.reoffer();
            return;
        }
        let ticket = self.collection_mut(kind).start_first_page();
        self.status_message = format!("Loading your {}…", kind.display_name());
        self.spawn_collection_fetch(kind, ticket);
    }

    fn spawn_collection_fetch(&mut self, kind: CollectionKind, ticket: Ticket) {
        let media_type = self.collection(kind).key().media_type;
        let collections = self.collections.clone();
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = collections.list_page(kind, media_type, ticket.page);
            let _ = tx.send(AsyncResponse::CollectionPage {
                kind,
                ticket,
                result,
            });
        });
    }

    fn refresh_current_tab(&mut self) {
        match self.tab.collection() {
            None => self.reload_browse(),
            Some(kind) => self.reload_collection(kind),
        }
    }

    fn add_selected(&mut self, kind: CollectionKind) {
        let Some((item, fallback)) = self.selected_item() else {
            return;
        };
        if self.tab == Tab::Browse && self.detail.is_none() {
            let open = self
                .selected_browse_entry()
                .map(|(_, key)| self.menus.is_open(key))
                .unwrap_or(false);
            if !open {
                self.status_message = "Press Space to open the item menu first.".into();
                return;
            }
        }
        if let Some((_, key)) = self.selected_browse_entry() {
            self.menus.close(key);
        }
        self.spawn_mutation(kind, Action::Add, item, fallback);
    }

    fn remove_selected(&mut self) {
        let Some(kind) = self.tab.collection() else {
            return;
        };
        let Some((item, fallback)) = self.selected_item() else {
            return;
        };
        self.spawn_mutation(kind, Action::Remove, item, fallback);
    }

    fn spawn_mutation(&mut self, kind: CollectionKind, action: Action, item: MediaItem, fallback: MediaType) {
        if !self.session.is_authenticated() {
            self.auth_prompt.reoffer();
            self.status_message = "Sign in to manage your watchlist and favorites.".into();
            return;
        }
        let collections = self.collections.clone();
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let target = Target::from_item(&item, fallback);
            let mutation = collections.mutate(kind, action, target);
            let _ = tx.send(AsyncResponse::Mutation { mutation });
        });
    }

    fn open_details(&mut self) {
        let Some((item, fallback)) = self.selected_item() else {
            return;
        };
        let media_type = item.kind_or(fallback);
        let request_id = self.next_request_id();
        self.detail = Some(DetailView {
            request_id,
            title: item.display_title().to_string(),
            media_type,
            state: DetailState::Loading,
        });
        let catalog = self.catalog.clone();
        let tx = self.response_tx.clone();
        let id = item.id;
        thread::spawn(move || {
            let result = catalog.details(media_type, id);
            let _ = tx.send(AsyncResponse::Details { request_id, result });
        });
    }

    fn open_trailer(&mut self) -> Result<()> {
        let Some(DetailView {
            state: DetailState::Loaded(details),
            ..
        }) = &self.detail
        else {
            return Ok(());
        };
        let Some(url) = details.trailer_url() else {
            self.status_message = "No trailer available.".into();
            return Ok(());
        };
        webbrowser::open(&url).map_err(|err| anyhow!("open trailer: {}", err))?;
        self.status_message = format!("Opened trailer: {url}");
        Ok(())
    }

    fn start_authentication(&mut self) {
        if self.login_in_progress {
            return;
        }
        let surface = match BrowserSurface::bind(&self.auth_redirect_uri) {
            Ok(surface) => surface,
            Err(err) => {
                warn!(error = ?err, "ui: could not start sign-in listener");
                self.status_message = format!("Sign-in unavailable: {err}");
                return;
            }
        };
        let url_tx = self.response_tx.clone();
        let mut surface = surface.on_open(move |url| {
            let _ = url_tx.send(AsyncResponse::AuthUrl {
                url: url.to_string(),
            });
        });
        self.auth_modal = AuthModal {
            link: None,
            handle: Some(surface.handle()),
            status: "Requesting a token from TMDB…".into(),
        };
        self.login_in_progress = true;

        let session = self.session.clone();
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = session.begin_authentication(&mut surface);
            let _ = tx.send(AsyncResponse::Login { result });
        });
    }

    fn copy_auth_link_to_clipboard(&mut self) -> Result<()> {
        let Some(url) = self.auth_modal.link.clone() else {
            bail!("authorization link unavailable");
        };
        let mut clipboard =
            arboard::Clipboard::new().map_err(|err| anyhow!("open clipboard: {}", err))?;
        clipboard
            .set_text(url)
            .map_err(|err| anyhow!("copy authorization link: {}", err))?;
        self.auth_modal.status = "Authorization link copied to clipboard.".into();
        Ok(())
    }

    fn sign_out(&mut self) {
        self.session.clear_session();
        self.watchlist.reset();
        self.favorites.reset();
        self.auth_prompt.reoffer();
        self.list_index = 0;
        self.status_message = "Signed out.".into();
    }

    // --- async ------------------------------------------------------------

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        changed
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Genres { media_type, result } => match result {
                Ok(list) => self.genres.set(media_type, list),
                Err(err) => warn!(error = ?err, media_type = media_type.as_str(), "ui: genre load failed"),
            },
            AsyncResponse::Page { ticket, result } => match result {
                Ok(page) => {
                    let count = page.results.len();
                    match self.browse.apply(ticket, page) {
                        Applied::Stale => debug!(page = ticket.page, "ui: dropped stale page"),
                        Applied::Replaced => {
                            self.status_message = if count == 0 {
                                format!("{}: nothing found.", self.browse.key().describe())
                            } else {
                                format!(
                                    "{} · page 1 of {}",
                                    self.browse.key().describe(),
                                    self.browse.total_pages()
                                )
                            };
                            self.clamp_cursors();
                        }
                        Applied::Appended => {
                            self.status_message = format!(
                                "{} · page {} of {}",
                                self.browse.key().describe(),
                                self.browse.current_page(),
                                self.browse.total_pages()
                            );
                        }
                    }
                }
                Err(err) => {
                    if self.browse.fail(ticket) {
                        warn!(error = ?err, page = ticket.page, "ui: listing fetch failed");
                        self.status_message = format!("Failed to load results: {err}");
                    }
                }
            },
            AsyncResponse::CollectionPage {
                kind,
                ticket,
                result,
            } => match result {
                Ok(page) => {
                    let listing = self.collection_mut(kind);
                    if listing.apply(ticket, page) != Applied::Stale {
                        let len = listing.items().len();
                        self.status_message = format!("{} {} loaded.", len, kind.display_name());
                        self.clamp_cursors();
                    }
                }
                Err(err) => {
                    if self.collection_mut(kind).fail(ticket) {
                        warn!(error = ?err, kind = kind.display_name(), "ui: collection fetch failed");
                        self.status_message = format!("Failed to load your {}: {err}", kind.display_name());
                    }
                }
            },
            AsyncResponse::Mutation { mutation } => match mutation {
                Mutation::NeedsSession => {
                    self.auth_prompt.reoffer();
                    self.status_message = "Sign in to manage your watchlist and favorites.".into();
                }
                Mutation::Reported(report) => {
                    if report.succeeded() {
                        match report.action {
                            Action::Remove => {
                                let listing = self.collection_mut(report.kind);
                                crate::collections::reconcile(listing, &report);
                                self.clamp_cursors();
                            }
                            Action::Add => {
                                let showing = self.tab.collection() == Some(report.kind);
                                let same_media =
                                    self.collection(report.kind).key().media_type == report.media_type;
                                if same_media && showing {
                                    self.reload_collection(report.kind);
                                } else if same_media {
                                    self.collection_mut(report.kind).reset();
                                }
                            }
                        }
                    }
                    self.notifications
                        .notify(report.notification, Instant::now());
                }
            },
            AsyncResponse::Details { request_id, result } => {
                let Some(detail) = self.detail.as_mut() else {
                    return;
                };
                if detail.request_id != request_id {
                    return;
                }
                detail.state = match result {
                    Ok(details) => DetailState::Loaded(Box::new(details)),
                    Err(err) => {
                        warn!(error = ?err, "ui: detail fetch failed");
                        DetailState::Failed(format!("{err}"))
                    }
                };
            }
            AsyncResponse::AuthUrl { url } => {
                self.auth_modal.link = Some(url);
                self.auth_modal.status =
                    "Approve Moviepedia in your browser. Press Enter here once you are done.".into();
            }
            AsyncResponse::Login { result } => {
                self.login_in_progress = false;
                self.auth_modal = AuthModal::default();
                match result {
                    Ok(_) => {
                        self.status_message = "Signed in to TMDB.".into();
                        self.notifications
                            .notify(Notification::success("Signed in to TMDB."), Instant::now());
                        if let Some(kind) = self.tab.collection() {
                            self.reload_collection(kind);
                        }
                    }
                    Err(err) => {
                        self.status_message = format!("Sign-in failed: {err}");
                    }
                }
            }
        }
    }

    // --- drawing ----------------------------------------------------------

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
        } else {
            self.status_message.clone()
        };
        frame.render_widget(
            Paragraph::new(status_text).style(
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .bg(COLOR_PANEL_FOCUSED_BG)
                    .add_modifier(Modifier::BOLD),
            ),
            layout[0],
        );

        let titles: Vec<Line> = TABS.iter().map(|tab| Line::from(tab.title())).collect();
        let tabs = Tabs::new(titles)
            .select(self.tab.index())
            .style(Style::default().fg(COLOR_TEXT_SECONDARY).bg(COLOR_PANEL_BG))
            .highlight_style(
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            )
            .divider("│");
        frame.render_widget(tabs, layout[1]);

        frame.render_widget(
            Paragraph::new(self.header_line()).style(Style::default().bg(COLOR_PANEL_BG)),
            layout[2],
        );

        match self.tab.collection() {
            None => self.draw_shelves(frame, layout[3]),
            Some(kind) => self.draw_collection(frame, layout[3], kind),
        }

        frame.render_widget(
            Paragraph::new(self.footer_text())
                .style(
                    Style::default()
                        .fg(COLOR_TEXT_SECONDARY)
                        .bg(COLOR_PANEL_BG)
                        .add_modifier(Modifier::ITALIC),
                )
                .alignment(Alignment::Center),
            layout[4],
        );

        if self.detail.is_some() {
            self.draw_detail(frame, layout[3]);
        }
        if self.auth_modal_visible() {
            self.draw_auth_modal(frame, layout[3]);
        }
        if self.notifications.is_visible() {
            self.draw_notification(frame, layout[3]);
        }
    }

    fn header_line(&self) -> Line<'static> {
        let label = Style::default().fg(COLOR_TEXT_SECONDARY);
        let value = Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD);
        if self.input_mode == InputMode::Search {
            return Line::from(vec![
                Span::styled(" Search: ", label),
                Span::styled(format!("{}▏", self.search_input), value),
            ]);
        }
        match self.tab.collection() {
            None => {
                let mut spans = vec![Span::styled(" ", label)];
                match self.browse.key() {
                    Query::Search { term } => {
                        spans.push(Span::styled("Search ", label));
                        spans.push(Span::styled(format!("\"{term}\""), value));
                    }
                    Query::Browse { media_type, category } => {
                        spans.push(Span::styled(media_type.display_name(), value));
                        spans.push(Span::styled(" · ", label));
                        spans.push(Span::styled(
                            category
                                .map(|c| c.display_name())
                                .unwrap_or_else(|| "Discover".into()),
                            value,
                        ));
                    }
                    Query::Genre { media_type, genre_id } => {
                        spans.push(Span::styled(media_type.display_name(), value));
                        spans.push(Span::styled(" · Genre ", label));
                        spans.push(Span::styled(self.genres.name(*genre_id).to_string(), value));
                    }
                }
                spans.push(Span::styled(
                    format!(
                        "   {} items · page {}/{}",
                        self.browse.items().len(),
                        self.browse.current_page(),
                        self.browse.total_pages()
                    ),
                    label,
                ));
                Line::from(spans)
            }
            Some(kind) => {
                let listing = self.collection(kind);
                Line::from(vec![
                    Span::styled(" Your ", label),
                    Span::styled(kind.display_name(), value),
                    Span::styled(" · ", label),
                    Span::styled(listing.key().media_type.display_name(), value),
                    Span::styled(
                        format!("   {} items", listing.items().len()),
                        label,
                    ),
                ])
            }
        }
    }

    fn draw_shelves(&self, frame: &mut Frame<'_>, area: Rect) {
        let shelves = self.browse_shelves();
        if shelves.is_empty() {
            let message = if self.browse.is_loading() {
                "Loading…"
            } else {
                "No results."
            };
            frame.render_widget(
                Paragraph::new(message)
                    .style(Style::default().fg(COLOR_TEXT_SECONDARY).bg(COLOR_PANEL_BG))
                    .alignment(Alignment::Center),
                area,
            );
            return;
        }

        let visible = (area.height / SHELF_HEIGHT).max(1) as usize;
        let offset = scroll_offset(self.cursor_shelf, self.shelf_offset.get(), visible);
        self.shelf_offset.set(offset);

        for (row, (idx, shelf)) in shelves.iter().enumerate().skip(offset).take(visible).enumerate() {
            let rect = Rect {
                x: area.x,
                y: area.y + row as u16 * SHELF_HEIGHT,
                width: area.width,
                height: SHELF_HEIGHT.min(area.height.saturating_sub(row as u16 * SHELF_HEIGHT)),
            };
            self.draw_shelf(frame, rect, shelf, idx == self.cursor_shelf);
        }

        if self.browse.is_loading_more() {
            let bottom = Rect {
                x: area.x,
                y: area.y + area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            frame.render_widget(
                Paragraph::new("Loading more…")
                    .style(Style::default().fg(COLOR_ACCENT))
                    .alignment(Alignment::Right),
                bottom,
            );
        }
    }

    fn draw_shelf(&self, frame: &mut Frame<'_>, area: Rect, shelf: &Shelf<'_>, focused: bool) {
        let border_style = if focused {
            Style::default().fg(COLOR_BORDER_FOCUSED)
        } else {
            Style::default().fg(COLOR_BORDER_IDLE)
        };
        let title_style = if focused {
            Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        let block = Block::default()
            .title(Span::styled(
                format!(" {} ({}) ", shelf.title, shelf.entries.len()),
                title_style,
            ))
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(Style::default().bg(COLOR_PANEL_BG));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let cards = (inner.width as usize / CARD_WIDTH).max(1);
        let selected = if focused { Some(self.cursor_item) } else { None };
        let start = selected
            .map(|sel| sel.saturating_sub(cards - 1))
            .unwrap_or(0);

        let mut titles = Vec::new();
        let mut meta = Vec::new();
        let mut menu = Vec::new();
        for (idx, entry) in shelf.entries.iter().enumerate().skip(start).take(cards) {
            let is_selected = selected == Some(idx);
            let base = if is_selected {
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .bg(COLOR_PANEL_SELECTED_BG)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(COLOR_TEXT_PRIMARY)
            };
            titles.push(Span::styled(
                pad_to_width(&format!(" {}", entry.item.display_title()), CARD_WIDTH),
                base,
            ));
            let rating = format!(" ★ {:.1}", entry.item.vote_average);
            let date = format!("  {}", entry.item.display_date());
            let meta_width = CARD_WIDTH.saturating_sub(UnicodeWidthStr::width(rating.as_str()));
            meta.push(Span::styled(
                rating,
                Style::default().fg(rating_color(entry.item.vote_average)),
            ));
            meta.push(Span::styled(
                pad_to_width(&date, meta_width),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ));
            let menu_text = if self.menus.is_open(entry.menu_key()) {
                " ▾ w Watchlist · f Fav"
            } else {
                ""
            };
            menu.push(Span::styled(
                pad_to_width(menu_text, CARD_WIDTH),
                Style::default().fg(COLOR_ACCENT),
            ));
        }

        let text = Text::from(vec![Line::from(titles), Line::from(meta), Line::from(menu)]);
        frame.render_widget(Paragraph::new(text), inner);
    }

    fn draw_collection(&self, frame: &mut Frame<'_>, area: Rect, kind: CollectionKind) {
        let listing = self.collection(kind);
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);

        let block = Block::default()
            .title(Span::styled(
                format!(" {} ", Tab::title(self.tab)),
                Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_FOCUSED))
            .style(Style::default().bg(COLOR_PANEL_BG));

        if !self.session.is_authenticated() {
            frame.render_widget(
                Paragraph::new("Sign in (s) to see this list.")
                    .block(block)
                    .style(Style::default().fg(COLOR_TEXT_SECONDARY)),
                area,
            );
            return;
        }

        let width = chunks[0].width.saturating_sub(4) as usize;
        let items: Vec<ListItem> = listing
            .items()
            .iter()
            .map(|item| {
                let rating = format!("★ {:.1}", item.vote_average);
                let date = item.display_date().to_string();
                let title_width = width.saturating_sub(rating.len() + date.len() + 4);
                ListItem::new(Line::from(vec![
                    Span::styled(
                        pad_to_width(item.display_title(), title_width),
                        Style::default().fg(COLOR_TEXT_PRIMARY),
                    ),
                    Span::raw("  "),
                    Span::styled(date, Style::default().fg(COLOR_TEXT_SECONDARY)),
                    Span::raw("  "),
                    Span::styled(rating, Style::default().fg(rating_color(item.vote_average))),
                ]))
            })
            .collect();
        let empty = items.is_empty();
        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .bg(COLOR_PANEL_SELECTED_BG)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▸ ");
        let mut state = ListState::default();
        if !empty {
            state.select(Some(self.list_index));
        }
        frame.render_stateful_widget(list, chunks[0], &mut state);

        let preview_block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_IDLE))
            .style(Style::default().bg(COLOR_PANEL_BG))
            .padding(Padding::horizontal(1));
        let text = match listing.items().get(self.list_index) {
            Some(item) => self.item_preview(item, chunks[1].width.saturating_sub(4) as usize),
            None if listing.is_loading() => Text::from("Loading…"),
            None => Text::from(format!("Your {} is empty.", kind.display_name())),
        };
        frame.render_widget(
            Paragraph::new(text)
                .block(preview_block)
                .wrap(Wrap { trim: false }),
            chunks[1],
        );
    }

    fn item_preview(&self, item: &MediaItem, width: usize) -> Text<'static> {
        let mut lines = vec![
            Line::from(Span::styled(
                item.display_title().to_string(),
                Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                item.display_date().to_string(),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )),
            Line::from(""),
        ];
        for line in wrap(item.overview_text(), width.max(10)) {
            lines.push(Line::from(line.into_owned()));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            tmdb::poster_url(&self.image_base_url, &self.image_size, item.poster_path.as_deref()),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )));
        Text::from(lines)
    }

    fn draw_detail(&self, frame: &mut Frame<'_>, area: Rect) {
        let Some(detail) = &self.detail else {
            return;
        };
        let popup = centered_rect(80, 80, area);
        frame.render_widget(Clear, popup);
        let width = popup.width.saturating_sub(4) as usize;

        let body = match &detail.state {
            DetailState::Loading => Text::from("Loading details…"),
            DetailState::Failed(err) => Text::from(Line::from(Span::styled(
                format!("Could not load details: {err}"),
                Style::default().fg(COLOR_ERROR),
            ))),
            DetailState::Loaded(details) => self.detail_text(details, detail.media_type, width),
        };
        let block = Block::default()
            .title(Span::styled(
                format!(" {} ", detail.title),
                Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_ACCENT))
            .style(Style::default().bg(COLOR_PANEL_BG))
            .padding(Padding::uniform(1));
        frame.render_widget(
            Paragraph::new(body).block(block).wrap(Wrap { trim: false }),
            popup,
        );
    }

    fn detail_text(&self, details: &MediaDetails, media_type: MediaType, width: usize) -> Text<'static> {
        let label = Style::default().fg(COLOR_TEXT_SECONDARY);
        let value = Style::default().fg(COLOR_TEXT_PRIMARY);
        let mut lines = Vec::new();
        if let Some(tagline) = details.tagline.as_deref().filter(|t| !t.is_empty()) {
            lines.push(Line::from(Span::styled(
                tagline.to_string(),
                Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::ITALIC),
            )));
            lines.push(Line::from(""));
        }
        let genres = if details.genres.is_empty() {
            "Genre not found".to_string()
        } else {
            details
                .genres
                .iter()
                .map(|g| g.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let length = match media_type {
            MediaType::Movie => details
                .runtime
                .map(|m| format!("{}h {}m", m / 60, m % 60))
                .unwrap_or_else(|| "Unknown".into()),
            MediaType::Tv => match (details.number_of_seasons, details.number_of_episodes) {
                (Some(s), Some(e)) => format!("{s} seasons · {e} episodes"),
                (Some(s), None) => format!("{s} seasons"),
                _ => "Unknown".into(),
            },
        };
        let rows = [
            ("Released", details.display_date().to_string()),
            ("Genres", genres),
            ("Length", length),
            ("Status", details.status.clone().unwrap_or_else(|| "Unknown".into())),
        ];
        for (name, text) in rows {
            lines.push(Line::from(vec![
                Span::styled(format!("{name:<10}"), label),
                Span::styled(text, value),
            ]));
        }
        lines.push(Line::from(vec![
            Span::styled(format!("{:<10}", "Rating"), label),
            Span::styled(
                format!("★ {:.1}", details.vote_average),
                Style::default().fg(rating_color(details.vote_average)),
            ),
        ]));
        lines.push(Line::from(""));
        let overview = details
            .overview
            .as_deref()
            .filter(|o| !o.trim().is_empty())
            .unwrap_or("No overview available.");
        for line in wrap(overview, width.max(10)) {
            lines.push(Line::from(Span::styled(line.into_owned(), value)));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            tmdb::poster_url(&self.image_base_url, &self.image_size, details.poster_path.as_deref()),
            label,
        )));
        let trailer = match details.trailer_url() {
            Some(url) => format!("Trailer: {url}  (t to open)"),
            None => "No trailer available.".into(),
        };
        lines.push(Line::from(Span::styled(trailer, Style::default().fg(COLOR_ACCENT))));
        Text::from(lines)
    }

    fn draw_auth_modal(&self, frame: &mut Frame<'_>, area: Rect) {
        let popup = centered_rect(60, 50, area);
        frame.render_widget(Clear, popup);

        let muted = Style::default().fg(COLOR_TEXT_SECONDARY);
        let key = Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD);
        let mut lines = vec![
            Line::from(Span::styled(
                "Sign in with TMDB",
                Style::default().fg(COLOR_TEXT_PRIMARY).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "A TMDB session is needed to keep a watchlist and favorites.",
                muted,
            )),
            Line::from(""),
        ];
        if self.login_in_progress {
            if !self.auth_modal.status.is_empty() {
                lines.push(Line::from(self.auth_modal.status.clone()));
                lines.push(Line::from(""));
            }
            if let Some(link) = &self.auth_modal.link {
                lines.push(Line::from(Span::styled(link.clone(), Style::default().fg(COLOR_ACCENT))));
                lines.push(Line::from(""));
            }
            lines.push(Line::from(vec![
                Span::styled("Enter", key),
                Span::styled(" approved  ", muted),
                Span::styled("y", key),
                Span::styled(" copy link  ", muted),
                Span::styled("Esc", key),
                Span::styled(" cancel", muted),
            ]));
        } else {
            lines.push(Line::from(vec![
                Span::styled("a", key),
                Span::styled(" Authenticate    ", muted),
                Span::styled("Esc", key),
                Span::styled(" Close", muted),
            ]));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("Config: {}", self.config_path),
                muted,
            )));
        }

        let block = Block::default()
            .title(Span::styled(" Authentication ", key))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_ACCENT))
            .style(Style::default().bg(COLOR_PANEL_BG))
            .padding(Padding::uniform(1));
        frame.render_widget(
            Paragraph::new(Text::from(lines))
                .block(block)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: false }),
            popup,
        );
    }

    fn draw_notification(&self, frame: &mut Frame<'_>, area: Rect) {
        let Some(note) = self.notifications.current() else {
            return;
        };
        let color = match note.kind {
            NotificationKind::Success => COLOR_SUCCESS,
            NotificationKind::Error => COLOR_ERROR,
        };
        let width = (UnicodeWidthStr::width(note.message.as_str()) as u16 + 6)
            .clamp(20, area.width.max(20))
            .min(area.width);
        let rect = Rect {
            x: area.x + area.width.saturating_sub(width),
            y: area.y,
            width,
            height: 3.min(area.height),
        };
        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(note.message.clone())
                .style(Style::default().fg(color).bg(COLOR_PANEL_FOCUSED_BG))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(color))
                        .title(Span::styled(" Esc ", Style::default().fg(COLOR_TEXT_SECONDARY))),
                ),
            rect,
        );
    }

    fn footer_text(&self) -> String {
        if self.auth_modal_visible() {
            return if self.login_in_progress {
                "Waiting for TMDB approval · Enter once approved · y copy link · Esc cancel".into()
            } else {
                "a authenticate · Esc close".into()
            };
        }
        if self.input_mode == InputMode::Search {
            return "Type to search · Enter run search · Esc cancel".into();
        }
        if self.detail.is_some() {
            return "t trailer · w/f add · Esc close".into();
        }

        let mut parts: Vec<&str> = Vec::new();
        match self.tab {
            Tab::Browse => {
                parts.push("j/k shelves · h/l items");
                parts.push("Space menu");
                parts.push("m movies/tv · c category · g genre (G clear)");
                parts.push("/ search");
            }
            Tab::Watchlist | Tab::Favorites => {
                parts.push("j/k move · x remove · m movies/tv");
            }
        }
        parts.push("Enter details");
        parts.push("Home top");
        parts.push("Tab switch");
        if self.session.is_authenticated() {
            parts.push("S sign out");
        } else {
            parts.push("s sign in");
        }
        parts.push("q quit");
        parts.join(" · ")
    }
}

fn step(current: usize, delta: i32, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let next = current as i64 + delta as i64;
    next.clamp(0, len as i64 - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Config as AuthConfig, Flow};
    use crate::storage::MemorySessionStore;
    use crate::test_support::{page_of, FakeAccount, FakeAuth, FakeCatalog, FakeSurface};
    use crate::tmdb::StatusResponse;

    fn model_with(catalog: FakeCatalog, session: Option<&str>, account: FakeAccount) -> Model {
        model_sharing(catalog, session, Arc::new(account))
    }

    fn model_sharing(catalog: FakeCatalog, session: Option<&str>, account: Arc<FakeAccount>) -> Model {
        let store = Arc::new(match session {
            Some(id) => MemorySessionStore::with_session(id),
            None => MemorySessionStore::new(),
        });
        let auth = Arc::new(FakeAuth::new("tok", Ok("abc123".into())));
        let flow = Arc::new(Flow::new(auth.clone(), AuthConfig::default()));
        let manager = Arc::new(session::Manager::new(store, flow, auth, Some(1)));
        let collections = Arc::new(Collections::new(account, manager.clone()));
        Model::new(Options {
            status_message: String::new(),
            catalog: Arc::new(catalog),
            collections,
            session: manager,
            auth_redirect_uri: "http://127.0.0.1:0/cb".into(),
            image_base_url: tmdb::DEFAULT_IMAGE_BASE_URL.into(),
            image_size: tmdb::DEFAULT_IMAGE_SIZE.into(),
            notification_duration: Duration::from_millis(3000),
            default_media_type: MediaType::Movie,
            load_more_threshold: 1,
            config_path: "~/.config/moviepedia/config.yaml".into(),
        })
    }

    fn settle(model: &mut Model) {
        let message = model
            .response_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker response");
        model.handle_async_response(message);
    }

    #[test]
    fn truncate_respects_display_width() {
        assert_eq!(truncate_to_width("Heat", 10), "Heat");
        assert_eq!(truncate_to_width("The Godfather", 6), "The G…");
        assert_eq!(pad_to_width("ab", 4), "ab  ");
        assert_eq!(truncate_to_width("anything", 0), "");
    }

    #[test]
    fn scroll_offset_keeps_selection_visible() {
        assert_eq!(scroll_offset(0, 0, 3), 0);
        assert_eq!(scroll_offset(4, 0, 3), 2);
        assert_eq!(scroll_offset(1, 2, 3), 1);
        assert_eq!(scroll_offset(3, 2, 3), 2);
    }

    #[test]
    fn tabs_cycle_both_ways() {
        assert_eq!(Tab::Browse.next(), Tab::Watchlist);
        assert_eq!(Tab::Favorites.next(), Tab::Browse);
        assert_eq!(Tab::Browse.previous(), Tab::Favorites);
        assert_eq!(Tab::Watchlist.collection(), Some(CollectionKind::Watchlist));
    }

    #[test]
    fn step_clamps_to_bounds() {
        assert_eq!(step(0, -1, 5), 0);
        assert_eq!(step(3, 5, 5), 4);
        assert_eq!(step(2, 1, 0), 0);
    }

    #[test]
    fn first_page_fills_shelves() {
        let catalog = FakeCatalog::with_pages(vec![page_of(&[1, 2, 3], 1, 2)]);
        let mut model = model_with(catalog, Some("abc"), FakeAccount::replying(Err("unused".into())));
        model.reload_browse();
        settle(&mut model);

        assert_eq!(model.browse.items().len(), 3);
        let shelves = model.browse_shelves();
        assert_eq!(shelves.len(), 1);
        assert_eq!(shelves[0].title, genres::UNKNOWN_GENRE);
    }

    #[test]
    fn signed_out_model_shows_prompt_until_dismissed() {
        let mut model = model_with(FakeCatalog::default(), None, FakeAccount::replying(Err("unused".into())));
        assert!(model.auth_modal_visible());
        model.handle_key(KeyCode::Esc).unwrap();
        assert!(!model.auth_modal_visible());

        model.handle_key(KeyCode::Char('2')).unwrap();
        assert!(model.auth_modal_visible());
    }

    #[test]
    fn escape_dismisses_notification_before_menus() {
        let catalog = FakeCatalog::with_pages(vec![page_of(&[1, 2], 1, 1)]);
        let mut model = model_with(catalog, Some("abc"), FakeAccount::replying(Err("unused".into())));
        model.reload_browse();
        settle(&mut model);

        model.handle_key(KeyCode::Char(' ')).unwrap();
        assert!(model.menus.any_open());
        model
            .notifications
            .notify(Notification::success("hello"), Instant::now());

        model.handle_key(KeyCode::Esc).unwrap();
        assert!(!model.notifications.is_visible());
        assert!(model.menus.any_open());
        model.handle_key(KeyCode::Esc).unwrap();
        assert!(!model.menus.any_open());
    }

    #[test]
    fn add_from_menu_reports_notification() {
        let catalog = FakeCatalog::with_pages(vec![page_of(&[7], 1, 1)]);
        let account = FakeAccount::replying(Ok(StatusResponse {
            status_code: 1,
            ..Default::default()
        }));
        let mut model = model_with(catalog, Some("abc"), account);
        model.reload_browse();
        settle(&mut model);

        model.handle_key(KeyCode::Char('w')).unwrap();
        assert!(model.response_rx.is_empty());

        model.handle_key(KeyCode::Char(' ')).unwrap();
        model.handle_key(KeyCode::Char('w')).unwrap();
        settle(&mut model);

        let note = model.notifications.current().unwrap();
        assert_eq!(note.kind, NotificationKind::Success);
        assert!(note.message.contains("Title 7"));
        assert!(!model.menus.any_open());

        assert!(!model.notifications.tick(Instant::now()));
        assert!(model
            .notifications
            .tick(Instant::now() + Duration::from_millis(3000)));
        assert!(!model.notifications.is_visible());
    }

    #[test]
    fn menus_stay_open_while_the_cursor_moves() {
        let catalog = FakeCatalog::with_pages(vec![page_of(&[1, 2], 1, 1)]);
        let mut model = model_with(catalog, Some("abc"), FakeAccount::replying(Err("unused".into())));
        model.reload_browse();
        settle(&mut model);

        model.handle_key(KeyCode::Char(' ')).unwrap();
        let (_, first) = model.selected_browse_entry().unwrap();
        model.handle_key(KeyCode::Char('l')).unwrap();
        model.handle_key(KeyCode::Char(' ')).unwrap();
        let (_, second) = model.selected_browse_entry().unwrap();

        assert_ne!(first, second);
        assert!(model.menus.is_open(first));
        assert!(model.menus.is_open(second));

        model.handle_key(KeyCode::Esc).unwrap();
        assert!(!model.menus.any_open());
    }

    #[test]
    fn sign_out_reoffers_prompt_and_blocks_mutations() {
        let account = Arc::new(FakeAccount::replying(Ok(StatusResponse {
            status_code: 1,
            ..Default::default()
        })));
        let mut model = model_sharing(FakeCatalog::default(), Some("abc"), account.clone());
        assert!(!model.auth_modal_visible());

        model.handle_key(KeyCode::Char('S')).unwrap();
        assert!(!model.session.is_authenticated());
        assert!(model.auth_modal_visible());

        let target = Target {
            media_type: MediaType::Movie,
            id: 949,
            title: "Heat",
        };
        assert_eq!(model.collections.add_to_favorites(target), Mutation::NeedsSession);
        assert!(account.marks().is_empty());
    }

    #[test]
    fn completed_login_hides_prompt() {
        let mut model = model_with(FakeCatalog::default(), None, FakeAccount::replying(Err("unused".into())));
        assert!(model.auth_modal_visible());

        model.login_in_progress = true;
        let mut surface = FakeSurface::closing_after(0);
        let result = model.session.begin_authentication(&mut surface);
        model.handle_async_response(AsyncResponse::Login { result });

        assert_eq!(model.session.session_id().as_deref(), Some("abc123"));
        assert!(!model.login_in_progress);
        assert!(!model.auth_modal_visible());
        assert_eq!(
            model.notifications.current().map(|note| note.kind),
            Some(NotificationKind::Success)
        );
    }

    #[test]
    fn add_on_visible_collection_reloads_it() {
        let account = Arc::new(
            FakeAccount::replying(Ok(StatusResponse {
                status_code: 1,
                ..Default::default()
            }))
            .with_pages(vec![page_of(&[1], 1, 1), page_of(&[1, 2], 1, 1)]),
        );
        let mut model = model_sharing(FakeCatalog::default(), Some("abc"), account.clone());
        model.handle_key(KeyCode::Char('2')).unwrap();
        settle(&mut model);
        assert_eq!(model.watchlist.items().len(), 1);

        model.handle_key(KeyCode::Char('w')).unwrap();
        settle(&mut model);
        assert!(model.watchlist.is_loading());
        settle(&mut model);

        assert_eq!(model.watchlist.items().len(), 2);
        assert_eq!(account.lists().len(), 2);
        assert_eq!(account.marks().len(), 1);
    }

    #[test]
    fn collection_load_more_is_guarded() {
        let account = FakeAccount::replying(Err("unused".into())).with_pages(vec![
            page_of(&[1, 2], 1, 3),
            page_of(&[3, 4], 2, 3),
        ]);
        let mut model = model_with(FakeCatalog::default(), Some("abc"), account);
        model.handle_key(KeyCode::Char('2')).unwrap();
        settle(&mut model);
        assert_eq!(model.watchlist.items().len(), 2);

        model.handle_key(KeyCode::Char('j')).unwrap();
        assert!(model.watchlist.is_loading_more());
        model.maybe_load_more();
        model.handle_key(KeyCode::Char('k')).unwrap();
        model.handle_key(KeyCode::Char('j')).unwrap();
        settle(&mut model);

        assert_eq!(model.watchlist.items().len(), 4);
        assert_eq!(model.watchlist.current_page(), 2);
        assert!(model.response_rx.is_empty());
    }
}
