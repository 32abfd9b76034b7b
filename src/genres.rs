use std::collections::{BTreeMap, HashMap, HashSet};

use crate::tmdb::{Genre, MediaItem, MediaType};

pub const UNKNOWN_GENRE: &str = "Unknown Genre";

/// Buckets items by each of their genre ids. An item with several genres
/// lands in several buckets; one with none lands nowhere.
pub fn partition(items: &[MediaItem]) -> BTreeMap<u32, Vec<&MediaItem>> {
    let mut buckets: BTreeMap<u32, Vec<&MediaItem>> = BTreeMap::new();
    for item in items {
        for genre_id in &item.genre_ids {
            buckets.entry(*genre_id).or_default().push(item);
        }
    }
    buckets
}

#[derive(Debug, Clone, Default)]
pub struct GenreTable {
    movie: Vec<Genre>,
    tv: Vec<Genre>,
    names: HashMap<u32, String>,
}

impl GenreTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, media_type: MediaType, genres: Vec<Genre>) {
        for genre in &genres {
            self.names
                .entry(genre.id)
                .or_insert_with(|| genre.name.clone());
        }
        match media_type {
            MediaType::Movie => self.movie = genres,
            MediaType::Tv => self.tv = genres,
        }
    }

    pub fn list(&self, media_type: MediaType) -> &[Genre] {
        match media_type {
            MediaType::Movie => &self.movie,
            MediaType::Tv => &self.tv,
        }
    }

    pub fn is_loaded(&self, media_type: MediaType) -> bool {
        !self.list(media_type).is_empty()
    }

    pub fn name(&self, genre_id: u32) -> &str {
        self.names
            .get(&genre_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_GENRE)
    }

    /// Next genre in the filter cycle; wraps back to no filter after the last one.
    pub fn cycle(&self, media_type: MediaType, current: Option<u32>) -> Option<u32> {
        let genres = self.list(media_type);
        match current {
            None => genres.first().map(|genre| genre.id),
            Some(id) => genres
                .iter()
                .position(|genre| genre.id == id)
                .and_then(|idx| genres.get(idx + 1))
                .map(|genre| genre.id),
        }
    }
}

/// Narrows the browse view to one server-filtered genre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenreFocus {
    pub media_type: MediaType,
    pub genre_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShelfEntry<'a> {
    pub item: &'a MediaItem,
    /// Position across all shelves, used to key the per-item menu.
    pub render_index: usize,
}

impl ShelfEntry<'_> {
    pub fn menu_key(&self) -> MenuKey {
        MenuKey {
            item_id: self.item.id,
            render_index: self.render_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shelf<'a> {
    pub genre_id: u32,
    pub title: String,
    pub entries: Vec<ShelfEntry<'a>>,
}

/// One shelf per genre present in `items`, or a single shelf holding every
/// item when a genre focus is active.
pub fn shelves<'a>(
    items: &'a [MediaItem],
    table: &GenreTable,
    focus: Option<GenreFocus>,
) -> Vec<Shelf<'a>> {
    let mut render_index = 0;
    let mut entries_for = |bucket: Vec<&'a MediaItem>| -> Vec<ShelfEntry<'a>> {
        bucket
            .into_iter()
            .map(|item| {
                let entry = ShelfEntry { item, render_index };
                render_index += 1;
                entry
            })
            .collect()
    };

    if let Some(focus) = focus {
        if items.is_empty() {
            return Vec::new();
        }
        return vec![Shelf {
            genre_id: focus.genre_id,
            title: table.name(focus.genre_id).to_string(),
            entries: entries_for(items.iter().collect()),
        }];
    }

    partition(items)
        .into_iter()
        .map(|(genre_id, bucket)| Shelf {
            genre_id,
            title: table.name(genre_id).to_string(),
            entries: entries_for(bucket),
        })
        .collect()
}

/// Composite key so the same item on two shelves has independent menus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MenuKey {
    pub item_id: u64,
    pub render_index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DropdownState {
    open: HashSet<MenuKey>,
}

impl DropdownState {
    /// Flips one menu and returns whether it is now open.
    pub fn toggle(&mut self, key: MenuKey) -> bool {
        if self.open.remove(&key) {
            false
        } else {
            self.open.insert(key);
            true
        }
    }

    pub fn is_open(&self, key: MenuKey) -> bool {
        self.open.contains(&key)
    }

    pub fn any_open(&self) -> bool {
        !self.open.is_empty()
    }

    pub fn close(&mut self, key: MenuKey) {
        self.open.remove(&key);
    }

    pub fn close_all(&mut self) {
        self.open.clear();
    }
}
