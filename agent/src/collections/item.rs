//! Media item snapshot as seen by the collection rules

use std::collections::BTreeSet;

/// Server-side identifier of a media item (Plex `ratingKey`)
pub type ItemId = String;

/// Kind of media an item (or a library) holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Movie,
    Show,
}

impl MediaKind {
    /// Parse the section/metadata type string used by the media server
    pub fn from_server_type(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "movie" => Some(MediaKind::Movie),
            "show" => Some(MediaKind::Show),
            _ => None,
        }
    }

    /// Numeric metadata type used when creating collections
    pub fn server_type_code(&self) -> u8 {
        match self {
            MediaKind::Movie => 1,
            MediaKind::Show => 2,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Show => write!(f, "show"),
        }
    }
}

/// Immutable snapshot of one library item, fetched fresh every run.
///
/// Optional fields are genuinely optional: a rule that needs an absent field
/// simply leaves the item out of its groups.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub year: Option<i32>,
    pub genres: BTreeSet<String>,
    /// Studio for movies, network for shows
    pub studio: Option<String>,
    /// 0-10 scale
    pub rating: Option<f64>,
    pub kind: MediaKind,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, title: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            year: None,
            genres: BTreeSet::new(),
            studio: None,
            rating: None,
            kind,
        }
    }

    pub fn movie(id: impl Into<ItemId>, title: impl Into<String>) -> Self {
        Self::new(id, title, MediaKind::Movie)
    }

    pub fn show(id: impl Into<ItemId>, title: impl Into<String>) -> Self {
        Self::new(id, title, MediaKind::Show)
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres.extend(genres.into_iter().map(Into::into));
        self
    }

    pub fn with_studio(mut self, studio: impl Into<String>) -> Self {
        self.studio = Some(studio.into());
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Genres with blank entries dropped
    pub fn usable_genres(&self) -> impl Iterator<Item = &str> {
        self.genres
            .iter()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
    }

    /// Studio/network, treating a blank string as absent
    pub fn usable_studio(&self) -> Option<&str> {
        self.studio
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Rating, treating NaN as absent
    pub fn usable_rating(&self) -> Option<f64> {
        self.rating.filter(|r| !r.is_nan())
    }
}
