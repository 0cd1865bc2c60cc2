//! Sort keys and comparators for the queue view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use utoipa::ToSchema;

use super::QueueEntry;
use crate::types::Quality;

/// Column the queue view is sorted by
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, ToSchema)]
pub enum SortKey {
    /// Remaining time (unknown last)
    #[default]
    #[serde(rename = "timeleft")]
    TimeLeft,
    /// Estimated completion time (unknown last)
    #[serde(rename = "estimatedCompletionTime")]
    EstimatedCompletionTime,
    /// Time the release was grabbed or held back (unknown last)
    #[serde(rename = "added")]
    Added,
    /// Transfer protocol
    #[serde(rename = "protocol")]
    Protocol,
    /// Indexer name, case-insensitive
    #[serde(rename = "indexer")]
    Indexer,
    /// Backend instance name, case-insensitive
    #[serde(rename = "downloadClient")]
    DownloadClient,
    /// Position in the quality ranking
    #[serde(rename = "quality")]
    Quality,
    /// Queue status
    #[serde(rename = "status")]
    Status,
    /// Release title
    #[serde(rename = "title")]
    Title,
    /// First album title
    #[serde(rename = "album")]
    Album,
    /// First album title
    #[serde(rename = "albums.title")]
    AlbumTitle,
    /// First album release date
    #[serde(rename = "albums.releaseDate")]
    AlbumReleaseDate,
    /// Percentage complete
    #[serde(rename = "progress")]
    Progress,
    /// Total size
    #[serde(rename = "size")]
    Size,
    /// Artist sort name
    #[serde(rename = "artists.sortName")]
    ArtistSortName,
}

impl SortKey {
    /// Wire name of the key
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::TimeLeft => "timeleft",
            SortKey::EstimatedCompletionTime => "estimatedCompletionTime",
            SortKey::Added => "added",
            SortKey::Protocol => "protocol",
            SortKey::Indexer => "indexer",
            SortKey::DownloadClient => "downloadClient",
            SortKey::Quality => "quality",
            SortKey::Status => "status",
            SortKey::Title => "title",
            SortKey::Album => "album",
            SortKey::AlbumTitle => "albums.title",
            SortKey::AlbumReleaseDate => "albums.releaseDate",
            SortKey::Progress => "progress",
            SortKey::Size => "size",
            SortKey::ArtistSortName => "artists.sortName",
        }
    }

    /// Parse a wire name; anything unrecognised sorts by time left
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "timeleft" => SortKey::TimeLeft,
            "estimatedCompletionTime" => SortKey::EstimatedCompletionTime,
            "added" => SortKey::Added,
            "protocol" => SortKey::Protocol,
            "indexer" => SortKey::Indexer,
            "downloadClient" => SortKey::DownloadClient,
            "quality" => SortKey::Quality,
            "status" => SortKey::Status,
            "title" => SortKey::Title,
            "album" => SortKey::Album,
            "albums.title" => SortKey::AlbumTitle,
            "albums.releaseDate" => SortKey::AlbumReleaseDate,
            "progress" => SortKey::Progress,
            "size" => SortKey::Size,
            "artists.sortName" => SortKey::ArtistSortName,
            _ => SortKey::TimeLeft,
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Sort direction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

impl SortDirection {
    /// Parse `ascending`/`descending` (or `asc`/`desc`); anything else is ascending
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "descending" | "desc" => SortDirection::Descending,
            _ => SortDirection::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Order of quality definitions, lowest first
///
/// Built once from configuration and handed to every queue read.
#[derive(Clone, Debug, Default)]
pub struct QualityRanking {
    positions: HashMap<i32, usize>,
}

impl QualityRanking {
    /// Rank quality ids in the given order, lowest first
    ///
    /// A repeated id keeps its first position.
    pub fn new(ids: &[i32]) -> Self {
        let mut positions = HashMap::with_capacity(ids.len());
        for (position, id) in ids.iter().enumerate() {
            positions.entry(*id).or_insert(position);
        }
        Self { positions }
    }

    /// Position of a quality; unranked and absent qualities have none and sort lowest
    pub fn rank(&self, quality: Option<&Quality>) -> Option<usize> {
        quality.and_then(|q| self.positions.get(&q.id).copied())
    }
}

/// Values whose unknowns sort after every known value whichever the direction
fn unknown_last<T: Ord>(a: Option<T>, b: Option<T>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => direction.apply(a.cmp(&b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn case_insensitive(value: Option<&str>) -> Option<String> {
    value.map(str::to_lowercase)
}

fn album_title(entry: &QueueEntry) -> &str {
    entry
        .album()
        .map(|a| a.title.as_str())
        .unwrap_or_else(|| entry.title())
}

fn artist_sort_name(entry: &QueueEntry) -> &str {
    match entry.artist() {
        Some(artist) => artist.sort_name.as_deref().unwrap_or(&artist.name),
        None => entry.title(),
    }
}

fn primary(
    a: &QueueEntry,
    b: &QueueEntry,
    key: SortKey,
    direction: SortDirection,
    ranking: &QualityRanking,
) -> Ordering {
    let ordering = match key {
        SortKey::TimeLeft => return unknown_last(a.time_left(), b.time_left(), direction),
        SortKey::EstimatedCompletionTime => {
            return unknown_last(
                a.estimated_completion_time(),
                b.estimated_completion_time(),
                direction,
            );
        }
        SortKey::Added => return unknown_last(a.added(), b.added(), direction),
        SortKey::Protocol => a.protocol().cmp(&b.protocol()),
        SortKey::Indexer => case_insensitive(a.indexer()).cmp(&case_insensitive(b.indexer())),
        SortKey::DownloadClient => {
            case_insensitive(a.download_client()).cmp(&case_insensitive(b.download_client()))
        }
        SortKey::Quality => ranking.rank(a.quality()).cmp(&ranking.rank(b.quality())),
        SortKey::Status => a.status().cmp(&b.status()),
        SortKey::Title => a.title().cmp(b.title()),
        SortKey::Album | SortKey::AlbumTitle => album_title(a).cmp(album_title(b)),
        SortKey::AlbumReleaseDate => {
            let date = |e: &QueueEntry| -> DateTime<Utc> {
                e.album()
                    .and_then(|album| album.release_date)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC)
            };
            date(a).cmp(&date(b))
        }
        SortKey::Progress => a.progress().total_cmp(&b.progress()),
        SortKey::Size => a.size().cmp(&b.size()),
        SortKey::ArtistSortName => artist_sort_name(a).cmp(artist_sort_name(b)),
    };
    direction.apply(ordering)
}

/// Full ordering of two entries: the primary key, then more-complete entries first
pub(crate) fn compare(
    a: &QueueEntry,
    b: &QueueEntry,
    key: SortKey,
    direction: SortDirection,
    ranking: &QualityRanking,
) -> Ordering {
    primary(a, b, key, direction, ranking)
        .then_with(|| b.completion_percentage().total_cmp(&a.completion_percentage()))
}
