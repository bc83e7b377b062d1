//! Core memory type definitions.
//!
//! [`MemoryRecord`] is the metadata half of a stored memory (its fingerprint
//! lives in the similarity index at the same position); [`SearchResult`] is the
//! read-only projection returned by a query.

use serde::{Deserialize, Serialize};
use url::Url;

/// Metadata for one remembered video, as persisted in the sidecar file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub title: String,
    pub summary: String,
    /// Where the memory came from, typically a video URL.
    #[serde(rename = "url")]
    pub source_url: String,
}

impl MemoryRecord {
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            source_url: source_url.into(),
        }
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub summary: String,
    #[serde(rename = "url")]
    pub source_url: String,
    /// 1-based place in the ranking.
    pub rank: usize,
    /// 0-based position of the record in its user's store.
    pub position: usize,
    /// Ranking key of the active index: cosine similarity (higher is better)
    /// or squared L2 distance (lower is better).
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl SearchResult {
    pub fn from_record(record: &MemoryRecord, rank: usize, position: usize, score: f32) -> Self {
        Self {
            title: record.title.clone(),
            summary: record.summary.clone(),
            source_url: record.source_url.clone(),
            rank,
            position,
            score,
            thumbnail_url: youtube_video_id(&record.source_url)
                .map(|id| format!("https://img.youtube.com/vi/{id}/hqdefault.jpg")),
        }
    }
}

/// Extract a YouTube video id from `watch?v=<id>` or `youtu.be/<id>` URLs.
pub fn youtube_video_id(source_url: &str) -> Option<String> {
    let url = Url::parse(source_url).ok()?;
    let host = url.host_str()?;
    let id = if host == "youtu.be" {
        url.path_segments()?.next().map(str::to_string)
    } else if host.ends_with("youtube.com") {
        url.query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
    } else {
        None
    }?;
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_url_key() {
        let record = MemoryRecord::new("T1", "funny cat video", "http://x/1");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["url"], "http://x/1");
        assert_eq!(json["title"], "T1");
        assert!(json.get("source_url").is_none());
    }

    #[test]
    fn test_youtube_video_id() {
        assert_eq!(
            youtube_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            youtube_video_id("https://youtu.be/3JZ_D3ELwOQ").as_deref(),
            Some("3JZ_D3ELwOQ")
        );
        assert_eq!(youtube_video_id("http://x/1"), None);
        assert_eq!(youtube_video_id("not a url"), None);
        assert_eq!(youtube_video_id("https://www.youtube.com/watch?list=abc"), None);
    }

    #[test]
    fn test_search_result_thumbnail() {
        let record = MemoryRecord::new("t", "s", "https://www.youtube.com/watch?v=9bZkp7q19f0");
        let result = SearchResult::from_record(&record, 1, 2, 0.5);
        assert_eq!(
            result.thumbnail_url.as_deref(),
            Some("https://img.youtube.com/vi/9bZkp7q19f0/hqdefault.jpg")
        );
        assert_eq!(result.rank, 1);
        assert_eq!(result.position, 2);

        let plain = SearchResult::from_record(&MemoryRecord::new("t", "s", "http://x/1"), 1, 0, 1.0);
        assert!(plain.thumbnail_url.is_none());
    }
}
