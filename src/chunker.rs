use crate::planner::QuestionBudget;
use regex::Regex;
use serde::Serialize;

/// Opaque handle to a page-associated side resource (an extracted image).
/// Forwarded into chunks verbatim, never opened or interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRef(pub String);

/// One page of extracted document text plus its side artifacts.
#[derive(Debug, Clone)]
pub struct Page {
    pub index: usize,
    pub text: String,
    pub artifacts: Vec<ArtifactRef>,
}

impl Page {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self { index, text: text.into(), artifacts: Vec::new() }
    }
}

/// Minimum viable unit of text (+artifacts) dispatched for one round of
/// generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub text: String,
    pub artifacts: Vec<ArtifactRef>,
}

/// Placeholder emitted for a page whose text trims to nothing.
pub const PAGE_SENTINEL: &str = "[No content]";

/// Placeholder returned when the whole document yields no usable content.
pub const DOCUMENT_SENTINEL: &str = "[No content extracted]";

pub const DEFAULT_MIN_CHUNK_LEN: usize = 30;

/// Partitions per-page text into exactly `target` content-bearing chunks.
///
/// Pages are split on sentence boundaries, grouped into a per-page quota of
/// roughly equal groups, filtered against a minimum length, and padded by
/// repetition so the caller always receives a full work list. Degrades to
/// sentinel chunks instead of failing.
#[derive(Debug)]
pub struct ChunkAllocator {
    min_chunk_len: usize,
    boundary: Regex,
}

impl Default for ChunkAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CHUNK_LEN)
    }
}

impl ChunkAllocator {
    pub fn new(min_chunk_len: usize) -> Self {
        // Sentence boundary: terminal punctuation followed by whitespace.
        // The punctuation stays with the preceding sentence.
        let boundary = Regex::new(r"[.?!]\s+").expect("static sentence regex");
        Self { min_chunk_len, boundary }
    }

    /// Split `text` into sentences at `.`/`?`/`!` + whitespace boundaries.
    /// A whitespace-only input yields no sentences.
    pub fn split_sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        let mut sentences = Vec::new();
        let mut last = 0usize;
        for m in self.boundary.find_iter(trimmed) {
            // The punctuation mark is a single ASCII byte at m.start().
            sentences.push(&trimmed[last..m.start() + 1]);
            last = m.end();
        }
        if last < trimmed.len() {
            sentences.push(&trimmed[last..]);
        }
        sentences
    }

    /// Split one page's text into up to `quota` groups of consecutive
    /// sentences. Groups shorter than the minimum length are dropped;
    /// survivors are cycled to fill the quota. A page with no sentences
    /// yields the page sentinel.
    fn split_page(&self, text: &str, quota: usize) -> Vec<String> {
        let sentences = self.split_sentences(text);
        if sentences.is_empty() {
            return vec![PAGE_SENTINEL.to_string()];
        }

        let per_group = (sentences.len() / quota).max(1);
        let mut groups: Vec<String> = Vec::new();
        for window in sentences.chunks(per_group) {
            let group = window.join(" ").trim().to_string();
            if group.len() >= self.min_chunk_len {
                groups.push(group);
            }
        }

        // Cycle through survivors until the quota is met; dropped short
        // groups are never reintroduced.
        if !groups.is_empty() {
            let mut i = 0usize;
            while groups.len() < quota {
                groups.push(groups[i].clone());
                i += 1;
            }
        }

        groups.truncate(quota);
        groups
    }

    /// Partition `pages` into exactly `target` chunks (page order, then
    /// within-page group order), padding by repeating the last chunk when
    /// the pages undersupply. A contentless document or a zero target
    /// returns the single document sentinel.
    pub fn allocate(&self, pages: &[Page], target: usize) -> Vec<Chunk> {
        if target == 0 {
            return vec![Self::document_sentinel()];
        }

        let per_page_quota = (target / pages.len().max(1)).max(1);
        let mut chunks: Vec<Chunk> = Vec::new();

        for page in pages {
            if page.text.is_empty() {
                continue;
            }
            for text in self.split_page(&page.text, per_page_quota) {
                chunks.push(Chunk { text, artifacts: page.artifacts.clone() });
            }
        }

        if chunks.is_empty() {
            return vec![Self::document_sentinel()];
        }

        if let Some(last) = chunks.last().cloned() {
            while chunks.len() < target {
                chunks.push(last.clone());
            }
        }
        chunks.truncate(target);
        chunks
    }

    fn document_sentinel() -> Chunk {
        Chunk { text: DOCUMENT_SENTINEL.to_string(), artifacts: Vec::new() }
    }
}

/// Compose the budget planner and the allocator: plan a target from the
/// page count, then partition the pages into that many chunks.
pub fn plan_and_allocate(
    pages: &[Page],
    budget: &QuestionBudget,
    allocator: &ChunkAllocator,
) -> (usize, Vec<Chunk>) {
    let target = budget.plan(pages.len());
    let chunks = allocator.allocate(pages, target);
    (target, chunks)
}
