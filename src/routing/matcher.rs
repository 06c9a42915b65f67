//! Path pattern matching.
//!
//! # Responsibilities
//! - Parse patterns such as `/api/v1/ticket/{id}` into segments
//! - Match a request path and capture named segments
//! - Rank patterns so literal segments win over variable ones
//!
//! # Design Decisions
//! - Segment-by-segment comparison, no regex
//! - A single trailing slash is ignored (`/api/v1/faq/` == `/api/v1/faq`)
//! - Variable segments never match an empty segment

use std::collections::BTreeMap;

/// Values captured from variable segments, keyed by placeholder name.
pub type PathParams = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a pattern. `{name}` marks a variable segment.
    pub fn parse(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// Match `path`, returning captured parameters on success.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let mut params = PathParams::new();
        let mut parts = split_path(path);

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), part.to_string());
                }
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }

    /// True if `self` should win over `other` when both match the same path.
    ///
    /// Compared left to right: the first position where one pattern has a
    /// literal and the other a variable decides.
    pub fn is_more_specific_than(&self, other: &PathPattern) -> bool {
        for (a, b) in self.segments.iter().zip(&other.segments) {
            match (a, b) {
                (Segment::Literal(_), Segment::Param(_)) => return true,
                (Segment::Param(_), Segment::Literal(_)) => return false,
                _ => {}
            }
        }
        false
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    // An empty path has no segments rather than one empty segment.
    let mut iter = trimmed.split('/');
    if trimmed.is_empty() {
        iter.next();
    }
    iter
}
