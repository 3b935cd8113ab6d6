//! Minimal path globbing for source discovery
//!
//! Patterns are split on `/` and matched segment by segment, so `*` never
//! crosses a directory boundary. `?` matches exactly one character.

/// A compiled glob over slash-separated relative paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobPattern {
    raw: String,
    segments: Vec<String>,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Self {
        let trimmed = pattern.trim().trim_start_matches("./").trim_start_matches('/');
        let segments = trimmed
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            raw: trimmed.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Directory to list: every leading segment without wildcards, ending in
    /// `/`. Empty when the first segment already has one.
    pub fn literal_prefix(&self) -> String {
        let literal: Vec<&str> = self
            .segments
            .iter()
            .take(self.segments.len().saturating_sub(1))
            .take_while(|s| !has_wildcard(s))
            .map(String::as_str)
            .collect();
        if literal.is_empty() {
            String::new()
        } else {
            format!("{}/", literal.join("/"))
        }
    }

    /// Whether `path` (relative to the storage root) matches every segment.
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        parts.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(parts)
                .all(|(pattern, part)| segment_matches(pattern.as_bytes(), part.as_bytes()))
    }
}

fn has_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?'])
}

/// Iterative wildcard match with single-star backtracking.
fn segment_matches(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                star = Some((p, t));
                p += 1;
            }
            Some(&c) if c == b'?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}
