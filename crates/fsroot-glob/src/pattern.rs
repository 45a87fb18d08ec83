//! Segment-wise glob queries.
//!
//! A query such as `users/**/*.json` is split on `/` and every token becomes
//! one [`Segment`], matched against a single directory level:
//!
//! - `**` is a globstar: zero or more directory levels
//! - `*` matches any name
//! - a token containing `*` matches names where each `*` stands for any run
//!   of characters (`user-*.json`)
//! - anything else matches one name exactly
//!
//! There is no `?`, character class, brace or negation syntax. Every
//! character other than `*` matches itself.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use thiserror::Error;

/// Errors when parsing a query.
#[derive(Debug, Clone, Error)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,
    #[error("invalid pattern segment {segment:?}: {reason}")]
    Invalid { segment: String, reason: String },
}

/// One `/`-delimited token of a query, compiled.
#[derive(Debug, Clone)]
pub enum Segment {
    /// `**`: matches every name and puts the walk into recursive mode.
    Globstar,
    /// `*`: matches every name.
    Any,
    /// No wildcard: the name must be equal.
    Literal(String),
    /// Contains `*`: full-string match against the compiled regex.
    Wildcard { raw: String, regex: Regex },
}

impl Segment {
    /// Compile a single token.
    pub fn compile(token: &str) -> Result<Self, PatternError> {
        match token {
            "**" => Ok(Segment::Globstar),
            "*" => Ok(Segment::Any),
            t if !t.contains('*') => Ok(Segment::Literal(t.to_string())),
            t => {
                let body = t
                    .split('*')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(".*");
                let regex = Regex::new(&format!("(?s)^{body}$")).map_err(|e| {
                    PatternError::Invalid {
                        segment: t.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Segment::Wildcard {
                    raw: t.to_string(),
                    regex,
                })
            }
        }
    }

    /// Check whether an entry name is accepted by this segment.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Segment::Globstar | Segment::Any => true,
            Segment::Literal(lit) => lit == name,
            Segment::Wildcard { regex, .. } => regex.is_match(name),
        }
    }

    pub fn is_globstar(&self) -> bool {
        matches!(self, Segment::Globstar)
    }

    /// The token this segment was compiled from.
    pub fn as_str(&self) -> &str {
        match self {
            Segment::Globstar => "**",
            Segment::Any => "*",
            Segment::Literal(lit) => lit,
            Segment::Wildcard { raw, .. } => raw,
        }
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Segment::Globstar, Segment::Globstar) | (Segment::Any, Segment::Any) => true,
            (Segment::Literal(a), Segment::Literal(b)) => a == b,
            (Segment::Wildcard { raw: a, .. }, Segment::Wildcard { raw: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Segment {}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled query: one [`Segment`] per directory level.
///
/// # Examples
/// ```
/// use fsroot_glob::QueryPattern;
///
/// let q = QueryPattern::parse("/users/**").unwrap();
/// assert_eq!(q.to_string(), "users/**/*");
/// assert_eq!(q.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPattern {
    segments: Vec<Segment>,
}

impl QueryPattern {
    /// Parse and compile a query.
    ///
    /// A single leading `/` is stripped, empty tokens are skipped and
    /// consecutive globstars collapse to one. A trailing `**` gets an
    /// implicit `*` so that `**` alone means "every file in the tree".
    pub fn parse(query: &str) -> Result<Self, PatternError> {
        let query = query.strip_prefix('/').unwrap_or(query);

        let mut segments = Vec::new();
        for token in query.split('/') {
            if token.is_empty() {
                continue;
            }
            let segment = Segment::compile(token)?;
            if segment.is_globstar() && matches!(segments.last(), Some(Segment::Globstar)) {
                continue;
            }
            segments.push(segment);
        }

        match segments.last() {
            None => return Err(PatternError::Empty),
            Some(Segment::Globstar) => segments.push(Segment::Any),
            Some(_) => {}
        }

        Ok(QueryPattern { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments. Never zero.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false: `parse` rejects queries without segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Check if the pattern contains a globstar anywhere.
    pub fn has_globstar(&self) -> bool {
        self.segments.iter().any(Segment::is_globstar)
    }
}

impl FromStr for QueryPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for QueryPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(segment.as_str())?;
        }
        Ok(())
    }
}
