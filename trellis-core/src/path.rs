//! Access Paths
//!
//! An [`AccessPath`] is an ordered list of keys and indices leading from the
//! root of the tree to one location inside it. Paths are plain values: they
//! are compared, hashed, and prefix-tested, but never resolved against the
//! tree on their own.
//!
//! # Forms
//!
//! Three textual forms are accepted:
//!
//! - Dotted/bracketed: `user.profile.bio`, `items[0].name`, `a["key.with.dots"]`
//! - RFC 6901 pointers: `/user/profile/bio`, `/items/0`
//! - Explicit segment lists built with [`AccessPath::child`]
//!
//! All-digit keys normalize to [`PathSegment::Index`], so `items.0`,
//! `items[0]` and `/items/0` are the same path.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use crate::error::PathError;

/// One step of an [`AccessPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// A property name.
    Key(String),
    /// An array position (or an all-digit property name).
    Index(usize),
}

impl PathSegment {
    /// Build a segment from a key, normalizing canonical integers to indices.
    pub fn key(key: impl Into<String>) -> Self {
        let key = key.into();
        match parse_index(&key) {
            Some(index) => Self::Index(index),
            None => Self::Key(key),
        }
    }

    /// The canonical form: a `Key` holding a canonical integer becomes the
    /// matching `Index`. Every segment stored in an [`AccessPath`] is in
    /// this form.
    pub fn normalized(self) -> Self {
        match self {
            Self::Key(key) => Self::key(key),
            index => index,
        }
    }

    /// The segment as an array index, if it is one.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Key(_) => None,
        }
    }

    /// The segment as an object key.
    pub fn as_key(&self) -> Cow<'_, str> {
        match self {
            Self::Key(key) => Cow::Borrowed(key),
            Self::Index(index) => Cow::Owned(index.to_string()),
        }
    }

    /// Whether this is the `-` pointer token (append to array).
    pub fn is_append(&self) -> bool {
        matches!(self, Self::Key(key) if key == "-")
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::key(key)
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::key(key)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Canonical non-negative integer: digits only, no leading zeros.
fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if key.len() > 1 && key.starts_with('0') {
        return None;
    }
    key.parse().ok()
}

/// An ordered key sequence locating a value inside the tree.
///
/// # Example
///
/// ```rust,ignore
/// let path = AccessPath::parse("user.tags[2]")?;
/// assert_eq!(path, AccessPath::from_pointer("/user/tags/2")?);
/// assert!(AccessPath::from("user").is_ancestor_of(&path));
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccessPath {
    segments: SmallVec<[PathSegment; 4]>,
}

impl AccessPath {
    /// The empty path, addressing the root itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Alias of [`AccessPath::is_root`].
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// A new path one level deeper.
    pub fn child(&self, segment: impl Into<PathSegment>) -> Self {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    pub fn push(&mut self, segment: impl Into<PathSegment>) {
        self.segments.push(segment.into().normalized());
    }

    /// Concatenate two paths.
    pub fn join(&self, other: &AccessPath) -> Self {
        let mut path = self.clone();
        path.segments.extend(other.segments.iter().cloned());
        path
    }

    /// The enclosing path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        self.split_last().map(|(parent, _)| parent)
    }

    /// Split into the parent path and the final segment.
    pub fn split_last(&self) -> Option<(Self, PathSegment)> {
        let (last, rest) = self.segments.split_last()?;
        Some((
            Self {
                segments: rest.iter().cloned().collect(),
            },
            last.clone(),
        ))
    }

    /// The first `len` segments.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            segments: self.segments.iter().take(len).cloned().collect(),
        }
    }

    /// Whether `self` is a (non-strict) prefix of `other`.
    pub fn is_prefix_of(&self, other: &AccessPath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Whether `self` is a strict prefix of `other`.
    pub fn is_ancestor_of(&self, other: &AccessPath) -> bool {
        self.len() < other.len() && self.is_prefix_of(other)
    }

    /// The hierarchical matching rule: one path is a prefix of the other.
    ///
    /// Siblings (paths that diverge at some segment) are never related.
    pub fn is_related(&self, other: &AccessPath) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }

    /// Parse the dotted/bracketed form.
    ///
    /// The empty string is the root path.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let syntax = |reason: &str| PathError::Syntax {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let mut path = Self::root();
        let mut rest = input;
        let mut expect_segment = true;

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('[') {
                let (segment, remaining) = parse_bracket(after).map_err(syntax)?;
                path.segments.push(segment);
                rest = remaining;
                expect_segment = false;
                continue;
            }

            if !expect_segment {
                match rest.strip_prefix('.') {
                    Some(after) => {
                        rest = after;
                        expect_segment = true;
                        continue;
                    }
                    None => return Err(syntax("expected `.` or `[` between segments")),
                }
            }

            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            if end == 0 {
                return Err(syntax("empty segment"));
            }
            path.segments.push(PathSegment::key(&rest[..end]));
            rest = &rest[end..];
            expect_segment = false;
        }

        if expect_segment && !input.is_empty() {
            return Err(syntax("trailing `.`"));
        }

        Ok(path)
    }

    /// Parse an RFC 6901 JSON pointer.
    pub fn from_pointer(pointer: &str) -> Result<Self, PathError> {
        if pointer.is_empty() {
            return Ok(Self::root());
        }
        let Some(body) = pointer.strip_prefix('/') else {
            return Err(PathError::Pointer(pointer.to_string()));
        };

        let mut path = Self::root();
        for token in body.split('/') {
            path.segments
                .push(PathSegment::key(unescape_token(token, pointer)?));
        }
        Ok(path)
    }

    /// Render as an RFC 6901 JSON pointer.
    pub fn to_pointer(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            out.push_str(&segment.as_key().replace('~', "~0").replace('/', "~1"));
        }
        out
    }
}

fn parse_bracket(after: &str) -> Result<(PathSegment, &str), &'static str> {
    if let Some(quote) = after.chars().next().filter(|c| *c == '"' || *c == '\'') {
        let body = &after[1..];
        let close = body.find(quote).ok_or("unterminated quoted key")?;
        let remaining = body[close + 1..]
            .strip_prefix(']')
            .ok_or("expected `]` after quoted key")?;
        return Ok((PathSegment::key(&body[..close]), remaining));
    }

    let close = after.find(']').ok_or("unterminated `[`")?;
    let inner = after[..close].trim();
    let index = parse_index(inner).ok_or("brackets must hold an index or a quoted key")?;
    Ok((PathSegment::Index(index), &after[close + 1..]))
}

fn unescape_token(token: &str, pointer: &str) -> Result<String, PathError> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return Err(PathError::Pointer(pointer.to_string())),
        }
    }
    Ok(out)
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(['.', '[', ']', '"', '\''])
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Index(index) => write!(f, "[{index}]")?,
                PathSegment::Key(key) if is_plain_key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathSegment::Key(key) => write!(f, "[{key:?}]")?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessPath({:?})", self.to_string())
    }
}

impl FromStr for AccessPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Lenient conversion: input that fails to parse becomes a single key.
impl From<&str> for AccessPath {
    fn from(input: &str) -> Self {
        Self::parse(input).unwrap_or_else(|err| {
            tracing::debug!(%err, "treating unparsable path as a single key");
            std::iter::once(PathSegment::Key(input.to_string())).collect()
        })
    }
}

impl From<String> for AccessPath {
    fn from(input: String) -> Self {
        Self::from(input.as_str())
    }
}

impl From<&String> for AccessPath {
    fn from(input: &String) -> Self {
        Self::from(input.as_str())
    }
}

impl From<&AccessPath> for AccessPath {
    fn from(path: &AccessPath) -> Self {
        path.clone()
    }
}

impl From<Vec<PathSegment>> for AccessPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        segments.into_iter().collect()
    }
}

impl FromIterator<PathSegment> for AccessPath {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().map(PathSegment::normalized).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_and_bracketed_forms() {
        let path = AccessPath::parse("user.profile.bio").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.segments()[2], PathSegment::Key("bio".into()));

        let path = AccessPath::parse("items[0].name").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("items".into()),
                PathSegment::Index(0),
                PathSegment::Key("name".into()),
            ]
        );

        let path = AccessPath::parse(r#"a["key.with.dots"]"#).unwrap();
        assert_eq!(path.segments()[1], PathSegment::Key("key.with.dots".into()));
    }

    #[test]
    fn empty_string_is_root() {
        assert!(AccessPath::parse("").unwrap().is_root());
        assert!(AccessPath::from_pointer("").unwrap().is_root());
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(AccessPath::parse("a..b").is_err());
        assert!(AccessPath::parse("a.").is_err());
        assert!(AccessPath::parse("a[").is_err());
        assert!(AccessPath::parse("a[x]").is_err());
        assert!(AccessPath::parse("a[0]b").is_err());
    }

    #[test]
    fn lenient_conversion_keeps_bad_input_as_one_key() {
        let path = AccessPath::from("a[");
        assert_eq!(path.segments(), &[PathSegment::Key("a[".into())]);
    }

    #[test]
    fn numeric_keys_normalize_to_indices() {
        let dotted = AccessPath::from("items.0");
        let bracketed = AccessPath::from("items[0]");
        let pointer = AccessPath::from_pointer("/items/0").unwrap();
        assert_eq!(dotted, bracketed);
        assert_eq!(bracketed, pointer);

        // Leading zeros are not canonical indices.
        assert_eq!(PathSegment::key("01"), PathSegment::Key("01".into()));
    }

    #[test]
    fn pointer_escapes() {
        let path = AccessPath::from_pointer("/a~1b/c~0d").unwrap();
        assert_eq!(path.segments()[0], PathSegment::Key("a/b".into()));
        assert_eq!(path.segments()[1], PathSegment::Key("c~d".into()));
        assert_eq!(path.to_pointer(), "/a~1b/c~0d");

        assert!(AccessPath::from_pointer("no-slash").is_err());
        assert!(AccessPath::from_pointer("/bad~2").is_err());
    }

    #[test]
    fn append_token_stays_a_key() {
        let path = AccessPath::from_pointer("/items/-").unwrap();
        assert!(path.last().unwrap().is_append());
    }

    #[test]
    fn prefix_relations() {
        let user = AccessPath::from("user");
        let name = AccessPath::from("user.name");
        let email = AccessPath::from("user.email");

        assert!(user.is_ancestor_of(&name));
        assert!(!name.is_ancestor_of(&user));
        assert!(!user.is_ancestor_of(&user));
        assert!(user.is_prefix_of(&user));

        assert!(user.is_related(&name));
        assert!(name.is_related(&user));
        assert!(!name.is_related(&email));
        assert!(AccessPath::root().is_related(&email));
    }

    #[test]
    fn hand_built_digit_keys_are_normalized() {
        let built = AccessPath::from(vec![
            PathSegment::Key("items".into()),
            PathSegment::Key("0".into()),
        ]);
        assert_eq!(built, AccessPath::from("items[0]"));

        let mut pushed = AccessPath::from("items");
        pushed.push(PathSegment::Key("0".into()));
        assert_eq!(pushed.last(), Some(&PathSegment::Index(0)));
        assert!(pushed.is_related(&AccessPath::from("items[0].name")));

        let padded = AccessPath::root().child(PathSegment::Key("007".into()));
        assert_eq!(padded.last(), Some(&PathSegment::Key("007".into())));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for input in ["user.profile.bio", "items[3].tags[0]", r#"cfg["a.b"].x"#] {
            let path = AccessPath::parse(input).unwrap();
            assert_eq!(AccessPath::parse(&path.to_string()).unwrap(), path);
        }
    }

    #[test]
    fn split_last_and_parent() {
        let path = AccessPath::from("a.b[2]");
        let (parent, last) = path.split_last().unwrap();
        assert_eq!(parent, AccessPath::from("a.b"));
        assert_eq!(last, PathSegment::Index(2));
        assert!(AccessPath::root().parent().is_none());
    }
}
