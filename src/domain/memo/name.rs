//! Call-site identity for memoized operations

use std::borrow::Cow;
use std::fmt;
use std::panic::Location;

use crate::domain::DomainError;

/// Names one logical memoized operation.
///
/// Two different names never share cache entries; the same name always maps to
/// the same table. Names are either chosen explicitly (greppable constants such
/// as `health.activity_summaries`) or captured from the caller's source
/// location with [`CacheName::here`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheName(Cow<'static, str>);

impl CacheName {
    /// Creates a validated cache name
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        validate_cache_name(&name)?;
        Ok(Self(Cow::Owned(name)))
    }

    /// Creates a cache name from a string literal.
    ///
    /// Applies the same rules as [`CacheName::new`] but panics instead of
    /// returning an error, which is a compile error when used in a `const`
    /// item.
    pub const fn from_static(name: &'static str) -> Self {
        assert!(
            is_valid_name(name),
            "cache name cannot be blank or contain control characters"
        );
        Self(Cow::Borrowed(name))
    }

    /// Captures the caller's `file:line:column` as the cache name.
    ///
    /// Every evaluation of the same call expression yields the same name.
    #[track_caller]
    pub fn here() -> Self {
        let location = Location::caller();
        Self(Cow::Owned(format!(
            "{}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        )))
    }

    /// Appends a segment, producing `self.segment`
    pub fn child(&self, segment: &str) -> Result<Self, DomainError> {
        Self::new(format!("{}.{}", self.0, segment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for CacheName {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for CacheName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Const counterpart of [`validate_cache_name`]
const fn is_valid_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    let mut blank = true;
    let mut i = 0;

    while i < bytes.len() {
        let (c, width) = decode_char(bytes, i);

        if is_control(c) {
            return false;
        }
        if !is_whitespace(c) {
            blank = false;
        }

        i += width;
    }

    !blank
}

/// Decodes the scalar starting at `i` of valid UTF-8
const fn decode_char(bytes: &[u8], i: usize) -> (u32, usize) {
    let b0 = bytes[i] as u32;

    if b0 < 0x80 {
        (b0, 1)
    } else if b0 < 0xE0 {
        (((b0 & 0x1F) << 6) | (bytes[i + 1] as u32 & 0x3F), 2)
    } else if b0 < 0xF0 {
        let c = ((b0 & 0x0F) << 12)
            | ((bytes[i + 1] as u32 & 0x3F) << 6)
            | (bytes[i + 2] as u32 & 0x3F);
        (c, 3)
    } else {
        let c = ((b0 & 0x07) << 18)
            | ((bytes[i + 1] as u32 & 0x3F) << 12)
            | ((bytes[i + 2] as u32 & 0x3F) << 6)
            | (bytes[i + 3] as u32 & 0x3F);
        (c, 4)
    }
}

/// Unicode general category Cc, as `char::is_control`
const fn is_control(c: u32) -> bool {
    c <= 0x1F || (c >= 0x7F && c <= 0x9F)
}

/// Unicode White_Space, as `char::is_whitespace`
const fn is_whitespace(c: u32) -> bool {
    matches!(
        c,
        0x09..=0x0D
            | 0x20
            | 0x85
            | 0xA0
            | 0x1680
            | 0x2000..=0x200A
            | 0x2028
            | 0x2029
            | 0x202F
            | 0x205F
            | 0x3000
    )
}

fn validate_cache_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("Cache name cannot be empty"));
    }

    if name.chars().any(char::is_control) {
        return Err(DomainError::validation(format!(
            "Cache name '{}' contains control characters",
            name.escape_debug()
        )));
    }

    Ok(())
}
