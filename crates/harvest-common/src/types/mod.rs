//! Common types used across the harvest workspace

use crate::error::{CommonError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Change-feed positions
// ============================================================================

/// A position in a change feed.
///
/// Older document stores report plain integer sequence numbers; newer ones
/// report opaque tokens. Both are carried verbatim and rendered back in the
/// same form they were received.
///
/// # Examples
///
/// ```rust
/// use harvest_common::types::Position;
///
/// let seq: Position = "42".parse().unwrap();
/// assert_eq!(seq, Position::Seq(42));
///
/// let token: Position = "17-g1AAAABteJzLYWBg".parse().unwrap();
/// assert_eq!(token.to_string(), "17-g1AAAABteJzLYWBg");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Position {
    /// Numeric sequence number
    Seq(u64),
    /// Opaque source-specific sequence marker
    Token(String),
}

impl Position {
    /// The position before any change was recorded
    pub fn start() -> Self {
        Position::Seq(0)
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Position::Seq(0))
    }

    /// Whether `self` is strictly behind `other`.
    ///
    /// Only numeric positions are comparable; opaque tokens never report
    /// being behind anything.
    pub fn is_behind(&self, other: &Position) -> bool {
        match (self, other) {
            (Position::Seq(a), Position::Seq(b)) => a < b,
            _ => false,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Position::Seq(seq) => write!(f, "{}", seq),
            Position::Token(token) => write!(f, "{}", token),
        }
    }
}

impl std::str::FromStr for Position {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CommonError::InvalidPosition(s.to_string()));
        }
        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return trimmed
                .parse::<u64>()
                .map(Position::Seq)
                .map_err(|_| CommonError::InvalidPosition(s.to_string()));
        }
        Ok(Position::Token(trimmed.to_string()))
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Position::Seq(seq) => serializer.serialize_u64(*seq),
            Position::Token(token) => serializer.serialize_str(token),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPosition {
    Number(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match RawPosition::deserialize(deserializer)? {
            RawPosition::Number(seq) => Ok(Position::Seq(seq)),
            RawPosition::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Page-number pagination parameters (pages are 1-based).
///
/// # Examples
///
/// ```rust
/// use harvest_common::types::Pagination;
///
/// let page_3 = Pagination::new(3, 20).unwrap();
/// assert_eq!(page_3.offset(), 40);
/// assert_eq!(page_3.next().page, 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page number, starting at 1
    pub page: u64,

    /// Maximum number of items per page
    pub page_size: u64,
}

impl Pagination {
    pub fn new(page: u64, page_size: u64) -> Result<Self> {
        if page == 0 {
            return Err(CommonError::InvalidPagination("pages start at 1".to_string()));
        }
        if page_size == 0 {
            return Err(CommonError::InvalidPagination(
                "page size must be greater than 0".to_string(),
            ));
        }
        Ok(Self { page, page_size })
    }

    /// The first page for a given page size
    pub fn first(page_size: u64) -> Result<Self> {
        Self::new(1, page_size)
    }

    /// The page after this one
    pub fn next(self) -> Self {
        Self {
            page: self.page + 1,
            page_size: self.page_size,
        }
    }

    /// Number of items preceding this page
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }

    /// Number of pages needed to hold `total` items
    pub fn pages_for(&self, total: u64) -> u64 {
        total.div_ceil(self.page_size)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_position_parse() {
        assert_eq!("0".parse::<Position>().unwrap(), Position::start());
        assert_eq!(" 123\n".parse::<Position>().unwrap(), Position::Seq(123));
        assert_eq!(
            "5-abc".parse::<Position>().unwrap(),
            Position::Token("5-abc".to_string())
        );
        assert!("".parse::<Position>().is_err());
        assert!("   ".parse::<Position>().is_err());
    }

    #[test]
    fn test_position_json() {
        let seq: Position = serde_json::from_str("77").unwrap();
        assert_eq!(seq, Position::Seq(77));
        let quoted: Position = serde_json::from_str("\"78\"").unwrap();
        assert_eq!(quoted, Position::Seq(78));
        let token: Position = serde_json::from_str("\"9-g1AAA\"").unwrap();
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"9-g1AAA\"");
        assert_eq!(serde_json::to_string(&seq).unwrap(), "77");
    }

    #[test]
    fn test_position_is_behind() {
        assert!(Position::Seq(1).is_behind(&Position::Seq(2)));
        assert!(!Position::Seq(2).is_behind(&Position::Seq(2)));
        assert!(!Position::Token("a".into()).is_behind(&Position::Seq(2)));
    }

    #[test]
    fn test_pagination() {
        let first = Pagination::first(25).unwrap();
        assert_eq!(first.offset(), 0);
        assert_eq!(first.next().offset(), 25);
        assert_eq!(first.pages_for(51), 3);
        assert_eq!(first.pages_for(0), 0);
        assert!(Pagination::new(0, 10).is_err());
        assert!(Pagination::new(1, 0).is_err());
    }
}
