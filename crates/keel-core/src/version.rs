//! Package version parsing and comparison.
//!
//! Versions are dotted strings such as `1.2.10` or `2.0.0.rc1`:
//! - Segments are runs of digits or runs of letters (`rc1` is `rc`, `1`)
//! - Numeric segments compare as numbers
//! - Letter segments mark a prerelease and sort before any numeric segment
//! - Missing trailing segments count as `0`, so `1.0 == 1.0.0`

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use keel_util::errors::KeelError;

/// A parsed package version with comparable segments.
#[derive(Debug, Clone)]
pub struct Version {
    original: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
enum Segment {
    Numeric(u64),
    Text(String),
}

impl Version {
    pub fn parse(version: &str) -> Result<Self, KeelError> {
        let trimmed = version.trim();
        if !is_well_formed(trimmed) {
            return Err(KeelError::Requirement {
                input: version.to_string(),
            });
        }
        let segments = parse_segments(trimmed).ok_or_else(|| KeelError::Requirement {
            input: version.to_string(),
        })?;
        Ok(Self {
            original: trimmed.to_string(),
            segments,
        })
    }

    /// The `0` version, lower bound of the default requirement.
    pub fn zero() -> Self {
        Self {
            original: "0".to_string(),
            segments: vec![Segment::Numeric(0)],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn is_prerelease(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Text(_)))
    }

    /// The release this version leads up to: everything before the first
    /// letter segment. `2.0.rc1` becomes `2.0`.
    pub fn release(&self) -> Self {
        if !self.is_prerelease() {
            return self.clone();
        }
        let segments: Vec<Segment> = self
            .segments
            .iter()
            .take_while(|s| matches!(s, Segment::Numeric(_)))
            .cloned()
            .collect();
        Self::from_segments(segments)
    }

    /// The upper bound used by the pessimistic operator: drop prerelease
    /// segments, drop the last segment, then increment the new last one.
    /// `1.2.3` bumps to `1.3`, `1.2` bumps to `2`.
    pub fn bump(&self) -> Self {
        let mut segments: Vec<Segment> = self.release().segments;
        if segments.len() > 1 {
            segments.pop();
        }
        if let Some(Segment::Numeric(last)) = segments.last_mut() {
            *last += 1;
        }
        Self::from_segments(segments)
    }

    fn from_segments(segments: Vec<Segment>) -> Self {
        let segments = if segments.is_empty() {
            vec![Segment::Numeric(0)]
        } else {
            segments
        };
        let original = segments
            .iter()
            .map(|s| match s {
                Segment::Numeric(n) => n.to_string(),
                Segment::Text(t) => t.clone(),
            })
            .collect::<Vec<_>>()
            .join(".");
        Self { original, segments }
    }

    /// Segments with insignificant trailing zeros removed, used for hashing
    /// so that `1.0` and `1.0.0` land in the same bucket.
    fn canonical(&self) -> &[Segment] {
        let mut end = self.segments.len();
        while end > 1 && self.segments[end - 1] == Segment::Numeric(0) {
            end -= 1;
        }
        &self.segments[..end]
    }
}

impl std::str::FromStr for Version {
    type Err = KeelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let max_len = self.segments.len().max(other.segments.len());
        for i in 0..max_len {
            let ord = compare_segments(self.segments.get(i), other.segments.get(i));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const ZERO: Segment = Segment::Numeric(0);

fn compare_segments(a: Option<&Segment>, b: Option<&Segment>) -> Ordering {
    let a = a.unwrap_or(&ZERO);
    let b = b.unwrap_or(&ZERO);
    match (a, b) {
        (Segment::Numeric(a), Segment::Numeric(b)) => a.cmp(b),
        (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
        (Segment::Text(_), Segment::Numeric(_)) => Ordering::Less,
        (Segment::Numeric(_), Segment::Text(_)) => Ordering::Greater,
    }
}

/// `1`, `1.2`, `1.2.rc1`: starts with a digit, dot-separated alphanumeric parts.
fn is_well_formed(version: &str) -> bool {
    let mut parts = version.split('.');
    let first_ok = parts
        .next()
        .is_some_and(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    first_ok && parts.all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn parse_segments(version: &str) -> Option<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut current = String::new();

    let flush = |current: &mut String, segments: &mut Vec<Segment>| -> Option<()> {
        if current.is_empty() {
            return Some(());
        }
        let seg = if current.chars().all(|c| c.is_ascii_digit()) {
            Segment::Numeric(current.parse().ok()?)
        } else {
            Segment::Text(current.clone())
        };
        segments.push(seg);
        current.clear();
        Some(())
    };

    for ch in version.chars() {
        if ch == '.' {
            flush(&mut current, &mut segments)?;
            continue;
        }
        let switches_kind = current
            .chars()
            .last()
            .is_some_and(|prev| prev.is_ascii_digit() != ch.is_ascii_digit());
        if switches_kind {
            flush(&mut current, &mut segments)?;
        }
        current.push(ch);
    }
    flush(&mut current, &mut segments)?;

    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn basic_ordering() {
        assert!(v("1.0") < v("2.0"));
        assert!(v("1.9") < v("1.10"));
    }

    #[test]
    fn three_part_ordering() {
        assert!(v("1.0.0") < v("1.0.1"));
        assert!(v("1.0.1") < v("1.1.0"));
    }

    #[test]
    fn prerelease_before_release() {
        assert!(v("1.0.rc1") < v("1.0"));
        assert!(v("1.0.a") < v("1.0.b"));
        assert!(v("1.0.rc1") < v("1.0.rc2"));
        assert!(v("0.9") < v("1.0.rc1"));
    }

    #[test]
    fn trailing_zeros_equal() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0.0.0"));
    }

    #[test]
    fn trailing_zeros_hash_equal() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(v("1.0"));
        assert!(set.contains(&v("1.0.0")));
    }

    #[test]
    fn mixed_segment_is_split() {
        let rc = v("2.0.0.rc1");
        assert!(rc.is_prerelease());
        assert_eq!(rc.release(), v("2.0.0"));
        assert!(!v("2.0.0").is_prerelease());
    }

    #[test]
    fn bump_drops_last_segment() {
        assert_eq!(v("1.2.3").bump(), v("1.3"));
        assert_eq!(v("1.2").bump(), v("2"));
        assert_eq!(v("5").bump(), v("6"));
        assert_eq!(v("1.2.rc1").bump(), v("2"));
    }

    #[test]
    fn rejects_malformed() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("abc").is_err());
        assert!(Version::parse("1..2").is_err());
        assert!(Version::parse("1.2-java").is_err());
    }

    #[test]
    fn display_keeps_original() {
        assert_eq!(v(" 1.8.0 ").to_string(), "1.8.0");
    }
}
