//! Release version ordering for upstream Go releases.
//!
//! Go release identifiers are not semver: `1.21.0`, `1.21rc2`, `1.9beta1` and
//! plain `1.2` all appear in the release listing. This module parses them into
//! a structured [`ReleaseVersion`] and orders them so that the newest release
//! sorts first when a listing is sorted in descending order.
//!
//! ## Ordering
//!
//! 1. Numeric segments are compared element-wise, the shorter one padded with
//!    zeros (`1.1` equals `1.1.0`).
//! 2. A final release outranks any pre-release with the same numeric prefix.
//! 3. Pre-release tiers rank `rc > beta > alpha`.
//! 4. Within a tier the trailing number decides (`rc5 > rc4`).
//!
//! Identifiers that cannot be parsed sort below everything else so they never
//! win a "pick the newest" selection.

use std::cmp::Ordering;
use std::fmt;

/// Pre-release quality tier.
///
/// Variants are declared lowest first so the derived ordering matches the
/// release ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreReleaseKind {
    /// `alpha` tag.
    Alpha,
    /// `beta` tag.
    Beta,
    /// `rc` tag.
    ReleaseCandidate,
}

impl PreReleaseKind {
    /// Tags in the order they are tried while parsing.
    const TAGS: [(&'static str, Self); 3] = [
        ("rc", Self::ReleaseCandidate),
        ("beta", Self::Beta),
        ("alpha", Self::Alpha),
    ];

    /// Returns the literal tag used in release identifiers.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::ReleaseCandidate => "rc",
        }
    }
}

/// Pre-release marker: tier plus its sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreRelease {
    /// Quality tier.
    pub kind: PreReleaseKind,
    /// Sequence number within the tier (`1` when the tag has no digits).
    pub number: u64,
}

/// A parsed release identifier with a total order.
///
/// Equality follows the ordering, so `1.1` and `1.1.0` are equal.
#[derive(Debug, Clone)]
pub struct ReleaseVersion {
    segments: Vec<u64>,
    pre: Option<PreRelease>,
}

impl ReleaseVersion {
    /// Parses a release identifier such as `1.21.3`, `1.22rc1` or `1.1beta`.
    ///
    /// Parsing never fails. Malformed input yields [`ReleaseVersion::lowest`].
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let final_release = ReleaseVersion::parse("1.2");
    /// let candidate = ReleaseVersion::parse("1.2rc5");
    /// assert!(final_release > candidate);
    /// ```
    #[must_use]
    pub fn parse(input: &str) -> Self {
        Self::try_parse(input).unwrap_or_else(Self::lowest)
    }

    /// The value malformed identifiers collapse to: `0alpha0`.
    #[must_use]
    pub fn lowest() -> Self {
        Self {
            segments: vec![0],
            pre: Some(PreRelease {
                kind: PreReleaseKind::Alpha,
                number: 0,
            }),
        }
    }

    fn try_parse(input: &str) -> Option<Self> {
        let split = input
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(input.len());
        let (numeric, rest) = input.split_at(split);

        let segments = numeric
            .split('.')
            .map(|segment| segment.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        if rest.is_empty() {
            return Some(Self {
                segments,
                pre: None,
            });
        }

        let (kind, digits) = PreReleaseKind::TAGS
            .iter()
            .find_map(|(tag, kind)| rest.strip_prefix(tag).map(|digits| (*kind, digits)))?;

        let number = if digits.is_empty() {
            1
        } else if digits.bytes().all(|b| b.is_ascii_digit()) {
            digits.parse().ok()?
        } else {
            return None;
        };

        Some(Self {
            segments,
            pre: Some(PreRelease { kind, number }),
        })
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                decided => return decided,
            }
        }

        match (self.pre, other.pre) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.kind.cmp(&b.kind).then(a.number.cmp(&b.number)),
        }
    }
}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ReleaseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReleaseVersion {}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        if let Some(pre) = self.pre {
            write!(f, "{}{}", pre.kind.tag(), pre.number)?;
        }
        Ok(())
    }
}

/// Compares two release identifiers.
#[must_use]
pub fn compare(a: &str, b: &str) -> Ordering {
    ReleaseVersion::parse(a).cmp(&ReleaseVersion::parse(b))
}
