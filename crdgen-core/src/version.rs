//! Kubernetes API version priority.

use std::{cmp::Ordering, convert::Infallible, str::FromStr};

/// A parsed Kubernetes API version string, ordered by version priority.
///
/// CRD version lists must be emitted following
/// [version priority](https://kubernetes.io/docs/tasks/extend-kubernetes/custom-resources/custom-resource-definition-versioning/#version-priority):
/// higher stable majors outrank lower ones, GA outranks beta, beta outranks
/// alpha, and any string not matching the `vN`/`vNalphaM`/`vNbetaM` pattern
/// sorts lexically after all conforming versions. The first entry after
/// sorting is the version API consumers treat as preferred.
///
/// ```
/// use crdgen_core::Version;
/// use std::cmp::Reverse;
/// let mut versions = vec!["v1beta1", "v2", "v1", "v10"];
/// versions.sort_by_cached_key(|v| Reverse(Version::parse(v)));
/// assert_eq!(versions, vec!["v10", "v2", "v1", "v1beta1"]);
/// ```
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Version {
    /// A GA release, `vN`
    Stable(u32),
    /// A beta pre-release, `vNbeta` or `vNbetaM`
    Beta(u32, Option<u32>),
    /// An alpha pre-release, `vNalpha` or `vNalphaM`
    Alpha(u32, Option<u32>),
    /// Any other string
    ///
    /// CRDs can declare arbitrary version names; these all rank below
    /// conforming versions and compare lexically among themselves.
    Nonconformant(String),
}

impl Version {
    fn conformant(v: &str) -> Option<Version> {
        let rest = v.strip_prefix('v')?;
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        let major: u32 = rest[..digits].parse().ok()?;
        let tail = &rest[digits..];
        if tail.is_empty() {
            return Some(Version::Stable(major));
        }
        let (build, qualifier): (fn(u32, Option<u32>) -> Version, &str) =
            if let Some(q) = tail.strip_prefix("beta") {
                (Version::Beta, q)
            } else if let Some(q) = tail.strip_prefix("alpha") {
                (Version::Alpha, q)
            } else {
                return None;
            };
        if qualifier.is_empty() {
            Some(build(major, None))
        } else {
            Some(build(major, Some(qualifier.parse().ok()?)))
        }
    }

    /// Parse a version string, treating anything non-conforming as [`Version::Nonconformant`]
    ///
    /// ```
    /// use crdgen_core::Version;
    /// assert_eq!(Version::parse("v10beta12"), Version::Beta(10, Some(12)));
    /// assert_eq!(Version::parse("ver3"), Version::Nonconformant("ver3".into()));
    /// ```
    pub fn parse(v: &str) -> Version {
        Self::conformant(v).unwrap_or_else(|| Version::Nonconformant(v.to_string()))
    }

    fn stability_rank(&self) -> u8 {
        match self {
            Version::Stable(_) => 3,
            Version::Beta(..) => 2,
            Version::Alpha(..) => 1,
            Version::Nonconformant(_) => 0,
        }
    }
}

/// Infallible parse, for use with generic string conversions
impl FromStr for Version {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Version::parse(s))
    }
}

/// Greater means higher priority, so `sort` + `Reverse` yields the emission order
impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        use Version::*;
        match (self, other) {
            (Stable(a), Stable(b)) => a.cmp(b),
            (Beta(a, x), Beta(b, y)) | (Alpha(a, x), Alpha(b, y)) => a.cmp(b).then(x.cmp(y)),
            // lexically earlier nonconformant strings take priority
            (Nonconformant(a), Nonconformant(b)) => b.cmp(a),
            _ => self.stability_rank().cmp(&other.stability_rank()),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
