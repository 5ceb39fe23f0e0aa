//! Release version ordering
//!
//! IP releases are tagged with dot-separated runs of non-negative integers
//! ("1.2.10", "2.0"). Ordering is componentwise by integer value, and
//! missing trailing components count as zero, so "1.2" and "1.2.0" are the
//! same release.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{IpmError, IpmResult};

/// A parsed release version
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    components: Vec<u64>,
}

impl Version {
    /// Parse a version string
    pub fn parse(raw: &str) -> IpmResult<Self> {
        let malformed = |reason: String| IpmError::MalformedVersion {
            version: raw.to_string(),
            reason,
        };

        if raw.trim().is_empty() {
            return Err(malformed("version is empty".to_string()));
        }

        let components = raw
            .trim()
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed(format!("component '{part}' is not a number")));
                }
                part.parse::<u64>()
                    .map_err(|e| malformed(format!("component '{part}': {e}")))
            })
            .collect::<IpmResult<Vec<_>>>()?;

        Ok(Self {
            raw: raw.to_string(),
            components,
        })
    }

    /// The string this version was parsed from
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Significant components with trailing zeros stripped
    fn significant(&self) -> &[u64] {
        let end = self
            .components
            .iter()
            .rposition(|&c| c != 0)
            .map_or(0, |i| i + 1);
        &self.components[..end]
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
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

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for Version {}

impl FromStr for Version {
    type Err = IpmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Whether `candidate` is strictly newer than `current`
pub fn is_newer(candidate: &str, current: &str) -> IpmResult<bool> {
    Ok(Version::parse(candidate)? > Version::parse(current)?)
}

/// Whether two version strings name the same release
///
/// Falls back to exact string comparison when either side does not parse.
pub fn same_release(a: &str, b: &str) -> bool {
    match (Version::parse(a), Version::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Pick the newest of a set of version strings
///
/// Returns the index of the newest entry, or `None` for an empty input.
/// When equal versions appear more than once the last one wins.
pub fn newest_index<'a, I>(versions: I) -> IpmResult<Option<usize>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, Version)> = None;
    for (i, raw) in versions.into_iter().enumerate() {
        let version = Version::parse(raw)?;
        match &best {
            Some((_, current)) if version < *current => {}
            _ => best = Some((i, version)),
        }
    }
    Ok(best.map(|(i, _)| i))
}
