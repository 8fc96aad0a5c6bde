use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::ManifestError;

/// A dotted numeric version such as `12.13` or `12.13.37`.
///
/// Segments compare numerically from left to right and missing trailing
/// segments count as zero, so `12.13 == 12.13.0` and `12.13.1 > 12.13`.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    raw: String,
    segments: Vec<u64>,
}

impl PackageVersion {
    pub fn parse(raw: &str) -> Result<Self, ManifestError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ManifestError::MalformedVersion(raw.to_string()));
        }

        let segments = trimmed
            .split('.')
            .map(|seg| {
                if seg.is_empty() || !seg.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ManifestError::MalformedVersion(raw.to_string()));
                }
                seg.parse::<u64>()
                    .map_err(|_| ManifestError::MalformedVersion(raw.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for PackageVersion {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> PackageVersion {
        PackageVersion::parse(s).unwrap()
    }

    #[test]
    fn numeric_segment_ordering() {
        assert!(v("12.14") > v("12.13"));
        assert!(v("12.13.1") > v("12.13"));
        assert!(v("12.10") > v("12.9"));
        assert!(v("13") > v("12.99.99"));
    }

    #[test]
    fn trailing_zeros_are_equal() {
        assert_eq!(v("12.13"), v("12.13.0"));
        assert_eq!(v("12.13.0.0"), v("12.13"));
        assert!(!(v("12.13") > v("12.13.0")));
    }

    #[test]
    fn keeps_original_text() {
        assert_eq!(v(" 12.13.37 ").to_string(), "12.13.37");
        assert_eq!(v("12.13.37").segments(), &[12, 13, 37]);
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "  ", "12..1", "12.13.rc1", "latest", "1.2-3", ".1", "1."] {
            assert!(
                matches!(
                    PackageVersion::parse(bad),
                    Err(ManifestError::MalformedVersion(_))
                ),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn from_str_round_trip() {
        let parsed: PackageVersion = "12.13".parse().unwrap();
        assert_eq!(parsed.as_str(), "12.13");
    }
}
