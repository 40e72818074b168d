//! Semantic version algebra
//!
//! Implements SemVer 2.0.0 parsing, precedence, bumping and identifier
//! manipulation as defined at semver.org. Build identifiers never
//! participate in equality or ordering.

use crate::error::{ReleaseError, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Versioning scheme a version string is interpreted under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Semver,
}

impl FromStr for Scheme {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "semver" => Ok(Scheme::Semver),
            other => Err(ReleaseError::config(format!(
                "Unknown versioning scheme: '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Semver => write!(f, "semver"),
        }
    }
}

/// Slot an extra identifier is appended to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierPosition {
    PreRelease,
    Build,
}

/// A single pre-release identifier
///
/// Numeric identifiers always have lower precedence than alphanumeric ones
/// and are compared numerically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Numeric(u64),
    Alphanumeric(String),
}

impl Identifier {
    /// Parse a single dot-separated identifier
    ///
    /// All-digit identifiers become numeric; leading zeros are rejected as
    /// required by SemVer. Alphanumeric identifiers may contain ASCII
    /// letters, digits and hyphens.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(ReleaseError::version("Empty version identifier"));
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            if s.len() > 1 && s.starts_with('0') {
                return Err(ReleaseError::version(format!(
                    "Numeric identifier has leading zeros: '{}'",
                    s
                )));
            }
            let n = s
                .parse::<u64>()
                .map_err(|_| ReleaseError::version(format!("Numeric identifier overflow: '{}'", s)))?;
            Ok(Identifier::Numeric(n))
        } else if s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            Ok(Identifier::Alphanumeric(s.to_string()))
        } else {
            Err(ReleaseError::version(format!(
                "Invalid characters in identifier: '{}'",
                s
            )))
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identifier::Numeric(a), Identifier::Numeric(b)) => a.cmp(b),
            (Identifier::Numeric(_), Identifier::Alphanumeric(_)) => Ordering::Less,
            (Identifier::Alphanumeric(_), Identifier::Numeric(_)) => Ordering::Greater,
            (Identifier::Alphanumeric(a), Identifier::Alphanumeric(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(n) => write!(f, "{}", n),
            Identifier::Alphanumeric(s) => write!(f, "{}", s),
        }
    }
}

/// Axis along which the next version is incremented
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BumpComponent {
    Major,
    Minor,
    Patch,
    /// A named pre-release identifier (e.g. "alpha"), used by explicit
    /// bump overrides
    Named(String),
}

impl BumpComponent {
    /// Significance rank for aggregation (major > minor > patch)
    ///
    /// Named identifiers only appear via explicit overrides and rank lowest.
    pub fn rank(&self) -> u8 {
        match self {
            BumpComponent::Major => 3,
            BumpComponent::Minor => 2,
            BumpComponent::Patch => 1,
            BumpComponent::Named(_) => 0,
        }
    }

    /// Keep the more significant of two components
    pub fn max(self, other: BumpComponent) -> BumpComponent {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

impl FromStr for BumpComponent {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "major" => Ok(BumpComponent::Major),
            "minor" => Ok(BumpComponent::Minor),
            "patch" => Ok(BumpComponent::Patch),
            other => {
                if other.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') && !other.is_empty()
                {
                    Ok(BumpComponent::Named(other.to_string()))
                } else {
                    Err(ReleaseError::version(format!(
                        "Invalid bump component: '{}'",
                        s
                    )))
                }
            }
        }
    }
}

impl fmt::Display for BumpComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BumpComponent::Major => write!(f, "major"),
            BumpComponent::Minor => write!(f, "minor"),
            BumpComponent::Patch => write!(f, "patch"),
            BumpComponent::Named(s) => write!(f, "{}", s),
        }
    }
}

/// Semantic version value object
///
/// Equality and ordering follow SemVer 2.0.0 precedence and therefore
/// ignore build identifiers.
#[derive(Debug, Clone)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Vec<Identifier>,
    pub build: Vec<String>,
}

impl Version {
    /// Create a plain version without pre-release or build identifiers
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
            prerelease: Vec::new(),
            build: Vec::new(),
        }
    }

    /// Parse a version string strictly per SemVer 2.0.0
    pub fn parse(s: &str) -> Result<Self> {
        let (core_and_pre, build) = match s.split_once('+') {
            Some((head, tail)) => (head, Some(tail)),
            None => (s, None),
        };
        let (core, prerelease) = match core_and_pre.split_once('-') {
            Some((head, tail)) => (head, Some(tail)),
            None => (core_and_pre, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(ReleaseError::version(format!(
                "Invalid version format: '{}' - expected MAJOR.MINOR.PATCH",
                s
            )));
        }
        let major = parse_numeric_component(parts[0], "major")?;
        let minor = parse_numeric_component(parts[1], "minor")?;
        let patch = parse_numeric_component(parts[2], "patch")?;

        let prerelease = match prerelease {
            Some(pre) => pre
                .split('.')
                .map(Identifier::parse)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let build = match build {
            Some(b) => {
                let ids: Vec<String> = b.split('.').map(|s| s.to_string()).collect();
                for id in &ids {
                    if id.is_empty()
                        || !id.bytes().all(|c| c.is_ascii_alphanumeric() || c == b'-')
                    {
                        return Err(ReleaseError::version(format!(
                            "Invalid build identifier: '{}'",
                            id
                        )));
                    }
                }
                ids
            }
            None => Vec::new(),
        };

        Ok(Version {
            major,
            minor,
            patch,
            prerelease,
            build,
        })
    }

    /// Parse leniently: strip a configurable prefix and stray whitespace
    ///
    /// With no explicit prefix, a leading `v` or `V` is tolerated.
    pub fn parse_lenient(s: &str, prefix: Option<&str>) -> Result<Self> {
        let trimmed = s.trim();
        let stripped = match prefix {
            Some(p) if !p.is_empty() => trimmed.strip_prefix(p).unwrap_or(trimmed),
            _ => trimmed
                .strip_prefix('v')
                .or_else(|| trimmed.strip_prefix('V'))
                .unwrap_or(trimmed),
        };
        Version::parse(stripped)
    }

    /// The `major.minor.patch` triple without identifiers
    pub fn core(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }

    /// Whether this version carries any pre-release identifier
    pub fn has_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// First pre-release identifier rendered as a string, if any
    ///
    /// This is the qualifier of a collapsed version (`1.3.0-alpha.2` ->
    /// `alpha`).
    pub fn prerelease_qualifier(&self) -> Option<String> {
        self.prerelease.first().map(|id| id.to_string())
    }

    /// Trailing numeric ordinal of the pre-release, if any
    pub fn prerelease_ordinal(&self) -> Option<u64> {
        match self.prerelease.last() {
            Some(Identifier::Numeric(n)) => Some(*n),
            _ => None,
        }
    }

    /// Bump the version along the given component
    ///
    /// Core bumps reset the lower components and drop pre-release and build
    /// identifiers. Bumping a named identifier increments its numeric tail,
    /// adding `.1` when absent, or appends `name.1` when the identifier does
    /// not occur at all.
    pub fn bump(&self, component: &BumpComponent) -> Version {
        match component {
            BumpComponent::Major => Version::new(self.major + 1, 0, 0),
            BumpComponent::Minor => Version::new(self.major, self.minor + 1, 0),
            BumpComponent::Patch => Version::new(self.major, self.minor, self.patch + 1),
            BumpComponent::Named(name) => self.bump_named(name),
        }
    }

    fn bump_named(&self, name: &str) -> Version {
        let mut v = self.clone();
        let pos = v.prerelease.iter().position(|id| match id {
            Identifier::Alphanumeric(s) => s == name,
            Identifier::Numeric(_) => false,
        });
        match pos {
            Some(i) => {
                match v.prerelease.get(i + 1) {
                    Some(Identifier::Numeric(n)) => {
                        v.prerelease[i + 1] = Identifier::Numeric(n + 1);
                    }
                    _ => {
                        v.prerelease.insert(i + 1, Identifier::Numeric(1));
                    }
                }
            }
            None => {
                v.prerelease
                    .push(Identifier::Alphanumeric(name.to_string()));
                v.prerelease.push(Identifier::Numeric(1));
            }
        }
        v
    }

    /// Replace the entire pre-release with the given qualifier
    ///
    /// The qualifier may itself be dotted (`alpha.local`). Build identifiers
    /// are preserved.
    pub fn with_prerelease_qualifier(&self, qualifier: &str) -> Result<Version> {
        let mut v = self.clone();
        v.prerelease = qualifier
            .split('.')
            .map(Identifier::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(v)
    }

    /// Replace the pre-release ordinal, appending one when absent
    pub fn with_prerelease_ordinal(&self, ordinal: u64) -> Version {
        let mut v = self.clone();
        match v.prerelease.last_mut() {
            Some(Identifier::Numeric(n)) => *n = ordinal,
            _ => v.prerelease.push(Identifier::Numeric(ordinal)),
        }
        v
    }

    /// Append an extra identifier in the given slot, de-duplicating by
    /// qualifier
    ///
    /// When the qualifier is already present its value is replaced in place,
    /// preserving the original position.
    pub fn with_identifier(
        &self,
        position: IdentifierPosition,
        qualifier: &str,
        value: Option<&str>,
    ) -> Result<Version> {
        if qualifier.is_empty() {
            return Err(ReleaseError::version("Empty identifier qualifier"));
        }
        let mut v = self.clone();
        match position {
            IdentifierPosition::PreRelease => {
                let qualifier_id = Identifier::parse(qualifier)?;
                let value_id = value.map(Identifier::parse).transpose()?;
                let pos = v.prerelease.iter().position(|id| *id == qualifier_id);
                match pos {
                    Some(i) => {
                        // Replace the current value, or insert one after the
                        // qualifier when the slot held none.
                        if let Some(val) = value_id {
                            match v.prerelease.get(i + 1) {
                                Some(Identifier::Numeric(_)) => v.prerelease[i + 1] = val,
                                _ => v.prerelease.insert(i + 1, val),
                            }
                        }
                    }
                    None => {
                        v.prerelease.push(qualifier_id);
                        if let Some(val) = value_id {
                            v.prerelease.push(val);
                        }
                    }
                }
            }
            IdentifierPosition::Build => {
                let exists = v.build.iter().position(|b| b == qualifier);
                match exists {
                    Some(i) => {
                        if let Some(val) = value {
                            match v.build.get(i + 1) {
                                Some(_) => v.build[i + 1] = val.to_string(),
                                None => v.build.push(val.to_string()),
                            }
                        }
                    }
                    None => {
                        v.build.push(qualifier.to_string());
                        if let Some(val) = value {
                            v.build.push(val.to_string());
                        }
                    }
                }
            }
        }
        Ok(v)
    }

    /// Whether the canonical string matches the given range expression
    pub fn in_range(&self, range: &regex::Regex) -> bool {
        range.is_match(&self.to_string())
    }
}

fn parse_numeric_component(s: &str, label: &str) -> Result<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ReleaseError::version(format!(
            "Invalid {} version: '{}'",
            label, s
        )));
    }
    if s.len() > 1 && s.starts_with('0') {
        return Err(ReleaseError::version(format!(
            "Leading zeros in {} version: '{}'",
            label, s
        )));
    }
    s.parse::<u64>()
        .map_err(|_| ReleaseError::version(format!("Invalid {} version: '{}'", label, s)))
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let core = (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch));
        if core != Ordering::Equal {
            return core;
        }
        // A pre-release version has lower precedence than the normal version.
        match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                for (a, b) in self.prerelease.iter().zip(other.prerelease.iter()) {
                    let ord = a.cmp(b);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                self.prerelease.len().cmp(&other.prerelease.len())
            }
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.prerelease.is_empty() {
            let pre: Vec<String> = self.prerelease.iter().map(|id| id.to_string()).collect();
            write!(f, "-{}", pre.join("."))?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build.join("."))?;
        }
        Ok(())
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(v.major, 1);
        assert_eq!(v.minor, 2);
        assert_eq!(v.patch, 3);
        assert!(v.prerelease.is_empty());
        assert!(v.build.is_empty());
    }

    #[test]
    fn test_version_parse_prerelease_and_build() {
        let v = Version::parse("1.2.3-alpha.1+build.42").unwrap();
        assert_eq!(v.prerelease.len(), 2);
        assert_eq!(v.prerelease[0], Identifier::Alphanumeric("alpha".into()));
        assert_eq!(v.prerelease[1], Identifier::Numeric(1));
        assert_eq!(v.build, vec!["build".to_string(), "42".to_string()]);
    }

    #[test]
    fn test_version_parse_invalid() {
        assert!(Version::parse("1.2").is_err());
        assert!(Version::parse("1.2.3.4").is_err());
        assert!(Version::parse("v1.2.3").is_err());
        assert!(Version::parse("1.02.3").is_err());
        assert!(Version::parse("1.2.3-01").is_err());
        assert!(Version::parse("1.2.3-alpha..1").is_err());
        assert!(Version::parse("").is_err());
    }

    #[test]
    fn test_version_parse_lenient() {
        assert_eq!(
            Version::parse_lenient("v1.2.3", None).unwrap(),
            Version::new(1, 2, 3)
        );
        assert_eq!(
            Version::parse_lenient("V1.2.3", None).unwrap(),
            Version::new(1, 2, 3)
        );
        assert_eq!(
            Version::parse_lenient("  1.2.3 ", None).unwrap(),
            Version::new(1, 2, 3)
        );
        assert_eq!(
            Version::parse_lenient("rel-1.2.3", Some("rel-")).unwrap(),
            Version::new(1, 2, 3)
        );
    }

    #[test]
    fn test_version_display_roundtrip() {
        for s in ["1.2.3", "1.2.3-alpha.1", "1.2.3-alpha.1+b.2", "0.0.0"] {
            assert_eq!(Version::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_version_precedence() {
        let ordered = [
            "1.0.0-alpha",
            "1.0.0-alpha.1",
            "1.0.0-alpha.beta",
            "1.0.0-beta",
            "1.0.0-beta.2",
            "1.0.0-beta.11",
            "1.0.0-rc.1",
            "1.0.0",
            "2.0.0",
        ];
        for pair in ordered.windows(2) {
            let a = Version::parse(pair[0]).unwrap();
            let b = Version::parse(pair[1]).unwrap();
            assert!(a < b, "{} should be lower than {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_version_equality_ignores_build() {
        let a = Version::parse("1.2.3+build.1").unwrap();
        let b = Version::parse("1.2.3+other").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn test_version_bump_core() {
        let v = Version::parse("1.2.3-alpha.1").unwrap();
        assert_eq!(v.bump(&BumpComponent::Major).to_string(), "2.0.0");
        assert_eq!(v.bump(&BumpComponent::Minor).to_string(), "1.3.0");
        assert_eq!(v.bump(&BumpComponent::Patch).to_string(), "1.2.4");
    }

    #[test]
    fn test_version_bump_named_existing() {
        let v = Version::parse("1.2.3-alpha.1").unwrap();
        let bumped = v.bump(&BumpComponent::Named("alpha".into()));
        assert_eq!(bumped.to_string(), "1.2.3-alpha.2");
    }

    #[test]
    fn test_version_bump_named_without_tail() {
        let v = Version::parse("1.2.3-alpha").unwrap();
        let bumped = v.bump(&BumpComponent::Named("alpha".into()));
        assert_eq!(bumped.to_string(), "1.2.3-alpha.1");
    }

    #[test]
    fn test_version_bump_named_missing() {
        let v = Version::parse("1.2.3").unwrap();
        let bumped = v.bump(&BumpComponent::Named("beta".into()));
        assert_eq!(bumped.to_string(), "1.2.3-beta.1");
    }

    #[test]
    fn test_with_prerelease_qualifier() {
        let v = Version::parse("1.3.0").unwrap();
        let q = v.with_prerelease_qualifier("alpha").unwrap();
        assert_eq!(q.to_string(), "1.3.0-alpha");
        assert_eq!(q.prerelease_qualifier().as_deref(), Some("alpha"));
    }

    #[test]
    fn test_with_prerelease_ordinal() {
        let v = Version::parse("1.3.0-alpha").unwrap();
        assert_eq!(v.with_prerelease_ordinal(1).to_string(), "1.3.0-alpha.1");
        let v2 = Version::parse("1.3.0-alpha.3").unwrap();
        assert_eq!(v2.with_prerelease_ordinal(4).to_string(), "1.3.0-alpha.4");
    }

    #[test]
    fn test_with_identifier_prerelease() {
        let v = Version::parse("1.2.3").unwrap();
        let decorated = v
            .with_identifier(IdentifierPosition::PreRelease, "build", Some("123"))
            .unwrap();
        assert_eq!(decorated.to_string(), "1.2.3-build.123");
    }

    #[test]
    fn test_with_identifier_dedup() {
        let v = Version::parse("1.2.3-build.1").unwrap();
        let decorated = v
            .with_identifier(IdentifierPosition::PreRelease, "build", Some("2"))
            .unwrap();
        assert_eq!(decorated.to_string(), "1.2.3-build.2");
    }

    #[test]
    fn test_with_identifier_build_slot() {
        let v = Version::parse("1.2.3").unwrap();
        let decorated = v
            .with_identifier(IdentifierPosition::Build, "sha", Some("abc1234"))
            .unwrap();
        assert_eq!(decorated.to_string(), "1.2.3+sha.abc1234");
    }

    #[test]
    fn test_prerelease_ordinal() {
        assert_eq!(
            Version::parse("1.2.3-alpha.7").unwrap().prerelease_ordinal(),
            Some(7)
        );
        assert_eq!(
            Version::parse("1.2.3-alpha").unwrap().prerelease_ordinal(),
            None
        );
        assert_eq!(Version::parse("1.2.3").unwrap().prerelease_ordinal(), None);
    }

    #[test]
    fn test_in_range() {
        let v = Version::parse("1.4.1-rel").unwrap();
        let re = regex::Regex::new(r"^1\.4\.").unwrap();
        assert!(v.in_range(&re));
        let v2 = Version::parse("1.5.0").unwrap();
        assert!(!v2.in_range(&re));
    }

    #[test]
    fn test_bump_component_from_str() {
        assert_eq!("major".parse::<BumpComponent>().unwrap(), BumpComponent::Major);
        assert_eq!("Minor".parse::<BumpComponent>().unwrap(), BumpComponent::Minor);
        assert_eq!("patch".parse::<BumpComponent>().unwrap(), BumpComponent::Patch);
        assert_eq!(
            "alpha".parse::<BumpComponent>().unwrap(),
            BumpComponent::Named("alpha".into())
        );
        assert!("not valid!".parse::<BumpComponent>().is_err());
    }

    #[test]
    fn test_bump_component_max() {
        let minor = BumpComponent::Minor;
        assert_eq!(minor.clone().max(BumpComponent::Major), BumpComponent::Major);
        assert_eq!(minor.clone().max(BumpComponent::Patch), BumpComponent::Minor);
    }

    #[test]
    fn test_version_serde_as_string() {
        let v = Version::parse("1.2.3-alpha.1").unwrap();
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"1.2.3-alpha.1\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_scheme_parse() {
        assert_eq!("semver".parse::<Scheme>().unwrap(), Scheme::Semver);
        assert!("calver".parse::<Scheme>().is_err());
    }
}
