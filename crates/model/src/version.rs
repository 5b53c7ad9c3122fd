use regex::Regex;
use std::sync::OnceLock;

pub use semver::Version;

static FILENAME_VERSION: OnceLock<Regex> = OnceLock::new();
static LOOSE_VERSION: OnceLock<Regex> = OnceLock::new();

fn filename_version() -> &'static Regex {
    FILENAME_VERSION.get_or_init(|| {
        Regex::new(
            r"^.*-([0-9]+\.[0-9]+\.[0-9]+(?:-[a-zA-Z0-9]+)?(?:\+[a-zA-Z0-9]+)?).*\.[A-Za-z0-9]+$",
        )
        .expect("valid filename version regex")
    })
}

fn loose_version() -> &'static Regex {
    LOOSE_VERSION.get_or_init(|| {
        Regex::new(r"^([0-9]+)(?:\.([0-9]+))?(?:\.([0-9]+))?(.*)$")
            .expect("valid loose version regex")
    })
}

pub fn zero() -> Version {
    Version::new(0, 0, 0)
}

/// Parses a declared version string.
///
/// Strict semver is tried first. Otherwise up to three leading numeric
/// components are taken and missing ones padded with zero, so `1.7` reads as
/// `1.7.0`. A suffix that forms a valid pre-release or build tag is kept.
pub fn parse_lenient(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let s = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if let Ok(v) = Version::parse(s) {
        return Some(v);
    }
    let caps = loose_version().captures(s)?;
    let part = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    let (major, minor, patch) = (part(1)?, part(2)?, part(3)?);
    let rest = caps.get(4).map(|m| m.as_str()).unwrap_or("");
    if !rest.is_empty() {
        if let Ok(v) = Version::parse(&format!("{major}.{minor}.{patch}{rest}")) {
            return Some(v);
        }
    }
    Some(Version::new(major, minor, patch))
}

/// Extracts `<major>.<minor>.<patch>[-pre][+build]` following the last
/// dash that precedes a version in an archive file name.
pub fn version_from_filename(file_name: &str) -> Option<Version> {
    let caps = filename_version().captures(file_name)?;
    Version::parse(caps.get(1)?.as_str()).ok()
}

/// Picks a candidate version: the first parseable declared value wins, then
/// the file name, then `0.0.0`.
pub fn guess_version<'a, I>(declared: I, file_name: &str) -> Version
where
    I: IntoIterator<Item = &'a str>,
{
    declared
        .into_iter()
        .find_map(parse_lenient)
        .or_else(|| version_from_filename(file_name))
        .unwrap_or_else(zero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_fallback() {
        assert_eq!(guess_version(std::iter::empty::<&str>(), "name-1.2.3.jar"), Version::new(1, 2, 3));
        assert_eq!(guess_version(std::iter::empty::<&str>(), "name.jar"), zero());
        assert_eq!(
            version_from_filename("core-lib-2.0.1-beta.jar").unwrap().to_string(),
            "2.0.1-beta"
        );
        assert_eq!(
            version_from_filename("thing-1.7.10-10.13.4.jar").unwrap(),
            Version::new(10, 13, 4)
        );
    }

    #[test]
    fn declared_value_beats_filename() {
        assert_eq!(
            guess_version(["garbage", "3.1"], "name-1.2.3.jar"),
            Version::new(3, 1, 0)
        );
    }

    #[test]
    fn lenient_parsing() {
        assert_eq!(parse_lenient("v2"), Some(Version::new(2, 0, 0)));
        assert_eq!(parse_lenient("1.2.3.4"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_lenient("1.0-rc1").unwrap().to_string(), "1.0.0-rc1");
        assert_eq!(parse_lenient("${version}"), None);
        assert_eq!(parse_lenient(""), None);
    }
}
