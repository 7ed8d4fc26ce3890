//! Pure version-resolution rules, kept free of I/O.

use crate::{Origin, VersionInfo, VersionListing, compare_versions, satisfies};
use std::collections::BTreeMap;

/// Candidate versions of one package and where each one comes from.
pub type VersionOrigins = BTreeMap<String, Origin>;

/// A source's listing for one package, tagged with the source identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteListing {
    pub source_id: String,
    pub versions: VersionListing,
}

impl RemoteListing {
    pub fn new<S: Into<String>>(source_id: S, versions: VersionListing) -> Self {
        Self {
            source_id: source_id.into(),
            versions,
        }
    }
}

/// Merges local versions with remote listings.
///
/// `local` maps each installed version to its published metadata, if any.
/// Rules, applied per remote in registration order:
/// * a version missing locally is attributed to the first remote offering it;
/// * a local version whose published metadata disagrees with a remote's
///   declared size or hash is attributed to that remote (first one wins);
/// * a local version without published metadata, or a remote entry without
///   both size and hash, stays local.
pub fn merge_origins(
    local: &BTreeMap<String, Option<VersionInfo>>,
    remotes: &[RemoteListing],
) -> VersionOrigins {
    let mut origins: VersionOrigins = local
        .keys()
        .map(|version| (version.clone(), Origin::Local))
        .collect();

    for remote in remotes {
        for (version, remote_info) in &remote.versions {
            match origins.get(version) {
                None => {
                    origins.insert(version.clone(), Origin::Remote(remote.source_id.clone()));
                }
                Some(Origin::Local) => {
                    let local_info = local.get(version).and_then(Option::as_ref);
                    if let Some(local_info) = local_info {
                        if remote_info.is_verifiable() && !remote_info.same_content(local_info) {
                            origins
                                .insert(version.clone(), Origin::Remote(remote.source_id.clone()));
                        }
                    }
                }
                Some(Origin::Remote(_)) => {}
            }
        }
    }

    origins
}

/// Highest version equal to or satisfying `pattern`.
pub fn select_best<'a>(origins: &'a VersionOrigins, pattern: &str) -> Option<(&'a str, &'a Origin)> {
    origins
        .iter()
        .filter(|(version, _)| satisfies(version, pattern))
        .max_by(|(a, _), (b, _)| compare_versions(a, b))
        .map(|(version, origin)| (version.as_str(), origin))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(entries: &[(&str, u64, &str)]) -> VersionListing {
        entries
            .iter()
            .map(|(v, size, hash)| (v.to_string(), VersionInfo::new(*size, *hash)))
            .collect()
    }

    fn local(entries: &[(&str, Option<VersionInfo>)]) -> BTreeMap<String, Option<VersionInfo>> {
        entries
            .iter()
            .map(|(v, info)| (v.to_string(), info.clone()))
            .collect()
    }

    #[test]
    fn test_remote_only_versions_added() {
        let local = local(&[("1.0.0", None), ("1.2.0", None)]);
        let remotes = [RemoteListing::new("central", listing(&[("1.3.0", 1, "aa")]))];

        let origins = merge_origins(&local, &remotes);

        assert_eq!(origins["1.0.0"], Origin::Local);
        assert_eq!(origins["1.3.0"], Origin::Remote("central".into()));
    }

    #[test]
    fn test_changed_remote_content_overrides_local() {
        let local = local(&[
            ("1.0.0", Some(VersionInfo::new(10, "old"))),
            ("1.1.0", Some(VersionInfo::new(20, "same"))),
            ("1.2.0", None),
        ]);
        let remotes = [RemoteListing::new(
            "central",
            listing(&[("1.0.0", 10, "new"), ("1.1.0", 20, "same"), ("1.2.0", 5, "zz")]),
        )];

        let origins = merge_origins(&local, &remotes);

        assert_eq!(origins["1.0.0"], Origin::Remote("central".into()));
        assert_eq!(origins["1.1.0"], Origin::Local);
        assert_eq!(origins["1.2.0"], Origin::Local);
    }

    #[test]
    fn test_first_source_wins() {
        let remotes = [
            RemoteListing::new("a", listing(&[("2.0.0", 1, "x")])),
            RemoteListing::new("b", listing(&[("2.0.0", 1, "x"), ("2.1.0", 1, "y")])),
        ];

        let origins = merge_origins(&BTreeMap::new(), &remotes);

        assert_eq!(origins["2.0.0"], Origin::Remote("a".into()));
        assert_eq!(origins["2.1.0"], Origin::Remote("b".into()));
    }

    #[test]
    fn test_select_best_picks_highest_match() {
        let mut origins = VersionOrigins::new();
        origins.insert("1.0.0".into(), Origin::Local);
        origins.insert("1.2.0".into(), Origin::Local);
        origins.insert("1.3.0".into(), Origin::Remote("central".into()));
        origins.insert("2.0.0".into(), Origin::Local);

        let (version, origin) = select_best(&origins, "^1.0.0").unwrap();
        assert_eq!(version, "1.3.0");
        assert_eq!(origin, &Origin::Remote("central".into()));

        assert_eq!(select_best(&origins, "1.0.0").unwrap().0, "1.0.0");
        assert!(select_best(&origins, "^3.0.0").is_none());
    }

    #[test]
    fn test_select_best_is_deterministic() {
        let mut origins = VersionOrigins::new();
        for v in ["0.9.0", "1.0.0-rc.1", "1.0.0", "nightly"] {
            origins.insert(v.into(), Origin::Local);
        }

        for _ in 0..10 {
            assert_eq!(select_best(&origins, "*").unwrap().0, "1.0.0");
        }
        assert_eq!(select_best(&origins, "nightly").unwrap().0, "nightly");
    }
}
