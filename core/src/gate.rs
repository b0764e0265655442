//! Version-based feature gating.

use deck_protocol::{EndpointId, VersionMetadata};
use semver::Version;

use crate::store::{CertifiedStore, EntryState};

/// Whether `endpoint` is known to run at least `required`.
///
/// Pure and synchronous against already-loaded state; never triggers a
/// fetch. When no version metadata has been loaded for the endpoint the
/// gate fails open: a missing version record is a race, not an error, and
/// must not permanently block newly added functionality.
pub fn is_feature_supported(
    versions: &CertifiedStore<VersionMetadata>,
    endpoint: &EndpointId,
    required: &Version,
) -> bool {
    match versions.get(endpoint) {
        EntryState::Loaded(entry) => match entry.data() {
            Some(metadata) => metadata.current >= *required,
            None => true,
        },
        EntryState::Unknown | EntryState::Empty => true,
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn metadata(current: &str) -> VersionMetadata {
        VersionMetadata {
            current: Version::parse(current).expect("current"),
            release: Version::parse(current).expect("release"),
            package_info: None,
        }
    }

    fn required(v: &str) -> Version {
        Version::parse(v).expect("required")
    }

    #[test]
    fn fails_open_for_unknown_endpoint() {
        let versions = CertifiedStore::new();
        assert!(is_feature_supported(
            &versions,
            &EndpointId::from("unknown"),
            &required("1.0.0"),
        ));
    }

    #[test]
    fn fails_open_for_tried_and_empty_entry() {
        let versions = CertifiedStore::new();
        versions.reset(&EndpointId::from("e1"));
        assert!(is_feature_supported(
            &versions,
            &EndpointId::from("e1"),
            &required("1.0.0"),
        ));
    }

    #[test]
    fn compares_loaded_versions() {
        let versions = CertifiedStore::new();
        let e1 = EndpointId::from("e1");
        versions.apply(&e1, metadata("0.0.21"), false);

        assert!(is_feature_supported(&versions, &e1, &required("0.0.21")));
        assert!(is_feature_supported(&versions, &e1, &required("0.0.20")));
        assert!(!is_feature_supported(&versions, &e1, &required("0.0.22")));
    }

    #[test]
    fn prerelease_current_does_not_satisfy_its_release() {
        let versions = CertifiedStore::new();
        let e1 = EndpointId::from("e1");
        versions.apply(&e1, metadata("1.0.0-rc.1"), true);
        assert!(!is_feature_supported(&versions, &e1, &required("1.0.0")));
    }
}
