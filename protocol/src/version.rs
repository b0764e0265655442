//! Version metadata reported by the remote version registry.

use std::collections::BTreeMap;

use semver::Version;
use serde::{Deserialize, Serialize};

/// An endpoint's version state as last reported by the registry.
///
/// `current` is the version actually deployed on the endpoint and gates
/// which request shapes the client may use against it. `release` is the
/// newest version published for that module kind; `current < release` means
/// an upgrade is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMetadata {
    pub current: Version,
    pub release: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_info: Option<PackageInfo>,
}

impl VersionMetadata {
    pub fn upgrade_available(&self) -> bool {
        self.release > self.current
    }
}

/// Structured build metadata shipped alongside a module version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metadata(current: &str, release: &str) -> VersionMetadata {
        VersionMetadata {
            current: Version::parse(current).expect("current"),
            release: Version::parse(release).expect("release"),
            package_info: None,
        }
    }

    #[test]
    fn upgrade_available_compares_semver() {
        assert!(metadata("0.0.21", "0.0.22").upgrade_available());
        assert!(!metadata("0.0.22", "0.0.22").upgrade_available());
        // Pre-releases sort below their release.
        assert!(metadata("1.0.0-rc.1", "1.0.0").upgrade_available());
    }

    #[test]
    fn package_info_is_optional_on_the_wire() {
        let raw = r#"{"current":"0.1.0","release":"0.2.0"}"#;
        let parsed: VersionMetadata = serde_json::from_str(raw).expect("parse");
        assert_eq!(metadata("0.1.0", "0.2.0"), parsed);
        let out = serde_json::to_string(&parsed).expect("serialize");
        assert!(!out.contains("packageInfo"));
    }
}
