//! Ownership and release markers
//!
//! Every resource kubedrop creates carries [`OWNER_LABEL`]`=`[`OWNER_VALUE`].
//! Mutating or deleting a same-named resource without that marker is refused,
//! so kubedrop never adopts objects it did not create.
//!
//! Workloads and network exposures additionally carry [`RELEASE_LABEL`], set
//! to the [`ReleaseId`] of the invocation that last applied them.

use std::collections::BTreeMap;

use crate::release::ReleaseId;

/// Label key marking a resource as created by kubedrop
pub const OWNER_LABEL: &str = "kubedrop.io/created-by";

/// Value of [`OWNER_LABEL`] on resources kubedrop owns
pub const OWNER_VALUE: &str = "kubedrop";

/// Label key holding the release identifier of the last provisioning run
pub const RELEASE_LABEL: &str = "kubedrop.io/release";

/// Selector label shared by the workload, its pods and the service
pub const APP_LABEL: &str = "app";

/// Check whether a label set carries our owner marker
#[must_use]
pub fn is_owned_by_us(labels: Option<&BTreeMap<String, String>>) -> bool {
    labels
        .and_then(|labels| labels.get(OWNER_LABEL))
        .map(String::as_str)
        == Some(OWNER_VALUE)
}

/// Labels applied to every managed resource
#[must_use]
pub fn owner_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(OWNER_LABEL.to_string(), OWNER_VALUE.to_string())])
}

/// Owner labels plus the release marker
#[must_use]
pub fn release_labels(release: &ReleaseId) -> BTreeMap<String, String> {
    let mut labels = owner_labels();
    labels.insert(RELEASE_LABEL.to_string(), release.to_string());
    labels
}

/// Label selector matching instances of one release
#[must_use]
pub fn release_selector(release: &ReleaseId) -> String {
    format!("{}={}", RELEASE_LABEL, release)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_with_marker() {
        let labels = owner_labels();
        assert!(is_owned_by_us(Some(&labels)));
    }

    #[test]
    fn test_not_owned_without_labels() {
        assert!(!is_owned_by_us(None));
        assert!(!is_owned_by_us(Some(&BTreeMap::new())));
    }

    #[test]
    fn test_not_owned_with_foreign_value() {
        let labels = BTreeMap::from([(OWNER_LABEL.to_string(), "helm".to_string())]);
        assert!(!is_owned_by_us(Some(&labels)));
    }

    #[test]
    fn test_release_labels_keep_owner_marker() {
        let release = ReleaseId::from("abc123defg");
        let labels = release_labels(&release);

        assert!(is_owned_by_us(Some(&labels)));
        assert_eq!(labels.get(RELEASE_LABEL).map(String::as_str), Some("abc123defg"));
    }

    #[test]
    fn test_release_selector() {
        let release = ReleaseId::from("abc123defg");
        assert_eq!(release_selector(&release), "kubedrop.io/release=abc123defg");
    }
}
