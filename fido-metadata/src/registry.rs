//! The identifier-keyed registry built from decoded metadata entries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::blob::MetadataEntry;
use crate::error::EntryError;

/// A SHA-1 subject key identifier, the identity a FIDO-U2F attestation
/// certificate is known by in the metadata service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectKeyId(pub [u8; 20]);

impl FromStr for SubjectKeyId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| ())?;
        let bytes: [u8; 20] = bytes.try_into().map_err(|_| ())?;
        Ok(SubjectKeyId(bytes))
    }
}

impl fmt::Display for SubjectKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for SubjectKeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The identity an authenticator model is registered under. FIDO2 devices
/// carry an AAGUID in their attested credential data; U2F devices are
/// identified by the SHA-1 subject key identifier of their attestation
/// certificate. Exactly one variant applies per credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuthenticatorIdentifier {
    /// A FIDO2 device model id.
    Aaguid(Uuid),
    /// A U2F attestation certificate key id.
    SubjectKeyIdentifier(SubjectKeyId),
}

impl fmt::Display for AuthenticatorIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticatorIdentifier::Aaguid(uuid) => write!(f, "aaguid {}", uuid),
            AuthenticatorIdentifier::SubjectKeyIdentifier(ski) => write!(f, "ski {}", ski),
        }
    }
}

/// An entry index that failed to decode, carried alongside whatever did
/// decode so callers can choose between rejecting the blob and installing
/// the partial registry.
#[derive(Debug)]
pub struct EntryFailure {
    /// The position of the entry in the payload `entries` array.
    pub index: usize,
    /// Why it was rejected.
    pub error: EntryError,
}

/// An immutable mapping from authenticator identifier to metadata entry.
///
/// Keys are unique - at most one entry per identifier. Lookup is total:
/// unknown identifiers return `None`.
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    entries: BTreeMap<AuthenticatorIdentifier, Arc<MetadataEntry>>,
}

impl MetadataRegistry {
    /// Build a registry from decoded entries. An AAGUID entry inserts one
    /// key; a U2F entry inserts once per subject key identifier. Duplicate
    /// keys are last-writer-wins with a logged warning.
    pub fn build(entries: impl IntoIterator<Item = MetadataEntry>) -> Self {
        let mut map: BTreeMap<AuthenticatorIdentifier, Arc<MetadataEntry>> = BTreeMap::new();

        for entry in entries {
            let entry = Arc::new(entry);
            for id in entry.identifiers.iter() {
                if let Some(previous) = map.insert(*id, entry.clone()) {
                    warn!(%id, replaced = %previous.description, by = %entry.description,
                        "duplicate metadata registry key");
                }
            }
        }

        MetadataRegistry { entries: map }
    }

    /// Look up the metadata entry for an identifier.
    pub fn lookup(&self, id: &AuthenticatorIdentifier) -> Option<&MetadataEntry> {
        self.entries.get(id).map(|arc| arc.as_ref())
    }

    /// Look up by AAGUID.
    pub fn lookup_aaguid(&self, aaguid: Uuid) -> Option<&MetadataEntry> {
        self.lookup(&AuthenticatorIdentifier::Aaguid(aaguid))
    }

    /// Look up by subject key identifier.
    pub fn lookup_key_id(&self, ski: &SubjectKeyId) -> Option<&MetadataEntry> {
        self.lookup(&AuthenticatorIdentifier::SubjectKeyIdentifier(*ski))
    }

    /// The number of identifier keys in the registry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds any entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the registered identifiers and their entries.
    pub fn iter(&self) -> impl Iterator<Item = (&AuthenticatorIdentifier, &MetadataEntry)> {
        self.entries.iter().map(|(k, v)| (k, v.as_ref()))
    }
}

/// The outcome of building a registry over a payload's entries.
///
/// A three-state result keeps partial success explicit: decoded entries are
/// never discarded because a sibling failed, and failures are never hidden
/// by the entries that succeeded.
#[derive(Debug)]
pub enum RegistryBuildOutcome {
    /// Entries existed, and every one of them failed to decode.
    Failed {
        /// The per-entry failures.
        errors: Vec<EntryFailure>,
    },
    /// Every entry decoded cleanly (skipped entries are not failures).
    Complete {
        /// The built registry.
        registry: MetadataRegistry,
    },
    /// Some entries decoded and some failed.
    Partial {
        /// The registry over the entries that decoded.
        registry: MetadataRegistry,
        /// The per-entry failures.
        errors: Vec<EntryFailure>,
    },
}

impl RegistryBuildOutcome {
    pub(crate) fn assemble(entries: Vec<MetadataEntry>, errors: Vec<EntryFailure>) -> Self {
        if errors.is_empty() {
            RegistryBuildOutcome::Complete {
                registry: MetadataRegistry::build(entries),
            }
        } else if entries.is_empty() {
            RegistryBuildOutcome::Failed { errors }
        } else {
            RegistryBuildOutcome::Partial {
                registry: MetadataRegistry::build(entries),
                errors,
            }
        }
    }

    /// The registry, if any entries decoded.
    pub fn registry(&self) -> Option<&MetadataRegistry> {
        match self {
            RegistryBuildOutcome::Failed { .. } => None,
            RegistryBuildOutcome::Complete { registry }
            | RegistryBuildOutcome::Partial { registry, .. } => Some(registry),
        }
    }

    /// The per-entry failures, empty on a complete build.
    pub fn errors(&self) -> &[EntryFailure] {
        match self {
            RegistryBuildOutcome::Complete { .. } => &[],
            RegistryBuildOutcome::Failed { errors }
            | RegistryBuildOutcome::Partial { errors, .. } => errors,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::blob::WebauthnAttestationType;

    fn entry(description: &str, identifiers: Vec<AuthenticatorIdentifier>) -> MetadataEntry {
        MetadataEntry {
            identifiers,
            description: description.to_string(),
            attestation_root_certificates: Vec::new(),
            attestation_types: vec![WebauthnAttestationType::BasicFull],
            user_verification_details: Vec::new(),
            key_protection: Vec::new(),
            matcher_protection: Vec::new(),
            status_reports: Vec::new(),
            icon: None,
        }
    }

    #[test]
    fn u2f_entries_key_once_per_ski() {
        let ski_a = "923881fe2f214ee465484371aeb72e97f5a58e0a"
            .parse::<SubjectKeyId>()
            .unwrap();
        let ski_b = "3d4bc73f334e1b966b89b5a1cfa2c1f6620c1fd5"
            .parse::<SubjectKeyId>()
            .unwrap();

        let registry = MetadataRegistry::build(vec![entry(
            "u2f",
            vec![
                AuthenticatorIdentifier::SubjectKeyIdentifier(ski_a),
                AuthenticatorIdentifier::SubjectKeyIdentifier(ski_b),
            ],
        )]);

        assert_eq!(registry.len(), 2);
        assert!(registry.lookup_key_id(&ski_a).is_some());
        assert!(registry.lookup_key_id(&ski_b).is_some());
    }

    #[test]
    fn duplicate_keys_are_last_writer_wins() {
        let aaguid = Uuid::parse_str("2fc0579f-8113-47ea-b116-bb5a8db9202a").unwrap();
        let id = AuthenticatorIdentifier::Aaguid(aaguid);

        let registry =
            MetadataRegistry::build(vec![entry("first", vec![id]), entry("second", vec![id])]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(&id).unwrap().description, "second");
    }

    #[test]
    fn lookup_is_total() {
        let registry = MetadataRegistry::default();
        let aaguid = Uuid::parse_str("2fc0579f-8113-47ea-b116-bb5a8db9202a").unwrap();
        assert!(registry.lookup_aaguid(aaguid).is_none());
    }

    #[test]
    fn outcome_states() {
        let aaguid = Uuid::parse_str("2fc0579f-8113-47ea-b116-bb5a8db9202a").unwrap();
        let good = entry("ok", vec![AuthenticatorIdentifier::Aaguid(aaguid)]);
        let fail = || EntryFailure {
            index: 0,
            error: crate::error::EntryError::SchemaVersion(2),
        };

        assert!(matches!(
            RegistryBuildOutcome::assemble(vec![good.clone()], Vec::new()),
            RegistryBuildOutcome::Complete { .. }
        ));
        assert!(matches!(
            RegistryBuildOutcome::assemble(Vec::new(), vec![fail()]),
            RegistryBuildOutcome::Failed { .. }
        ));
        assert!(matches!(
            RegistryBuildOutcome::assemble(vec![good], vec![fail()]),
            RegistryBuildOutcome::Partial { .. }
        ));
    }
}
