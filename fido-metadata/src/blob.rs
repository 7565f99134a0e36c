//! Types for the MDS blob payload and the per-entry decoder.
//!
//! Payload entries are decoded individually: a malformed entry is reported
//! without failing its siblings, and an entry whose attestation types have
//! no webauthn equivalent is silently skipped.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::engine::GeneralPurpose;
use base64::Engine;
use openssl::x509::X509;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::EntryError;
use crate::registry::{AuthenticatorIdentifier, SubjectKeyId};

// The metadata specification defines certificates and icons as base64, but
// published values have been observed with leading/trailing whitespace and
// mixed padding. Decode forgivingly across the RFC 4648 variants.
static LENIENT_DECODERS: &[GeneralPurpose] =
    &[STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD];

fn lenient_base64(value: &str) -> Option<Vec<u8>> {
    let trimmed = value.trim();
    LENIENT_DECODERS
        .iter()
        .find_map(|engine| engine.decode(trimmed).ok())
}

/// The decoded MDS payload, before per-entry processing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MetadataBlobPayload {
    pub legal_header: Option<String>,
    pub no: u32,
    pub next_update: String,
    pub entries: Vec<serde_json::Value>,
}

/// User Verification Methods
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserVerificationMethod {
    /// None
    None,
    /// All. MUST NOT APPEAR IN ANY UVM.
    All,
    /// presence_internal
    PresenceInternal,
    /// passcode_internal
    PasscodeInternal,
    /// passcode_external
    PasscodeExternal,
    /// fingerprint_internal
    FingerprintInternal,
    /// handprint_internal
    HandprintInternal,
    /// eyeprint_internal
    EyeprintInternal,
    /// pattern_internal
    PatternInternal,
    /// voiceprint_internal
    VoiceprintInternal,
    /// location_internal
    LocationInternal,
    /// faceprint_internal
    FaceprintInternal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VerificationMethodAndCombinations {
    pub user_verification_method: UserVerificationMethod,
    // Accuracy descriptors are carried opaquely - their schemas drift and
    // nothing in the verification core consumes them.
    #[serde(default)]
    #[allow(unused)]
    pub ca_desc: Option<serde_json::Value>,
    #[serde(default)]
    #[allow(unused)]
    pub ba_desc: Option<serde_json::Value>,
    #[serde(default)]
    #[allow(unused)]
    pub pa_desc: Option<serde_json::Value>,
}

/// A type of attestation as listed in a metadata statement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttestationType {
    /// basic_full
    BasicFull,
    /// basic_surrogate, aka self attestation
    BasicSurrogate,
    /// ecdaa
    Ecdaa,
    /// attca
    #[serde(rename = "attca")]
    AttCa,
    /// anonca
    #[serde(rename = "anonca")]
    AnonCa,
    /// none
    None,
}

/// The subset of attestation types that map to webauthn trust chains. An
/// entry supporting neither is of no use to a relying party and is skipped
/// during registry construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WebauthnAttestationType {
    /// The authenticator ships a dedicated attestation key signed by the
    /// vendor root.
    BasicFull,
    /// The authenticator defers to an attestation CA to issue per-device
    /// keys.
    AttCa,
}

/// The class of key protection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeyProtection {
    /// The key is stored in hardware. This is exclusive to `software`
    Hardware,
    /// Secure Element
    SecureElement,
    /// The private key is stored in a key-wrapped-key. This can still be
    /// "hardware" backed where the KWK can only be decrypted by a specific
    /// device's hardware.
    RemoteHandle,
    /// Trusted Execution Environment.
    Tee,
    /// The key is stored in software. This is exclusive to `hardware`
    Software,
}

/// Where the user verification matcher runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatcherProtection {
    /// on_chip
    OnChip,
    /// tee
    Tee,
    /// software
    Software,
}

/// The fido certification status of the device associated to this aaguid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthenticatorStatus {
    /// The device is NOT fido certified
    #[serde(rename = "NOT_FIDO_CERTIFIED")]
    NotFidoCertified,
    /// The device is fido certified.
    #[serde(rename = "FIDO_CERTIFIED")]
    FidoCertified,
    /// Indicates that malware is able to bypass the user verification.
    #[serde(rename = "USER_VERIFICATION_BYPASS")]
    UserVerificationBypass,
    /// Indicates that an attestation key for this authenticator is known to
    /// be compromised.
    #[serde(rename = "ATTESTATION_KEY_COMPROMISE")]
    AttestationKeyCompromise,
    /// This authenticator has identified weaknesses that allow registered
    /// keys to be compromised and should not be trusted.
    #[serde(rename = "USER_KEY_REMOTE_COMPROMISE")]
    UserKeyRemoteCompromise,
    /// This authenticator has known weaknesses in its key protection
    /// mechanism(s) that allow user keys to be extracted by an adversary in
    /// physical possession of the device.
    #[serde(rename = "USER_KEY_PHYSICAL_COMPROMISE")]
    UserKeyPhysicalCompromise,
    /// A software or firmware update is available for the device.
    #[serde(rename = "UPDATE_AVAILABLE")]
    UpdateAvailable,
    /// The FIDO Alliance has determined that this authenticator should not
    /// be trusted for any reason.
    #[serde(rename = "REVOKED")]
    Revoked,
    /// The authenticator vendor has completed and submitted the
    /// self-certification checklist to the FIDO Alliance.
    #[serde(rename = "SELF_ASSERTION_SUBMITTED")]
    SelfAssertionSubmitted,
    /// This device is certified at level 1
    #[serde(rename = "FIDO_CERTIFIED_L1")]
    FidoCertifiedL1,
    /// This device is certified at level 1 plus
    #[serde(rename = "FIDO_CERTIFIED_L1plus")]
    FidoCertifiedL1Plus,
    /// This device is certified at level 2
    #[serde(rename = "FIDO_CERTIFIED_L2")]
    FidoCertifiedL2,
    /// This device is certified at level 2 plus
    #[serde(rename = "FIDO_CERTIFIED_L2plus")]
    FidoCertifiedL2Plus,
    /// This device is certified at level 3
    #[serde(rename = "FIDO_CERTIFIED_L3")]
    FidoCertifiedL3,
    /// This device is certified at level 3 plus
    #[serde(rename = "FIDO_CERTIFIED_L3plus")]
    FidoCertifiedL3Plus,
}

/// Contains an AuthenticatorStatus and additional data associated with it,
/// if any. The latest StatusReport entry MUST reflect the "current" status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// The status of the authenticator.
    pub status: AuthenticatorStatus,
    /// ISO-8601 formatted date since when the status code was set, if
    /// applicable. If no date is given, the status is assumed to be
    /// effective while present.
    #[serde(default)]
    pub effective_date: Option<String>,
    /// The authenticatorVersion that this status report relates to.
    #[serde(default)]
    pub authenticator_version: Option<u32>,
    /// HTTPS URL where additional information may be found related to the
    /// current status, if applicable.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataStatement {
    description: String,
    #[serde(default)]
    aaguid: Option<Uuid>,
    #[serde(default)]
    attestation_certificate_key_identifiers: Option<Vec<String>>,
    /// Version of this structure. Must be 3.
    schema: u16,
    attestation_types: Vec<AttestationType>,
    #[serde(default)]
    user_verification_details: Vec<Vec<VerificationMethodAndCombinations>>,
    #[serde(default)]
    key_protection: Vec<KeyProtection>,
    #[serde(default)]
    matcher_protection: Vec<MatcherProtection>,
    attestation_root_certificates: Vec<String>,
    #[serde(default)]
    icon: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobPayloadEntry {
    #[serde(default)]
    aaguid: Option<Uuid>,
    #[serde(default)]
    attestation_certificate_key_identifiers: Option<Vec<String>>,
    metadata_statement: MetadataStatement,
    status_reports: Vec<StatusReport>,
}

/// A decoded metadata entry - the per-device trust anchor record a relying
/// party consults when classifying attestation chains.
#[derive(Debug, Clone)]
pub struct MetadataEntry {
    /// The identifiers this device model is known by. An AAGUID for FIDO2
    /// devices, one or more subject key identifiers for U2F devices.
    pub identifiers: Vec<AuthenticatorIdentifier>,
    /// A human-readable, short description of the authenticator, in English.
    pub description: String,
    /// The trust anchors attestation chains from this model must verify to.
    pub attestation_root_certificates: Vec<X509>,
    /// The webauthn compatible attestation types this model supports. Never
    /// empty - entries without one are skipped.
    pub attestation_types: Vec<WebauthnAttestationType>,
    /// OR-of-ANDs user verification combinations the device supports.
    pub user_verification_details: Vec<Vec<UserVerificationMethod>>,
    /// The key protection types supported by the authenticator.
    pub key_protection: Vec<KeyProtection>,
    /// Where the verification matcher runs.
    pub matcher_protection: Vec<MatcherProtection>,
    /// Status reports applicable to this authenticator, current last.
    pub status_reports: Vec<StatusReport>,
    /// Decoded PNG icon bytes, if the entry carried a well-formed data url.
    pub icon: Option<Vec<u8>>,
}

impl fmt::Display for MetadataEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

/// Decode every payload entry, separating successes from failures. A
/// malformed entry never poisons its siblings.
pub(crate) fn decode_entries(
    raw_entries: &[serde_json::Value],
) -> (Vec<MetadataEntry>, Vec<crate::registry::EntryFailure>) {
    let mut entries = Vec::with_capacity(raw_entries.len());
    let mut failures = Vec::new();

    for (index, raw) in raw_entries.iter().enumerate() {
        match decode_entry(raw) {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => {
                // No webauthn compatible attestation type. Not an error.
                trace!(index, "skipping non-webauthn metadata entry");
            }
            Err(error) => {
                warn!(index, %error, "rejecting metadata entry");
                failures.push(crate::registry::EntryFailure { index, error });
            }
        }
    }

    (entries, failures)
}

/// Decode one payload entry.
///
/// Three-state outcome: `Ok(Some(_))` decoded, `Ok(None)` skipped because
/// the entry asserts no webauthn compatible attestation type, `Err(_)` the
/// entry is malformed.
pub(crate) fn decode_entry(raw: &serde_json::Value) -> Result<Option<MetadataEntry>, EntryError> {
    let entry: BlobPayloadEntry =
        serde_json::from_value(raw.clone()).map_err(EntryError::Json)?;

    let statement = &entry.metadata_statement;

    if statement.schema != 3 {
        return Err(EntryError::SchemaVersion(statement.schema));
    }

    let attestation_types: Vec<WebauthnAttestationType> = statement
        .attestation_types
        .iter()
        .filter_map(|at| match at {
            AttestationType::BasicFull => Some(WebauthnAttestationType::BasicFull),
            AttestationType::AttCa => Some(WebauthnAttestationType::AttCa),
            _ => None,
        })
        .collect();

    if attestation_types.is_empty() {
        // Surrogate-only (or uaf-era) entries can never anchor a webauthn
        // attestation chain. Skip, not error.
        return Ok(None);
    }

    let identifiers = derive_identifiers(&entry)?;

    let attestation_root_certificates = statement
        .attestation_root_certificates
        .iter()
        .map(|b64_cert| {
            lenient_base64(b64_cert)
                .and_then(|der| X509::from_der(&der).ok())
                .ok_or(EntryError::CertificateDecode)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let icon = statement.icon.as_deref().and_then(decode_icon);

    let user_verification_details = statement
        .user_verification_details
        .iter()
        .map(|and_set| {
            and_set
                .iter()
                .map(|vm| vm.user_verification_method.clone())
                .collect()
        })
        .collect();

    Ok(Some(MetadataEntry {
        identifiers,
        description: statement.description.clone(),
        attestation_root_certificates,
        attestation_types,
        user_verification_details,
        key_protection: statement.key_protection.clone(),
        matcher_protection: statement.matcher_protection.clone(),
        status_reports: entry.status_reports.clone(),
        icon,
    }))
}

fn derive_identifiers(entry: &BlobPayloadEntry) -> Result<Vec<AuthenticatorIdentifier>, EntryError> {
    let statement = &entry.metadata_statement;

    if let Some(aaguid) = entry.aaguid.or(statement.aaguid) {
        return Ok(vec![AuthenticatorIdentifier::Aaguid(aaguid)]);
    }

    let key_ids = entry
        .attestation_certificate_key_identifiers
        .as_ref()
        .or(statement.attestation_certificate_key_identifiers.as_ref())
        .ok_or(EntryError::MissingIdentifier)?;

    if key_ids.is_empty() {
        return Err(EntryError::MissingIdentifier);
    }

    key_ids
        .iter()
        .map(|hex_ski| {
            hex_ski
                .parse::<SubjectKeyId>()
                .map(AuthenticatorIdentifier::SubjectKeyIdentifier)
                .map_err(|_| EntryError::InvalidKeyIdentifier(hex_ski.clone()))
        })
        .collect()
}

fn decode_icon(icon: &str) -> Option<Vec<u8>> {
    let payload = icon.trim().strip_prefix("data:image/png;base64,")?;
    let decoded = lenient_base64(payload);
    if decoded.is_none() {
        debug!("discarding undecodable metadata icon");
    }
    decoded
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;
    use serde_json::json;

    // A real root certificate (GlobalSign R3), single line as published.
    const TEST_ROOT_B64: &str = "MIIDXzCCAkegAwIBAgILBAAAAAABIVhTCKIwDQYJKoZIhvcNAQELBQAwTDEgMB4GA1UECxMXR2xvYmFsU2lnbiBSb290IENBIC0gUjMxEzARBgNVBAoTCkdsb2JhbFNpZ24xEzARBgNVBAMTCkdsb2JhbFNpZ24wHhcNMDkwMzE4MTAwMDAwWhcNMjkwMzE4MTAwMDAwWjBMMSAwHgYDVQQLExdHbG9iYWxTaWduIFJvb3QgQ0EgLSBSMzETMBEGA1UEChMKR2xvYmFsU2lnbjETMBEGA1UEAxMKR2xvYmFsU2lnbjCCASIwDQYJKoZIhvcNAQEBBQADggEPADCCAQoCggEBAMwldpB5BngiFvXAg7aEyiie/QV2EcWtiHL8RgJDx7KKnQRfJMsuS+FggkbhUqsMgUdwbN1k0ev1LKMPgj0MK66X17YUhhB5uzsTgHeMCOFJ0mpiLx9e+pZo34knlTifBtc+ycsmWQ1z3rDI6SYOgxXG71uL0gRgykmmKPZpO/bLyCiR5Z2KYVc3rHQU3HTgOu5yLy6c+9C7v/U9AOEGM+iCK65TpjoWc4zdQQ4gOsC0p6Hpsk+QLjJg6VfLuQSSaGjlOCZgdbKfd/+RFO+uIEn8rUAVSNECMWEZXriX7613t2Saer9fwRPvm2L7DWzgVGkWqQPabumDk3F2xmmFghcCAwEAAaNCMEAwDgYDVR0PAQH/BAQDAgEGMA8GA1UdEwEB/wQFMAMBAf8wHQYDVR0OBBYEFI/wS3+oLkUkrk1Q+mOai97i3Ru8MA0GCSqGSIb3DQEBCwUAA4IBAQBLQNvAUKr+yAzv95ZURUm7lgAJQayzE4aGKAczymvmdLm6AC2upArT9fHxD4q/c2dKg8dEe3jgr25sbwMpjjM5RcOO5LlXbKr8EpbsU8Yt5CRsuZRj+9xTaGdWPoO4zzUhw8lo/s7awlOqzJCK6fBdRoyV3XpYKBovHd7NADdBj+1EbddTKJd+82cEHhXXipa0095MJ6RMG3NzdvQXmcIfeg7jLQitChws/zyrVQ4PkX4268NXSb7hLi18YIvDQVETI53O9zJrlAGomecsMx86OyXShkDOOyyGeMlhLxS67ttVb9+E7gUJTb0o2HLO02JQZR7rkpeDMdmztcpHWD9f";

    fn entry_json(attestation_types: serde_json::Value) -> serde_json::Value {
        // Leading/trailing whitespace on the certificate is deliberate -
        // published blobs have been observed to carry it.
        let padded_cert = format!("  {TEST_ROOT_B64} ");
        json!({
            "aaguid": "2fc0579f-8113-47ea-b116-bb5a8db9202a",
            "metadataStatement": {
                "description": "Example FIDO2 Authenticator",
                "aaguid": "2fc0579f-8113-47ea-b116-bb5a8db9202a",
                "schema": 3,
                "attestationTypes": attestation_types,
                "userVerificationDetails": [
                    [ {"userVerificationMethod": "presence_internal"} ]
                ],
                "keyProtection": ["hardware", "secure_element"],
                "matcherProtection": ["on_chip"],
                "attestationRootCertificates": [ padded_cert ],
            },
            "statusReports": [
                {"status": "FIDO_CERTIFIED_L1", "effectiveDate": "2019-04-01"}
            ],
            "timeOfLastStatusChange": "2019-04-01"
        })
    }

    #[test]
    fn decodes_fido2_entry() {
        let value = entry_json(json!(["basic_full"]));
        let entry = decode_entry(&value).expect("decode failed").expect("skipped");
        assert_eq!(entry.identifiers.len(), 1);
        assert!(matches!(
            entry.identifiers[0],
            AuthenticatorIdentifier::Aaguid(_)
        ));
        assert_eq!(entry.attestation_types, vec![WebauthnAttestationType::BasicFull]);
        assert_eq!(entry.attestation_root_certificates.len(), 1);
        assert_eq!(
            entry.user_verification_details,
            vec![vec![UserVerificationMethod::PresenceInternal]]
        );
    }

    #[test]
    fn surrogate_only_entry_is_skipped_not_errored() {
        let value = entry_json(json!(["basic_surrogate"]));
        assert!(decode_entry(&value).expect("decode failed").is_none());
    }

    #[test]
    fn wrong_schema_version_is_an_error() {
        let mut value = entry_json(json!(["basic_full"]));
        value["metadataStatement"]["schema"] = json!(2);
        assert!(matches!(
            decode_entry(&value),
            Err(EntryError::SchemaVersion(2))
        ));
    }

    #[test]
    fn malformed_entry_is_an_error() {
        let value = json!({ "statusReports": [] });
        assert!(matches!(decode_entry(&value), Err(EntryError::Json(_))));
    }

    #[test]
    fn u2f_entry_keys_by_subject_key_identifier() {
        let value = json!({
            "attestationCertificateKeyIdentifiers": [
                "923881fe2f214ee465484371aeb72e97f5a58e0a",
                "3d4bc73f334e1b966b89b5a1cfa2c1f6620c1fd5"
            ],
            "metadataStatement": {
                "description": "Example U2F Authenticator",
                "attestationCertificateKeyIdentifiers": [
                    "923881fe2f214ee465484371aeb72e97f5a58e0a",
                    "3d4bc73f334e1b966b89b5a1cfa2c1f6620c1fd5"
                ],
                "schema": 3,
                "attestationTypes": ["basic_full"],
                "userVerificationDetails": [
                    [ {"userVerificationMethod": "presence_internal"} ]
                ],
                "keyProtection": ["hardware"],
                "matcherProtection": ["on_chip"],
                "attestationRootCertificates": [ TEST_ROOT_B64 ]
            },
            "statusReports": [ {"status": "NOT_FIDO_CERTIFIED"} ],
            "timeOfLastStatusChange": "2018-05-19"
        });
        let entry = decode_entry(&value).expect("decode failed").expect("skipped");
        assert_eq!(entry.identifiers.len(), 2);
        assert!(entry
            .identifiers
            .iter()
            .all(|id| matches!(id, AuthenticatorIdentifier::SubjectKeyIdentifier(_))));
    }

    #[test]
    fn partial_decode_keeps_good_entries_and_reports_bad_ones() {
        use crate::registry::RegistryBuildOutcome;

        // Fifty entries; two of them carry an unsupported schema version.
        let mut raw_entries = Vec::new();
        for i in 0..50u32 {
            let mut value = entry_json(json!(["basic_full"]));
            let aaguid = format!("{i:08x}-8113-47ea-b116-bb5a8db9202a");
            value["aaguid"] = json!(aaguid);
            value["metadataStatement"]["aaguid"] = json!(aaguid);
            if i == 7 || i == 23 {
                value["metadataStatement"]["schema"] = json!(2);
            }
            raw_entries.push(value);
        }

        let (entries, failures) = decode_entries(&raw_entries);
        assert_eq!(entries.len(), 48);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].index, 7);
        assert_eq!(failures[1].index, 23);

        match RegistryBuildOutcome::assemble(entries, failures) {
            RegistryBuildOutcome::Partial { registry, errors } => {
                assert_eq!(registry.len(), 48);
                assert_eq!(errors.len(), 2);
            }
            other => panic!("expected a partial outcome, got {other:?}"),
        }
    }

    #[test]
    fn bad_key_identifier_is_an_error() {
        let value = json!({
            "attestationCertificateKeyIdentifiers": ["zzzz"],
            "metadataStatement": {
                "description": "Broken",
                "attestationCertificateKeyIdentifiers": ["zzzz"],
                "schema": 3,
                "attestationTypes": ["basic_full"],
                "userVerificationDetails": [],
                "keyProtection": ["hardware"],
                "matcherProtection": ["on_chip"],
                "attestationRootCertificates": []
            },
            "statusReports": [],
            "timeOfLastStatusChange": "2018-05-19"
        });
        assert!(matches!(
            decode_entry(&value),
            Err(EntryError::InvalidKeyIdentifier(_))
        ));
    }
}
