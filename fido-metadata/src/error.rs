//! Error types for metadata blob processing.

use thiserror::Error;

/// Reasons the MDS blob as a whole could not be processed.
#[derive(Debug, Error)]
pub enum MdsError {
    /// The blob was not a three part compact JWS.
    #[error("blob is not a compact JWS serialisation")]
    JwsMalformed,
    /// The JWS header did not decode.
    #[error("JWS protected header invalid")]
    JwsHeaderInvalid,
    /// The signing algorithm is not one this crate accepts for the MDS.
    #[error("JWS algorithm {0} is not supported")]
    JwsAlgorithmUnsupported(String),
    /// The JWS signature did not verify against the leaf certificate.
    #[error("JWS signature invalid")]
    JwsSignatureInvalid,
    /// The x5c chain was absent or did not verify to the pinned root.
    #[error("signing certificate chain invalid")]
    CertificateChainInvalid,
    /// A certificate in the signing chain was outside its validity window.
    #[error("signing certificate expired or not yet valid")]
    CertificateExpired,
    /// The signing leaf was not issued to the expected subject.
    #[error("signing certificate subject invalid")]
    CertificateSubjectInvalid,
    /// A base64 segment of the JWS did not decode.
    #[error("base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The payload JSON did not match the MDS v3 schema.
    #[error("payload JSON invalid: {0}")]
    PayloadJson(#[source] serde_json::Error),
    /// An openssl primitive failed.
    #[error("openssl error: {0}")]
    OpenSSL(#[from] openssl::error::ErrorStack),
    /// Fetching the blob over HTTPS failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
    /// The blob verified but every payload entry was rejected.
    #[error("every payload entry was rejected")]
    AllEntriesRejected,
}

/// Reasons a single payload entry was rejected. Rejection of one entry does
/// not fail the blob - see `RegistryBuildOutcome`.
#[derive(Debug, Error)]
pub enum EntryError {
    /// The entry JSON did not match the expected schema.
    #[error("entry JSON invalid: {0}")]
    Json(#[source] serde_json::Error),
    /// The metadata statement schema version was not 3.
    #[error("unsupported metadata schema version {0}")]
    SchemaVersion(u16),
    /// The entry carried neither an AAGUID nor key identifiers.
    #[error("entry has no authenticator identifier")]
    MissingIdentifier,
    /// An attestationCertificateKeyIdentifier was not a 20 byte hex digest.
    #[error("invalid subject key identifier: {0}")]
    InvalidKeyIdentifier(String),
    /// An attestation root certificate failed to decode.
    #[error("attestation root certificate invalid")]
    CertificateDecode,
}
