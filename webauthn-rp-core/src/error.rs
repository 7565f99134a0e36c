//! Possible errors that can occur during the registration and authentication
//! ceremonies. Errors are structural - translation to HTTP statuses or log
//! strings is the caller's responsibility.

use thiserror::Error;

use crate::attestation::AttestationFormat;

/// Convenience alias for fallible operations that stop at the first error.
pub type WebauthnResult<T> = Result<T, WebauthnError>;

/// A single verification failure.
#[derive(Debug, Error)]
pub enum WebauthnError {
    /// The client data JSON was not valid UTF-8 JSON of the expected shape.
    #[error("client data JSON could not be decoded")]
    ClientDataDecode,

    /// The authenticator data bytes did not match the fixed binary layout.
    #[error("authenticator data could not be decoded")]
    AuthenticatorDataDecode,

    /// The attestation object was not a CBOR map of `fmt`, `attStmt` and
    /// `authData`.
    #[error("attestation object could not be decoded")]
    AttestationObjectDecode,

    /// The credential public key was not a decodable COSE_Key.
    #[error("COSE public key could not be decoded")]
    CoseKeyDecode,

    /// The COSE algorithm identifier is not one this library supports.
    #[error("COSE algorithm not recognised")]
    CoseKeyInvalidAlgorithm,

    /// A CBOR value did not have the expected shape.
    #[error("CBOR value does not have the expected shape")]
    CborValueInvalid,

    /// The client data ceremony type did not match the ceremony being
    /// verified.
    #[error("client data ceremony type mismatch")]
    CeremonyTypeMismatch,

    /// The client data challenge did not match the issued challenge.
    #[error("challenge mismatch")]
    ChallengeMismatch,

    /// The client data origin did not match the relying party origin.
    #[error("origin mismatch")]
    OriginMismatch,

    /// The rpIdHash in the authenticator data did not match the relying
    /// party id hash.
    #[error("rpIdHash mismatch")]
    RpIdHashMismatch,

    /// The user present flag was not set.
    #[error("user was not present")]
    UserNotPresent,

    /// User verification was required by policy but the flag was not set.
    #[error("user was not verified")]
    UserNotVerified,

    /// The credential is not a member of the allowed credential set.
    #[error("credential not allowed for this ceremony")]
    DisallowedCredential,

    /// The credential id is a member of the excluded credential set.
    #[error("credential is excluded from registration")]
    CredentialExcluded,

    /// The server-identified user does not own the stored credential.
    #[error("identified user does not match the credential user handle")]
    IdentifiedUserHandleMismatch,

    /// The authenticator-supplied user handle does not match the stored
    /// credential.
    #[error("response user handle does not match the credential user handle")]
    CredentialUserHandleMismatch,

    /// Neither the server nor the authenticator identified a user.
    #[error("no user handle available to verify")]
    CannotVerifyUserHandle,

    /// The credential key algorithm is not in the allowed parameter set.
    #[error("credential algorithm not allowed")]
    AlgorithmNotAllowed,

    /// The assertion or attestation signature did not verify.
    #[error("signature invalid")]
    SignatureInvalid,

    /// An x5c chain did not verify.
    #[error("certificate chain invalid")]
    CertificateChainInvalid,

    /// A public key failed its structural checks.
    #[error("public key shape invalid: {reason}")]
    KeyShapeInvalid {
        /// Which check rejected the key.
        reason: &'static str,
    },

    /// An attestation statement failed its format-specific verification
    /// procedure.
    #[error("attestation statement ({format}) invalid: {error}")]
    AttestationStatement {
        /// The format that was being verified.
        format: AttestationFormat,
        /// The format-specific failure.
        error: AttestationStatementError,
    },

    /// The attestation format identifier is not one of the supported set.
    #[error("attestation format not supported")]
    AttestationFormatUnsupported,

    /// Registration requires attested credential data, and the AT flag was
    /// clear.
    #[error("attested credential data missing")]
    MissingAttestedCredentialData,

    /// The challenge in a response was never issued, or was already
    /// consumed.
    #[error("unknown challenge")]
    UnknownChallenge,

    /// The challenge in a response was issued but its ttl has passed.
    #[error("challenge expired")]
    ChallengeExpired,

    /// A cryptographic primitive failed. This is an operational error, not
    /// a verification verdict.
    #[error("openssl error: {0}")]
    OpenSSL(#[from] openssl::error::ErrorStack),
}

/// Format-specific reasons an attestation statement was rejected. Always
/// carried inside [`WebauthnError::AttestationStatement`] alongside the
/// format identifier.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum AttestationStatementError {
    /// attStmt was not a CBOR map.
    #[error("statement is not a map")]
    MapInvalid,
    /// attStmt must be empty for this format and was not.
    #[error("statement must be empty")]
    NotEmpty,
    /// The `alg` member was absent.
    #[error("alg missing")]
    AlgMissing,
    /// The `alg` member was not a known COSE algorithm.
    #[error("alg invalid")]
    AlgInvalid,
    /// The statement algorithm disagrees with the credential key algorithm.
    #[error("alg does not match the credential key")]
    AlgMismatch,
    /// The `sig` member was absent or not a byte string.
    #[error("sig missing")]
    SigMissing,
    /// The statement signature did not verify.
    #[error("sig invalid")]
    SigInvalid,
    /// The `x5c` member was absent.
    #[error("x5c missing")]
    X5cMissing,
    /// The `x5c` member was empty, of the wrong length, or held undecodable
    /// certificates.
    #[error("x5c invalid")]
    X5cInvalid,
    /// The `ver` member was absent.
    #[error("ver missing")]
    VerMissing,
    /// The `ver` member was present but not the supported version.
    #[error("ver unsupported")]
    VerUnsupported,
    /// The `response` member was absent.
    #[error("response missing")]
    ResponseMissing,
    /// The `response` member did not verify as a SafetyNet JWS.
    #[error("response invalid")]
    ResponseInvalid,
    /// ECDAA attestation is not supported.
    #[error("ecdaa attestation unsupported")]
    EcdaaUnsupported,
    /// The attestation certificate did not meet the format's certificate
    /// requirements.
    #[error("attestation certificate requirements not met")]
    CertificateRequirementsNotMet,
    /// A required certificate extension was absent.
    #[error("required certificate extension missing")]
    MissingExtension,
    /// The id-fido-gen-ce-aaguid extension disagrees with the attested
    /// credential data.
    #[error("certificate aaguid mismatch")]
    AaguidMismatch,
    /// A liveness nonce did not match the computed value.
    #[error("nonce mismatch")]
    NonceMismatch,
    /// The certificate subject key does not match the credential key.
    #[error("certificate subject key mismatch")]
    SubjectKeyMismatch,
    /// The `certInfo` member was absent or unparseable.
    #[error("certInfo invalid")]
    CertInfoInvalid,
    /// The `pubArea` member was absent or unparseable.
    #[error("pubArea invalid")]
    PubAreaInvalid,
    /// The `pubArea` key disagrees with the credential key.
    #[error("pubArea does not match the credential key")]
    PubAreaMismatch,
}

/// The accumulated failures of a ceremony. Verifiers run every independent
/// check and report all violations at once; a non-empty accumulation is a
/// ceremony failure.
#[derive(Debug, Error)]
#[error("ceremony failed: {}", self.describe())]
pub struct WebauthnErrors(pub Vec<WebauthnError>);

impl WebauthnErrors {
    fn describe(&self) -> String {
        self.0
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// The number of failures.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false - the accumulation is non-empty by construction.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<WebauthnError> for WebauthnErrors {
    fn from(e: WebauthnError) -> Self {
        WebauthnErrors(vec![e])
    }
}
