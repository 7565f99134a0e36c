//! Attestation format verification procedures. Each webauthn attestation
//! statement format provides a verifier that checks the statement against
//! the signed authenticator data and produces a trust path for the
//! registration verifier to resolve against the metadata registry.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use openssl::nid;
use openssl::x509;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;
use x509_parser::oid_registry::Oid;

use crate::crypto::{
    assert_packed_attest_req, assert_tpm_attest_req, compute_sha256, raw_ec_signature_to_der,
    verify_signature_with_pkey, verify_x509_signature, COSEKey, COSEKeyType,
};
use crate::error::{AttestationStatementError, WebauthnError};
use crate::interface::{ParsedAttestationData, Registration};
use crate::internals::{AttestationObject, AttestedCredentialData};
use crate::tpm::{
    TpmsAttest, TpmtPublic, TpmtSignature, TpmuAttest, TpmuPublicId, TPM_ALG_SHA256,
    TPM_ST_ATTEST_CERTIFY,
};
use webauthn_rp_proto::cose::COSEAlgorithm;

/// The set of attestation statement formats this library implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AttestationFormat {
    /// The packed format, used by most FIDO2 devices.
    Packed,
    /// TPM 2.0 key attestation, used by platform authenticators on Windows.
    Tpm,
    /// Android hardware key attestation.
    AndroidKey,
    /// Android SafetyNet JWS attestation.
    AndroidSafetyNet,
    /// The legacy U2F attestation format.
    FidoU2F,
    /// Apple anonymous attestation.
    AppleAnonymous,
    /// No attestation provided.
    None,
}

impl AttestationFormat {
    /// The IANA format identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttestationFormat::Packed => "packed",
            AttestationFormat::Tpm => "tpm",
            AttestationFormat::AndroidKey => "android-key",
            AttestationFormat::AndroidSafetyNet => "android-safetynet",
            AttestationFormat::FidoU2F => "fido-u2f",
            AttestationFormat::AppleAnonymous => "apple",
            AttestationFormat::None => "none",
        }
    }

    fn fail(self, error: AttestationStatementError) -> WebauthnError {
        WebauthnError::AttestationStatement {
            format: self,
            error,
        }
    }
}

impl TryFrom<&str> for AttestationFormat {
    type Error = WebauthnError;

    fn try_from(a: &str) -> Result<AttestationFormat, Self::Error> {
        match a {
            "packed" => Ok(AttestationFormat::Packed),
            "tpm" => Ok(AttestationFormat::Tpm),
            "android-key" => Ok(AttestationFormat::AndroidKey),
            "android-safetynet" => Ok(AttestationFormat::AndroidSafetyNet),
            "fido-u2f" => Ok(AttestationFormat::FidoU2F),
            "apple" => Ok(AttestationFormat::AppleAnonymous),
            "none" => Ok(AttestationFormat::None),
            _ => Err(WebauthnError::AttestationFormatUnsupported),
        }
    }
}

impl fmt::Display for AttestationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The verification procedure of one attestation statement format.
///
/// Implementations decode the raw attStmt CBOR into their typed statement
/// and verify it against the exact signed bytes, producing the trust path.
pub trait AttestationFormatVerifier {
    /// The format this verifier handles.
    fn format(&self) -> AttestationFormat;

    /// Verify the attestation statement of `att_obj`. The credential public
    /// key within `acd` has been decoded and checked by the caller.
    fn verify(
        &self,
        acd: &AttestedCredentialData,
        att_obj: &AttestationObject<Registration>,
        client_data_hash: &[u8; 32],
        now: SystemTime,
    ) -> Result<ParsedAttestationData, WebauthnError>;
}

/// The registered attestation formats, looked up by identifier during
/// registration. Construct once at startup and pass by reference - there is
/// no global registry to mutate.
pub struct SupportedFormats {
    verifiers: BTreeMap<&'static str, Box<dyn AttestationFormatVerifier + Send + Sync>>,
}

impl Default for SupportedFormats {
    fn default() -> Self {
        let mut formats = SupportedFormats {
            verifiers: BTreeMap::new(),
        };
        formats.register(Box::new(PackedAttestation));
        formats.register(Box::new(FidoU2fAttestation));
        formats.register(Box::new(TpmAttestation));
        formats.register(Box::new(AndroidKeyAttestation));
        formats.register(Box::new(AndroidSafetyNetAttestation));
        formats.register(Box::new(AppleAnonymousAttestation));
        formats.register(Box::new(NoneAttestation));
        formats
    }
}

impl fmt::Debug for SupportedFormats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupportedFormats")
            .field("formats", &self.verifiers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SupportedFormats {
    /// Register a verifier, replacing any prior verifier for the same
    /// identifier.
    pub fn register(&mut self, verifier: Box<dyn AttestationFormatVerifier + Send + Sync>) {
        self.verifiers.insert(verifier.format().as_str(), verifier);
    }

    /// Look up the verifier for a format identifier string.
    pub fn lookup(&self, fmt: &str) -> Option<&(dyn AttestationFormatVerifier + Send + Sync)> {
        self.verifiers.get(fmt).map(|b| b.as_ref())
    }
}

// ===== statement member decoding ===========================================

fn text_key(key: &str) -> serde_cbor::Value {
    serde_cbor::Value::Text(key.to_string())
}

fn stmt_map(
    att_stmt: &serde_cbor::Value,
) -> Result<&BTreeMap<serde_cbor::Value, serde_cbor::Value>, AttestationStatementError> {
    match att_stmt {
        serde_cbor::Value::Map(m) => Ok(m),
        _ => Err(AttestationStatementError::MapInvalid),
    }
}

fn stmt_alg(
    m: &BTreeMap<serde_cbor::Value, serde_cbor::Value>,
) -> Result<COSEAlgorithm, AttestationStatementError> {
    let alg = m
        .get(&text_key("alg"))
        .ok_or(AttestationStatementError::AlgMissing)?;
    match alg {
        serde_cbor::Value::Integer(i) => {
            COSEAlgorithm::try_from(*i).map_err(|_| AttestationStatementError::AlgInvalid)
        }
        _ => Err(AttestationStatementError::AlgInvalid),
    }
}

fn stmt_bytes<'a>(
    m: &'a BTreeMap<serde_cbor::Value, serde_cbor::Value>,
    key: &str,
    missing: AttestationStatementError,
) -> Result<&'a [u8], AttestationStatementError> {
    match m.get(&text_key(key)) {
        Some(serde_cbor::Value::Bytes(b)) => Ok(b.as_slice()),
        _ => Err(missing),
    }
}

fn stmt_string<'a>(
    m: &'a BTreeMap<serde_cbor::Value, serde_cbor::Value>,
    key: &str,
    missing: AttestationStatementError,
) -> Result<&'a str, AttestationStatementError> {
    match m.get(&text_key(key)) {
        Some(serde_cbor::Value::Text(s)) => Ok(s.as_str()),
        _ => Err(missing),
    }
}

/// Decode an x5c member. The attestation certificate MUST be the first
/// element in the array, and the array must not be empty.
fn stmt_x5c(
    m: &BTreeMap<serde_cbor::Value, serde_cbor::Value>,
) -> Result<Vec<x509::X509>, AttestationStatementError> {
    let x5c = m
        .get(&text_key("x5c"))
        .ok_or(AttestationStatementError::X5cMissing)?;
    decode_x5c(x5c)
}

fn decode_x5c(x5c: &serde_cbor::Value) -> Result<Vec<x509::X509>, AttestationStatementError> {
    let arr = match x5c {
        serde_cbor::Value::Array(a) => a,
        _ => return Err(AttestationStatementError::X5cInvalid),
    };

    if arr.is_empty() {
        return Err(AttestationStatementError::X5cInvalid);
    }

    arr.iter()
        .map(|value| match value {
            serde_cbor::Value::Bytes(der) => {
                x509::X509::from_der(der).map_err(|_| AttestationStatementError::X5cInvalid)
            }
            _ => Err(AttestationStatementError::X5cInvalid),
        })
        .collect()
}

/// The bytes every format (bar fido-u2f) signs: rawAuthData || clientDataHash.
fn signed_attestation_data(
    att_obj: &AttestationObject<Registration>,
    client_data_hash: &[u8; 32],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(att_obj.auth_data_bytes.len() + client_data_hash.len());
    out.extend_from_slice(&att_obj.auth_data_bytes);
    out.extend_from_slice(client_data_hash);
    out
}

fn hash_with_alg(alg: COSEAlgorithm, data: &[u8]) -> Result<Vec<u8>, AttestationStatementError> {
    let digest = match alg {
        COSEAlgorithm::ES256 | COSEAlgorithm::RS256 | COSEAlgorithm::PS256 => {
            openssl::hash::MessageDigest::sha256()
        }
        COSEAlgorithm::ES384 | COSEAlgorithm::RS384 | COSEAlgorithm::PS384 => {
            openssl::hash::MessageDigest::sha384()
        }
        COSEAlgorithm::ES512 | COSEAlgorithm::RS512 | COSEAlgorithm::PS512 => {
            openssl::hash::MessageDigest::sha512()
        }
        COSEAlgorithm::EDDSA => return Err(AttestationStatementError::AlgInvalid),
    };
    openssl::hash::hash(digest, data)
        .map(|d| d.to_vec())
        .map_err(|_| AttestationStatementError::AlgInvalid)
}

// ===== x509 extension validation ===========================================

/// x509 certificate extensions are validated in the webauthn spec by checking
/// that the value of the extension is equal to some other value
pub(crate) trait AttestationX509Extension {
    /// the type of the value in the certificate extension
    type Output: Eq;

    /// the oid of the extension
    const OID: Oid<'static>;

    /// how to parse the value out of the certificate extension
    fn parse(i: &[u8]) -> der_parser::error::BerResult<Self::Output>;

    /// if `true`, then validating this certificate fails if this extension is
    /// missing
    const IS_REQUIRED: bool;

    /// what error to return if validation fails - i.e. if the "other value"
    /// is not equal to that in the extension
    const VALIDATION_ERROR: AttestationStatementError;
}

pub(crate) struct FidoGenCeAaguid;

impl AttestationX509Extension for FidoGenCeAaguid {
    // If cert contains an extension with OID 1.3.6.1.4.1.45724.1.1.4
    // (id-fido-gen-ce-aaguid) ...
    const OID: Oid<'static> = der_parser::oid!(1.3.6 .1 .4 .1 .45724 .1 .1 .4);

    // ... verify that the value of this extension matches the aaguid in
    // authenticatorData.
    type Output = Uuid;

    fn parse(i: &[u8]) -> der_parser::error::BerResult<Self::Output> {
        let (rem, aaguid) = der_parser::der::parse_der_octetstring(i)?;
        let aaguid = aaguid
            .as_slice()
            .ok()
            .and_then(|s| Uuid::from_slice(s).ok())
            .ok_or(nom::Err::Error(der_parser::error::BerError::InvalidLength))?;

        Ok((rem, aaguid))
    }

    const IS_REQUIRED: bool = false;

    const VALIDATION_ERROR: AttestationStatementError = AttestationStatementError::AaguidMismatch;
}

pub(crate) struct AppleAnonymousNonce;

impl AttestationX509Extension for AppleAnonymousNonce {
    type Output = [u8; 32];

    // 4. Verify that nonce equals the value of the extension with OID
    // 1.2.840.113635.100.8.2 in credCert. The nonce here is used to prove
    // that the attestation is live and to protect the integrity of the
    // authenticatorData and the client data.
    const OID: Oid<'static> = der_parser::oid!(1.2.840 .113635 .100 .8 .2);

    fn parse(i: &[u8]) -> der_parser::error::BerResult<Self::Output> {
        use der_parser::{der::*, error::BerError};
        parse_der_container(|i: &[u8], hdr: Header| {
            if hdr.tag() != Tag::Sequence {
                return Err(nom::Err::Error(BerError::BerTypeError.into()));
            }
            let (i, tagged_nonce) = parse_der_tagged_explicit(1, parse_der_octetstring)(i)?;
            let (class, _tag, nonce) = tagged_nonce.as_tagged()?;
            if class != Class::ContextSpecific {
                return Err(nom::Err::Error(BerError::BerTypeError.into()));
            }
            let nonce = nonce
                .as_slice()?
                .try_into()
                .map_err(|_| der_parser::error::BerError::InvalidLength)?;
            Ok((i, nonce))
        })(i)
    }

    const IS_REQUIRED: bool = true;

    const VALIDATION_ERROR: AttestationStatementError = AttestationStatementError::NonceMismatch;
}

pub(crate) mod android_key_attestation {
    use der_parser::ber::BerObjectContent;

    #[derive(Clone, PartialEq, Eq)]
    pub struct Data {
        pub attestation_challenge: Vec<u8>,
        pub attest_enforcement: EnforcementType,
        pub km_enforcement: EnforcementType,
        pub software_enforced: AuthorizationList,
        pub tee_enforced: AuthorizationList,
    }

    #[derive(Clone, PartialEq, Eq, Copy)]
    pub struct AuthorizationList {
        pub all_applications: bool,
        pub origin: Option<u32>,
        pub purpose: Option<u32>,
    }

    pub const KM_ORIGIN_GENERATED: u32 = 0;
    pub const KM_PURPOSE_SIGN: u32 = 2;

    #[derive(Clone, Eq)]
    pub enum EnforcementType {
        Software,
        Tee,
        Either,
    }

    impl PartialEq for EnforcementType {
        fn eq(&self, other: &Self) -> bool {
            match (self, other) {
                (Self::Either, _) | (_, Self::Either) => true,
                (Self::Software, Self::Software) => true,
                (Self::Tee, Self::Tee) => true,
                _ => false,
            }
        }
    }

    impl AuthorizationList {
        pub fn parse(i: &[u8]) -> der_parser::error::BerResult<Self> {
            use der_parser::{der::*, error::BerError};
            parse_der_container(|i: &[u8], hdr: Header| {
                if hdr.tag() != Tag::Sequence {
                    return Err(nom::Err::Error(BerError::BerTypeError.into()));
                }

                let mut all_applications = false;
                let mut origin = None;
                let mut purpose = None;

                let mut i = i;
                while let Ok((k, obj)) = parse_der(i) {
                    i = k;
                    if obj.content == BerObjectContent::Optional(None) {
                        continue;
                    }

                    match obj.tag() {
                        Tag(600) => {
                            all_applications = true;
                        }
                        Tag(702) => {
                            if let BerObjectContent::Unknown(o) = obj.content {
                                let (_, val) = parse_der_integer(&o.data)?;
                                origin = Some(val.as_u32()?);
                            }
                        }
                        Tag(1) => {
                            if let BerObjectContent::Unknown(o) = obj.content {
                                let (_, val) =
                                    parse_der_container(|i, _| parse_der_integer(i))(&o.data)?;
                                purpose = Some(val.as_u32()?);
                            }
                        }
                        _ => continue,
                    };
                }

                let al = AuthorizationList {
                    all_applications,
                    origin,
                    purpose,
                };

                Ok((i, al))
            })(i)
        }
    }

    impl Data {
        pub fn parse(i: &[u8]) -> der_parser::error::BerResult<Self> {
            use der_parser::{der::*, error::BerError};
            parse_der_container(|i: &[u8], hdr: Header| {
                if hdr.tag() != Tag::Sequence {
                    return Err(nom::Err::Error(BerError::BerTypeError.into()));
                }
                let (i, attestation_version) = parse_der_integer(i)?;
                let _attestation_version = attestation_version.as_i64()?;

                let (i, attest_sec_level) = parse_der_enum(i)?;
                let attest_sec_level = attest_sec_level.as_u32()?;
                let (i, _) = parse_der_integer(i)?; // keymaster version
                let (i, km_sec_level) = parse_der_enum(i)?;
                let km_sec_level = km_sec_level.as_u32()?;

                let (i, attestation_challenge) = parse_der_octetstring(i)?;
                let attestation_challenge = attestation_challenge.as_slice()?.to_vec();

                let (i, _unique_id) = parse_der_octetstring(i)?;

                let (i, software_enforced) = AuthorizationList::parse(i)?;
                let (i, tee_enforced) = AuthorizationList::parse(i)?;

                let attest_enforcement = match attest_sec_level {
                    0 => EnforcementType::Software,
                    1 => EnforcementType::Tee,
                    _ => return Err(der_parser::error::BerError::InvalidTag)?,
                };

                let km_enforcement = match km_sec_level {
                    0 => EnforcementType::Software,
                    1 => EnforcementType::Tee,
                    _ => return Err(der_parser::error::BerError::InvalidTag)?,
                };

                let data = Data {
                    attestation_challenge,
                    attest_enforcement,
                    km_enforcement,
                    software_enforced,
                    tee_enforced,
                };

                Ok((i, data))
            })(i)
        }
    }
}

pub(crate) struct AndroidKeyAttestationExtensionData;

impl AttestationX509Extension for AndroidKeyAttestationExtensionData {
    // The android key attestation extension.
    const OID: Oid<'static> = der_parser::oid!(1.3.6 .1 .4 .1 .11129 .2 .1 .17);

    type Output = android_key_attestation::Data;

    fn parse(i: &[u8]) -> der_parser::error::BerResult<Self::Output> {
        Self::Output::parse(i)
    }

    const IS_REQUIRED: bool = true;

    const VALIDATION_ERROR: AttestationStatementError = AttestationStatementError::NonceMismatch;
}

pub(crate) fn validate_extension<T>(
    x509: &x509::X509,
    data: &<T as AttestationX509Extension>::Output,
) -> Result<(), AttestationStatementError>
where
    T: AttestationX509Extension,
{
    let der_bytes = x509
        .to_der()
        .map_err(|_| AttestationStatementError::X5cInvalid)?;
    x509_parser::parse_x509_certificate(&der_bytes)
        .map_err(|_| AttestationStatementError::X5cInvalid)?
        .1
        .extensions()
        .iter()
        .find_map(|extension| {
            (extension.oid == T::OID).then(|| {
                T::parse(extension.value)
                    .map_err(|_| AttestationStatementError::X5cInvalid)
                    .and_then(|(_, output)| {
                        if &output == data {
                            Ok(())
                        } else {
                            Err(T::VALIDATION_ERROR)
                        }
                    })
            })
        })
        .unwrap_or_else(|| {
            if T::IS_REQUIRED {
                Err(AttestationStatementError::MissingExtension)
            } else {
                Ok(())
            }
        })
}

// ===== format verifiers ====================================================

/// Verification for 8.2. Packed Attestation Statement Format
/// <https://w3c.github.io/webauthn/#sctn-packed-attestation>
pub struct PackedAttestation;

impl AttestationFormatVerifier for PackedAttestation {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::Packed
    }

    fn verify(
        &self,
        acd: &AttestedCredentialData,
        att_obj: &AttestationObject<Registration>,
        client_data_hash: &[u8; 32],
        _now: SystemTime,
    ) -> Result<ParsedAttestationData, WebauthnError> {
        let format = self.format();

        // 1. Verify that attStmt is valid CBOR conforming to the syntax
        // defined above and perform CBOR decoding on it to extract the
        // contained fields.
        let att_stmt_map = stmt_map(&att_obj.att_stmt).map_err(|e| format.fail(e))?;
        let alg = stmt_alg(att_stmt_map).map_err(|e| format.fail(e))?;
        let sig = stmt_bytes(att_stmt_map, "sig", AttestationStatementError::SigMissing)
            .map_err(|e| format.fail(e))?;

        let verification_data = signed_attestation_data(att_obj, client_data_hash);

        match (
            att_stmt_map.get(&text_key("x5c")),
            att_stmt_map.get(&text_key("ecdaaKeyId")),
        ) {
            (Some(x5c), _) => {
                // 2. If x5c is present, this indicates that the attestation
                // type is not ECDAA.
                let arr_x509 = decode_x5c(x5c).map_err(|e| format.fail(e))?;

                let attestn_cert = arr_x509
                    .first()
                    .ok_or_else(|| format.fail(AttestationStatementError::X5cInvalid))?;

                // Verify that sig is a valid signature over the concatenation
                // of authenticatorData and clientDataHash using the
                // attestation public key in attestnCert with the algorithm
                // specified in alg.
                let is_valid_signature =
                    verify_x509_signature(alg, attestn_cert, sig, &verification_data)?;
                if !is_valid_signature {
                    return Err(format.fail(AttestationStatementError::SigInvalid));
                }

                // Verify that attestnCert meets the requirements in § 8.2.1
                // Packed Attestation Statement Certificate Requirements.
                assert_packed_attest_req(attestn_cert).map_err(|e| format.fail(e))?;

                // If attestnCert contains an id-fido-gen-ce-aaguid extension
                // verify that its value matches the aaguid in
                // authenticatorData.
                validate_extension::<FidoGenCeAaguid>(attestn_cert, &acd.aaguid)
                    .map_err(|e| format.fail(e))?;

                // Inspection of x5c against externally provided knowledge to
                // distinguish Basic from AttCA happens during metadata
                // resolution.
                Ok(ParsedAttestationData::Basic(arr_x509))
            }
            (None, Some(_ecdaa_key_id)) => {
                // 3. If ecdaaKeyId is present, then the attestation type is
                // ECDAA.
                debug!("ecdaaKeyId present");
                Err(format.fail(AttestationStatementError::EcdaaUnsupported))
            }
            (None, None) => {
                // 4. If neither x5c nor ecdaaKeyId is present, self
                // attestation is in use.
                let credential_public_key = COSEKey::try_from(&acd.credential_pk)?;

                // 4.a. Validate that alg matches the algorithm of the
                // credentialPublicKey in authenticatorData.
                if alg != credential_public_key.type_ {
                    return Err(format.fail(AttestationStatementError::AlgMismatch));
                }

                // 4.b. Verify that sig is a valid signature over the
                // concatenation of authenticatorData and clientDataHash using
                // the credential public key with alg.
                let is_valid_signature =
                    credential_public_key.verify_signature(sig, &verification_data)?;
                if !is_valid_signature {
                    return Err(format.fail(AttestationStatementError::SigInvalid));
                }

                // 4.c. If successful, return implementation-specific values
                // representing attestation type Self and an empty attestation
                // trust path.
                Ok(ParsedAttestationData::SelfAttestation)
            }
        }
    }
}

/// Verification for 8.6. FIDO U2F Attestation Statement Format
/// <https://w3c.github.io/webauthn/#fido-u2f-attestation>
pub struct FidoU2fAttestation;

impl AttestationFormatVerifier for FidoU2fAttestation {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::FidoU2F
    }

    fn verify(
        &self,
        acd: &AttestedCredentialData,
        att_obj: &AttestationObject<Registration>,
        client_data_hash: &[u8; 32],
        _now: SystemTime,
    ) -> Result<ParsedAttestationData, WebauthnError> {
        let format = self.format();

        let att_stmt_map = stmt_map(&att_obj.att_stmt).map_err(|e| format.fail(e))?;
        let sig = stmt_bytes(att_stmt_map, "sig", AttestationStatementError::SigMissing)
            .map_err(|e| format.fail(e))?;

        // Check that x5c has exactly one element and let att_cert be that
        // element.
        let arr_x509 = stmt_x5c(att_stmt_map).map_err(|e| format.fail(e))?;
        if arr_x509.len() != 1 {
            return Err(format.fail(AttestationStatementError::X5cInvalid));
        }
        let att_cert = &arr_x509[0];

        // If certificate public key is not an Elliptic Curve (EC) public key
        // over the P-256 curve, terminate this algorithm and return an
        // appropriate error.
        let cert_pkey = att_cert.public_key()?;
        let is_p256 = cert_pkey
            .ec_key()
            .ok()
            .and_then(|ec| ec.group().curve_name())
            .map(|name| name == nid::Nid::X9_62_PRIME256V1)
            .unwrap_or(false);
        if !is_p256 {
            return Err(format.fail(AttestationStatementError::X5cInvalid));
        }

        // Convert the COSE_KEY formatted credentialPublicKey (see Section 7
        // of [RFC8152]) to Raw ANSI X9.62 public key format.
        let credential_public_key = COSEKey::try_from(&acd.credential_pk)?;
        let public_key_u2f = credential_public_key.get_alg_key_ecc_x962_raw()?;

        // Let verificationData be the concatenation of
        // (0x00 || rpIdHash || clientDataHash || credentialId || publicKeyU2F)
        // (see Section 4.3 of [FIDO-U2F-Message-Formats]).
        let mut verification_data =
            Vec::with_capacity(1 + 32 + 32 + acd.credential_id.len() + public_key_u2f.len());
        verification_data.push(0x00);
        verification_data.extend_from_slice(&att_obj.auth_data.rp_id_hash);
        verification_data.extend_from_slice(client_data_hash);
        verification_data.extend_from_slice(&acd.credential_id);
        verification_data.extend_from_slice(&public_key_u2f);

        // Verify the sig using verificationData and the certificate public
        // key per [SEC1]. U2F is always ES256.
        let verified =
            verify_x509_signature(COSEAlgorithm::ES256, att_cert, sig, &verification_data)?;

        if !verified {
            error!("fido-u2f attestation signature verification failed");
            return Err(format.fail(AttestationStatementError::SigInvalid));
        }

        Ok(ParsedAttestationData::Basic(arr_x509))
    }
}

/// Verification for 8.7. None Attestation Statement Format
/// <https://w3c.github.io/webauthn/#none-attestation>
pub struct NoneAttestation;

impl AttestationFormatVerifier for NoneAttestation {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::None
    }

    fn verify(
        &self,
        _acd: &AttestedCredentialData,
        att_obj: &AttestationObject<Registration>,
        _client_data_hash: &[u8; 32],
        _now: SystemTime,
    ) -> Result<ParsedAttestationData, WebauthnError> {
        let format = self.format();
        let att_stmt_map = stmt_map(&att_obj.att_stmt).map_err(|e| format.fail(e))?;

        if !att_stmt_map.is_empty() {
            return Err(format.fail(AttestationStatementError::NotEmpty));
        }

        Ok(ParsedAttestationData::Uncertain)
    }
}

/// Verification for 8.8. Apple Anonymous Attestation Statement Format
/// <https://www.w3.org/TR/webauthn-2/#sctn-apple-anonymous-attestation>
pub struct AppleAnonymousAttestation;

impl AttestationFormatVerifier for AppleAnonymousAttestation {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::AppleAnonymous
    }

    fn verify(
        &self,
        acd: &AttestedCredentialData,
        att_obj: &AttestationObject<Registration>,
        client_data_hash: &[u8; 32],
        _now: SystemTime,
    ) -> Result<ParsedAttestationData, WebauthnError> {
        let format = self.format();

        // 1. Verify that attStmt is valid CBOR and extract the fields.
        let att_stmt_map = stmt_map(&att_obj.att_stmt).map_err(|e| format.fail(e))?;
        let arr_x509 = stmt_x5c(att_stmt_map).map_err(|e| format.fail(e))?;

        let attestn_cert = arr_x509
            .first()
            .ok_or_else(|| format.fail(AttestationStatementError::X5cInvalid))?;

        let credential_public_key = COSEKey::try_from(&acd.credential_pk)?;
        let alg = credential_public_key.type_;

        // 2. Concatenate authenticatorData and clientDataHash to form
        // nonceToHash.
        let nonce_to_hash = signed_attestation_data(att_obj, client_data_hash);

        // 3. Perform SHA-256 hash of nonceToHash to produce nonce.
        let nonce = compute_sha256(&nonce_to_hash);

        // 4. Verify that nonce equals the value of the extension with OID
        // 1.2.840.113635.100.8.2 in credCert.
        validate_extension::<AppleAnonymousNonce>(attestn_cert, &nonce)
            .map_err(|e| format.fail(e))?;

        // 5. Verify credential public key matches the Subject Public Key of
        // credCert.
        let subject_public_key = COSEKey::try_from((alg, attestn_cert))?;
        if credential_public_key != subject_public_key {
            return Err(format.fail(AttestationStatementError::SubjectKeyMismatch));
        }

        // 6. If successful, return implementation-specific values
        // representing attestation type Anonymous CA and attestation trust
        // path x5c.
        Ok(ParsedAttestationData::AnonCa(arr_x509))
    }
}

/// Verification for the Android Key attestation statement format.
/// <https://www.w3.org/TR/webauthn-3/#sctn-android-key-attestation>
pub struct AndroidKeyAttestation;

impl AttestationFormatVerifier for AndroidKeyAttestation {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::AndroidKey
    }

    fn verify(
        &self,
        acd: &AttestedCredentialData,
        att_obj: &AttestationObject<Registration>,
        client_data_hash: &[u8; 32],
        _now: SystemTime,
    ) -> Result<ParsedAttestationData, WebauthnError> {
        let format = self.format();

        let att_stmt_map = stmt_map(&att_obj.att_stmt).map_err(|e| format.fail(e))?;
        let alg = stmt_alg(att_stmt_map).map_err(|e| format.fail(e))?;
        let sig = stmt_bytes(att_stmt_map, "sig", AttestationStatementError::SigMissing)
            .map_err(|e| format.fail(e))?;
        let arr_x509 = stmt_x5c(att_stmt_map).map_err(|e| format.fail(e))?;

        let attestn_cert = arr_x509
            .first()
            .ok_or_else(|| format.fail(AttestationStatementError::X5cInvalid))?;

        let data_to_verify = signed_attestation_data(att_obj, client_data_hash);

        // 2. Verify that sig is a valid signature over the concatenation of
        // authenticatorData and clientDataHash using the public key in the
        // first certificate in x5c with the algorithm specified in alg.
        let verified = verify_x509_signature(alg, attestn_cert, sig, &data_to_verify)?;
        if !verified {
            error!("android-key attestation signature verification failed");
            return Err(format.fail(AttestationStatementError::SigInvalid));
        }

        // 3. Verify that the public key in the first certificate in x5c
        // matches the credentialPublicKey in the attestedCredentialData.
        let credential_public_key = COSEKey::try_from(&acd.credential_pk)?;
        let subject_public_key = COSEKey::try_from((credential_public_key.type_, attestn_cert))?;
        if credential_public_key != subject_public_key {
            return Err(format.fail(AttestationStatementError::SubjectKeyMismatch));
        }

        // 4. Verify that the attestationChallenge field in the attestation
        // certificate extension data is identical to clientDataHash, that
        // the key is TEE-enforced, generated, and restricted to signing, and
        // that it is not bound to all applications.
        use android_key_attestation::{
            AuthorizationList, EnforcementType, KM_ORIGIN_GENERATED, KM_PURPOSE_SIGN,
        };

        validate_extension::<AndroidKeyAttestationExtensionData>(
            attestn_cert,
            &android_key_attestation::Data {
                attestation_challenge: client_data_hash.to_vec(),
                attest_enforcement: EnforcementType::Either,
                km_enforcement: EnforcementType::Tee,
                software_enforced: AuthorizationList {
                    all_applications: false,
                    origin: None,
                    purpose: None,
                },
                tee_enforced: AuthorizationList {
                    all_applications: false,
                    origin: Some(KM_ORIGIN_GENERATED),
                    purpose: Some(KM_PURPOSE_SIGN),
                },
            },
        )
        .map_err(|e| format.fail(e))?;

        Ok(ParsedAttestationData::Basic(arr_x509))
    }
}

#[derive(Debug, Deserialize)]
struct SafetyNetHeader {
    alg: String,
    x5c: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafetyNetResponse {
    nonce: Option<String>,
    timestamp_ms: u64,
    #[serde(default)]
    #[allow(unused)]
    apk_package_name: Option<String>,
    cts_profile_match: bool,
    #[serde(default)]
    #[allow(unused)]
    basic_integrity: bool,
}

/// Verification for the Android SafetyNet attestation statement format.
/// <https://www.w3.org/TR/webauthn/#sctn-android-safetynet-attestation>
pub struct AndroidSafetyNetAttestation;

impl AndroidSafetyNetAttestation {
    fn verify_response_jws(
        token: &str,
        expected_nonce: &[u8; 32],
        now: SystemTime,
    ) -> Result<Vec<x509::X509>, AttestationStatementError> {
        let bad = AttestationStatementError::ResponseInvalid;

        let mut parts = token.split('.');
        let (hdr_b64, payload_b64, sig_b64) = match (parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(p), Some(s)) if parts.next().is_none() => (h, p, s),
            _ => return Err(bad),
        };

        let header: SafetyNetHeader =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(hdr_b64).map_err(|_| bad)?)
                .map_err(|_| bad)?;

        let certs = header
            .x5c
            .iter()
            .map(|b64_cert| {
                STANDARD
                    .decode(b64_cert)
                    .ok()
                    .and_then(|der| x509::X509::from_der(&der).ok())
                    .ok_or(bad)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let leaf = certs.first().ok_or(bad)?;

        // Verify that the SafetyNet response actually came from the
        // SafetyNet service: attestationCert is issued to the hostname
        // "attest.android.com".
        let common_name = leaf
            .subject_name()
            .entries_by_nid(nid::Nid::COMMONNAME)
            .next()
            .and_then(|cn| cn.data().as_utf8().ok().map(|s| s.to_string()))
            .ok_or(bad)?;
        if common_name != "attest.android.com" {
            return Err(bad);
        }

        // Leaf signature over header.payload.
        let signed_len = hdr_b64.len() + 1 + payload_b64.len();
        let signed_data = &token.as_bytes()[..signed_len];
        let signature = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| bad)?;

        let pkey = leaf.public_key().map_err(|_| bad)?;
        let valid = match header.alg.as_str() {
            "RS256" => verify_signature_with_pkey(
                COSEAlgorithm::RS256,
                &pkey,
                &signature,
                signed_data,
            )
            .unwrap_or(false),
            "ES256" => raw_ec_signature_to_der(&signature)
                .and_then(|der_sig| {
                    verify_signature_with_pkey(COSEAlgorithm::ES256, &pkey, &der_sig, signed_data)
                })
                .unwrap_or(false),
            _ => false,
        };
        if !valid {
            return Err(bad);
        }

        let response: SafetyNetResponse =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| bad)?)
                .map_err(|_| bad)?;

        // 3. Verify that the nonce attribute in the payload of response is
        // identical to the Base64 encoding of the SHA-256 hash of the
        // concatenation of authenticatorData and clientDataHash.
        let nonce = response
            .nonce
            .as_deref()
            .and_then(|n| STANDARD.decode(n).ok())
            .ok_or(AttestationStatementError::NonceMismatch)?;
        if nonce != expected_nonce {
            return Err(AttestationStatementError::NonceMismatch);
        }

        // §8.5.6 Verify that the ctsProfileMatch attribute in the payload of
        // response is true.
        if !response.cts_profile_match {
            return Err(bad);
        }

        // The response timestamp must not come from the future.
        let expires = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .saturating_add(Duration::from_secs(60));
        if response.timestamp_ms as u128 > expires.as_millis() {
            return Err(bad);
        }

        Ok(certs)
    }
}

impl AttestationFormatVerifier for AndroidSafetyNetAttestation {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::AndroidSafetyNet
    }

    fn verify(
        &self,
        _acd: &AttestedCredentialData,
        att_obj: &AttestationObject<Registration>,
        client_data_hash: &[u8; 32],
        now: SystemTime,
    ) -> Result<ParsedAttestationData, WebauthnError> {
        let format = self.format();

        let att_stmt_map = stmt_map(&att_obj.att_stmt).map_err(|e| format.fail(e))?;

        // There is only one version of the SafetyNet response format; ver is
        // reserved for future use but must be present.
        let _ver = stmt_string(att_stmt_map, "ver", AttestationStatementError::VerMissing)
            .map_err(|e| format.fail(e))?;

        let response = stmt_bytes(
            att_stmt_map,
            "response",
            AttestationStatementError::ResponseMissing,
        )
        .map_err(|e| format.fail(e))?;

        let token = std::str::from_utf8(response)
            .map_err(|_| format.fail(AttestationStatementError::ResponseInvalid))?;

        // The nonce covers SHA-256(authData || clientDataHash).
        let data_to_verify = signed_attestation_data(att_obj, client_data_hash);
        let expected_nonce = compute_sha256(&data_to_verify);

        let certs = Self::verify_response_jws(token, &expected_nonce, now)
            .map_err(|e| format.fail(e))?;

        Ok(ParsedAttestationData::Basic(certs))
    }
}

/// Verification for 8.3. TPM Attestation Statement Format
/// <https://w3c.github.io/webauthn/#sctn-tpm-attestation>
pub struct TpmAttestation;

impl AttestationFormatVerifier for TpmAttestation {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::Tpm
    }

    fn verify(
        &self,
        acd: &AttestedCredentialData,
        att_obj: &AttestationObject<Registration>,
        client_data_hash: &[u8; 32],
        _now: SystemTime,
    ) -> Result<ParsedAttestationData, WebauthnError> {
        let format = self.format();

        let att_stmt_map = stmt_map(&att_obj.att_stmt).map_err(|e| format.fail(e))?;

        // The version of the TPM specification to which the signature
        // conforms.
        let ver = stmt_string(att_stmt_map, "ver", AttestationStatementError::VerMissing)
            .map_err(|e| format.fail(e))?;
        if ver != "2.0" {
            return Err(format.fail(AttestationStatementError::VerUnsupported));
        }

        let alg = stmt_alg(att_stmt_map).map_err(|e| format.fail(e))?;

        // The TPMS_ATTEST structure over which the signature was computed.
        let certinfo_bytes = stmt_bytes(
            att_stmt_map,
            "certInfo",
            AttestationStatementError::CertInfoInvalid,
        )
        .map_err(|e| format.fail(e))?;
        let certinfo = TpmsAttest::try_from(certinfo_bytes)
            .map_err(|_| format.fail(AttestationStatementError::CertInfoInvalid))?;

        // The TPMT_PUBLIC structure the TPM used to represent the credential
        // public key.
        let pubarea_bytes = stmt_bytes(
            att_stmt_map,
            "pubArea",
            AttestationStatementError::PubAreaInvalid,
        )
        .map_err(|e| format.fail(e))?;
        let pubarea = TpmtPublic::try_from(pubarea_bytes)
            .map_err(|_| format.fail(AttestationStatementError::PubAreaInvalid))?;

        let sig_bytes = stmt_bytes(att_stmt_map, "sig", AttestationStatementError::SigMissing)
            .map_err(|e| format.fail(e))?;
        let sig = TpmtSignature::from(sig_bytes);

        // x5c -> aik_cert followed by its certificate chain, in X.509
        // encoding.
        let arr_x509 = stmt_x5c(att_stmt_map).map_err(|e| format.fail(e))?;
        let aik_cert = arr_x509
            .first()
            .ok_or_else(|| format.fail(AttestationStatementError::X5cInvalid))?;

        // Verify that the public key specified by the parameters and unique
        // fields of pubArea is identical to the credentialPublicKey in the
        // attestedCredentialData.
        let credential_public_key = COSEKey::try_from(&acd.credential_pk)?;
        let matches = match (&credential_public_key.key, &pubarea.unique) {
            (COSEKeyType::RSA(cose_rsa), TpmuPublicId::Rsa(tpm_modulus)) => {
                cose_rsa.n.as_ref() == tpm_modulus.as_slice()
            }
            (COSEKeyType::EC_EC2(cose_ec), TpmuPublicId::Ecc { x, y }) => {
                cose_ec.x.as_ref() == x.as_slice() && cose_ec.y.as_ref() == y.as_slice()
            }
            _ => false,
        };
        if !matches {
            return Err(format.fail(AttestationStatementError::PubAreaMismatch));
        }

        // Concatenate authenticatorData and clientDataHash to form
        // attToBeSigned.
        let verification_data = signed_attestation_data(att_obj, client_data_hash);

        // Verify that magic is set to TPM_GENERATED_VALUE - done in parsing.
        // Verify that type is set to TPM_ST_ATTEST_CERTIFY.
        if certinfo.type_ != TPM_ST_ATTEST_CERTIFY {
            return Err(format.fail(AttestationStatementError::CertInfoInvalid));
        }

        // Verify that extraData is set to the hash of attToBeSigned using
        // the hash algorithm employed in "alg".
        let hashed_att_to_be_signed =
            hash_with_alg(alg, &verification_data).map_err(|e| format.fail(e))?;
        if certinfo.extra_data != hashed_att_to_be_signed {
            return Err(format.fail(AttestationStatementError::CertInfoInvalid));
        }

        // Verify that attested contains a TPMS_CERTIFY_INFO structure whose
        // name field contains a valid Name for pubArea, as computed using
        // the algorithm in the nameAlg field of pubArea.
        match &certinfo.attested {
            TpmuAttest::AttestCertify { name, .. } => {
                // Name carries a two byte algorithm prefix which the spec
                // says nothing about validating, so it is folded into the
                // comparison to force a check.
                let expected = match pubarea.name_alg {
                    TPM_ALG_SHA256 => {
                        let mut v = vec![0x00, 0x0b];
                        v.extend_from_slice(&compute_sha256(pubarea_bytes));
                        v
                    }
                    _ => return Err(format.fail(AttestationStatementError::PubAreaInvalid)),
                };
                if &expected != name {
                    return Err(format.fail(AttestationStatementError::PubAreaInvalid));
                }
            }
            TpmuAttest::Unknown => {
                return Err(format.fail(AttestationStatementError::CertInfoInvalid));
            }
        }

        // Verify the sig is a valid signature over certInfo using the
        // attestation public key in aik_cert with the algorithm specified in
        // alg.
        let sig_valid = match sig {
            TpmtSignature::RawSignature(dsig) => {
                verify_x509_signature(alg, aik_cert, &dsig, certinfo_bytes)?
            }
        };
        if !sig_valid {
            return Err(format.fail(AttestationStatementError::SigInvalid));
        }

        // Verify that aik_cert meets the requirements in § 8.3.1 TPM
        // Attestation Statement Certificate Requirements.
        assert_tpm_attest_req(aik_cert).map_err(|e| format.fail(e))?;

        // If aik_cert contains an id-fido-gen-ce-aaguid extension verify
        // that its value matches the aaguid in authenticatorData.
        validate_extension::<FidoGenCeAaguid>(aik_cert, &acd.aaguid).map_err(|e| format.fail(e))?;

        // If successful, return implementation-specific values representing
        // attestation type AttCA and attestation trust path x5c.
        Ok(ParsedAttestationData::AttCa(arr_x509))
    }
}
