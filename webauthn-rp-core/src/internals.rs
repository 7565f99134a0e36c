//! Internal binary representations of the authenticator messages. These
//! decoders preserve the exact bytes they were fed: webauthn signs raw byte
//! sequences that are not byte-identical to any canonical re-encoding, so
//! every signed span is captured alongside its parsed form.

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::marker::PhantomData;
use uuid::Uuid;

use crate::constants::{AUTHENTICATOR_DATA_PREFIX_LEN, CREDENTIAL_ID_MAX_LEN};
use crate::error::WebauthnError;
use crate::interface::Ceremony;
use webauthn_rp_proto::attest::AuthenticatorAttestationResponseRaw;
use webauthn_rp_proto::auth::AuthenticatorAssertionResponseRaw;
use webauthn_rp_proto::options::CollectedClientData;

/// Attested Credential Data
#[derive(Debug, Clone)]
pub struct AttestedCredentialData {
    /// The guid of the authenticator model. All zero for U2F devices.
    pub aaguid: Uuid,
    /// The credential ID.
    pub credential_id: Vec<u8>,
    /// The credential's public key, parsed.
    pub credential_pk: serde_cbor::Value,
    /// The exact CBOR bytes the public key was parsed from. These are what
    /// the relying party stores, and what later assertions are verified
    /// against.
    pub credential_pk_bytes: Vec<u8>,
}

/// Data returned by the authenticator, with the raw signed span retained.
#[derive(Debug, Clone)]
pub struct AuthenticatorData<T: Ceremony> {
    /// Hash of the relying party id.
    pub(crate) rp_id_hash: Vec<u8>,
    /// The counter of this credential's activations.
    pub counter: u32,
    /// Flag if the user was present.
    pub user_present: bool,
    /// Flag if the user verified to the device. Implies presence.
    pub user_verified: bool,
    /// The optional attested credential data. Only present on registration.
    pub(crate) acd: Option<AttestedCredentialData>,
    /// Extensions supplied by the device, uninterpreted.
    pub(crate) extensions: Option<serde_cbor::Value>,
    /// The raw extension bytes, for byte-exact re-encoding.
    pub(crate) extensions_bytes: Option<Vec<u8>>,
    pub(crate) _ceremony: PhantomData<T>,
}

const FLAG_UP: u8 = 1;
const FLAG_UV: u8 = 1 << 2;
const FLAG_AT: u8 = 1 << 6;
const FLAG_ED: u8 = 1 << 7;

/// The length in bytes of the leading CBOR item in `data`, discovered by
/// parsing it and re-encoding. Exact for the canonical encodings
/// authenticators emit.
fn leading_cbor_item(data: &[u8]) -> Result<(serde_cbor::Value, usize), WebauthnError> {
    let mut deserializer = serde_cbor::Deserializer::from_slice(data);
    let value = serde_cbor::Value::deserialize(&mut deserializer)
        .map_err(|_| WebauthnError::AuthenticatorDataDecode)?;
    let len = serde_cbor::to_vec(&value)
        .map_err(|_| WebauthnError::AuthenticatorDataDecode)?
        .len();
    Ok((value, len))
}

impl<T: Ceremony> TryFrom<&[u8]> for AuthenticatorData<T> {
    type Error = WebauthnError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() < AUTHENTICATOR_DATA_PREFIX_LEN {
            return Err(WebauthnError::AuthenticatorDataDecode);
        }

        let rp_id_hash = data[0..32].to_vec();
        let flags = data[32];
        let counter = u32::from_be_bytes(
            data[33..37]
                .try_into()
                .map_err(|_| WebauthnError::AuthenticatorDataDecode)?,
        );

        let user_present = (flags & FLAG_UP) != 0;
        let user_verified = (flags & FLAG_UV) != 0;
        let acd_present = (flags & FLAG_AT) != 0;
        let extensions_present = (flags & FLAG_ED) != 0;

        let mut cursor = AUTHENTICATOR_DATA_PREFIX_LEN;

        let acd = if acd_present {
            // 16 aaguid + 2 credential id length.
            if data.len() < cursor + 18 {
                return Err(WebauthnError::AuthenticatorDataDecode);
            }
            let aaguid = Uuid::from_slice(&data[cursor..cursor + 16])
                .map_err(|_| WebauthnError::AuthenticatorDataDecode)?;
            let cred_id_len = u16::from_be_bytes(
                data[cursor + 16..cursor + 18]
                    .try_into()
                    .map_err(|_| WebauthnError::AuthenticatorDataDecode)?,
            ) as usize;

            if cred_id_len > CREDENTIAL_ID_MAX_LEN {
                return Err(WebauthnError::AuthenticatorDataDecode);
            }

            cursor += 18;
            if data.len() < cursor + cred_id_len {
                return Err(WebauthnError::AuthenticatorDataDecode);
            }
            let credential_id = data[cursor..cursor + cred_id_len].to_vec();
            cursor += cred_id_len;

            let (credential_pk, pk_len) = leading_cbor_item(&data[cursor..])?;
            let credential_pk_bytes = data[cursor..cursor + pk_len].to_vec();
            cursor += pk_len;

            Some(AttestedCredentialData {
                aaguid,
                credential_id,
                credential_pk,
                credential_pk_bytes,
            })
        } else {
            None
        };

        let (extensions, extensions_bytes) = if extensions_present {
            let remainder = &data[cursor..];
            let (value, len) = leading_cbor_item(remainder)?;
            // Extensions consume the whole remainder.
            if len != remainder.len() {
                return Err(WebauthnError::AuthenticatorDataDecode);
            }
            cursor += len;
            (Some(value), Some(remainder.to_vec()))
        } else {
            (None, None)
        };

        if cursor != data.len() {
            // Trailing bytes that nothing accounts for.
            return Err(WebauthnError::AuthenticatorDataDecode);
        }

        Ok(AuthenticatorData {
            rp_id_hash,
            counter,
            user_present,
            user_verified,
            acd,
            extensions,
            extensions_bytes,
            _ceremony: PhantomData,
        })
    }
}

impl<T: Ceremony> AuthenticatorData<T> {
    /// Re-encode to the authenticator byte layout. For data parsed from the
    /// wire, the output is byte-identical to the input.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(AUTHENTICATOR_DATA_PREFIX_LEN);
        out.extend_from_slice(&self.rp_id_hash);

        let mut flags = 0u8;
        if self.user_present {
            flags |= FLAG_UP;
        }
        if self.user_verified {
            flags |= FLAG_UV;
        }
        if self.acd.is_some() {
            flags |= FLAG_AT;
        }
        if self.extensions_bytes.is_some() {
            flags |= FLAG_ED;
        }
        out.push(flags);
        out.extend_from_slice(&self.counter.to_be_bytes());

        if let Some(acd) = &self.acd {
            out.extend_from_slice(acd.aaguid.as_bytes());
            out.extend_from_slice(&(acd.credential_id.len() as u16).to_be_bytes());
            out.extend_from_slice(&acd.credential_id);
            out.extend_from_slice(&acd.credential_pk_bytes);
        }

        if let Some(ext) = &self.extensions_bytes {
            out.extend_from_slice(ext);
        }

        out
    }

    /// The device-reported extensions, if any were present.
    pub fn extensions(&self) -> Option<&serde_cbor::Value> {
        self.extensions.as_ref()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AttestationObjectInner<'a> {
    #[serde(rename = "authData")]
    auth_data: &'a [u8],
    fmt: String,
    #[serde(rename = "attStmt")]
    att_stmt: serde_cbor::Value,
}

#[derive(Serialize)]
struct AttestationObjectOuter<'a> {
    fmt: &'a str,
    #[serde(rename = "attStmt")]
    att_stmt: &'a serde_cbor::Value,
    #[serde(rename = "authData", with = "serde_bytes")]
    auth_data: &'a [u8],
}

/// The decoded attestation object of a registration response.
#[derive(Debug)]
pub struct AttestationObject<T: Ceremony> {
    /// The authenticator data, parsed.
    pub auth_data: AuthenticatorData<T>,
    /// The exact authData bytes - the span the attestation signature covers.
    pub auth_data_bytes: Vec<u8>,
    /// The attestation format identifier.
    pub fmt: String,
    /// The attestation statement, uninterpreted until format dispatch.
    pub att_stmt: serde_cbor::Value,
}

impl<T: Ceremony> TryFrom<&[u8]> for AttestationObject<T> {
    type Error = WebauthnError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        let inner: AttestationObjectInner =
            serde_cbor::from_slice(data).map_err(|_| WebauthnError::AttestationObjectDecode)?;

        let auth_data_bytes = inner.auth_data.to_vec();
        let auth_data = AuthenticatorData::try_from(inner.auth_data)?;

        Ok(AttestationObject {
            auth_data,
            auth_data_bytes,
            fmt: inner.fmt,
            att_stmt: inner.att_stmt,
        })
    }
}

impl<T: Ceremony> AttestationObject<T> {
    /// Re-encode in wire field order (`fmt`, `attStmt`, `authData`).
    pub fn to_bytes(&self) -> Result<Vec<u8>, WebauthnError> {
        let outer = AttestationObjectOuter {
            fmt: &self.fmt,
            att_stmt: &self.att_stmt,
            auth_data: &self.auth_data_bytes,
        };
        serde_cbor::to_vec(&outer).map_err(|_| WebauthnError::AttestationObjectDecode)
    }
}

/// Parse client data JSON, retaining nothing - the caller keeps the raw
/// bytes alongside, as those are what gets hashed and signed.
pub(crate) fn parse_client_data(data: &[u8]) -> Result<CollectedClientData, WebauthnError> {
    serde_json::from_slice(data).map_err(|err| {
        debug!(?err, "client data json did not parse");
        WebauthnError::ClientDataDecode
    })
}

/// A registration response in its verification form: every parsed structure
/// is paired with the bytes it came from.
#[derive(Debug)]
pub(crate) struct AuthenticatorAttestationResponse<T: Ceremony> {
    pub(crate) attestation_object: AttestationObject<T>,
    pub(crate) client_data: CollectedClientData,
    pub(crate) client_data_bytes: Vec<u8>,
    pub(crate) transports: Option<Vec<webauthn_rp_proto::options::AuthenticatorTransport>>,
}

impl<T: Ceremony> TryFrom<&AuthenticatorAttestationResponseRaw>
    for AuthenticatorAttestationResponse<T>
{
    type Error = WebauthnError;
    fn try_from(aarr: &AuthenticatorAttestationResponseRaw) -> Result<Self, Self::Error> {
        Ok(AuthenticatorAttestationResponse {
            attestation_object: AttestationObject::try_from(aarr.attestation_object.as_ref())?,
            client_data: parse_client_data(aarr.client_data_json.as_ref())?,
            client_data_bytes: aarr.client_data_json.clone().into(),
            transports: aarr.transports.clone(),
        })
    }
}

/// An assertion response in its verification form.
#[derive(Debug)]
pub(crate) struct AuthenticatorAssertionResponse<T: Ceremony> {
    pub(crate) authenticator_data: AuthenticatorData<T>,
    pub(crate) authenticator_data_bytes: Vec<u8>,
    pub(crate) client_data: CollectedClientData,
    pub(crate) client_data_bytes: Vec<u8>,
    pub(crate) signature: Vec<u8>,
    pub(crate) user_handle: Option<Vec<u8>>,
}

impl<T: Ceremony> TryFrom<&AuthenticatorAssertionResponseRaw>
    for AuthenticatorAssertionResponse<T>
{
    type Error = WebauthnError;
    fn try_from(aarr: &AuthenticatorAssertionResponseRaw) -> Result<Self, Self::Error> {
        Ok(AuthenticatorAssertionResponse {
            authenticator_data: AuthenticatorData::try_from(aarr.authenticator_data.as_ref())?,
            authenticator_data_bytes: aarr.authenticator_data.clone().into(),
            client_data: parse_client_data(aarr.client_data_json.as_ref())?,
            client_data_bytes: aarr.client_data_json.clone().into(),
            signature: aarr.signature.clone().into(),
            user_handle: aarr.user_handle.clone().map(|uh| Vec::from(uh)),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::interface::{Authentication, Registration};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    // A "none" format attestation object captured from a real registration.
    const ATT_OBJ_NONE: &str = "o2NmbXRkbm9uZWdhdHRTdG10oGhhdXRoRGF0YVjEEsoXtJryKJQ28wPgFmAwoh5SXSZuIJJnQzgBqP1AcaBBAAAAAAAAAAAAAAAAAAAAAAAAAAAAQCgxaVISCxE+DrcxP5/+aPM88CTI+04J+o61SK6mnepjGZYv062AbtydzWmbAxF00VSAyp0ImP94uoy+0y7w9yilAQIDJiABIVggGT9woA+UoX+jBxuiHQpdkm0kCVh75WTj3TXl4zLJuzoiWCBKiCneKgWJgWiwrZedNwl06GTaXyaGrYS4bPbBraInyg==";

    // Assertion authenticator data (no attested credential data).
    const AUTH_DATA_ASSERTION: &str = "SZYN5YgOjGh0NBcPZHZgW4/krrmihjLHmVzzuoMdl2MBAAAAFA==";

    fn b64(data: &str) -> Vec<u8> {
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .or_else(|_| URL_SAFE_NO_PAD.decode(data))
            .expect("invalid test vector")
    }

    #[test]
    fn attestation_object_round_trip() {
        let raw = b64(ATT_OBJ_NONE);
        let att_obj = AttestationObject::<Registration>::try_from(raw.as_slice())
            .expect("attestation object did not decode");

        assert_eq!(att_obj.fmt, "none");
        let acd = att_obj.auth_data.acd.as_ref().expect("acd missing");
        assert!(acd.aaguid.is_nil());
        assert_eq!(acd.credential_id.len(), 64);

        // The full object and the inner authenticator data both re-encode
        // byte-identically.
        assert_eq!(att_obj.to_bytes().expect("re-encode failed"), raw);
        assert_eq!(att_obj.auth_data.to_bytes(), att_obj.auth_data_bytes);
    }

    #[test]
    fn assertion_authenticator_data_round_trip() {
        let raw = b64(AUTH_DATA_ASSERTION);
        let auth_data = AuthenticatorData::<Authentication>::try_from(raw.as_slice())
            .expect("authenticator data did not decode");

        assert!(auth_data.user_present);
        assert!(!auth_data.user_verified);
        assert_eq!(auth_data.counter, 20);
        assert!(auth_data.acd.is_none());
        assert_eq!(auth_data.to_bytes(), raw);
    }

    #[test]
    fn attested_credential_data_is_tolerated_on_assertions() {
        // Some clients return authenticator data with the AT flag set during
        // assertions, against the webauthn profile. The decoder tolerates
        // it; the assertion verifier never reads the attested data.
        let raw = b64(ATT_OBJ_NONE);
        let att_obj = AttestationObject::<Registration>::try_from(raw.as_slice())
            .expect("attestation object did not decode");

        let auth_data =
            AuthenticatorData::<Authentication>::try_from(att_obj.auth_data_bytes.as_slice())
                .expect("assertion decode must tolerate AT");
        assert!(auth_data.acd.is_some());
    }

    #[test]
    fn truncated_authenticator_data_is_rejected() {
        let raw = b64(AUTH_DATA_ASSERTION);
        assert!(matches!(
            AuthenticatorData::<Authentication>::try_from(&raw[..36]),
            Err(WebauthnError::AuthenticatorDataDecode)
        ));
        // Trailing garbage is rejected too.
        let mut long = raw.clone();
        long.push(0x00);
        assert!(matches!(
            AuthenticatorData::<Authentication>::try_from(long.as_slice()),
            Err(WebauthnError::AuthenticatorDataDecode)
        ));
    }

    #[test]
    fn attestation_object_requires_all_keys() {
        // {"fmt": "none", "attStmt": {}} - authData absent.
        let raw = hex_literal::hex!("a2 63 666d74 64 6e6f6e65 67 61747453746d74 a0");
        assert!(matches!(
            AttestationObject::<Registration>::try_from(raw.as_slice()),
            Err(WebauthnError::AttestationObjectDecode)
        ));
    }

    #[test]
    fn client_data_parse_and_reencode() {
        let raw = br#"{"type":"webauthn.create","challenge":"fXfCQ-MWmIbcj0t3xaVzlbuZ0zPXgOE4blA065WSZco","origin":"http://localhost:8080","crossOrigin":false,"other_keys_can_be_added_here":"do not compare clientDataJSON against a template. See https://goo.gl/yabPex"}"#;
        let ccd = parse_client_data(raw).expect("client data did not parse");

        assert_eq!(ccd.type_, "webauthn.create");
        assert_eq!(ccd.origin.as_str(), "http://localhost:8080/");
        assert_eq!(ccd.cross_origin, Some(false));
        assert_eq!(ccd.unknown_keys.len(), 1);

        // Re-encoding emits the fields in serialisation order - type,
        // challenge, origin, crossOrigin - and decodes back to an equal
        // value.
        let reencoded = serde_json::to_string(&ccd).expect("serialise failed");
        let prefix = r#"{"type":"webauthn.create","challenge":"fXfCQ-MWmIbcj0t3xaVzlbuZ0zPXgOE4blA065WSZco","origin":"http://localhost:8080/","crossOrigin":false"#;
        assert!(reencoded.starts_with(prefix));
        let again = parse_client_data(reencoded.as_bytes()).expect("reparse failed");
        assert_eq!(ccd, again);
    }

    #[test]
    fn client_data_tolerates_token_binding_and_legacy_fields() {
        let raw = br#"{"challenge":"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA","clientExtensions":{},"hashAlgorithm":"SHA-256","origin":"http://127.0.0.1:8080","type":"webauthn.create","tokenBinding":{"status":"supported"}}"#;
        let ccd = parse_client_data(raw).expect("client data did not parse");
        assert_eq!(ccd.token_binding.as_ref().map(|tb| tb.status.as_str()), Some("supported"));
        assert_eq!(ccd.challenge.as_ref(), &[0u8; 32]);
    }
}
