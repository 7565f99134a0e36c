//! Types that define options as to how an authenticator may interact with
//! with the server.

use base64urlsafedata::Base64UrlSafeData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A credential ID type. At the moment this is a vector of bytes, but
/// it could also be a future change for this to be base64 string instead.
///
/// If changed, this would likely be a major library version change.
pub type CredentialID = Base64UrlSafeData;

/// Defines the User Authenticator Verification policy. This is documented
/// <https://w3c.github.io/webauthn/#enumdef-userverificationrequirement>, and each
/// variant lists it's effects.
///
/// To be clear, Verification means that the Authenticator perform extra or supplementary
/// interaction with the user to verify who they are. An example of this is Apple Touch Id
/// required a fingerprint to be verified, or a yubico device requiring a pin in addition to
/// a touch event.
///
/// An example of a non-verified interaction is a yubico device with no pin where touch is
/// the only interaction - we only verify a user is present, but we don't have extra details
/// to the legitimacy of that user.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationPolicy {
    /// Require User Verification bit to be set, and fail the registration or authentication
    /// if false. If the authenticator is not able to perform verification, it may not be
    /// usable with this policy.
    Required,
    /// Prefer User Verification bit to be set, and yolo the result. The
    /// presence or absence of the bit is not enforced by the server.
    #[default]
    Preferred,
    /// Request that no verification is performed, and fail if it is. This
    /// is intended to minimise user interaction in workflows.
    Discouraged,
}

/// Relying Party Entity
#[derive(Debug, Serialize, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelyingParty {
    /// The name of the relying party.
    pub name: String,
    /// The id of the relying party.
    pub id: String,
}

/// User Entity
#[derive(Debug, Serialize, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The user's id. This MUST be a unique id, and must NOT contain
    /// personally identifying information, as this value can NEVER
    /// be changed. If in doubt, use a UUID.
    pub id: Base64UrlSafeData,
    /// A detailed name for the account, such as an email address. This value
    /// **can** change, so **must not** be used as a primary key.
    pub name: String,
    /// The user's preferred name for display.
    pub display_name: String,
}

/// Public key cryptographic parameters
#[derive(Debug, Serialize, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PubKeyCredParams {
    /// The type of public-key credential.
    #[serde(rename = "type")]
    pub type_: String,
    /// The algorithm in use defined by COSE.
    pub alg: i64,
}

impl PubKeyCredParams {
    /// Construct parameters for the given COSE algorithm identifier.
    pub fn new(alg: i64) -> Self {
        PubKeyCredParams {
            type_: "public-key".to_string(),
            alg,
        }
    }
}

/// <https://www.w3.org/TR/webauthn/#enumdef-attestationconveyancepreference>
#[derive(Debug, Serialize, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttestationConveyancePreference {
    /// Do not request attestation.
    /// <https://www.w3.org/TR/webauthn/#dom-attestationconveyancepreference-none>
    #[default]
    None,

    /// Request attestation in a semi-anonymized form.
    /// <https://www.w3.org/TR/webauthn/#dom-attestationconveyancepreference-indirect>
    Indirect,

    /// Request attestation in a direct form.
    /// <https://www.w3.org/TR/webauthn/#dom-attestationconveyancepreference-direct>
    Direct,
}

/// <https://www.w3.org/TR/webauthn/#enumdef-authenticatortransport>
///
/// Firmware and clients ship transport strings faster than the specification
/// revises its enumeration, so values outside the closed set are preserved
/// rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthenticatorTransport {
    /// <https://www.w3.org/TR/webauthn/#dom-authenticatortransport-usb>
    Usb,
    /// <https://www.w3.org/TR/webauthn/#dom-authenticatortransport-nfc>
    Nfc,
    /// <https://www.w3.org/TR/webauthn/#dom-authenticatortransport-ble>
    Ble,
    /// <https://www.w3.org/TR/webauthn/#dom-authenticatortransport-internal>
    Internal,
    /// Hybrid transport, formerly caBLE.
    Hybrid,
    /// A transport value this library does not know about. Stored as
    /// received so that it round-trips to the client unaltered.
    Unknown(String),
}

impl From<String> for AuthenticatorTransport {
    fn from(s: String) -> Self {
        match s.as_str() {
            "usb" => AuthenticatorTransport::Usb,
            "nfc" => AuthenticatorTransport::Nfc,
            "ble" => AuthenticatorTransport::Ble,
            "internal" => AuthenticatorTransport::Internal,
            "hybrid" => AuthenticatorTransport::Hybrid,
            _ => AuthenticatorTransport::Unknown(s),
        }
    }
}

impl From<AuthenticatorTransport> for String {
    fn from(t: AuthenticatorTransport) -> Self {
        match t {
            AuthenticatorTransport::Usb => "usb".to_string(),
            AuthenticatorTransport::Nfc => "nfc".to_string(),
            AuthenticatorTransport::Ble => "ble".to_string(),
            AuthenticatorTransport::Internal => "internal".to_string(),
            AuthenticatorTransport::Hybrid => "hybrid".to_string(),
            AuthenticatorTransport::Unknown(s) => s,
        }
    }
}

impl fmt::Display for AuthenticatorTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticatorTransport::Unknown(s) => write!(f, "{}", s),
            t => write!(f, "{}", String::from(t.clone())),
        }
    }
}

/// <https://www.w3.org/TR/webauthn/#dictdef-publickeycredentialdescriptor>
#[derive(Debug, Serialize, Clone, Deserialize, PartialEq, Eq)]
pub struct PublicKeyCredentialDescriptor {
    /// The type of credential
    #[serde(rename = "type")]
    pub type_: String,
    /// The credential id.
    pub id: Base64UrlSafeData,
    /// The allowed transports for this credential. Note this is a hint, and is NOT
    /// enforced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<AuthenticatorTransport>>,
}

impl PublicKeyCredentialDescriptor {
    /// Constructed from a byte array representing a credential id.
    pub fn from_bytes(bytes: CredentialID) -> Self {
        PublicKeyCredentialDescriptor {
            type_: "public-key".to_string(),
            id: bytes,
            transports: None,
        }
    }
}

/// A descriptor of a credential that can be used.
#[derive(Debug, Serialize, Clone, Deserialize, PartialEq, Eq)]
pub struct AllowCredentials {
    #[serde(rename = "type")]
    /// The type of credential.
    pub type_: String,
    /// The id of the credential.
    pub id: Base64UrlSafeData,
    /// <https://www.w3.org/TR/webauthn/#transport>
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<AuthenticatorTransport>>,
}

/// The authenticator attachment hint. This is NOT enforced, and is only used
/// to help a user select a relevant authenticator type.
///
/// <https://www.w3.org/TR/webauthn/#attachment>
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthenticatorAttachment {
    /// Request a device that is part of the machine aka inseperable.
    /// <https://www.w3.org/TR/webauthn/#attachment>
    #[serde(rename = "platform")]
    Platform,
    /// Request a device that can be seperated from the machine aka an external token.
    /// <https://www.w3.org/TR/webauthn/#attachment>
    #[serde(rename = "cross-platform")]
    CrossPlatform,
}

/// The Relying Party's requirement for client-side discoverable credentials.
///
/// <https://www.w3.org/TR/webauthn-2/#enum-residentKeyRequirement>
#[derive(Debug, Serialize, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResidentKeyRequirement {
    /// The authenticator should not create a resident key.
    #[default]
    Discouraged,
    /// The authenticator can create a resident key if it wishes.
    Preferred,
    /// The authenticator MUST create a resident key.
    Required,
}

#[derive(Debug, Serialize, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticatorSelectionCriteriaWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    authenticator_attachment: Option<AuthenticatorAttachment>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    require_resident_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    resident_key: Option<ResidentKeyRequirement>,
    #[serde(default)]
    user_verification: UserVerificationPolicy,
}

/// <https://www.w3.org/TR/webauthn/#dictdef-authenticatorselectioncriteria>
///
/// `requireResidentKey` is a level 1 compatibility alias of `residentKey` -
/// on decode an absent `residentKey` falls back to it, and on encode it is
/// emitted exactly when `resident_key` is `Required`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    from = "AuthenticatorSelectionCriteriaWire",
    into = "AuthenticatorSelectionCriteriaWire"
)]
pub struct AuthenticatorSelectionCriteria {
    /// How the authenticator should be attached to the client machine.
    /// Note this is only a hint. It is not enforced in anyway shape or form.
    /// <https://www.w3.org/TR/webauthn/#attachment>
    pub authenticator_attachment: Option<AuthenticatorAttachment>,

    /// Hint to the credential to create a resident key. Note this can not be enforced
    /// or validated, so the authenticator may choose to ignore this parameter.
    /// <https://www.w3.org/TR/webauthn/#resident-credential>
    pub resident_key: ResidentKeyRequirement,

    /// The user verification level to request during registration. Depending on if this
    /// authenticator provides verification may affect future interactions as this is
    /// associated to the credential during registration.
    pub user_verification: UserVerificationPolicy,
}

impl From<AuthenticatorSelectionCriteriaWire> for AuthenticatorSelectionCriteria {
    fn from(wire: AuthenticatorSelectionCriteriaWire) -> Self {
        let resident_key = wire.resident_key.unwrap_or(if wire.require_resident_key {
            ResidentKeyRequirement::Required
        } else {
            ResidentKeyRequirement::Discouraged
        });
        AuthenticatorSelectionCriteria {
            authenticator_attachment: wire.authenticator_attachment,
            resident_key,
            user_verification: wire.user_verification,
        }
    }
}

impl From<AuthenticatorSelectionCriteria> for AuthenticatorSelectionCriteriaWire {
    fn from(asc: AuthenticatorSelectionCriteria) -> Self {
        AuthenticatorSelectionCriteriaWire {
            authenticator_attachment: asc.authenticator_attachment,
            require_resident_key: asc.resident_key == ResidentKeyRequirement::Required,
            resident_key: Some(asc.resident_key),
            user_verification: asc.user_verification,
        }
    }
}

impl Default for AuthenticatorSelectionCriteria {
    fn default() -> Self {
        AuthenticatorSelectionCriteria {
            authenticator_attachment: None,
            resident_key: ResidentKeyRequirement::Discouraged,
            user_verification: UserVerificationPolicy::Preferred,
        }
    }
}

/// The data collected and hashed in the operation.
/// <https://www.w3.org/TR/webauthn-2/#dictdef-collectedclientdata>
///
/// Field order matters: re-serialisation emits `type, challenge, origin,
/// crossOrigin` per the client-data serialisation rules.
#[derive(Debug, Serialize, Clone, Deserialize, PartialEq)]
pub struct CollectedClientData {
    /// The ceremony type, `webauthn.create` or `webauthn.get`.
    #[serde(rename = "type")]
    pub type_: String,
    /// The challenge.
    pub challenge: Base64UrlSafeData,
    /// The rp origin as the browser understood it.
    pub origin: url::Url,
    /// The inverse of the sameOriginWithAncestors argument value that was
    /// passed into the internal method.
    #[serde(rename = "crossOrigin", skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<bool>,
    /// tokenBinding. Decoded for completeness, never enforced.
    #[serde(rename = "tokenBinding", skip_serializing_if = "Option::is_none")]
    pub token_binding: Option<TokenBinding>,
    /// This struct be extended, so it's important to be tolerant of unknown
    /// keys.
    #[serde(flatten)]
    pub unknown_keys: BTreeMap<String, serde_json::value::Value>,
}

/// Token binding
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TokenBinding {
    /// status
    pub status: String,
    /// id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}
