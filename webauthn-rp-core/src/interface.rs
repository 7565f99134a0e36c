//! Extended Structs and representations for Webauthn Operations. These types are designed
//! to allow persistance and should not change.

use base64urlsafedata::Base64UrlSafeData;
use openssl::x509;
use serde::{Deserialize, Serialize};

use fido_metadata::MetadataEntry;
use webauthn_rp_proto::cose::COSEAlgorithm;
use webauthn_rp_proto::options::{AuthenticatorTransport, CredentialID, UserVerificationPolicy};

pub use crate::crypto::{COSEEC2Key, COSEKey, COSEKeyType, COSEOKPKey, COSERSAKey};
pub use crate::crypto::{ECDSACurve, EDDSACurve};

/// Marker type parameter for data related to registration ceremony
#[derive(Debug)]
pub struct Registration;

/// Marker type parameter for data related to authentication ceremony
#[derive(Debug)]
pub struct Authentication;

/// Trait for ceremony marker structs
pub trait Ceremony: std::fmt::Debug {
    /// The client-data `type` value bound to this ceremony.
    const CEREMONY_TYPE: &'static str;
}

impl Ceremony for Registration {
    const CEREMONY_TYPE: &'static str = "webauthn.create";
}

impl Ceremony for Authentication {
    const CEREMONY_TYPE: &'static str = "webauthn.get";
}

/// The in progress state of a credential registration attempt. You must persist this associated
/// to the UserID requesting the registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationState {
    pub(crate) policy: UserVerificationPolicy,
    pub(crate) exclude_credentials: Vec<CredentialID>,
    pub(crate) challenge: Base64UrlSafeData,
    pub(crate) credential_algorithms: Vec<COSEAlgorithm>,
    pub(crate) user_id: Base64UrlSafeData,
}

/// The in progress state of an authentication attempt. You must persist this associated to the
/// UserID requesting the authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationState {
    pub(crate) credentials: Vec<Credential>,
    pub(crate) policy: UserVerificationPolicy,
    pub(crate) challenge: Base64UrlSafeData,
}

impl AuthenticationState {
    /// set which credentials the user is allowed to authenticate with. Used
    /// in client-side discoverable credential workflows where the set is
    /// only known after the response's user handle is inspected.
    pub fn set_allowed_credentials(&mut self, credentials: Vec<Credential>) {
        self.credentials = credentials;
    }

    /// The challenge bytes issued for this ceremony.
    pub fn challenge(&self) -> &[u8] {
        self.challenge.as_ref()
    }
}

/// A user's authenticator credential - the record the relying party stores
/// per registered credential.
///
/// The public key is retained as the exact COSE bytes the authenticator
/// emitted, not a re-encoding: assertion verification re-decodes these bytes
/// and the value they were decoded from must be byte-identical to what was
/// originally signed over during registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// The ID of this credential.
    pub cred_id: CredentialID,
    /// The user this credential belongs to, as supplied in the registration
    /// options.
    pub user_handle: Base64UrlSafeData,
    /// The COSE public key, exactly as received in the attested credential
    /// data.
    pub cred_pk_bytes: Base64UrlSafeData,
    /// The signature counter at registration, updated on each successful
    /// assertion where the counter advances.
    pub counter: u32,
    /// The transports the authenticator reported for this credential, if
    /// any.
    pub transports: Option<Vec<AuthenticatorTransport>>,
    /// During registration, if this credential was verified
    /// then this is true. If not it is false. This is based on
    /// the policy at the time of registration of the credential.
    pub verified: bool,
}

/// The attestation trust path produced by a format verifier, prior to
/// resolution against the metadata registry.
#[derive(Debug)]
pub enum ParsedAttestationData {
    /// The credential is authenticated by a signing X509 Certificate chain
    /// from a vendor or provider.
    Basic(Vec<x509::X509>),
    /// The credential is authenticated using surrogate basic attestation
    /// it uses the credential private key to create the attestation signature
    SelfAttestation,
    /// The credential is authenticated using a CA, and may provide a
    /// ca chain to validate to it's root.
    AttCa(Vec<x509::X509>),
    /// The credential is authenticated using an anonymization CA, and may provide a ca chain to
    /// validate to it's root.
    AnonCa(Vec<x509::X509>),
    /// No trust was asserted with this Credential. If in doubt, reject this
    /// type.
    Uncertain,
}

/// How an attestation chain resolved against the metadata registry.
#[derive(Debug, Clone)]
pub enum AttestationTrust {
    /// The chain verified to an attestation root of a registered metadata
    /// entry for the credential's authenticator model.
    Trusted(Box<MetadataEntry>),
    /// A chain was presented, but the model is unknown to the registry or
    /// the chain did not verify to the registered roots.
    Unknown,
    /// No chain was presented - self attestation, or no attestation at all.
    /// Trust rests on the credential key alone.
    None,
}

/// The result of a successful registration ceremony.
#[derive(Debug)]
pub struct AttestationResult {
    /// The credential to persist, associated to the registering user.
    pub credential: Credential,
    /// The verified trust path the attestation statement produced.
    pub attestation: ParsedAttestationData,
    /// The resolution of that trust path against the metadata registry.
    pub trust: AttestationTrust,
}

/// The classification of the signature counter after a successful
/// assertion.
///
/// `PotentiallyCloned` is a *successful* outcome carrying a risk signal -
/// whether to fail the ceremony, warn, or continue is deliberately left to
/// the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCounterResult {
    /// Neither the stored nor the received counter has ever advanced - the
    /// authenticator does not implement a counter.
    Zero,
    /// The counter advanced. Persist the new value against the credential.
    Updated(u32),
    /// The received counter did not advance past the stored value. At least
    /// two copies of the credential private key may exist.
    PotentiallyCloned {
        /// The counter stored against the credential.
        stored: u32,
        /// The counter the authenticator just reported.
        received: u32,
    },
}

/// The result of a successful authentication ceremony.
#[derive(Debug)]
pub struct AuthenticationResult {
    /// The credential that signed the assertion.
    pub cred_id: CredentialID,
    /// The signature counter classification. The caller decides the policy
    /// for `PotentiallyCloned`.
    pub counter: SignatureCounterResult,
    /// Whether the authenticator asserted user verification.
    pub user_verified: bool,
}

/// Classify a signature counter transition per the webauthn clone detection
/// rules.
pub(crate) fn classify_counter(stored: u32, received: u32) -> SignatureCounterResult {
    if stored == 0 && received == 0 {
        SignatureCounterResult::Zero
    } else if received > stored {
        SignatureCounterResult::Updated(received)
    } else {
        SignatureCounterResult::PotentiallyCloned { stored, received }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_classification_boundaries() {
        assert_eq!(classify_counter(0, 0), SignatureCounterResult::Zero);
        assert_eq!(classify_counter(5, 6), SignatureCounterResult::Updated(6));
        assert_eq!(
            classify_counter(5, 5),
            SignatureCounterResult::PotentiallyCloned {
                stored: 5,
                received: 5
            }
        );
        assert_eq!(
            classify_counter(5, 4),
            SignatureCounterResult::PotentiallyCloned {
                stored: 5,
                received: 4
            }
        );
        // A counter that starts being used after registration at zero.
        assert_eq!(classify_counter(0, 1), SignatureCounterResult::Updated(1));
        // A zero report against a non-zero store is a clone signal, not
        // "counter unused".
        assert_eq!(
            classify_counter(3, 0),
            SignatureCounterResult::PotentiallyCloned {
                stored: 3,
                received: 0
            }
        );
    }
}
