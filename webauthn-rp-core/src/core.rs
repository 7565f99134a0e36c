//! The registration and authentication ceremony verifiers.
//!
//! This is the core of the Webauthn operations. It provides 4 interfaces
//! that you will likely use the most:
//! * generate_challenge_register
//! * register_credential
//! * generate_challenge_authenticate
//! * authenticate_credential
//!
//! The generate functions return Json challenges that are intended to be
//! processed by the client browser, and the register and authenticate
//! functions receive Json that is verified.
//!
//! Verification is *accumulating*: every independent policy check runs and
//! all violations are reported together, so a failing response tells the
//! caller (and the tests) everything that was wrong with it at once.

use rand::prelude::*;
use std::convert::TryFrom;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

use openssl::stack;
use openssl::x509::{self, store, verify::X509VerifyFlags};

use crate::attestation::SupportedFormats;
use crate::constants::{AUTHENTICATOR_TIMEOUT_MS, CHALLENGE_SIZE_BYTES};
use crate::crypto::{challenges_match, compute_sha1, compute_sha256, COSEKey};
use crate::error::{WebauthnError, WebauthnErrors, WebauthnResult};
use crate::interface::*;
use crate::internals::{
    AttestedCredentialData, AuthenticatorAssertionResponse, AuthenticatorAttestationResponse,
};

use fido_metadata::{AuthenticatorIdentifier, MetadataRegistry, SubjectKeyId};
use webauthn_rp_proto::attest::{
    CreationChallengeResponse, PublicKeyCredentialCreationOptions, RegisterPublicKeyCredential,
};
use webauthn_rp_proto::auth::{
    PublicKeyCredential, PublicKeyCredentialRequestOptions, RequestChallengeResponse,
};
use webauthn_rp_proto::cose::COSEAlgorithm;
use webauthn_rp_proto::options::*;

/// The core webauthn verifier. Construct one per relying party with your
/// [`WebauthnConfig`] and share it - all operations take `&self` and the
/// verification paths perform no I/O.
#[derive(Debug)]
pub struct Webauthn<T> {
    config: T,
    rp_id_hash: Vec<u8>,
    formats: SupportedFormats,
}

impl<T> Webauthn<T> {
    /// Create a new Webauthn instance with the supplied configuration. The
    /// attestation format set defaults to everything this library
    /// implements.
    pub fn new(config: T) -> Self
    where
        T: WebauthnConfig,
    {
        let rp_id_hash = compute_sha256(config.get_relying_party_id().as_bytes()).to_vec();
        Webauthn {
            config,
            rp_id_hash,
            formats: SupportedFormats::default(),
        }
    }

    /// Replace the supported attestation format set.
    pub fn with_formats(mut self, formats: SupportedFormats) -> Self {
        self.formats = formats;
        self
    }

    fn generate_challenge(&self) -> Vec<u8> {
        let mut rng = rand::thread_rng();
        rng.gen::<[u8; CHALLENGE_SIZE_BYTES]>().to_vec()
    }

    /// Generate a new challenge for client registration. This is the first
    /// step in the lifecycle of a credential. The
    /// [`CreationChallengeResponse`] is serialised to the client to be given
    /// to `navigator.credentials.create()`; the [`RegistrationState`] must
    /// be persisted (commonly in the pending-challenge store) for the
    /// matching call to [`Webauthn::register_credential`].
    pub fn generate_challenge_register(
        &self,
        user_id: &[u8],
        user_name: &str,
        user_display_name: &str,
        exclude_credentials: Option<Vec<CredentialID>>,
        policy: Option<UserVerificationPolicy>,
    ) -> WebauthnResult<(CreationChallengeResponse, RegistrationState)>
    where
        T: WebauthnConfig,
    {
        let policy = policy.unwrap_or_default();
        let challenge = self.generate_challenge();
        let credential_algorithms = self.config.get_credential_algorithms();

        let c = CreationChallengeResponse {
            public_key: PublicKeyCredentialCreationOptions {
                rp: RelyingParty {
                    name: self.config.get_relying_party_name().to_owned(),
                    id: self.config.get_relying_party_id().to_owned(),
                },
                user: User {
                    id: user_id.to_vec().into(),
                    name: user_name.to_owned(),
                    display_name: user_display_name.to_owned(),
                },
                challenge: challenge.clone().into(),
                pub_key_cred_params: credential_algorithms
                    .iter()
                    .map(|alg| PubKeyCredParams::new(*alg as i64))
                    .collect(),
                timeout: Some(self.config.get_authenticator_timeout()),
                attestation: self.config.get_attestation_preference(),
                exclude_credentials: exclude_credentials
                    .clone()
                    .unwrap_or_default()
                    .into_iter()
                    .map(PublicKeyCredentialDescriptor::from_bytes)
                    .collect(),
                authenticator_selection: Some(AuthenticatorSelectionCriteria {
                    authenticator_attachment: self.config.get_authenticator_attachment(),
                    resident_key: self.config.get_resident_key_requirement(),
                    user_verification: policy,
                }),
            },
        };

        let state = RegistrationState {
            policy,
            exclude_credentials: exclude_credentials.unwrap_or_default(),
            challenge: challenge.into(),
            credential_algorithms,
            user_id: user_id.to_vec().into(),
        };

        Ok((c, state))
    }

    /// Process a credential registration response - the output of
    /// `navigator.credentials.create()`. Performs the checks of WebAuthn
    /// §7.1 against the persisted [`RegistrationState`], verifies the
    /// attestation statement, and resolves its trust path against the
    /// metadata registry.
    ///
    /// `now` pins certificate validity decisions so the caller (and tests)
    /// own the clock.
    ///
    /// On success, persist the returned credential associated to the user.
    /// The trust classification is deliberately returned rather than
    /// enforced: sites differ on whether `Unknown` attestation is
    /// acceptable.
    pub fn register_credential(
        &self,
        reg: &RegisterPublicKeyCredential,
        state: &RegistrationState,
        registry: &MetadataRegistry,
        now: SystemTime,
    ) -> Result<AttestationResult, WebauthnErrors>
    where
        T: WebauthnConfig,
    {
        let mut errors: Vec<WebauthnError> = Vec::new();

        // Decoding failures are terminal - there is nothing else to check
        // against.
        let data = AuthenticatorAttestationResponse::<Registration>::try_from(&reg.response)
            .map_err(WebauthnErrors::from)?;

        // 1. Verify that the value of C.type is webauthn.create.
        if data.client_data.type_ != Registration::CEREMONY_TYPE {
            errors.push(WebauthnError::CeremonyTypeMismatch);
        }

        // 2. Verify that the value of C.challenge matches the challenge that
        // was sent to the authenticator in the create() call.
        if !challenges_match(data.client_data.challenge.as_ref(), state.challenge.as_ref()) {
            errors.push(WebauthnError::ChallengeMismatch);
        }

        // 3. Verify that the value of C.origin matches the Relying Party's
        // origin.
        if &data.client_data.origin != self.config.get_origin() {
            debug!(
                client = %data.client_data.origin,
                expected = %self.config.get_origin(),
                "origin mismatch"
            );
            errors.push(WebauthnError::OriginMismatch);
        }

        // 4. Compute the hash of response.clientDataJSON using SHA-256.
        let client_data_hash = compute_sha256(&data.client_data_bytes);

        let auth_data = &data.attestation_object.auth_data;

        // 5. Verify that the rpIdHash in authData is the SHA-256 hash of the
        // RP ID expected by the Relying Party. Remember that the RP ID is
        // NOT the same as the RP name - it is derived from the RP origin.
        if auth_data.rp_id_hash != self.rp_id_hash {
            errors.push(WebauthnError::RpIdHashMismatch);
        }

        // 6. Verify that the User Present bit of the flags in authData is
        // set; if user verification is required for this registration,
        // verify the User Verified bit too.
        if !auth_data.user_present {
            errors.push(WebauthnError::UserNotPresent);
        }
        if state.policy == UserVerificationPolicy::Required && !auth_data.user_verified {
            errors.push(WebauthnError::UserNotVerified);
        }

        // Registration requires the attested credential data; without it
        // there is no credential to register and nothing further to check.
        let acd = match auth_data.acd.as_ref() {
            Some(acd) => acd,
            None => {
                errors.push(WebauthnError::MissingAttestedCredentialData);
                return Err(WebauthnErrors(errors));
            }
        };

        // OUT OF SPEC - exclude any credential that is in our exclude list.
        if state
            .exclude_credentials
            .iter()
            .any(|excluded| excluded.as_ref() == acd.credential_id.as_slice())
        {
            errors.push(WebauthnError::CredentialExcluded);
        }

        // 7. Verify that the "alg" parameter in the credential public key in
        // authData matches the alg attribute of one of the items in
        // options.pubKeyCredParams.
        let cose_key = match COSEKey::try_from(&acd.credential_pk).and_then(|k| {
            k.validate()?;
            Ok(k)
        }) {
            Ok(k) => {
                if !state.credential_algorithms.contains(&k.type_) {
                    errors.push(WebauthnError::AlgorithmNotAllowed);
                }
                Some(k)
            }
            Err(e) => {
                errors.push(e);
                None
            }
        };

        // 8. Determine the attestation statement format by performing a
        // USASCII case-sensitive match on fmt against the set of supported
        // format identifiers, and verify that attStmt is a correct
        // attestation statement conveying a valid attestation signature.
        let attestation = if cose_key.is_some() {
            match self.formats.lookup(data.attestation_object.fmt.as_str()) {
                Some(verifier) => {
                    match verifier.verify(acd, &data.attestation_object, &client_data_hash, now) {
                        Ok(att) => Some(att),
                        Err(e) => {
                            errors.push(e);
                            None
                        }
                    }
                }
                None => {
                    errors.push(WebauthnError::AttestationFormatUnsupported);
                    None
                }
            }
        } else {
            // The statement can not be meaningfully verified without a
            // usable credential key.
            None
        };

        // 9. Assess the attestation trustworthiness: resolve the trust path
        // against the metadata registry keyed by the authenticator
        // identifier.
        let trust = match attestation.as_ref() {
            Some(att) => match classify_attestation_trust(att, acd, registry, now) {
                Ok(trust) => Some(trust),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
            None => None,
        };

        match (attestation, trust) {
            (Some(attestation), Some(trust)) if errors.is_empty() => {
                // 10. Register the new credential with the account that was
                // denoted in options.user - assembled here, persisted by the
                // caller.
                let credential = Credential {
                    cred_id: acd.credential_id.clone().into(),
                    user_handle: state.user_id.clone(),
                    cred_pk_bytes: acd.credential_pk_bytes.clone().into(),
                    counter: auth_data.counter,
                    transports: data.transports.clone(),
                    verified: auth_data.user_verified,
                };

                Ok(AttestationResult {
                    credential,
                    attestation,
                    trust,
                })
            }
            _ => {
                if errors.is_empty() {
                    // Unreachable in practice: attestation/trust are only
                    // absent when an error was pushed.
                    errors.push(WebauthnError::AttestationFormatUnsupported);
                }
                Err(WebauthnErrors(errors))
            }
        }
    }

    /// Generate a challenge for an authenticate request for a user. You
    /// must supply the set of credentials that exist for the user that
    /// *may* be used in this authentication request. If an empty credential
    /// set is supplied, the authentication *will* fail unless the set is
    /// later replaced via
    /// [`AuthenticationState::set_allowed_credentials`].
    pub fn generate_challenge_authenticate(
        &self,
        credentials: Vec<Credential>,
        policy: Option<UserVerificationPolicy>,
    ) -> WebauthnResult<(RequestChallengeResponse, AuthenticationState)>
    where
        T: WebauthnConfig,
    {
        let policy = policy.unwrap_or_default();
        let challenge = self.generate_challenge();

        let allow_credentials = credentials
            .iter()
            .map(|cred| AllowCredentials {
                type_: "public-key".to_string(),
                id: cred.cred_id.clone(),
                transports: cred.transports.clone(),
            })
            .collect();

        let r = RequestChallengeResponse {
            public_key: PublicKeyCredentialRequestOptions {
                challenge: challenge.clone().into(),
                timeout: Some(self.config.get_authenticator_timeout()),
                rp_id: self.config.get_relying_party_id().to_owned(),
                allow_credentials,
                user_verification: policy,
            },
        };

        let state = AuthenticationState {
            credentials,
            policy,
            challenge: challenge.into(),
        };

        Ok((r, state))
    }

    /// Process an authentication response - the output of
    /// `navigator.credentials.get()` - against the persisted
    /// [`AuthenticationState`], performing the checks of WebAuthn §7.2.
    ///
    /// `identified_user` is the user handle the server identified before
    /// the ceremony (via a session or username), if any. Either it or the
    /// response's user handle must identify the credential owner.
    ///
    /// On success the caller should persist the counter if it was
    /// [`SignatureCounterResult::Updated`], and decide its policy for
    /// [`SignatureCounterResult::PotentiallyCloned`].
    pub fn authenticate_credential(
        &self,
        rsp: &PublicKeyCredential,
        state: &AuthenticationState,
        identified_user: Option<&[u8]>,
    ) -> Result<AuthenticationResult, WebauthnErrors>
    where
        T: WebauthnConfig,
    {
        let mut errors: Vec<WebauthnError> = Vec::new();

        // 1. If the allowCredentials option was given when this ceremony
        // was initiated, verify that credential.id identifies one of the
        // public key credentials listed in it. The supplied state is that
        // list.
        let cred = match state
            .credentials
            .iter()
            .find(|cred| cred.cred_id.as_ref() == rsp.raw_id.as_ref())
        {
            Some(cred) => cred,
            None => {
                return Err(WebauthnError::DisallowedCredential.into());
            }
        };

        let data = AuthenticatorAssertionResponse::<Authentication>::try_from(&rsp.response)
            .map_err(WebauthnErrors::from)?;

        // 2. Identify the user being authenticated and verify that this
        // user is the owner of the public key credential source.
        match (identified_user, data.user_handle.as_deref()) {
            (None, None) => errors.push(WebauthnError::CannotVerifyUserHandle),
            (identified, response_handle) => {
                if let Some(identified) = identified {
                    if identified != cred.user_handle.as_ref() {
                        errors.push(WebauthnError::IdentifiedUserHandleMismatch);
                    }
                }
                if let Some(response_handle) = response_handle {
                    if response_handle != cred.user_handle.as_ref() {
                        errors.push(WebauthnError::CredentialUserHandleMismatch);
                    }
                }
            }
        }

        // 3. Verify that the value of C.type is the string webauthn.get,
        // and that challenge and origin match this ceremony.
        if data.client_data.type_ != Authentication::CEREMONY_TYPE {
            errors.push(WebauthnError::CeremonyTypeMismatch);
        }

        if !challenges_match(data.client_data.challenge.as_ref(), state.challenge.as_ref()) {
            errors.push(WebauthnError::ChallengeMismatch);
        }

        if &data.client_data.origin != self.config.get_origin() {
            debug!(
                client = %data.client_data.origin,
                expected = %self.config.get_origin(),
                "origin mismatch"
            );
            errors.push(WebauthnError::OriginMismatch);
        }

        // 4. Verify that the rpIdHash in authData is the SHA-256 hash of
        // the RP ID expected by the Relying Party.
        if data.authenticator_data.rp_id_hash != self.rp_id_hash {
            errors.push(WebauthnError::RpIdHashMismatch);
        }

        // 5. Verify that the User Present bit of the flags in authData is
        // set, and the User Verified bit when required by policy.
        if !data.authenticator_data.user_present {
            errors.push(WebauthnError::UserNotPresent);
        }
        if state.policy == UserVerificationPolicy::Required
            && !data.authenticator_data.user_verified
        {
            errors.push(WebauthnError::UserNotVerified);
        }

        // 6. Decode the stored credential public key - the exact bytes
        // captured at registration - and re-check it.
        match COSEKey::try_from(cred.cred_pk_bytes.as_ref()).and_then(|k| {
            k.validate()?;
            Ok(k)
        }) {
            Ok(cose_key) => {
                // 7. Using the credential public key, verify that sig is a
                // valid signature over the binary concatenation of authData
                // and the hash of the client data.
                //
                // Note: This verification step is compatible with signatures
                // generated by FIDO U2F authenticators.
                let client_data_hash = compute_sha256(&data.client_data_bytes);
                let mut verification_data = Vec::with_capacity(
                    data.authenticator_data_bytes.len() + client_data_hash.len(),
                );
                verification_data.extend_from_slice(&data.authenticator_data_bytes);
                verification_data.extend_from_slice(&client_data_hash);

                match cose_key.verify_signature(&data.signature, &verification_data) {
                    Ok(true) => {}
                    Ok(false) => errors.push(WebauthnError::SignatureInvalid),
                    Err(e) => errors.push(e),
                }
            }
            Err(e) => errors.push(e),
        }

        if !errors.is_empty() {
            return Err(WebauthnErrors(errors));
        }

        // 8. Classify the signature counter. A counter that did not advance
        // is a clone signal, not a verification failure - the caller owns
        // that policy.
        Ok(AuthenticationResult {
            cred_id: cred.cred_id.clone(),
            counter: classify_counter(cred.counter, data.authenticator_data.counter),
            user_verified: data.authenticator_data.user_verified,
        })
    }
}

/// Resolve a verified trust path against the metadata registry.
///
/// Chains are keyed by AAGUID for FIDO2 authenticators; U2F devices carry a
/// zero AAGUID and are keyed by the SHA-1 subject key identifier of the
/// attestation leaf certificate. A chain that verifies to a root registered
/// for the model is `Trusted`; everything else that presented a chain is
/// `Unknown`.
fn classify_attestation_trust(
    attestation: &ParsedAttestationData,
    acd: &AttestedCredentialData,
    registry: &MetadataRegistry,
    now: SystemTime,
) -> Result<AttestationTrust, WebauthnError> {
    let chain = match attestation {
        ParsedAttestationData::Basic(chain)
        | ParsedAttestationData::AttCa(chain)
        | ParsedAttestationData::AnonCa(chain) => chain,
        ParsedAttestationData::SelfAttestation | ParsedAttestationData::Uncertain => {
            return Ok(AttestationTrust::None);
        }
    };

    let leaf = chain
        .first()
        .ok_or(WebauthnError::CertificateChainInvalid)?;

    let identifier = if acd.aaguid.is_nil() {
        AuthenticatorIdentifier::SubjectKeyIdentifier(subject_key_identifier(leaf)?)
    } else {
        AuthenticatorIdentifier::Aaguid(acd.aaguid)
    };

    let entry = match registry.lookup(&identifier) {
        Some(entry) => entry,
        None => {
            debug!(%identifier, "authenticator model not present in metadata registry");
            return Ok(AttestationTrust::Unknown);
        }
    };

    if verify_attestation_ca_chain(chain, &entry.attestation_root_certificates, now)? {
        Ok(AttestationTrust::Trusted(Box::new(entry.clone())))
    } else {
        info!(%identifier, "attestation chain did not verify to a registered root");
        Ok(AttestationTrust::Unknown)
    }
}

/// RFC5280 method 1: the SHA-1 digest of the subjectPublicKey bit string.
fn subject_key_identifier(cert: &x509::X509) -> Result<SubjectKeyId, WebauthnError> {
    let der = cert.to_der()?;
    let (_, parsed) = x509_parser::parse_x509_certificate(&der)
        .map_err(|_| WebauthnError::CertificateChainInvalid)?;
    let spk = &parsed.public_key().subject_public_key;
    Ok(SubjectKeyId(compute_sha1(spk.data.as_ref())))
}

/// Verify an attestation chain terminates at one of the supplied roots.
/// Chain signatures are checked by openssl; validity windows are checked
/// against the supplied time, since the verifiers never read a clock.
fn verify_attestation_ca_chain(
    fullchain: &[x509::X509],
    roots: &[x509::X509],
    now: SystemTime,
) -> Result<bool, WebauthnError> {
    // No trust anchors means no possible chain.
    if roots.is_empty() {
        return Ok(false);
    }

    let (leaf, chain) = fullchain
        .split_first()
        .ok_or(WebauthnError::CertificateChainInvalid)?;

    let mut chain_stack = stack::Stack::new()?;
    for crt in chain.iter() {
        chain_stack.push(crt.clone())?;
    }

    let mut ca_store = store::X509StoreBuilder::new()?;
    // A metadata trust anchor can be a root certificate, an intermediate CA
    // certificate or even the attestation certificate itself, so a partial
    // chain terminating at any registered anchor is acceptable.
    ca_store.set_flags(X509VerifyFlags::NO_CHECK_TIME | X509VerifyFlags::PARTIAL_CHAIN)?;
    for root in roots.iter() {
        ca_store.add_cert(root.clone())?;
    }
    let ca_store = ca_store.build();

    let mut ca_ctx = x509::X509StoreContext::new()?;
    let res = ca_ctx.init(&ca_store, leaf, &chain_stack, |ca_ctx_ref| {
        ca_ctx_ref.verify_cert().map(|_| {
            debug!(
                "ca_ctx_ref verify cert - error depth={}, sn={:?}",
                ca_ctx_ref.error_depth(),
                ca_ctx_ref.current_cert().map(|crt| crt.subject_name())
            );
            ca_ctx_ref.error()
        })
    })?;

    if res != x509::X509VerifyResult::OK {
        return Ok(false);
    }

    let now_secs = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs() as i64;

    for crt in fullchain.iter() {
        let der = crt.to_der()?;
        let (_, parsed) = x509_parser::parse_x509_certificate(&der)
            .map_err(|_| WebauthnError::CertificateChainInvalid)?;
        let validity = parsed.validity();
        if now_secs < validity.not_before.timestamp() || now_secs > validity.not_after.timestamp()
        {
            return Ok(false);
        }
    }

    Ok(true)
}

/// The WebauthnConfig type allows site-specific customisation of the
/// Webauthn library. This provides a set of callbacks which are used to
/// supply data to various structures and calls.
pub trait WebauthnConfig {
    /// Returns a copy of your relying parties name. This is generally any
    /// text identifier you wish, but should rarely if ever change. Changes
    /// to the relying party name may confuse authenticators and will cause
    /// their credentials to be lost.
    fn get_relying_party_name(&self) -> &str;

    /// Returns a reference to your sites origin. The origin is the URL to
    /// your site with protocol and port. This should rarely, if ever
    /// change. In production usage this value must always be https://,
    /// however http://localhost is acceptable for testing only.
    fn get_origin(&self) -> &Url;

    /// Returns the relying party id. This should never change, and is used
    /// as an id in cryptographic operations and credential scoping. This is
    /// defined as the domain name of the service, minus all protocol, port
    /// and location data. For example:
    ///   `https://name:port/path -> name`
    ///
    /// If changed, all associated credentials will be lost in all
    /// authenticators.
    fn get_relying_party_id(&self) -> &str;

    /// Get the list of valid credential algorithms that this service can
    /// accept. Unless you have specific requirements around this, we advise
    /// you leave this function to the default implementation.
    fn get_credential_algorithms(&self) -> Vec<COSEAlgorithm> {
        COSEAlgorithm::secure_algs()
    }

    /// Return a timeout on how long the authenticator has to respond to a
    /// challenge. This value defaults to 60000 milliseconds. You likely
    /// won't need to implement this function, and should rely on the
    /// defaults.
    fn get_authenticator_timeout(&self) -> u32 {
        AUTHENTICATOR_TIMEOUT_MS
    }

    /// Returns the default attestation preference. Defaults to `None`.
    ///
    /// DANGER: The client *may* alter this value, causing the registration
    /// to not contain an attestation. This is *not* a verified property -
    /// inspect the trust field of the attestation result if you rely on
    /// attestation.
    fn get_attestation_preference(&self) -> AttestationConveyancePreference {
        AttestationConveyancePreference::None
    }

    /// Get the preferred policy on authenticator attachment hint. Defaults
    /// to None (use any attachment method).
    ///
    /// WARNING: This is not enforced, as the client may modify the
    /// registration request to disregard this, and no part of the
    /// registration response indicates attachment. This is purely a hint,
    /// and is NOT a security enforcement.
    fn get_authenticator_attachment(&self) -> Option<AuthenticatorAttachment> {
        None
    }

    /// Get the site policy on discoverable (resident) keys. Defaults to
    /// discouraged.
    ///
    /// WARNING: This is not enforced - residence of credentials is not
    /// signalled in the registration response.
    fn get_resident_key_requirement(&self) -> ResidentKeyRequirement {
        ResidentKeyRequirement::Discouraged
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::ephemeral::WebauthnEphemeralConfig;
    use crate::interface::{AttestationTrust, ParsedAttestationData, SignatureCounterResult};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    fn pinned_now() -> SystemTime {
        // 2023-11-14, inside the validity window of every certificate used
        // in these vectors.
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn webauthn_for(name: &str, origin: &str, rp_id: &str) -> Webauthn<WebauthnEphemeralConfig> {
        let config =
            WebauthnEphemeralConfig::new(name, Url::parse(origin).expect("bad test origin"), rp_id);
        Webauthn::new(config)
    }

    fn registration_state(
        challenge: Vec<u8>,
        policy: UserVerificationPolicy,
        algorithms: Vec<COSEAlgorithm>,
    ) -> RegistrationState {
        RegistrationState {
            policy,
            exclude_credentials: Vec::new(),
            challenge: challenge.into(),
            credential_algorithms: algorithms,
            user_id: b"test-user".to_vec().into(),
        }
    }

    // Captured from a yubico 5 via duo-labs test infrastructure. The
    // attestation is fido-u2f with a single certificate chain element.
    const U2F_REGISTRATION: &str = r#"
    {
            "id": "FOxcmsqPLNCHtyILvbNkrtHMdKAeqSJXYZDbeFd0kc5Enm8Kl6a0Jp0szgLilDw1S4CjZhe9Z2611EUGbjyEmg",
            "rawId": "FOxcmsqPLNCHtyILvbNkrtHMdKAeqSJXYZDbeFd0kc5Enm8Kl6a0Jp0szgLilDw1S4CjZhe9Z2611EUGbjyEmg",
            "response": {
                    "attestationObject": "o2NmbXRoZmlkby11MmZnYXR0U3RtdKJjc2lnWEYwRAIgfyIhwZj-fkEVyT1GOK8chDHJR2chXBLSRg6bTCjODmwCIHH6GXI_BQrcR-GHg5JfazKVQdezp6_QWIFfT4ltTCO2Y3g1Y4FZAlMwggJPMIIBN6ADAgECAgQSNtF_MA0GCSqGSIb3DQEBCwUAMC4xLDAqBgNVBAMTI1l1YmljbyBVMkYgUm9vdCBDQSBTZXJpYWwgNDU3MjAwNjMxMCAXDTE0MDgwMTAwMDAwMFoYDzIwNTAwOTA0MDAwMDAwWjAxMS8wLQYDVQQDDCZZdWJpY28gVTJGIEVFIFNlcmlhbCAyMzkyNTczNDEwMzI0MTA4NzBZMBMGByqGSM49AgEGCCqGSM49AwEHA0IABNNlqR5emeDVtDnA2a-7h_QFjkfdErFE7bFNKzP401wVE-QNefD5maviNnGVk4HJ3CsHhYuCrGNHYgTM9zTWriGjOzA5MCIGCSsGAQQBgsQKAgQVMS4zLjYuMS40LjEuNDE0ODIuMS41MBMGCysGAQQBguUcAgEBBAQDAgUgMA0GCSqGSIb3DQEBCwUAA4IBAQAiG5uzsnIk8T6-oyLwNR6vRklmo29yaYV8jiP55QW1UnXdTkEiPn8mEQkUac-Sn6UmPmzHdoGySG2q9B-xz6voVQjxP2dQ9sgbKd5gG15yCLv6ZHblZKkdfWSrUkrQTrtaziGLFSbxcfh83vUjmOhDLFC5vxV4GXq2674yq9F2kzg4nCS4yXrO4_G8YWR2yvQvE2ffKSjQJlXGO5080Ktptplv5XN4i5lS-AKrT5QRVbEJ3B4g7G0lQhdYV-6r4ZtHil8mF4YNMZ0-RaYPxAaYNWkFYdzOZCaIdQbXRZefgGfbMUiAC2gwWN7fiPHV9eu82NYypGU32OijG9BjhGt_aGF1dGhEYXRhWMR0puqSE8mcL3SyJJKzIM9AJiqUwalQoDl_KSULYIQe8EEAAAAAAAAAAAAAAAAAAAAAAAAAAABAFOxcmsqPLNCHtyILvbNkrtHMdKAeqSJXYZDbeFd0kc5Enm8Kl6a0Jp0szgLilDw1S4CjZhe9Z2611EUGbjyEmqUBAgMmIAEhWCD_ap3Q9zU8OsGe967t48vyRxqn8NfFTk307mC1WsH2ISJYIIcqAuW3MxhU0uDtaSX8-Ftf_zeNJLdCOEjZJGHsrLxH",
                    "clientDataJSON": "eyJjaGFsbGVuZ2UiOiItUmk1TlpUeko4YjZtdlczVFZTY0xvdEVvQUxmZ0JhMkJuNFlTYUlPYkhjIiwib3JpZ2luIjoiaHR0cHM6Ly93ZWJhdXRobi5pbyIsInR5cGUiOiJ3ZWJhdXRobi5jcmVhdGUifQ"
            },
            "type": "public-key"
    }
    "#;

    #[test]
    fn registration_fido_u2f() {
        let wan = webauthn_for("webauthn.io", "https://webauthn.io", "webauthn.io");

        let chal = STANDARD
            .decode("+Ri5NZTzJ8b6mvW3TVScLotEoALfgBa2Bn4YSaIObHc=")
            .unwrap();
        let state = registration_state(
            chal,
            UserVerificationPolicy::Preferred,
            vec![COSEAlgorithm::ES256],
        );

        let rsp: RegisterPublicKeyCredential = serde_json::from_str(U2F_REGISTRATION).unwrap();
        let registry = MetadataRegistry::default();

        let result = wan
            .register_credential(&rsp, &state, &registry, pinned_now())
            .expect("registration failed");

        // U2F devices carry a single element chain, and an empty registry
        // can never resolve it past Unknown.
        assert!(matches!(
            result.attestation,
            ParsedAttestationData::Basic(ref chain) if chain.len() == 1
        ));
        assert!(matches!(result.trust, AttestationTrust::Unknown));
        assert_eq!(result.credential.counter, 0);
        assert_eq!(result.credential.user_handle.as_ref(), b"test-user");
        assert!(!result.credential.verified);
        // The stored key bytes decode and check.
        let key = COSEKey::try_from(result.credential.cred_pk_bytes.as_ref()).unwrap();
        key.validate().unwrap();
    }

    #[test]
    fn registration_fido_u2f_trusted_by_subject_key_identifier() {
        use fido_metadata::{MetadataEntry, WebauthnAttestationType};

        let wan = webauthn_for("webauthn.io", "https://webauthn.io", "webauthn.io");

        let chal = STANDARD
            .decode("+Ri5NZTzJ8b6mvW3TVScLotEoALfgBa2Bn4YSaIObHc=")
            .unwrap();
        let state = registration_state(
            chal,
            UserVerificationPolicy::Preferred,
            vec![COSEAlgorithm::ES256],
        );

        let rsp: RegisterPublicKeyCredential = serde_json::from_str(U2F_REGISTRATION).unwrap();

        // Dig the attestation leaf out of the envelope so it can be
        // registered as the trust anchor of its own model - the
        // single-certificate batch shape U2F metadata entries use.
        let att_obj: serde_cbor::Value =
            serde_cbor::from_slice(rsp.response.attestation_object.as_ref()).unwrap();
        let leaf = match &att_obj {
            serde_cbor::Value::Map(m) => {
                match m.get(&serde_cbor::Value::Text("attStmt".to_string())) {
                    Some(serde_cbor::Value::Map(stmt)) => {
                        match stmt.get(&serde_cbor::Value::Text("x5c".to_string())) {
                            Some(serde_cbor::Value::Array(certs)) => match &certs[0] {
                                serde_cbor::Value::Bytes(der) => x509::X509::from_der(der).unwrap(),
                                _ => panic!("x5c entry not bytes"),
                            },
                            _ => panic!("x5c missing"),
                        }
                    }
                    _ => panic!("attStmt missing"),
                }
            }
            _ => panic!("attestation object not a map"),
        };

        // The U2F identifier is the SHA-1 of the leaf's SPKI.
        let ski = subject_key_identifier(&leaf).unwrap();
        let entry = MetadataEntry {
            identifiers: vec![AuthenticatorIdentifier::SubjectKeyIdentifier(ski)],
            description: "yubico u2f".to_string(),
            attestation_root_certificates: vec![leaf],
            attestation_types: vec![WebauthnAttestationType::BasicFull],
            user_verification_details: Vec::new(),
            key_protection: Vec::new(),
            matcher_protection: Vec::new(),
            status_reports: Vec::new(),
            icon: None,
        };
        let registry = MetadataRegistry::build(vec![entry]);

        let result = wan
            .register_credential(&rsp, &state, &registry, pinned_now())
            .expect("registration failed");

        assert!(matches!(
            result.trust,
            AttestationTrust::Trusted(ref e) if e.description == "yubico u2f"
        ));
    }

    #[test]
    fn registration_accumulates_all_policy_violations() {
        // Same rp_id, so the rpIdHash matches - but the origin differs and
        // the challenge is wrong. Both must be reported together.
        let wan = webauthn_for("webauthn.io", "https://auth.webauthn.io", "webauthn.io");

        let state = registration_state(
            vec![0u8; 32],
            UserVerificationPolicy::Preferred,
            vec![COSEAlgorithm::ES256],
        );

        let rsp: RegisterPublicKeyCredential = serde_json::from_str(U2F_REGISTRATION).unwrap();
        let registry = MetadataRegistry::default();

        let err = wan
            .register_credential(&rsp, &state, &registry, pinned_now())
            .expect_err("registration must fail");

        assert!(err
            .0
            .iter()
            .any(|e| matches!(e, WebauthnError::ChallengeMismatch)));
        assert!(err
            .0
            .iter()
            .any(|e| matches!(e, WebauthnError::OriginMismatch)));
    }

    #[test]
    fn registration_rejects_disallowed_algorithm() {
        let wan = webauthn_for("webauthn.io", "https://webauthn.io", "webauthn.io");
        let chal = STANDARD
            .decode("+Ri5NZTzJ8b6mvW3TVScLotEoALfgBa2Bn4YSaIObHc=")
            .unwrap();
        // The credential is ES256; only EDDSA offered.
        let state = registration_state(
            chal,
            UserVerificationPolicy::Preferred,
            vec![COSEAlgorithm::EDDSA],
        );

        let rsp: RegisterPublicKeyCredential = serde_json::from_str(U2F_REGISTRATION).unwrap();
        let registry = MetadataRegistry::default();

        let err = wan
            .register_credential(&rsp, &state, &registry, pinned_now())
            .expect_err("registration must fail");
        assert!(err
            .0
            .iter()
            .any(|e| matches!(e, WebauthnError::AlgorithmNotAllowed)));
    }

    // Example generated using navigator.credentials.create on Chrome
    // Version 77.0.3865.120 using Touch ID on MacBook running MacOS 10.15 -
    // packed attestation in self attestation mode.
    const PACKED_SELF_REGISTRATION: &str = r#"{
        "id":"ATk_7QKbi_ntSdp16LXeU6RDf9YnRLIDTCqEjJFzc6rKBhbqoSYccxNa",
        "rawId":"ATk_7QKbi_ntSdp16LXeU6RDf9YnRLIDTCqEjJFzc6rKBhbqoSYccxNa",
        "response":{
            "attestationObject":"o2NmbXRmcGFja2VkZ2F0dFN0bXSiY2FsZyZjc2lnWEcwRQIgLXPjBtVEhBH3KdUDFFk3LAd9EtHogllIf48vjX4wgfECIQCXOymmfg12FPMXEdwpSjjtmrvki4K8y0uYxqWN5Bw6DGhhdXRoRGF0YViuSZYN5YgOjGh0NBcPZHZgW4_krrmihjLHmVzzuoMdl2NFXaqejq3OAAI1vMYKZIsLJfHwVQMAKgE5P-0Cm4v57Unadei13lOkQ3_WJ0SyA0wqhIyRc3OqygYW6qEmHHMTWqUBAgMmIAEhWCDNRS_Gw52ow5PNrC9OdFTFNudDmZO6Y3wmM9N8e0tJICJYIC09iIH5_RrT5tbS0PIw3srdAxYDMGao7yWgu0JFIEzT",
            "clientDataJSON":"eyJjaGFsbGVuZ2UiOiJsUDZtV05BdEctX1Z2MTVpTTdsYl9YUmtkV012VlEtbFR5S3dadU9nMVZvIiwiZXh0cmFfa2V5c19tYXlfYmVfYWRkZWRfaGVyZSI6ImRvIG5vdCBjb21wYXJlIGNsaWVudERhdGFKU09OIGFnYWluc3QgYSB0ZW1wbGF0ZS4gU2VlIGh0dHBzOi8vZ29vLmdsL3lhYlBleCIsIm9yaWdpbiI6Imh0dHBzOi8vbG9jYWxob3N0Ojg0NDMiLCJ0eXBlIjoid2ViYXV0aG4uY3JlYXRlIn0"
            },
        "type":"public-key"
    }"#;

    #[test]
    fn registration_packed_self_attestation() {
        let wan = webauthn_for("localhost:8443/auth", "https://localhost:8443", "localhost");

        let chal = STANDARD
            .decode("lP6mWNAtG+/Vv15iM7lb/XRkdWMvVQ+lTyKwZuOg1Vo=")
            .unwrap();
        let state = registration_state(
            chal,
            UserVerificationPolicy::Preferred,
            vec![COSEAlgorithm::ES256],
        );

        let rsp: RegisterPublicKeyCredential =
            serde_json::from_str(PACKED_SELF_REGISTRATION).unwrap();
        let registry = MetadataRegistry::default();

        let result = wan
            .register_credential(&rsp, &state, &registry, pinned_now())
            .expect("registration failed");

        // Self attestation: trust rests on the credential key alone.
        assert!(matches!(
            result.attestation,
            ParsedAttestationData::SelfAttestation
        ));
        assert!(matches!(result.trust, AttestationTrust::None));
        assert!(result.credential.verified);
    }

    #[test]
    fn registration_requires_attested_credential_data() {
        // An attestation object whose authData carries no attested
        // credential data (flags UP only) must fail registration.
        let wan = webauthn_for("localhost", "http://localhost:8080", "localhost");

        // rpIdHash for "localhost", flags 0x01, counter 0.
        let mut auth_data = compute_sha256(b"localhost").to_vec();
        auth_data.push(0x01);
        auth_data.extend_from_slice(&0u32.to_be_bytes());

        let mut att_obj = std::collections::BTreeMap::new();
        att_obj.insert(
            serde_cbor::Value::Text("fmt".to_string()),
            serde_cbor::Value::Text("none".to_string()),
        );
        att_obj.insert(
            serde_cbor::Value::Text("attStmt".to_string()),
            serde_cbor::Value::Map(Default::default()),
        );
        att_obj.insert(
            serde_cbor::Value::Text("authData".to_string()),
            serde_cbor::Value::Bytes(auth_data),
        );
        let att_obj_bytes = serde_cbor::to_vec(&serde_cbor::Value::Map(att_obj)).unwrap();

        let challenge = vec![0xaa; 32];
        let client_data = format!(
            r#"{{"type":"webauthn.create","challenge":"{}","origin":"http://localhost:8080","crossOrigin":false}}"#,
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&challenge)
        );

        let rsp = RegisterPublicKeyCredential {
            id: "AAAA".to_string(),
            raw_id: vec![0u8; 4].into(),
            response: webauthn_rp_proto::attest::AuthenticatorAttestationResponseRaw {
                attestation_object: att_obj_bytes.into(),
                client_data_json: client_data.into_bytes().into(),
                transports: None,
            },
            type_: "public-key".to_string(),
            extensions: Default::default(),
        };

        let state = registration_state(
            challenge,
            UserVerificationPolicy::Preferred,
            vec![COSEAlgorithm::ES256],
        );
        let registry = MetadataRegistry::default();

        let err = wan
            .register_credential(&rsp, &state, &registry, pinned_now())
            .expect_err("registration must fail");
        assert!(err
            .0
            .iter()
            .any(|e| matches!(e, WebauthnError::MissingAttestedCredentialData)));
    }

    fn assertion_test_credential() -> Credential {
        // The credential matching the AUTHENTICATION vector below,
        // registered by a yubico 5.
        let cred_id: Vec<u8> = vec![
            106, 223, 133, 124, 161, 172, 56, 141, 181, 18, 27, 66, 187, 181, 113, 251, 187, 123,
            20, 169, 41, 80, 236, 138, 92, 137, 4, 4, 16, 255, 188, 47, 158, 202, 111, 192, 117,
            110, 152, 245, 95, 22, 200, 172, 71, 154, 40, 181, 212, 64, 80, 17, 238, 238, 21, 13,
            27, 145, 140, 27, 208, 101, 166, 81,
        ];

        let key = COSEKey {
            type_: COSEAlgorithm::ES256,
            key: crate::interface::COSEKeyType::EC_EC2(crate::interface::COSEEC2Key {
                curve: crate::interface::ECDSACurve::SECP256R1,
                x: vec![
                    46, 121, 76, 233, 118, 208, 250, 74, 227, 182, 8, 145, 45, 46, 5, 9, 199, 186,
                    84, 83, 7, 237, 130, 73, 16, 90, 17, 54, 33, 255, 54, 56,
                ]
                .into(),
                y: vec![
                    117, 105, 1, 23, 253, 223, 67, 135, 253, 219, 253, 223, 17, 247, 91, 197, 205,
                    225, 143, 59, 47, 138, 70, 120, 74, 155, 177, 177, 166, 233, 48, 71,
                ]
                .into(),
            }),
        };

        Credential {
            cred_id: cred_id.into(),
            user_handle: b"xxx".to_vec().into(),
            cred_pk_bytes: key.to_cbor().into(),
            counter: 1,
            transports: None,
            verified: false,
        }
    }

    const AUTHENTICATION: &str = r#"
    {
        "id":"at-FfKGsOI21EhtCu7Vx-7t7FKkpUOyKXIkEBBD_vC-eym_AdW6Y9V8WyKxHmii11EBQEe7uFQ0bkYwb0GWmUQ",
        "rawId":"at-FfKGsOI21EhtCu7Vx-7t7FKkpUOyKXIkEBBD_vC-eym_AdW6Y9V8WyKxHmii11EBQEe7uFQ0bkYwb0GWmUQ",
        "response":{
            "authenticatorData":"SZYN5YgOjGh0NBcPZHZgW4_krrmihjLHmVzzuoMdl2MBAAAAFA",
            "clientDataJSON":"eyJjaGFsbGVuZ2UiOiJXZ1h6X2tUdjNXVVUxa3c4aG0tT0dvR1M0WkNIWF8zYkVxSEgyUHZWcDhNIiwiY2xpZW50RXh0ZW5zaW9ucyI6e30sImhhc2hBbGdvcml0aG0iOiJTSEEtMjU2Iiwib3JpZ2luIjoiaHR0cDovL2xvY2FsaG9zdDo4MDgwIiwidHlwZSI6IndlYmF1dGhuLmdldCJ9",
            "signature":"MEYCIQDmLVOqv85cdRup4Fr8Pf9zC4AWO-XKBJqa8xPwYFCCMAIhAOiExLoyes0xipmUmq0BVlqJaCKLn_MFKG9GIDsCGq_-",
            "userHandle":null
        },
        "type":"public-key"
    }
    "#;

    fn authentication_state(credentials: Vec<Credential>) -> AuthenticationState {
        AuthenticationState {
            credentials,
            policy: UserVerificationPolicy::Discouraged,
            challenge: vec![
                90, 5, 243, 254, 68, 239, 221, 101, 20, 214, 76, 60, 134, 111, 142, 26, 129, 146,
                225, 144, 135, 95, 253, 219, 18, 161, 199, 216, 251, 213, 167, 195,
            ]
            .into(),
        }
    }

    #[test]
    fn authentication_updates_counter() {
        let wan = webauthn_for("localhost:8080/auth", "http://localhost:8080", "localhost");
        let cred = assertion_test_credential();
        let user_handle = cred.user_handle.clone();
        let state = authentication_state(vec![cred]);

        let rsp: PublicKeyCredential = serde_json::from_str(AUTHENTICATION).unwrap();

        let result = wan
            .authenticate_credential(&rsp, &state, Some(user_handle.as_ref()))
            .expect("authentication failed");

        // Stored 1, received 20.
        assert_eq!(result.counter, SignatureCounterResult::Updated(20));
        assert!(!result.user_verified);
    }

    #[test]
    fn authentication_flags_potential_clone() {
        let wan = webauthn_for("localhost:8080/auth", "http://localhost:8080", "localhost");
        let mut cred = assertion_test_credential();
        // The stored counter already reached the received value.
        cred.counter = 20;
        let user_handle = cred.user_handle.clone();
        let state = authentication_state(vec![cred]);

        let rsp: PublicKeyCredential = serde_json::from_str(AUTHENTICATION).unwrap();

        let result = wan
            .authenticate_credential(&rsp, &state, Some(user_handle.as_ref()))
            .expect("the clone signal is not a failure");

        assert_eq!(
            result.counter,
            SignatureCounterResult::PotentiallyCloned {
                stored: 20,
                received: 20
            }
        );
    }

    #[test]
    fn authentication_rejects_tampered_signature_with_single_error() {
        let wan = webauthn_for("localhost:8080/auth", "http://localhost:8080", "localhost");
        let cred = assertion_test_credential();
        let user_handle = cred.user_handle.clone();
        let state = authentication_state(vec![cred]);

        let mut rsp: PublicKeyCredential = serde_json::from_str(AUTHENTICATION).unwrap();
        // Flip one byte of the signature.
        rsp.response.signature[4] ^= 0x01;

        let err = wan
            .authenticate_credential(&rsp, &state, Some(user_handle.as_ref()))
            .expect_err("a tampered signature must fail");

        assert_eq!(err.len(), 1);
        assert!(matches!(err.0[0], WebauthnError::SignatureInvalid));
    }

    #[test]
    fn authentication_requires_some_user_handle() {
        let wan = webauthn_for("localhost:8080/auth", "http://localhost:8080", "localhost");
        let cred = assertion_test_credential();
        let state = authentication_state(vec![cred]);

        let rsp: PublicKeyCredential = serde_json::from_str(AUTHENTICATION).unwrap();
        // The response carries no user handle, and the server identified
        // nobody.
        let err = wan
            .authenticate_credential(&rsp, &state, None)
            .expect_err("no user handle must fail");
        assert!(err
            .0
            .iter()
            .any(|e| matches!(e, WebauthnError::CannotVerifyUserHandle)));
    }

    #[test]
    fn authentication_rejects_unlisted_credential() {
        let wan = webauthn_for("localhost:8080/auth", "http://localhost:8080", "localhost");
        // Allow list contains a different credential.
        let mut cred = assertion_test_credential();
        cred.cred_id = vec![1, 2, 3, 4].into();
        let state = authentication_state(vec![cred]);

        let rsp: PublicKeyCredential = serde_json::from_str(AUTHENTICATION).unwrap();
        let err = wan
            .authenticate_credential(&rsp, &state, None)
            .expect_err("unlisted credential must fail");
        assert!(matches!(err.0[0], WebauthnError::DisallowedCredential));
    }

    #[test]
    fn authentication_enforces_verification_policy() {
        let wan = webauthn_for("localhost:8080/auth", "http://localhost:8080", "localhost");
        let cred = assertion_test_credential();
        let user_handle = cred.user_handle.clone();
        let mut state = authentication_state(vec![cred]);
        state.policy = UserVerificationPolicy::Required;

        let rsp: PublicKeyCredential = serde_json::from_str(AUTHENTICATION).unwrap();
        // The device asserted presence only.
        let err = wan
            .authenticate_credential(&rsp, &state, Some(user_handle.as_ref()))
            .expect_err("unverified response must fail under required policy");
        assert!(err
            .0
            .iter()
            .any(|e| matches!(e, WebauthnError::UserNotVerified)));
    }

    #[test]
    fn trust_resolution_against_registry() {
        use fido_metadata::{MetadataEntry, WebauthnAttestationType};

        // A self-signed certificate doubles as both the "chain" and the
        // registered root, which is exactly the single-certificate batch
        // shape U2F metadata entries use.
        let root = x509::X509::from_der(
            &STANDARD
                .decode(GLOBALSIGN_R3_B64.replace(['\n', ' '], ""))
                .unwrap(),
        )
        .unwrap();

        let aaguid = uuid::Uuid::parse_str("2fc0579f-8113-47ea-b116-bb5a8db9202a").unwrap();
        let entry = MetadataEntry {
            identifiers: vec![AuthenticatorIdentifier::Aaguid(aaguid)],
            description: "test device".to_string(),
            attestation_root_certificates: vec![root.clone()],
            attestation_types: vec![WebauthnAttestationType::BasicFull],
            user_verification_details: Vec::new(),
            key_protection: Vec::new(),
            matcher_protection: Vec::new(),
            status_reports: Vec::new(),
            icon: None,
        };
        let registry = MetadataRegistry::build(vec![entry]);

        let acd = AttestedCredentialData {
            aaguid,
            credential_id: vec![1, 2, 3],
            credential_pk: serde_cbor::Value::Null,
            credential_pk_bytes: Vec::new(),
        };

        // Chain resolves to the registered root -> Trusted.
        let attestation = ParsedAttestationData::Basic(vec![root.clone()]);
        let trust =
            classify_attestation_trust(&attestation, &acd, &registry, pinned_now()).unwrap();
        assert!(matches!(trust, AttestationTrust::Trusted(ref e) if e.description == "test device"));

        // Unknown model -> Unknown.
        let empty_registry = MetadataRegistry::default();
        let trust =
            classify_attestation_trust(&attestation, &acd, &empty_registry, pinned_now()).unwrap();
        assert!(matches!(trust, AttestationTrust::Unknown));

        // Model known, but no root matches -> Unknown.
        let entry_no_roots = MetadataEntry {
            identifiers: vec![AuthenticatorIdentifier::Aaguid(aaguid)],
            description: "rootless".to_string(),
            attestation_root_certificates: Vec::new(),
            attestation_types: vec![WebauthnAttestationType::BasicFull],
            user_verification_details: Vec::new(),
            key_protection: Vec::new(),
            matcher_protection: Vec::new(),
            status_reports: Vec::new(),
            icon: None,
        };
        let registry = MetadataRegistry::build(vec![entry_no_roots]);
        let trust =
            classify_attestation_trust(&attestation, &acd, &registry, pinned_now()).unwrap();
        assert!(matches!(trust, AttestationTrust::Unknown));

        // Self attestation never consults the registry.
        let trust = classify_attestation_trust(
            &ParsedAttestationData::SelfAttestation,
            &acd,
            &registry,
            pinned_now(),
        )
        .unwrap();
        assert!(matches!(trust, AttestationTrust::None));
    }

    const GLOBALSIGN_R3_B64: &str = "MIIDXzCCAkegAwIBAgILBAAAAAABIVhTCKIwDQYJKoZIhvcNAQELBQAwTDEgMB4GA1UECxMXR2xvYmFsU2lnbiBSb290IENBIC0gUjMxEzARBgNVBAoTCkdsb2JhbFNpZ24xEzARBgNVBAMTCkdsb2JhbFNpZ24wHhcNMDkwMzE4MTAwMDAwWhcNMjkwMzE4MTAwMDAwWjBMMSAwHgYDVQQLExdHbG9iYWxTaWduIFJvb3QgQ0EgLSBSMzETMBEGA1UEChMKR2xvYmFsU2lnbjETMBEGA1UEAxMKR2xvYmFsU2lnbjCCASIwDQYJKoZIhvcNAQEBBQADggEPADCCAQoCggEBAMwldpB5BngiFvXAg7aEyiie/QV2EcWtiHL8RgJDx7KKnQRfJMsuS+FggkbhUqsMgUdwbN1k0ev1LKMPgj0MK66X17YUhhB5uzsTgHeMCOFJ0mpiLx9e+pZo34knlTifBtc+ycsmWQ1z3rDI6SYOgxXG71uL0gRgykmmKPZpO/bLyCiR5Z2KYVc3rHQU3HTgOu5yLy6c+9C7v/U9AOEGM+iCK65TpjoWc4zdQQ4gOsC0p6Hpsk+QLjJg6VfLuQSSaGjlOCZgdbKfd/+RFO+uIEn8rUAVSNECMWEZXriX7613t2Saer9fwRPvm2L7DWzgVGkWqQPabumDk3F2xmmFghcCAwEAAaNCMEAwDgYDVR0PAQH/BAQDAgEGMA8GA1UdEwEB/wQFMAMBAf8wHQYDVR0OBBYEFI/wS3+oLkUkrk1Q+mOai97i3Ru8MA0GCSqGSIb3DQEBCwUAA4IBAQBLQNvAUKr+yAzv95ZURUm7lgAJQayzE4aGKAczymvmdLm6AC2upArT9fHxD4q/c2dKg8dEe3jgr25sbwMpjjM5RcOO5LlXbKr8EpbsU8Yt5CRsuZRj+9xTaGdWPoO4zzUhw8lo/s7awlOqzJCK6fBdRoyV3XpYKBovHd7NADdBj+1EbddTKJd+82cEHhXXipa0095MJ6RMG3NzdvQXmcIfeg7jLQitChws/zyrVQ4PkX4268NXSb7hLi18YIvDQVETI53O9zJrlAGomecsMx86OyXShkDOOyyGeMlhLxS67ttVb9+E7gUJTb0o2HLO02JQZR7rkpeDMdmztcpHWD9f";
}
