//! An implementation of the FIDO Metadata Service as defined by
//! <https://fidoalliance.org/specs/mds/fido-metadata-service-v3.0-ps-20210518.html>
//!
//! The metadata service publishes a signed blob listing known authenticator
//! models and the certificate roots their attestations chain to. This crate
//! verifies the blob's JWS against the pinned FIDO Alliance root, decodes the
//! payload entries, and builds a registry indexed by authenticator identifier
//! that a relying party consults during registration ceremonies.
//!
//! The metadata specification has a number of deviations between what it
//! says and what the service actually publishes. Where they are known, this
//! crate follows the published content rather than the text.

// #![deny(warnings)]
#![warn(unused_extern_crates)]
#![warn(missing_docs)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]

#[macro_use]
extern crate tracing;

mod blob;
mod jws;
mod refresh;
mod registry;

pub mod error;

pub use blob::{
    AttestationType, AuthenticatorStatus, KeyProtection, MatcherProtection, MetadataEntry,
    StatusReport, UserVerificationMethod, WebauthnAttestationType,
};
pub use refresh::{refresh_loop, RefreshConfig, RegistryHandle};
pub use registry::{
    AuthenticatorIdentifier, EntryFailure, MetadataRegistry, RegistryBuildOutcome, SubjectKeyId,
};

use error::MdsError;
use std::str::FromStr;
use std::time::SystemTime;

/// The URL the current MDS blob is served from.
pub const FIDO_MDS_URL: &str = "https://mds.fidoalliance.org/";

/// The common name the MDS signing certificate must be issued to.
const FIDO_MDS_SUBJECT_CN: &str = "mds.fidoalliance.org";

/// The parsed content of the Fido Metadata Service. This content can be
/// retrieved from its online url at <https://mds.fidoalliance.org/>. For
/// parsing to succeed the blob JWS MUST be correctly signed by a chain
/// anchored at the pinned root certificate authority.
///
/// Individual payload entries may fail to decode without poisoning the rest
/// of the blob - the outcome distinguishes complete, partial and failed
/// registry builds so the caller can decide what to install.
#[derive(Debug)]
pub struct FidoMds {
    /// The legal header under which the blob was published.
    pub legal_header: Option<String>,
    /// The serial number of this Metadata BLOB Payload. Serial numbers MUST
    /// be consecutive and strictly monotonic.
    pub no: u32,
    /// ISO-8601 formatted date when the next update will be provided at
    /// latest.
    pub next_update: String,
    /// The registry build result over the payload entries.
    pub outcome: RegistryBuildOutcome,
}

impl FidoMds {
    /// Verify and decode an MDS blob. `now` pins certificate validity
    /// checks so that callers (and tests) control the clock.
    pub fn parse(blob_jwt: &str, now: SystemTime) -> Result<Self, MdsError> {
        let payload = jws::verify_blob_jws(blob_jwt, FIDO_MDS_SUBJECT_CN, now)?;

        let payload: blob::MetadataBlobPayload =
            serde_json::from_slice(&payload).map_err(MdsError::PayloadJson)?;

        let (entries, failures) = blob::decode_entries(&payload.entries);
        let outcome = RegistryBuildOutcome::assemble(entries, failures);

        Ok(FidoMds {
            legal_header: payload.legal_header,
            no: payload.no,
            next_update: payload.next_update,
            outcome,
        })
    }
}

impl FromStr for FidoMds {
    type Err = MdsError;

    /// Parse with certificate validity pinned to the system clock. Prefer
    /// [`FidoMds::parse`] when the caller owns time.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FidoMds::parse(s, SystemTime::now())
    }
}
