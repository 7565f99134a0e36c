//! Webauthn-rp-core - Webauthn verification for Rust server applications
//!
//! Webauthn is a standard allowing communication between servers, browsers and
//! authenticators to allow strong, passwordless, cryptographic authentication
//! to be performed. Webauthn is able to operate with many authenticator types,
//! such as U2F.
//!
//! This crate is the verification core of the library: binary decoding of the
//! authenticator messages, the attestation statement verification state
//! machine, the assertion pipeline, and COSE public key handling. Trust
//! anchors come from the `fido-metadata` crate's registry of the FIDO
//! Metadata Service.
//!
//! To use this library yourself, you will want to reference the
//! [`WebauthnConfig`] trait to develop site specific policy and configuration,
//! and the [`Webauthn`] struct for Webauthn interactions.

// #![deny(warnings)]
#![warn(unused_extern_crates)]
#![warn(missing_docs)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::needless_pass_by_value)]

#[macro_use]
extern crate tracing;

#[macro_use]
mod macros;

mod constants;

mod attestation;
mod crypto;
mod internals;
mod tpm;

pub mod core;
pub mod ephemeral;
pub mod error;
pub mod interface;

/// Protocol bindings
pub mod proto {
    pub use crate::interface::*;
    pub use crate::internals::{AttestationObject, AttestedCredentialData, AuthenticatorData};
    pub use base64urlsafedata::Base64UrlSafeData;
    pub use webauthn_rp_proto::*;
}

pub use crate::attestation::{AttestationFormat, AttestationFormatVerifier, SupportedFormats};
pub use crate::core::*;
