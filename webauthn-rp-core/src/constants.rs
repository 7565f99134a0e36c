//! Constants used by this implementation.

/// The length of generated challenges, in bytes. The specification requires
/// at least 16 and recommends 32.
pub const CHALLENGE_SIZE_BYTES: usize = 32;

/// Default authenticator timeout communicated in options, in milliseconds.
pub const AUTHENTICATOR_TIMEOUT_MS: u32 = 60_000;

/// The fixed prefix of authenticator data: rpIdHash (32) + flags (1) +
/// signCount (4).
pub(crate) const AUTHENTICATOR_DATA_PREFIX_LEN: usize = 37;

/// The largest credential id an authenticator may emit.
pub(crate) const CREDENTIAL_ID_MAX_LEN: usize = 1023;
