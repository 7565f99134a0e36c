//! Cryptographic operation wrapper for Webauthn. This module exists to
//! allow ease of auditing, safe operation wrappers for the webauthn library,
//! and cryptographic provider abstraction. This module currently uses OpenSSL
//! as the cryptographic primitive provider.

#![allow(non_camel_case_types)]

use base64urlsafedata::Base64UrlSafeData;
use openssl::{bn, ec, ecdsa, hash, memcmp, nid, pkey, rsa, sha, sign, x509};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

use crate::error::{AttestationStatementError, WebauthnError};
use webauthn_rp_proto::cose::COSEAlgorithm;

// Why OpenSSL over another rust crate?
// - The openssl crate allows us to reconstruct a public key from the
//   x/y group coords, where most others want a pkcs formatted structure. As
//   a result, it's easiest to use openssl as it gives us exactly what we need
//   for these operations, and despite it's many challenges as a library, it
//   has resources and investment into it's maintenance, so we can at least
//   assert a higher level of confidence in it than <backyard crypto here>.

/// An EDDSACurve identifier. You probably will never need to alter
/// or use this value, as it is set inside the Credential for you.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EDDSACurve {
    // +---------+-------+----------+------------------------------------+
    // | Name    | Value | Key Type | Description                        |
    // +---------+-------+----------+------------------------------------+
    // | Ed25519 | 6     | OKP      | Ed25519 for use w/ EdDSA only      |
    // | Ed448   | 7     | OKP      | Ed448 for use w/ EdDSA only        |
    // +---------+-------+----------+------------------------------------+
    /// Identifies this OKP as ED25519
    ED25519 = 6,
}

impl TryFrom<i128> for EDDSACurve {
    type Error = WebauthnError;
    fn try_from(u: i128) -> Result<Self, Self::Error> {
        match u {
            6 => Ok(EDDSACurve::ED25519),
            _ => Err(WebauthnError::CoseKeyDecode),
        }
    }
}

impl EDDSACurve {
    /// The size in bytes of the public key on this curve.
    pub const fn coordinate_size(&self) -> usize {
        match self {
            Self::ED25519 => 32,
        }
    }
}

/// An ECDSACurve identifier. You probably will never need to alter
/// or use this value, as it is set inside the Credential for you.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ECDSACurve {
    // +---------+-------+----------+------------------------------------+
    // | Name    | Value | Key Type | Description                        |
    // +---------+-------+----------+------------------------------------+
    // | P-256   | 1     | EC2      | NIST P-256 also known as secp256r1 |
    // | P-384   | 2     | EC2      | NIST P-384 also known as secp384r1 |
    // | P-521   | 3     | EC2      | NIST P-521 also known as secp521r1 |
    // +---------+-------+----------+------------------------------------+
    /// Identifies this curve as SECP256R1 (X9_62_PRIME256V1 in OpenSSL)
    SECP256R1 = 1,
    /// Identifies this curve as SECP384R1
    SECP384R1 = 2,
    /// Identifies this curve as SECP521R1
    SECP521R1 = 3,
}

impl TryFrom<i128> for ECDSACurve {
    type Error = WebauthnError;
    fn try_from(u: i128) -> Result<Self, Self::Error> {
        match u {
            1 => Ok(ECDSACurve::SECP256R1),
            2 => Ok(ECDSACurve::SECP384R1),
            3 => Ok(ECDSACurve::SECP521R1),
            _ => Err(WebauthnError::CoseKeyDecode),
        }
    }
}

impl ECDSACurve {
    fn to_openssl_nid(self) -> nid::Nid {
        match self {
            ECDSACurve::SECP256R1 => nid::Nid::X9_62_PRIME256V1,
            ECDSACurve::SECP384R1 => nid::Nid::SECP384R1,
            ECDSACurve::SECP521R1 => nid::Nid::SECP521R1,
        }
    }

    /// The size in bytes of one coordinate on this curve.
    pub const fn coordinate_size(&self) -> usize {
        match self {
            Self::SECP256R1 => 32,
            Self::SECP384R1 => 48,
            Self::SECP521R1 => 66,
        }
    }
}

/// A COSE Elliptic Curve Public Key. This is generally the provided credential
/// that an authenticator registers, and is used to authenticate the user.
/// You will likely never need to interact with this value, as it is part of the Credential
/// API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSEEC2Key {
    /// The curve that this key references.
    pub curve: ECDSACurve,
    /// The key's public X coordinate. Big-endian, leading zeros preserved
    /// as received.
    pub x: Base64UrlSafeData,
    /// The key's public Y coordinate. Big-endian, leading zeros preserved
    /// as received.
    pub y: Base64UrlSafeData,
}

/// A COSE Octet Key Pair Public Key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSEOKPKey {
    /// The curve that this key references.
    pub curve: EDDSACurve,
    /// The key's public bytes.
    pub x: Base64UrlSafeData,
}

/// A COSE RSA PublicKey. This is a provided credential from a registered
/// authenticator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSERSAKey {
    /// An RSA modulus, big-endian.
    pub n: Base64UrlSafeData,
    /// An RSA public exponent, big-endian.
    pub e: Base64UrlSafeData,
}

/// The type of Key contained within a COSE value. You should never need
/// to alter or change this type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum COSEKeyType {
    //    +-----------+-------+-----------------------------------------------+
    //    | Name      | Value | Description                                   |
    //    +-----------+-------+-----------------------------------------------+
    //    | OKP       | 1     | Octet Key Pair                                |
    //    | EC2       | 2     | Elliptic Curve Keys w/ x- and y-coordinate    |
    //    |           |       | pair                                          |
    //    | RSA       | 3     | RSA keys                                      |
    //    +-----------+-------+-----------------------------------------------+
    /// Identifies this as an Eliptic Curve octet key pair
    EC_OKP(COSEOKPKey),
    /// Identifies this as an Eliptic Curve EC2 key
    EC_EC2(COSEEC2Key),
    /// Identifies this as an RSA key
    RSA(COSERSAKey),
}

/// A COSE Key as provided by the Authenticator. You should never need
/// to alter or change these values.
///
/// A freshly decoded key is *unchecked*: [`COSEKey::validate`] (and every
/// verification path, which reconstructs the provider key) enforces the
/// structural rules before the key is used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSEKey {
    /// The signature algorithm this key is used with.
    pub type_: COSEAlgorithm,
    /// The public key
    pub key: COSEKeyType,
}

const KTY_OKP: i128 = 1;
const KTY_EC2: i128 = 2;
const KTY_RSA: i128 = 3;

impl TryFrom<&serde_cbor::Value> for COSEKey {
    type Error = WebauthnError;
    fn try_from(d: &serde_cbor::Value) -> Result<COSEKey, Self::Error> {
        let m = cbor_try_map!(d).map_err(|_| WebauthnError::CoseKeyDecode)?;

        // See also https://tools.ietf.org/html/rfc8152#section-3.1
        // These values look like:
        // Object({
        //     // negative (-) values are per-algo specific
        //     Integer(-3): Bytes([48, 185, ...]), // y
        //     Integer(-2): Bytes([158, 212, ...]), // x
        //     Integer(-1): U64(1), // curve identifier
        //     Integer(1): U64(2), // key type identifier
        //     Integer(3): I64(-7) // signature algorithm, -7 being ES256 + SHA256
        // })

        let key_type_value = m
            .get(&serde_cbor::Value::Integer(1))
            .ok_or(WebauthnError::CoseKeyDecode)?;
        let key_type = cbor_try_i128!(key_type_value).map_err(|_| WebauthnError::CoseKeyDecode)?;

        let alg_value = m
            .get(&serde_cbor::Value::Integer(3))
            .ok_or(WebauthnError::CoseKeyDecode)?;
        let alg = cbor_try_i128!(alg_value).map_err(|_| WebauthnError::CoseKeyDecode)?;

        let type_ =
            COSEAlgorithm::try_from(alg).map_err(|_| WebauthnError::CoseKeyInvalidAlgorithm)?;

        // https://www.iana.org/assignments/cose/cose.xhtml
        // https://www.w3.org/TR/webauthn/#sctn-encoded-credPubKey-examples
        match key_type {
            KTY_EC2 => {
                // crv (-1), x (-2) and y (-3)
                let curve_type_value = m
                    .get(&serde_cbor::Value::Integer(-1))
                    .ok_or(WebauthnError::CoseKeyDecode)?;
                let curve = cbor_try_i128!(curve_type_value)
                    .map_err(|_| WebauthnError::CoseKeyDecode)
                    .and_then(ECDSACurve::try_from)?;

                let x_value = m
                    .get(&serde_cbor::Value::Integer(-2))
                    .ok_or(WebauthnError::CoseKeyDecode)?;
                let x = cbor_try_bytes!(x_value).map_err(|_| WebauthnError::CoseKeyDecode)?;

                let y_value = m
                    .get(&serde_cbor::Value::Integer(-3))
                    .ok_or(WebauthnError::CoseKeyDecode)?;
                let y = cbor_try_bytes!(y_value).map_err(|_| WebauthnError::CoseKeyDecode)?;

                Ok(COSEKey {
                    type_,
                    key: COSEKeyType::EC_EC2(COSEEC2Key {
                        curve,
                        x: x.to_vec().into(),
                        y: y.to_vec().into(),
                    }),
                })
            }
            KTY_OKP => {
                // https://datatracker.ietf.org/doc/html/rfc8152#section-13.2
                let curve_type_value = m
                    .get(&serde_cbor::Value::Integer(-1))
                    .ok_or(WebauthnError::CoseKeyDecode)?;
                let curve = cbor_try_i128!(curve_type_value)
                    .map_err(|_| WebauthnError::CoseKeyDecode)
                    .and_then(EDDSACurve::try_from)?;

                let x_value = m
                    .get(&serde_cbor::Value::Integer(-2))
                    .ok_or(WebauthnError::CoseKeyDecode)?;
                let x = cbor_try_bytes!(x_value).map_err(|_| WebauthnError::CoseKeyDecode)?;

                Ok(COSEKey {
                    type_,
                    key: COSEKeyType::EC_OKP(COSEOKPKey {
                        curve,
                        x: x.to_vec().into(),
                    }),
                })
            }
            KTY_RSA => {
                // -1 -> n, -2 -> e
                let n_value = m
                    .get(&serde_cbor::Value::Integer(-1))
                    .ok_or(WebauthnError::CoseKeyDecode)?;
                let n = cbor_try_bytes!(n_value).map_err(|_| WebauthnError::CoseKeyDecode)?;

                let e_value = m
                    .get(&serde_cbor::Value::Integer(-2))
                    .ok_or(WebauthnError::CoseKeyDecode)?;
                let e = cbor_try_bytes!(e_value).map_err(|_| WebauthnError::CoseKeyDecode)?;

                Ok(COSEKey {
                    type_,
                    key: COSEKeyType::RSA(COSERSAKey {
                        n: n.to_vec().into(),
                        e: e.to_vec().into(),
                    }),
                })
            }
            _ => {
                debug!(?key_type, ?type_, "unsupported COSE key type");
                Err(WebauthnError::CoseKeyDecode)
            }
        }
    }
}

impl TryFrom<&[u8]> for COSEKey {
    type Error = WebauthnError;
    fn try_from(d: &[u8]) -> Result<COSEKey, Self::Error> {
        let value: serde_cbor::Value =
            serde_cbor::from_slice(d).map_err(|_| WebauthnError::CoseKeyDecode)?;
        COSEKey::try_from(&value)
    }
}

impl TryFrom<(COSEAlgorithm, &x509::X509)> for COSEKey {
    type Error = WebauthnError;

    /// Extract the subject public key of a certificate as a COSE key, for
    /// comparison with a credential key. Only the EC2 algorithms are
    /// convertible - they are the only ones the formats that need this
    /// conversion (apple, android-key) are specified with.
    fn try_from((alg, cert): (COSEAlgorithm, &x509::X509)) -> Result<COSEKey, Self::Error> {
        let curve = match alg {
            COSEAlgorithm::ES256 => ECDSACurve::SECP256R1,
            COSEAlgorithm::ES384 => ECDSACurve::SECP384R1,
            COSEAlgorithm::ES512 => ECDSACurve::SECP521R1,
            _ => {
                debug!(?alg, "unsupported X509 to COSE conversion");
                return Err(WebauthnError::CoseKeyDecode);
            }
        };

        let pkey = cert.public_key()?;
        let ec_key = pkey.ec_key().map_err(|_| WebauthnError::CoseKeyDecode)?;

        if ec_key.group().curve_name() != Some(curve.to_openssl_nid()) {
            return Err(WebauthnError::CoseKeyDecode);
        }

        let mut ctx = bn::BigNumContext::new()?;
        let mut x = bn::BigNum::new()?;
        let mut y = bn::BigNum::new()?;
        ec_key
            .public_key()
            .affine_coordinates_gfp(ec_key.group(), &mut x, &mut y, &mut ctx)?;

        let size = curve.coordinate_size() as i32;
        Ok(COSEKey {
            type_: alg,
            key: COSEKeyType::EC_EC2(COSEEC2Key {
                curve,
                x: x.to_vec_padded(size)?.into(),
                y: y.to_vec_padded(size)?.into(),
            }),
        })
    }
}

impl COSEKey {
    /// Re-encode this key as canonically ordered COSE CBOR. For a key
    /// decoded from a canonical wire value, the output is byte-identical to
    /// the input.
    pub fn to_cbor(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                out.push(0xa5);
                cbor_write_int(1, &mut out);
                cbor_write_int(KTY_EC2 as i64, &mut out);
                cbor_write_int(3, &mut out);
                cbor_write_int(self.type_ as i64, &mut out);
                cbor_write_int(-1, &mut out);
                cbor_write_int(ec2k.curve as i64, &mut out);
                cbor_write_int(-2, &mut out);
                cbor_write_bytes(ec2k.x.as_ref(), &mut out);
                cbor_write_int(-3, &mut out);
                cbor_write_bytes(ec2k.y.as_ref(), &mut out);
            }
            COSEKeyType::EC_OKP(okp) => {
                out.push(0xa4);
                cbor_write_int(1, &mut out);
                cbor_write_int(KTY_OKP as i64, &mut out);
                cbor_write_int(3, &mut out);
                cbor_write_int(self.type_ as i64, &mut out);
                cbor_write_int(-1, &mut out);
                cbor_write_int(okp.curve as i64, &mut out);
                cbor_write_int(-2, &mut out);
                cbor_write_bytes(okp.x.as_ref(), &mut out);
            }
            COSEKeyType::RSA(rsak) => {
                out.push(0xa4);
                cbor_write_int(1, &mut out);
                cbor_write_int(KTY_RSA as i64, &mut out);
                cbor_write_int(3, &mut out);
                cbor_write_int(self.type_ as i64, &mut out);
                cbor_write_int(-1, &mut out);
                cbor_write_bytes(rsak.n.as_ref(), &mut out);
                cbor_write_int(-2, &mut out);
                cbor_write_bytes(rsak.e.as_ref(), &mut out);
            }
        }
        out
    }

    /// Let publicKeyU2F be the concatenation 0x04 || x || y, the raw ANSI
    /// X9.62 uncompressed point format. Coordinates are left-padded to the
    /// curve size.
    pub(crate) fn get_alg_key_ecc_x962_raw(&self) -> Result<Vec<u8>, WebauthnError> {
        match &self.key {
            COSEKeyType::EC_EC2(ecpk) => {
                let size = ecpk.curve.coordinate_size();
                let mut out = Vec::with_capacity(1 + size * 2);
                out.push(0x04);
                out.extend(std::iter::repeat(0).take(size.saturating_sub(ecpk.x.len())));
                out.extend_from_slice(ecpk.x.as_ref());
                out.extend(std::iter::repeat(0).take(size.saturating_sub(ecpk.y.len())));
                out.extend_from_slice(ecpk.y.as_ref());
                Ok(out)
            }
            _ => {
                debug!("get_alg_key_ecc_x962_raw requires an EC2 key");
                Err(WebauthnError::CoseKeyDecode)
            }
        }
    }

    /// Check the structural rules for this key. The rfc states:
    ///   "Applications MUST check that the curve and the key type are
    ///    consistent and reject a key if they are not."
    /// this means feeding the values to openssl to validate them for us!
    pub fn validate(&self) -> Result<(), WebauthnError> {
        self.get_openssl_pkey().map(|_| ())
    }

    /// Retrieve the public key of this COSEKey as an OpenSSL structure.
    /// Construction enforces the structural key checks, so every
    /// verification path operates on a checked key.
    fn get_openssl_pkey(&self) -> Result<pkey::PKey<pkey::Public>, WebauthnError> {
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                let ec_group = ec::EcGroup::from_curve_name(ec2k.curve.to_openssl_nid())?;

                let xbn = bn::BigNum::from_slice(ec2k.x.as_ref())?;
                let ybn = bn::BigNum::from_slice(ec2k.y.as_ref())?;

                let ec_key = ec::EcKey::from_public_key_affine_coordinates(&ec_group, &xbn, &ybn)
                    .map_err(|_| WebauthnError::KeyShapeInvalid {
                    reason: "point is not on the named curve",
                })?;

                ec_key.check_key().map_err(|_| WebauthnError::KeyShapeInvalid {
                    reason: "point is not on the named curve",
                })?;

                Ok(pkey::PKey::from_ec_key(ec_key)?)
            }
            COSEKeyType::EC_OKP(okp) => {
                if okp.x.len() != okp.curve.coordinate_size() {
                    return Err(WebauthnError::KeyShapeInvalid {
                        reason: "ed25519 public key must be 32 bytes",
                    });
                }
                pkey::PKey::public_key_from_raw_bytes(okp.x.as_ref(), pkey::Id::ED25519).map_err(
                    |_| WebauthnError::KeyShapeInvalid {
                        reason: "ed25519 public key rejected",
                    },
                )
            }
            COSEKeyType::RSA(rsak) => {
                let nbn = bn::BigNum::from_slice(rsak.n.as_ref())?;
                let ebn = bn::BigNum::from_slice(rsak.e.as_ref())?;

                if nbn.num_bits() < 2048 {
                    return Err(WebauthnError::KeyShapeInvalid {
                        reason: "rsa modulus below 2048 bits",
                    });
                }

                let one = bn::BigNum::from_u32(1)?;
                if !ebn.is_bit_set(0) || ebn.ucmp(&one) != std::cmp::Ordering::Greater {
                    return Err(WebauthnError::KeyShapeInvalid {
                        reason: "rsa exponent must be odd and greater than one",
                    });
                }

                let rsa_key = rsa::Rsa::from_public_components(nbn, ebn)?;
                Ok(pkey::PKey::from_rsa(rsa_key)?)
            }
        }
    }

    /// Verifies data was signed with this [COSEKey]. Returns `false` for a
    /// signature that does not verify - a malformed signature is not an
    /// error, it is a failed verification.
    pub fn verify_signature(
        &self,
        signature: &[u8],
        verification_data: &[u8],
    ) -> Result<bool, WebauthnError> {
        let pkey = self.get_openssl_pkey()?;
        verify_signature_with_pkey(self.type_, &pkey, signature, verification_data)
    }
}

/// The message digest an algorithm hashes with. EdDSA is pure - the hash is
/// part of the signing equation, not a caller responsibility.
fn digest_for_alg(alg: COSEAlgorithm) -> Option<hash::MessageDigest> {
    match alg {
        COSEAlgorithm::ES256 | COSEAlgorithm::RS256 | COSEAlgorithm::PS256 => {
            Some(hash::MessageDigest::sha256())
        }
        COSEAlgorithm::ES384 | COSEAlgorithm::RS384 | COSEAlgorithm::PS384 => {
            Some(hash::MessageDigest::sha384())
        }
        COSEAlgorithm::ES512 | COSEAlgorithm::RS512 | COSEAlgorithm::PS512 => {
            Some(hash::MessageDigest::sha512())
        }
        COSEAlgorithm::EDDSA => None,
    }
}

pub(crate) fn verify_signature_with_pkey(
    alg: COSEAlgorithm,
    pkey: &pkey::PKey<pkey::Public>,
    signature: &[u8],
    verification_data: &[u8],
) -> Result<bool, WebauthnError> {
    match alg {
        COSEAlgorithm::EDDSA => {
            let mut verifier = sign::Verifier::new_without_digest(pkey)?;
            Ok(verifier
                .verify_oneshot(signature, verification_data)
                .unwrap_or(false))
        }
        COSEAlgorithm::PS256 | COSEAlgorithm::PS384 | COSEAlgorithm::PS512 => {
            let digest = digest_for_alg(alg).ok_or(WebauthnError::CoseKeyInvalidAlgorithm)?;
            let mut verifier = sign::Verifier::new(digest, pkey)?;
            verifier.set_rsa_padding(rsa::Padding::PKCS1_PSS)?;
            verifier.set_rsa_pss_saltlen(sign::RsaPssSaltlen::DIGEST_LENGTH)?;
            verifier.update(verification_data)?;
            Ok(verifier.verify(signature).unwrap_or(false))
        }
        _ => {
            // ECDSA signatures arrive DER encoded over webauthn, which is
            // the form openssl consumes. RSA is PKCS1-v1_5.
            let digest = digest_for_alg(alg).ok_or(WebauthnError::CoseKeyInvalidAlgorithm)?;
            let mut verifier = sign::Verifier::new(digest, pkey)?;
            verifier.update(verification_data)?;
            Ok(verifier.verify(signature).unwrap_or(false))
        }
    }
}

/// Validate a signature over `verification_data` using the public key of
/// the supplied certificate, with the hash and scheme of `alg`.
pub(crate) fn verify_x509_signature(
    alg: COSEAlgorithm,
    cert: &x509::X509,
    signature: &[u8],
    verification_data: &[u8],
) -> Result<bool, WebauthnError> {
    let pkey = cert.public_key()?;
    verify_signature_with_pkey(alg, &pkey, signature, verification_data)
}

/// Convert a raw `r || s` ECDSA signature (as used in JWS) to the DER form
/// openssl consumes.
pub(crate) fn raw_ec_signature_to_der(raw: &[u8]) -> Result<Vec<u8>, WebauthnError> {
    if raw.len() % 2 != 0 || raw.is_empty() {
        return Err(WebauthnError::SignatureInvalid);
    }
    let (r, s) = raw.split_at(raw.len() / 2);
    let r = bn::BigNum::from_slice(r)?;
    let s = bn::BigNum::from_slice(s)?;
    Ok(ecdsa::EcdsaSig::from_private_components(r, s)?.to_der()?)
}

/// Compute the sha256 of a slice of data.
pub fn compute_sha256(data: &[u8]) -> [u8; 32] {
    sha::sha256(data)
}

/// Compute the sha1 of a slice of data. Only used to derive subject key
/// identifiers, never for signatures.
pub(crate) fn compute_sha1(data: &[u8]) -> [u8; 20] {
    sha::sha1(data)
}

/// Constant time comparison of two challenge values.
pub(crate) fn challenges_match(a: &[u8], b: &[u8]) -> bool {
    !a.is_empty() && a.len() == b.len() && memcmp::eq(a, b)
}

/// Verify that attestnCert meets the requirements in § 8.2.1 Packed Attestation
/// Statement Certificate Requirements.
/// <https://w3c.github.io/webauthn/#sctn-packed-attestation-cert-requirements>
pub(crate) fn assert_packed_attest_req(
    cert: &x509::X509,
) -> Result<(), AttestationStatementError> {
    // The attestation certificate MUST have the following fields/extensions:
    //
    // Subject-C
    //  ISO 3166 code specifying the country where the Authenticator vendor
    //  is incorporated (PrintableString)
    // Subject-O
    //  Legal name of the Authenticator vendor (UTF8String)
    // Subject-OU
    //  Literal string "Authenticator Attestation" (UTF8String)
    // Subject-CN
    //  A UTF8String of the vendor's choosing
    let subject = cert.subject_name();

    let subject_c = subject.entries_by_nid(nid::Nid::COUNTRYNAME).next();
    let subject_o = subject.entries_by_nid(nid::Nid::ORGANIZATIONNAME).next();
    let subject_cn = subject.entries_by_nid(nid::Nid::COMMONNAME).next();
    let subject_ou = subject
        .entries_by_nid(nid::Nid::ORGANIZATIONALUNITNAME)
        .next();

    if subject_c.is_none() || subject_o.is_none() || subject_cn.is_none() {
        return Err(AttestationStatementError::CertificateRequirementsNotMet);
    }

    match subject_ou {
        Some(ou) => match ou.data().as_utf8() {
            Ok(ou_d) => {
                if ou_d.to_string() != "Authenticator Attestation" {
                    return Err(AttestationStatementError::CertificateRequirementsNotMet);
                }
            }
            Err(_) => return Err(AttestationStatementError::CertificateRequirementsNotMet),
        },
        None => return Err(AttestationStatementError::CertificateRequirementsNotMet),
    }

    // The id-fido-gen-ce-aaguid extension and Basic Constraints are
    // validated by the callers that have the attested credential data in
    // hand.
    Ok(())
}

/// Verify that aik_cert meets the requirements in § 8.3.1 TPM Attestation
/// Statement Certificate Requirements.
pub(crate) fn assert_tpm_attest_req(cert: &x509::X509) -> Result<(), AttestationStatementError> {
    // Subject field MUST be set to empty.
    if cert.subject_name().entries().next().is_some() {
        return Err(AttestationStatementError::CertificateRequirementsNotMet);
    }

    let der = cert
        .to_der()
        .map_err(|_| AttestationStatementError::CertificateRequirementsNotMet)?;
    let (_, parsed) = x509_parser::parse_x509_certificate(&der)
        .map_err(|_| AttestationStatementError::CertificateRequirementsNotMet)?;

    // The Subject Alternative Name extension MUST be set as defined in
    // [TPMv2-EK-Profile] section 3.2.9 - the TPM manufacturer, part and
    // version live there.
    let san_present = parsed
        .subject_alternative_name()
        .ok()
        .flatten()
        .is_some();
    if !san_present {
        return Err(AttestationStatementError::CertificateRequirementsNotMet);
    }

    // The Extended Key Usage extension MUST contain the oid
    // tcg-kp-AIKCertificate ("2.23.133.8.3").
    let aik_oid = der_parser::oid!(2.23.133 .8 .3);
    let has_aik = parsed
        .extended_key_usage()
        .ok()
        .flatten()
        .map(|eku| eku.value.other.iter().any(|oid| *oid == aik_oid))
        .unwrap_or(false);

    if !has_aik {
        return Err(AttestationStatementError::CertificateRequirementsNotMet);
    }

    Ok(())
}


fn cbor_write_type_and_len(major: u8, len: u64, out: &mut Vec<u8>) {
    let mt = major << 5;
    if len < 24 {
        out.push(mt | (len as u8));
    } else if len <= u8::MAX as u64 {
        out.push(mt | 24);
        out.push(len as u8);
    } else if len <= u16::MAX as u64 {
        out.push(mt | 25);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else if len <= u32::MAX as u64 {
        out.push(mt | 26);
        out.extend_from_slice(&(len as u32).to_be_bytes());
    } else {
        out.push(mt | 27);
        out.extend_from_slice(&len.to_be_bytes());
    }
}

fn cbor_write_int(value: i64, out: &mut Vec<u8>) {
    if value >= 0 {
        cbor_write_type_and_len(0, value as u64, out);
    } else {
        cbor_write_type_and_len(1, (-1 - value) as u64, out);
    }
}

fn cbor_write_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    cbor_write_type_and_len(2, bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}
