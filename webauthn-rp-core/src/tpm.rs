//! TPM 2.0 structure parsing, as needed by the `tpm` attestation statement
//! format. Field layouts are from TPMv2-Part2 "Structures".

// All multi-byte TPM fields are big-endian.

pub(crate) const TPM_GENERATED_VALUE: u32 = 0xff54_4347;
pub(crate) const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

pub(crate) const TPM_ALG_RSA: u16 = 0x0001;
pub(crate) const TPM_ALG_NULL: u16 = 0x0010;
pub(crate) const TPM_ALG_SHA256: u16 = 0x000b;
pub(crate) const TPM_ALG_ECC: u16 = 0x0023;
pub(crate) const TPM_ALG_RSASSA: u16 = 0x0014;

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ()> {
        let end = self.pos.checked_add(n).ok_or(())?;
        if end > self.data.len() {
            return Err(());
        }
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, ()> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ()> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// A TPM2B_* sized buffer: u16 length prefix then that many bytes.
    fn tpm2b(&mut self) -> Result<&'a [u8], ()> {
        let len = self.u16()? as usize;
        self.take(len)
    }

    fn finished(&self) -> bool {
        self.pos == self.data.len()
    }
}

/// The attested structure of a TPMS_ATTEST. Only certification is relevant
/// to webauthn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TpmuAttest {
    /// TPMS_CERTIFY_INFO
    AttestCertify {
        /// The TPM2B_NAME of the certified object, an alg prefix followed
        /// by the digest of its public area.
        name: Vec<u8>,
        /// The qualified name. Unused by the verification procedure.
        #[allow(unused)]
        qualified_name: Vec<u8>,
    },
    Unknown,
}

/// TPMS_ATTEST, TPMv2-Part2 section 10.12.8.
#[derive(Debug, Clone)]
pub(crate) struct TpmsAttest {
    pub type_: u16,
    pub extra_data: Vec<u8>,
    pub attested: TpmuAttest,
}

impl TryFrom<&[u8]> for TpmsAttest {
    type Error = ();

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        let mut c = Cursor::new(data);

        let magic = c.u32()?;
        if magic != TPM_GENERATED_VALUE {
            return Err(());
        }

        let type_ = c.u16()?;
        let _qualified_signer = c.tpm2b()?;
        let extra_data = c.tpm2b()?.to_vec();

        // TPMS_CLOCK_INFO: clock u64, resetCount u32, restartCount u32,
        // safe u8. Followed by firmwareVersion u64. Neither is an input to
        // the verification procedure.
        let _clock_info = c.take(17)?;
        let _firmware_version = c.take(8)?;

        let attested = if type_ == TPM_ST_ATTEST_CERTIFY {
            let name = c.tpm2b()?.to_vec();
            let qualified_name = c.tpm2b()?.to_vec();
            if !c.finished() {
                return Err(());
            }
            TpmuAttest::AttestCertify {
                name,
                qualified_name,
            }
        } else {
            TpmuAttest::Unknown
        };

        Ok(TpmsAttest {
            type_,
            extra_data,
            attested,
        })
    }
}

/// The unique (public key) field of a TPMT_PUBLIC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TpmuPublicId {
    /// An RSA modulus.
    Rsa(Vec<u8>),
    /// An ECC point.
    Ecc { x: Vec<u8>, y: Vec<u8> },
}

/// TPMT_PUBLIC, TPMv2-Part2 section 12.2.4.
#[derive(Debug, Clone)]
pub(crate) struct TpmtPublic {
    pub name_alg: u16,
    pub unique: TpmuPublicId,
}

impl TryFrom<&[u8]> for TpmtPublic {
    type Error = ();

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        let mut c = Cursor::new(data);

        let type_ = c.u16()?;
        let name_alg = c.u16()?;
        let _object_attributes = c.u32()?;
        let _auth_policy = c.tpm2b()?;

        let unique = match type_ {
            TPM_ALG_RSA => {
                // TPMS_RSA_PARMS. Attestation keys always carry a null
                // symmetric algorithm.
                let symmetric = c.u16()?;
                if symmetric != TPM_ALG_NULL {
                    return Err(());
                }
                let _scheme = c.u16()?;
                let _key_bits = c.u16()?;
                let _exponent = c.u32()?;
                TpmuPublicId::Rsa(c.tpm2b()?.to_vec())
            }
            TPM_ALG_ECC => {
                // TPMS_ECC_PARMS.
                let symmetric = c.u16()?;
                if symmetric != TPM_ALG_NULL {
                    return Err(());
                }
                let _scheme = c.u16()?;
                let _curve_id = c.u16()?;
                let _kdf = c.u16()?;
                let x = c.tpm2b()?.to_vec();
                let y = c.tpm2b()?.to_vec();
                TpmuPublicId::Ecc { x, y }
            }
            _ => return Err(()),
        };

        if !c.finished() {
            return Err(());
        }

        Ok(TpmtPublic { name_alg, unique })
    }
}

/// TPMT_SIGNATURE, TPMv2-Part2 section 11.3.4.
///
/// Authenticators have been observed emitting both the structured form and
/// the bare signature bytes; an input that does not parse as a structured
/// signature is carried raw.
#[derive(Debug, Clone)]
pub(crate) enum TpmtSignature {
    RawSignature(Vec<u8>),
}

impl From<&[u8]> for TpmtSignature {
    fn from(data: &[u8]) -> Self {
        let mut c = Cursor::new(data);
        if let (Ok(TPM_ALG_RSASSA), Ok(_hash), Ok(sig)) = (c.u16(), c.u16(), c.tpm2b()) {
            if c.finished() {
                return TpmtSignature::RawSignature(sig.to_vec());
            }
        }
        TpmtSignature::RawSignature(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;

    fn tpm2b(content: &[u8], out: &mut Vec<u8>) {
        out.extend_from_slice(&(content.len() as u16).to_be_bytes());
        out.extend_from_slice(content);
    }

    #[test]
    fn parses_certify_attest() {
        let mut data = Vec::new();
        data.extend_from_slice(&TPM_GENERATED_VALUE.to_be_bytes());
        data.extend_from_slice(&TPM_ST_ATTEST_CERTIFY.to_be_bytes());
        tpm2b(&[0xaa; 8], &mut data); // qualifiedSigner
        tpm2b(&[0xde, 0xad, 0xbe, 0xef], &mut data); // extraData
        data.extend_from_slice(&[0u8; 17]); // clockInfo
        data.extend_from_slice(&[0u8; 8]); // firmwareVersion
        let mut name = vec![0x00, 0x0b];
        name.extend_from_slice(&[0x11; 32]);
        tpm2b(&name, &mut data);
        tpm2b(&[], &mut data); // qualifiedName

        let attest = TpmsAttest::try_from(data.as_slice()).expect("did not parse");
        assert_eq!(attest.type_, TPM_ST_ATTEST_CERTIFY);
        assert_eq!(attest.extra_data, vec![0xde, 0xad, 0xbe, 0xef]);
        match attest.attested {
            TpmuAttest::AttestCertify { name: n, .. } => assert_eq!(n, name),
            TpmuAttest::Unknown => panic!("expected certify"),
        }
    }

    #[test]
    fn rejects_bad_magic() {
        let mut data = Vec::new();
        data.extend_from_slice(&0xdeadbeefu32.to_be_bytes());
        data.extend_from_slice(&TPM_ST_ATTEST_CERTIFY.to_be_bytes());
        assert!(TpmsAttest::try_from(data.as_slice()).is_err());
    }

    #[test]
    fn parses_rsa_public_area() {
        let mut data = Vec::new();
        data.extend_from_slice(&TPM_ALG_RSA.to_be_bytes());
        data.extend_from_slice(&TPM_ALG_SHA256.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes()); // objectAttributes
        tpm2b(&[], &mut data); // authPolicy
        data.extend_from_slice(&TPM_ALG_NULL.to_be_bytes()); // symmetric
        data.extend_from_slice(&TPM_ALG_NULL.to_be_bytes()); // scheme
        data.extend_from_slice(&2048u16.to_be_bytes()); // keyBits
        data.extend_from_slice(&0u32.to_be_bytes()); // exponent (default)
        tpm2b(&[0xab; 256], &mut data); // modulus

        let public = TpmtPublic::try_from(data.as_slice()).expect("did not parse");
        assert_eq!(public.name_alg, TPM_ALG_SHA256);
        assert_eq!(public.unique, TpmuPublicId::Rsa(vec![0xab; 256]));
    }
}
