//! Compact JWS verification for the MDS blob.
//!
//! The blob is a three part `header.payload.signature` serialisation whose
//! protected header carries the signing certificate chain (`x5c`). The chain
//! must anchor at the pinned FIDO Alliance distribution root, and the leaf
//! must be issued to `mds.fidoalliance.org`. Only RS256 and ES256 are
//! accepted - these are the algorithms the service has ever published with.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::sign::Verifier;
use openssl::stack;
use openssl::x509::{self, store, verify::X509VerifyFlags};
use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::MdsError;

// GlobalSign Root CA - R3, the anchor of the MDS3 signing chain.
static MDS_ROOT_CA: &str = r#"
-----BEGIN CERTIFICATE-----
MIIDXzCCAkegAwIBAgILBAAAAAABIVhTCKIwDQYJKoZIhvcNAQELBQAwTDEgMB4G
A1UECxMXR2xvYmFsU2lnbiBSb290IENBIC0gUjMxEzARBgNVBAoTCkdsb2JhbFNp
Z24xEzARBgNVBAMTCkdsb2JhbFNpZ24wHhcNMDkwMzE4MTAwMDAwWhcNMjkwMzE4
MTAwMDAwWjBMMSAwHgYDVQQLExdHbG9iYWxTaWduIFJvb3QgQ0EgLSBSMzETMBEG
A1UEChMKR2xvYmFsU2lnbjETMBEGA1UEAxMKR2xvYmFsU2lnbjCCASIwDQYJKoZI
hvcNAQEBBQADggEPADCCAQoCggEBAMwldpB5BngiFvXAg7aEyiie/QV2EcWtiHL8
RgJDx7KKnQRfJMsuS+FggkbhUqsMgUdwbN1k0ev1LKMPgj0MK66X17YUhhB5uzsT
gHeMCOFJ0mpiLx9e+pZo34knlTifBtc+ycsmWQ1z3rDI6SYOgxXG71uL0gRgykmm
KPZpO/bLyCiR5Z2KYVc3rHQU3HTgOu5yLy6c+9C7v/U9AOEGM+iCK65TpjoWc4zd
QQ4gOsC0p6Hpsk+QLjJg6VfLuQSSaGjlOCZgdbKfd/+RFO+uIEn8rUAVSNECMWEZ
XriX7613t2Saer9fwRPvm2L7DWzgVGkWqQPabumDk3F2xmmFghcCAwEAAaNCMEAw
DgYDVR0PAQH/BAQDAgEGMA8GA1UdEwEB/wQFMAMBAf8wHQYDVR0OBBYEFI/wS3+o
LkUkrk1Q+mOai97i3Ru8MA0GCSqGSIb3DQEBCwUAA4IBAQBLQNvAUKr+yAzv95ZU
RUm7lgAJQayzE4aGKAczymvmdLm6AC2upArT9fHxD4q/c2dKg8dEe3jgr25sbwMp
jjM5RcOO5LlXbKr8EpbsU8Yt5CRsuZRj+9xTaGdWPoO4zzUhw8lo/s7awlOqzJCK
6fBdRoyV3XpYKBovHd7NADdBj+1EbddTKJd+82cEHhXXipa0095MJ6RMG3NzdvQX
mcIfeg7jLQitChws/zyrVQ4PkX4268NXSb7hLi18YIvDQVETI53O9zJrlAGomecs
Mx86OyXShkDOOyyGeMlhLxS67ttVb9+E7gUJTb0o2HLO02JQZR7rkpeDMdmztcpH
WD9f
-----END CERTIFICATE-----
"#;

#[derive(Debug, Deserialize)]
struct JwsHeader {
    alg: String,
    x5c: Vec<String>,
}

/// Verify the blob JWS and return the decoded payload bytes.
pub(crate) fn verify_blob_jws(
    blob: &str,
    expected_cn: &str,
    now: SystemTime,
) -> Result<Vec<u8>, MdsError> {
    let mut parts = blob.trim().split('.');
    let (hdr_b64, payload_b64, sig_b64) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s)) if parts.next().is_none() => (h, p, s),
        _ => return Err(MdsError::JwsMalformed),
    };

    let header: JwsHeader = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(hdr_b64)?)
        .map_err(|_| MdsError::JwsHeaderInvalid)?;

    // x5c entries are standard (not url-safe) base64 DER certificates, leaf
    // first.
    let chain = header
        .x5c
        .iter()
        .map(|b64_cert| {
            let der = STANDARD.decode(b64_cert)?;
            x509::X509::from_der(&der).map_err(MdsError::from)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let (leaf, intermediates) = chain
        .split_first()
        .ok_or(MdsError::CertificateChainInvalid)?;

    verify_chain_to_pinned_root(leaf, intermediates)?;

    for cert in chain.iter() {
        assert_validity_window(cert, now)?;
    }

    let leaf_cn = leaf
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|cn| cn.data().as_utf8().ok().map(|s| s.to_string()))
        .ok_or(MdsError::CertificateSubjectInvalid)?;

    if leaf_cn != expected_cn {
        error!(%leaf_cn, %expected_cn, "MDS signing certificate subject mismatch");
        return Err(MdsError::CertificateSubjectInvalid);
    }

    // The signature covers the ascii "header.payload" span exactly as
    // received.
    let signed_len = hdr_b64.len() + 1 + payload_b64.len();
    let signed_data = &blob.trim().as_bytes()[..signed_len];
    let signature = URL_SAFE_NO_PAD.decode(sig_b64)?;

    let pkey = leaf.public_key()?;
    let valid = match header.alg.as_str() {
        "RS256" => {
            let mut verifier = Verifier::new(MessageDigest::sha256(), &pkey)?;
            verifier.update(signed_data)?;
            verifier.verify(&signature).unwrap_or(false)
        }
        "ES256" => {
            // JWS ECDSA signatures are the raw 64 byte r || s concatenation,
            // openssl wants DER.
            if signature.len() != 64 {
                return Err(MdsError::JwsSignatureInvalid);
            }
            let r = BigNum::from_slice(&signature[..32])?;
            let s = BigNum::from_slice(&signature[32..])?;
            let der_sig = EcdsaSig::from_private_components(r, s)?.to_der()?;

            let mut verifier = Verifier::new(MessageDigest::sha256(), &pkey)?;
            verifier.update(signed_data)?;
            verifier.verify(&der_sig).unwrap_or(false)
        }
        alg => return Err(MdsError::JwsAlgorithmUnsupported(alg.to_string())),
    };

    if !valid {
        return Err(MdsError::JwsSignatureInvalid);
    }

    Ok(URL_SAFE_NO_PAD.decode(payload_b64)?)
}

fn verify_chain_to_pinned_root(
    leaf: &x509::X509,
    intermediates: &[x509::X509],
) -> Result<(), MdsError> {
    let root = x509::X509::from_pem(MDS_ROOT_CA.as_bytes())?;

    let mut chain_stack = stack::Stack::new()?;
    for cert in intermediates {
        chain_stack.push(cert.clone())?;
    }

    let mut ca_store = store::X509StoreBuilder::new()?;
    // Validity windows are checked separately against the caller supplied
    // clock.
    ca_store.set_flags(X509VerifyFlags::NO_CHECK_TIME)?;
    ca_store.add_cert(root)?;
    let ca_store = ca_store.build();

    let mut ctx = x509::X509StoreContext::new()?;
    let res = ctx.init(&ca_store, leaf, &chain_stack, |ctx_ref| {
        ctx_ref.verify_cert().map(|_| ctx_ref.error())
    })?;

    if res != x509::X509VerifyResult::OK {
        error!(?res, "MDS signing chain did not verify to pinned root");
        return Err(MdsError::CertificateChainInvalid);
    }

    Ok(())
}

fn assert_validity_window(cert: &x509::X509, now: SystemTime) -> Result<(), MdsError> {
    let der = cert.to_der()?;
    let (_, parsed) = x509_parser::parse_x509_certificate(&der)
        .map_err(|_| MdsError::CertificateChainInvalid)?;

    let now_secs = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs() as i64;

    let validity = parsed.validity();
    if now_secs < validity.not_before.timestamp() || now_secs > validity.not_after.timestamp() {
        return Err(MdsError::CertificateExpired);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_jws_input() {
        let now = SystemTime::now();
        assert!(matches!(
            verify_blob_jws("definitely not a jws", "mds.fidoalliance.org", now),
            Err(MdsError::JwsMalformed)
        ));
        assert!(matches!(
            verify_blob_jws("a.b", "mds.fidoalliance.org", now),
            Err(MdsError::JwsMalformed)
        ));
        assert!(matches!(
            verify_blob_jws("a.b.c.d", "mds.fidoalliance.org", now),
            Err(MdsError::JwsMalformed)
        ));
    }

    #[test]
    fn rejects_bad_header() {
        let now = SystemTime::now();
        let hdr = URL_SAFE_NO_PAD.encode(b"{\"alg\":\"RS256\"}");
        let blob = format!("{hdr}.e30.AAAA");
        // Header decodes but has no x5c.
        assert!(matches!(
            verify_blob_jws(&blob, "mds.fidoalliance.org", now),
            Err(MdsError::JwsHeaderInvalid)
        ));
    }
}
