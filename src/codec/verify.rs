//! Asymmetric verification of compact tokens (RS256, ES256).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p256::ecdsa::VerifyingKey;
use p256::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::signature::Verifier;
use sha2::Sha256;

use super::jwt::{Header, header_payload_len, split_token};
use super::{CodecError, Result};

/// Error related to public keys.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error(transparent)]
    Pkcs1(#[from] rsa::pkcs1::Error),
    #[error(transparent)]
    Pkcs8(#[from] rsa::pkcs8::spki::Error),
    #[error("unknown public key format")]
    UnknownFormat,
}

/// Public key able to verify RS256 or ES256 tokens.
#[derive(Clone, Debug)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    Ec(VerifyingKey),
}

impl PublicKey {
    /// Read a PEM encoded public key.
    pub fn from_pem(pem: &str) -> std::result::Result<Self, KeyError> {
        if pem.contains("BEGIN RSA PUBLIC KEY") {
            // Means it is PKCS#1 and only RSA.
            Ok(Self::Rsa(RsaPublicKey::from_pkcs1_pem(pem)?))
        } else if pem.contains("BEGIN PUBLIC KEY") {
            // Means it is PKCS#8 and could be even RSA or ECDSA.
            RsaPublicKey::from_public_key_pem(pem)
                .map(Self::Rsa)
                .or_else(|_| VerifyingKey::from_public_key_pem(pem).map(Self::Ec))
                .map_err(KeyError::Pkcs8)
        } else {
            Err(KeyError::UnknownFormat)
        }
    }

    /// Verify `token` and return its decoded payload.
    pub fn verify(&self, token: &[u8]) -> Result<Vec<u8>> {
        match self {
            PublicKey::Rsa(key) => verify_rs256(token, key),
            PublicKey::Ec(key) => verify_es256(token, key),
        }
    }
}

/// Verify an RS256 (RSASSA-PKCS1-v1_5 with SHA-256) token.
pub fn verify_rs256(token: &[u8], key: &RsaPublicKey) -> Result<Vec<u8>> {
    let (signed, signature, payload) = prepare(token, "RS256")?;

    let signature = rsa::pkcs1v15::Signature::try_from(signature.as_slice())
        .map_err(|_| CodecError::InvalidSignature)?;
    rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key.clone())
        .verify(signed, &signature)
        .map_err(|_| CodecError::InvalidSignature)?;

    Ok(payload)
}

/// Verify an ES256 (ECDSA P-256 with SHA-256, `r ‖ s` signature) token.
pub fn verify_es256(token: &[u8], key: &VerifyingKey) -> Result<Vec<u8>> {
    let (signed, signature, payload) = prepare(token, "ES256")?;

    let signature = p256::ecdsa::Signature::from_slice(&signature)
        .map_err(|_| CodecError::InvalidSignature)?;
    key.verify(signed, &signature)
        .map_err(|_| CodecError::InvalidSignature)?;

    Ok(payload)
}

/// Check the header algorithm and decode signature and payload.
fn prepare<'a>(
    token: &'a [u8],
    algorithm: &str,
) -> Result<(&'a [u8], Vec<u8>, Vec<u8>)> {
    let [header, payload, signature] = split_token(token)?;

    let header: Header = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header)?)?;
    if header.alg != algorithm {
        return Err(CodecError::UnsupportedAlgorithm(header.alg));
    }

    Ok((
        &token[..header_payload_len(token)],
        URL_SAFE_NO_PAD.decode(signature)?,
        URL_SAFE_NO_PAD.decode(payload)?,
    ))
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;
    use rsa::RsaPrivateKey;
    use rsa::signature::{SignatureEncoding, Signer};

    use super::*;

    const PAYLOAD: &str = r#"{"sub":"1234567890","iat":1516239022}"#;

    fn unsigned(alg: &str) -> String {
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(format!(r#"{{"alg":"{alg}","typ":"JWT"}}"#)),
            URL_SAFE_NO_PAD.encode(PAYLOAD)
        )
    }

    #[test]
    fn test_rs256() {
        let private_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let signing_key =
            rsa::pkcs1v15::SigningKey::<Sha256>::new(private_key.clone());

        let signed = unsigned("RS256");
        let signature = signing_key.sign(signed.as_bytes()).to_vec();
        let token = format!("{signed}.{}", URL_SAFE_NO_PAD.encode(signature));

        let public_key = private_key.to_public_key();
        let payload = verify_rs256(token.as_bytes(), &public_key).unwrap();
        assert_eq!(payload, PAYLOAD.as_bytes());

        let mut tampered = token.into_bytes();
        let last = tampered.len() - 2;
        tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
        assert!(verify_rs256(&tampered, &public_key).is_err());
    }

    #[test]
    fn test_es256() {
        let signing_key = p256::ecdsa::SigningKey::random(&mut OsRng);

        let signed = unsigned("ES256");
        let signature: p256::ecdsa::Signature = signing_key.sign(signed.as_bytes());
        let token =
            format!("{signed}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes()));

        let key = PublicKey::Ec(VerifyingKey::from(&signing_key));
        assert_eq!(key.verify(token.as_bytes()).unwrap(), PAYLOAD.as_bytes());

        let other = p256::ecdsa::SigningKey::random(&mut OsRng);
        assert!(matches!(
            verify_es256(token.as_bytes(), other.verifying_key()),
            Err(CodecError::InvalidSignature)
        ));
    }

    #[test]
    fn test_algorithm_mismatch() {
        let signing_key = p256::ecdsa::SigningKey::random(&mut OsRng);
        let token = format!("{}.c2ln", unsigned("HS256"));

        assert!(matches!(
            verify_es256(token.as_bytes(), signing_key.verifying_key()),
            Err(CodecError::UnsupportedAlgorithm(alg)) if alg == "HS256"
        ));
    }

    #[test]
    fn test_rsa_pem() {
        const REAL_KEY: &str = r#"-----BEGIN PUBLIC KEY-----
MIGeMA0GCSqGSIb3DQEBAQUAA4GMADCBiAKBgH/cOrXe5GfnKdiFjP4T4g+WyKHE
9WroOd0d6zbfsGuhEAYEmoSXV9HW1/HbLObzRb/O5yBC8Cb/sEyCGhgkSDelpQev
sdhTB1QMqUXLcft1ehq0+4ZGrx0czfg3TYg60FX2nbtJOz4eQHa8kIif8NJsSpDW
x7tMF74uf+o+1cNdAgMBAAE=
-----END PUBLIC KEY-----"#;

        assert!(matches!(
            PublicKey::from_pem(REAL_KEY),
            Ok(PublicKey::Rsa(_))
        ));
        assert!(matches!(
            PublicKey::from_pem("ssh-rsa AAAA"),
            Err(KeyError::UnknownFormat)
        ));
    }

    #[test]
    fn test_ecdsa_pem() {
        const REAL_KEY: &str = r#"-----BEGIN PUBLIC KEY-----
MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAElInmvVOpx1FjEDIH6dGC6CxbtBjx
02gUk8op1zxJvuA1zL0Pe07KO6wIjr+Ndi6HteDfqsC4Kzg+xDrUdTwRtw==
-----END PUBLIC KEY-----"#;

        assert!(matches!(PublicKey::from_pem(REAL_KEY), Ok(PublicKey::Ec(_))));

        // secp256k1 key, not P-256.
        const OTHER_CURVE: &str = r#"-----BEGIN PUBLIC KEY-----
MFYwEAYHKoZIzj0CAQYFK4EEAAoDQgAEMcCSmtPOJLBrFImsV59akn3pmwGuebiT
pQkthCHdjBbLyMZDI//d7+I3AxnZ+/QyFO32e8tvkYdAT4MM2jb0AyxA
-----END PUBLIC KEY-----"#;
        assert!(PublicKey::from_pem(OTHER_CURVE).is_err());
    }
}
