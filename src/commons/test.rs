//! Helper functions for testing.
#![cfg(test)]

use std::path::PathBuf;
use std::sync::Arc;

use openssl::pkey::{PKey, Private};

use crate::api::cert::{Certificate, CertificateSigningRequest};
use crate::signing::ca_keys::create_ca_certificate;
use crate::signing::{IssuanceRequest, KeyAlgorithm, OpenSslSigner, Signer, Validity};

/// This method sets up a temporary test directory, runs the test provided
/// in the closure, and finally cleans up the test directory.
pub fn test_under_tmp<F>(op: F)
where
    F: FnOnce(PathBuf),
{
    let dir = tempfile::tempdir().unwrap();
    op(dir.path().into());
}


//------------ TestCa --------------------------------------------------------

/// A CA with its key at hand.
pub struct TestCa {
    key: PKey<Private>,
    cert: Certificate,
    signer: OpenSslSigner,
}

impl TestCa {
    pub fn key(&self) -> &PKey<Private> {
        &self.key
    }

    pub fn certificate(&self) -> &Certificate {
        &self.cert
    }

    pub fn signer(&self) -> &OpenSslSigner {
        &self.signer
    }

    /// Returns a new signer for this CA that can be handed out.
    pub fn shared_signer(&self) -> Arc<dyn Signer> {
        let chain = self.signer.ca_chain().to_vec();
        Arc::new(OpenSslSigner::build(self.key.clone(), self.cert.clone(), chain).unwrap())
    }

    /// Issues a certificate for `csr` with the given validity.
    pub fn issue(&self, csr: &CertificateSigningRequest, validity: Validity) -> Certificate {
        let request = IssuanceRequest::for_csr(csr, validity).unwrap();
        self.signer.issue(&request).unwrap()
    }

    /// Issues a certificate that expired an hour ago.
    pub fn issue_expired(&self, csr: &CertificateSigningRequest) -> Certificate {
        let now = chrono::Utc::now().timestamp();
        self.issue(csr, Validity::new(now - 86_400, now - 3_600))
    }
}

/// Creates a self-signed CA.
pub fn ca(common_name: &str) -> TestCa {
    let key = KeyAlgorithm::EcP256.generate().unwrap();
    let cert =
        create_ca_certificate(common_name, &key, None, Validity::days_from_now(30)).unwrap();
    let signer = OpenSslSigner::build(key.clone(), cert.clone(), vec![]).unwrap();
    TestCa { key, cert, signer }
}

/// Creates a CA issued by `parent`.
pub fn intermediate(parent: &TestCa, common_name: &str) -> TestCa {
    let key = KeyAlgorithm::EcP256.generate().unwrap();
    let cert = create_ca_certificate(
        common_name,
        &key,
        Some((parent.certificate(), parent.key())),
        Validity::days_from_now(20),
    )
    .unwrap();
    let signer = OpenSslSigner::build(
        key.clone(),
        cert.clone(),
        parent.signer().ca_chain().to_vec(),
    )
    .unwrap();
    TestCa { key, cert, signer }
}

/// Creates a CSR for the given common name with a fresh EC key.
pub fn csr(common_name: &str) -> (CertificateSigningRequest, PKey<Private>) {
    let key = KeyAlgorithm::EcP256.generate().unwrap();
    let csr = CertificateSigningRequest::build(common_name, &key).unwrap();
    (csr, key)
}

/// Creates a CSR whose signature no longer matches its content.
pub fn tampered_csr(common_name: &str) -> CertificateSigningRequest {
    let (csr, _) = csr(common_name);
    let mut der = csr.to_der().unwrap();
    if let Some(last) = der.last_mut() {
        *last ^= 0x01;
    }
    CertificateSigningRequest::from_der(&der).unwrap()
}
