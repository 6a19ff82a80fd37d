#![allow(dead_code)] // Different tests use different parts.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use openssl::pkey::{PKey, Private};
use tempfile::TempDir;

use certenroll::api::{
    Certificate, CertificateSigningRequest, Operation, RequestParts, Response,
};
use certenroll::config::{Config, ProfileConfig};
use certenroll::dispatch::Endpoints;
use certenroll::service::{CallContext, CertAuthority};
use certenroll::signing::ca_keys;
use certenroll::signing::{IssuanceRequest, KeyAlgorithm, OpenSslSigner, Signer, Validity};


//------------ TestAuthority -------------------------------------------------

/// An authority with generated CAs in a temporary data directory.
pub struct TestAuthority {
    pub data_dir: TempDir,
    pub config: Config,
    pub authority: Arc<CertAuthority>,
    pub endpoints: Endpoints,
}

impl TestAuthority {
    /// Creates an authority with a "default" profile.
    pub fn new() -> Self {
        Self::with_profiles(vec![])
    }

    /// Creates an authority with a "default" profile and `extra` ones.
    pub fn with_profiles(extra: Vec<ProfileConfig>) -> Self {
        let data_dir = TempDir::new().unwrap();
        let mut config = Config::test(data_dir.path());
        config.profiles.extend(extra);
        config.verify().unwrap();

        let authority = Arc::new(CertAuthority::from_config(&config).unwrap());
        let endpoints = Endpoints::new(authority.clone(), config.call_timeout());
        TestAuthority { data_dir, config, authority, endpoints }
    }

    pub async fn handle(&self, parts: RequestParts) -> Result<Response, certenroll::commons::error::Error> {
        self.endpoints.handle(&CallContext::new(), parts).await
    }

    /// Returns a separate signer over the CA files of `profile`.
    ///
    /// Lets tests issue certificates the authority wouldn't.
    pub fn ca_signer(&self, profile: &str) -> OpenSslSigner {
        let dir: &Path = self.data_dir.path();
        ca_keys::load_ca(
            &ca_keys::key_file_path(dir, profile),
            &ca_keys::cert_file_path(dir, profile),
            &[],
        )
        .unwrap()
    }

    /// Issues a certificate for `csr` with the given validity.
    pub fn issue(
        &self,
        profile: &str,
        csr: &CertificateSigningRequest,
        validity: Validity,
    ) -> Certificate {
        let request = IssuanceRequest::for_csr(csr, validity).unwrap();
        self.ca_signer(profile).issue(&request).unwrap()
    }

    /// Issues a certificate for `csr` that expired an hour ago.
    pub fn issue_expired(&self, profile: &str, csr: &CertificateSigningRequest) -> Certificate {
        let now = chrono::Utc::now().timestamp();
        self.issue(profile, csr, Validity::new(now - 86_400, now - 3_600))
    }
}


//------------ Helpers -------------------------------------------------------

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

/// Creates a CSR for an RSA key of the given size.
pub fn rsa_csr(common_name: &str, bits: u32) -> CertificateSigningRequest {
    let key = PKey::from_rsa(openssl::rsa::Rsa::generate(bits).unwrap()).unwrap();
    CertificateSigningRequest::build(common_name, &key).unwrap()
}

pub fn pem(csr: &CertificateSigningRequest) -> Bytes {
    Bytes::from(csr.to_pem().unwrap())
}

pub fn enroll(profile: &str, csr: &CertificateSigningRequest) -> RequestParts {
    RequestParts::new(Operation::Enroll).with_aps(profile).with_csr(pem(csr))
}

pub fn reenroll(
    profile: &str,
    crt: &Certificate,
    csr: &CertificateSigningRequest,
) -> RequestParts {
    RequestParts::new(Operation::Reenroll)
        .with_aps(profile)
        .with_csr(pem(csr))
        .with_crt(crt.to_der().unwrap())
}

pub fn server_keygen(profile: &str, csr: &CertificateSigningRequest) -> RequestParts {
    RequestParts::new(Operation::ServerKeyGen).with_aps(profile).with_csr(pem(csr))
}

/// A profile with a generated CA that allows server-side key generation.
pub fn keygen_profile(name: &str, algorithm: KeyAlgorithm) -> ProfileConfig {
    let mut profile = ProfileConfig::generated(name);
    profile.allow_server_keygen = true;
    profile.server_keygen_algorithm = algorithm;
    profile
}

/// Returns the issued certificate of an enrollment response.
pub fn issued(response: Response) -> Certificate {
    match response {
        Response::Enroll(res) | Response::Reenroll(res) => res.cert,
        other => panic!("expected an issued certificate, got {:?}", other),
    }
}
