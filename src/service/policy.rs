//! What a profile accepts.

use openssl::pkey::{Id, PKeyRef, Public};

use crate::api::cert::CertificateSigningRequest;
use crate::commons::error::Error;
use crate::config::ProfileConfig;
use crate::signing::KeyAlgorithm;


//------------ CsrPolicy -----------------------------------------------------

/// The checks applied to incoming CSRs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CsrPolicy {
    pub min_rsa_bits: u32,
    pub min_ec_bits: u32,
    pub require_common_name: bool,
}

impl CsrPolicy {
    /// Checks that the CSR is signed by the key it carries.
    pub fn check_pop(&self, csr: &CertificateSigningRequest) -> Result<(), Error> {
        match csr.verify_signature() {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::invalid_csr("signature does not verify")),
            Err(e) => Err(Error::invalid_csr(format!("cannot verify signature: {}", e))),
        }
    }

    pub fn check_subject(&self, csr: &CertificateSigningRequest) -> Result<(), Error> {
        if self.require_common_name {
            match csr.common_name() {
                Some(cn) if !cn.trim().is_empty() => {}
                _ => return Err(Error::invalid_csr("subject has no common name")),
            }
        }
        Ok(())
    }

    /// Checks the type and strength of the key to be certified.
    pub fn check_key(&self, csr: &CertificateSigningRequest) -> Result<(), Error> {
        let key = csr
            .public_key()
            .map_err(|e| Error::invalid_csr(format!("cannot read public key: {}", e)))?;
        self.check_public_key(&key)
    }

    fn check_public_key(&self, key: &PKeyRef<Public>) -> Result<(), Error> {
        let id = key.id();
        if id == Id::RSA {
            if key.bits() < self.min_rsa_bits {
                return Err(Error::invalid_csr(format!(
                    "RSA key of {} bits, at least {} required",
                    key.bits(),
                    self.min_rsa_bits
                )));
            }
        } else if id == Id::EC {
            if key.bits() < self.min_ec_bits {
                return Err(Error::invalid_csr(format!(
                    "EC key of {} bits, at least {} required",
                    key.bits(),
                    self.min_ec_bits
                )));
            }
        } else if id != Id::ED25519 {
            return Err(Error::invalid_csr("unsupported key type"));
        }
        Ok(())
    }
}


//------------ ProfilePolicy -------------------------------------------------

/// The rules a profile enforces.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProfilePolicy {
    pub csr: CsrPolicy,

    /// Enroll only with a valid authenticating certificate.
    pub require_credential: bool,

    /// Re-enrollment must keep the subject of the credential.
    pub subject_continuity: bool,

    pub allow_server_keygen: bool,
    pub server_keygen_algorithm: KeyAlgorithm,
    pub validity_days: u32,
}

impl From<&ProfileConfig> for ProfilePolicy {
    fn from(config: &ProfileConfig) -> Self {
        ProfilePolicy {
            csr: CsrPolicy {
                min_rsa_bits: config.min_rsa_bits,
                min_ec_bits: config.min_ec_bits,
                require_common_name: config.require_common_name,
            },
            require_credential: config.require_credential,
            subject_continuity: config.subject_continuity,
            allow_server_keygen: config.allow_server_keygen,
            server_keygen_algorithm: config.server_keygen_algorithm,
            validity_days: config.validity_days,
        }
    }
}

impl Default for ProfilePolicy {
    fn default() -> Self {
        ProfilePolicy::from(&ProfileConfig::generated("default"))
    }
}


//------------ Tests ---------------------------------------------------------
