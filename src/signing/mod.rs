//! The signing backend used by the enrollment authority.
//!
//! The authority never touches CA keys itself. It asks a [`Signer`] for the
//! CA chain, to issue certificates, and to generate key pairs for
//! server-side key generation.

pub mod ca_keys;
pub mod keys;
pub mod softsigner;

pub use self::keys::KeyAlgorithm;
pub use self::softsigner::OpenSslSigner;

use std::fmt;

use openssl::error::ErrorStack;
use openssl::pkey::{PKey, Private, Public};

use crate::api::cert::{Certificate, CertificateSigningRequest};
use crate::commons::error::IoError;
use crate::constants::ISSUANCE_BACKDATE_SECONDS;


//------------ Signer --------------------------------------------------------

/// A certification authority able to issue certificates.
///
/// Implementations are called from blocking worker threads and must be
/// usable by any number of concurrent callers.
pub trait Signer: Send + Sync + 'static {
    /// The CA chain, trust anchor first and issuing CA last.
    fn ca_chain(&self) -> &[Certificate];

    /// The certificate of the issuing CA.
    fn issuer(&self) -> &Certificate;

    /// Issues an end-entity certificate.
    fn issue(&self, request: &IssuanceRequest) -> Result<Certificate, SignerError>;

    /// Generates a new key pair.
    fn generate_key(
        &self,
        algorithm: KeyAlgorithm,
    ) -> Result<PKey<Private>, SignerError>;
}


//------------ IssuanceRequest -----------------------------------------------

/// What goes into a new certificate.
///
/// Owns all its parts so that it can be moved to a worker thread.
pub struct IssuanceRequest {
    /// The DER encoded subject name.
    pub subject: Vec<u8>,

    /// The key to certify.
    pub public_key: PKey<Public>,

    pub validity: Validity,
}

impl IssuanceRequest {
    /// Creates a request certifying the subject and key of a CSR.
    pub fn for_csr(
        csr: &CertificateSigningRequest,
        validity: Validity,
    ) -> Result<Self, ErrorStack> {
        Ok(IssuanceRequest {
            subject: csr.subject().to_der()?,
            public_key: csr.public_key()?,
            validity,
        })
    }

    /// Creates a request certifying the public half of `key`.
    pub fn for_key(
        subject: Vec<u8>,
        key: &PKey<Private>,
        validity: Validity,
    ) -> Result<Self, ErrorStack> {
        let public_key = PKey::public_key_from_der(&key.public_key_to_der()?)?;
        Ok(IssuanceRequest { subject, public_key, validity })
    }
}


//------------ Validity ------------------------------------------------------

/// A validity window in seconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Validity {
    not_before: i64,
    not_after: i64,
}

impl Validity {
    pub fn new(not_before: i64, not_after: i64) -> Self {
        Validity { not_before, not_after }
    }

    /// Starting a few minutes ago to allow for clock skew.
    pub fn days_from_now(days: u32) -> Self {
        let now = chrono::Utc::now().timestamp();
        Validity {
            not_before: now - ISSUANCE_BACKDATE_SECONDS,
            not_after: now + i64::from(days) * 86_400,
        }
    }

    pub fn not_before(&self) -> i64 {
        self.not_before
    }

    pub fn not_after(&self) -> i64 {
        self.not_after
    }
}


//------------ SignerError ---------------------------------------------------

#[derive(Debug)]
pub enum SignerError {
    OpenSslError(ErrorStack),
    IoError(IoError),
    KeyMismatch,
    InvalidChain(String),
}

impl fmt::Display for SignerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignerError::OpenSslError(e) => write!(f, "OpenSsl Error: {}", e),
            SignerError::IoError(e) => e.fmt(f),
            SignerError::KeyMismatch => {
                write!(f, "CA key does not match the CA certificate")
            }
            SignerError::InvalidChain(e) => write!(f, "Invalid CA chain: {}", e),
        }
    }
}

impl std::error::Error for SignerError {}

impl From<ErrorStack> for SignerError {
    fn from(e: ErrorStack) -> Self {
        SignerError::OpenSslError(e)
    }
}

impl From<IoError> for SignerError {
    fn from(e: IoError) -> Self {
        SignerError::IoError(e)
    }
}
