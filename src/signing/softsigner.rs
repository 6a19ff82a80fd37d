//! Support for issuing certificates using a software CA key (through
//! openssl).

use log::{debug, warn};
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::bn::{BigNum, MsbOption};
use openssl::error::ErrorStack;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage,
    SubjectKeyIdentifier,
};
use openssl::x509::{X509, X509Name};

use crate::api::cert::{same_name, Certificate};
use crate::constants::SERIAL_NUMBER_BITS;

use super::keys::digest_for;
use super::{IssuanceRequest, KeyAlgorithm, Signer, SignerError};


//------------ OpenSslSigner -------------------------------------------------

/// An openssl based CA.
///
/// Keeps its key in memory. The chain is put in trust anchor first order
/// once, when the signer is built, so that it is always handed out the same.
pub struct OpenSslSigner {
    key: PKey<Private>,
    issuer: Certificate,
    chain: Vec<Certificate>,
}

impl OpenSslSigner {
    /// Builds a signer for the issuing CA `issuer` and its `key`.
    ///
    /// The `extra` certificates are the CA certificates above the issuer,
    /// in any order. Certificates that are not part of the issuer's chain
    /// are dropped.
    pub fn build(
        key: PKey<Private>,
        issuer: Certificate,
        extra: Vec<Certificate>,
    ) -> Result<Self, SignerError> {
        if !issuer.public_key()?.public_eq(&key) {
            return Err(SignerError::KeyMismatch);
        }
        let chain = order_chain(&issuer, extra)?;
        debug!(
            "Built signer for '{}' with a chain of {} certificate(s)",
            issuer.subject_text(),
            chain.len()
        );
        Ok(OpenSslSigner { key, issuer, chain })
    }
}

impl Signer for OpenSslSigner {
    fn ca_chain(&self) -> &[Certificate] {
        &self.chain
    }

    fn issuer(&self) -> &Certificate {
        &self.issuer
    }

    fn issue(&self, request: &IssuanceRequest) -> Result<Certificate, SignerError> {
        let issuer = self.issuer.x509();

        let mut builder = X509::builder()?;
        builder.set_version(2)?;

        let serial = {
            let mut bn = BigNum::new()?;
            bn.rand(SERIAL_NUMBER_BITS, MsbOption::MAYBE_ZERO, false)?;
            bn.to_asn1_integer()?
        };
        builder.set_serial_number(&serial)?;

        let subject = X509Name::from_der(&request.subject)?;
        builder.set_subject_name(&subject)?;
        builder.set_issuer_name(issuer.subject_name())?;
        builder.set_pubkey(&request.public_key)?;

        let not_before = Asn1Time::from_unix(request.validity.not_before())?;
        builder.set_not_before(&not_before)?;
        // Clamped before conversion, which fails past the year 9999.
        let issuer_not_after = unix_time(issuer.not_after())?;
        let not_after = request.validity.not_after().min(issuer_not_after);
        let not_after = Asn1Time::from_unix(not_after)?;
        builder.set_not_after(&not_after)?;

        builder.append_extension(BasicConstraints::new().critical().build()?)?;
        builder.append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_encipherment()
                .build()?,
        )?;
        builder.append_extension(
            ExtendedKeyUsage::new().client_auth().server_auth().build()?,
        )?;
        let ski = SubjectKeyIdentifier::new()
            .build(&builder.x509v3_context(Some(issuer), None))?;
        builder.append_extension(ski)?;
        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&builder.x509v3_context(Some(issuer), None))?;
        builder.append_extension(aki)?;

        builder.sign(&self.key, digest_for(&self.key))?;
        Ok(Certificate::from(builder.build()))
    }

    fn generate_key(
        &self,
        algorithm: KeyAlgorithm,
    ) -> Result<PKey<Private>, SignerError> {
        algorithm.generate().map_err(SignerError::from)
    }
}

/// Returns a certificate time as seconds since the Unix epoch.
fn unix_time(time: &Asn1TimeRef) -> Result<i64, ErrorStack> {
    let diff = Asn1Time::from_unix(0)?.diff(time)?;
    Ok(i64::from(diff.days) * 86_400 + i64::from(diff.secs))
}

/// Walks up from the issuer and returns the chain trust anchor first.
fn order_chain(
    issuer: &Certificate,
    mut extra: Vec<Certificate>,
) -> Result<Vec<Certificate>, SignerError> {
    let mut chain = vec![issuer.clone()];
    let mut current = issuer.clone();

    while !current.is_self_issued() {
        let parent = extra.iter().position(|candidate| {
            same_name(candidate.subject(), current.issuer())
                && current.is_signed_by(candidate)
        });
        match parent {
            Some(pos) => {
                let parent = extra.swap_remove(pos);
                chain.push(parent.clone());
                current = parent;
            }
            None => {
                warn!(
                    "CA chain for '{}' ends at '{}', which is not self-issued",
                    issuer.subject_text(),
                    current.subject_text()
                );
                break;
            }
        }
    }

    if current.is_self_issued() && !current.is_signed_by(&current) {
        return Err(SignerError::InvalidChain(format!(
            "trust anchor '{}' is not self-signed",
            current.subject_text()
        )));
    }

    if !extra.is_empty() {
        warn!(
            "Ignoring {} certificate(s) not in the chain of '{}'",
            extra.len(),
            issuer.subject_text()
        );
    }

    chain.reverse();
    Ok(chain)
}


//------------ Tests ---------------------------------------------------------
