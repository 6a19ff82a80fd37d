//! Loading CA keys and certificates, or creating a self-signed CA in case
//! none are provided.

use std::path::{Path, PathBuf};

use log::info;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::nid::Nid;
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, SubjectKeyIdentifier,
};
use openssl::x509::{X509, X509NameBuilder};

use crate::api::cert::Certificate;
use crate::commons::util::file;
use crate::constants::{
    CA_CERT_FILE, CA_KEYS_DIR, CA_KEY_FILE, CA_RSA_KEY_SIZE, CA_VALIDITY_DAYS,
    SERIAL_NUMBER_BITS,
};

use super::keys::digest_for;
use super::{OpenSslSigner, SignerError, Validity};

pub fn ca_dir(data_dir: &Path, profile: &str) -> PathBuf {
    let mut dir = data_dir.to_path_buf();
    dir.push(CA_KEYS_DIR);
    dir.push(profile);
    dir
}

pub fn key_file_path(data_dir: &Path, profile: &str) -> PathBuf {
    file::file_path(&ca_dir(data_dir, profile), CA_KEY_FILE)
}

pub fn cert_file_path(data_dir: &Path, profile: &str) -> PathBuf {
    file::file_path(&ca_dir(data_dir, profile), CA_CERT_FILE)
}

/// Returns a signer for a generated CA, creating the key and self-signed
/// certificate first if either is found to be missing.
pub fn create_ca_if_needed(
    data_dir: &Path,
    profile: &str,
) -> Result<OpenSslSigner, SignerError> {
    let key_file_path = key_file_path(data_dir, profile);
    let cert_file_path = cert_file_path(data_dir, profile);

    if !key_file_path.exists() || !cert_file_path.exists() {
        create_ca(data_dir, profile)?;
    }
    load_ca(&key_file_path, &cert_file_path, &[])
}

/// Creates a new private key and self-signed certificate for a profile.
///
/// Only call this in case there is no current key and certificate file
/// present, or have your files ruthlessly overwritten!
fn create_ca(data_dir: &Path, profile: &str) -> Result<(), SignerError> {
    let key = PKey::from_rsa(openssl::rsa::Rsa::generate(CA_RSA_KEY_SIZE)?)?;
    let common_name = format!("Certenroll {} CA", profile);
    let cert = create_ca_certificate(
        &common_name,
        &key,
        None,
        Validity::days_from_now(CA_VALIDITY_DAYS),
    )?;

    file::save_private(
        &key.private_key_to_pem_pkcs8()?,
        &key_file_path(data_dir, profile),
    )?;
    file::save(&cert.to_pem()?, &cert_file_path(data_dir, profile))?;

    info!(
        "Created self-signed CA '{}' for profile '{}' with fingerprint {}",
        common_name,
        profile,
        cert.fingerprint()?
    );
    Ok(())
}

/// Loads a CA from PEM files.
///
/// Every chain file may hold any number of certificates.
pub fn load_ca(
    key_path: &Path,
    cert_path: &Path,
    chain_paths: &[PathBuf],
) -> Result<OpenSslSigner, SignerError> {
    let key = PKey::private_key_from_pem(&file::read(key_path)?)?;
    let cert = Certificate::from_pem(&file::read(cert_path)?)?;
    let chain = load_certificates(chain_paths)?;
    OpenSslSigner::build(key, cert, chain)
}

/// Loads all certificates found in the given PEM files.
pub fn load_certificates(
    paths: &[PathBuf],
) -> Result<Vec<Certificate>, SignerError> {
    let mut res = Vec::new();
    for path in paths {
        let mut certs = Certificate::stack_from_pem(&file::read(path)?)?;
        if certs.is_empty() {
            return Err(SignerError::InvalidChain(format!(
                "no certificates in '{}'",
                path.display()
            )));
        }
        res.append(&mut certs);
    }
    Ok(res)
}

/// Creates a CA certificate for `key`.
///
/// Without an issuer the certificate is self-signed.
pub fn create_ca_certificate(
    common_name: &str,
    key: &PKeyRef<Private>,
    issuer: Option<(&Certificate, &PKeyRef<Private>)>,
    validity: Validity,
) -> Result<Certificate, SignerError> {
    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_nid(Nid::COMMONNAME, common_name)?;
    let name = name.build();

    let mut builder = X509::builder()?;
    builder.set_version(2)?;
    let serial = {
        let mut bn = BigNum::new()?;
        bn.rand(SERIAL_NUMBER_BITS, MsbOption::MAYBE_ZERO, false)?;
        bn.to_asn1_integer()?
    };
    builder.set_serial_number(&serial)?;
    builder.set_subject_name(&name)?;
    match issuer {
        Some((issuer, _)) => builder.set_issuer_name(issuer.subject())?,
        None => builder.set_issuer_name(&name)?,
    }
    builder.set_pubkey(key)?;
    let not_before = Asn1Time::from_unix(validity.not_before())?;
    builder.set_not_before(&not_before)?;
    let not_after = Asn1Time::from_unix(validity.not_after())?;
    builder.set_not_after(&not_after)?;

    builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
    builder.append_extension(
        KeyUsage::new().critical().key_cert_sign().crl_sign().build()?,
    )?;

    let issuer_cert = issuer.map(|(cert, _)| cert.x509());
    let ski = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(issuer_cert, None))?;
    builder.append_extension(ski)?;
    let aki = AuthorityKeyIdentifier::new()
        .keyid(false)
        .build(&builder.x509v3_context(issuer_cert, None))?;
    builder.append_extension(aki)?;

    let signing_key = issuer.map(|(_, key)| key).unwrap_or(key);
    builder.sign(signing_key, digest_for(signing_key))?;

    Ok(Certificate::from(builder.build()))
}


//------------ Tests ---------------------------------------------------------
