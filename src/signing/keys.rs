//! Key algorithms supported for generated keys.

use std::fmt;
use std::str::FromStr;

use openssl::ec::{EcGroup, EcKey};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, PKeyRef, Private};
use openssl::rsa::Rsa;
use serde::de;
use serde::{Deserialize, Deserializer};


//------------ KeyAlgorithm --------------------------------------------------

/// The algorithm used when a key pair is generated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyAlgorithm {
    Rsa2048,
    Rsa3072,
    Rsa4096,
    EcP256,
    EcP384,
    Ed25519,
}

impl KeyAlgorithm {
    pub fn generate(self) -> Result<PKey<Private>, ErrorStack> {
        match self {
            KeyAlgorithm::Rsa2048 => rsa(2048),
            KeyAlgorithm::Rsa3072 => rsa(3072),
            KeyAlgorithm::Rsa4096 => rsa(4096),
            KeyAlgorithm::EcP256 => ec(Nid::X9_62_PRIME256V1),
            KeyAlgorithm::EcP384 => ec(Nid::SECP384R1),
            KeyAlgorithm::Ed25519 => PKey::generate_ed25519(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa2048 => "rsa2048",
            KeyAlgorithm::Rsa3072 => "rsa3072",
            KeyAlgorithm::Rsa4096 => "rsa4096",
            KeyAlgorithm::EcP256 => "ec-p256",
            KeyAlgorithm::EcP384 => "ec-p384",
            KeyAlgorithm::Ed25519 => "ed25519",
        }
    }
}

fn rsa(bits: u32) -> Result<PKey<Private>, ErrorStack> {
    PKey::from_rsa(Rsa::generate(bits)?)
}

fn ec(curve: Nid) -> Result<PKey<Private>, ErrorStack> {
    let group = EcGroup::from_curve_name(curve)?;
    PKey::from_ec_key(EcKey::generate(&group)?)
}

impl FromStr for KeyAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rsa2048" => Ok(KeyAlgorithm::Rsa2048),
            "rsa3072" => Ok(KeyAlgorithm::Rsa3072),
            "rsa4096" => Ok(KeyAlgorithm::Rsa4096),
            "ec-p256" => Ok(KeyAlgorithm::EcP256),
            "ec-p384" => Ok(KeyAlgorithm::EcP384),
            "ed25519" => Ok(KeyAlgorithm::Ed25519),
            _ => Err(format!(
                "expected \"rsa2048\", \"rsa3072\", \"rsa4096\", \
                 \"ec-p256\", \"ec-p384\" or \"ed25519\", found: \"{}\"",
                s
            )),
        }
    }
}

impl<'de> Deserialize<'de> for KeyAlgorithm {
    fn deserialize<D>(d: D) -> Result<KeyAlgorithm, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(d)?;
        KeyAlgorithm::from_str(&string).map_err(de::Error::custom)
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


//------------ Helpers -------------------------------------------------------

/// The digest to sign with for a given key.
///
/// Ed25519 signs the message itself, so there is no separate digest.
pub fn digest_for<T>(key: &PKeyRef<T>) -> MessageDigest {
    if key.id() == Id::ED25519 {
        MessageDigest::null()
    } else {
        MessageDigest::sha256()
    }
}


//------------ Tests ---------------------------------------------------------
