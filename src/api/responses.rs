//! The responses produced by the enrollment boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::commons::error::Error;

use super::cert::{Certificate, PrivateKeyMaterial};


//------------ Typed responses -----------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HealthResponse {
    pub healthy: bool,
}

/// The CA certificates, trust anchor first.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GetCasResponse {
    pub certs: Vec<Certificate>,
}

/// The response shared by enrollment and re-enrollment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnrollReenrollResponse {
    pub cert: Certificate,
}

/// A certificate together with the server generated private key.
///
/// The key is handed to the caller and not kept anywhere else.
#[derive(Debug)]
pub struct ServerKeyGenResponse {
    pub cert: Certificate,
    pub key: PrivateKeyMaterial,
}


//------------ Response ------------------------------------------------------

#[derive(Debug)]
pub enum Response {
    Health(HealthResponse),
    GetCas(GetCasResponse),
    Enroll(EnrollReenrollResponse),
    Reenroll(EnrollReenrollResponse),
    ServerKeyGen(ServerKeyGenResponse),
}

impl Response {
    /// Converts the response into its serializable report.
    ///
    /// Note that for server-side key generation the report includes the
    /// private key in PEM format.
    pub fn to_report(&self) -> Result<ResponseReport, Error> {
        let pem = |cert: &Certificate| -> Result<String, Error> {
            let pem = cert
                .to_pem()
                .map_err(|e| Error::issuance(format!("cannot encode certificate: {}", e)))?;
            String::from_utf8(pem)
                .map_err(|e| Error::issuance(format!("cannot encode certificate: {}", e)))
        };

        let report = match self {
            Response::Health(res) => ResponseReport {
                healthy: Some(res.healthy),
                certs: vec![],
                key: None,
            },
            Response::GetCas(res) => ResponseReport {
                healthy: None,
                certs: res.certs.iter().map(pem).collect::<Result<_, _>>()?,
                key: None,
            },
            Response::Enroll(res) | Response::Reenroll(res) => ResponseReport {
                healthy: None,
                certs: vec![pem(&res.cert)?],
                key: None,
            },
            Response::ServerKeyGen(res) => {
                use secrecy::ExposeSecret;

                let key = res
                    .key
                    .to_pem()
                    .map_err(|e| Error::keygen(format!("cannot encode key: {}", e)))?;
                let key = String::from_utf8(key.expose_secret().clone())
                    .map_err(|e| Error::keygen(format!("cannot encode key: {}", e)))?;
                ResponseReport {
                    healthy: None,
                    certs: vec![pem(&res.cert)?],
                    key: Some(key),
                }
            }
        };
        Ok(report)
    }
}


//------------ ResponseReport ------------------------------------------------

/// A response in a form that can be printed or sent as JSON.
///
/// This is where a generated private key leaves its secret wrapper, so a
/// report should go straight to the client and be dropped. Debug output
/// leaves the key out.
#[derive(Clone, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ResponseReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy: Option<bool>,

    /// PEM encoded certificates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certs: Vec<String>,

    /// The PEM encoded private key of server-side key generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl fmt::Debug for ResponseReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ResponseReport")
            .field("healthy", &self.healthy)
            .field("certs", &self.certs)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}


//------------ Tests ---------------------------------------------------------
