//! The requests crossing the enrollment boundary.

use std::fmt;

use bytes::Bytes;

use crate::commons::error::Error;

use super::cert::{Certificate, CertificateSigningRequest, EnrollmentProfile};


//------------ Operation -----------------------------------------------------

/// The operations offered by the enrollment service.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    Health,
    GetCas,
    Enroll,
    Reenroll,
    ServerKeyGen,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Health => "health",
            Operation::GetCas => "cacerts",
            Operation::Enroll => "enroll",
            Operation::Reenroll => "reenroll",
            Operation::ServerKeyGen => "serverkeygen",
        }
    }

    /// Whether requests for this operation must carry a CSR.
    pub fn needs_csr(self) -> bool {
        matches!(
            self,
            Operation::Enroll | Operation::Reenroll | Operation::ServerKeyGen
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


//------------ Typed requests ------------------------------------------------

#[derive(Clone, Copy, Debug, Default)]
pub struct HealthRequest;

#[derive(Clone, Debug, Default)]
pub struct GetCasRequest {
    pub aps: EnrollmentProfile,
    pub crt: Option<Certificate>,
}

#[derive(Debug)]
pub struct EnrollRequest {
    pub csr: CertificateSigningRequest,
    pub aps: EnrollmentProfile,
    pub crt: Option<Certificate>,
}

/// A re-enrollment: the authenticating certificate is not optional.
#[derive(Debug)]
pub struct ReenrollRequest {
    pub crt: Certificate,
    pub csr: CertificateSigningRequest,
    pub aps: EnrollmentProfile,
}

#[derive(Debug)]
pub struct ServerKeyGenRequest {
    pub csr: CertificateSigningRequest,
    pub aps: EnrollmentProfile,
}


//------------ Request -------------------------------------------------------

/// A decoded request for any of the operations.
#[derive(Debug)]
pub enum Request {
    Health(HealthRequest),
    GetCas(GetCasRequest),
    Enroll(EnrollRequest),
    Reenroll(ReenrollRequest),
    ServerKeyGen(ServerKeyGenRequest),
}

impl Request {
    pub fn operation(&self) -> Operation {
        match self {
            Request::Health(_) => Operation::Health,
            Request::GetCas(_) => Operation::GetCas,
            Request::Enroll(_) => Operation::Enroll,
            Request::Reenroll(_) => Operation::Reenroll,
            Request::ServerKeyGen(_) => Operation::ServerKeyGen,
        }
    }

    /// Decodes the parts a transport extracted from the wire.
    ///
    /// Requests of the enrollment family without a CSR are rejected here,
    /// as are unparseable CSRs and certificates, so none of these ever
    /// reach the service.
    pub fn decode(parts: RequestParts) -> Result<Self, Error> {
        let operation = parts.operation;
        let aps = EnrollmentProfile::from(parts.aps);

        let csr = match parts.csr {
            Some(bytes) => Some(
                CertificateSigningRequest::decode(&bytes)
                    .map_err(|e| Error::invalid_csr(format!("cannot parse CSR: {}", e)))?,
            ),
            None if operation.needs_csr() => {
                return Err(Error::malformed(format!(
                    "{} request without CSR",
                    operation
                )));
            }
            None => None,
        };

        let crt = match parts.crt {
            Some(bytes) => Some(Certificate::decode(&bytes).map_err(|e| {
                Error::invalid_credential(format!("cannot parse certificate: {}", e))
            })?),
            None => None,
        };

        // The CSR is present for the enrollment family, checked above.
        let request = match (operation, csr) {
            (Operation::Health, _) => Request::Health(HealthRequest),
            (Operation::GetCas, _) => Request::GetCas(GetCasRequest { aps, crt }),
            (Operation::Enroll, Some(csr)) => {
                Request::Enroll(EnrollRequest { csr, aps, crt })
            }
            (Operation::Reenroll, Some(csr)) => {
                let crt = crt.ok_or_else(|| {
                    Error::invalid_credential(
                        "re-enrollment requires an authenticating certificate",
                    )
                })?;
                Request::Reenroll(ReenrollRequest { crt, csr, aps })
            }
            (Operation::ServerKeyGen, Some(csr)) => {
                Request::ServerKeyGen(ServerKeyGenRequest { csr, aps })
            }
            (operation, None) => {
                return Err(Error::malformed(format!(
                    "{} request without CSR",
                    operation
                )));
            }
        };
        Ok(request)
    }
}


//------------ RequestParts --------------------------------------------------

/// A request as taken off the wire, before any decoding.
///
/// The CSR and certificate may be either PEM or DER encoded. The
/// certificate is typically the peer certificate of the secure channel.
#[derive(Clone, Debug)]
pub struct RequestParts {
    pub operation: Operation,
    pub aps: String,
    pub csr: Option<Bytes>,
    pub crt: Option<Bytes>,
}

impl RequestParts {
    pub fn new(operation: Operation) -> Self {
        RequestParts {
            operation,
            aps: String::new(),
            csr: None,
            crt: None,
        }
    }

    pub fn with_aps(mut self, aps: impl Into<String>) -> Self {
        self.aps = aps.into();
        self
    }

    pub fn with_csr(mut self, csr: impl Into<Bytes>) -> Self {
        self.csr = Some(csr.into());
        self
    }

    pub fn with_crt(mut self, crt: impl Into<Bytes>) -> Self {
        self.crt = Some(crt.into());
        self
    }
}


//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commons::error::ErrorKind;
    use crate::commons::test;
    use crate::signing::Validity;

    #[test]
    fn enrollment_family_requires_csr() {
        for operation in [Operation::Enroll, Operation::Reenroll, Operation::ServerKeyGen] {
            let err = Request::decode(RequestParts::new(operation)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedRequest);
        }
    }

    #[test]
    fn unparseable_csr_is_invalid() {
        let parts = RequestParts::new(Operation::Enroll).with_csr(&b"garbage"[..]);
        let err = Request::decode(parts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CsrInvalid);
    }

    #[test]
    fn reenroll_requires_certificate() {
        let (csr, _) = test::csr("example");
        let parts = RequestParts::new(Operation::Reenroll).with_csr(csr.to_der().unwrap());
        let err = Request::decode(parts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationInvalid);
    }

    #[test]
    fn decodes_typed_requests() {
        let ca = test::ca("Test Root");
        let (csr, _) = test::csr("example");
        let crt = ca.issue(&csr, Validity::days_from_now(1));

        let parts = RequestParts::new(Operation::Reenroll)
            .with_aps("default")
            .with_csr(csr.to_pem().unwrap())
            .with_crt(crt.to_der().unwrap());
        match Request::decode(parts).unwrap() {
            Request::Reenroll(req) => {
                assert_eq!(req.aps.as_str(), "default");
                assert_eq!(req.crt, crt);
                assert_eq!(req.csr.subject_text(), "CN=example");
            }
            other => panic!("unexpected request: {:?}", other),
        }

        let health = Request::decode(RequestParts::new(Operation::Health)).unwrap();
        assert_eq!(health.operation(), Operation::Health);

        let get_cas = Request::decode(RequestParts::new(Operation::GetCas)).unwrap();
        match get_cas {
            Request::GetCas(req) => assert!(req.aps.is_default() && req.crt.is_none()),
            other => panic!("unexpected request: {:?}", other),
        }
    }
}
