//! The errors surfaced by the enrollment boundary.

use std::collections::HashMap;
use std::{fmt, io};

use openssl::error::ErrorStack;
use serde::{Deserialize, Serialize};


//------------ Error ---------------------------------------------------------

/// An error produced while serving an enrollment request.
///
/// The variants mirror the kinds a transport adapter has to map onto its
/// own status signaling, see [`ErrorKind`]. The dispatch layer hands these
/// back to the transport exactly as the service produced them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// The request could not be decoded into a typed request value.
    MalformedRequest(String),

    /// The enrollment profile is not known.
    ProfileNotFound(String),

    /// The CSR is unparseable, badly signed, too weak or not allowed.
    CsrInvalid(String),

    /// The profile requires a credential that is absent or invalid.
    AuthorizationDenied(String),

    /// The presented certificate failed validation.
    AuthenticationInvalid(String),

    /// The presented certificate has expired.
    AuthenticationExpired(String),

    /// The subject of a re-enrollment CSR differs from the credential.
    SubjectMismatch {
        expected: String,
        found: String,
    },

    /// The signing backend could not issue the certificate.
    IssuanceFailed(String),

    /// The signing backend could not generate a key pair.
    KeyGenerationFailed(String),

    /// The call was cancelled by the caller.
    Cancelled,

    /// The call ran out of time.
    DeadlineExceeded,
}

impl Error {
    pub fn malformed(msg: impl fmt::Display) -> Self {
        Error::MalformedRequest(msg.to_string())
    }

    pub fn profile_not_found(name: impl fmt::Display) -> Self {
        Error::ProfileNotFound(name.to_string())
    }

    pub fn invalid_csr(msg: impl fmt::Display) -> Self {
        Error::CsrInvalid(msg.to_string())
    }

    pub fn denied(msg: impl fmt::Display) -> Self {
        Error::AuthorizationDenied(msg.to_string())
    }

    pub fn invalid_credential(msg: impl fmt::Display) -> Self {
        Error::AuthenticationInvalid(msg.to_string())
    }

    pub fn issuance(msg: impl fmt::Display) -> Self {
        Error::IssuanceFailed(msg.to_string())
    }

    pub fn keygen(msg: impl fmt::Display) -> Self {
        Error::KeyGenerationFailed(msg.to_string())
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedRequest(_) => ErrorKind::MalformedRequest,
            Error::ProfileNotFound(_) => ErrorKind::ProfileNotFound,
            Error::CsrInvalid(_) => ErrorKind::CsrInvalid,
            Error::AuthorizationDenied(_) => ErrorKind::AuthorizationDenied,
            Error::AuthenticationInvalid(_) => ErrorKind::AuthenticationInvalid,
            Error::AuthenticationExpired(_) => ErrorKind::AuthenticationExpired,
            Error::SubjectMismatch { .. } => ErrorKind::SubjectMismatch,
            Error::IssuanceFailed(_) => ErrorKind::IssuanceFailed,
            Error::KeyGenerationFailed(_) => ErrorKind::KeyGenerationFailed,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::DeadlineExceeded => ErrorKind::DeadlineExceeded,
        }
    }

    /// Converts the error into the structure a transport can encode.
    pub fn to_error_response(&self) -> ErrorResponse {
        let res = ErrorResponse::new(self.kind().label(), self);
        match self {
            Error::ProfileNotFound(name) => res.with_arg("profile", name),
            Error::SubjectMismatch { expected, found } => {
                res.with_arg("expected", expected).with_arg("found", found)
            }
            _ => res,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MalformedRequest(e) => write!(f, "Malformed request: {}", e),
            Error::ProfileNotFound(name) => {
                write!(f, "Unknown enrollment profile '{}'", name)
            }
            Error::CsrInvalid(e) => write!(f, "Invalid CSR: {}", e),
            Error::AuthorizationDenied(e) => write!(f, "Not authorized: {}", e),
            Error::AuthenticationInvalid(e) => {
                write!(f, "Invalid authenticating certificate: {}", e)
            }
            Error::AuthenticationExpired(e) => {
                write!(f, "Authenticating certificate expired: {}", e)
            }
            Error::SubjectMismatch { expected, found } => write!(
                f,
                "CSR subject '{}' does not match certificate subject '{}'",
                found, expected
            ),
            Error::IssuanceFailed(e) => write!(f, "Issuance failed: {}", e),
            Error::KeyGenerationFailed(e) => {
                write!(f, "Key generation failed: {}", e)
            }
            Error::Cancelled => write!(f, "Request was cancelled"),
            Error::DeadlineExceeded => write!(f, "Request deadline exceeded"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ErrorStack> for Error {
    fn from(e: ErrorStack) -> Self {
        Error::IssuanceFailed(e.to_string())
    }
}


//------------ ErrorKind -----------------------------------------------------

/// The kind of an [`Error`] without any of its details.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    MalformedRequest,
    ProfileNotFound,
    CsrInvalid,
    AuthorizationDenied,
    AuthenticationInvalid,
    AuthenticationExpired,
    SubjectMismatch,
    IssuanceFailed,
    KeyGenerationFailed,
    Cancelled,
    DeadlineExceeded,
}

impl ErrorKind {
    /// A stable label for use in error responses.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::MalformedRequest => "malformed-request",
            ErrorKind::ProfileNotFound => "profile-not-found",
            ErrorKind::CsrInvalid => "csr-invalid",
            ErrorKind::AuthorizationDenied => "authorization-denied",
            ErrorKind::AuthenticationInvalid => "authentication-invalid",
            ErrorKind::AuthenticationExpired => "authentication-expired",
            ErrorKind::SubjectMismatch => "subject-mismatch",
            ErrorKind::IssuanceFailed => "issuance-failed",
            ErrorKind::KeyGenerationFailed => "key-generation-failed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::DeadlineExceeded => "deadline-exceeded",
        }
    }

    /// Whether the caller can safely retry the identical request.
    ///
    /// Backend failures are not included here: whether those are transient
    /// is for the service to decide before it returns them.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Cancelled | ErrorKind::DeadlineExceeded)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}


//------------ ErrorResponse -------------------------------------------------

/// An error in a form that can be encoded by a transport.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ErrorResponse {
    /// The error label.
    pub label: String,

    /// The error message.
    pub msg: String,

    /// Arguments with details about the error.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub args: HashMap<String, String>,
}

impl ErrorResponse {
    pub fn new(label: &str, msg: impl fmt::Display) -> Self {
        ErrorResponse {
            label: label.to_string(),
            msg: msg.to_string(),
            args: HashMap::new(),
        }
    }

    pub fn with_arg(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.args.insert(key.to_string(), value.to_string());
        self
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.msg)
    }
}


//------------ IoError -------------------------------------------------------

/// An I/O error together with what we were trying to do.
#[derive(Debug)]
pub struct IoError {
    context: String,
    cause: io::Error,
}

impl IoError {
    pub fn new(context: String, cause: io::Error) -> Self {
        IoError { context, cause }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.cause)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}


//------------ Tests ---------------------------------------------------------
