//! The data model of the enrollment boundary.
//!
//! Transports decode their wire format into [`RequestParts`], which are
//! turned into typed [`Request`] values, and encode the [`Response`]
//! values they get back.

pub mod cert;
pub mod requests;
pub mod responses;

pub use self::cert::{
    Certificate, CertificateSigningRequest, EnrollmentProfile, PrivateKeyMaterial,
};
pub use self::requests::{
    EnrollRequest, GetCasRequest, HealthRequest, Operation, ReenrollRequest, Request,
    RequestParts, ServerKeyGenRequest,
};
pub use self::responses::{
    EnrollReenrollResponse, GetCasResponse, HealthResponse, Response, ResponseReport,
    ServerKeyGenResponse,
};
