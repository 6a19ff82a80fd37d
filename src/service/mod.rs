//! The enrollment service: the operations behind the dispatch layer.
//!
//! [`EnrollmentService`] is the contract the dispatch layer is written
//! against. [`CertAuthority`] implements it on top of one or more
//! [`Signer`][crate::signing::Signer]s, tests may substitute their own.

pub mod authority;
pub mod context;
pub mod policy;

pub use self::authority::{CertAuthority, Profile};
pub use self::context::CallContext;
pub use self::policy::{CsrPolicy, ProfilePolicy};

use std::future::Future;

use crate::api::cert::{
    Certificate, CertificateSigningRequest, EnrollmentProfile, PrivateKeyMaterial,
};
use crate::commons::error::Error;


//------------ EnrollmentService ---------------------------------------------

/// The operations of a certification authority serving enrollments.
///
/// Every operation takes the [`CallContext`] of the call and must give up
/// with [`Error::Cancelled`] or [`Error::DeadlineExceeded`] once the
/// context ends. Implementations are shared between any number of
/// concurrent calls.
pub trait EnrollmentService: Send + Sync + 'static {
    /// Returns whether the service can currently issue certificates.
    ///
    /// Never fails. Anything that keeps the service from determining its
    /// state results in `false`.
    fn health(&self, ctx: &CallContext) -> impl Future<Output = bool> + Send;

    /// Returns the CA certificates of a profile, trust anchor first.
    fn ca_certs(
        &self,
        ctx: &CallContext,
        aps: &EnrollmentProfile,
        crt: Option<&Certificate>,
    ) -> impl Future<Output = Result<Vec<Certificate>, Error>> + Send;

    /// Issues a certificate for a new client.
    fn enroll(
        &self,
        ctx: &CallContext,
        csr: &CertificateSigningRequest,
        aps: &EnrollmentProfile,
        crt: Option<&Certificate>,
    ) -> impl Future<Output = Result<Certificate, Error>> + Send;

    /// Reissues a certificate to a client authenticated by `crt`.
    fn reenroll(
        &self,
        ctx: &CallContext,
        crt: &Certificate,
        csr: &CertificateSigningRequest,
        aps: &EnrollmentProfile,
    ) -> impl Future<Output = Result<Certificate, Error>> + Send;

    /// Generates a key pair and issues a certificate for it.
    ///
    /// The private key is returned to the caller only.
    fn server_keygen(
        &self,
        ctx: &CallContext,
        csr: &CertificateSigningRequest,
        aps: &EnrollmentProfile,
    ) -> impl Future<Output = Result<(Certificate, PrivateKeyMaterial), Error>> + Send;
}
