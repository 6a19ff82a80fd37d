//! The software enrollment authority.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use openssl::error::ErrorStack;
use openssl::stack::Stack;
use openssl::x509::store::{X509Store, X509StoreBuilder};
use openssl::x509::verify::X509VerifyFlags;
use openssl::x509::{X509, X509NameRef, X509StoreContext};

use crate::api::cert::{
    Certificate, CertificateSigningRequest, EnrollmentProfile, PrivateKeyMaterial,
    same_name,
};
use crate::commons::error::Error;
use crate::config::{CaMode, Config, ConfigError, ProfileConfig};
use crate::signing::{ca_keys, IssuanceRequest, Signer, Validity};

use super::{CallContext, EnrollmentService, ProfilePolicy};


//------------ Profile -------------------------------------------------------

/// A named combination of issuing CA and policy.
pub struct Profile {
    name: String,
    policy: ProfilePolicy,
    signer: Arc<dyn Signer>,

    /// The CA chain and any extra anchors, for checking credentials.
    trust: X509Store,

    /// The certificates in `trust`, which are never credentials themselves.
    authorities: Vec<Certificate>,
}

impl Profile {
    /// Creates a new profile.
    ///
    /// Presented certificates are accepted when they chain up to any
    /// certificate of the signer's CA chain or to one of `trust_anchors`.
    pub fn new(
        name: impl Into<String>,
        policy: ProfilePolicy,
        signer: Arc<dyn Signer>,
        trust_anchors: &[Certificate],
    ) -> Result<Self, ErrorStack> {
        let authorities: Vec<Certificate> =
            signer.ca_chain().iter().chain(trust_anchors).cloned().collect();
        let mut trust = X509StoreBuilder::new()?;
        trust.set_flags(X509VerifyFlags::PARTIAL_CHAIN)?;
        for cert in &authorities {
            trust.add_cert(cert.x509().to_owned())?;
        }
        Ok(Profile {
            name: name.into(),
            policy,
            signer,
            trust: trust.build(),
            authorities,
        })
    }

    /// Loads or creates the CA for a configured profile.
    pub fn from_config(
        config: &Config,
        profile: &ProfileConfig,
    ) -> Result<Self, ConfigError> {
        let signer = match (profile.ca_mode, &profile.ca_key, &profile.ca_cert) {
            (CaMode::Generate, _, _) => {
                ca_keys::create_ca_if_needed(&config.data_dir, &profile.name)?
            }
            (CaMode::Existing, Some(key), Some(cert)) => {
                ca_keys::load_ca(key, cert, &profile.ca_chain)?
            }
            (CaMode::Existing, _, _) => {
                return Err(ConfigError::Other(format!(
                    "profile '{}': ca_mode \"existing\" requires ca_cert and ca_key",
                    profile.name
                )));
            }
        };
        let anchors = ca_keys::load_certificates(&profile.trust_anchors)?;
        Profile::new(
            profile.name.clone(),
            ProfilePolicy::from(profile),
            Arc::new(signer),
            &anchors,
        )
        .map_err(|e| ConfigError::Other(format!("profile '{}': {}", profile.name, e)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signer(&self) -> &dyn Signer {
        self.signer.as_ref()
    }

    /// Returns the trusted CA certificate named like `name`, if any.
    fn authority_named(&self, name: &X509NameRef) -> Option<&Certificate> {
        self.authorities
            .iter()
            .find(|ca| same_name(ca.subject(), name))
    }

    /// Refuses requests for a subject that names one of our CAs.
    ///
    /// Such a certificate would be taken for its issuer when chains are
    /// built by name.
    fn check_requested_subject(&self, csr: &CertificateSigningRequest) -> Result<(), Error> {
        match self.authority_named(csr.subject()) {
            Some(ca) => Err(Error::invalid_csr(format!(
                "subject '{}' is reserved for a CA of profile '{}'",
                ca.subject_text(),
                self.name
            ))),
            None => Ok(()),
        }
    }

    /// Checks a presented certificate.
    ///
    /// Only end-entity certificates issued under the profile are accepted,
    /// never the CA certificates themselves. Expiry is reported as such,
    /// any other failure as an invalid credential.
    pub fn validate_credential(&self, crt: &Certificate) -> Result<(), Error> {
        if crt.is_self_issued() || self.authority_named(crt.subject()).is_some() {
            return Err(Error::invalid_credential(format!(
                "certificate '{}' is a CA certificate",
                crt.subject_text()
            )));
        }

        let unreadable =
            |e: ErrorStack| Error::invalid_credential(format!("cannot check validity: {}", e));
        if crt.is_expired().map_err(unreadable)? {
            return Err(Error::AuthenticationExpired(format!(
                "certificate '{}' expired at {}",
                crt.subject_text(),
                crt.not_after()
            )));
        }
        if crt.is_not_yet_valid().map_err(unreadable)? {
            return Err(Error::invalid_credential(format!(
                "certificate '{}' not valid before {}",
                crt.subject_text(),
                crt.not_before()
            )));
        }

        let untrusted = Stack::<X509>::new().map_err(unreadable)?;
        let mut store_ctx = X509StoreContext::new().map_err(unreadable)?;
        let failure = store_ctx
            .init(&self.trust, crt.x509(), &untrusted, |c| {
                Ok(if c.verify_cert()? { None } else { Some(c.error().to_string()) })
            })
            .map_err(unreadable)?;
        match failure {
            None => Ok(()),
            Some(reason) => Err(Error::invalid_credential(format!(
                "certificate '{}' does not verify: {}",
                crt.subject_text(),
                reason
            ))),
        }
    }

    fn validity(&self) -> Validity {
        Validity::days_from_now(self.policy.validity_days)
    }

    /// Whether the issuing CA is currently valid.
    fn is_current(&self) -> bool {
        self.signer.issuer().is_current()
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("issuer", &self.signer.issuer().subject_text())
            .field("policy", &self.policy)
            .finish()
    }
}


//------------ CertAuthority -------------------------------------------------

/// An enrollment authority over a set of profiles.
///
/// Profiles are fixed once the authority is built and there is no other
/// shared state, so calls never wait for each other here.
#[derive(Debug, Default)]
pub struct CertAuthority {
    profiles: HashMap<String, Arc<Profile>>,
    default_profile: String,
}

impl CertAuthority {
    /// Creates an authority without profiles.
    ///
    /// Requests that do not name a profile go to `default_profile`.
    pub fn new(default_profile: impl Into<String>) -> Self {
        CertAuthority {
            profiles: HashMap::new(),
            default_profile: default_profile.into(),
        }
    }

    /// Adds a profile, replacing any existing one with the same name.
    pub fn add_profile(&mut self, profile: Profile) {
        debug!("Adding enrollment profile '{}'", profile.name);
        self.profiles.insert(profile.name.clone(), Arc::new(profile));
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut authority = CertAuthority::new(config.default_profile.clone());
        for profile in &config.profiles {
            authority.add_profile(Profile::from_config(config, profile)?);
        }
        info!(
            "Enrollment authority ready with {} profile(s)",
            authority.profiles.len()
        );
        Ok(authority)
    }

    /// Returns the profile a request is processed under.
    pub fn resolve(&self, aps: &EnrollmentProfile) -> Result<Arc<Profile>, Error> {
        let name = if aps.is_default() {
            self.default_profile.as_str()
        } else {
            aps.as_str()
        };
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| Error::profile_not_found(name))
    }

    /// Issues a certificate off the async runtime.
    async fn issue(
        ctx: &CallContext,
        profile: &Arc<Profile>,
        request: IssuanceRequest,
    ) -> Result<Certificate, Error> {
        let worker = profile.clone();
        let cert = blocking(ctx, move || {
            worker.signer.issue(&request).map_err(Error::issuance)
        })
        .await?;
        log_issued(profile, &cert);
        Ok(cert)
    }
}

impl EnrollmentService for CertAuthority {
    async fn health(&self, ctx: &CallContext) -> bool {
        if ctx.check().is_err() || self.profiles.is_empty() {
            return false;
        }
        let mut healthy = true;
        for profile in self.profiles.values() {
            if !profile.is_current() {
                warn!(
                    "Issuing CA of profile '{}' is not currently valid",
                    profile.name
                );
                healthy = false;
            }
        }
        healthy
    }

    async fn ca_certs(
        &self,
        ctx: &CallContext,
        aps: &EnrollmentProfile,
        _crt: Option<&Certificate>,
    ) -> Result<Vec<Certificate>, Error> {
        ctx.check()?;
        let profile = self.resolve(aps)?;
        Ok(profile.signer.ca_chain().to_vec())
    }

    async fn enroll(
        &self,
        ctx: &CallContext,
        csr: &CertificateSigningRequest,
        aps: &EnrollmentProfile,
        crt: Option<&Certificate>,
    ) -> Result<Certificate, Error> {
        ctx.check()?;
        let profile = self.resolve(aps)?;

        if profile.policy.require_credential {
            let crt = crt.ok_or_else(|| {
                Error::denied(format!(
                    "profile '{}' requires an authenticating certificate",
                    profile.name
                ))
            })?;
            profile.validate_credential(crt).map_err(Error::denied)?;
        }

        let policy = &profile.policy.csr;
        policy.check_pop(csr)?;
        policy.check_subject(csr)?;
        profile.check_requested_subject(csr)?;
        policy.check_key(csr)?;

        let request = IssuanceRequest::for_csr(csr, profile.validity())
            .map_err(Error::invalid_csr)?;
        Self::issue(ctx, &profile, request).await
    }

    async fn reenroll(
        &self,
        ctx: &CallContext,
        crt: &Certificate,
        csr: &CertificateSigningRequest,
        aps: &EnrollmentProfile,
    ) -> Result<Certificate, Error> {
        ctx.check()?;
        let profile = self.resolve(aps)?;

        // The credential takes the place of the proof-of-possession.
        profile.validate_credential(crt)?;

        if profile.policy.subject_continuity && !same_name(crt.subject(), csr.subject()) {
            return Err(Error::SubjectMismatch {
                expected: crt.subject_text(),
                found: csr.subject_text(),
            });
        }

        let policy = &profile.policy.csr;
        policy.check_subject(csr)?;
        profile.check_requested_subject(csr)?;
        policy.check_key(csr)?;

        let request = IssuanceRequest::for_csr(csr, profile.validity())
            .map_err(Error::invalid_csr)?;
        Self::issue(ctx, &profile, request).await
    }

    async fn server_keygen(
        &self,
        ctx: &CallContext,
        csr: &CertificateSigningRequest,
        aps: &EnrollmentProfile,
    ) -> Result<(Certificate, PrivateKeyMaterial), Error> {
        ctx.check()?;
        let profile = self.resolve(aps)?;

        if !profile.policy.allow_server_keygen {
            return Err(Error::denied(format!(
                "profile '{}' does not allow server-side key generation",
                profile.name
            )));
        }
        profile.policy.csr.check_subject(csr)?;
        profile.check_requested_subject(csr)?;

        let subject = csr.subject().to_der().map_err(Error::invalid_csr)?;
        let validity = profile.validity();
        let worker = profile.clone();
        let (cert, key) = blocking(ctx, move || {
            let signer = &worker.signer;
            let key = signer
                .generate_key(worker.policy.server_keygen_algorithm)
                .map_err(Error::keygen)?;
            let request =
                IssuanceRequest::for_key(subject, &key, validity).map_err(Error::keygen)?;
            let cert = signer.issue(&request).map_err(Error::issuance)?;
            let key = PrivateKeyMaterial::from_pkey(&key).map_err(Error::keygen)?;
            Ok((cert, key))
        })
        .await?;
        log_issued(&profile, &cert);
        Ok((cert, key))
    }
}


//------------ Helpers -------------------------------------------------------

/// Runs signing work on the blocking pool, for as long as `ctx` allows.
///
/// When the context ends first, the work still completes in the background
/// but its result is dropped.
async fn blocking<F, T>(ctx: &CallContext, op: F) -> Result<T, Error>
where
    F: FnOnce() -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    ctx.run(async move {
        tokio::task::spawn_blocking(op)
            .await
            .map_err(|e| Error::issuance(format!("signing task failed: {}", e)))?
    })
    .await
}

fn log_issued(profile: &Profile, cert: &Certificate) {
    info!(
        "Issued certificate {} for '{}' under profile '{}'",
        cert.serial_hex().unwrap_or_default(),
        cert.subject_text(),
        profile.name
    );
}


//------------ Tests ---------------------------------------------------------
