//! The registry of all dispatch entries.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::api::requests::{
    EnrollRequest, GetCasRequest, HealthRequest, ReenrollRequest, Request, RequestParts,
    ServerKeyGenRequest,
};
use crate::api::responses::{
    EnrollReenrollResponse, GetCasResponse, HealthResponse, Response, ServerKeyGenResponse,
};
use crate::commons::error::Error;
use crate::service::{CallContext, EnrollmentService};

use super::endpoint::{
    Endpoint, make_enroll_endpoint, make_get_cas_endpoint, make_health_endpoint,
    make_reenroll_endpoint, make_server_keygen_endpoint,
};


//------------ Endpoints -----------------------------------------------------

/// The entries a transport adapter binds to, one per operation.
///
/// Built once per service. Holds no mutable state, so it can be cloned
/// into any number of tasks.
#[derive(Clone)]
pub struct Endpoints {
    pub health: Endpoint<HealthRequest, HealthResponse>,
    pub get_cas: Endpoint<GetCasRequest, GetCasResponse>,
    pub enroll: Endpoint<EnrollRequest, EnrollReenrollResponse>,
    pub reenroll: Endpoint<ReenrollRequest, EnrollReenrollResponse>,
    pub server_keygen: Endpoint<ServerKeyGenRequest, ServerKeyGenResponse>,
}

impl Endpoints {
    /// Creates the entries for `service`.
    ///
    /// Calls whose context has no deadline get one after `call_timeout`.
    pub fn new<S: EnrollmentService>(service: Arc<S>, call_timeout: Option<Duration>) -> Self {
        Endpoints {
            health: make_health_endpoint(service.clone())
                .bounded(call_timeout)
                .traced(|| tracing::info_span!("Health")),
            get_cas: make_get_cas_endpoint(service.clone())
                .bounded(call_timeout)
                .traced(|| tracing::info_span!("GetCAs")),
            enroll: make_enroll_endpoint(service.clone())
                .bounded(call_timeout)
                .traced(|| tracing::info_span!("Enroll")),
            reenroll: make_reenroll_endpoint(service.clone())
                .bounded(call_timeout)
                .traced(|| tracing::info_span!("Reenroll")),
            server_keygen: make_server_keygen_endpoint(service)
                .bounded(call_timeout)
                .traced(|| tracing::info_span!("Serverkeygen")),
        }
    }

    /// Passes a request to its entry.
    pub async fn dispatch(
        &self,
        ctx: &CallContext,
        request: Request,
    ) -> Result<Response, Error> {
        let ctx = ctx.clone();
        match request {
            Request::Health(req) => self.health.call(ctx, req).await.map(Response::Health),
            Request::GetCas(req) => self.get_cas.call(ctx, req).await.map(Response::GetCas),
            Request::Enroll(req) => self.enroll.call(ctx, req).await.map(Response::Enroll),
            Request::Reenroll(req) => {
                self.reenroll.call(ctx, req).await.map(Response::Reenroll)
            }
            Request::ServerKeyGen(req) => self
                .server_keygen
                .call(ctx, req)
                .await
                .map(Response::ServerKeyGen),
        }
    }

    /// Decodes the parts of a request and dispatches it.
    ///
    /// Requests that cannot be decoded never reach the service.
    pub async fn handle(
        &self,
        ctx: &CallContext,
        parts: RequestParts,
    ) -> Result<Response, Error> {
        let operation = parts.operation;
        let request = Request::decode(parts).inspect_err(|err| {
            debug!("Rejected {} request: {}", operation, err);
        })?;
        self.dispatch(ctx, request).await
    }
}


//------------ Tests ---------------------------------------------------------
