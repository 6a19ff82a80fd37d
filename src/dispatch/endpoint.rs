//! A single dispatch entry and the middleware wrapping it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tracing::{Instrument, Span};

use crate::api::requests::{
    EnrollRequest, GetCasRequest, HealthRequest, ReenrollRequest, ServerKeyGenRequest,
};
use crate::api::responses::{
    EnrollReenrollResponse, GetCasResponse, HealthResponse, ServerKeyGenResponse,
};
use crate::commons::error::Error;
use crate::service::{CallContext, EnrollmentService};


//------------ Endpoint ------------------------------------------------------

type Handler<Req, Resp> =
    dyn Fn(CallContext, Req) -> BoxFuture<'static, Result<Resp, Error>> + Send + Sync;

/// An asynchronous function from a typed request to a typed response.
///
/// Endpoints are cheap to clone and can be called concurrently. They are
/// composed by wrapping, see [`Endpoint::bounded`] and [`Endpoint::traced`].
pub struct Endpoint<Req, Resp> {
    handler: Arc<Handler<Req, Resp>>,
}

impl<Req, Resp> Clone for Endpoint<Req, Resp> {
    fn clone(&self) -> Self {
        Endpoint {
            handler: self.handler.clone(),
        }
    }
}

impl<Req: Send + 'static, Resp: Send + 'static> Endpoint<Req, Resp> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, Error>> + Send + 'static,
    {
        Endpoint {
            handler: Arc::new(move |ctx, req| f(ctx, req).boxed()),
        }
    }

    pub fn call(
        &self,
        ctx: CallContext,
        req: Req,
    ) -> BoxFuture<'static, Result<Resp, Error>> {
        (self.handler)(ctx, req)
    }

    /// Runs every call under a context bounded by `timeout`.
    pub fn bounded(self, timeout: Option<Duration>) -> Self {
        let inner = self.handler;
        Endpoint::new(move |ctx: CallContext, req| inner(ctx.bounded(timeout), req))
    }

    /// Runs every call inside a new span created by `make_span`.
    ///
    /// The span lives exactly as long as the call's future, so it is
    /// closed once whether the call succeeds, fails, or is dropped.
    pub fn traced<S>(self, make_span: S) -> Self
    where
        S: Fn() -> Span + Send + Sync + 'static,
    {
        let inner = self.handler;
        Endpoint::new(move |ctx, req| {
            let fut = inner(ctx, req);
            async move {
                let res = fut.await;
                if let Err(err) = &res {
                    tracing::info!(kind = %err.kind(), "call failed: {}", err);
                }
                res
            }
            .instrument(make_span())
        })
    }
}


//------------ Endpoint constructors -----------------------------------------

pub fn make_health_endpoint<S: EnrollmentService>(
    service: Arc<S>,
) -> Endpoint<HealthRequest, HealthResponse> {
    Endpoint::new(move |ctx: CallContext, _req: HealthRequest| {
        let service = service.clone();
        async move {
            let healthy = service.health(&ctx).await;
            Ok(HealthResponse { healthy })
        }
    })
}

pub fn make_get_cas_endpoint<S: EnrollmentService>(
    service: Arc<S>,
) -> Endpoint<GetCasRequest, GetCasResponse> {
    Endpoint::new(move |ctx: CallContext, req: GetCasRequest| {
        let service = service.clone();
        async move {
            let certs = service.ca_certs(&ctx, &req.aps, req.crt.as_ref()).await?;
            Ok(GetCasResponse { certs })
        }
    })
}

pub fn make_enroll_endpoint<S: EnrollmentService>(
    service: Arc<S>,
) -> Endpoint<EnrollRequest, EnrollReenrollResponse> {
    Endpoint::new(move |ctx: CallContext, req: EnrollRequest| {
        let service = service.clone();
        async move {
            let cert = service
                .enroll(&ctx, &req.csr, &req.aps, req.crt.as_ref())
                .await?;
            Ok(EnrollReenrollResponse { cert })
        }
    })
}

pub fn make_reenroll_endpoint<S: EnrollmentService>(
    service: Arc<S>,
) -> Endpoint<ReenrollRequest, EnrollReenrollResponse> {
    Endpoint::new(move |ctx: CallContext, req: ReenrollRequest| {
        let service = service.clone();
        async move {
            let cert = service.reenroll(&ctx, &req.crt, &req.csr, &req.aps).await?;
            Ok(EnrollReenrollResponse { cert })
        }
    })
}

pub fn make_server_keygen_endpoint<S: EnrollmentService>(
    service: Arc<S>,
) -> Endpoint<ServerKeyGenRequest, ServerKeyGenResponse> {
    Endpoint::new(move |ctx: CallContext, req: ServerKeyGenRequest| {
        let service = service.clone();
        async move {
            let (cert, key) = service.server_keygen(&ctx, &req.csr, &req.aps).await?;
            Ok(ServerKeyGenResponse { cert, key })
        }
    })
}
