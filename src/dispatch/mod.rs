//! The dispatch layer between transports and the enrollment service.
//!
//! Every operation gets an [`Endpoint`] that calls the service exactly
//! once, bounds the call's context, and runs it inside a span named after
//! the operation. [`Endpoints`] holds the five of them.

mod endpoint;
mod endpoints;

pub use self::endpoint::{
    Endpoint, make_enroll_endpoint, make_get_cas_endpoint, make_health_endpoint,
    make_reenroll_endpoint, make_server_keygen_endpoint,
};
pub use self::endpoints::Endpoints;
