//! The _certenroll_ library crate.
//!
//! A certificate enrollment authority: clients obtain certificates by
//! enrollment, renew them by re-enrollment, or have the authority generate
//! their keys. Transports turn wire requests into
//! [`RequestParts`][api::RequestParts] and hand them to the
//! [`Endpoints`][dispatch::Endpoints] built over an
//! [`EnrollmentService`][service::EnrollmentService].

pub mod api;
pub mod cli;
pub mod commons;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod service;
pub mod signing;
