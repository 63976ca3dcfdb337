//! HTTP capability for OpenPortal.
//!
//! Handlers never talk to `reqwest` directly; they go through the
//! [`HttpClient`] trait so the engine can run against a real backend
//! ([`ReqwestClient`]) or a scripted one ([`MockHttpClient`]).

mod client;
mod error;
mod mock;
mod types;

pub use client::{HttpClient, ReqwestClient, resolve_url};
pub use error::HttpError;
pub use mock::{MockHttpClient, MockResponse};
pub use types::{HttpRequest, HttpResponse, Method, parse_body};
