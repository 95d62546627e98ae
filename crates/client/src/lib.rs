//! Client side of the Asha offline cache.
//!
//! This crate provides the request/response model, the HTTP network, and the
//! cache manager that runs the install/activate/fetch lifecycle.

pub mod fetch;
pub mod worker;

pub use fetch::{
    FetchConfig, FetchRequest, FetchResponse, HttpNetwork, Method, Network, RequestMode, ResponseType, StatusCode,
    UrlError, resolve,
};

pub use worker::{
    ActivateOutcome, BypassReason, CacheManager, ClientId, ClientInfo, Clients, Handled, InstallOutcome,
    ResponseSource, Scope, WorkerConfig,
};
