//! Request construction, HTTP fetching and failure classification.

pub mod client;
pub mod failure;
pub mod request;

pub use client::{FetchedPage, HttpFetcher, PageFetcher};
pub use failure::{FailureKind, FetchFailure};
pub use request::{FetchRequest, ProxyPool, RequestBuilder, RequestContext};
