//! # Transport
//!
//! HTTP batch delivery with a three-way outcome classification.
//!
//! One call posts one batch body (`{"datas": <json array>}`) and owns the
//! primary/fallback policy for it: pre-flight connectivity check, a bounded
//! retry against the same URL for the known stale-connection symptom, and at
//! most one attempt against the fallback endpoint.

mod http;

pub use http::HttpTransport;
