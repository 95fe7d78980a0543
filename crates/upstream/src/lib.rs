//! Client for the upstream image-generation API.
//!
//! - [`payload`] -- turns a face reference, a target and an output size into
//!   the JSON body the upstream expects.
//! - [`response`] -- locates the output URL in the upstream's reply.
//! - [`client`] -- the HTTP client that sends one request per call.

pub mod client;
pub mod payload;
pub mod response;

pub use client::{UpstreamClient, UpstreamConfig, UpstreamError};
pub use payload::{FaceSwapRequest, ImageInput};
