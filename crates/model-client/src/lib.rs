//! The Remote Model Client: a one-shot request/response gateway to
//! the upstream language-model HTTP service, a retry-with-backoff
//! wrapper, a shared keep-alive connection pool, and the image
//! generation operation's response-shape decoder.

pub mod gateway;
pub mod image;

pub use gateway::{call_model_with_retry, CallOptions, CallOutcome, ModelGateway, RemoteModelClient};
pub use image::{extract_image, ImageOutput};
