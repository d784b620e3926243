//! Outbound notification infrastructure.
//!
//! - [`CompletionPayload`] -- the JSON body delivered when a job
//!   finishes.
//! - [`WebhookNotifier`] -- signs and delivers the payload with
//!   exponential-backoff retry, recording delivery status through a
//!   [`DeliveryStatusSink`].
//! - [`WebhookTransport`] -- the HTTP capability boundary, with a
//!   `reqwest`-backed implementation and mockable in tests.

pub mod webhook;

pub use webhook::{
    CompletionPayload, DeliveryStatusSink, HttpTransport, WebhookError, WebhookNotifier,
    WebhookTransport,
};
