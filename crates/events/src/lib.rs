//! Veritax webhook dispatch and delivery infrastructure.
//!
//! This crate provides the event fan-out half of the governance layer:
//!
//! - [`WebhookDispatcher`] — looks up active subscriptions, signs the
//!   canonical payload per subscription, creates delivery records, and
//!   enqueues attempts. Business handlers call
//!   [`dispatch`](WebhookDispatcher::dispatch) explicitly whenever a
//!   domain event occurs.
//! - [`DeliveryWorker`] — executes one delivery attempt, classifies the
//!   outcome, and schedules retries on the fixed backoff schedule.
//! - [`DeliveryQueue`] — in-process queue decoupling dispatch from the
//!   network I/O of the attempts themselves.
//! - [`store`] — the persistence seam ([`store::WebhookStore`]) with
//!   Postgres and in-memory implementations.
//! - [`transport`] — the HTTP seam ([`transport::WebhookTransport`])
//!   with the production reqwest client.
//! - [`AlertMailer`] — operator email alerts for chain verification
//!   failures.

pub mod alert;
pub mod dispatcher;
pub mod queue;
pub mod store;
pub mod transport;
pub mod worker;

pub use alert::{AlertMailer, EmailConfig};
pub use dispatcher::WebhookDispatcher;
pub use queue::{DeliveryQueue, QueuedDelivery};
pub use store::{InMemoryWebhookStore, PgWebhookStore};
pub use transport::HttpTransport;
pub use worker::{AttemptOutcome, DeliveryWorker};
