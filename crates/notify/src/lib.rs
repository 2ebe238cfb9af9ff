//! Email notification integration.
//!
//! The registry hands every freshly issued certificate to this crate on a
//! best-effort basis: a bounded queue feeds a background worker, and the
//! worker drives a [`NotificationSink`]. The production sink is the Brevo
//! transactional-email API (one message to the intake staff, one optional
//! confirmation to the patient); tests swap in the noop or recording sinks.
//!
//! A slow or failing provider can never stall or fail a submission: queue
//! overflow and dispatch errors are logged and dropped.

pub mod brevo;
pub mod sink;
pub mod worker;

pub use brevo::BrevoMailer;
pub use sink::{NoopSink, NotificationSink, NotifyError, RecordingSink};
pub use worker::{spawn, NotifyHandle};
