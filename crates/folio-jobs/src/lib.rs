//! folio-jobs - Durable asynchronous job management.
//!
//! Persists processing jobs in SQLite with conditional status transitions,
//! stores uploaded documents in object storage, notifies the out-of-process
//! executor and delivers webhook callbacks on terminal transitions.

pub mod manager;
pub mod notify;
pub mod object_store;
pub mod status;
pub mod store;
pub mod webhook;

pub use manager::{JobManager, SubmitOptions, SubmitReceipt};
pub use notify::{ExecutorNotifier, HttpExecutorNotifier};
pub use object_store::{FsObjectStore, ObjectStore};
pub use status::{JobPriority, JobStatus};
pub use store::{JobStore, ProcessingJob};
pub use webhook::{verify_signature, JobCallback, RetryPolicy, WebhookConfig, WebhookDelivery};
