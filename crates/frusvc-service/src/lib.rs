//! `frusvc-service` – the FRU inventory service.
//!
//! Wraps one process-wide [`ObjectTree`][frusvc_tree::ObjectTree] and exposes
//! it to external callers.
//!
//! # Modules
//!
//! - [`service`] – [`FruService`][service::FruService]: owns the tree behind a
//!   tree-wide reader/writer lock and hands out owned snapshots only.
//! - [`dispatcher`] – [`Dispatcher`][dispatcher::Dispatcher]: decodes the
//!   `addFRU` / `resetTree` / `removeFRU` / `getObject` calls, routes them to
//!   the service, and encodes the acknowledgement or fault.
//! - [`server`] – [`FruServer`][server::FruServer]: WebSocket transport, one
//!   JSON call per text frame, one reply per call.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with an optional OTLP span exporter.

pub mod dispatcher;
pub mod server;
pub mod service;
pub mod telemetry;

pub use dispatcher::{Call, Dispatcher, Reply, Request, Response};
pub use server::{BoundServer, DEFAULT_PORT, FruServer, ServerError};
pub use service::FruService;
pub use telemetry::{TracerProviderGuard, init_tracing};
