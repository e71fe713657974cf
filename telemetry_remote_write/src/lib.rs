//! # Remote Write
//!
//! Pushes observations to a time-series database using the Prometheus remote
//! write protocol.
//!
//! A push runs strictly in order: the observations are assembled into series
//! (identity labels injected, labels sorted), each sample is stamped by the
//! timestamp resolver, the request is protobuf encoded and snappy compressed,
//! and finally POSTed by a [`Transport`].

pub mod client;
pub mod codec;
pub mod error;
pub mod proto;
pub mod series;
pub mod timestamp;
pub mod transport;

pub use client::{Client, PreparedPush, PushSummary, RemoteWriteConfig};
pub use error::{PushError, TransportError, ValidationError};
pub use timestamp::{TimestampResolver, DEFAULT_FRESHNESS_WINDOW_SECS};
pub use transport::{Auth, HttpTransport, Transport};
