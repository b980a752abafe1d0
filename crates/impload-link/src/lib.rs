//! # impload-link
//!
//! Talks MSP to a flight controller: opens a transport, runs the frame
//! receiver, correlates requests with replies, and moves waypoint missions
//! in both directions.
//!
//! ## Features
//!
//! - **Transports**: serial, TCP, UDP and Bluetooth RFCOMM behind one trait
//! - **Transaction Engine**: one outstanding request at a time, matched by command id
//! - **Handshake**: firmware identification, dialect selection and waypoint capacity
//! - **Mission Transfer**: validated upload and segment-aware download
//! - **Simulated Flight Controller**: [`sim::SimulatedFc`] for tests and demos
//!
//! ```rust,no_run
//! use impload_link::{DeviceDescriptor, Endpoint, Engine, LinkConfig};
//!
//! let device = DeviceDescriptor::Tcp(Endpoint::new("localhost", 5760));
//! let mut engine = Engine::connect(&device, LinkConfig::default(), false)?;
//! let mission = engine.download(false)?;
//! println!("{} items", mission.total_items());
//! # Ok::<(), impload_link::LinkError>(())
//! ```

mod config;
mod device;
mod engine;
mod error;
mod handshake;
mod receiver;
pub mod sim;
mod telemetry;
mod transfer;
pub mod transport;

pub use config::{LinkConfig, NO_VERIFY_ENV};
pub use device::{parse_bdaddr, DeviceDescriptor, Endpoint, TransportKind};
pub use engine::Engine;
pub use error::LinkError;
pub use handshake::FcInfo;
pub use receiver::{spawn_receiver, ReceiverEvent, ReceiverHandle};
pub use telemetry::{describe_metrics, metric_defs, Metric, MetricKind};
pub use transfer::{DownloadReport, UploadReport};
pub use transport::{open, Transport};
