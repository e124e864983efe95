#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod message;
pub mod reporter;
pub mod retry;
pub mod transport;

// --- 주요 타입 re-export ---

pub use config::DeliveryConfig;
pub use error::ReporterError;
pub use message::{Envelope, HostInfo, MachineState, OutboundMessage, ROUTE_REGISTER, ROUTE_STATE};
pub use reporter::{Reporter, ReporterHandle, ReporterStats};
pub use retry::RetryBuffer;
pub use transport::{HttpTransport, Transport};
