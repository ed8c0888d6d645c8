//! Boundary to the real-time messaging transport

pub mod logger;
pub mod mock;
pub mod traits;

pub use logger::{LogLevel, SilentLogger, TracingLogger, TransportLogger};
pub use mock::{MockTransportFactory, MockTransportHandle};
pub use traits::{EventSink, Transport, TransportEvent, TransportFactory, TransportParams};
