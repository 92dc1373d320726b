mod bluez_transport;
pub mod codec;
pub mod scanner;
pub mod transport;

pub use bluez_transport::BluezTransport;
pub use scanner::{ScanOutcome, Scanner};
pub use transport::{AttemptId, BleTransport, DeviceHandle, LinkEvent, RemoteChar};
