pub mod http_transport;
pub mod memory_transport;
pub mod transport;

pub use http_transport::HttpTransport;
pub use memory_transport::MemoryTransport;
pub use transport::{Request, RequestMethod, Response, Transport};
