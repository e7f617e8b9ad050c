pub mod capabilities;
pub mod dispatcher;
pub mod frame_server;
pub mod http_server;
pub mod loader;
pub mod registry;
pub mod sandbox;

pub use capabilities::{CapabilitySet, MemoryStore, Storage};
pub use dispatcher::Dispatcher;
pub use frame_server::FrameServer;
pub use http_server::HttpServer;
pub use loader::{Loader, LoaderConfig};
pub use registry::{Registry, ServiceDefinition};
