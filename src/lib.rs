// src/lib.rs

// Import the top-level `artbridge` module.
pub mod artbridge;

// Re-export the submodules at the crate root so callers write
// `artbridge::broker::RequestBroker` instead of navigating the hierarchy.
pub use artbridge::{
    broker, config, envelope, error, executor, libraries, resolver, tools, transport,
};

// Re-exporting key items for easier external access.
pub use artbridge::broker::RequestBroker;
pub use artbridge::config::BridgeConfig;
pub use artbridge::error::BridgeError;
pub use artbridge::executor::TaskExecutor;
pub use artbridge::resolver::LibraryResolver;
pub use artbridge::transport::PanelTransport;
