//! Backend implementations.

pub mod functions;
pub mod gateway;

// Re-export for convenience
pub use functions::FunctionsClient;
pub use gateway::GatewayClient;
