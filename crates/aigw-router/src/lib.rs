pub mod proxy;

pub use proxy::{build_router, GatewayState};
