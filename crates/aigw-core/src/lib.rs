pub mod accounting;
pub mod auth;
pub mod dispatch;
pub mod error;
pub mod stream;

pub use accounting::{BalanceView, CostAccountant, GenerationDetails, STARTING_ALLOWANCE_USD};
pub use auth::{hash_api_key, AuthContext, AuthError, AuthProvider, AuthSnapshot, MemoryAuth};
pub use dispatch::Gateway;
pub use error::GatewayError;
pub use stream::StreamEmulator;
