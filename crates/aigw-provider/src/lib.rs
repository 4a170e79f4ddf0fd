pub mod adapter;
pub mod anthropic;
pub mod client;
pub mod config;
pub mod openai;
pub mod registry;
pub mod vercel;

pub use adapter::{
    AdapterFailure, AdapterResult, ProviderAdapter, TransportErrorKind,
};
pub use client::{UpstreamClient, UpstreamClientConfig, UpstreamHttpRequest, UpstreamHttpResponse};
pub use config::ProviderConfig;
pub use registry::{ProviderRegistry, RouteTable, RouterConfig};
