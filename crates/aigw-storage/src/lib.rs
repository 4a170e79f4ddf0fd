pub mod entities;
pub mod ledger;

pub use ledger::{
    GatewayStorage, Ledger, PricingSeed, RequestKind, StorageError, StorageResult,
    SuccessCostRow, UsageAttempt, UsageStatus,
};
