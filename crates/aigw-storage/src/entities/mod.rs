pub mod pricing_rates;
pub mod usage_records;
pub mod users;

pub use pricing_rates::Entity as PricingRates;
pub use usage_records::Entity as UsageRecords;
pub use users::Entity as Users;
