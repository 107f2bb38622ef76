pub mod distinct;
pub mod filter;

pub use distinct::{available_filters, AvailableFilters};
pub use filter::{query, QueryResult, QueryStatistics};
