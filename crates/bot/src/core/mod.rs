pub mod controller;
pub mod period_selector;
pub mod range_aggregator;
pub mod rank_resolver;
