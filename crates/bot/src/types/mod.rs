pub mod fixed_point;
pub mod funding;
pub mod market_data;
pub mod rate;

pub use fixed_point::Scaled;
pub use funding::{
    ApplyStep, AutoFundingConfig, AutoFundingRequest, AutoFundingStatus, FundingOffer,
    ReferenceRate, TargetConfig,
};
pub use market_data::{Candle, CandleQuery, SortOrder};
pub use rate::RateDisplay;
