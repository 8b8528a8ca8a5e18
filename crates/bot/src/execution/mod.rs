pub mod bitfinex_client;
pub mod exchange;
pub mod telegram;
