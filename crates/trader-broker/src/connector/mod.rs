pub mod robinhood;
pub mod schwab;
