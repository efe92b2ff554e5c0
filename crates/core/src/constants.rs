use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Reporting currency used when none is configured
pub const DEFAULT_REPORTING_CURRENCY: &str = "EUR";

/// Share quantities at or below this magnitude are treated as dust
pub const SHARE_EPSILON: Decimal = dec!(0.00001);

/// Money amounts below this magnitude are treated as dust
pub const CURRENCY_EPSILON: Decimal = dec!(0.001);

/// Below this quantity a dividend row carries its total amount in the price field
pub const DIVIDEND_QUANTITY_THRESHOLD: Decimal = dec!(0.0001);

/// A holding period strictly longer than this many days is long-term
pub const LONG_TERM_HOLDING_DAYS: i64 = 365;

/// Separates the instrument symbol from its exchange code (e.g. `VOD:LSE`)
pub const EXCHANGE_SEPARATOR: char = ':';
