//! Classification keywords
//!
//! Every keyword is stored in its normalized form (see [`normalize_keyword`]):
//! lower case, trimmed, with `_` and `-` read as spaces.

/// Symbol marking a pure cash movement.
pub const SYMBOL_CASH: &str = "cash";

/// Symbol marking a stand-alone transaction fee.
pub const SYMBOL_FEE: &str = "fee";

/// Asset type of a pure cash movement.
pub const ASSET_TYPE_CASH: &str = "cash";

/// Asset type of a stand-alone expense (booked as a transaction fee).
pub const ASSET_TYPE_EXPENSE: &str = "expense";

/// Asset type of a tax deduction.
pub const ASSET_TYPE_TAX: &str = "tax";

/// Transaction type of a tax withheld at source.
pub const TRANSACTION_TYPE_WITHHOLDING_TAX: &str = "withholding tax";

/// Purchase of a security. Increases quantity.
pub const TRANSACTION_TYPE_BUY: &str = "buy";

/// Disposal of a security. Decreases quantity.
pub const TRANSACTION_TYPE_SELL: &str = "sell";

/// Security moved into the account. Treated as an acquisition.
pub const TRANSACTION_TYPE_TRANSFER_IN: &str = "transfer in";

/// Security moved out of the account. Treated as a disposal.
pub const TRANSACTION_TYPE_TRANSFER_OUT: &str = "transfer out";

/// Asset/transaction types identifying a cash dividend.
pub const DIVIDEND_TYPES: [&str; 2] = ["cash dividends", "dividend"];

/// Asset types that are traded instruments.
pub const TRADE_ASSET_TYPES: [&str; 3] = ["stock", "etf", "equity"];

/// Transaction types that move instrument quantity.
pub const TRADE_TRANSACTION_TYPES: [&str; 4] = [
    TRANSACTION_TYPE_BUY,
    TRANSACTION_TYPE_SELL,
    TRANSACTION_TYPE_TRANSFER_IN,
    TRANSACTION_TYPE_TRANSFER_OUT,
];

/// Brings a free-form type label into the canonical keyword form.
///
/// `" Transfer_In "` and `"TRANSFER-IN"` both become `"transfer in"`.
pub fn normalize_keyword(value: &str) -> String {
    value
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Checks if a normalized type names a cash dividend.
pub fn is_dividend_type(keyword: &str) -> bool {
    DIVIDEND_TYPES.contains(&keyword)
}

/// Checks if a normalized asset type is a traded instrument.
pub fn is_trade_asset_type(keyword: &str) -> bool {
    TRADE_ASSET_TYPES.contains(&keyword)
}

/// Checks if a normalized transaction type moves instrument quantity.
pub fn is_trade_transaction_type(keyword: &str) -> bool {
    TRADE_TRANSACTION_TYPES.contains(&keyword)
}
