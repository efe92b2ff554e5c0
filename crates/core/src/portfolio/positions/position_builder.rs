use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::positions_model::Position;
use crate::activities::{NormalizedTrade, TradeDirection};
use crate::fx::CurrencyNormalizer;

/// Positions keyed by symbol after a full trade replay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionBook {
    positions: BTreeMap<String, Position>,
}

impl PositionBook {
    pub fn get(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Every position ever opened, including emptied ones.
    pub fn all(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Open positions, ordered by symbol.
    pub fn open_positions(&self) -> Vec<Position> {
        self.positions
            .values()
            .filter(|p| p.is_open())
            .cloned()
            .collect()
    }
}

/// Replays trades into weighted-average-cost positions.
pub struct PositionBuilder;

impl PositionBuilder {
    /// Builds positions from a trade stream.
    ///
    /// Trades are replayed in ascending date order; trades sharing a date keep
    /// their input order. A buy in another currency than the position's is
    /// costed at its price converted into the position currency.
    pub fn build(trades: &[NormalizedTrade], normalizer: &CurrencyNormalizer) -> PositionBook {
        let mut ordered: Vec<&NormalizedTrade> = trades.iter().collect();
        ordered.sort_by_key(|t| t.date);

        let mut positions: BTreeMap<String, Position> = BTreeMap::new();
        for trade in ordered {
            match trade.direction {
                TradeDirection::Buy => {
                    let position = positions
                        .entry(trade.symbol.clone())
                        .or_insert_with(|| Position::new(&trade.symbol, &trade.currency, trade.date));
                    let unit_price = if position.currency.eq_ignore_ascii_case(&trade.currency) {
                        trade.unit_price
                    } else {
                        let converted =
                            normalizer.convert(trade.unit_price, &trade.currency, &position.currency);
                        debug!(
                            "Buy of {} at {} {} booked at {} {}",
                            trade.symbol, trade.unit_price, trade.currency, converted, position.currency
                        );
                        converted
                    };
                    position.apply_buy(trade.share_count, unit_price);
                }
                TradeDirection::Sell => match positions.get_mut(&trade.symbol) {
                    Some(position) => {
                        position.apply_sell(trade.share_count);
                    }
                    None => warn!(
                        "Sell of {} {} on {} has no prior acquisition. Ignored for positions.",
                        trade.share_count,
                        trade.symbol,
                        trade.date.format("%Y-%m-%d")
                    ),
                },
            }
        }

        debug!(
            "Built {} positions ({} open)",
            positions.len(),
            positions.values().filter(|p| p.is_open()).count()
        );
        PositionBook { positions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fx::RateTable;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn normalizer() -> CurrencyNormalizer {
        CurrencyNormalizer::new(
            RateTable::new("EUR")
                .with_rate("USD", dec!(0.5))
                .with_rate("GBP", dec!(1)),
        )
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn trade(symbol: &str, direction: TradeDirection, qty: Decimal, price: Decimal, d: u32) -> NormalizedTrade {
        NormalizedTrade {
            symbol: symbol.to_string(),
            full_symbol: symbol.to_string(),
            exchange: None,
            direction,
            share_count: qty,
            unit_price: price,
            currency: "USD".to_string(),
            date: day(d),
        }
    }

    #[test]
    fn test_build_replays_in_date_order() {
        // Sell is listed first but happens last.
        let trades = vec![
            trade("AAPL", TradeDirection::Sell, dec!(15), dec!(150), 3),
            trade("AAPL", TradeDirection::Buy, dec!(10), dec!(100), 1),
            trade("AAPL", TradeDirection::Buy, dec!(10), dec!(120), 2),
        ];

        let book = PositionBuilder::build(&trades, &normalizer());
        let aapl = book.get("AAPL").unwrap();

        assert_eq!(aapl.share_count, dec!(5));
        assert_eq!(aapl.average_cost, dec!(110));
        assert_eq!(aapl.total_cost, dec!(550));
        assert_eq!(aapl.first_acquisition_date, day(1));
    }

    #[test]
    fn test_closed_positions_are_not_open() {
        let trades = vec![
            trade("AAPL", TradeDirection::Buy, dec!(10), dec!(100), 1),
            trade("AAPL", TradeDirection::Sell, dec!(10), dec!(130), 2),
            trade("MSFT", TradeDirection::Buy, dec!(2), dec!(300), 2),
        ];

        let book = PositionBuilder::build(&trades, &normalizer());
        let open = book.open_positions();

        assert_eq!(open.len(), 1);
        assert_eq!(open[0].symbol, "MSFT");
        assert_eq!(book.all().count(), 2);
    }

    #[test]
    fn test_sell_without_position_is_ignored() {
        let trades = vec![trade("TSLA", TradeDirection::Sell, dec!(1), dec!(200), 1)];

        let book = PositionBuilder::build(&trades, &normalizer());
        assert!(book.get("TSLA").is_none());
    }

    #[test]
    fn test_rebuy_after_close_keeps_first_date() {
        let trades = vec![
            trade("AAPL", TradeDirection::Buy, dec!(1), dec!(100), 1),
            trade("AAPL", TradeDirection::Sell, dec!(1), dec!(100), 2),
            trade("AAPL", TradeDirection::Buy, dec!(2), dec!(90), 3),
        ];

        let book = PositionBuilder::build(&trades, &normalizer());
        let aapl = book.get("AAPL").unwrap();
        assert_eq!(aapl.share_count, dec!(2));
        assert_eq!(aapl.average_cost, dec!(90));
        assert_eq!(aapl.first_acquisition_date, day(1));
    }

    #[test]
    fn test_buy_in_other_currency_is_converted_into_position_currency() {
        let mut gbp_buy = trade("VOD", TradeDirection::Buy, dec!(10), dec!(100), 2);
        gbp_buy.currency = "GBP".to_string();
        let trades = vec![trade("VOD", TradeDirection::Buy, dec!(10), dec!(100), 1), gbp_buy];

        let book = PositionBuilder::build(&trades, &normalizer());
        let vod = book.get("VOD").unwrap();

        assert_eq!(vod.currency, "USD");
        assert_eq!(vod.share_count, dec!(20));
        assert_eq!(vod.total_cost, dec!(3000));
        assert_eq!(vod.average_cost, dec!(150));
    }
}
