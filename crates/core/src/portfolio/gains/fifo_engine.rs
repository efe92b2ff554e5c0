use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, VecDeque};

use super::gains_model::{
    holding_days, round_money, GainsReport, GainsTotals, HoldingTerm, SaleRecord, SellMatch,
    SymbolGains, SymbolPricing, TaxLot, UnmatchedSell,
};
use crate::activities::{multiply_tolerant, NormalizedTrade, TradeDirection};
use crate::constants::SHARE_EPSILON;
use crate::fx::CurrencyNormalizer;

/// Everything one symbol's replay produced.
#[derive(Debug, Clone)]
pub struct SymbolReplay {
    pub gains: SymbolGains,
    pub sales: Vec<SaleRecord>,
    pub matches: Vec<SellMatch>,
    pub unmatched: Vec<UnmatchedSell>,
}

/// Realized amounts of one sale, in the reporting currency.
struct SaleOutcome {
    matched: Decimal,
    proceeds: Decimal,
    cost_basis: Decimal,
    oldest_lot: Option<DateTime<Utc>>,
}

/// Replays trades per symbol against a FIFO tax-lot queue.
///
/// Each call builds fresh lot queues from the borrowed trades, so concurrent
/// calls never observe each other's lot state.
pub struct FifoGainsEngine<'a> {
    normalizer: &'a CurrencyNormalizer,
    as_of: DateTime<Utc>,
}

impl<'a> FifoGainsEngine<'a> {
    pub fn new(normalizer: &'a CurrencyNormalizer, as_of: DateTime<Utc>) -> Self {
        FifoGainsEngine { normalizer, as_of }
    }

    /// Computes the gains report for the whole trade history.
    ///
    /// `pricing` holds the marking price per clean symbol in the currency of
    /// the symbol's first acquisition. Symbols without an entry are marked at
    /// the average cost of their remaining lots.
    pub fn compute(
        &self,
        trades: &[NormalizedTrade],
        pricing: &HashMap<String, SymbolPricing>,
    ) -> GainsReport {
        let mut grouped: BTreeMap<&str, Vec<&NormalizedTrade>> = BTreeMap::new();
        for trade in trades {
            grouped.entry(trade.symbol.as_str()).or_default().push(trade);
        }
        let groups: Vec<(&str, Vec<&NormalizedTrade>)> = grouped.into_iter().collect();

        let replays: Vec<SymbolReplay> = groups
            .par_iter()
            .map(|(symbol, symbol_trades)| {
                self.replay_symbol(symbol, symbol_trades, pricing.get(*symbol))
            })
            .collect();

        let mut totals = GainsTotals::default();
        let mut symbols = Vec::with_capacity(replays.len());
        let mut sales = Vec::new();
        let mut matches = Vec::new();
        let mut unmatched = Vec::new();
        for replay in replays {
            totals.add(&replay.gains);
            symbols.push(replay.gains);
            sales.extend(replay.sales);
            matches.extend(replay.matches);
            unmatched.extend(replay.unmatched);
        }
        sales.sort_by_key(|s| s.sell_date);
        matches.sort_by_key(|m| m.sell_date);
        unmatched.sort_by_key(|u| u.sell_date);

        let totals = totals.rounded();
        info!(
            "FIFO replay over {} symbols: {} sales, realized {} {}, unrealized {} {}",
            symbols.len(),
            sales.len(),
            totals.realized,
            self.normalizer.reporting_currency(),
            totals.unrealized,
            self.normalizer.reporting_currency()
        );

        GainsReport {
            reporting_currency: self.normalizer.reporting_currency().to_string(),
            as_of: self.as_of,
            symbols,
            totals,
            sales,
            matches,
            unmatched,
        }
    }

    /// Replays one symbol's trades.
    ///
    /// Trades are re-sorted by date (stable on ties). Proceeds are converted
    /// from the selling trade's currency and cost basis from each consumed
    /// lot's currency. The symbol currency, used for the marking price, is the
    /// currency of the first buy (or of the first trade when there is none).
    pub fn replay_symbol(
        &self,
        symbol: &str,
        trades: &[&NormalizedTrade],
        pricing: Option<&SymbolPricing>,
    ) -> SymbolReplay {
        let mut ordered: Vec<&NormalizedTrade> = trades.to_vec();
        ordered.sort_by_key(|t| t.date);
        let currency = ordered
            .iter()
            .find(|t| t.is_buy())
            .or_else(|| ordered.first())
            .map(|t| t.currency.clone())
            .unwrap_or_else(|| self.normalizer.reporting_currency().to_string());

        let mut lots: VecDeque<TaxLot> = VecDeque::new();
        let mut sales = Vec::new();
        let mut matches = Vec::new();
        let mut unmatched = Vec::new();
        let mut buy_count = 0;
        let mut sell_count = 0;
        let mut short_term_realized = Decimal::ZERO;
        let mut long_term_realized = Decimal::ZERO;
        let mut proceeds_total = Decimal::ZERO;
        let mut cost_basis_total = Decimal::ZERO;
        let mut unmatched_total = Decimal::ZERO;

        for trade in ordered {
            match trade.direction {
                TradeDirection::Buy => {
                    buy_count += 1;
                    lots.push_back(TaxLot::new(
                        trade.date,
                        trade.share_count,
                        trade.unit_price,
                        &trade.currency,
                    ));
                }
                TradeDirection::Sell => {
                    sell_count += 1;
                    let outcome = self.match_sale(symbol, trade, &mut lots, &mut matches);

                    let shortfall = trade.share_count - outcome.matched;
                    let unmatched_shares = if shortfall > SHARE_EPSILON {
                        shortfall
                    } else {
                        Decimal::ZERO
                    };
                    if !unmatched_shares.is_zero() {
                        warn!(
                            "Sell of {} {} on {} exceeds open lots by {} shares. Remainder has no cost basis.",
                            trade.share_count,
                            symbol,
                            trade.date.format("%Y-%m-%d"),
                            unmatched_shares
                        );
                        unmatched_total += unmatched_shares;
                        unmatched.push(UnmatchedSell {
                            symbol: symbol.to_string(),
                            sell_date: trade.date,
                            requested_share_count: trade.share_count,
                            unmatched_share_count: unmatched_shares,
                        });
                    }

                    let days = outcome
                        .oldest_lot
                        .map(|lot_date| holding_days(lot_date, trade.date))
                        .unwrap_or(0);
                    let term = HoldingTerm::from_days(days);

                    let proceeds = outcome.proceeds;
                    let cost_basis = outcome.cost_basis;
                    let realized = proceeds - cost_basis;
                    match term {
                        HoldingTerm::ShortTerm => short_term_realized += realized,
                        HoldingTerm::LongTerm => long_term_realized += realized,
                    }
                    proceeds_total += proceeds;
                    cost_basis_total += cost_basis;

                    sales.push(SaleRecord {
                        symbol: symbol.to_string(),
                        sell_date: trade.date,
                        shares_sold: trade.share_count,
                        matched_shares: outcome.matched,
                        unmatched_shares,
                        proceeds: round_money(proceeds),
                        cost_basis: round_money(cost_basis),
                        realized_gain: round_money(realized),
                        holding_days: days,
                        term,
                    });
                }
            }
        }

        let remaining_shares: Decimal = lots.iter().map(|l| l.remaining_share_count).sum();
        let pricing = pricing.copied().unwrap_or_else(|| {
            let remaining_cost_local: Decimal = lots
                .iter()
                .map(|lot| self.normalizer.convert(lot.remaining_cost(), &lot.currency, &currency))
                .sum();
            let average = if remaining_shares > SHARE_EPSILON {
                remaining_cost_local
                    .checked_div(remaining_shares)
                    .unwrap_or(Decimal::ZERO)
            } else {
                Decimal::ZERO
            };
            SymbolPricing::average_cost(average)
        });

        let mut remaining_cost = Decimal::ZERO;
        let mut short_term_unrealized = Decimal::ZERO;
        let mut long_term_unrealized = Decimal::ZERO;
        for lot in &lots {
            let lot_value = self.normalizer.to_reporting(
                multiply_tolerant(lot.remaining_share_count, pricing.current_price, symbol),
                &currency,
            );
            let lot_cost = self.normalizer.to_reporting(lot.remaining_cost(), &lot.currency);
            remaining_cost += lot_cost;
            let lot_gain = lot_value - lot_cost;
            match HoldingTerm::from_days(holding_days(lot.acquisition_date, self.as_of)) {
                HoldingTerm::ShortTerm => short_term_unrealized += lot_gain,
                HoldingTerm::LongTerm => long_term_unrealized += lot_gain,
            }
        }

        let realized = short_term_realized + long_term_realized;
        let unrealized = short_term_unrealized + long_term_unrealized;
        let current_value = self.normalizer.to_reporting(
            multiply_tolerant(remaining_shares, pricing.current_price, symbol),
            &currency,
        );

        debug!(
            "{}: {} buys, {} sells, {} shares left in {} lots",
            symbol,
            buy_count,
            sell_count,
            remaining_shares,
            lots.len()
        );

        let gains = SymbolGains {
            symbol: symbol.to_string(),
            currency,
            realized: round_money(realized),
            unrealized: round_money(unrealized),
            total: round_money(realized + unrealized),
            proceeds: round_money(proceeds_total),
            cost_basis_sold: round_money(cost_basis_total),
            sell_count,
            buy_count,
            remaining_shares,
            remaining_cost: round_money(remaining_cost),
            current_value: round_money(current_value),
            current_price: pricing.current_price,
            price_source: pricing.source,
            short_term_realized: round_money(short_term_realized),
            long_term_realized: round_money(long_term_realized),
            short_term_unrealized: round_money(short_term_unrealized),
            long_term_unrealized: round_money(long_term_unrealized),
            unmatched_shares: unmatched_total,
            remaining_lots: lots.into_iter().collect(),
        };

        SymbolReplay {
            gains,
            sales,
            matches,
            unmatched,
        }
    }

    /// Consumes the oldest lots for one sale, dropping drained lots.
    fn match_sale(
        &self,
        symbol: &str,
        trade: &NormalizedTrade,
        lots: &mut VecDeque<TaxLot>,
        matches: &mut Vec<SellMatch>,
    ) -> SaleOutcome {
        let mut outcome = SaleOutcome {
            matched: Decimal::ZERO,
            proceeds: self.normalizer.to_reporting(
                multiply_tolerant(trade.share_count, trade.unit_price, symbol),
                &trade.currency,
            ),
            cost_basis: Decimal::ZERO,
            oldest_lot: None,
        };

        let mut outstanding = trade.share_count;
        while outstanding > SHARE_EPSILON {
            let Some(lot) = lots.front_mut() else {
                break;
            };
            let taken = lot.consume(outstanding);
            outstanding -= taken;
            outcome.matched += taken;
            outcome.cost_basis += self
                .normalizer
                .to_reporting(multiply_tolerant(taken, lot.unit_cost, symbol), &lot.currency);
            outcome.oldest_lot.get_or_insert(lot.acquisition_date);

            matches.push(SellMatch {
                symbol: symbol.to_string(),
                sell_date: trade.date,
                matched_share_count: taken,
                lot_date: lot.acquisition_date,
                lot_unit_cost: lot.unit_cost,
                lot_currency: lot.currency.clone(),
            });

            if lot.is_drained() {
                lots.pop_front();
            }
        }

        outcome
    }
}
