//! Tickers on the tape and the price ticks that move them.

use serde::{Deserialize, Serialize};

/// One bar of intraday price history, used for the sparkline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aggregate {
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A single symbol on the tape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Ticker {
    pub symbol: String,
    pub company_name: String,
    pub price: f64,
    pub previous_close_price: f64,
    pub outstanding_shares: i64,
    /// Rank of `symbol` in ascending order across the whole ticker set.
    pub index: i32,
    pub recent_aggregates: Vec<Aggregate>,
    pub market_cap: f64,
    pub price_change_percentage: f64,
}

impl Ticker {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self { symbol: symbol.into(), ..Default::default() }
    }

    /// Set the price and recompute the fields derived from it.
    ///
    /// NOTE: `1 - price / previous_close` is negative when the price is *up*.
    pub fn apply_price(&mut self, price: f64) {
        self.price = price;
        self.market_cap = self.outstanding_shares as f64 * price;
        self.price_change_percentage = if self.previous_close_price == 0.0 {
            0.0
        } else {
            1.0 - (price / self.previous_close_price)
        };
    }

    /// Copy the reference-data fields of `other`, keeping live price state.
    pub fn merge_reference(&mut self, other: &Ticker) {
        self.company_name.clone_from(&other.company_name);
        self.previous_close_price = other.previous_close_price;
        self.outstanding_shares = other.outstanding_shares;
        let price = self.price;
        self.apply_price(price);
    }
}

/// A live price tick for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: f64,
}

/// Sort tickers by symbol and stamp each with its rank.
pub fn sort_and_index(tickers: &mut [Ticker]) {
    tickers.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    for (i, t) in tickers.iter_mut().enumerate() {
        t.index = i as i32;
    }
}

/// Insert `ticker`, replacing any existing entry with the same symbol, then
/// re-sort and re-index. Returns `true` if an entry was replaced.
pub fn upsert_ticker(tickers: &mut Vec<Ticker>, mut ticker: Ticker) -> bool {
    let price = ticker.price;
    ticker.apply_price(price);
    let replaced = match tickers.iter_mut().find(|t| t.symbol == ticker.symbol) {
        Some(slot) => {
            *slot = ticker;
            true
        }
        None => {
            tickers.push(ticker);
            false
        }
    };
    sort_and_index(tickers);
    replaced
}

/// Remove the ticker with `symbol`, re-sorting and re-indexing the rest.
pub fn remove_ticker(tickers: &mut Vec<Ticker>, symbol: &str) -> Option<Ticker> {
    let pos = tickers.iter().position(|t| t.symbol == symbol)?;
    // Order is rebuilt below, so the O(1) swap is fine.
    let removed = tickers.swap_remove(pos);
    sort_and_index(tickers);
    Some(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(tickers: &[Ticker]) -> Vec<(&str, i32)> {
        tickers.iter().map(|t| (t.symbol.as_str(), t.index)).collect()
    }

    #[test]
    fn index_is_lexicographic_rank() {
        let mut tickers = vec![Ticker::new("NVDA"), Ticker::new("AAPL"), Ticker::new("AMD")];
        sort_and_index(&mut tickers);
        assert_eq!(symbols(&tickers), vec![("AAPL", 0), ("AMD", 1), ("NVDA", 2)]);
    }

    #[test]
    fn upsert_appends_then_replaces() {
        let mut tickers = vec![Ticker::new("MSFT")];
        sort_and_index(&mut tickers);

        assert!(!upsert_ticker(&mut tickers, Ticker::new("AAPL")));
        assert_eq!(symbols(&tickers), vec![("AAPL", 0), ("MSFT", 1)]);

        let renamed = Ticker { company_name: "Microsoft".into(), ..Ticker::new("MSFT") };
        assert!(upsert_ticker(&mut tickers, renamed));
        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[1].company_name, "Microsoft");
    }

    #[test]
    fn remove_reindexes() {
        let mut tickers: Vec<Ticker> = ["A", "B", "C", "D"].into_iter().map(Ticker::new).collect();
        sort_and_index(&mut tickers);
        assert_eq!(remove_ticker(&mut tickers, "A").map(|t| t.symbol), Some("A".to_string()));
        assert_eq!(symbols(&tickers), vec![("B", 0), ("C", 1), ("D", 2)]);
        assert!(remove_ticker(&mut tickers, "Z").is_none());
    }

    #[test]
    fn price_derivations() {
        let mut t = Ticker { previous_close_price: 100.0, outstanding_shares: 10, ..Ticker::new("X") };
        t.apply_price(110.0);
        assert_eq!(t.market_cap, 1100.0);
        // Rising price yields a negative value with this formula.
        assert!((t.price_change_percentage - (-0.1)).abs() < 1e-9);

        let mut fresh = Ticker::new("Y");
        fresh.apply_price(5.0);
        assert_eq!(fresh.price_change_percentage, 0.0);
    }

    #[test]
    fn merge_reference_keeps_price() {
        let mut live = Ticker { price: 50.0, ..Ticker::new("X") };
        let reference = Ticker {
            company_name: "X Corp".into(),
            previous_close_price: 40.0,
            outstanding_shares: 2,
            price: 1.0,
            ..Ticker::new("X")
        };
        live.merge_reference(&reference);
        assert_eq!(live.price, 50.0);
        assert_eq!(live.company_name, "X Corp");
        assert_eq!(live.market_cap, 100.0);
    }
}
