//! Multi-exchange collateral price feed.
//!
//! Aggregates spot quotes from public exchange APIs into a fixed-point
//! USD price: median plus MAD outlier rejection over however many
//! sources answered, an EWMA volatility estimate over a rolling window,
//! and a blake3 digest of the aggregate for downstream attestation.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Result};
use keel_types::math::BASE;
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use crate::{OracleError, PriceOracle};

const HISTORY: usize = 60;
const MIN_SOURCES: usize = 3;

#[derive(Debug, Clone)]
pub struct PriceReport {
    /// BASE-scale USD price.
    pub price: u128,
    pub timestamp: u64,
    /// Quotes surviving outlier rejection.
    pub sources: usize,
    /// EWMA of squared returns over the rolling window, as a rate.
    pub volatility: f64,
    /// blake3 of the aggregate price bytes.
    pub data_hash: [u8; 32],
}

pub struct PriceFeed {
    symbol: String,
    client: Client,
    history: VecDeque<f64>,
    last_report: Option<PriceReport>,
    max_age_secs: u64,
}

impl PriceFeed {
    pub fn new(symbol: &str, max_age_secs: u64) -> Self {
        Self {
            symbol: symbol.to_string(),
            client: Client::new(),
            history: VecDeque::with_capacity(HISTORY),
            last_report: None,
            max_age_secs,
        }
    }

    pub fn last_report(&self) -> Option<&PriceReport> {
        self.last_report.as_ref()
    }

    /// Fetch fresh quotes and fold them into a new aggregate report.
    pub async fn refresh(&mut self) -> Result<PriceReport> {
        let quotes = self.fetch_multi_exchange().await;
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let report = self.aggregate(&quotes, now)?;
        self.last_report = Some(report.clone());
        Ok(report)
    }

    async fn fetch_multi_exchange(&self) -> Vec<f64> {
        let mut quotes = Vec::new();

        match self.fetch_coingecko().await {
            Ok(p) => quotes.push(p),
            Err(e) => warn!("coingecko quote failed: {e}"),
        }
        match self.fetch_binance().await {
            Ok(p) => quotes.push(p),
            Err(e) => warn!("binance quote failed: {e}"),
        }
        match self.fetch_kraken().await {
            Ok(p) => quotes.push(p),
            Err(e) => warn!("kraken quote failed: {e}"),
        }
        match self.fetch_coinbase().await {
            Ok(p) => quotes.push(p),
            Err(e) => warn!("coinbase quote failed: {e}"),
        }

        quotes
    }

    async fn fetch_coingecko(&self) -> Result<f64> {
        let id = self.symbol.to_lowercase();
        let url = format!(
            "https://api.coingecko.com/api/v3/simple/price?ids={}&vs_currencies=usd",
            id
        );
        let resp: Value = self.client.get(&url).send().await?.json().await?;
        resp[&id]["usd"]
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("no price in coingecko response"))
    }

    async fn fetch_binance(&self) -> Result<f64> {
        let ticker = format!("{}USDT", self.symbol.to_uppercase());
        let url = format!(
            "https://api.binance.com/api/v3/ticker/price?symbol={}",
            ticker
        );
        let resp: Value = self.client.get(&url).send().await?.json().await?;
        let price = resp["price"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("no price in binance response"))?;
        Ok(price.parse::<f64>()?)
    }

    async fn fetch_kraken(&self) -> Result<f64> {
        let pair = format!("{}USD", self.symbol.to_uppercase());
        let url = format!("https://api.kraken.com/0/public/Ticker?pair={}", pair);
        let resp: Value = self.client.get(&url).send().await?.json().await?;
        let result = resp["result"]
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("no result in kraken response"))?;
        let (_, ticker) = result
            .iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty kraken result"))?;
        let price = ticker["c"][0]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("no close price in kraken response"))?;
        Ok(price.parse::<f64>()?)
    }

    async fn fetch_coinbase(&self) -> Result<f64> {
        let product = format!("{}-USD", self.symbol.to_uppercase());
        let url = format!(
            "https://api.exchange.coinbase.com/products/{}/ticker",
            product
        );
        let resp: Value = self.client.get(&url).send().await?.json().await?;
        let price = resp["price"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("no price in coinbase response"))?;
        Ok(price.parse::<f64>()?)
    }

    /// Median + MAD rejection, then the mean of the survivors. Pure with
    /// respect to the network so it can be tested on canned quotes.
    fn aggregate(&mut self, quotes: &[f64], now: u64) -> Result<PriceReport> {
        let mut sorted: Vec<f64> = quotes
            .iter()
            .copied()
            .filter(|p| p.is_finite() && *p > 0.0)
            .collect();
        if sorted.len() < MIN_SOURCES {
            bail!(
                "insufficient price sources for {}: got {}",
                self.symbol,
                sorted.len()
            );
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let median = sorted[sorted.len() / 2];
        let mad: f64 =
            sorted.iter().map(|p| (p - median).abs()).sum::<f64>() / sorted.len() as f64;
        let survivors: Vec<f64> = sorted
            .iter()
            .copied()
            .filter(|p| (p - median).abs() <= 3.0 * mad.max(f64::EPSILON))
            .collect();

        let mean = survivors.iter().sum::<f64>() / survivors.len() as f64;

        self.history.push_back(mean);
        if self.history.len() > HISTORY {
            self.history.pop_front();
        }

        let price = (mean * BASE as f64).round() as u128;
        if price == 0 {
            bail!("aggregate price for {} rounded to zero", self.symbol);
        }

        Ok(PriceReport {
            price,
            timestamp: now,
            sources: survivors.len(),
            volatility: self.ewma_volatility(),
            data_hash: *blake3::hash(&mean.to_le_bytes()).as_bytes(),
        })
    }

    fn ewma_volatility(&self) -> f64 {
        if self.history.len() < 2 {
            return 0.0;
        }
        let alpha = 0.2;
        let mut ewma = 0.0;
        let mut prev = self.history[0];
        for &p in self.history.iter().skip(1) {
            let ret = (p - prev) / prev;
            ewma = alpha * ret * ret + (1.0 - alpha) * ewma;
            prev = p;
        }
        ewma.sqrt()
    }
}

impl PriceOracle for PriceFeed {
    /// Serve the latest aggregate if it is still inside the staleness
    /// bound. Refreshing is the owner's job; this never hits the
    /// network.
    fn fetch_current_price(&self) -> Result<u128, OracleError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        match &self.last_report {
            None => Err(OracleError::Unavailable(format!(
                "no aggregate yet for {}",
                self.symbol
            ))),
            Some(r) if now.saturating_sub(r.timestamp) > self.max_age_secs => {
                Err(OracleError::Stale {
                    last: r.timestamp,
                    now,
                })
            }
            Some(r) if r.price == 0 => Err(OracleError::ZeroPrice),
            Some(r) => Ok(r.price),
        }
    }
}
