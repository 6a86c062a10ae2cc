#![allow(dead_code)]
//! Buy/sell price derivation from raw spot prices (spec §4.2).

use serde::{Deserialize, Serialize};

/// Price model parameters, loaded from [`crate::config::PriceSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceModel {
    pub markup_rate: f64,
    pub vat_multiplier: f64,
    pub additional_costs: f64,
    pub tax_reduction: f64,
}

impl PriceModel {
    /// `buy_price = (s + markup_rate) * vat_multiplier + additional_costs`
    pub fn buy_price(&self, spot: f64) -> f64 {
        (spot + self.markup_rate) * self.vat_multiplier + self.additional_costs
    }

    /// `sell_price = s + tax_reduction`
    pub fn sell_price(&self, spot: f64) -> f64 {
        spot + self.tax_reduction
    }

    pub fn derive(&self, spot_prices: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let buy = spot_prices.iter().map(|&s| self.buy_price(s)).collect();
        let sell = spot_prices.iter().map(|&s| self.sell_price(s)).collect();
        (buy, sell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> PriceModel {
        PriceModel {
            markup_rate: 0.05,
            vat_multiplier: 1.25,
            additional_costs: 0.30,
            tax_reduction: 0.60,
        }
    }

    #[test]
    fn derives_buy_and_sell_from_spot() {
        let m = model();
        let spot = 1.0;
        assert!((m.buy_price(spot) - ((1.0 + 0.05) * 1.25 + 0.30)).abs() < 1e-9);
        assert!((m.sell_price(spot) - (1.0 + 0.60)).abs() < 1e-9);
    }

    #[test]
    fn derive_maps_whole_vector() {
        let m = model();
        let (buy, sell) = m.derive(&[0.0, 1.0, 2.0]);
        assert_eq!(buy.len(), 3);
        assert_eq!(sell.len(), 3);
        assert!((sell[0] - 0.60).abs() < 1e-9);
    }
}
