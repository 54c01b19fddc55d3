use super::producer::Producer;
use crate::error::Result;

/// Buys from the cheapest producer it can reach and remembers what it paid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Consumer {
    price: f64,
}

impl Consumer {
    pub const TYPE: usize = 0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Price paid in the last purchase; 0 before the first one.
    pub fn price(&self) -> f64 {
        self.price
    }

    /// Buy `amount` units from `seller` at its current price.
    pub fn buy(&mut self, seller: &mut Producer, amount: u32) -> Result<()> {
        seller.sale(amount)?;
        self.price = seller.price();
        Ok(())
    }
}

/// Index of the lowest price; the first one wins ties.
pub fn cheapest(prices: impl IntoIterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, price) in prices.into_iter().enumerate() {
        if best.is_none_or(|(_, best_price)| price < best_price) {
            best = Some((idx, price));
        }
    }
    best.map(|(idx, _)| idx)
}
