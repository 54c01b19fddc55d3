use crate::error::{Error, Result};

/// Step by which the expected earnings move after each verdict.
const DELTA_EARNINGS: f64 = 0.01;

/// A producer's rolling profit target.
///
/// The target is `capital * (1 + earn)`. Reaching it raises the price;
/// failing to reach it within the allotted days lowers it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitExpectation {
    earn: f64,
    target_profit: f64,
    within_days: u32,
    initial_within_days: u32,
    delta_price: f64,
    min_earnings: f64,
}

impl ProfitExpectation {
    pub const DEFAULT_MIN_EARNINGS: f64 = 0.05;

    pub fn new(initial: f64, earn: f64, within_days: u32, delta_price: f64) -> Self {
        Self::with_min_earnings(
            initial,
            earn,
            within_days,
            delta_price,
            Self::DEFAULT_MIN_EARNINGS,
        )
    }

    pub fn with_min_earnings(
        initial: f64,
        earn: f64,
        within_days: u32,
        delta_price: f64,
        min_earnings: f64,
    ) -> Self {
        Self {
            earn,
            target_profit: initial + (initial * earn),
            within_days,
            initial_within_days: within_days,
            delta_price,
            min_earnings,
        }
    }

    pub fn earn(&self) -> f64 {
        self.earn
    }

    pub fn target_profit(&self) -> f64 {
        self.target_profit
    }

    pub fn within_days(&self) -> u32 {
        self.within_days
    }

    /// Judge one day of business, adjusting `price` in place.
    pub fn check(&mut self, price: &mut f64, capital: f64) {
        if self.within_days == 0 {
            let decrement = *price * self.delta_price;
            if *price > decrement {
                *price -= decrement;
            }
            if self.earn > self.min_earnings {
                self.earn -= DELTA_EARNINGS;
            }
            self.restart(capital);
        } else if capital >= self.target_profit {
            *price += *price * self.delta_price;
            self.earn += DELTA_EARNINGS;
            self.restart(capital);
        } else {
            self.within_days -= 1;
        }
    }

    fn restart(&mut self, capital: f64) {
        self.target_profit = capital + (capital * self.earn);
        self.within_days = self.initial_within_days;
    }
}

/// Sells units from stock at its current price.
#[derive(Debug, Clone, PartialEq)]
pub struct Producer {
    capital: f64,
    stock: u32,
    price: f64,
    expectation: ProfitExpectation,
}

impl Producer {
    pub const TYPE: usize = 1;

    pub fn new(capital: f64, stock: u32, price: f64, expectation: ProfitExpectation) -> Self {
        Self {
            capital,
            stock,
            price,
            expectation,
        }
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn expectation(&self) -> &ProfitExpectation {
        &self.expectation
    }

    /// Sell `amount` units at the current price.
    pub fn sale(&mut self, amount: u32) -> Result<()> {
        if self.stock < amount {
            return Err(Error::InsufficientStock {
                requested: amount,
                available: self.stock,
            });
        }
        self.stock -= amount;
        self.capital += self.price * f64::from(amount);
        Ok(())
    }

    /// Let the profit expectation adjust the price.
    pub fn balance_check(&mut self) {
        self.expectation.check(&mut self.price, self.capital);
    }
}
