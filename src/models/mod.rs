//! Bundled models.

pub mod condensation;
pub mod game_of_life;
pub mod market;
pub mod real_estate;
pub mod segregation;

pub use condensation::Condensation;
pub use game_of_life::GameOfLife;
pub use market::Market;
pub use real_estate::RealEstate;
pub use segregation::Segregation;
