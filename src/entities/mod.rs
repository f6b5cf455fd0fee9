pub mod faucet_outcome;
pub mod prelude;
