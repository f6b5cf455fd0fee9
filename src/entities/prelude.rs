#![allow(unused_imports)]

pub use super::faucet_outcome::Entity as FaucetOutcome;
