pub mod block;
pub mod config;
pub mod error;
pub mod ledger;
pub mod product;
pub mod rules;
pub mod service;
pub mod store;
pub mod utils;
