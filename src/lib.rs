#![warn(missing_docs)]
//! Библиотека для оценки портфеля паевых фондов по выписке сделок:
//! остатки и себестоимость, нереализованный доход и годовая доходность XIRR.

mod cash_flow;
mod error;
mod ledger;
mod parser;
mod prices;
mod raw;
mod report;
mod summary;
mod types;
mod utils;
mod xirr;

pub use crate::cash_flow::build_cash_flows;
pub use crate::error::{PortfolioError, XirrError};
pub use crate::ledger::{Ledger, LedgerOptions};
pub use crate::prices::{
    HttpOracleConfig, HttpPriceOracle, PriceCache, PriceOracle, StaticPriceOracle, fetch_prices,
};
pub use crate::raw::{RawGroup, RawStatement, RawTransaction};
pub use crate::report::{ReportBuilder, holding_ids};
pub use crate::summary::summarize;
pub use crate::types::*;
pub use crate::xirr::{XirrSolver, xirr};
