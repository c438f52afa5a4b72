//! Сборка итогового отчёта: учёт сделок, оценка, денежные потоки, XIRR.

use std::collections::BTreeSet;

use chrono::{Local, NaiveDate};
use tracing::info;

use crate::cash_flow::build_cash_flows;
use crate::error::PortfolioError;
use crate::ledger::{Ledger, LedgerOptions};
use crate::prices::{PriceCache, PriceOracle, fetch_prices};
use crate::summary::summarize;
use crate::types::{CostBasisMethod, OversellPolicy, PortfolioReport, Transaction};
use crate::xirr::XirrSolver;

/// Набор настроек расчёта (внутренний тип).
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReportOptions {
    pub ledger: LedgerOptions,
    pub chronological: bool,
    pub as_of: Option<NaiveDate>,
    pub solver: XirrSolver,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            ledger: LedgerOptions::default(),
            chronological: true,
            as_of: None,
            solver: XirrSolver::default(),
        }
    }
}

/// Различные ISIN, встречающиеся в сделках.
pub fn holding_ids<'a, I>(transactions: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .map(|tx| tx.holding_id.clone())
        .collect()
}

/// Builder для расчёта `PortfolioReport` по потоку сделок.
pub struct ReportBuilder<'a> {
    transactions: &'a [Transaction],
    options: ReportOptions,
}

impl<'a> ReportBuilder<'a> {
    /// Создаёт builder для указанных сделок.
    ///
    /// # Пример
    ///
    /// ```
    /// # use folio_xirr::{PriceCache, RawStatement, ReportBuilder};
    /// # use chrono::NaiveDate;
    /// # use rust_decimal::Decimal;
    /// let raw = RawStatement::from_json(r#"{"data":[{"dtTransaction":[
    ///     {"isin":"X","folio":"A","trxnUnits":"10","trxnAmount":"1000","trxnDate":"01-Jan-2022"},
    ///     {"isin":"X","folio":"A","trxnUnits":"-5","trxnAmount":"600","trxnDate":"11-Apr-2022"}
    /// ]}]}"#).unwrap();
    /// let transactions = raw.transactions().unwrap();
    ///
    /// let mut prices = PriceCache::default();
    /// prices.insert("X", Some(Decimal::from(130)));
    ///
    /// let report = ReportBuilder::new(&transactions)
    ///     .as_of(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
    ///     .compute(&prices)
    ///     .unwrap();
    /// assert_eq!(report.total_value, Decimal::from(650));
    /// assert_eq!(report.total_gain, Decimal::from(150));
    /// assert!(report.xirr.is_ok());
    /// ```
    #[inline]
    pub fn new(transactions: &'a [Transaction]) -> Self {
        Self {
            transactions,
            options: ReportOptions::default(),
        }
    }

    /// Метод расчёта себестоимости.
    #[inline]
    pub const fn method(mut self, method: CostBasisMethod) -> Self {
        self.options.ledger.method = method;
        self
    }

    /// Реакция на продажу сверх остатка.
    #[inline]
    pub const fn oversell(mut self, policy: OversellPolicy) -> Self {
        self.options.ledger.oversell = policy;
        self
    }

    /// Сортировать ли сделки по дате перед учётом (по умолчанию да).
    #[inline]
    pub const fn chronological(mut self, enabled: bool) -> Self {
        self.options.chronological = enabled;
        self
    }

    /// Дата оценки; по умолчанию сегодняшняя.
    #[inline]
    pub const fn as_of(mut self, date: NaiveDate) -> Self {
        self.options.as_of = Some(date);
        self
    }

    /// Настройки поиска XIRR.
    #[inline]
    pub const fn solver(mut self, solver: XirrSolver) -> Self {
        self.options.solver = solver;
        self
    }

    /// Считает отчёт по уже загруженным ценам.
    pub fn compute(self, prices: &PriceCache) -> Result<PortfolioReport, PortfolioError> {
        let as_of = self
            .options
            .as_of
            .unwrap_or_else(|| Local::now().date_naive());

        let mut ordered: Vec<&Transaction> = self.transactions.iter().collect();
        if self.options.chronological {
            // sort_by_key стабилен: сделки одного дня сохраняют порядок выписки
            ordered.sort_by_key(|tx| tx.date);
        }

        let ledger = Ledger::from_transactions(self.options.ledger, ordered.iter().copied())?;
        let (positions, warnings) = ledger.into_parts();

        let summary = summarize(&positions, |id| prices.price(id))?;
        let flows = build_cash_flows(ordered.iter().copied(), &summary.holdings, as_of);
        let xirr = self.options.solver.solve(&flows);

        let unavailable_prices: Vec<String> = holding_ids(self.transactions)
            .into_iter()
            .filter(|id| !prices.is_available(id))
            .collect();

        info!(
            %as_of,
            holdings = summary.holdings.len(),
            cash_flows = flows.len(),
            total_value = %summary.total_value,
            total_gain = %summary.total_gain,
            "portfolio evaluated"
        );

        Ok(PortfolioReport {
            as_of,
            total_value: summary.total_value,
            total_gain: summary.total_gain,
            holdings: summary.holdings,
            xirr,
            unavailable_prices,
            warnings,
        })
    }

    /// Загружает цены из источника (не более `workers` запросов одновременно) и считает отчёт.
    pub async fn compute_with_oracle<O>(
        self,
        oracle: &O,
        workers: usize,
    ) -> Result<PortfolioReport, PortfolioError>
    where
        O: PriceOracle + ?Sized,
    {
        let prices = fetch_prices(oracle, holding_ids(self.transactions), workers).await;
        self.compute(&prices)
    }
}
