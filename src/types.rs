//! Доменные типы: сделки, позиции, денежные потоки и итоговый отчёт.

use std::collections::VecDeque;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::XirrError;

/// Денежное значение, используем `Decimal` для точных расчётов.
pub type Money = Decimal;

/// Номер фолио (счёта инвестора у регистратора).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(pub String);

/// Ключ позиции: фолио и ISIN фонда.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HoldingKey {
    /// Фолио.
    pub account: AccountId,
    /// ISIN фонда.
    pub holding_id: String,
}

impl HoldingKey {
    /// Создаёт ключ позиции.
    pub fn new(account: impl Into<String>, holding_id: impl Into<String>) -> Self {
        Self {
            account: AccountId(account.into()),
            holding_id: holding_id.into(),
        }
    }
}

impl fmt::Display for HoldingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account.0, self.holding_id)
    }
}

/// Сделка из выписки. Положительные паи — покупка, отрицательные — продажа.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// ISIN фонда.
    pub holding_id: String,
    /// Фолио.
    pub account: AccountId,
    /// Количество паёв со знаком.
    pub units: Money,
    /// Сумма сделки.
    pub amount: Money,
    /// Дата сделки.
    pub date: NaiveDate,
}

impl Transaction {
    /// Ключ позиции, к которой относится сделка.
    pub fn key(&self) -> HoldingKey {
        HoldingKey {
            account: self.account.clone(),
            holding_id: self.holding_id.clone(),
        }
    }
}

/// Партия паёв, купленная одной сделкой (для FIFO).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lot {
    /// Дата покупки.
    pub date: NaiveDate,
    /// Непроданный остаток паёв.
    pub units: Money,
    /// Себестоимость остатка.
    pub cost: Money,
}

/// Текущее состояние позиции.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoldingPosition {
    /// Остаток паёв.
    pub remaining_units: Money,
    /// Себестоимость остатка.
    pub remaining_cost_basis: Money,
    /// Открытые партии; пусто при учёте по средней цене.
    pub lots: VecDeque<Lot>,
}

impl HoldingPosition {
    /// Средняя цена пая, если остаток не нулевой.
    pub fn average_cost(&self) -> Option<Money> {
        if self.remaining_units.is_zero() {
            None
        } else {
            Some(self.remaining_cost_basis / self.remaining_units)
        }
    }
}

/// Метод расчёта себестоимости при продаже.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CostBasisMethod {
    /// Списание по скользящей средней цене.
    #[default]
    AverageCost,
    /// Списание самых ранних партий.
    Fifo,
}

/// Что делать с продажей, превышающей остаток.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OversellPolicy {
    /// Не менять позицию, записать предупреждение.
    #[default]
    Ignore,
    /// Продать весь остаток, записать предупреждение.
    Clamp,
    /// Прервать расчёт ошибкой.
    Reject,
}

/// Предупреждение, возникшее при учёте сделок.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWarning {
    /// Продажа превысила остаток паёв.
    SaleExceedsPosition {
        /// Позиция.
        key: HoldingKey,
        /// Дата продажи.
        date: NaiveDate,
        /// Запрошенное количество.
        requested: Money,
        /// Остаток на момент продажи.
        held: Money,
    },
}

impl fmt::Display for LedgerWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SaleExceedsPosition {
                key,
                date,
                requested,
                held,
            } => write!(
                f,
                "{date}: sale of {requested} units exceeds {held} held for {key}"
            ),
        }
    }
}

/// Денежный поток: отрицательный — вложение, положительный — получение.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashFlowEvent {
    /// Сумма со знаком.
    pub amount: Money,
    /// Дата.
    pub date: NaiveDate,
}

/// Оценка одной позиции по текущей цене.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingValuation {
    /// Позиция.
    pub key: HoldingKey,
    /// Остаток паёв.
    pub units: Money,
    /// Себестоимость остатка.
    pub cost_basis: Money,
    /// Цена пая (ноль, если недоступна).
    pub price: Money,
    /// Рыночная стоимость.
    pub current_value: Money,
    /// Нереализованный доход.
    pub gain: Money,
}

/// Итог по всем позициям.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortfolioSummary {
    /// Позиции в порядке ключей.
    pub holdings: Vec<HoldingValuation>,
    /// Суммарная стоимость.
    pub total_value: Money,
    /// Суммарный доход.
    pub total_gain: Money,
}

/// Итоговый отчёт по портфелю.
#[derive(Debug, Clone)]
pub struct PortfolioReport {
    /// Дата оценки.
    pub as_of: NaiveDate,
    /// Суммарная стоимость.
    pub total_value: Money,
    /// Суммарный нереализованный доход.
    pub total_gain: Money,
    /// Оценка по позициям.
    pub holdings: Vec<HoldingValuation>,
    /// Годовая доходность XIRR либо причина, по которой она недоступна.
    pub xirr: Result<f64, XirrError>,
    /// ISIN, для которых цена не получена.
    pub unavailable_prices: Vec<String>,
    /// Предупреждения учёта.
    pub warnings: Vec<LedgerWarning>,
}
