//! Учёт остатков и себестоимости по позициям.

use std::collections::{BTreeMap, VecDeque};

use crate::error::PortfolioError;
use crate::types::{
    CostBasisMethod, HoldingKey, HoldingPosition, LedgerWarning, Lot, Money, OversellPolicy,
    Transaction,
};
use rust_decimal::Decimal;
use tracing::warn;

/// Параметры учёта сделок.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerOptions {
    /// Метод расчёта себестоимости.
    pub method: CostBasisMethod,
    /// Реакция на продажу сверх остатка.
    pub oversell: OversellPolicy,
}

/// Накопитель позиций: свёртка потока сделок в словарь «ключ → позиция».
///
/// Позиция создаётся первой сделкой по ключу и никогда не удаляется:
/// полностью проданная остаётся с нулевыми значениями.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    options: LedgerOptions,
    positions: BTreeMap<HoldingKey, HoldingPosition>,
    warnings: Vec<LedgerWarning>,
}

impl Ledger {
    /// Создаёт пустой накопитель.
    pub fn new(options: LedgerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Сворачивает сделки в том порядке, в котором они переданы.
    pub fn from_transactions<'a, I>(options: LedgerOptions, txs: I) -> Result<Self, PortfolioError>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut ledger = Self::new(options);
        for tx in txs {
            ledger.apply(tx)?;
        }
        Ok(ledger)
    }

    /// Применяет одну сделку.
    ///
    /// Ошибка возможна при `OversellPolicy::Reject` и при переполнении `Decimal`;
    /// в обоих случаях позиция не меняется.
    pub fn apply(&mut self, tx: &Transaction) -> Result<(), PortfolioError> {
        let key = tx.key();
        let position = self.positions.entry(key.clone()).or_default();

        if tx.units > Decimal::ZERO {
            return buy(self.options.method, position, tx, &key);
        }
        if tx.units.is_zero() {
            return Ok(());
        }

        let sold = tx.units.abs();
        let held = position.remaining_units;
        if held >= sold {
            return sell(self.options.method, position, sold, &key);
        }

        match self.options.oversell {
            OversellPolicy::Reject => {
                return Err(PortfolioError::SaleExceedsPosition {
                    key,
                    date: tx.date,
                    requested: sold,
                    held,
                });
            }
            OversellPolicy::Clamp => {
                if !held.is_zero() {
                    sell(self.options.method, position, held, &key)?;
                }
            }
            OversellPolicy::Ignore => {}
        }

        warn!(%key, date = %tx.date, requested = %sold, %held, "sale exceeds position");
        self.warnings.push(LedgerWarning::SaleExceedsPosition {
            key,
            date: tx.date,
            requested: sold,
            held,
        });
        Ok(())
    }

    /// Позиция по ключу.
    pub fn position(&self, key: &HoldingKey) -> Option<&HoldingPosition> {
        self.positions.get(key)
    }

    /// Все позиции в порядке ключей.
    pub const fn positions(&self) -> &BTreeMap<HoldingKey, HoldingPosition> {
        &self.positions
    }

    /// Предупреждения, накопленные при учёте.
    pub fn warnings(&self) -> &[LedgerWarning] {
        &self.warnings
    }

    /// Разбирает накопитель на позиции и предупреждения.
    pub fn into_parts(self) -> (BTreeMap<HoldingKey, HoldingPosition>, Vec<LedgerWarning>) {
        (self.positions, self.warnings)
    }
}

fn overflow(key: &HoldingKey, operation: &'static str) -> PortfolioError {
    PortfolioError::Overflow {
        key: key.clone(),
        operation,
    }
}

fn buy(
    method: CostBasisMethod,
    position: &mut HoldingPosition,
    tx: &Transaction,
    key: &HoldingKey,
) -> Result<(), PortfolioError> {
    let units = position
        .remaining_units
        .checked_add(tx.units)
        .ok_or_else(|| overflow(key, "purchase units"))?;
    let cost = position
        .remaining_cost_basis
        .checked_add(tx.amount)
        .ok_or_else(|| overflow(key, "purchase cost"))?;

    position.remaining_units = units;
    position.remaining_cost_basis = cost;
    if method == CostBasisMethod::Fifo {
        position.lots.push_back(Lot {
            date: tx.date,
            units: tx.units,
            cost: tx.amount,
        });
    }
    Ok(())
}

/// Списывает `sold` паёв; вызывающий гарантирует `0 < sold <= remaining_units`.
fn sell(
    method: CostBasisMethod,
    position: &mut HoldingPosition,
    sold: Money,
    key: &HoldingKey,
) -> Result<(), PortfolioError> {
    let units = position.remaining_units - sold;
    if units.is_zero() {
        position.remaining_units = units;
        position.remaining_cost_basis = Decimal::ZERO;
        position.lots.clear();
        return Ok(());
    }

    let (removed_cost, lots) = match method {
        CostBasisMethod::AverageCost => {
            let removed = position
                .remaining_cost_basis
                .checked_div(position.remaining_units)
                .and_then(|avg| avg.checked_mul(sold))
                .ok_or_else(|| overflow(key, "average cost"))?;
            (removed, None)
        }
        CostBasisMethod::Fifo => {
            let (removed, lots) =
                consume_lots(&position.lots, sold).ok_or_else(|| overflow(key, "lot cost"))?;
            (removed, Some(lots))
        }
    };
    let cost = position
        .remaining_cost_basis
        .checked_sub(removed_cost)
        .ok_or_else(|| overflow(key, "sale cost"))?;

    position.remaining_units = units;
    position.remaining_cost_basis = cost;
    if let Some(lots) = lots {
        position.lots = lots;
    }
    Ok(())
}

/// Снимает паи с начала очереди партий: возвращает списанную себестоимость
/// и оставшиеся партии, либо `None` при переполнении.
fn consume_lots(lots: &VecDeque<Lot>, sold: Money) -> Option<(Money, VecDeque<Lot>)> {
    let mut lots = lots.clone();
    let mut removed = Decimal::ZERO;
    let mut left = sold;

    while left > Decimal::ZERO {
        let Some(lot) = lots.front_mut() else {
            break;
        };
        if lot.units <= left {
            removed = removed.checked_add(lot.cost)?;
            left -= lot.units;
            lots.pop_front();
        } else {
            let cost = lot.cost.checked_div(lot.units)?.checked_mul(left)?;
            removed = removed.checked_add(cost)?;
            lot.units -= left;
            lot.cost -= cost;
            left = Decimal::ZERO;
        }
    }
    Some((removed, lots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn tx(day: u32, units: Money, amount: Money) -> Transaction {
        Transaction {
            holding_id: "X".into(),
            account: crate::types::AccountId("A".into()),
            units,
            amount,
            date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap() + chrono::Days::new(day.into()),
        }
    }

    fn key() -> HoldingKey {
        HoldingKey::new("A", "X")
    }

    #[test]
    fn purchases_accumulate_exactly() {
        let txs = [
            tx(0, dec!(10), dec!(1000)),
            tx(1, dec!(2.5), dec!(260.75)),
            tx(2, dec!(0.125), dec!(13.1)),
        ];
        let ledger = Ledger::from_transactions(LedgerOptions::default(), &txs).unwrap();
        let pos = ledger.position(&key()).unwrap();
        assert_eq!(pos.remaining_units, dec!(12.625));
        assert_eq!(pos.remaining_cost_basis, dec!(1273.85));
        assert!(ledger.warnings().is_empty());
    }

    #[test]
    fn partial_sale_reduces_at_average_cost() {
        let txs = [tx(0, dec!(10), dec!(1000)), tx(100, dec!(-5), dec!(600))];
        let ledger = Ledger::from_transactions(LedgerOptions::default(), &txs).unwrap();
        let pos = ledger.position(&key()).unwrap();
        assert_eq!(pos.remaining_units, dec!(5));
        assert_eq!(pos.remaining_cost_basis, dec!(500));
    }

    #[test]
    fn full_sale_zeroes_position_and_keeps_it() {
        let txs = [
            tx(0, dec!(3), dec!(100)),
            tx(1, dec!(4), dec!(170)),
            tx(2, dec!(-7), dec!(300)),
        ];
        let ledger = Ledger::from_transactions(LedgerOptions::default(), &txs).unwrap();
        let pos = ledger.position(&key()).unwrap();
        assert_eq!(pos.remaining_units, Decimal::ZERO);
        assert_eq!(pos.remaining_cost_basis, Decimal::ZERO);
        assert_eq!(ledger.positions().len(), 1);
    }

    #[test]
    fn average_cost_stays_within_purchase_prices() {
        let txs = [
            tx(0, dec!(3), dec!(30)),
            tx(1, dec!(-1), dec!(12)),
            tx(2, dec!(7), dec!(140)),
            tx(3, dec!(-4.5), dec!(90)),
            tx(4, dec!(2), dec!(31)),
            tx(5, dec!(-0.3), dec!(5)),
        ];
        let mut ledger = Ledger::new(LedgerOptions::default());
        for t in &txs {
            ledger.apply(t).unwrap();
            let avg = ledger.position(&key()).unwrap().average_cost().unwrap();
            assert!(avg >= dec!(10) && avg <= dec!(20), "avg {avg}");
        }
    }

    #[test]
    fn sale_without_purchase_is_ignored_with_warning() {
        let txs = [tx(0, dec!(-2), dec!(200))];
        let ledger = Ledger::from_transactions(LedgerOptions::default(), &txs).unwrap();
        let pos = ledger.position(&key()).unwrap();
        assert_eq!(pos, &HoldingPosition::default());
        assert_eq!(
            ledger.warnings(),
            [LedgerWarning::SaleExceedsPosition {
                key: key(),
                date: txs[0].date,
                requested: dec!(2),
                held: Decimal::ZERO,
            }]
        );
    }

    #[test]
    fn zero_unit_transaction_is_noop() {
        let txs = [tx(0, dec!(5), dec!(50)), tx(1, Decimal::ZERO, dec!(7))];
        let ledger = Ledger::from_transactions(LedgerOptions::default(), &txs).unwrap();
        let pos = ledger.position(&key()).unwrap();
        assert_eq!(pos.remaining_units, dec!(5));
        assert_eq!(pos.remaining_cost_basis, dec!(50));
    }

    #[test]
    fn clamp_sells_everything_held() {
        let options = LedgerOptions {
            oversell: OversellPolicy::Clamp,
            ..LedgerOptions::default()
        };
        let txs = [tx(0, dec!(5), dec!(50)), tx(1, dec!(-8), dec!(90))];
        let ledger = Ledger::from_transactions(options, &txs).unwrap();
        let pos = ledger.position(&key()).unwrap();
        assert_eq!(pos.remaining_units, Decimal::ZERO);
        assert_eq!(pos.remaining_cost_basis, Decimal::ZERO);
        assert_eq!(ledger.warnings().len(), 1);
    }

    #[test]
    fn reject_fails_on_oversell() {
        let options = LedgerOptions {
            oversell: OversellPolicy::Reject,
            ..LedgerOptions::default()
        };
        let txs = [tx(0, dec!(1), dec!(10)), tx(1, dec!(-2), dec!(20))];
        let err = Ledger::from_transactions(options, &txs).unwrap_err();
        assert!(matches!(
            err,
            PortfolioError::SaleExceedsPosition { requested, held, .. }
                if requested == dec!(2) && held == dec!(1)
        ));
    }

    #[test]
    fn fifo_consumes_oldest_lots_first() {
        let options = LedgerOptions {
            method: CostBasisMethod::Fifo,
            ..LedgerOptions::default()
        };
        let txs = [
            tx(0, dec!(100), dec!(2500)),
            tx(1, dec!(200), dec!(6000)),
            tx(2, dec!(300), dec!(9000)),
            tx(3, dec!(-150), dec!(5000)),
        ];
        let ledger = Ledger::from_transactions(options, &txs).unwrap();
        let pos = ledger.position(&key()).unwrap();
        assert_eq!(pos.remaining_units, dec!(450));
        // 2500 + 50 * 30 списано из первых двух партий
        assert_eq!(pos.remaining_cost_basis, dec!(13500));
        assert_eq!(pos.lots.len(), 2);
        assert_eq!(pos.lots[0].units, dec!(150));
        assert_eq!(pos.lots[0].cost, dec!(4500));
    }

    #[test]
    fn fifo_and_average_differ_on_uneven_prices() {
        let txs = [
            tx(0, dec!(10), dec!(100)),
            tx(1, dec!(10), dec!(300)),
            tx(2, dec!(-10), dec!(350)),
        ];
        let avg = Ledger::from_transactions(LedgerOptions::default(), &txs).unwrap();
        let fifo = Ledger::from_transactions(
            LedgerOptions {
                method: CostBasisMethod::Fifo,
                ..LedgerOptions::default()
            },
            &txs,
        )
        .unwrap();
        assert_eq!(avg.position(&key()).unwrap().remaining_cost_basis, dec!(200));
        assert_eq!(fifo.position(&key()).unwrap().remaining_cost_basis, dec!(300));
    }

    #[test]
    fn overflowing_purchase_is_an_error_and_leaves_position() {
        let txs = [tx(0, dec!(10), Decimal::MAX), tx(1, dec!(1), dec!(1))];
        let mut ledger = Ledger::new(LedgerOptions::default());
        ledger.apply(&txs[0]).unwrap();
        let err = ledger.apply(&txs[1]).unwrap_err();
        assert!(matches!(
            err,
            PortfolioError::Overflow {
                operation: "purchase cost",
                ..
            }
        ));
        let pos = ledger.position(&key()).unwrap();
        assert_eq!(pos.remaining_units, dec!(10));
        assert_eq!(pos.remaining_cost_basis, Decimal::MAX);
    }

    #[test]
    fn overflowing_per_unit_cost_is_an_error_for_both_methods() {
        // себестоимость пая 1e30 не помещается в Decimal
        let txs = [
            tx(0, dec!(0.0000000001), dec!(100000000000000000000)),
            tx(1, dec!(-0.00000000005), dec!(1)),
        ];
        for method in [CostBasisMethod::AverageCost, CostBasisMethod::Fifo] {
            let mut ledger = Ledger::new(LedgerOptions {
                method,
                ..LedgerOptions::default()
            });
            ledger.apply(&txs[0]).unwrap();
            let err = ledger.apply(&txs[1]).unwrap_err();
            assert!(matches!(err, PortfolioError::Overflow { .. }), "{method:?}");
            let pos = ledger.position(&key()).unwrap();
            assert_eq!(pos.remaining_units, dec!(0.0000000001));
        }
    }
}
