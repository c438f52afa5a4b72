//! Построение денежных потоков для расчёта XIRR.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::types::{CashFlowEvent, HoldingValuation, Transaction};

/// Денежные потоки: по одному на сделку и по одному итоговому на позицию.
///
/// Покупка (паи > 0) — вложение со знаком минус, всё остальное — получение.
/// Итоговый поток равен рыночной стоимости остатка на дату `as_of`.
/// Порядок: сделки в переданном порядке, затем позиции в порядке `holdings`.
pub fn build_cash_flows<'a, I>(
    transactions: I,
    holdings: &[HoldingValuation],
    as_of: NaiveDate,
) -> Vec<CashFlowEvent>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut flows: Vec<CashFlowEvent> = transactions
        .into_iter()
        .map(|tx| CashFlowEvent {
            amount: if tx.units > Decimal::ZERO {
                -tx.amount
            } else {
                tx.amount
            },
            date: tx.date,
        })
        .collect();

    flows.extend(holdings.iter().map(|h| CashFlowEvent {
        amount: h.current_value,
        date: as_of,
    }));
    flows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, HoldingKey};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn signs_follow_unit_direction() {
        let txs = [
            Transaction {
                holding_id: "X".into(),
                account: AccountId("A".into()),
                units: dec!(10),
                amount: dec!(1000),
                date: date(2022, 1, 1),
            },
            Transaction {
                holding_id: "X".into(),
                account: AccountId("A".into()),
                units: dec!(-5),
                amount: dec!(600),
                date: date(2022, 4, 11),
            },
        ];
        let holdings = [HoldingValuation {
            key: HoldingKey::new("A", "X"),
            units: dec!(5),
            cost_basis: dec!(500),
            price: dec!(130),
            current_value: dec!(650),
            gain: dec!(150),
        }];

        let flows = build_cash_flows(&txs, &holdings, date(2023, 1, 1));
        assert_eq!(
            flows,
            vec![
                CashFlowEvent {
                    amount: dec!(-1000),
                    date: date(2022, 1, 1)
                },
                CashFlowEvent {
                    amount: dec!(600),
                    date: date(2022, 4, 11)
                },
                CashFlowEvent {
                    amount: dec!(650),
                    date: date(2023, 1, 1)
                },
            ]
        );
    }

    #[test]
    fn zeroed_holding_still_emits_terminal_flow() {
        let holdings = [HoldingValuation {
            key: HoldingKey::new("A", "X"),
            units: Decimal::ZERO,
            cost_basis: Decimal::ZERO,
            price: dec!(10),
            current_value: Decimal::ZERO,
            gain: Decimal::ZERO,
        }];
        let flows = build_cash_flows(&Vec::<Transaction>::new(), &holdings, date(2023, 1, 1));
        assert_eq!(flows.len(), 1);
        assert!(flows[0].amount.is_zero());
    }
}
