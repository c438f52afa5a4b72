//! Оценка позиций по текущим ценам.

use std::collections::BTreeMap;

use crate::error::PortfolioError;
use crate::types::{HoldingKey, HoldingPosition, HoldingValuation, Money, PortfolioSummary};

/// Оценивает каждую позицию и суммирует стоимость и доход.
///
/// `price` возвращает цену пая по ISIN; недоступная цена передаётся как ноль.
/// Переполнение `Decimal` возвращается как `PortfolioError::Overflow`.
pub fn summarize<F>(
    positions: &BTreeMap<HoldingKey, HoldingPosition>,
    price: F,
) -> Result<PortfolioSummary, PortfolioError>
where
    F: Fn(&str) -> Money,
{
    let overflow = |key: &HoldingKey, operation| PortfolioError::Overflow {
        key: key.clone(),
        operation,
    };

    let mut summary = PortfolioSummary::default();
    for (key, pos) in positions {
        let unit_price = price(&key.holding_id);
        let current_value = pos
            .remaining_units
            .checked_mul(unit_price)
            .ok_or_else(|| overflow(key, "market value"))?;
        let gain = current_value
            .checked_sub(pos.remaining_cost_basis)
            .ok_or_else(|| overflow(key, "gain"))?;

        summary.total_value = summary
            .total_value
            .checked_add(current_value)
            .ok_or_else(|| overflow(key, "total value"))?;
        summary.total_gain = summary
            .total_gain
            .checked_add(gain)
            .ok_or_else(|| overflow(key, "total gain"))?;
        summary.holdings.push(HoldingValuation {
            key: key.clone(),
            units: pos.remaining_units,
            cost_basis: pos.remaining_cost_basis,
            price: unit_price,
            current_value,
            gain,
        });
    }
    Ok(summary)
}
