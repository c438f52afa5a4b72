//! Годовая доходность XIRR методом Ньютона.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;

use crate::error::XirrError;
use crate::types::CashFlowEvent;

const DAYS_PER_YEAR: f64 = 365.0;

/// Сколько раз шаг Ньютона делится пополам, прежде чем ставка признаётся вне области.
const MAX_STEP_HALVINGS: u32 = 50;

/// Настройки поиска корня.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XirrSolver {
    /// Начальное приближение.
    pub guess: f64,
    /// Точность по шагу.
    pub tolerance: f64,
    /// Предельное число итераций.
    pub max_iterations: u32,
    /// Производная по модулю меньше этого значения считается нулевой.
    pub derivative_floor: f64,
}

impl Default for XirrSolver {
    fn default() -> Self {
        Self {
            guess: 0.1,
            tolerance: 1e-10,
            max_iterations: 100,
            derivative_floor: 1e-12,
        }
    }
}

impl XirrSolver {
    /// Ищет ставку `r`, при которой `Σ cf / (1 + r)^(days / 365) = 0`.
    ///
    /// Дни отсчитываются от самой ранней даты, порядок потоков не важен.
    /// Наличие потоков разного знака не проверяется заранее: без смены
    /// знака итерация расходится и возвращается ошибка.
    ///
    /// Шаг, уводящий ставку за `-1`, делится пополам, пока ставка не вернётся
    /// в область определения.
    pub fn solve(&self, flows: &[CashFlowEvent]) -> Result<f64, XirrError> {
        if flows.len() < 2 {
            return Err(XirrError::InsufficientData { count: flows.len() });
        }
        let terms = year_fractions(flows);

        let mut rate = self.guess;
        for _ in 0..self.max_iterations {
            let (npv, derivative) = npv_and_derivative(&terms, rate)?;
            if derivative.abs() < self.derivative_floor {
                return Err(XirrError::ZeroDerivative { rate });
            }

            let mut step = npv / derivative;
            let mut next = rate - step;
            let mut halvings = 0;
            while (!next.is_finite() || next <= -1.0) && halvings < MAX_STEP_HALVINGS {
                step /= 2.0;
                next = rate - step;
                halvings += 1;
            }
            if !next.is_finite() || next <= -1.0 {
                return Err(XirrError::OutOfDomain { rate: next });
            }
            if (next - rate).abs() < self.tolerance {
                return Ok(next);
            }
            rate = next;
        }

        Err(XirrError::NoConvergence {
            iterations: self.max_iterations,
        })
    }
}

/// XIRR с настройками по умолчанию.
#[inline]
pub fn xirr(flows: &[CashFlowEvent]) -> Result<f64, XirrError> {
    XirrSolver::default().solve(flows)
}

/// Пары (сумма, доля года от самой ранней даты).
fn year_fractions(flows: &[CashFlowEvent]) -> Vec<(f64, f64)> {
    let start = flows
        .iter()
        .map(|cf| cf.date)
        .min()
        .unwrap_or(NaiveDate::MIN);
    flows
        .iter()
        .map(|cf| {
            let days = (cf.date - start).num_days() as f64;
            (cf.amount.to_f64().unwrap_or(0.0), days / DAYS_PER_YEAR)
        })
        .collect()
}

/// NPV и её производная по ставке.
fn npv_and_derivative(terms: &[(f64, f64)], rate: f64) -> Result<(f64, f64), XirrError> {
    let base = 1.0 + rate;
    if !base.is_finite() || base <= 0.0 {
        return Err(XirrError::OutOfDomain { rate });
    }

    let mut npv = 0.0;
    let mut derivative = 0.0;
    for &(amount, years) in terms {
        npv += amount * base.powf(-years);
        // d/dr [cf * (1+r)^(-t)] = -t * cf * (1+r)^(-t-1)
        derivative -= years * amount * base.powf(-years - 1.0);
    }

    if !npv.is_finite() || !derivative.is_finite() {
        return Err(XirrError::OutOfDomain { rate });
    }
    Ok((npv, derivative))
}
