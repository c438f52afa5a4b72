//! Ошибки разбора выписки, учёта позиций и расчёта доходности.

use chrono::NaiveDate;

use crate::types::{HoldingKey, Money};

/// Ошибка разбора выписки или расчёта портфеля.
#[derive(thiserror::Error, Debug)]
pub enum PortfolioError {
    /// Ошибка ввода-вывода при чтении исходного файла.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Некорректный JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Ошибка HTTP-клиента источника цен.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// В сделке отсутствует обязательное поле.
    #[error("Transaction #{index}: required field '{field}' missing")]
    MalformedInput {
        /// Порядковый номер сделки в выписке.
        index: usize,
        /// Имя поля.
        field: &'static str,
    },
    /// Ошибка разбора числового значения.
    #[error("Invalid number '{value}' in field '{field}'")]
    Number {
        /// Некорректное исходное значение.
        value: String,
        /// Имя поля.
        field: &'static str,
    },
    /// Ошибка разбора даты.
    #[error("Invalid date '{value}'")]
    Date {
        /// Некорректная дата.
        value: String,
    },
    /// Продажа превышает учтённый остаток паёв.
    #[error("Sale of {requested} units on {date} exceeds {held} held for {key}")]
    SaleExceedsPosition {
        /// Позиция.
        key: HoldingKey,
        /// Дата сделки.
        date: NaiveDate,
        /// Запрошенное к продаже количество.
        requested: Money,
        /// Остаток на момент продажи.
        held: Money,
    },
    /// Не удалось получить цену пая.
    #[error("Price unavailable for {holding_id}: {reason}")]
    PriceUnavailable {
        /// ISIN фонда.
        holding_id: String,
        /// Причина.
        reason: String,
    },
    /// Результат арифметики вышел за пределы `Decimal`.
    #[error("Arithmetic overflow in {operation} for {key}")]
    Overflow {
        /// Позиция.
        key: HoldingKey,
        /// Операция, на которой произошло переполнение.
        operation: &'static str,
    },
}

/// Ошибка поиска корня XIRR.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum XirrError {
    /// Меньше двух денежных потоков.
    #[error("XIRR needs at least two cash flows, got {count}")]
    InsufficientData {
        /// Количество потоков.
        count: usize,
    },
    /// Производная обнулилась, шаг Ньютона не определён.
    #[error("XIRR derivative vanished at rate {rate}")]
    ZeroDerivative {
        /// Ставка на момент остановки.
        rate: f64,
    },
    /// Ставка вышла из области определения (1 + r <= 0).
    #[error("XIRR iteration left the domain at rate {rate}")]
    OutOfDomain {
        /// Последняя ставка.
        rate: f64,
    },
    /// Метод не сошёлся за отведённое число итераций.
    #[error("XIRR did not converge after {iterations} iterations")]
    NoConvergence {
        /// Число итераций.
        iterations: u32,
    },
}
