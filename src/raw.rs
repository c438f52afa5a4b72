//! Исходная JSON-выписка регистратора без проверки полей.

use crate::error::PortfolioError;
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;

/// Сделка в том виде, как она записана в выписке.
///
/// Поля не проверяются на этапе чтения: отсутствие обязательного поля
/// обнаруживает парсер и сообщает номер сделки.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransaction {
    /// ISIN фонда.
    #[serde(default)]
    pub isin: Value,
    /// Фолио.
    #[serde(default)]
    pub folio: Value,
    /// Количество паёв со знаком.
    #[serde(default, rename = "trxnUnits")]
    pub units: Value,
    /// Сумма сделки.
    #[serde(default, rename = "trxnAmount")]
    pub amount: Value,
    /// Дата сделки.
    #[serde(default, rename = "trxnDate")]
    pub date: Value,
}

/// Группа сделок (обычно одна схема в одном фолио).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGroup {
    /// Фолио группы, используется, если у сделки своего нет.
    #[serde(default)]
    pub folio: Value,
    /// Сделки группы.
    #[serde(default, rename = "dtTransaction")]
    pub transactions: Vec<RawTransaction>,
}

/// Выписка целиком.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStatement {
    /// Группы сделок.
    #[serde(default)]
    pub data: Vec<RawGroup>,
}

impl RawStatement {
    /// Читает выписку из произвольного `Read`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PortfolioError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Читает выписку из готовой JSON-строки.
    #[inline]
    pub fn from_json(s: &str) -> Result<Self, PortfolioError> {
        Ok(serde_json::from_str(s)?)
    }
}
