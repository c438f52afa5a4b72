//! Вспомогательные парсеры чисел и дат из JSON-выписки.

use crate::error::PortfolioError;
use crate::types::Money;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Форматы дат, встречающиеся в выписках; первый — основной.
const DATE_FORMATS: [&str; 2] = ["%d-%b-%Y", "%Y-%m-%d"];

/// Нормализует числовую строку, удаляя пробелы, разделители разрядов и знак плюса.
///
/// Запятая снимается, если в числе есть точка или запятые образуют разряды
/// (`1,000`, `1,00,000`). Иначе она остаётся, и `12,5` не разбирается.
fn normalize_number(input: &str) -> String {
    let compact = input
        .chars()
        .filter(|ch| !matches!(*ch, ' ' | '\u{a0}' | '\u{202f}' | '+'))
        .collect::<String>();
    let compact = compact.trim();
    if compact.contains('.') || is_digit_grouping(compact) {
        compact.replace(',', "")
    } else {
        compact.to_string()
    }
}

/// Целое с запятыми между разрядами: последняя группа из трёх цифр,
/// промежуточные из двух или трёх.
fn is_digit_grouping(number: &str) -> bool {
    let digits = number.strip_prefix('-').unwrap_or(number);
    let groups: Vec<&str> = digits.split(',').collect();
    let [head, middle @ .., last] = groups.as_slice() else {
        return false;
    };
    let all_digits = |group: &str| !group.is_empty() && group.bytes().all(|b| b.is_ascii_digit());
    all_digits(head)
        && head.len() <= 3
        && middle.iter().all(|g| all_digits(g) && matches!(g.len(), 2 | 3))
        && all_digits(last)
        && last.len() == 3
}

/// Разбирает десятичную строку, допуская экспоненциальную запись.
pub fn parse_decimal_str(value: &str, field: &'static str) -> Result<Money, PortfolioError> {
    let normalized = normalize_number(value);
    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .map_err(|_| PortfolioError::Number {
            value: value.trim().to_string(),
            field,
        })
}

/// Разбирает числовое поле, заданное числом или строкой.
///
/// Возвращает `Ok(None)` для `null` и пустой строки.
pub fn parse_decimal(value: &Value, field: &'static str) -> Result<Option<Money>, PortfolioError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => parse_decimal_str(&n.to_string(), field).map(Some),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_decimal_str(s, field).map(Some),
        other => Err(PortfolioError::Number {
            value: other.to_string(),
            field,
        }),
    }
}

/// Извлекает текстовое поле; числа приводятся к строке (номер фолио бывает числом).
pub fn text_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Разбирает дату в формате `dd-Mon-yyyy`, с запасным ISO-форматом.
pub fn parse_date(value: &str) -> Result<NaiveDate, PortfolioError> {
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| PortfolioError::Date {
            value: trimmed.to_string(),
        })
}
