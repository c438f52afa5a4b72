//! Преобразование исходной выписки в проверенный поток сделок.

use crate::error::PortfolioError;
use crate::raw::{RawGroup, RawStatement, RawTransaction};
use crate::types::{AccountId, Transaction};
use crate::utils::{parse_date, parse_decimal, text_field};
use serde_json::Value;
use tracing::debug;

impl RawStatement {
    /// Собирает сделки всех групп в один поток в порядке документа.
    ///
    /// Первая же сделка без обязательного поля прерывает разбор.
    pub fn transactions(&self) -> Result<Vec<Transaction>, PortfolioError> {
        let mut out = Vec::new();
        for group in &self.data {
            for raw in &group.transactions {
                out.push(parse_transaction(out.len(), group, raw)?);
            }
        }
        debug!(
            groups = self.data.len(),
            transactions = out.len(),
            "statement parsed"
        );
        Ok(out)
    }
}

fn parse_transaction(
    index: usize,
    group: &RawGroup,
    raw: &RawTransaction,
) -> Result<Transaction, PortfolioError> {
    let missing = |field| PortfolioError::MalformedInput { index, field };

    let holding_id = text_field(&raw.isin).ok_or_else(|| missing("isin"))?;
    let folio = text_field(&raw.folio)
        .or_else(|| text_field(&group.folio))
        .ok_or_else(|| missing("folio"))?;
    let units = parse_decimal(&raw.units, "trxnUnits")?.ok_or_else(|| missing("trxnUnits"))?;
    let amount = parse_decimal(&raw.amount, "trxnAmount")?.ok_or_else(|| missing("trxnAmount"))?;
    let date = match &raw.date {
        Value::String(s) if !s.trim().is_empty() => parse_date(s)?,
        _ => return Err(missing("trxnDate")),
    };

    Ok(Transaction {
        holding_id: holding_id.to_ascii_uppercase(),
        account: AccountId(folio),
        units,
        amount,
        date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn inherits_group_folio() {
        let raw = RawStatement::from_json(
            r#"{"data":[{"folio":"F1","dtTransaction":[
                {"isin":"inf000k01ab1","trxnUnits":"10","trxnAmount":"1000","trxnDate":"01-Jan-2022"}
            ]}]}"#,
        )
        .unwrap();
        let txs = raw.transactions().unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].account, AccountId("F1".into()));
        assert_eq!(txs[0].holding_id, "INF000K01AB1");
        assert_eq!(txs[0].units, dec!(10));
    }

    #[test]
    fn missing_field_fails_fast() {
        let raw = RawStatement::from_json(
            r#"{"data":[{"dtTransaction":[
                {"isin":"X","folio":"F","trxnUnits":1,"trxnAmount":10,"trxnDate":"01-Jan-2022"},
                {"isin":"X","folio":"F","trxnAmount":10,"trxnDate":"02-Jan-2022"}
            ]}]}"#,
        )
        .unwrap();
        let err = raw.transactions().unwrap_err();
        assert!(matches!(
            err,
            PortfolioError::MalformedInput {
                index: 1,
                field: "trxnUnits"
            }
        ));
    }

    #[test]
    fn numeric_folio_is_accepted() {
        let raw = RawStatement::from_json(
            r#"{"data":[{"dtTransaction":[
                {"isin":"X","folio":12345,"trxnUnits":-1.5,"trxnAmount":150,"trxnDate":"2022-03-01"}
            ]}]}"#,
        )
        .unwrap();
        let txs = raw.transactions().unwrap();
        assert_eq!(txs[0].account.0, "12345");
        assert_eq!(txs[0].units, dec!(-1.5));
    }
}
