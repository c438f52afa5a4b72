//! Источники текущих цен паёв и их параллельная загрузка.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Read;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::PortfolioError;
use crate::types::Money;
use crate::utils::parse_decimal;

/// Источник текущей цены пая по ISIN.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Возвращает цену или `PortfolioError::PriceUnavailable`.
    async fn lookup(&self, holding_id: &str) -> Result<Money, PortfolioError>;
}

fn unavailable(holding_id: &str, reason: impl Into<String>) -> PortfolioError {
    PortfolioError::PriceUnavailable {
        holding_id: holding_id.to_string(),
        reason: reason.into(),
    }
}

/// Отрицательная цена пая считается недоступной для любого источника.
fn valid_price(holding_id: &str, price: Money) -> Result<Money, PortfolioError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(unavailable(holding_id, format!("negative price {price}")));
    }
    Ok(price)
}

/// Цены из заранее известного словаря.
///
/// ISIN хранятся в верхнем регистре, поиск не зависит от регистра.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceOracle {
    prices: HashMap<String, Money>,
}

impl StaticPriceOracle {
    /// Создаёт источник из словаря «ISIN → цена».
    pub fn new(prices: HashMap<String, Money>) -> Self {
        let prices = prices
            .into_iter()
            .map(|(id, price)| (id.to_ascii_uppercase(), price))
            .collect();
        Self { prices }
    }

    /// Читает JSON-объект `{ "ISIN": цена }`; цена — число или строка.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PortfolioError> {
        let map: BTreeMap<String, Value> = serde_json::from_reader(reader)?;
        let mut prices = HashMap::with_capacity(map.len());
        for (id, value) in map {
            if let Some(price) = parse_decimal(&value, "price")? {
                prices.insert(id.to_ascii_uppercase(), price);
            }
        }
        Ok(Self { prices })
    }

    /// Добавляет или заменяет цену.
    pub fn insert(&mut self, holding_id: impl Into<String>, price: Money) {
        let holding_id: String = holding_id.into();
        self.prices.insert(holding_id.to_ascii_uppercase(), price);
    }
}

#[async_trait]
impl PriceOracle for StaticPriceOracle {
    async fn lookup(&self, holding_id: &str) -> Result<Money, PortfolioError> {
        let price = self
            .prices
            .get(&holding_id.to_ascii_uppercase())
            .copied()
            .ok_or_else(|| unavailable(holding_id, "not listed"))?;
        valid_price(holding_id, price)
    }
}

/// Настройки HTTP-источника цен.
#[derive(Debug, Clone)]
pub struct HttpOracleConfig {
    /// Шаблон адреса, `{isin}` заменяется идентификатором.
    pub url_template: String,
    /// JSON Pointer на поле цены в ответе, например `/nav`.
    pub pointer: String,
    /// Таймаут одного запроса.
    pub timeout: Duration,
    /// Число повторов после неудачной попытки.
    pub retries: u32,
    /// Пауза между попытками.
    pub backoff: Duration,
}

impl Default for HttpOracleConfig {
    fn default() -> Self {
        Self {
            url_template: String::new(),
            pointer: "/nav".to_string(),
            timeout: Duration::from_secs(10),
            retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Цены из JSON API, по одному запросу на ISIN.
#[derive(Debug, Clone)]
pub struct HttpPriceOracle {
    client: reqwest::Client,
    config: HttpOracleConfig,
}

impl HttpPriceOracle {
    /// Создаёт клиент с таймаутом из настроек.
    pub fn new(config: HttpOracleConfig) -> Result<Self, PortfolioError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Адрес запроса для конкретного ISIN.
    pub fn price_url(&self, holding_id: &str) -> String {
        self.config.url_template.replace("{isin}", holding_id)
    }

    async fn fetch_once(&self, url: &str, holding_id: &str) -> Result<Money, PortfolioError> {
        let body: Value = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        extract_price(&body, &self.config.pointer, holding_id)
    }
}

/// Достаёт цену из ответа по JSON Pointer.
fn extract_price(body: &Value, pointer: &str, holding_id: &str) -> Result<Money, PortfolioError> {
    let value = body
        .pointer(pointer)
        .ok_or_else(|| unavailable(holding_id, format!("field '{pointer}' missing")))?;
    let price = parse_decimal(value, "price")
        .map_err(|err| unavailable(holding_id, err.to_string()))?
        .ok_or_else(|| unavailable(holding_id, format!("field '{pointer}' empty")))?;
    valid_price(holding_id, price)
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn lookup(&self, holding_id: &str) -> Result<Money, PortfolioError> {
        let url = self.price_url(holding_id);
        let mut attempt = 0;
        loop {
            match self.fetch_once(&url, holding_id).await {
                Ok(price) => return Ok(price),
                // ответ получен, но цены в нём нет: повтор не поможет
                Err(err @ PortfolioError::PriceUnavailable { .. }) => return Err(err),
                Err(err) if attempt < self.config.retries => {
                    attempt += 1;
                    debug!(%holding_id, %url, attempt, error = %err, "price request failed, retrying");
                    tokio::time::sleep(self.config.backoff).await;
                }
                Err(err) => return Err(unavailable(holding_id, err.to_string())),
            }
        }
    }
}

/// Результаты загрузки цен: каждое значение записывается один раз.
///
/// `None` означает, что цену получить не удалось.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceCache {
    prices: BTreeMap<String, Option<Money>>,
}

impl PriceCache {
    /// Записывает результат для ISIN; повторная запись отклоняется.
    pub fn insert(&mut self, holding_id: impl Into<String>, price: Option<Money>) -> bool {
        let holding_id = holding_id.into();
        if self.prices.contains_key(&holding_id) {
            return false;
        }
        self.prices.insert(holding_id, price);
        true
    }

    /// Цена пая; ноль, если она не получена.
    pub fn price(&self, holding_id: &str) -> Money {
        self.prices
            .get(holding_id)
            .copied()
            .flatten()
            .unwrap_or(Decimal::ZERO)
    }

    /// Получена ли цена для ISIN.
    pub fn is_available(&self, holding_id: &str) -> bool {
        matches!(self.prices.get(holding_id), Some(Some(_)))
    }

    /// ISIN без цены, в алфавитном порядке.
    pub fn unavailable(&self) -> Vec<String> {
        self.prices
            .iter()
            .filter(|(_, p)| p.is_none())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Количество записанных ISIN.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Пуст ли кэш.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Загружает цены для различных ISIN, держа не более `workers` запросов одновременно.
///
/// Ошибка источника не прерывает загрузку: ISIN попадает в кэш без цены.
pub async fn fetch_prices<O, I>(oracle: &O, holding_ids: I, workers: usize) -> PriceCache
where
    O: PriceOracle + ?Sized,
    I: IntoIterator<Item = String>,
{
    let ids: BTreeSet<String> = holding_ids.into_iter().collect();
    info!(holdings = ids.len(), workers, "fetching prices");

    let results: Vec<(String, Result<Money, PortfolioError>)> = stream::iter(ids)
        .map(|id| async move {
            let result = oracle.lookup(&id).await;
            (id, result)
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut cache = PriceCache::default();
    for (id, result) in results {
        let price = match result {
            Ok(price) => {
                debug!(holding_id = %id, %price, "price fetched");
                Some(price)
            }
            Err(err) => {
                warn!(holding_id = %id, error = %err, "price unavailable, valued at zero");
                None
            }
        };
        cache.insert(id, price);
    }
    cache
}
