//! Параметры командной строки и окружения.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use folio_xirr::{CostBasisMethod, HttpOracleConfig, OversellPolicy};

/// Метод себестоимости в CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    /// Скользящая средняя.
    Average,
    /// Списание ранних партий.
    Fifo,
}

impl From<MethodArg> for CostBasisMethod {
    fn from(value: MethodArg) -> Self {
        match value {
            MethodArg::Average => Self::AverageCost,
            MethodArg::Fifo => Self::Fifo,
        }
    }
}

/// Политика продажи сверх остатка в CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OversellArg {
    /// Пропустить продажу.
    Ignore,
    /// Продать весь остаток.
    Clamp,
    /// Остановить расчёт.
    Reject,
}

impl From<OversellArg> for OversellPolicy {
    fn from(value: OversellArg) -> Self {
        match value {
            OversellArg::Ignore => Self::Ignore,
            OversellArg::Clamp => Self::Clamp,
            OversellArg::Reject => Self::Reject,
        }
    }
}

/// Оценка портфеля паевых фондов и XIRR по JSON-выписке сделок.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Args {
    /// Файл выписки (transaction_detail.json).
    #[arg(env = "TRANSACTIONS_FILE")]
    pub transactions: PathBuf,

    /// JSON-файл с ценами `{ "ISIN": цена }`.
    #[arg(long, env = "PRICES_FILE")]
    pub prices: Option<PathBuf>,

    /// Шаблон адреса API цен, `{isin}` заменяется идентификатором.
    #[arg(long, env = "PRICE_URL", conflicts_with = "prices")]
    pub price_url: Option<String>,

    /// JSON Pointer на поле цены в ответе API.
    #[arg(long, env = "PRICE_POINTER", default_value = "/nav")]
    pub price_pointer: String,

    /// Дата оценки (YYYY-MM-DD), по умолчанию сегодня.
    #[arg(long, env = "AS_OF")]
    pub as_of: Option<NaiveDate>,

    /// Метод расчёта себестоимости.
    #[arg(long, env = "COST_METHOD", value_enum, default_value_t = MethodArg::Average)]
    pub method: MethodArg,

    /// Что делать с продажей сверх остатка.
    #[arg(long, env = "OVERSELL", value_enum, default_value_t = OversellArg::Ignore)]
    pub oversell: OversellArg,

    /// Одновременных запросов цен.
    #[arg(long, env = "PRICE_WORKERS", default_value_t = 8)]
    pub workers: usize,

    /// Таймаут запроса цены, секунд.
    #[arg(long, env = "PRICE_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Повторов запроса цены после ошибки.
    #[arg(long, env = "PRICE_RETRIES", default_value_t = 2)]
    pub retries: u32,

    /// Не сортировать сделки по дате, учитывать в порядке выписки.
    #[arg(long)]
    pub keep_order: bool,
}

impl Args {
    /// Настройки HTTP-источника, если задан адрес.
    pub fn http_oracle(&self) -> Option<HttpOracleConfig> {
        self.price_url.as_ref().map(|url| HttpOracleConfig {
            url_template: url.clone(),
            pointer: self.price_pointer.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            retries: self.retries,
            ..HttpOracleConfig::default()
        })
    }
}

/// Читает `.env` (если есть) и разбирает аргументы.
pub fn load() -> Args {
    let _ = dotenvy::dotenv();
    Args::parse()
}
