//! CLI: читает выписку сделок, загружает цены и печатает оценку портфеля.

mod config;

use std::fs::File;

use folio_xirr::{
    HttpPriceOracle, PortfolioReport, PriceOracle, RawStatement, ReportBuilder, StaticPriceOracle,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = config::load();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let raw = RawStatement::from_reader(File::open(&args.transactions)?)?;
    let transactions = raw.transactions()?;
    info!(
        path = %args.transactions.display(),
        transactions = transactions.len(),
        "statement loaded"
    );

    let oracle: Box<dyn PriceOracle> = if let Some(http) = args.http_oracle() {
        Box::new(HttpPriceOracle::new(http)?)
    } else if let Some(path) = &args.prices {
        Box::new(StaticPriceOracle::from_reader(File::open(path)?)?)
    } else {
        warn!("no price source configured, all holdings valued at zero");
        Box::new(StaticPriceOracle::default())
    };

    let mut builder = ReportBuilder::new(&transactions)
        .method(args.method.into())
        .oversell(args.oversell.into())
        .chronological(!args.keep_order);
    if let Some(date) = args.as_of {
        builder = builder.as_of(date);
    }
    let report = builder
        .compute_with_oracle(oracle.as_ref(), args.workers)
        .await?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &PortfolioReport) {
    println!("Оценка на {}", report.as_of);
    for h in &report.holdings {
        println!(
            "  {}: паёв {}, цена {}, стоимость {}, себестоимость {}, доход {}",
            h.key,
            h.units.round_dp(4),
            h.price,
            h.current_value.round_dp(2),
            h.cost_basis.round_dp(2),
            h.gain.round_dp(2)
        );
    }
    println!("Стоимость портфеля: {}", report.total_value.round_dp(2));
    println!("Доход портфеля: {}", report.total_gain.round_dp(2));
    match &report.xirr {
        Ok(rate) => println!("XIRR: {:.2}%", rate * 100.0),
        Err(err) => println!("XIRR: недоступна ({err})"),
    }
    if !report.unavailable_prices.is_empty() {
        println!(
            "Нет цены (оценено в ноль): {}",
            report.unavailable_prices.join(", ")
        );
    }
    for w in &report.warnings {
        println!("Предупреждение: {w}");
    }
}
