use anyhow::{bail, Context, Result};

use kline_watch::config::Config;
use kline_watch::feed::export::{export_csv, history_file_name};
use kline_watch::feed::{MarketDataProvider, Provider};
use kline_watch::history::CandleHistory;

#[derive(Debug)]
struct FetchSummary {
    code: String,
    status: FetchStatus,
    detail: String,
}

#[derive(Debug, PartialEq, Eq)]
enum FetchStatus {
    Ok,
    Failed,
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().context("failed to load config")?;
    let provider =
        Provider::from_config(&config.feed).context("failed to build market data provider")?;

    let mut results = Vec::new();
    for code in config.feed.instruments() {
        results.push(fetch_one(&provider, &config, &code).await);
    }

    println!("history fetch results ({})", provider.name());
    println!("=============================");

    let mut has_failure = false;
    for result in &results {
        let status = match result.status {
            FetchStatus::Ok => "OK",
            FetchStatus::Failed => {
                has_failure = true;
                "FAILED"
            }
        };
        println!("- {:<8} {:<7} {}", result.code, status, result.detail);
    }

    if has_failure {
        bail!("one or more instruments failed to fetch");
    }

    Ok(())
}

async fn fetch_one(provider: &Provider, config: &Config, code: &str) -> FetchSummary {
    let rows = match provider.fetch_history(code).await {
        Ok(rows) => rows,
        Err(e) => {
            return FetchSummary {
                code: code.to_string(),
                status: FetchStatus::Failed,
                detail: e.to_string(),
            }
        }
    };

    // Sort, dedup and validate without truncating.
    let history = CandleHistory::from_fetched(&rows, rows.len().max(1));
    let path = config.feed.export_dir.join(history_file_name(code));
    match export_csv(&path, history.bars()) {
        Ok(written) => {
            let name = match provider.fetch_info(code).await {
                Ok(info) => info.display_name,
                Err(_) => "---".to_string(),
            };
            let range = history
                .date_range()
                .map(|(a, b)| format!("{} ~ {}", a, b))
                .unwrap_or_default();
            FetchSummary {
                code: code.to_string(),
                status: FetchStatus::Ok,
                detail: format!("{} {} rows {} -> {}", name, written, range, path.display()),
            }
        }
        Err(e) => FetchSummary {
            code: code.to_string(),
            status: FetchStatus::Failed,
            detail: format!("export failed: {}", e),
        },
    }
}
