pub mod export;
pub mod synthetic;
pub mod tencent;
pub mod types;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::{FeedConfig, ProviderKind};
use crate::error::FetchError;
use crate::event::AppEvent;
use crate::model::bar::Bar;
use crate::model::instrument::InstrumentInfo;

pub use synthetic::SyntheticProvider;
pub use tencent::TencentProvider;

/// Source of daily history and quote metadata for one instrument code.
pub trait MarketDataProvider: Send + Sync {
    fn fetch_history(
        &self,
        instrument: &str,
    ) -> impl Future<Output = Result<Vec<Bar>, FetchError>> + Send;

    fn fetch_info(
        &self,
        instrument: &str,
    ) -> impl Future<Output = Result<InstrumentInfo, FetchError>> + Send;
}

/// Provider selected by `feed.provider`.
#[derive(Debug)]
pub enum Provider {
    Tencent(TencentProvider),
    Synthetic(SyntheticProvider),
}

impl Provider {
    pub fn from_config(cfg: &FeedConfig) -> Result<Self, FetchError> {
        match cfg.provider {
            ProviderKind::Tencent => Ok(Self::Tencent(TencentProvider::from_config(cfg)?)),
            ProviderKind::Synthetic => Ok(Self::Synthetic(SyntheticProvider::default())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Tencent(_) => "tencent",
            Self::Synthetic(_) => "synthetic",
        }
    }
}

impl MarketDataProvider for Provider {
    async fn fetch_history(&self, instrument: &str) -> Result<Vec<Bar>, FetchError> {
        match self {
            Self::Tencent(p) => p.fetch_history(instrument).await,
            Self::Synthetic(p) => p.fetch_history(instrument).await,
        }
    }

    async fn fetch_info(&self, instrument: &str) -> Result<InstrumentInfo, FetchError> {
        match self {
            Self::Tencent(p) => p.fetch_info(instrument).await,
            Self::Synthetic(p) => p.fetch_info(instrument).await,
        }
    }
}

/// Fetch history and info off the UI path; completion arrives as
/// [`AppEvent::HistoryFetched`] and [`AppEvent::InfoFetched`].
pub fn spawn_fetch<P>(provider: Arc<P>, instrument: &str, tx: mpsc::Sender<AppEvent>)
where
    P: MarketDataProvider + 'static,
{
    let instrument = instrument.to_string();
    tokio::spawn(async move {
        let result = provider.fetch_history(&instrument).await;
        match &result {
            Ok(rows) => tracing::info!(instrument = %instrument, count = rows.len(), "Fetched history"),
            Err(e) => tracing::warn!(instrument = %instrument, error = %e, "History fetch failed"),
        }
        let _ = tx
            .send(AppEvent::HistoryFetched {
                instrument: instrument.clone(),
                result,
            })
            .await;

        let result = provider.fetch_info(&instrument).await;
        if let Err(e) = &result {
            tracing::warn!(instrument = %instrument, error = %e, "Info fetch failed");
        }
        let _ = tx.send(AppEvent::InfoFetched { instrument, result }).await;
    });
}
