use async_trait::async_trait;
use proteus_core::{Fill, MarketEvent};

/// Port for the market data collaborator.
///
/// Events arrive ordered per (asset, timeframe) but delivery is only
/// at-least-once; consumers deduplicate by sample timestamp.
#[async_trait]
pub trait MarketDataFeed: Send {
    /// Next market event, or None once the feed is closed
    async fn next_event(&mut self) -> Option<MarketEvent>;

    /// Feed name for logging
    fn name(&self) -> &str {
        "MarketDataFeed"
    }
}

/// Port for execution results flowing back from the venue
#[async_trait]
pub trait FillFeed: Send {
    /// Next fill, or None once the feed is closed
    async fn next_fill(&mut self) -> Option<Fill>;
}
