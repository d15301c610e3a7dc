//! Aggregation error types

use thiserror::Error;

use crate::feed::Collection;

/// Failure of one aggregation run. Cache problems never surface here.
#[derive(Debug, Error)]
pub enum StatsError {
    /// A record set could not be read from the store
    #[error("Failed to fetch {collection}: {source}")]
    Fetch {
        collection: Collection,
        #[source]
        source: anyhow::Error,
    },

    /// The member roster could not be read
    #[error("Failed to load roster: {0}")]
    Roster(#[source] anyhow::Error),
}

impl StatsError {
    pub fn fetch(collection: Collection) -> impl FnOnce(anyhow::Error) -> StatsError {
        move |source| StatsError::Fetch { collection, source }
    }
}

/// Result type for aggregation
pub type StatsResult<T> = Result<T, StatsError>;
