/// Token data model: the common record, its merge rule, scoring and detail view
pub mod details;
pub mod normalize;
pub mod record;
pub mod scoring;

pub use details::{PairSummary, TokenDetails, TxnCounts};
pub use record::{merge, TokenRecord};
pub use scoring::{rank, score_record};

use serde::{Deserialize, Serialize};

/// One increment of a streaming session: records not seen earlier in the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchBatch {
    pub source: String,
    pub term: String,
    pub new_items: Vec<TokenRecord>,
}
