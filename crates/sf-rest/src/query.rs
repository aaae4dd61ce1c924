//! SOQL query wire types.

use serde::Deserialize;

/// One page of a REST query response.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResult<T> {
    #[serde(rename = "totalSize")]
    pub total_size: u64,
    pub done: bool,
    /// Path of the next page; absent on the last page.
    #[serde(rename = "nextRecordsUrl")]
    pub next_records_url: Option<String>,
    pub records: Vec<T>,
}

/// Options for query execution.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Page size hint (Sforce-Query-Options header), 200 to 2000.
    pub batch_size: Option<u32>,
    /// Include deleted and archived records (queryAll endpoint).
    pub include_deleted: bool,
}
