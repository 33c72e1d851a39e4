mod api_doc_extractor;
mod duckdb;
mod duckdb_keyword_index;
mod duckdb_repository_store;
mod duckdb_snippet_store;
mod duckdb_status_store;
mod duckdb_task_queue;
mod duckdb_vector_index;
mod git_cli_adapter;
mod http_embedding;
mod http_enrichment;
mod mock_chat;
mod mock_embedding;
mod structure_scan;
mod treesitter_slicer;

pub use api_doc_extractor::*;
pub use duckdb::*;
pub use duckdb_keyword_index::*;
pub use duckdb_repository_store::*;
pub use duckdb_snippet_store::*;
pub use duckdb_status_store::*;
pub use duckdb_task_queue::*;
pub use duckdb_vector_index::*;
pub use git_cli_adapter::*;
pub use http_embedding::*;
pub use http_enrichment::*;
pub use mock_chat::*;
pub use mock_embedding::*;
pub use structure_scan::*;
pub use treesitter_slicer::*;
