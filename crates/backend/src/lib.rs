//! `sr-backend` — HTTP transport for Elasticsearch-style async search.
//!
//! [`AsyncSearchClient`] implements [`SearchTransport`](sr_coordinator::SearchTransport):
//!
//! | attempt | request |
//! |---|---|
//! | submit  | `POST {base}/{index}/_async_search` with the query body |
//! | poll    | `GET {base}/_async_search/{id}` |
//! | release | `DELETE {base}/_async_search/{id}` |
//!
//! Submit and poll carry `wait_for_completion_timeout` and `keep_alive`.

mod async_search;
mod wire;

pub use async_search::AsyncSearchClient;
