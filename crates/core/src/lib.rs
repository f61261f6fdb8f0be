pub mod config;
pub mod saved_queries;
pub mod schema_discovery;
pub mod selection_tree;
pub mod session;
pub mod tabular;
pub mod transcript;

#[must_use]
pub fn domain_name() -> &'static str {
    "askdb-core"
}
