use std::collections::HashMap;

use tracing::error;

use crate::config::ServerConfig;
use crate::error::{RibbonError, RibbonResult};
use crate::transport::Backend;

// the standard SPARQL JSON results format
#[derive(Deserialize, Debug)]
struct SparqlBoundValue {
    pub value: String,
}

#[derive(Deserialize, Debug)]
struct SparqlResults {
    pub bindings: Vec<HashMap<String, SparqlBoundValue>>,
}

#[derive(Deserialize, Debug)]
struct SparqlResponseContainer {
    pub results: SparqlResults,
}

/// One result row: variable name to bound value.
pub type SparqlRow = HashMap<String, String>;

pub struct SparqlClient {
    sparql_url: String,
    backend: Backend,
}

impl SparqlClient {
    pub fn new(config: &ServerConfig) -> SparqlClient {
        SparqlClient {
            sparql_url: config.sparql_url.clone(),
            backend: Backend::new("SPARQL", config),
        }
    }

    pub async fn select(&self, query: &str) -> RibbonResult<Vec<SparqlRow>> {
        let params = [
            ("query", query.to_owned()),
            ("format", "json".to_owned()),
        ];

        let container: SparqlResponseContainer =
            self.backend.get_json(&self.sparql_url, &params).await.map_err(|err| {
                error!("SPARQL select failed: {}", err);
                err
            })?;

        let rows = container.results.bindings.into_iter()
            .map(|binding| {
                binding.into_iter()
                    .map(|(variable, bound)| (variable, bound.value))
                    .collect()
            })
            .collect();

        Ok(rows)
    }
}

pub fn payload_error(detail: String) -> RibbonError {
    error!("SPARQL payload error: {}", detail);
    RibbonError::UpstreamData {
        service: "SPARQL",
        detail,
    }
}
