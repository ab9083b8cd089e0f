use serde::de::DeserializeOwned;
use tracing::error;

use crate::config::ServerConfig;
use crate::error::{RibbonError, RibbonResult};
use crate::transport::Backend;

#[derive(Deserialize, Debug)]
struct SolrResponse<T> {
    pub docs: Vec<T>,
}

#[derive(Deserialize, Debug)]
struct SolrResponseContainer<T> {
    pub response: SolrResponse<T>,
}

/// One select query against the GOLr index.
#[derive(Debug, Clone)]
pub struct GolrSelect {
    pub q: String,
    pub fq: Vec<String>,
    pub fields: Vec<&'static str>,
    pub rows: u32,
}

impl GolrSelect {
    pub fn new(fq: Vec<String>, fields: Vec<&'static str>, rows: u32) -> GolrSelect {
        GolrSelect {
            q: "*:*".to_owned(),
            fq,
            fields,
            rows,
        }
    }
}

// quote a value for use inside a Solr filter query
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

pub struct GolrClient {
    golr_url: String,
    backend: Backend,
}

impl GolrClient {
    pub fn new(config: &ServerConfig) -> GolrClient {
        GolrClient {
            golr_url: config.golr_url.clone(),
            backend: Backend::new("GOLr", config),
        }
    }

    pub async fn select<T: DeserializeOwned>(&self, select: &GolrSelect) -> RibbonResult<Vec<T>> {
        let url = format!("{}/select", self.golr_url);

        let mut query: Vec<(&str, String)> = vec![
            ("wt", "json".to_owned()),
            ("q", select.q.clone()),
            ("fl", select.fields.join(",")),
            ("rows", select.rows.to_string()),
        ];
        for fq in &select.fq {
            query.push(("fq", fq.clone()));
        }

        let container: SolrResponseContainer<T> =
            self.backend.get_json(&url, &query).await.map_err(|err| {
                error!("GOLr select failed for fq {:?}: {}", select.fq, err);
                err
            })?;

        Ok(container.response.docs)
    }
}

pub fn payload_error(detail: String) -> RibbonError {
    error!("GOLr payload error: {}", detail);
    RibbonError::UpstreamData {
        service: "GOLr",
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes_embedded_quotes() {
        assert_eq!(quote("ZFIN:ZDB-GENE-980526-166"), "\"ZFIN:ZDB-GENE-980526-166\"");
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
    }
}
