use std::collections::HashMap;

use regex::Regex;

use crate::config::{Config, ServerConfig};
use crate::error::{RibbonError, RibbonResult};
use crate::transport::Backend;
use crate::types::*;

// explicit "absent" marker some clients send for missing subjects
pub const ABSENT_SENTINEL: &str = "undefined";

/// What to do with one raw identifier before it can be used as a
/// query key.
#[derive(Debug, PartialEq, Eq)]
pub enum NormalStep {
    /// sentinel value, silently removed from the working set
    Drop,
    /// usable as-is (possibly after prefix rewriting)
    Direct(String),
    /// gene-level id that the annotation index only knows at the
    /// protein level
    ProteinLookup(String),
}

lazy_static! {
    static ref CURIE_RE: Regex =
        Regex::new(r"^(?P<prefix>[\w.-]+):(?P<local>\S+)$").unwrap();
}

pub fn classify(raw_id: &str, config: &Config) -> RibbonResult<NormalStep> {
    if raw_id == ABSENT_SENTINEL {
        return Ok(NormalStep::Drop);
    }

    let captures = CURIE_RE.captures(raw_id)
        .ok_or_else(|| RibbonError::InvalidIdentifier(raw_id.to_owned()))?;

    let prefix = config.alias_prefix(captures.name("prefix").unwrap().as_str());
    let rewritten = format!("{}:{}", prefix, &captures["local"]);

    if config.protein_lookup_prefixes.contains(prefix) {
        Ok(NormalStep::ProteinLookup(rewritten))
    } else {
        Ok(NormalStep::Direct(rewritten))
    }
}

// MyGene.info "uniprot" field is a single accession or a list
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize, Debug)]
struct MyGeneUniprot {
    #[serde(rename = "Swiss-Prot", default)]
    pub swiss_prot: Option<OneOrMany>,
}

#[derive(Deserialize, Debug)]
struct MyGeneHit {
    #[serde(default)]
    pub uniprot: Option<MyGeneUniprot>,
}

#[derive(Deserialize, Debug)]
struct MyGeneResponse {
    #[serde(default)]
    pub hits: Vec<MyGeneHit>,
}

pub struct MyGeneClient {
    mygene_url: String,
    backend: Backend,
}

impl MyGeneClient {
    pub fn new(config: &ServerConfig) -> MyGeneClient {
        MyGeneClient {
            mygene_url: config.mygene_url.clone(),
            backend: Backend::new("MyGene.info", config),
        }
    }

    /// Resolve a gene id to its equivalent protein ids.  Zero results
    /// is not an error.
    pub async fn resolve_proteins(&self, gene_id: &str) -> RibbonResult<Vec<SubjectId>> {
        let url = format!("{}/query", self.mygene_url);
        let params = [
            ("q", gene_id.to_owned()),
            ("fields", "uniprot".to_owned()),
        ];

        let response: MyGeneResponse = self.backend.get_json(&url, &params).await?;

        let mut protein_ids = vec![];
        for hit in response.hits {
            let Some(uniprot) = hit.uniprot else { continue };
            match uniprot.swiss_prot {
                Some(OneOrMany::One(accession)) => {
                    protein_ids.push(format!("UniProtKB:{}", accession).into());
                },
                Some(OneOrMany::Many(accessions)) => {
                    for accession in accessions {
                        protein_ids.push(format!("UniProtKB:{}", accession).into());
                    }
                },
                None => {},
            }
        }

        Ok(protein_ids)
    }
}

/// The normalizer's output: the ids to query with, in input order,
/// plus the protein-to-gene mapping needed to restore caller-supplied
/// forms in the response.
#[derive(Debug, Default)]
pub struct NormalizedSubjects {
    pub query_ids: Vec<SubjectId>,
    pub reverse: HashMap<SubjectId, SubjectId>,
}

// One id is kept for the forward query; every resolved protein gets a
// reverse entry, last resolution winning on collisions.
fn record_resolution(raw_id: &str, resolved: &[SubjectId],
                     normalized: &mut NormalizedSubjects)
{
    if let Some(kept) = resolved.last() {
        for protein_id in resolved {
            normalized.reverse.insert(protein_id.clone(), raw_id.into());
        }
        normalized.query_ids.push(kept.clone());
    } else {
        // unmapped: query with the raw id unchanged
        normalized.query_ids.push(raw_id.into());
    }
}

pub async fn normalize_subjects(raw_ids: &[String], config: &Config,
                                mygene: &MyGeneClient)
                                -> RibbonResult<NormalizedSubjects>
{
    let mut normalized = NormalizedSubjects::default();

    for raw_id in raw_ids {
        match classify(raw_id, config)? {
            NormalStep::Drop => {},
            NormalStep::Direct(query_id) => {
                normalized.query_ids.push(query_id.into());
            },
            NormalStep::ProteinLookup(gene_id) => {
                let resolved = mygene.resolve_proteins(&gene_id).await?;
                record_resolution(&gene_id, &resolved, &mut normalized);
            },
        }
    }

    Ok(normalized)
}
