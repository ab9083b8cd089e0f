use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;

use crate::types::*;

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub golr_url: String,
    pub sparql_url: String,
    pub mygene_url: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    // minimum interval between calls to one backend, shared across
    // all requests in the process
    #[serde(default = "default_min_call_interval_ms")]
    pub min_call_interval_ms: u64,
}

fn default_request_timeout_seconds() -> u64 { 30 }
fn default_retry_count() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 500 }
fn default_min_call_interval_ms() -> u64 { 250 }

// one category of a curated slim ordering: the category term and the
// display order of its member terms
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CuratedCategoryOrder {
    pub category: TermId,
    pub terms: Vec<TermId>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    // caller-side prefix conventions rewritten before querying,
    // eg. "WormBase" -> "WB"
    #[serde(default = "default_prefix_aliases")]
    pub prefix_aliases: HashMap<String, String>,
    // prefixes whose ids must be resolved to protein ids before the
    // annotation index can be queried
    #[serde(default = "default_protein_lookup_prefixes")]
    pub protein_lookup_prefixes: HashSet<String>,
    // slim name -> curated category/term ordering.  The single source
    // of truth for the reserved orderings; all other slims keep the
    // backend-returned order.
    #[serde(default = "default_curated_slim_orders")]
    pub curated_slim_orders: HashMap<SlimName, Vec<CuratedCategoryOrder>>,
}

fn default_prefix_aliases() -> HashMap<String, String> {
    let mut aliases = HashMap::new();
    aliases.insert("WormBase".to_owned(), "WB".to_owned());
    aliases.insert("FlyBase".to_owned(), "FB".to_owned());
    aliases
}

fn default_protein_lookup_prefixes() -> HashSet<String> {
    ["HGNC", "NCBIGene", "ENSEMBL"]
        .iter().map(|s| (*s).to_owned()).collect()
}

fn curated_category(category: &str, terms: &[&str]) -> CuratedCategoryOrder {
    CuratedCategoryOrder {
        category: category.into(),
        terms: terms.iter().map(|t| TermId::from(*t)).collect(),
    }
}

// display ordering for the AGR gene page ribbon, curated by the GO
// consortium for the goslim_agr subset only
fn default_curated_slim_orders() -> HashMap<SlimName, Vec<CuratedCategoryOrder>> {
    let agr_order = vec![
        curated_category("GO:0003674", &[
            "GO:0003824", "GO:0030234", "GO:0038023", "GO:0005102", "GO:0005215",
            "GO:0005198", "GO:0008092", "GO:0003677", "GO:0003723", "GO:0001070",
            "GO:0036094", "GO:0046872", "GO:0030246", "GO:0097367", "GO:0008289",
        ]),
        curated_category("GO:0008150", &[
            "GO:0007049", "GO:0016043", "GO:0051234", "GO:0008283", "GO:0030154",
            "GO:0008219", "GO:0032502", "GO:0000003", "GO:0002376", "GO:0050877",
            "GO:0050896", "GO:0023052", "GO:0006259", "GO:0016070", "GO:0019538",
            "GO:0005975", "GO:1901135", "GO:0006629", "GO:0042592", "GO:0009056",
            "GO:0007610",
        ]),
        curated_category("GO:0005575", &[
            "GO:0005576", "GO:0005886", "GO:0045202", "GO:0030054", "GO:0042995",
            "GO:0031410", "GO:0005768", "GO:0005773", "GO:0005794", "GO:0005783",
            "GO:0005829", "GO:0005739", "GO:0005634", "GO:0005694", "GO:0005856",
            "GO:0032991",
        ]),
    ];

    let mut orders = HashMap::new();
    orders.insert(SlimName::from("goslim_agr"), agr_order);
    orders
}

impl Config {
    pub fn read(config_file_name: &str) -> Config {
        let file = match File::open(config_file_name) {
            Ok(file) => file,
            Err(err) => {
                panic!("Failed to read {}: {}\n", config_file_name, err)
            }
        };
        let reader = BufReader::new(file);

        match serde_json::from_reader(reader) {
            Ok(config) => config,
            Err(err) => {
                panic!("failed to parse {}: {}", config_file_name, err)
            },
        }
    }

    pub fn curated_order(&self, slim_name: &str) -> Option<&[CuratedCategoryOrder]> {
        self.curated_slim_orders.get(slim_name).map(|order| order.as_slice())
    }

    // rewrite a caller-side prefix convention to the backend's form
    pub fn alias_prefix<'a>(&'a self, prefix: &'a str) -> &'a str {
        self.prefix_aliases.get(prefix).map(|s| s.as_str()).unwrap_or(prefix)
    }
}

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            golr_url: "http://localhost:8983/solr/golr".to_owned(),
            sparql_url: "http://localhost:3030/blazegraph".to_owned(),
            mygene_url: "http://localhost:9000/v3".to_owned(),
            request_timeout_seconds: default_request_timeout_seconds(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            min_call_interval_ms: default_min_call_interval_ms(),
        },
        prefix_aliases: default_prefix_aliases(),
        protein_lookup_prefixes: default_protein_lookup_prefixes(),
        curated_slim_orders: default_curated_slim_orders(),
    }
}
