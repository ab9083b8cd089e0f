extern crate regex;
extern crate serde_json;
extern crate reqwest;
#[macro_use] extern crate lazy_static;
#[macro_use] extern crate serde_derive;

pub mod types;
pub mod error;
pub mod config;
pub mod transport;
pub mod solr;
pub mod sparql;
pub mod identifier;
pub mod annotations;
pub mod slim;
pub mod ribbon;
pub mod assemble;
pub mod bioentity;
pub mod models;
