extern crate getopts;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router, ServiceExt,
};

use axum_extra::extract::Query;

use tracing_subscriber::EnvFilter;

use tower::layer::Layer;

use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use std::{process, sync::Arc};

use getopts::Options;

use ribbon::annotations::AnnotationFilters;
use ribbon::bioentity::{self, DEFAULT_ASSOCIATION_ROWS};
use ribbon::config::Config;
use ribbon::error::{RibbonError, RibbonResult};
use ribbon::identifier::MyGeneClient;
use ribbon::models::list_models;
use ribbon::ribbon::{run_ribbon, RibbonRequest};
use ribbon::slim::SubsetCache;
use ribbon::solr::GolrClient;
use ribbon::sparql::SparqlClient;

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

struct AllState {
    config: Config,
    golr: GolrClient,
    sparql: SparqlClient,
    mygene: MyGeneClient,
    subsets: SubsetCache,
}

fn error_response(err: RibbonError) -> Response {
    let status = match err {
        RibbonError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
        RibbonError::DataNotFound(_) |
        RibbonError::UnknownSlim(_) => StatusCode::NOT_FOUND,
        RibbonError::UpstreamUnavailable { .. } |
        RibbonError::UpstreamData { .. } => StatusCode::BAD_GATEWAY,
    };
    let body = json!({
        "status": err.kind(),
        "detail": err.to_string(),
    });
    (status, Json(body)).into_response()
}

fn json_or_error<T: Serialize>(result: RibbonResult<T>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Deserialize, Debug)]
struct RibbonParams {
    #[serde(default = "default_subset")]
    subset: String,
    #[serde(default)]
    subject: Vec<String>,
    #[serde(default)]
    ecodes: Vec<String>,
    #[serde(rename = "exclude_IBA", default)]
    exclude_iba: bool,
    #[serde(rename = "exclude_PB", default)]
    exclude_pb: bool,
    #[serde(default)]
    cross_aspect: bool,
}

fn default_subset() -> String {
    String::from("goslim_agr")
}

#[derive(Deserialize, Debug)]
struct AssociationParams {
    #[serde(default = "default_rows")]
    rows: u32,
    #[serde(default)]
    ecodes: Vec<String>,
    #[serde(rename = "exclude_IBA", default)]
    exclude_iba: bool,
    #[serde(rename = "exclude_PB", default)]
    exclude_pb: bool,
}

fn default_rows() -> u32 {
    DEFAULT_ASSOCIATION_ROWS
}

#[derive(Deserialize, Debug)]
struct SlimmerParams {
    #[serde(default)]
    subject: Vec<String>,
    #[serde(default)]
    slim: Vec<String>,
    #[serde(default = "default_rows")]
    rows: u32,
    #[serde(default)]
    ecodes: Vec<String>,
    #[serde(rename = "exclude_IBA", default)]
    exclude_iba: bool,
    #[serde(rename = "exclude_PB", default)]
    exclude_pb: bool,
}

fn make_filters(ecodes: Vec<String>, exclude_iba: bool, exclude_pb: bool)
                -> AnnotationFilters
{
    AnnotationFilters {
        ecodes,
        exclude_iba,
        exclude_pb,
    }
}

async fn get_ribbon(State(all_state): State<Arc<AllState>>,
                    Query(params): Query<RibbonParams>) -> Response
{
    let request = RibbonRequest {
        subset: params.subset,
        subjects: params.subject,
        filters: make_filters(params.ecodes, params.exclude_iba,
                              params.exclude_pb),
        cross_aspect: params.cross_aspect,
    };

    json_or_error(run_ribbon(&all_state.golr, &all_state.mygene,
                             &all_state.config, &all_state.subsets,
                             &request).await)
}

async fn get_gene_function(State(all_state): State<Arc<AllState>>,
                           Path(id): Path<String>,
                           Query(params): Query<AssociationParams>) -> Response
{
    let filters = make_filters(params.ecodes, params.exclude_iba,
                               params.exclude_pb);
    json_or_error(bioentity::gene_function(&all_state.golr, &all_state.mygene,
                                           &all_state.config, &id, params.rows,
                                           &filters).await)
}

async fn get_term_function(State(all_state): State<Arc<AllState>>,
                           Path(id): Path<String>,
                           Query(params): Query<AssociationParams>) -> Response
{
    json_or_error(bioentity::term_function(&all_state.golr, &id,
                                           params.rows).await)
}

async fn get_term_genes(State(all_state): State<Arc<AllState>>,
                        Path(id): Path<String>,
                        Query(params): Query<AssociationParams>) -> Response
{
    json_or_error(bioentity::term_genes(&all_state.golr, &id,
                                        params.rows).await)
}

async fn get_term_taxons(State(all_state): State<Arc<AllState>>,
                         Path(id): Path<String>,
                         Query(params): Query<AssociationParams>) -> Response
{
    json_or_error(bioentity::term_taxons(&all_state.golr, &id,
                                         params.rows).await)
}

async fn slimmer_function(State(all_state): State<Arc<AllState>>,
                          Query(params): Query<SlimmerParams>) -> Response
{
    let filters = make_filters(params.ecodes, params.exclude_iba,
                               params.exclude_pb);
    json_or_error(bioentity::slimmer(&all_state.golr, &all_state.mygene,
                                     &all_state.config, &params.subject,
                                     &params.slim, params.rows,
                                     &filters).await)
}

async fn get_subset(State(all_state): State<Arc<AllState>>,
                    Path(id): Path<String>) -> Response
{
    json_or_error(all_state.subsets.categories(&all_state.golr,
                                               &all_state.config, &id).await)
}

async fn get_models(State(all_state): State<Arc<AllState>>) -> Response {
    json_or_error(list_models(&all_state.sparql).await)
}

async fn ping() -> String {
    String::from("OK") + " " + PKG_NAME + " " + VERSION
}

async fn not_found() -> Json<Value> {
    json!({
        "status": "error",
        "reason": "Resource was not found."
    }).into()
}

fn print_usage(program: &str, opts: Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();

    opts.optflag("h", "help", "print this help message");
    opts.optopt("c", "config-file", "Configuration file name", "CONFIG");
    opts.optopt("b", "bind-address-and-port", "The address:port to bind to",
                "BIND_ADDRESS_AND_PORT");

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => panic!("option parsing error: {}", f),
    };

    if matches.opt_present("help") {
        print_usage(&program, opts);
        process::exit(0);
    }
    if !matches.opt_present("config-file") {
        println!("no -c|--config-file option");
        print_usage(&program, opts);
        process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new("ribbon=info,tower_http=warn"))
                .unwrap())
        .init();

    let bind_address_and_port = matches.opt_str("bind-address-and-port");
    let listener =
        if let Some(bind_address_and_port) = bind_address_and_port {
            tokio::net::TcpListener::bind(bind_address_and_port).await.unwrap()
        } else {
            tokio::net::TcpListener::bind("0.0.0.0:8888").await.unwrap()
        };

    let config_file_name = matches.opt_str("c").unwrap();
    let config = Config::read(&config_file_name);

    let all_state = AllState {
        golr: GolrClient::new(&config.server),
        sparql: SparqlClient::new(&config.server),
        mygene: MyGeneClient::new(&config.server),
        subsets: SubsetCache::new(),
        config,
    };

    println!("Starting server ...");
    let app = Router::new()
        .route("/api/ontology/ribbon", get(get_ribbon))
        .route("/api/ontology/subset/{id}", get(get_subset))
        .route("/api/bioentity/gene/{id}/function", get(get_gene_function))
        .route("/api/bioentity/function/{id}", get(get_term_function))
        .route("/api/bioentity/function/{id}/genes", get(get_term_genes))
        .route("/api/bioentity/function/{id}/taxons", get(get_term_taxons))
        .route("/api/bioentityset/slimmer/function", get(slimmer_function))
        .route("/api/gocam/models", get(get_models))
        .route("/ping", get(ping))
        .fallback(not_found)
        .with_state(Arc::new(all_state))
        .layer(TraceLayer::new_for_http());

    let app = NormalizePathLayer::trim_trailing_slash().layer(app);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .await
        .unwrap();
}
