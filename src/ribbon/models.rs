use crate::error::RibbonResult;
use crate::sparql::{payload_error, SparqlClient, SparqlRow};

const MODEL_PREFIX: &str = "http://model.geneontology.org/";

const LIST_MODELS_QUERY: &str = r#"
PREFIX dc: <http://purl.org/dc/elements/1.1/>
PREFIX owl: <http://www.w3.org/2002/07/owl#>
SELECT ?model ?title ?date
WHERE {
    ?model a owl:Ontology ;
           dc:title ?title ;
           dc:date ?date .
    FILTER(STRSTARTS(STR(?model), "http://model.geneontology.org/"))
}
ORDER BY DESC(?date)
"#;

/// One production GO-CAM model, newest first.
#[derive(Serialize, Clone, Debug)]
pub struct GoCamModelSummary {
    pub id: String,
    pub title: String,
    pub date: String,
}

fn row_value(row: &SparqlRow, variable: &str) -> RibbonResult<String> {
    row.get(variable)
        .cloned()
        .ok_or_else(|| payload_error(format!("model row missing ?{}", variable)))
}

// model IRIs are returned in the short gomodel: form
fn contract_model_iri(iri: &str) -> String {
    match iri.strip_prefix(MODEL_PREFIX) {
        Some(local) => format!("gomodel:{}", local),
        None => iri.to_owned(),
    }
}

pub async fn list_models(sparql: &SparqlClient)
                         -> RibbonResult<Vec<GoCamModelSummary>>
{
    let rows = sparql.select(LIST_MODELS_QUERY).await?;

    rows.iter()
        .map(|row| {
            Ok(GoCamModelSummary {
                id: contract_model_iri(&row_value(row, "model")?),
                title: row_value(row, "title")?,
                date: row_value(row, "date")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_model_iri() {
        assert_eq!(contract_model_iri("http://model.geneontology.org/5e72450500001885"),
                   "gomodel:5e72450500001885");
        assert_eq!(contract_model_iri("gomodel:5e72450500001885"),
                   "gomodel:5e72450500001885");
    }

    #[test]
    fn test_row_value_missing_variable() {
        let row = SparqlRow::new();
        assert!(row_value(&row, "model").is_err());
    }
}
