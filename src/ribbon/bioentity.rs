use indexmap::IndexMap;

use crate::annotations::AnnotationFilters;
use crate::config::Config;
use crate::error::{RibbonError, RibbonResult};
use crate::identifier::{normalize_subjects, MyGeneClient};
use crate::solr::{payload_error, quote, GolrClient, GolrSelect};
use crate::types::*;

pub const DEFAULT_ASSOCIATION_ROWS: u32 = 100;

const ASSOCIATION_FIELDS: [&str; 8] =
    ["bioentity", "bioentity_label", "annotation_class",
     "annotation_class_label", "evidence_type", "taxon", "taxon_label",
     "regulates_closure"];

#[derive(Deserialize, Clone, Debug)]
struct GolrAssociationDoc {
    bioentity: Option<SubjectId>,
    bioentity_label: Option<TermLabel>,
    annotation_class: Option<TermId>,
    annotation_class_label: Option<TermLabel>,
    evidence_type: Option<EvidenceCode>,
    taxon: Option<TaxonId>,
    taxon_label: Option<TaxonLabel>,
    #[serde(default)]
    regulates_closure: Vec<TermId>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct AssociationNode {
    pub id: FlexStr,
    pub label: TermLabel,
}

/// One annotation presented as a subject/object pair, the shape the
/// bioentity endpoints return.
#[derive(Serialize, Clone, Debug)]
pub struct Association {
    pub subject: AssociationNode,
    pub object: AssociationNode,
    pub evidence_type: EvidenceCode,
    pub taxon: AssociationNode,
    #[serde(skip)]
    regulates_closure: Vec<TermId>,
}

fn node(id: Option<FlexStr>, label: Option<TermLabel>, what: &str)
        -> RibbonResult<AssociationNode>
{
    let Some(id) = id else {
        return Err(payload_error(format!("association doc missing {}", what)));
    };
    Ok(AssociationNode {
        label: label.unwrap_or_else(|| id.clone()),
        id,
    })
}

impl GolrAssociationDoc {
    fn into_association(self) -> RibbonResult<Association> {
        Ok(Association {
            subject: node(self.bioentity, self.bioentity_label, "bioentity")?,
            object: node(self.annotation_class, self.annotation_class_label,
                         "annotation_class")?,
            evidence_type: self.evidence_type.unwrap_or_default(),
            taxon: node(self.taxon, self.taxon_label, "taxon")?,
            regulates_closure: self.regulates_closure,
        })
    }
}

async fn fetch_associations(golr: &GolrClient, extra_fq: Vec<String>, rows: u32)
                            -> RibbonResult<Vec<Association>>
{
    let mut fq = vec!["document_category:\"annotation\"".to_owned()];
    fq.extend(extra_fq);

    let select = GolrSelect::new(fq, ASSOCIATION_FIELDS.to_vec(), rows);
    let docs: Vec<GolrAssociationDoc> = golr.select(&select).await?;

    docs.into_iter().map(GolrAssociationDoc::into_association).collect()
}

async fn subject_exists(golr: &GolrClient, subject_id: &SubjectId)
                        -> RibbonResult<bool>
{
    let select = GolrSelect::new(
        vec!["document_category:\"bioentity\"".to_owned(),
             format!("bioentity:{}", quote(subject_id))],
        vec!["bioentity"],
        1,
    );
    let docs: Vec<serde_json::Value> = golr.select(&select).await?;
    Ok(!docs.is_empty())
}

/// Annotations of one gene or gene product.  The identifier goes
/// through the same normalization as the ribbon subjects, and the
/// caller's original id is restored in the result.
pub async fn gene_function(golr: &GolrClient, mygene: &MyGeneClient,
                           config: &Config, raw_id: &str, rows: u32,
                           filters: &AnnotationFilters)
                           -> RibbonResult<Vec<Association>>
{
    let normalized =
        normalize_subjects(&[raw_id.to_owned()], config, mygene).await?;
    let Some(subject_id) = normalized.query_ids.first() else {
        return Err(RibbonError::InvalidIdentifier(raw_id.to_owned()));
    };

    let mut fq = vec![format!("bioentity:{}", quote(subject_id))];
    fq.extend(filters.to_fq());
    let mut associations = fetch_associations(golr, fq, rows).await?;

    if associations.is_empty() && !subject_exists(golr, subject_id).await? {
        return Err(RibbonError::DataNotFound(raw_id.to_owned()));
    }

    if let Some(original) = normalized.reverse.get(subject_id) {
        for association in associations.iter_mut() {
            association.subject.id = original.clone();
        }
    }
    Ok(associations)
}

/// Annotations made directly to one term.
pub async fn term_function(golr: &GolrClient, term_id: &str, rows: u32)
                           -> RibbonResult<Vec<Association>>
{
    let fq = vec![format!("annotation_class:{}", quote(term_id))];
    fetch_associations(golr, fq, rows).await
}

fn closure_fq(term_id: &str) -> Vec<String> {
    vec![format!("regulates_closure:{}", quote(term_id))]
}

fn distinct(nodes: impl Iterator<Item = AssociationNode>) -> Vec<AssociationNode> {
    // first occurrence wins, backend order preserved
    let mut seen: IndexMap<FlexStr, AssociationNode> = IndexMap::new();
    for node in nodes {
        seen.entry(node.id.clone()).or_insert(node);
    }
    seen.into_values().collect()
}

/// Distinct genes annotated to a term or its descendants.
pub async fn term_genes(golr: &GolrClient, term_id: &str, rows: u32)
                        -> RibbonResult<Vec<AssociationNode>>
{
    let associations = fetch_associations(golr, closure_fq(term_id), rows).await?;
    Ok(distinct(associations.into_iter().map(|a| a.subject)))
}

/// Distinct taxa with annotations to a term or its descendants.
pub async fn term_taxons(golr: &GolrClient, term_id: &str, rows: u32)
                         -> RibbonResult<Vec<AssociationNode>>
{
    let associations = fetch_associations(golr, closure_fq(term_id), rows).await?;
    Ok(distinct(associations.into_iter().map(|a| a.taxon)))
}

/// One (subject, slim term) cell of the slimmer result.
#[derive(Serialize, Clone, Debug)]
pub struct SlimmerEntry {
    pub subject: SubjectId,
    pub slim: TermId,
    pub assocs: Vec<Association>,
}

fn slim_entries(original_id: &SubjectId, slim_terms: &[TermId],
                associations: &[Association])
                -> Vec<SlimmerEntry>
{
    slim_terms.iter()
        .map(|slim_term| {
            let assocs = associations.iter()
                .filter(|association| {
                    association.regulates_closure.contains(slim_term)
                })
                .cloned()
                .map(|mut association| {
                    association.subject.id = original_id.clone();
                    association
                })
                .collect();
            SlimmerEntry {
                subject: original_id.clone(),
                slim: slim_term.clone(),
                assocs,
            }
        })
        .collect()
}

/// Map each subject's annotations onto a caller-supplied list of slim
/// terms.  Every (subject, term) pair gets an entry, empty or not.
pub async fn slimmer(golr: &GolrClient, mygene: &MyGeneClient, config: &Config,
                     raw_subjects: &[String], slim_terms: &[String], rows: u32,
                     filters: &AnnotationFilters)
                     -> RibbonResult<Vec<SlimmerEntry>>
{
    let normalized = normalize_subjects(raw_subjects, config, mygene).await?;
    let slim_terms: Vec<TermId> =
        slim_terms.iter().map(|term| TermId::from(term.as_str())).collect();

    let fetches = normalized.query_ids.iter().map(|subject_id| {
        let mut fq = vec![format!("bioentity:{}", quote(subject_id))];
        fq.extend(filters.to_fq());
        fetch_associations(golr, fq, rows)
    });
    let per_subject = futures::future::try_join_all(fetches).await?;

    let mut entries = Vec::new();
    for (subject_id, associations) in normalized.query_ids.iter().zip(&per_subject) {
        let original_id =
            normalized.reverse.get(subject_id).unwrap_or(subject_id);
        entries.extend(slim_entries(original_id, &slim_terms, associations));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn association(subject: &str, object: &str, closure: &[&str]) -> Association {
        Association {
            subject: AssociationNode {
                id: subject.into(),
                label: subject.into(),
            },
            object: AssociationNode {
                id: object.into(),
                label: object.into(),
            },
            evidence_type: "IDA".into(),
            taxon: AssociationNode {
                id: "NCBITaxon:7955".into(),
                label: "Danio rerio".into(),
            },
            regulates_closure: closure.iter().map(|t| TermId::from(*t)).collect(),
        }
    }

    #[test]
    fn test_into_association_label_fallback() {
        let doc = GolrAssociationDoc {
            bioentity: Some("ZFIN:ZDB-GENE-980526-166".into()),
            bioentity_label: None,
            annotation_class: Some("GO:0016301".into()),
            annotation_class_label: Some("kinase activity".into()),
            evidence_type: None,
            taxon: Some("NCBITaxon:7955".into()),
            taxon_label: Some("Danio rerio".into()),
            regulates_closure: vec![],
        };
        let association = doc.into_association().unwrap();
        assert_eq!(association.subject.label.as_str(),
                   "ZFIN:ZDB-GENE-980526-166");
        assert_eq!(association.object.label.as_str(), "kinase activity");
        assert_eq!(association.evidence_type.as_str(), "");
    }

    #[test]
    fn test_into_association_missing_ids() {
        let doc = GolrAssociationDoc {
            bioentity: None,
            bioentity_label: None,
            annotation_class: Some("GO:0016301".into()),
            annotation_class_label: None,
            evidence_type: None,
            taxon: None,
            taxon_label: None,
            regulates_closure: vec![],
        };
        assert!(doc.into_association().is_err());
    }

    #[test]
    fn test_distinct_keeps_first_occurrence() {
        let nodes = vec![
            AssociationNode { id: "A:1".into(), label: "first".into() },
            AssociationNode { id: "B:2".into(), label: "second".into() },
            AssociationNode { id: "A:1".into(), label: "duplicate".into() },
        ];
        let distinct_nodes = distinct(nodes.into_iter());
        assert_eq!(distinct_nodes.len(), 2);
        assert_eq!(distinct_nodes[0].label.as_str(), "first");
        assert_eq!(distinct_nodes[1].id.as_str(), "B:2");
    }

    #[test]
    fn test_slim_entries_every_pair_present() {
        let associations = vec![
            association("UniProtKB:P05067", "GO:0016301",
                        &["GO:0016301", "GO:0003824"]),
            association("UniProtKB:P05067", "GO:0008380",
                        &["GO:0008380", "GO:0008150"]),
        ];
        let slim_terms = vec![TermId::from("GO:0003824"),
                              TermId::from("GO:0005215")];

        let entries = slim_entries(&"HGNC:620".into(), &slim_terms,
                                   &associations);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].slim.as_str(), "GO:0003824");
        assert_eq!(entries[0].assocs.len(), 1);
        // the caller's original id appears in the output
        assert_eq!(entries[0].subject.as_str(), "HGNC:620");
        assert_eq!(entries[0].assocs[0].subject.id.as_str(), "HGNC:620");
        // terms with no matches still get an empty cell
        assert_eq!(entries[1].slim.as_str(), "GO:0005215");
        assert!(entries[1].assocs.is_empty());
    }
}
