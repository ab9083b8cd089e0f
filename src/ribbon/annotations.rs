use std::collections::HashSet;

use itertools::Itertools;

use crate::error::RibbonResult;
use crate::solr::{payload_error, GolrClient, GolrSelect};
use crate::types::*;

// excluded when the caller asks for exclude_PB
pub const PROTEIN_BINDING_TERM: &str = "GO:0005515";

// excluded when the caller asks for exclude_IBA and gives no explicit
// evidence allow-list
pub const IBA_EVIDENCE_CODE: &str = "IBA";

// enough for the largest per-gene annotation sets in the index
const ANNOTATION_ROWS: u32 = 100_000;

/// One annotation fact: the subject has evidence for a term, with the
/// term's ancestor closure attached.
#[derive(Clone, Debug)]
pub struct AnnotationRecord {
    pub annotation_class: TermId,
    pub aspect: AspectCode,
    pub evidence_type: EvidenceCode,
    pub regulates_closure: HashSet<TermId>,
}

// raw index document; every field optional so that validation (not
// deserialization) decides what a malformed entry is
#[derive(Deserialize, Debug)]
struct GolrAnnotationDoc {
    pub annotation_class: Option<String>,
    pub aspect: Option<String>,
    pub evidence_type: Option<String>,
    #[serde(default)]
    pub regulates_closure: Vec<String>,
}

impl GolrAnnotationDoc {
    fn validate(self, subject_id: &str) -> RibbonResult<AnnotationRecord> {
        let annotation_class = self.annotation_class.ok_or_else(|| {
            payload_error(format!("annotation for {} has no annotation_class", subject_id))
        })?;
        let aspect = self.aspect.ok_or_else(|| {
            payload_error(format!("annotation {} for {} has no aspect",
                                  annotation_class, subject_id))
        })?;
        let evidence_type = self.evidence_type.ok_or_else(|| {
            payload_error(format!("annotation {} for {} has no evidence_type",
                                  annotation_class, subject_id))
        })?;

        Ok(AnnotationRecord {
            annotation_class: annotation_class.into(),
            aspect: aspect.into(),
            evidence_type: evidence_type.into(),
            regulates_closure: self.regulates_closure.into_iter()
                .map(TermId::from)
                .collect(),
        })
    }
}

/// Optional restrictions on an annotation query, each independently
/// toggleable.
#[derive(Clone, Debug, Default)]
pub struct AnnotationFilters {
    pub ecodes: Vec<String>,
    pub exclude_iba: bool,
    pub exclude_pb: bool,
}

impl AnnotationFilters {
    pub fn to_fq(&self) -> Vec<String> {
        let mut fq = vec![];

        if !self.ecodes.is_empty() {
            let joined = self.ecodes.iter()
                .map(|code| crate::solr::quote(code))
                .join(" OR ");
            fq.push(format!("evidence_type:({})", joined));
        } else if self.exclude_iba {
            fq.push(format!("-evidence_type:{}", crate::solr::quote(IBA_EVIDENCE_CODE)));
        }

        if self.exclude_pb {
            fq.push(format!("-annotation_class:{}", crate::solr::quote(PROTEIN_BINDING_TERM)));
        }

        fq
    }
}

/// Fetch every annotation of one subject, empty when the index has
/// none.
pub async fn fetch_annotations(golr: &GolrClient, subject_id: &SubjectId,
                               filters: &AnnotationFilters)
                               -> RibbonResult<Vec<AnnotationRecord>>
{
    let mut fq = vec![
        "document_category:\"annotation\"".to_owned(),
        format!("bioentity:{}", crate::solr::quote(subject_id.as_str())),
    ];
    fq.extend(filters.to_fq());

    let select = GolrSelect::new(
        fq,
        vec!["annotation_class", "aspect", "evidence_type", "regulates_closure"],
        ANNOTATION_ROWS,
    );

    let docs: Vec<GolrAnnotationDoc> = golr.select(&select).await?;

    docs.into_iter()
        .map(|doc| doc.validate(subject_id.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_ecodes_take_precedence_over_iba() {
        let filters = AnnotationFilters {
            ecodes: vec!["IDA".to_owned(), "IMP".to_owned()],
            exclude_iba: true,
            exclude_pb: false,
        };
        let fq = filters.to_fq();
        assert_eq!(fq, vec!["evidence_type:(\"IDA\" OR \"IMP\")".to_owned()]);
    }

    #[test]
    fn test_filters_iba_and_pb_exclusions() {
        let filters = AnnotationFilters {
            ecodes: vec![],
            exclude_iba: true,
            exclude_pb: true,
        };
        let fq = filters.to_fq();
        assert_eq!(fq, vec![
            "-evidence_type:\"IBA\"".to_owned(),
            "-annotation_class:\"GO:0005515\"".to_owned(),
        ]);
    }

    #[test]
    fn test_validate_rejects_missing_field() {
        let doc = GolrAnnotationDoc {
            annotation_class: Some("GO:0003824".to_owned()),
            aspect: None,
            evidence_type: Some("IDA".to_owned()),
            regulates_closure: vec![],
        };
        assert!(doc.validate("ZFIN:ZDB-GENE-980526-166").is_err());
    }

    #[test]
    fn test_validate_builds_closure_set() {
        let doc = GolrAnnotationDoc {
            annotation_class: Some("GO:0004871".to_owned()),
            aspect: Some("F".to_owned()),
            evidence_type: Some("IDA".to_owned()),
            regulates_closure: vec!["GO:0003674".to_owned(), "GO:0004871".to_owned()],
        };
        let record = doc.validate("ZFIN:ZDB-GENE-980526-166").unwrap();
        assert!(record.regulates_closure.contains(&TermId::from("GO:0003674")));
        assert_eq!(record.regulates_closure.len(), 2);
    }
}
