use std::collections::HashMap;

use itertools::Itertools;

use crate::error::RibbonResult;
use crate::ribbon::RibbonSubject;
use crate::slim::Category;
use crate::solr::{quote, GolrClient, GolrSelect};
use crate::types::*;

/// The full ribbon payload: the slim model plus one entry per queried
/// entity, in query order.
#[derive(Serialize, Clone, Debug)]
pub struct RibbonResponse {
    pub categories: Vec<Category>,
    pub subjects: Vec<RibbonSubject>,
}

#[derive(Deserialize, Clone, Debug)]
struct GolrBioentityDoc {
    bioentity: Option<String>,
    bioentity_label: Option<TermLabel>,
    taxon: Option<TaxonId>,
    taxon_label: Option<TaxonLabel>,
}

#[derive(Clone, Debug, Default)]
pub struct SubjectMetadata {
    pub label: TermLabel,
    pub taxon_id: TaxonId,
    pub taxon_label: TaxonLabel,
}

// GOLr stores MGI entity ids with a doubled prefix
fn fixup_mgi(id: &str) -> String {
    match id.strip_prefix("MGI:MGI:") {
        Some(rest) => format!("MGI:{}", rest),
        None => id.to_owned(),
    }
}

async fn fetch_subject_metadata(golr: &GolrClient, subject_ids: &[SubjectId])
                                -> RibbonResult<HashMap<SubjectId, SubjectMetadata>>
{
    if subject_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let id_clause = subject_ids.iter()
        .map(|id| quote(id))
        .join(" OR ");
    let select = GolrSelect::new(
        vec!["document_category:\"bioentity\"".to_owned(),
             format!("bioentity:({})", id_clause)],
        vec!["bioentity", "bioentity_label", "taxon", "taxon_label"],
        subject_ids.len() as u32,
    );

    let docs: Vec<GolrBioentityDoc> = golr.select(&select).await?;

    let mut metadata = HashMap::new();
    for doc in docs {
        let Some(id) = doc.bioentity else {
            continue;
        };
        metadata.insert(SubjectId::from(fixup_mgi(&id)), SubjectMetadata {
            label: doc.bioentity_label.unwrap_or_default(),
            taxon_id: doc.taxon.unwrap_or_default(),
            taxon_label: doc.taxon_label.unwrap_or_default(),
        });
    }
    Ok(metadata)
}

fn apply_metadata(subjects: &mut [RibbonSubject],
                  metadata: &HashMap<SubjectId, SubjectMetadata>)
{
    for subject in subjects.iter_mut() {
        if let Some(found) = metadata.get(&subject.id) {
            subject.label = found.label.clone();
            subject.taxon_id = found.taxon_id.clone();
            subject.taxon_label = found.taxon_label.clone();
        }
    }
}

// callers see the ids they asked with, not the resolved ones
fn restore_ids(subjects: &mut [RibbonSubject],
               reverse: &HashMap<SubjectId, SubjectId>)
{
    for subject in subjects.iter_mut() {
        if let Some(raw_id) = reverse.get(&subject.id) {
            subject.id = raw_id.clone();
        }
    }
}

/// Attach display metadata, drop entities with no matched annotations
/// and map ids back to the caller's originals.
pub async fn assemble(golr: &GolrClient, categories: Vec<Category>,
                      mut subjects: Vec<RibbonSubject>,
                      reverse: &HashMap<SubjectId, SubjectId>)
                      -> RibbonResult<RibbonResponse>
{
    subjects.retain(|subject| subject.nb_annotations > 0);

    let subject_ids: Vec<SubjectId> =
        subjects.iter().map(|subject| subject.id.clone()).collect();
    let metadata = fetch_subject_metadata(golr, &subject_ids).await?;

    apply_metadata(&mut subjects, &metadata);
    restore_ids(&mut subjects, reverse);

    Ok(RibbonResponse {
        categories,
        subjects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn subject(id: &str, nb_annotations: usize) -> RibbonSubject {
        RibbonSubject {
            id: id.into(),
            label: "".into(),
            taxon_id: "".into(),
            taxon_label: "".into(),
            nb_classes: nb_annotations.min(1),
            nb_annotations,
            groups: IndexMap::new(),
        }
    }

    #[test]
    fn test_fixup_mgi() {
        assert_eq!(fixup_mgi("MGI:MGI:97490"), "MGI:97490");
        assert_eq!(fixup_mgi("MGI:97490"), "MGI:97490");
        assert_eq!(fixup_mgi("ZFIN:ZDB-GENE-980526-166"),
                   "ZFIN:ZDB-GENE-980526-166");
    }

    #[test]
    fn test_apply_metadata() {
        let mut subjects = vec![subject("ZFIN:ZDB-GENE-980526-166", 3),
                                subject("FB:FBgn0026379", 1)];
        let mut metadata = HashMap::new();
        metadata.insert(SubjectId::from("ZFIN:ZDB-GENE-980526-166"),
                        SubjectMetadata {
                            label: "shha".into(),
                            taxon_id: "NCBITaxon:7955".into(),
                            taxon_label: "Danio rerio".into(),
                        });

        apply_metadata(&mut subjects, &metadata);

        assert_eq!(subjects[0].label.as_str(), "shha");
        assert_eq!(subjects[0].taxon_label.as_str(), "Danio rerio");
        // unmatched entities keep empty metadata
        assert_eq!(subjects[1].label.as_str(), "");
    }

    #[test]
    fn test_restore_ids() {
        let mut subjects = vec![subject("UniProtKB:P05067", 2),
                                subject("WB:WBGene00004893", 1)];
        let mut reverse = HashMap::new();
        reverse.insert(SubjectId::from("UniProtKB:P05067"),
                       SubjectId::from("HGNC:620"));
        reverse.insert(SubjectId::from("WB:WBGene00004893"),
                       SubjectId::from("WormBase:WBGene00004893"));

        restore_ids(&mut subjects, &reverse);

        assert_eq!(subjects[0].id.as_str(), "HGNC:620");
        assert_eq!(subjects[1].id.as_str(), "WormBase:WBGene00004893");
    }

    #[test]
    fn test_empty_subjects_dropped_in_order() {
        let mut subjects = vec![subject("A:1", 2),
                                subject("B:2", 0),
                                subject("C:3", 1)];
        subjects.retain(|subject| subject.nb_annotations > 0);

        let ids: Vec<&str> =
            subjects.iter().map(|subject| subject.id.as_str()).collect();
        assert_eq!(ids, vec!["A:1", "C:3"]);
    }
}
