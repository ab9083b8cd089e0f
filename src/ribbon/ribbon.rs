use std::collections::HashSet;

use indexmap::IndexMap;

use crate::annotations::{fetch_annotations, AnnotationFilters, AnnotationRecord};
use crate::assemble::{assemble, RibbonResponse};
use crate::config::Config;
use crate::error::RibbonResult;
use crate::identifier::{normalize_subjects, MyGeneClient};
use crate::slim::{Category, SubsetCache};
use crate::solr::GolrClient;
use crate::types::*;

pub const ALL_SUBGROUP: &str = "ALL";

// only the three GO aspects map to categories; anything else never
// matches
fn aspect_category_id(aspect: &str) -> Option<&'static str> {
    match aspect {
        "P" => Some("GO:0008150"),
        "F" => Some("GO:0003674"),
        "C" => Some("GO:0005575"),
        _ => None,
    }
}

fn category_matches(category: &Category, annotation: &AnnotationRecord,
                    cross_aspect: bool) -> bool
{
    let Some(natural_category) = aspect_category_id(annotation.aspect.as_str()) else {
        return false;
    };
    cross_aspect || category.id.as_str() == natural_category
}

/// Counts for one evidence subgroup of one group bucket.  `terms` is
/// populated for the `*-other` buckets only.
#[derive(Serialize, Clone, Debug, Default)]
pub struct SubgroupCounts {
    pub nb_classes: usize,
    pub nb_annotations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<Vec<TermId>>,
}

/// One queried gene/product with its per-group annotation counts.
#[derive(Serialize, Clone, Debug)]
pub struct RibbonSubject {
    pub id: SubjectId,
    pub label: TermLabel,
    pub taxon_id: TaxonId,
    pub taxon_label: TaxonLabel,
    pub nb_classes: usize,
    pub nb_annotations: usize,
    pub groups: IndexMap<GroupKey, IndexMap<EvidenceCode, SubgroupCounts>>,
}

#[derive(Debug, Default)]
struct Bucket {
    term_set: HashSet<TermId>,
    nb_annotations: usize,
}

type BucketMap = IndexMap<GroupKey, IndexMap<EvidenceCode, Bucket>>;

fn accumulate(buckets: &mut BucketMap, group_key: &GroupKey,
              annotation: &AnnotationRecord)
{
    let subgroups = buckets.entry(group_key.clone()).or_default();

    // the ALL roll-up exists before any per-evidence entry
    let all = subgroups.entry(ALL_SUBGROUP.into()).or_default();
    all.term_set.insert(annotation.annotation_class.clone());
    all.nb_annotations += 1;

    let evidence = subgroups.entry(annotation.evidence_type.clone()).or_default();
    evidence.term_set.insert(annotation.annotation_class.clone());
    evidence.nb_annotations += 1;
}

/// Bucket one entity's annotations into the slim's categories and
/// groups.  Display metadata (label, taxon) is filled in later by the
/// assembler.
pub fn aggregate(entity_id: SubjectId, categories: &[Category],
                 annotations: &[AnnotationRecord], cross_aspect: bool)
                 -> RibbonSubject
{
    // membership pass: overall entity counts only
    let mut matched_terms: HashSet<TermId> = HashSet::new();
    let mut nb_annotations = 0;

    for annotation in annotations {
        let counted = categories.iter()
            .filter(|category| category_matches(category, annotation, cross_aspect))
            .flat_map(|category| category.term_groups())
            .any(|group| annotation.regulates_closure.contains(&group.id));

        if counted {
            matched_terms.insert(annotation.annotation_class.clone());
            nb_annotations += 1;
        }
    }

    // bucket passes, per category: the computed All bucket (keyed by
    // the category id) takes every annotation in the category's
    // aspect, the Term-group buckets take closure matches (full
    // cross-product, groups are not mutually exclusive) and the
    // catch-all takes annotations whose closure intersects none of
    // the category's Term groups
    let mut buckets = BucketMap::new();

    for category in categories {
        for annotation in annotations {
            if category_matches(category, annotation, cross_aspect) {
                accumulate(&mut buckets, &category.id, annotation);
            }
        }

        for group in category.term_groups() {
            for annotation in annotations {
                if category_matches(category, annotation, cross_aspect)
                    && annotation.regulates_closure.contains(&group.id)
                {
                    accumulate(&mut buckets, &group.id, annotation);
                }
            }
        }

        let known_terms: HashSet<&TermId> = category.term_groups()
            .map(|group| &group.id)
            .collect();
        let other_key = category.other_key();

        for annotation in annotations {
            if !category_matches(category, annotation, cross_aspect) {
                continue;
            }
            let captured = annotation.regulates_closure.iter()
                .any(|term| known_terms.contains(term));
            if !captured {
                accumulate(&mut buckets, &other_key, annotation);
            }
        }
    }

    // finalize: distinct-term counts everywhere, term lists kept only
    // on the Other buckets
    let groups = buckets.into_iter()
        .map(|(group_key, subgroups)| {
            let keep_terms = group_key.as_str().ends_with("-other");
            let subgroups = subgroups.into_iter()
                .map(|(subgroup_key, bucket)| {
                    let mut terms: Vec<TermId> = bucket.term_set.into_iter().collect();
                    terms.sort();
                    let counts = SubgroupCounts {
                        nb_classes: terms.len(),
                        nb_annotations: bucket.nb_annotations,
                        terms: if keep_terms { Some(terms) } else { None },
                    };
                    (subgroup_key, counts)
                })
                .collect();
            (group_key, subgroups)
        })
        .collect();

    RibbonSubject {
        id: entity_id,
        label: TermLabel::default(),
        taxon_id: TaxonId::default(),
        taxon_label: TaxonLabel::default(),
        nb_classes: matched_terms.len(),
        nb_annotations,
        groups,
    }
}

#[derive(Clone, Debug)]
pub struct RibbonRequest {
    pub subset: String,
    pub subjects: Vec<String>,
    pub filters: AnnotationFilters,
    pub cross_aspect: bool,
}

/// Execute one ribbon query end to end: normalize the subjects, build
/// the slim model, fan out per-subject annotation fetches, aggregate
/// and assemble.  Any subject fetch failure fails the whole request.
pub async fn run_ribbon(golr: &GolrClient, mygene: &MyGeneClient, config: &Config,
                        subsets: &SubsetCache, request: &RibbonRequest)
                        -> RibbonResult<RibbonResponse>
{
    let normalized = normalize_subjects(&request.subjects, config, mygene).await?;
    let categories = subsets.categories(golr, config, &request.subset).await?;

    let fetches = normalized.query_ids.iter()
        .map(|subject_id| fetch_annotations(golr, subject_id, &request.filters));
    let per_subject = futures::future::try_join_all(fetches).await?;

    let subjects: Vec<RibbonSubject> = normalized.query_ids.iter().cloned()
        .zip(per_subject)
        .map(|(subject_id, annotations)| {
            aggregate(subject_id, &categories, &annotations, request.cross_aspect)
        })
        .collect();

    assemble(golr, (*categories).clone(), subjects, &normalized.reverse).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slim::{Group, GroupType};

    fn category(id: &str, label: &str, term_ids: &[&str]) -> Category {
        let mut groups = vec![Group {
            id: id.into(),
            label: format!("all {}", label).into(),
            group_type: GroupType::All,
        }];
        for term_id in term_ids {
            groups.push(Group {
                id: (*term_id).into(),
                label: (*term_id).into(),
                group_type: GroupType::Term,
            });
        }
        groups.push(Group {
            id: format!("{}-other", id).into(),
            label: format!("other {}", label).into(),
            group_type: GroupType::Other,
        });
        Category {
            id: id.into(),
            label: label.into(),
            description: "".into(),
            groups,
        }
    }

    fn annotation(class: &str, aspect: &str, evidence: &str, closure: &[&str])
                  -> AnnotationRecord
    {
        AnnotationRecord {
            annotation_class: class.into(),
            aspect: aspect.into(),
            evidence_type: evidence.into(),
            regulates_closure: closure.iter().map(|t| TermId::from(*t)).collect(),
        }
    }

    fn test_categories() -> Vec<Category> {
        vec![
            category("GO:0003674", "molecular_function",
                     &["GO:0003824", "GO:0005215"]),
            category("GO:0008150", "biological_process", &["GO:0007049"]),
        ]
    }

    fn test_annotations() -> Vec<AnnotationRecord> {
        vec![
            annotation("GO:0016301", "F", "IDA",
                       &["GO:0016301", "GO:0003824", "GO:0003674"]),
            annotation("GO:0016301", "F", "IEA",
                       &["GO:0016301", "GO:0003824", "GO:0003674"]),
            annotation("GO:0015075", "F", "IEA",
                       &["GO:0015075", "GO:0005215", "GO:0003674"]),
            annotation("GO:0000082", "P", "IMP",
                       &["GO:0000082", "GO:0007049", "GO:0008150"]),
            // process annotation no slim term captures
            annotation("GO:0008380", "P", "IDA",
                       &["GO:0008380", "GO:0008150"]),
            // component annotation, no component category in the fixture
            annotation("GO:0005634", "C", "IDA",
                       &["GO:0005634", "GO:0005575"]),
            // unrecognized aspect, never tested anywhere
            annotation("GO:0003824", "X", "IDA",
                       &["GO:0003824", "GO:0003674"]),
        ]
    }

    fn subject() -> RibbonSubject {
        aggregate("ZFIN:ZDB-GENE-980526-166".into(), &test_categories(),
                  &test_annotations(), false)
    }

    #[test]
    fn test_aggregate_group_buckets() {
        let subject = subject();

        // category All buckets take every aspect-matching annotation,
        // captured or not
        let mf_all = &subject.groups[&GroupKey::from("GO:0003674")];
        assert_eq!(mf_all[&EvidenceCode::from(ALL_SUBGROUP)].nb_annotations, 3);
        assert_eq!(mf_all[&EvidenceCode::from(ALL_SUBGROUP)].nb_classes, 2);

        let bp_all = &subject.groups[&GroupKey::from("GO:0008150")];
        assert_eq!(bp_all[&EvidenceCode::from(ALL_SUBGROUP)].nb_annotations, 2);

        let kinase = &subject.groups[&GroupKey::from("GO:0003824")];
        assert_eq!(kinase[&EvidenceCode::from(ALL_SUBGROUP)].nb_annotations, 2);
        assert_eq!(kinase[&EvidenceCode::from(ALL_SUBGROUP)].nb_classes, 1);
        assert_eq!(kinase[&EvidenceCode::from("IDA")].nb_annotations, 1);
        assert_eq!(kinase[&EvidenceCode::from("IEA")].nb_annotations, 1);

        let transport = &subject.groups[&GroupKey::from("GO:0005215")];
        assert_eq!(transport[&EvidenceCode::from(ALL_SUBGROUP)].nb_annotations, 1);

        let cycle = &subject.groups[&GroupKey::from("GO:0007049")];
        assert_eq!(cycle[&EvidenceCode::from("IMP")].nb_annotations, 1);
    }

    #[test]
    fn test_aggregate_entity_counts_cover_matched_only() {
        let subject = subject();

        // the uncaptured process, the component and the unknown-aspect
        // annotations are not counted at the entity level
        assert_eq!(subject.nb_annotations, 4);
        // GO:0016301 is matched twice but counted once
        assert_eq!(subject.nb_classes, 3);
    }

    #[test]
    fn test_aggregate_other_bucket_keeps_terms() {
        let subject = subject();

        let other = &subject.groups[&GroupKey::from("GO:0008150-other")];
        let all = &other[&EvidenceCode::from(ALL_SUBGROUP)];
        assert_eq!(all.nb_annotations, 1);
        assert_eq!(all.terms, Some(vec![TermId::from("GO:0008380")]));

        // captured annotations never reach the catch-all
        assert!(!subject.groups.contains_key(&GroupKey::from("GO:0003674-other")));

        // non-other buckets drop their term lists
        let kinase = &subject.groups[&GroupKey::from("GO:0003824")];
        assert!(kinase[&EvidenceCode::from(ALL_SUBGROUP)].terms.is_none());
    }

    #[test]
    fn test_aggregate_count_consistency() {
        let subject = subject();

        for subgroups in subject.groups.values() {
            for counts in subgroups.values() {
                assert!(counts.nb_classes <= counts.nb_annotations);
                assert!(counts.nb_classes > 0);
            }
        }
    }

    #[test]
    fn test_aggregate_other_bucket_completeness() {
        // per category: term-group buckets plus the catch-all cover
        // exactly the annotations whose aspect maps to the category
        let categories = test_categories();
        let annotations = test_annotations();
        let subject = aggregate("ZFIN:ZDB-GENE-980526-166".into(), &categories,
                                &annotations, false);

        for (category, aspect) in [(&categories[0], "F"), (&categories[1], "P")] {
            let mut covered: HashSet<TermId> = HashSet::new();
            for group in category.term_groups() {
                for annotation in &annotations {
                    if annotation.aspect.as_str() == aspect
                        && annotation.regulates_closure.contains(&group.id)
                    {
                        covered.insert(annotation.annotation_class.clone());
                    }
                }
            }
            if let Some(other) = subject.groups.get(&category.other_key()) {
                for term in other[&EvidenceCode::from(ALL_SUBGROUP)].terms.as_ref().unwrap() {
                    covered.insert(term.clone());
                }
            }

            let expected: HashSet<TermId> = annotations.iter()
                .filter(|annotation| annotation.aspect.as_str() == aspect)
                .map(|annotation| annotation.annotation_class.clone())
                .collect();
            assert_eq!(covered, expected, "category {}", category.id);
        }
    }

    #[test]
    fn test_aggregate_cross_aspect_only_adds() {
        let categories = test_categories();
        let annotations = test_annotations();

        let base = aggregate("X:1".into(), &categories, &annotations, false);
        let crossed = aggregate("X:1".into(), &categories, &annotations, true);

        assert!(crossed.nb_annotations >= base.nb_annotations);
        for (group_key, subgroups) in &base.groups {
            for (subgroup_key, counts) in subgroups {
                let crossed_counts = &crossed.groups[group_key][subgroup_key];
                assert!(crossed_counts.nb_annotations >= counts.nb_annotations);
                assert!(crossed_counts.nb_classes >= counts.nb_classes);
            }
        }

        // the component annotation now reaches both catch-alls
        let mf_other = &crossed.groups[&GroupKey::from("GO:0003674-other")];
        let mf_other_terms =
            mf_other[&EvidenceCode::from(ALL_SUBGROUP)].terms.as_ref().unwrap();
        assert!(mf_other_terms.contains(&TermId::from("GO:0005634")));
    }

    #[test]
    fn test_aggregate_unknown_aspect_excluded_even_cross_aspect() {
        let categories = test_categories();
        let annotations = vec![annotation("GO:0003824", "X", "IDA",
                                          &["GO:0003824", "GO:0003674"])];

        let crossed = aggregate("X:1".into(), &categories, &annotations, true);
        assert_eq!(crossed.nb_annotations, 0);
        assert!(crossed.groups.is_empty());
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let first = serde_json::to_string(&subject()).unwrap();
        let second = serde_json::to_string(&subject()).unwrap();
        assert_eq!(first, second);
    }
}
