use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::{Config, CuratedCategoryOrder};
use crate::error::{RibbonError, RibbonResult};
use crate::solr::{payload_error, quote, GolrClient, GolrSelect};
use crate::types::*;

const SUBSET_ROWS: u32 = 10_000;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub enum GroupType {
    All,
    Term,
    Other,
}

#[derive(Serialize, Clone, Debug)]
pub struct Group {
    pub id: TermId,
    pub label: TermLabel,
    #[serde(rename = "type")]
    pub group_type: GroupType,
}

/// One top-level slim division with its display groups.  The groups
/// list always carries a synthetic "All" group first and an "Other"
/// group last, wrapped around the slim's own terms in display order.
#[derive(Serialize, Clone, Debug)]
pub struct Category {
    pub id: TermId,
    pub label: TermLabel,
    pub description: TermLabel,
    pub groups: Vec<Group>,
}

impl Category {
    // only Term groups take part in closure membership tests
    pub fn term_groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter().filter(|group| group.group_type == GroupType::Term)
    }

    pub fn other_key(&self) -> GroupKey {
        format!("{}-other", self.id).into()
    }
}

#[derive(Deserialize, Debug)]
struct GolrOntologyClassDoc {
    pub annotation_class: Option<String>,
    pub annotation_class_label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub source: Option<String>,
}

// group subset terms under their source aspect, preserving the
// backend's return order for both sources and terms
fn group_by_source(docs: Vec<GolrOntologyClassDoc>)
                   -> RibbonResult<IndexMap<String, Vec<(TermId, TermLabel)>>>
{
    let mut by_source: IndexMap<String, Vec<(TermId, TermLabel)>> = IndexMap::new();

    for doc in docs {
        let annotation_class = doc.annotation_class.ok_or_else(|| {
            payload_error("subset term with no annotation_class".to_owned())
        })?;
        let source = doc.source.ok_or_else(|| {
            payload_error(format!("subset term {} with no source", annotation_class))
        })?;
        let label = doc.annotation_class_label
            .unwrap_or_else(|| annotation_class.clone());

        by_source.entry(source)
            .or_default()
            .push((annotation_class.into(), label.into()));
    }

    Ok(by_source)
}

// curated slims drop terms missing from the ordering list; everything
// else keeps backend order untouched
fn apply_curated_order(category_id: &TermId, terms: Vec<(TermId, TermLabel)>,
                       orders: &[CuratedCategoryOrder])
                       -> Vec<(TermId, TermLabel)>
{
    let Some(order) = orders.iter().find(|entry| entry.category == *category_id) else {
        return terms;
    };

    let mut labels_by_id: HashMap<TermId, TermLabel> = terms.into_iter().collect();

    order.terms.iter()
        .filter_map(|term_id| {
            labels_by_id.remove(term_id).map(|label| (term_id.clone(), label))
        })
        .collect()
}

fn make_category(category_id: TermId, source: &str, description: TermLabel,
                 terms: Vec<(TermId, TermLabel)>)
                 -> Category
{
    let mut groups = Vec::with_capacity(terms.len() + 2);

    groups.push(Group {
        id: category_id.clone(),
        label: format!("all {}", source).into(),
        group_type: GroupType::All,
    });
    for (id, label) in terms {
        groups.push(Group {
            id,
            label,
            group_type: GroupType::Term,
        });
    }
    groups.push(Group {
        id: format!("{}-other", category_id).into(),
        label: format!("other {}", source).into(),
        group_type: GroupType::Other,
    });

    Category {
        id: category_id,
        label: source.into(),
        description,
        groups,
    }
}

// the category term itself is found by matching its label against the
// ontology-class index
async fn fetch_source_metadata(golr: &GolrClient, source: &str)
                               -> RibbonResult<Option<(TermId, TermLabel)>>
{
    let select = GolrSelect::new(
        vec![
            "document_category:\"ontology_class\"".to_owned(),
            format!("annotation_class_label:{}", quote(source)),
        ],
        vec!["annotation_class", "description"],
        1,
    );

    let docs: Vec<GolrOntologyClassDoc> = golr.select(&select).await?;
    let Some(doc) = docs.into_iter().next() else {
        return Ok(None);
    };

    let category_id = doc.annotation_class.ok_or_else(|| {
        payload_error(format!("category for source {} has no annotation_class", source))
    })?;

    Ok(Some((category_id.into(), doc.description.unwrap_or_default().into())))
}

/// Build the ordered category/group model defining one slim.
pub async fn build_categories(golr: &GolrClient, config: &Config, slim_name: &str)
                              -> RibbonResult<Vec<Category>>
{
    let select = GolrSelect::new(
        vec![
            "document_category:\"ontology_class\"".to_owned(),
            format!("subset:{}", quote(slim_name)),
        ],
        vec!["annotation_class", "annotation_class_label", "source"],
        SUBSET_ROWS,
    );

    let docs: Vec<GolrOntologyClassDoc> = golr.select(&select).await?;
    if docs.is_empty() {
        return Err(RibbonError::UnknownSlim(slim_name.to_owned()));
    }

    let by_source = group_by_source(docs)?;
    let curated = config.curated_order(slim_name);

    let mut categories = vec![];
    for (source, terms) in by_source {
        let Some((category_id, description)) = fetch_source_metadata(golr, &source).await? else {
            warn!("no ontology class found for subset source {:?}, skipping", source);
            continue;
        };

        let terms = match curated {
            Some(orders) => apply_curated_order(&category_id, terms, orders),
            None => terms,
        };

        categories.push(make_category(category_id, &source, description, terms));
    }

    if categories.is_empty() {
        return Err(RibbonError::UnknownSlim(slim_name.to_owned()));
    }

    Ok(categories)
}

/// Read-through cache of built category models, keyed by slim name.
/// Created once at service startup and shared across requests; entries
/// are appended under the lock and never invalidated.  Failed builds
/// are not cached, so an unknown slim is re-checked on each request.
#[derive(Default)]
pub struct SubsetCache {
    entries: Mutex<HashMap<SlimName, Arc<Vec<Category>>>>,
}

impl SubsetCache {
    pub fn new() -> SubsetCache {
        SubsetCache::default()
    }

    pub async fn categories(&self, golr: &GolrClient, config: &Config,
                            slim_name: &str)
                            -> RibbonResult<Arc<Vec<Category>>>
    {
        let mut entries = self.entries.lock().await;
        if let Some(found) = entries.get(slim_name) {
            return Ok(found.clone());
        }

        let built = Arc::new(build_categories(golr, config, slim_name).await?);
        entries.insert(SlimName::from(slim_name), built.clone());
        Ok(built)
    }
}
