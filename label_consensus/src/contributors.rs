//! Index of the workers and of the labels they contributed to.
//!
//! Labels do not reference their workers and workers do not own labels. The
//! index is built once, after the labels are loaded or resolved.

use chrono::{DateTime, Utc};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::Page;

/// One submission of a worker, located in the pages.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Contribution {
    pub page_id: String,
    pub label_id: String,
    /// The raw value that was submitted. None for an absent value.
    pub value: Option<String>,
    pub created: DateTime<Utc>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ContributorIndex {
    by_user: BTreeMap<String, Vec<Contribution>>,
}

impl ContributorIndex {
    /// Collects every instance of every version. The contributions of a worker
    /// are in chronological order; simultaneous ones keep the input order.
    pub fn build(pages: &[Page]) -> ContributorIndex {
        let mut by_user: BTreeMap<String, Vec<Contribution>> = BTreeMap::new();
        for page in pages.iter() {
            for label in page.labels.iter() {
                for version in label.versions() {
                    for instance in version.instances.iter() {
                        by_user
                            .entry(instance.user_id.clone())
                            .or_default()
                            .push(Contribution {
                                page_id: page.id.clone(),
                                label_id: label.id().to_string(),
                                value: version.value.clone(),
                                created: instance.created,
                            });
                    }
                }
            }
        }
        for contributions in by_user.values_mut() {
            contributions.sort_by_key(|c| c.created);
        }
        debug!("ContributorIndex::build: {} workers", by_user.len());
        ContributorIndex { by_user }
    }

    /// The workers, sorted by id.
    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.by_user.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    pub fn contributions(&self, user_id: &str) -> &[Contribution] {
        self.by_user
            .get(user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// The ids of the labels the worker contributed to.
    pub fn labels_for(&self, user_id: &str) -> BTreeSet<&str> {
        self.contributions(user_id)
            .iter()
            .map(|c| c.label_id.as_str())
            .collect()
    }
}
