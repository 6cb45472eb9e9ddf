use crate::consensus::*;

use chrono::{DateTime, Utc};
use label_consensus::builder::LabelBuilder;
use label_consensus::contributors::ContributorIndex;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use snafu::prelude::*;

/// The format of the timestamps written by labelcons.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct InstanceJs {
    pub user_id: Option<String>,
    pub created: Option<String>,
    #[serde(flatten)]
    pub other: JSMap<String, JSValue>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VersionJs {
    #[serde(default)]
    pub data: JSMap<String, JSValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<u64>,
    #[serde(default)]
    pub instances: Vec<InstanceJs>,
    /// Filled in the output for the versions with a value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,
    #[serde(flatten)]
    pub other: JSMap<String, JSValue>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AssertionJs {
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub data: JSMap<String, JSValue>,
    pub versions: Option<Vec<VersionJs>>,
    #[serde(flatten)]
    pub other: JSMap<String, JSValue>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SubjectJs {
    pub id: Option<String>,
    #[serde(default)]
    pub assertions: Vec<AssertionJs>,
    #[serde(flatten)]
    pub other: JSMap<String, JSValue>,
}

/// The input document. The output document has the same shape.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DocumentJs {
    pub subjects: Vec<SubjectJs>,
    #[serde(flatten)]
    pub other: JSMap<String, JSValue>,
}

pub fn read_document(path: &str) -> ConsensusAppResult<DocumentJs> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    parse_document(&contents)
}

pub fn parse_document(contents: &str) -> ConsensusAppResult<DocumentJs> {
    let doc: DocumentJs = serde_json::from_str(contents).context(ParsingJsonSnafu {})?;
    debug!("parse_document: {} subjects", doc.subjects.len());
    Ok(doc)
}

fn parse_status(status: Option<&str>) -> LabelStatus {
    match status {
        Some("complete") | Some("completed") => LabelStatus::Completed,
        _ => LabelStatus::Pending,
    }
}

// The value held in a data object. Numbers are read as strings.
fn raw_value(data: &JSMap<String, JSValue>) -> Option<String> {
    match data.get("value") {
        Some(JSValue::String(s)) => Some(s.clone()),
        Some(JSValue::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn read_value(data: &JSMap<String, JSValue>, label_id: &str) -> ConsensusAppResult<Option<String>> {
    match data.get("value") {
        None | Some(JSValue::Null) => Ok(None),
        Some(JSValue::String(_)) | Some(JSValue::Number(_)) => Ok(raw_value(data)),
        Some(x) => whatever!("assertion {}: cannot read the value {}", label_id, x),
    }
}

// The value already decided for an assertion. A value that is not a scalar is
// left in the document but not used.
fn prior_value(data: &JSMap<String, JSValue>, label_id: &str) -> Option<String> {
    match data.get("value") {
        Some(x @ JSValue::Array(_)) | Some(x @ JSValue::Object(_)) | Some(x @ JSValue::Bool(_)) => {
            warn!("assertion {}: ignoring the value {}", label_id, x);
            None
        }
        _ => raw_value(data),
    }
}

fn parse_timestamp(value: &str) -> ConsensusAppResult<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(value).context(InvalidTimestampSnafu { value })?;
    Ok(dt.with_timezone(&Utc))
}

fn build_version(label_id: &str, version: &VersionJs) -> ConsensusAppResult<Version> {
    let mut instances: Vec<Instance> = Vec::new();
    for (idx, instance) in version.instances.iter().enumerate() {
        let user_id = instance.user_id.clone().context(MissingFieldSnafu {
            what: format!("user_id of instance #{} of assertion {}", idx, label_id),
        })?;
        let created = instance.created.as_deref().context(MissingFieldSnafu {
            what: format!("created of instance #{} of assertion {}", idx, label_id),
        })?;
        instances.push(Instance {
            user_id,
            created: parse_timestamp(created)?,
        });
    }
    let votes = match version.votes {
        Some(v) => {
            if v != instances.len() as u64 {
                warn!(
                    "assertion {}: version has {} votes but {} instances",
                    label_id,
                    v,
                    instances.len()
                );
            }
            v
        }
        None => instances.len() as u64,
    };
    Ok(Version {
        value: read_value(&version.data, label_id)?,
        votes,
        instances,
    })
}

fn build_label(page_id: &str, idx: usize, assertion: &AssertionJs) -> ConsensusAppResult<Label> {
    let id = assertion.id.clone().context(MissingFieldSnafu {
        what: format!("id of assertion #{} of subject {}", idx, page_id),
    })?;
    let versions = assertion.versions.as_ref().context(MissingFieldSnafu {
        what: format!("versions of assertion {} of subject {}", id, page_id),
    })?;
    let name = assertion.name.clone().unwrap_or_default();
    let mut builder = LabelBuilder::new(&id, &name)
        .context(ConsensusSnafu {})?
        .status(parse_status(assertion.status.as_deref()))
        .value(prior_value(&assertion.data, &id));
    for version in versions.iter() {
        builder
            .add_version(&build_version(&id, version)?)
            .context(ConsensusSnafu {})?;
    }
    Ok(builder.build())
}

/// Builds the pages, in the order of the document.
pub fn build_pages(doc: &DocumentJs) -> ConsensusAppResult<Vec<Page>> {
    let mut pages: Vec<Page> = Vec::new();
    for (sidx, subject) in doc.subjects.iter().enumerate() {
        let page_id = subject.id.clone().context(MissingFieldSnafu {
            what: format!("id of subject #{}", sidx),
        })?;
        let mut labels: Vec<Label> = Vec::new();
        for (aidx, assertion) in subject.assertions.iter().enumerate() {
            labels.push(build_label(&page_id, aidx, assertion)?);
        }
        pages.push(Page {
            id: page_id,
            labels,
        });
    }
    Ok(pages)
}

/// Writes the decisions of the engine back into the document the pages were
/// built from.
pub fn update_document(doc: &mut DocumentJs, pages: &[Page]) -> ConsensusAppResult<()> {
    if doc.subjects.len() != pages.len() {
        whatever!(
            "The document has {} subjects but {} pages were resolved",
            doc.subjects.len(),
            pages.len()
        )
    }
    for (subject, page) in doc.subjects.iter_mut().zip(pages.iter()) {
        if subject.assertions.len() != page.labels.len() {
            whatever!("Subject {}: the labels do not match the assertions", page.id)
        }
        for (assertion, label) in subject.assertions.iter_mut().zip(page.labels.iter()) {
            if label.status() == LabelStatus::Completed {
                assertion.status = Some("completed".to_string());
                if let Some(value) = label.value() {
                    assertion.data.insert("value".to_string(), json!(value));
                }
            }
            if let (Some(versions), Some(analysis)) =
                (assertion.versions.as_mut(), label.analysis())
            {
                for version in versions.iter_mut() {
                    version.normalized = match raw_value(&version.data) {
                        Some(raw) if !raw.is_empty() => {
                            analysis.normalized(&raw).map(|s| s.to_string())
                        }
                        _ => None,
                    };
                }
            }
        }
    }
    Ok(())
}

/// The contributions of every worker, in chronological order.
pub fn contributors_to_json(index: &ContributorIndex) -> JSValue {
    let mut res: JSMap<String, JSValue> = JSMap::new();
    for user in index.users() {
        let contributions: Vec<JSValue> = index
            .contributions(user)
            .iter()
            .map(|c| {
                json!({
                    "subject": c.page_id,
                    "assertion": c.label_id,
                    "value": c.value,
                    "created": c.created.format(TIMESTAMP_FORMAT).to_string(),
                })
            })
            .collect();
        res.insert(user.to_string(), JSValue::Array(contributions));
    }
    JSValue::Object(res)
}
