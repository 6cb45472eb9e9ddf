pub use crate::config::*;

use chrono::{DateTime, Utc};

/// A builder for assembling a label out of individual submissions.
///
/// Submissions with the same raw value are gathered in the same version, each
/// one adding a vote.
///
/// ```
/// pub use label_consensus::builder::LabelBuilder;
/// # use label_consensus::ConsensusErrors;
/// use chrono::{TimeZone, Utc};
///
/// let mut builder = LabelBuilder::new("label-1", "surname")?;
///
/// let created = Utc.with_ymd_and_hms(2017, 3, 2, 10, 0, 0).unwrap();
/// builder.add_submission("Smith", "worker-1", created)?;
/// builder.add_submission("Smith", "worker-2", created)?;
/// builder.add_submission("Smyth", "worker-3", created)?;
///
/// let label = builder.build();
/// assert_eq!(label.versions().len(), 2);
/// assert_eq!(label.total_votes(), 3);
///
/// # Ok::<(), ConsensusErrors>(())
/// ```
pub struct LabelBuilder {
    pub(crate) _id: String,
    pub(crate) _name: String,
    pub(crate) _status: LabelStatus,
    pub(crate) _value: Option<String>,
    pub(crate) _versions: Vec<Version>,
}

impl LabelBuilder {
    pub fn new(id: &str, name: &str) -> Result<LabelBuilder, ConsensusErrors> {
        if id.is_empty() {
            return Err(ConsensusErrors::EmptyLabelId);
        }
        Ok(LabelBuilder {
            _id: id.to_string(),
            _name: name.to_string(),
            _status: LabelStatus::Pending,
            _value: None,
            _versions: Vec::new(),
        })
    }

    /// The status of the label before any evaluation.
    pub fn status(self, status: LabelStatus) -> LabelBuilder {
        LabelBuilder {
            _status: status,
            ..self
        }
    }

    /// A value that was already resolved before any evaluation.
    pub fn value(self, value: Option<String>) -> LabelBuilder {
        LabelBuilder {
            _value: value,
            ..self
        }
    }

    /// Adds the submission of one worker.
    ///
    /// It is the simplest use case for most cases.
    pub fn add_submission(
        &mut self,
        value: &str,
        user_id: &str,
        created: DateTime<Utc>,
    ) -> Result<(), ConsensusErrors> {
        let instance = Instance {
            user_id: user_id.to_string(),
            created,
        };
        if let Some(version) = self
            ._versions
            .iter_mut()
            .find(|v| v.value.as_deref() == Some(value))
        {
            version.instances.push(instance);
            version.votes += 1;
            return Ok(());
        }
        self.add_version(&Version {
            value: Some(value.to_string()),
            votes: 1,
            instances: vec![instance],
        })
    }

    /// Adds a version, with its aggregated vote count.
    ///
    /// Versions are kept in the order they are added. Two versions may carry
    /// the same raw value, in which case their votes are pooled by the engine.
    pub fn add_version(&mut self, version: &Version) -> Result<(), ConsensusErrors> {
        self._versions.push(version.clone());
        Ok(())
    }

    pub fn build(self) -> Label {
        Label::new(
            &self._id,
            &self._name,
            self._status,
            self._value,
            self._versions,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 3, 2, hour, 0, 0).unwrap()
    }

    #[test]
    fn submissions_are_gathered_by_value() {
        let mut b = LabelBuilder::new("l1", "city").unwrap();
        b.add_submission("Paris", "u1", at(1)).unwrap();
        b.add_submission("paris", "u2", at(2)).unwrap();
        b.add_submission("Paris", "u3", at(3)).unwrap();
        let label = b.build();

        assert_eq!(label.status(), LabelStatus::Pending);
        assert_eq!(label.value(), None);
        assert_eq!(label.versions().len(), 2);
        let paris = &label.versions()[0];
        assert_eq!(paris.votes, 2);
        assert_eq!(paris.votes as usize, paris.instances.len());
        assert_eq!(paris.instances[1].user_id, "u3");
        assert_eq!(label.total_votes(), 3);
    }

    #[test]
    fn empty_submissions_do_not_count() {
        let mut b = LabelBuilder::new("l1", "city").unwrap();
        b.add_submission("", "u1", at(1)).unwrap();
        b.add_submission("Lyon", "u2", at(2)).unwrap();
        let label = b.build();
        assert_eq!(label.versions().len(), 2);
        assert_eq!(label.total_votes(), 1);
        assert!(label.has_answers());
    }

    #[test]
    fn no_versions() {
        let label = LabelBuilder::new("l1", "city")
            .unwrap()
            .status(LabelStatus::Completed)
            .value(Some("Nice".to_string()))
            .build();
        assert_eq!(label.total_votes(), 0);
        assert!(!label.has_answers());
        assert_eq!(label.status(), LabelStatus::Completed);
        assert_eq!(label.value(), Some("Nice"));
    }

    #[test]
    fn empty_id_is_rejected() {
        assert!(matches!(
            LabelBuilder::new("", "city"),
            Err(ConsensusErrors::EmptyLabelId)
        ));
    }
}
