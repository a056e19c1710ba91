//! Cross-record validation state threaded through the rule checks.
//!
//! Submissions fix some of their own expectations as they are read: the run
//! tag is whatever the first record says it is, and optional sub-task
//! participation is inferred from the first record that reveals it. Both are
//! modeled as explicit two-state machines owned by the checker's record
//! loop, so the freeze point is visible in the control flow.

use runcheck_diagnostics::{ErrorLog, Location, TooManyErrors};

/// Result of observing a run-level value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// First observation: the value is now canonical.
    First,
    /// Matches the canonical value.
    Match,
    /// Deviates from the canonical value, which is carried inside.
    Mismatch(String),
}

/// A run-level tag expected to be identical across every record.
///
/// The first observed value becomes canonical; a deviation in a later record
/// is a finding, never a reason to re-fix the tag.
#[derive(Debug, Clone, Default)]
pub enum Runtag {
    /// Nothing observed yet.
    #[default]
    Unset,
    /// The canonical value, fixed by the first record.
    Fixed(String),
}

impl Runtag {
    /// Observe a value, fixing it on first sight.
    pub fn observe(&mut self, value: &str) -> Observation {
        match self {
            Runtag::Unset => {
                *self = Runtag::Fixed(value.to_owned());
                Observation::First
            }
            Runtag::Fixed(tag) if tag == value => Observation::Match,
            Runtag::Fixed(tag) => Observation::Mismatch(tag.clone()),
        }
    }

    /// Observe a value and log the standard inconsistency error on mismatch.
    /// Returns whether the value was consistent with the canonical one.
    pub fn check(
        &mut self,
        value: &str,
        location: Location,
        log: &mut ErrorLog,
    ) -> Result<bool, TooManyErrors> {
        match self.observe(value) {
            Observation::Mismatch(tag) => {
                log.error(
                    location,
                    format!("Run tag inconsistent (\"{value}\" instead of \"{tag}\")"),
                )?;
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    /// The canonical value, if one has been fixed.
    pub fn value(&self) -> Option<&str> {
        match self {
            Runtag::Unset => None,
            Runtag::Fixed(tag) => Some(tag),
        }
    }
}

/// Whether the submission takes part in an optional sub-task.
///
/// Undetermined until a record reveals the mode; frozen from then on. Later
/// records that contradict the frozen mode are findings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Participation {
    /// No record has revealed the mode yet.
    #[default]
    Undetermined,
    /// The submission participates.
    Yes,
    /// The submission does not participate.
    No,
}

impl Participation {
    /// Freeze the mode if still undetermined; returns the now-current mode.
    pub fn freeze(&mut self, participating: bool) -> Participation {
        if let Participation::Undetermined = self {
            *self = if participating {
                Participation::Yes
            } else {
                Participation::No
            };
        }
        *self
    }

    /// Whether the mode has been frozen.
    pub fn is_determined(&self) -> bool {
        !matches!(self, Participation::Undetermined)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn first_observation_fixes_the_tag() {
        let mut tag = Runtag::default();
        assert_eq!(tag.observe("run-1"), Observation::First);
        assert_eq!(tag.observe("run-1"), Observation::Match);
        assert_eq!(
            tag.observe("run-2"),
            Observation::Mismatch("run-1".to_owned())
        );
        // the canonical value never moves
        assert_eq!(tag.value(), Some("run-1"));
    }

    #[test]
    fn participation_freezes_once() {
        let mut mode = Participation::default();
        assert!(!mode.is_determined());
        assert_eq!(mode.freeze(true), Participation::Yes);
        assert_eq!(mode.freeze(false), Participation::Yes);
        assert!(mode.is_determined());
    }
}
