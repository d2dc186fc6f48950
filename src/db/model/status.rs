use serde::{Deserialize, Serialize};

use crate::db::error::{Error, Result};

macro_rules! status_enum {
    ($(#[$attr:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$attr])*
        #[derive(
            Debug,
            Deserialize,
            Serialize,
            strum::Display,
            strum::IntoStaticStr,
            strum::EnumString,
            strum::VariantArray,
            Default,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
        )]
        #[serde(rename_all = "snake_case")]
        #[strum(serialize_all = "snake_case")]
        pub enum $name {
            #[default]
            $($variant),+
        }
    };
}

status_enum!(SeqRequestStatus { Draft, Submitted, Accepted, Rejected });
status_enum!(SampleStatus { Draft, Submitted, Accepted, Prepared, Rejected });
status_enum!(LibraryStatus {
    Draft,
    Submitted,
    Accepted,
    Pooled,
    Stored,
    Sequenced,
    Shared,
    Failed,
    Rejected,
    Archived,
});
status_enum!(PoolStatus { Draft, Submitted, Accepted, Sequenced, Rejected });
status_enum!(ExperimentStatus {
    Draft,
    Loaded,
    Sequencing,
    Finished,
    Failed,
    Archived,
});
status_enum!(DeliveryStatus { Pending, Sent, Failed });

/// The per-kind state machine: an ordered progression plus a failure
/// branch reachable from any non-terminal state. `ordinal` values carry a
/// gap before the failure branch so range checks like "pooled or later"
/// never match a terminal state.
pub trait LifecycleStatus: Copy + Into<&'static str> + PartialEq + 'static {
    const ENTITY: &'static str;

    fn ordinal(self) -> u8;

    fn is_terminal(self) -> bool {
        self.ordinal() >= 10
    }

    fn can_transition_to(self, target: Self) -> bool {
        if self == target || self.is_terminal() {
            return false;
        }

        target.is_terminal() || target.ordinal() > self.ordinal()
    }
}

impl LifecycleStatus for SeqRequestStatus {
    const ENTITY: &'static str = "seq_request";

    fn ordinal(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Submitted => 1,
            Self::Accepted => 2,
            Self::Rejected => 11,
        }
    }

    // Draft and Submitted are re-enterable: staff can send a request back
    // to its owner, and a rejected request can be reset for resubmission.
    fn can_transition_to(self, target: Self) -> bool {
        use SeqRequestStatus::{Accepted, Draft, Rejected, Submitted};

        matches!(
            (self, target),
            (Draft, Submitted)
                | (Submitted, Draft | Accepted | Rejected)
                | (Accepted, Draft | Rejected)
                | (Rejected, Draft)
        )
    }
}

impl LifecycleStatus for SampleStatus {
    const ENTITY: &'static str = "sample";

    fn ordinal(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Submitted => 1,
            Self::Accepted => 2,
            Self::Prepared => 3,
            Self::Rejected => 11,
        }
    }
}

impl LifecycleStatus for LibraryStatus {
    const ENTITY: &'static str = "library";

    fn ordinal(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Submitted => 1,
            Self::Accepted => 2,
            Self::Pooled => 3,
            Self::Stored => 4,
            Self::Sequenced => 5,
            Self::Shared => 6,
            Self::Failed => 10,
            Self::Rejected => 11,
            Self::Archived => 12,
        }
    }
}

impl LibraryStatus {
    /// Whether the library has progressed at least to pooling. Terminal
    /// states are outside the range regardless of how far the library got.
    #[must_use]
    pub fn is_pooled_or_later(self) -> bool {
        !self.is_terminal() && self.ordinal() >= Self::Pooled.ordinal()
    }
}

impl LifecycleStatus for PoolStatus {
    const ENTITY: &'static str = "pool";

    fn ordinal(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Submitted => 1,
            Self::Accepted => 2,
            Self::Sequenced => 3,
            Self::Rejected => 11,
        }
    }
}

impl LifecycleStatus for ExperimentStatus {
    const ENTITY: &'static str = "experiment";

    fn ordinal(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Loaded => 1,
            Self::Sequencing => 2,
            Self::Finished => 3,
            Self::Failed => 10,
            Self::Archived => 12,
        }
    }

    // Run phases cannot be skipped: a flow cell that was never loaded has
    // nothing to sequence.
    fn can_transition_to(self, target: Self) -> bool {
        if self == target || self.is_terminal() {
            return false;
        }

        target.is_terminal() || target.ordinal() == self.ordinal() + 1
    }
}

/// Validates an explicit transition. Cascaded status assignments do not go
/// through here; they follow the request's own validated transition.
pub(crate) fn transition<S: LifecycleStatus>(current: S, target: S) -> Result<S> {
    if current.can_transition_to(target) {
        Ok(target)
    } else {
        Err(Error::invalid_transition(
            S::ENTITY,
            current.into(),
            target.into(),
        ))
    }
}
