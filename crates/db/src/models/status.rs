//! Status helper enums mapping to SMALLINT discriminant columns.
//!
//! Each enum variant's discriminant matches the values documented in
//! the migration that creates the corresponding column.

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Job lifecycle status. Monotonic: a job never regresses.
    JobStatus {
        Pending = 1,
        Processing = 2,
        Completed = 3,
    }
}

define_status_enum! {
    /// Unit (single image) lifecycle status. `Completed` and `Failed`
    /// are terminal; no further mutation follows either.
    UnitStatus {
        Pending = 1,
        Processing = 2,
        Completed = 3,
        Failed = 4,
    }
}

define_status_enum! {
    /// Webhook delivery status for a job's completion notification.
    /// Armed as `NotSent` at intake when a webhook URL is supplied;
    /// `Sent` is terminal and never overwritten.
    NotifyStatus {
        NotSent = 1,
        Sent = 2,
        Failed = 3,
    }
}

impl JobStatus {
    /// Wire name used in API responses and webhook payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
        }
    }

    /// Reverse lookup from a stored discriminant.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(JobStatus::Pending),
            2 => Some(JobStatus::Processing),
            3 => Some(JobStatus::Completed),
            _ => None,
        }
    }
}

impl UnitStatus {
    /// Whether this status is terminal (counts toward job completion).
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitStatus::Completed | UnitStatus::Failed)
    }
}

impl NotifyStatus {
    /// Wire name used in API status responses.
    pub fn as_str(self) -> &'static str {
        match self {
            NotifyStatus::NotSent => "not_sent",
            NotifyStatus::Sent => "sent",
            NotifyStatus::Failed => "failed",
        }
    }

    /// Reverse lookup from a stored discriminant.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(NotifyStatus::NotSent),
            2 => Some(NotifyStatus::Sent),
            3 => Some(NotifyStatus::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_ids_match_migration() {
        assert_eq!(JobStatus::Pending.id(), 1);
        assert_eq!(JobStatus::Processing.id(), 2);
        assert_eq!(JobStatus::Completed.id(), 3);
    }

    #[test]
    fn unit_status_ids_match_migration() {
        assert_eq!(UnitStatus::Pending.id(), 1);
        assert_eq!(UnitStatus::Processing.id(), 2);
        assert_eq!(UnitStatus::Completed.id(), 3);
        assert_eq!(UnitStatus::Failed.id(), 4);
    }

    #[test]
    fn only_completed_and_failed_units_are_terminal() {
        assert!(!UnitStatus::Pending.is_terminal());
        assert!(!UnitStatus::Processing.is_terminal());
        assert!(UnitStatus::Completed.is_terminal());
        assert!(UnitStatus::Failed.is_terminal());
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = NotifyStatus::Sent.into();
        assert_eq!(id, 2);
    }

    #[test]
    fn job_status_round_trips_through_id() {
        for status in [JobStatus::Pending, JobStatus::Processing, JobStatus::Completed] {
            assert_eq!(JobStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(JobStatus::from_id(99), None);
    }
}
