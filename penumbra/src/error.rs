use glam::UVec2;
use thiserror::Error;

use crate::QueueKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid config: `{field}` = {value} ({reason})")]
    InvalidConfig {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid resolution: {0}")]
    InvalidResolution(UVec2),

    #[error("`{resource}` has size {actual}, but {expected} was expected")]
    SizeMismatch {
        resource: &'static str,
        expected: UVec2,
        actual: UVec2,
    },

    #[error(
        "`{resource}` is read on the {queue:?} queue before waiting for \
         the queue that wrote it"
    )]
    MissingQueueSync { resource: String, queue: QueueKind },
}

impl Error {
    pub(crate) fn ensure(
        ok: bool,
        field: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Result<()> {
        if ok {
            Ok(())
        } else {
            Err(Self::InvalidConfig {
                field,
                value: value.to_string(),
                reason: reason.into(),
            })
        }
    }

    pub(crate) fn ensure_size(
        resource: &'static str,
        expected: UVec2,
        actual: UVec2,
    ) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::SizeMismatch {
                resource,
                expected,
                actual,
            })
        }
    }
}
