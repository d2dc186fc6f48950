use serde::Serialize;
use uuid::Uuid;
use valuable::Valuable;

#[derive(thiserror::Error, Debug, Serialize, Valuable, Clone)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Error {
    #[error("{entity} with id {id} does not exist")]
    ElementDoesNotExist { entity: String, id: String },
    #[error("{left_entity} {left_id} and {right_entity} {right_id} are already linked")]
    LinkAlreadyExists {
        left_entity: String,
        left_id: String,
        right_entity: String,
        right_id: String,
    },
    #[error("{left_entity} {left_id} and {right_entity} {right_id} are not linked")]
    LinkDoesNotExist {
        left_entity: String,
        left_id: String,
        right_entity: String,
        right_id: String,
    },
    #[error("{message}")]
    InvalidValue { message: String },
    #[error("{entity} cannot transition from {from} to {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },
    #[error("{entity} with {field} = {value} already exists")]
    NotUniqueValue {
        entity: String,
        field: String,
        value: String,
    },
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::ElementDoesNotExist {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn link_already_exists(
        left_entity: &'static str,
        left_id: impl ToString,
        right_entity: &'static str,
        right_id: impl ToString,
    ) -> Self {
        Self::LinkAlreadyExists {
            left_entity: left_entity.to_string(),
            left_id: left_id.to_string(),
            right_entity: right_entity.to_string(),
            right_id: right_id.to_string(),
        }
    }

    pub(crate) fn link_does_not_exist(
        left_entity: &'static str,
        left_id: impl ToString,
        right_entity: &'static str,
        right_id: impl ToString,
    ) -> Self {
        Self::LinkDoesNotExist {
            left_entity: left_entity.to_string(),
            left_id: left_id.to_string(),
            right_entity: right_entity.to_string(),
            right_id: right_id.to_string(),
        }
    }

    pub(crate) fn invalid_value(message: impl ToString) -> Self {
        Self::InvalidValue {
            message: message.to_string(),
        }
    }

    pub(crate) fn invalid_transition(
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    ) -> Self {
        Self::InvalidTransition {
            entity: entity.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub(crate) fn not_unique(
        entity: &'static str,
        field: &'static str,
        value: impl ToString,
    ) -> Self {
        Self::NotUniqueValue {
            entity: entity.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

impl From<garde::Report> for Error {
    fn from(report: garde::Report) -> Self {
        Self::InvalidValue {
            message: report.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
