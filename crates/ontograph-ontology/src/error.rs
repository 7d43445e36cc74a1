use crate::model::ElementKind;
use ontograph_graph::GraphError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OntologyError {
    #[error("access denied for {user}: {reason}")]
    AccessDenied { user: String, reason: String },

    #[error("required {kind} not found: {iri}")]
    RequiredElementMissing { kind: ElementKind, iri: String },

    #[error("ontology corruption: {0}")]
    Corruption(String),

    #[error("failed to import {document}: {message}")]
    ImportFailure { document: String, message: String },

    #[error("graph gateway error: {0}")]
    Gateway(#[from] GraphError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl OntologyError {
    pub(crate) fn denied(user: Option<&crate::auth::User>, reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            user: user.map_or_else(|| "<anonymous>".to_string(), |u| u.id().to_string()),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(kind: ElementKind, iri: impl Into<String>) -> Self {
        Self::RequiredElementMissing {
            kind,
            iri: iri.into(),
        }
    }

    pub(crate) fn import(document: impl Into<String>, message: impl ToString) -> Self {
        Self::ImportFailure {
            document: document.into(),
            message: message.to_string(),
        }
    }

    /// HTTP-equivalent status for web-layer callers.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AccessDenied { .. } => 403,
            Self::RequiredElementMissing { .. } => 404,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, OntologyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(OntologyError::denied(None, "nope").status_code(), 403);
        assert_eq!(
            OntologyError::missing(ElementKind::Concept, "x").status_code(),
            404
        );
        assert_eq!(OntologyError::Corruption("loop".into()).status_code(), 500);
        assert_eq!(
            OntologyError::from(GraphError::VertexNotFound("v".into())).status_code(),
            500
        );
    }

    #[test]
    fn anonymous_denial_names_no_user() {
        let err = OntologyError::denied(None, "missing privilege");
        assert_eq!(
            err.to_string(),
            "access denied for <anonymous>: missing privilege"
        );
    }
}
