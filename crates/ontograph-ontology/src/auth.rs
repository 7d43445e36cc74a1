//! Visibility/authorization gate.
//!
//! Reads resolve an [`Authorizations`] set for `(user, workspace)`; writes go
//! through one policy function, [`AuthorizationGate::authorize`].

use crate::error::{OntologyError, Result};
use crate::vocab::VISIBILITY_STRING;
use dashmap::DashMap;
use ontograph_graph::Authorizations;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

const SYSTEM_USER_ID: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    id: String,
    system: bool,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            system: false,
        }
    }

    /// The distinguished user that bootstrap loading runs as.
    pub fn system() -> Self {
        Self {
            id: SYSTEM_USER_ID.to_string(),
            system: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_system(&self) -> bool {
        self.system
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Privilege {
    OntologyAdd,
    OntologyPublish,
}

/// Which part of the ontology a write lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    Public,
    Workspace(&'a str),
}

impl<'a> Scope<'a> {
    pub fn of(workspace: Option<&'a str>) -> Self {
        workspace.map_or(Scope::Public, Scope::Workspace)
    }

    pub fn workspace(self) -> Option<&'a str> {
        match self {
            Scope::Public => None,
            Scope::Workspace(ws) => Some(ws),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Create or modify an element in the given scope.
    Create,
    /// Promote a sandboxed element to public.
    Publish,
}

/// Translates users and workspaces into graph authorization labels.
pub trait AuthorizationProvider: Send + Sync {
    fn graph_authorizations(
        &self,
        user: &User,
        workspace: Option<&str>,
        scopes: &[&str],
    ) -> Authorizations;
}

pub trait PrivilegeRepository: Send + Sync {
    fn has_privilege(&self, user: &User, privilege: Privilege) -> bool;
}

/// Bootstrap/test implementation of both collaborator traits.
#[derive(Debug, Default)]
pub struct InMemoryAuthorizationRepository {
    privileges: DashMap<String, BTreeSet<Privilege>>,
    labels: DashMap<String, BTreeSet<String>>,
}

impl InMemoryAuthorizationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the privileges held by `user`.
    pub fn set_privileges(&self, user: &User, privileges: impl IntoIterator<Item = Privilege>) {
        self.privileges
            .insert(user.id().to_string(), privileges.into_iter().collect());
    }

    pub fn add_authorization(&self, user: &User, label: impl Into<String>) {
        self.labels
            .entry(user.id().to_string())
            .or_default()
            .insert(label.into());
    }
}

impl AuthorizationProvider for InMemoryAuthorizationRepository {
    fn graph_authorizations(
        &self,
        user: &User,
        workspace: Option<&str>,
        scopes: &[&str],
    ) -> Authorizations {
        let mut labels: BTreeSet<String> = scopes.iter().map(|s| s.to_string()).collect();
        if let Some(ws) = workspace {
            labels.insert(ws.to_string());
        }
        if let Some(extra) = self.labels.get(user.id()) {
            labels.extend(extra.iter().cloned());
        }
        Authorizations::new(labels)
    }
}

impl PrivilegeRepository for InMemoryAuthorizationRepository {
    fn has_privilege(&self, user: &User, privilege: Privilege) -> bool {
        self.privileges
            .get(user.id())
            .is_some_and(|p| p.contains(&privilege))
    }
}

#[derive(Clone)]
pub struct AuthorizationGate {
    provider: Arc<dyn AuthorizationProvider>,
    privileges: Arc<dyn PrivilegeRepository>,
}

impl AuthorizationGate {
    pub fn new(
        provider: Arc<dyn AuthorizationProvider>,
        privileges: Arc<dyn PrivilegeRepository>,
    ) -> Self {
        Self {
            provider,
            privileges,
        }
    }

    pub fn public_authorizations() -> Authorizations {
        Authorizations::new([VISIBILITY_STRING])
    }

    /// Read authorizations for `(user, workspace)`.
    pub fn authorizations_for(
        &self,
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<Authorizations> {
        match (user, workspace) {
            (None, None) => Ok(Self::public_authorizations()),
            (None, Some(ws)) => Ok(Self::public_authorizations().with(ws)),
            (Some(user), None) => {
                if !user.is_system() && !self.has(user, Privilege::OntologyAdd) {
                    return Err(OntologyError::denied(
                        Some(user),
                        "missing ONTOLOGY_ADD privilege",
                    ));
                }
                Ok(self
                    .provider
                    .graph_authorizations(user, None, &[VISIBILITY_STRING]))
            }
            (Some(user), Some(ws)) => Ok(Self::public_authorizations().union(
                &self
                    .provider
                    .graph_authorizations(user, Some(ws), &[VISIBILITY_STRING]),
            )),
        }
    }

    /// The single mutation policy.
    pub fn authorize(&self, operation: Operation, scope: Scope<'_>, user: Option<&User>) -> Result<()> {
        let Some(user) = user else {
            return Err(OntologyError::denied(
                None,
                "ontology changes require a user",
            ));
        };
        if user.is_system() {
            return Ok(());
        }

        let required: &[Privilege] = match (operation, scope) {
            (Operation::Create, Scope::Workspace(_)) => &[Privilege::OntologyAdd],
            (Operation::Create, Scope::Public) => {
                &[Privilege::OntologyAdd, Privilege::OntologyPublish]
            }
            (Operation::Publish, _) => &[Privilege::OntologyPublish],
        };

        match required.iter().find(|p| !self.has(user, **p)) {
            Some(missing) => {
                tracing::debug!(user = %user.id(), ?operation, ?missing, "ontology change denied");
                Err(OntologyError::denied(
                    Some(user),
                    format!("missing {missing:?} privilege"),
                ))
            }
            None => Ok(()),
        }
    }

    fn has(&self, user: &User, privilege: Privilege) -> bool {
        self.privileges.has_privilege(user, privilege)
    }
}
