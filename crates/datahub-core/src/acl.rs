use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::Entity;
use crate::error::{DataHubError, Result};
use crate::keyed::KeyedStore;
use crate::path::{ACL_KIND, Key, Path};
use crate::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Op {
    Create,
    Read,
    Update,
    Delete,
}

impl Op {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Op {
    type Err = DataHubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Self::Create),
            "READ" => Ok(Self::Read),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(DataHubError::Validation(format!("unknown operation: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    Allow,
    Restrict,
}

impl FromStr for ControlType {
    type Err = DataHubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "restrict" => Ok(Self::Restrict),
            other => Err(DataHubError::Validation(format!(
                "unknown control type: {other}"
            ))),
        }
    }
}

/// ACL stored at exactly one path. Missing groups mean "no assertion".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRecord {
    #[serde(default)]
    pub allow: BTreeMap<Op, BTreeSet<String>>,
    #[serde(default)]
    pub restrict: BTreeMap<Op, BTreeSet<String>>,
}

impl AclRecord {
    #[must_use]
    pub fn asserts(&self, ctype: ControlType, user: &str, op: Op) -> bool {
        self.group(ctype)
            .get(&op)
            .is_some_and(|users| users.contains(user))
    }

    fn group(&self, ctype: ControlType) -> &BTreeMap<Op, BTreeSet<String>> {
        match ctype {
            ControlType::Allow => &self.allow,
            ControlType::Restrict => &self.restrict,
        }
    }

    fn group_mut(&mut self, ctype: ControlType) -> &mut BTreeMap<Op, BTreeSet<String>> {
        match ctype {
            ControlType::Allow => &mut self.allow,
            ControlType::Restrict => &mut self.restrict,
        }
    }
}

/// Depth of the closest assertion of each control type on the way to ROOT.
/// `None` sorts below every depth, so "no assertion" never wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlLevels {
    pub allow: Option<usize>,
    pub restrict: Option<usize>,
}

impl ControlLevels {
    #[must_use]
    pub fn is_restricted(self) -> bool {
        self.allow < self.restrict
    }
}

#[derive(Clone)]
pub struct AccessControl {
    store: Arc<dyn KeyedStore>,
}

impl std::fmt::Debug for AccessControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessControl").finish_non_exhaustive()
    }
}

impl AccessControl {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    /// Raw record stored at exactly `path`, without any ancestor evaluation.
    pub fn get_acl(&self, path: &Path) -> Result<Option<AclRecord>> {
        let Some(entity) = self.store.get(&acl_key(path))? else {
            return Ok(None);
        };
        let record = serde_json::from_value(serde_json::Value::Object(entity.to_document()))?;
        Ok(Some(record))
    }

    /// Walks from `path` to ROOT, closest first, and records the depth of the
    /// first ancestor asserting each control type for `(user, op)`.
    pub fn control_levels(&self, path: &Path, user: &User, op: Op) -> Result<ControlLevels> {
        let user_id = user.effective_id();
        let mut levels = ControlLevels::default();
        for ancestor in path.lineage() {
            if levels.allow.is_some() && levels.restrict.is_some() {
                break;
            }
            let Some(record) = self.get_acl(&ancestor)? else {
                continue;
            };
            if levels.allow.is_none() && record.asserts(ControlType::Allow, user_id, op) {
                levels.allow = Some(ancestor.len());
            }
            if levels.restrict.is_none() && record.asserts(ControlType::Restrict, user_id, op) {
                levels.restrict = Some(ancestor.len());
            }
        }
        Ok(levels)
    }

    pub fn is_restricted(&self, path: &Path, user: &User, op: Op) -> Result<bool> {
        let levels = self.control_levels(path, user, op)?;
        let restricted = levels.is_restricted();
        tracing::debug!(
            path = %path,
            user = user.effective_id(),
            op = %op,
            allow_level = ?levels.allow,
            restrict_level = ?levels.restrict,
            restricted,
            "resolved acl"
        );
        Ok(restricted)
    }

    pub fn is_allowed(&self, path: &Path, user: &User, op: Op) -> Result<bool> {
        Ok(!self.is_restricted(path, user, op)?)
    }

    pub fn assert_allowed(&self, path: &Path, user: &User, op: Op) -> Result<()> {
        if self.is_restricted(path, user, op)? {
            return Err(DataHubError::restricted(path, user, op));
        }
        Ok(())
    }

    pub fn set_allowed(&self, path: &Path, user: &str, op: Op) -> Result<()> {
        self.update_control(path, ControlType::Allow, user, op, true)
    }

    pub fn set_restricted(&self, path: &Path, user: &str, op: Op) -> Result<()> {
        self.update_control(path, ControlType::Restrict, user, op, true)
    }

    pub fn clear_allowed(&self, path: &Path, user: &str, op: Op) -> Result<()> {
        self.update_control(path, ControlType::Allow, user, op, false)
    }

    pub fn clear_restricted(&self, path: &Path, user: &str, op: Op) -> Result<()> {
        self.update_control(path, ControlType::Restrict, user, op, false)
    }

    fn update_control(
        &self,
        path: &Path,
        ctype: ControlType,
        user: &str,
        op: Op,
        add: bool,
    ) -> Result<()> {
        let mut record = self.get_acl(path)?.unwrap_or_default();
        let users = record.group_mut(ctype).entry(op).or_default();
        if add {
            users.insert(user.to_string());
        } else {
            users.remove(user);
        }

        let serde_json::Value::Object(doc) = serde_json::to_value(&record)? else {
            return Err(DataHubError::Internal(
                "acl record did not serialize to an object".to_string(),
            ));
        };
        self.store
            .put(Entity::from_document(acl_key(path), &doc)?)?;
        tracing::debug!(path = %path, user, op = %op, ?ctype, add, "updated acl");
        Ok(())
    }
}

fn acl_key(path: &Path) -> Key {
    path.to_key().with_kind(ACL_KIND)
}
