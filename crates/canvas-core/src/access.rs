//! Permissions, ACL entries and the permission resolution algorithm.
//!
//! Resolution is evaluated in a fixed order and stops at the first decisive
//! step:
//!
//! 1. the caller is an admin → allow
//! 2. the caller owns the resource → allow
//! 3. the caller's ACL entry contains the requested permission → allow
//! 4. deny
//!
//! Admin and ownership are unconditional and are decided before the ACL is
//! consulted, so ACL entries can only ever add access for non-owners.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
  Error, ResourceId, Result, UserId,
  resource::ResourceKind,
  user::{Principal, Role},
};

// ─── Permission ──────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  AsRefStr,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Permission {
  Read,
  Write,
  Delete,
  Share,
}

impl Permission {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownPermission(s.to_owned()))
  }

  pub fn as_str(self) -> &'static str { self.into() }
}

/// A set of permissions, persisted as a JSON list of the wire strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
  pub fn new() -> Self { Self::default() }

  pub fn all() -> Self {
    use strum::IntoEnumIterator as _;
    Permission::iter().collect()
  }

  /// Parse wire strings, rejecting anything outside the permission enum.
  pub fn parse<I, S>(values: I) -> Result<Self>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    values
      .into_iter()
      .map(|s| Permission::parse(s.as_ref()))
      .collect()
  }

  pub fn contains(&self, permission: Permission) -> bool {
    self.0.contains(&permission)
  }

  pub fn insert(&mut self, permission: Permission) -> bool {
    self.0.insert(permission)
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
    self.0.iter().copied()
  }
}

impl FromIterator<Permission> for PermissionSet {
  fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
    Self(iter.into_iter().collect())
  }
}

impl<const N: usize> From<[Permission; N]> for PermissionSet {
  fn from(value: [Permission; N]) -> Self { value.into_iter().collect() }
}

// ─── ACL entry ───────────────────────────────────────────────────────────────

/// Permissions granted to one user on one resource. Unique per
/// `(resource_id, resource_type, user_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
  pub resource_id:   ResourceId,
  pub resource_type: ResourceKind,
  pub user_id:       UserId,
  pub permissions:   PermissionSet,
  pub updated_at:    DateTime<Utc>,
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// Why access was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grant {
  Admin,
  Owner,
  Acl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "grant", rename_all = "snake_case")]
pub enum Decision {
  Allow(Grant),
  Deny,
}

impl Decision {
  pub fn is_allowed(self) -> bool { matches!(self, Self::Allow(_)) }
}

/// Decide whether `caller` holds `requested` on a resource owned by
/// `owner_id`.
///
/// `lookup` fetches the caller's ACL permissions for the resource. It is only
/// invoked when neither the admin nor the ownership rule applies.
pub fn resolve<E>(
  caller: &Principal,
  owner_id: &str,
  requested: Permission,
  lookup: impl FnOnce() -> Result<Option<PermissionSet>, E>,
) -> Result<Decision, E> {
  if caller.role == Role::Admin {
    return Ok(Decision::Allow(Grant::Admin));
  }
  if caller.id == owner_id {
    return Ok(Decision::Allow(Grant::Owner));
  }
  match lookup()? {
    Some(granted) if granted.contains(requested) => Ok(Decision::Allow(Grant::Acl)),
    _ => Ok(Decision::Deny),
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::Cell, convert::Infallible};

  use strum::IntoEnumIterator as _;

  use super::*;

  const OWNER: &str = "owner";

  fn principal(id: &str, role: Role) -> Principal {
    Principal { id: id.to_owned(), role }
  }

  /// Every subset of the four permissions, including the empty set.
  fn all_grant_sets() -> Vec<Option<PermissionSet>> {
    let perms: Vec<_> = Permission::iter().collect();
    let mut sets = vec![None];
    for mask in 0u8..16 {
      sets.push(Some(
        perms
          .iter()
          .enumerate()
          .filter(|(i, _)| mask & (1 << i) != 0)
          .map(|(_, p)| *p)
          .collect(),
      ));
    }
    sets
  }

  fn decide(
    caller: &Principal,
    grant: &Option<PermissionSet>,
    requested: Permission,
    calls: &Cell<u32>,
  ) -> Decision {
    resolve::<Infallible>(caller, OWNER, requested, || {
      calls.set(calls.get() + 1);
      Ok(grant.clone())
    })
    .unwrap()
  }

  #[test]
  fn exhaustive_resolution_order() {
    for role in [Role::Admin, Role::User, Role::Viewer] {
      for is_owner in [true, false] {
        let caller = principal(if is_owner { OWNER } else { "other" }, role);
        for grant in all_grant_sets() {
          for requested in Permission::iter() {
            let calls = Cell::new(0);
            let decision = decide(&caller, &grant, requested, &calls);

            let expected = if role == Role::Admin {
              Decision::Allow(Grant::Admin)
            } else if is_owner {
              Decision::Allow(Grant::Owner)
            } else if grant.as_ref().is_some_and(|g| g.contains(requested)) {
              Decision::Allow(Grant::Acl)
            } else {
              Decision::Deny
            };
            assert_eq!(
              decision, expected,
              "role={role} owner={is_owner} grant={grant:?} requested={requested}"
            );

            let consulted_acl = role != Role::Admin && !is_owner;
            assert_eq!(calls.get(), u32::from(consulted_acl));
          }
        }
      }
    }
  }

  #[test]
  fn empty_acl_entry_never_revokes_owner() {
    let owner = principal(OWNER, Role::Viewer);
    for requested in Permission::iter() {
      let d = resolve::<Infallible>(&owner, OWNER, requested, || {
        Ok(Some(PermissionSet::new()))
      })
      .unwrap();
      assert_eq!(d, Decision::Allow(Grant::Owner));
    }
  }

  #[test]
  fn read_grant_is_additive_only_for_read() {
    let bob = principal("bob", Role::User);
    let read_only = PermissionSet::from([Permission::Read]);
    let check = |p| {
      resolve::<Infallible>(&bob, OWNER, p, || Ok(Some(read_only.clone())))
        .unwrap()
    };
    assert!(check(Permission::Read).is_allowed());
    assert!(!check(Permission::Write).is_allowed());
    assert!(!check(Permission::Delete).is_allowed());
    assert!(!check(Permission::Share).is_allowed());
  }

  #[test]
  fn lookup_errors_propagate() {
    let bob = principal("bob", Role::User);
    let err = resolve(&bob, OWNER, Permission::Read, || Err("db down")).unwrap_err();
    assert_eq!(err, "db down");
  }

  #[test]
  fn permission_set_wire_format() {
    let set = PermissionSet::parse(["write", "read"]).unwrap();
    assert_eq!(serde_json::to_string(&set).unwrap(), r#"["read","write"]"#);
    assert!(matches!(
      PermissionSet::parse(["read", "admin"]),
      Err(Error::UnknownPermission(p)) if p == "admin"
    ));
    assert!(serde_json::from_str::<PermissionSet>(r#"["own"]"#).is_err());
    assert_eq!(PermissionSet::all().len(), 4);
  }
}
