//! Users and roles.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::{Error, Result, UserId};

/// A user's global role. Only [`Role::Admin`] changes permission resolution.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Admin,
  #[default]
  User,
  Viewer,
}

impl Role {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownRole(s.to_owned()))
  }

  pub fn as_str(self) -> &'static str { self.into() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:          UserId,
  pub username:    String,
  pub email:       String,
  pub role:        Role,
  /// Free-form capability labels carried for callers. Not consulted by
  /// [`crate::access::resolve`].
  pub permissions: BTreeSet<String>,
  pub created_at:  DateTime<Utc>,
}

impl User {
  pub fn is_admin(&self) -> bool { self.role == Role::Admin }

  pub fn principal(&self) -> Principal {
    Principal { id: self.id.clone(), role: self.role }
  }
}

/// Input to [`crate::store::RecordStore::create_user`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
  /// Generated by the store when absent.
  #[serde(default)]
  pub id:          Option<UserId>,
  pub username:    String,
  pub email:       String,
  #[serde(default)]
  pub role:        Role,
  #[serde(default)]
  pub permissions: BTreeSet<String>,
}

impl NewUser {
  pub fn new(
    username: impl Into<String>,
    email: impl Into<String>,
    role: Role,
  ) -> Self {
    Self {
      id: None,
      username: username.into(),
      email: email.into(),
      role,
      permissions: BTreeSet::new(),
    }
  }

  pub fn with_id(mut self, id: impl Into<UserId>) -> Self {
    self.id = Some(id.into());
    self
  }

  pub fn validate(&self) -> Result<()> {
    if let Some(id) = &self.id
      && id.trim().is_empty()
    {
      return Err(Error::Malformed("user id must not be empty".into()));
    }
    if self.username.trim().is_empty() {
      return Err(Error::Malformed("username must not be empty".into()));
    }
    if !self.email.contains('@') {
      return Err(Error::Malformed(format!(
        "invalid email address: {:?}",
        self.email
      )));
    }
    Ok(())
  }
}

/// The identity a permission check is evaluated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
  pub id:   UserId,
  pub role: Role,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn role_round_trips_through_strings() {
    for role in [Role::Admin, Role::User, Role::Viewer] {
      assert_eq!(Role::parse(role.as_str()).unwrap(), role);
    }
    assert!(matches!(Role::parse("root"), Err(Error::UnknownRole(_))));
  }

  #[test]
  fn new_user_validation() {
    assert!(NewUser::new("ada", "ada@example.com", Role::User).validate().is_ok());
    assert!(NewUser::new(" ", "ada@example.com", Role::User).validate().is_err());
    assert!(NewUser::new("ada", "nope", Role::User).validate().is_err());
    assert!(
      NewUser::new("ada", "ada@example.com", Role::User)
        .with_id("")
        .validate()
        .is_err()
    );
  }
}
