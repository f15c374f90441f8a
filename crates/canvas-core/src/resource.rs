//! Resources: the ownable, permission-checked records held by the store.
//!
//! Every resource carries a typed [`Payload`]. The payload variant determines
//! the [`ResourceKind`], the table the resource lives in and the fields that
//! search looks at. Payloads are validated at the store boundary so that a
//! malformed record is rejected at write time rather than at first read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use crate::{Error, ResourceId, Result, UserId};

/// Open-ended structured attributes attached to a payload.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The fixed set of resource kinds. Anything else is rejected at the boundary.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
  CanvasNode,
  RdfEntity,
  RdfLink,
  Document,
  AgentConfig,
  Preferences,
}

impl ResourceKind {
  /// Kinds scanned by search, in scan order.
  pub const SEARCHABLE: [ResourceKind; 3] =
    [Self::CanvasNode, Self::RdfEntity, Self::Document];

  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownKind(s.to_owned()))
  }

  pub fn as_str(self) -> &'static str { self.into() }

  /// Name of the table holding resources of this kind.
  pub fn table(self) -> &'static str {
    match self {
      Self::CanvasNode => "canvas_nodes",
      Self::RdfEntity => "rdf_entities",
      Self::RdfLink => "rdf_links",
      Self::Document => "documents",
      Self::AgentConfig => "agent_configs",
      Self::Preferences => "preferences",
    }
  }

  pub fn is_searchable(self) -> bool { Self::SEARCHABLE.contains(&self) }

  /// Audit action recorded after a successful save.
  pub fn saved_action(self) -> String { format!("{self}_saved") }

  /// Audit action recorded after a successful delete.
  pub fn deleted_action(self) -> String { format!("{self}_deleted") }
}

// ─── Payload variants ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
  pub x: f64,
  pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
  pub width:  f64,
  pub height: f64,
}

/// A node placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanvasNode {
  /// Renderer discriminant, e.g. `"text"`, `"image"`, `"agent"`.
  pub node_type: String,
  #[serde(default)]
  pub position:  Position,
  #[serde(default)]
  pub size:      Size,
  #[serde(default)]
  pub content:   String,
  #[serde(default)]
  pub parent_id: Option<ResourceId>,
  #[serde(default)]
  pub data:      Attributes,
}

/// A node of the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RdfEntity {
  pub entity_type: String,
  pub label:       String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub attributes:  Attributes,
}

/// A directed, labelled edge between two knowledge-graph entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RdfLink {
  pub source_id:  ResourceId,
  pub target_id:  ResourceId,
  pub predicate:  String,
  #[serde(default)]
  pub attributes: Attributes,
}

fn default_mime_type() -> String { "text/markdown".to_owned() }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
  pub title:     String,
  #[serde(default)]
  pub content:   String,
  #[serde(default = "default_mime_type")]
  pub mime_type: String,
  #[serde(default)]
  pub tags:      Vec<String>,
}

/// Configuration of a chat agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
  pub name:          String,
  pub model:         String,
  #[serde(default)]
  pub system_prompt: Option<String>,
  #[serde(default)]
  pub temperature:   Option<f64>,
  #[serde(default)]
  pub tools:         Vec<String>,
  #[serde(default)]
  pub settings:      Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preferences {
  #[serde(default)]
  pub theme:    Option<String>,
  #[serde(default)]
  pub settings: Attributes,
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// The typed payload of a resource. The variant name is the resource kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
  CanvasNode(CanvasNode),
  RdfEntity(RdfEntity),
  RdfLink(RdfLink),
  Document(Document),
  AgentConfig(AgentConfig),
  Preferences(Preferences),
}

fn require(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::Malformed(format!("{field} must not be empty")));
  }
  Ok(())
}

impl Payload {
  pub fn kind(&self) -> ResourceKind {
    match self {
      Self::CanvasNode(_) => ResourceKind::CanvasNode,
      Self::RdfEntity(_) => ResourceKind::RdfEntity,
      Self::RdfLink(_) => ResourceKind::RdfLink,
      Self::Document(_) => ResourceKind::Document,
      Self::AgentConfig(_) => ResourceKind::AgentConfig,
      Self::Preferences(_) => ResourceKind::Preferences,
    }
  }

  /// Value stored in the indexed `type` column, if the kind has one.
  pub fn subtype(&self) -> Option<&str> {
    match self {
      Self::CanvasNode(n) => Some(&n.node_type),
      Self::RdfEntity(e) => Some(&e.entity_type),
      Self::RdfLink(l) => Some(&l.predicate),
      Self::Document(d) => Some(&d.mime_type),
      Self::AgentConfig(a) => Some(&a.model),
      Self::Preferences(_) => None,
    }
  }

  /// Text fields inspected by search. Empty for non-searchable kinds.
  pub fn search_text(&self) -> Vec<&str> {
    match self {
      Self::CanvasNode(n) => vec![n.content.as_str()],
      Self::RdfEntity(e) => {
        let mut fields = vec![e.label.as_str()];
        fields.extend(e.description.as_deref());
        fields
      }
      Self::Document(d) => {
        let mut fields = vec![d.title.as_str(), d.content.as_str()];
        fields.extend(d.tags.iter().map(String::as_str));
        fields
      }
      Self::RdfLink(_) | Self::AgentConfig(_) | Self::Preferences(_) => vec![],
    }
  }

  /// Case-insensitive substring match over [`Payload::search_text`].
  /// `needle` must already be lowercased.
  pub fn matches_text(&self, needle: &str) -> bool {
    self
      .search_text()
      .into_iter()
      .any(|field| field.to_lowercase().contains(needle))
  }

  /// Shape validation applied before any storage or ACL work.
  pub fn validate(&self) -> Result<()> {
    match self {
      Self::CanvasNode(n) => {
        require("node_type", &n.node_type)?;
        if !(n.position.x.is_finite() && n.position.y.is_finite()) {
          return Err(Error::Malformed("position must be finite".into()));
        }
        let Size { width, height } = n.size;
        if !(width.is_finite() && height.is_finite()) || width < 0.0 || height < 0.0 {
          return Err(Error::Malformed(
            "size must be finite and non-negative".into(),
          ));
        }
        if let Some(parent) = &n.parent_id {
          require("parent_id", parent)?;
        }
        Ok(())
      }
      Self::RdfEntity(e) => {
        require("entity_type", &e.entity_type)?;
        require("label", &e.label)
      }
      Self::RdfLink(l) => {
        require("source_id", &l.source_id)?;
        require("target_id", &l.target_id)?;
        require("predicate", &l.predicate)
      }
      Self::Document(d) => {
        require("title", &d.title)?;
        require("mime_type", &d.mime_type)?;
        d.tags.iter().try_for_each(|t| require("tag", t))
      }
      Self::AgentConfig(a) => {
        require("name", &a.name)?;
        require("model", &a.model)?;
        match a.temperature {
          Some(t) if !(0.0..=2.0).contains(&t) => Err(Error::Malformed(
            format!("temperature {t} is outside 0..=2"),
          )),
          _ => Ok(()),
        }
      }
      Self::Preferences(p) => match &p.theme {
        Some(theme) => require("theme", theme),
        None => Ok(()),
      },
    }
  }

  /// Serialise the inner payload (without the kind tag) for the `payload`
  /// database column.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Rebuild a payload from its kind and inner JSON. Does not validate.
  pub fn from_parts(kind: ResourceKind, data: serde_json::Value) -> Result<Self> {
    let wrapped = serde_json::json!({ "kind": kind.as_str(), "data": data });
    serde_json::from_value(wrapped)
      .map_err(|e| Error::Malformed(format!("invalid {kind} payload: {e}")))
  }

  /// Parse caller-supplied input: kind string plus inner JSON, validated.
  pub fn parse(kind: &str, data: serde_json::Value) -> Result<Self> {
    let payload = Self::from_parts(ResourceKind::parse(kind)?, data)?;
    payload.validate()?;
    Ok(payload)
  }
}

// ─── Resource ────────────────────────────────────────────────────────────────

/// A stored resource. `owner_id` never changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
  pub id:         ResourceId,
  pub owner_id:   UserId,
  #[serde(flatten)]
  pub payload:    Payload,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Resource {
  pub fn kind(&self) -> ResourceKind { self.payload.kind() }
}

/// Input to [`crate::store::RecordStore::save`].
#[derive(Debug, Clone)]
pub struct NewResource {
  /// Upsert key. A UUID is generated by the store when absent.
  pub id:      Option<ResourceId>,
  pub payload: Payload,
}

impl NewResource {
  pub fn new(payload: Payload) -> Self { Self { id: None, payload } }

  pub fn with_id(id: impl Into<ResourceId>, payload: Payload) -> Self {
    Self { id: Some(id.into()), payload }
  }

  pub fn kind(&self) -> ResourceKind { self.payload.kind() }

  pub fn validate(&self) -> Result<()> {
    if let Some(id) = &self.id {
      require("id", id)?;
    }
    self.payload.validate()
  }
}

/// Parameters for [`crate::store::RecordStore::get_all`].
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
  /// Match against the kind's `type` column (node type, entity type, ...).
  pub subtype: Option<String>,
  pub limit:   Option<usize>,
  pub offset:  Option<usize>,
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use strum::IntoEnumIterator as _;

  use super::*;

  #[test]
  fn kind_strings_are_exactly_the_six_wire_values() {
    let names: Vec<_> = ResourceKind::iter().map(ResourceKind::as_str).collect();
    assert_eq!(names, [
      "canvas_node",
      "rdf_entity",
      "rdf_link",
      "document",
      "agent_config",
      "preferences",
    ]);
    for kind in ResourceKind::iter() {
      assert_eq!(ResourceKind::parse(kind.as_str()).unwrap(), kind);
    }
  }

  #[test]
  fn unknown_kind_is_rejected() {
    let err = Payload::parse("spreadsheet", json!({})).unwrap_err();
    assert!(matches!(err, Error::UnknownKind(k) if k == "spreadsheet"));
  }

  #[test]
  fn parse_applies_defaults() {
    let payload = Payload::parse("document", json!({ "title": "Notes" })).unwrap();
    let Payload::Document(doc) = payload else { panic!("expected document") };
    assert_eq!(doc.mime_type, "text/markdown");
    assert!(doc.content.is_empty());
  }

  #[test]
  fn parse_rejects_unknown_fields_and_missing_fields() {
    assert!(matches!(
      Payload::parse("document", json!({ "title": "x", "colour": "red" })),
      Err(Error::Malformed(_))
    ));
    assert!(matches!(
      Payload::parse("rdf_link", json!({ "source_id": "a", "target_id": "b" })),
      Err(Error::Malformed(_))
    ));
  }

  #[test]
  fn validation_rules() {
    assert!(Payload::parse("rdf_entity", json!({ "entity_type": "person", "label": " " })).is_err());
    assert!(
      Payload::parse(
        "canvas_node",
        json!({ "node_type": "text", "size": { "width": -1.0, "height": 2.0 } })
      )
      .is_err()
    );
    assert!(
      Payload::parse(
        "agent_config",
        json!({ "name": "helper", "model": "m", "temperature": 3.5 })
      )
      .is_err()
    );
    assert!(Payload::parse("preferences", json!({ "theme": "" })).is_err());
    assert!(Payload::parse("preferences", json!({})).is_ok());
  }

  #[test]
  fn to_json_and_from_parts_strip_and_restore_the_tag() {
    let payload = Payload::parse(
      "rdf_entity",
      json!({ "entity_type": "person", "label": "Ada" }),
    )
    .unwrap();
    let inner = payload.to_json().unwrap();
    assert!(inner.get("kind").is_none());
    assert_eq!(inner["label"], "Ada");
    assert_eq!(Payload::from_parts(ResourceKind::RdfEntity, inner).unwrap(), payload);
  }

  #[test]
  fn search_text_covers_designated_fields() {
    let doc = Payload::parse(
      "document",
      json!({ "title": "Roadmap", "content": "Ship the Canvas", "tags": ["Q3"] }),
    )
    .unwrap();
    assert!(doc.matches_text("canvas"));
    assert!(doc.matches_text("q3"));
    assert!(!doc.matches_text("markdown"));

    let link = Payload::parse(
      "rdf_link",
      json!({ "source_id": "canvas", "target_id": "b", "predicate": "p" }),
    )
    .unwrap();
    assert!(!link.matches_text("canvas"));
  }
}
