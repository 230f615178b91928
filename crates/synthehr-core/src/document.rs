//! Document Tree model.
//!
//! Documents are kept as `serde_json::Value` so unknown shapes survive a
//! round trip untouched. Records are classified by their `_type`
//! discriminator into [`NodeKind`] when visited; behavior hangs off the
//! kind, never off raw string comparisons scattered through the code.

use serde_json::{Map, Value};

/// Field carrying the record discriminator.
pub const TYPE_FIELD: &str = "_type";

/// Closed set of record kinds the canonicalizer and variation engine act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Composition,
    Section,
    ItemTree,
    /// Legacy container, migrated to [`NodeKind::ItemTree`] by canonicalization.
    ItemTable,
    Cluster,
    ItemList,
    History,
    Instruction,
    DvText,
    DvCodedText,
    DvQuantity,
    DvDateTime,
    /// Untagged records and tags outside the set above. Passed through.
    Unknown,
}

impl NodeKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "COMPOSITION" => NodeKind::Composition,
            "SECTION" => NodeKind::Section,
            "ITEM_TREE" => NodeKind::ItemTree,
            "ITEM_TABLE" => NodeKind::ItemTable,
            "CLUSTER" => NodeKind::Cluster,
            "ITEM_LIST" => NodeKind::ItemList,
            "HISTORY" => NodeKind::History,
            "INSTRUCTION" => NodeKind::Instruction,
            "DV_TEXT" => NodeKind::DvText,
            "DV_CODED_TEXT" => NodeKind::DvCodedText,
            "DV_QUANTITY" => NodeKind::DvQuantity,
            "DV_DATE_TIME" => NodeKind::DvDateTime,
            _ => NodeKind::Unknown,
        }
    }

    /// Wire tag for known kinds; `None` for [`NodeKind::Unknown`].
    pub fn tag(self) -> Option<&'static str> {
        let tag = match self {
            NodeKind::Composition => "COMPOSITION",
            NodeKind::Section => "SECTION",
            NodeKind::ItemTree => "ITEM_TREE",
            NodeKind::ItemTable => "ITEM_TABLE",
            NodeKind::Cluster => "CLUSTER",
            NodeKind::ItemList => "ITEM_LIST",
            NodeKind::History => "HISTORY",
            NodeKind::Instruction => "INSTRUCTION",
            NodeKind::DvText => "DV_TEXT",
            NodeKind::DvCodedText => "DV_CODED_TEXT",
            NodeKind::DvQuantity => "DV_QUANTITY",
            NodeKind::DvDateTime => "DV_DATE_TIME",
            NodeKind::Unknown => return None,
        };
        Some(tag)
    }

    /// Classify a record by its discriminator.
    pub fn of(record: &Map<String, Value>) -> Self {
        record
            .get(TYPE_FIELD)
            .and_then(Value::as_str)
            .map(NodeKind::from_tag)
            .unwrap_or(NodeKind::Unknown)
    }
}

/// Callback invoked once per record during [`walk_mut`].
pub trait NodeVisitor {
    fn visit(&mut self, kind: NodeKind, record: &mut Map<String, Value>);
}

/// Pre-order traversal over every record in the tree.
///
/// The visitor runs before the record's children are walked, so children
/// introduced or renamed by the visitor are visited too. Traversal never
/// stops early: every child is walked whether or not its parent changed.
pub fn walk_mut<V: NodeVisitor + ?Sized>(value: &mut Value, visitor: &mut V) {
    match value {
        Value::Object(record) => {
            let kind = NodeKind::of(record);
            visitor.visit(kind, record);
            for child in record.values_mut() {
                walk_mut(child, visitor);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_mut(item, visitor);
            }
        }
        _ => {}
    }
}

/// Wrap bare values in a sequence; `null` becomes the empty sequence.
pub fn into_sequence(value: Value) -> Value {
    match value {
        Value::Null => Value::Array(Vec::new()),
        Value::Array(items) => Value::Array(items),
        other => Value::Array(vec![other]),
    }
}
