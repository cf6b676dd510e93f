//! # Plan Reader (Deserialization)
//!
//! Rebuilds a plan tree from a JSON plan document.
//!
//! Constructors are looked up by type tag in the context's
//! [`polyalg_core::alg::NodeRegistry`] and receive a [`JsonInput`] bound to the raw
//! attributes of the node object. A nested node is built when the constructor asks
//! for it, so inputs (and the ids they register) are built in the node's declared
//! input order and a node is finished only after all of its inputs.
//!
//! Attribute order in the document does not matter. Field references in expressions
//! resolve against the requested inputs in request order, and a reference's `name`
//! must match the field it lands on.
//!
//! ## Failure
//!
//! - unknown type tag: [`AlgError::UnknownNodeKind`]
//! - `{"ref": id}` to an id not built yet: [`AlgError::DanglingReference`]
//! - unknown operator: [`AlgError::UnknownOperator`]
//! - unknown entity: [`AlgError::UnknownEntity`]
//! - anything structurally wrong: [`AlgError::MalformedPlan`]
//! - document version above [`crate::PLAN_VERSION`]: [`AlgError::UnsupportedVersion`]
//!
//! Errors abort the whole read. Nodes built before the failure are dropped with the
//! reader.
//!
//! Write-only attributes such as `rowCount` and `cumulativeCost` are never asked for by
//! a constructor and are therefore ignored.

use crate::codec::{
    agg_calls_from_json, as_index, collation_from_json, entity_from_json, row_type_from_json,
    RexDecoder,
};
use crate::PLAN_VERSION;
use polyalg_core::alg::{AggregateCall, AlgInput};
use polyalg_core::catalog::EntityRef;
use polyalg_core::error::{AlgError, Result};
use polyalg_core::rex::RexRef;
use polyalg_core::traits::Collation;
use polyalg_core::types::RowType;
use polyalg_core::{AlgContext, AlgRef};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Whether `value` is a node object or a reference to one.
fn is_node(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.contains_key("relOp") || map.contains_key("ref"))
}

#[derive(Clone)]
enum BuiltInput {
    Single(AlgRef),
    List(Vec<AlgRef>),
}

pub struct PlanReader<'a> {
    context: &'a AlgContext,
    built: HashMap<String, AlgRef>,
}

impl<'a> PlanReader<'a> {
    pub fn new(context: &'a AlgContext) -> Self {
        Self {
            context,
            built: HashMap::new(),
        }
    }

    /// Reads a complete plan document.
    pub fn read(mut self, document: &Value) -> Result<AlgRef> {
        let envelope = document
            .as_object()
            .ok_or_else(|| AlgError::malformed("plan document must be an object"))?;
        let version = match envelope.get("version") {
            None => PLAN_VERSION,
            Some(v) => v
                .as_u64()
                .ok_or_else(|| AlgError::malformed(format!("invalid version {}", v)))?,
        };
        if version != PLAN_VERSION {
            warn!(version, supported = PLAN_VERSION, "unsupported plan version");
            return Err(AlgError::UnsupportedVersion(version));
        }
        let plan = envelope
            .get("Plan")
            .ok_or_else(|| AlgError::malformed("plan document has no 'Plan'"))?;
        let root = self.read_node(plan)?;
        debug!(nodes = self.built.len(), "plan read");
        Ok(root)
    }

    fn read_node(&mut self, value: &Value) -> Result<AlgRef> {
        let map = value
            .as_object()
            .ok_or_else(|| AlgError::malformed(format!("expected a node object, got {}", value)))?;

        if let Some(reference) = map.get("ref") {
            let id = id_text(reference)?;
            return self
                .built
                .get(&id)
                .cloned()
                .ok_or(AlgError::DanglingReference(id));
        }

        let tag = map
            .get("relOp")
            .and_then(Value::as_str)
            .ok_or_else(|| AlgError::malformed("node object without 'relOp'"))?;

        let context = self.context;
        let node = {
            let input = JsonInput::new(context, self, map);
            context.nodes().construct(tag, &input)?
        };

        match map.get("id") {
            Some(id) => {
                let id = id_text(id)?;
                trace!(id = %id, tag, "node read");
                self.built.insert(id, node.clone());
            }
            None => trace!(tag, "node read without id"),
        }
        Ok(node)
    }
}

/// Ids are strings; integer ids are accepted too.
fn id_text(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(AlgError::malformed(format!("invalid node id {}", other))),
    }
}

/// [`AlgInput`] over one JSON node object. Nested nodes are built when the
/// constructor asks for them.
pub struct JsonInput<'r, 'a> {
    context: &'a AlgContext,
    reader: RefCell<&'r mut PlanReader<'a>>,
    attributes: &'r Map<String, Value>,
    /// Inputs built so far, by label, in request order.
    resolved: RefCell<Vec<(String, BuiltInput)>>,
}

impl<'r, 'a> JsonInput<'r, 'a> {
    fn new(
        context: &'a AlgContext,
        reader: &'r mut PlanReader<'a>,
        attributes: &'r Map<String, Value>,
    ) -> Self {
        Self {
            context,
            reader: RefCell::new(reader),
            attributes,
            resolved: RefCell::new(Vec::new()),
        }
    }

    fn attribute(&self, label: &str) -> Result<&'r Value> {
        match self.attributes.get(label) {
            Some(Value::Null) | None => {
                Err(AlgError::malformed(format!("missing attribute '{}'", label)))
            }
            Some(value) => Ok(value),
        }
    }

    /// Builds the node or node list under `label`, once.
    fn resolve(&self, label: &str) -> Result<BuiltInput> {
        if let Some((_, built)) = self.resolved.borrow().iter().find(|(l, _)| l == label) {
            return Ok(built.clone());
        }
        let value = self.attribute(label)?;
        let built = if is_node(value) {
            BuiltInput::Single(self.reader.borrow_mut().read_node(value)?)
        } else {
            match value {
                Value::Array(items) if items.iter().all(is_node) => {
                    let mut reader = self.reader.borrow_mut();
                    let nodes = items
                        .iter()
                        .map(|item| reader.read_node(item))
                        .collect::<Result<Vec<_>>>()?;
                    BuiltInput::List(nodes)
                }
                other => return Err(wrong_type(label, "a node or a list of nodes", other)),
            }
        };
        self.resolved
            .borrow_mut()
            .push((label.to_string(), built.clone()));
        Ok(built)
    }

    /// Row types of the inputs requested so far, flattened in request order.
    fn input_types(&self) -> Vec<RowType> {
        self.resolved
            .borrow()
            .iter()
            .flat_map(|(_, built)| match built {
                BuiltInput::Single(node) => vec![node.row_type().clone()],
                BuiltInput::List(nodes) => nodes.iter().map(|n| n.row_type().clone()).collect(),
            })
            .collect()
    }
}

fn wrong_type(label: &str, expected: &str, value: &Value) -> AlgError {
    AlgError::malformed(format!("attribute '{}' must be {}, got {}", label, expected, value))
}

impl AlgInput for JsonInput<'_, '_> {
    fn context(&self) -> &AlgContext {
        self.context
    }

    fn has(&self, label: &str) -> bool {
        self.attributes.get(label).is_some_and(|v| !v.is_null())
    }

    fn input(&self, label: &str) -> Result<AlgRef> {
        match self.resolve(label)? {
            BuiltInput::Single(node) => Ok(node),
            BuiltInput::List(_) => Err(AlgError::malformed(format!(
                "attribute '{}' is a list of inputs, expected one",
                label
            ))),
        }
    }

    fn inputs(&self, label: &str) -> Result<Vec<AlgRef>> {
        match self.resolve(label)? {
            BuiltInput::List(nodes) => Ok(nodes),
            BuiltInput::Single(node) => Ok(vec![node]),
        }
    }

    fn string(&self, label: &str) -> Result<String> {
        let value = self.attribute(label)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| wrong_type(label, "a string", value))
    }

    fn integer(&self, label: &str) -> Result<i64> {
        let value = self.attribute(label)?;
        value
            .as_i64()
            .ok_or_else(|| wrong_type(label, "an integer", value))
    }

    fn boolean(&self, label: &str) -> Result<bool> {
        let value = self.attribute(label)?;
        value
            .as_bool()
            .ok_or_else(|| wrong_type(label, "a boolean", value))
    }

    fn integer_list(&self, label: &str) -> Result<Vec<usize>> {
        let value = self.attribute(label)?;
        value
            .as_array()
            .ok_or_else(|| wrong_type(label, "a list of integers", value))?
            .iter()
            .map(|item| as_index(item, label))
            .collect()
    }

    fn string_list(&self, label: &str) -> Result<Vec<String>> {
        let value = self.attribute(label)?;
        value
            .as_array()
            .ok_or_else(|| wrong_type(label, "a list of strings", value))?
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| wrong_type(label, "a list of strings", value))
            })
            .collect()
    }

    fn row_type(&self, label: &str) -> Result<RowType> {
        row_type_from_json(self.attribute(label)?)
    }

    fn expression(&self, label: &str) -> Result<RexRef> {
        let types = self.input_types();
        RexDecoder::new(self.context, &types).decode(self.attribute(label)?)
    }

    fn expression_list(&self, label: &str) -> Result<Vec<RexRef>> {
        let types = self.input_types();
        RexDecoder::new(self.context, &types).decode_list(self.attribute(label)?)
    }

    fn collation(&self, label: &str) -> Result<Collation> {
        collation_from_json(self.attribute(label)?)
    }

    fn agg_calls(&self, label: &str) -> Result<Vec<AggregateCall>> {
        let types = self.input_types();
        let input = types
            .first()
            .ok_or_else(|| AlgError::malformed("aggregate calls without an input"))?;
        let group_count = if self.has("group") {
            self.bit_set("group")?.len()
        } else {
            0
        };
        agg_calls_from_json(self.context, self.attribute(label)?, input, group_count)
    }

    fn entity(&self, label: &str) -> Result<EntityRef> {
        entity_from_json(self.context, self.attribute(label)?)
    }

    fn tuples(&self, label: &str, row_type: &RowType) -> Result<Vec<Vec<RexRef>>> {
        let value = self.attribute(label)?;
        let rows = value
            .as_array()
            .ok_or_else(|| wrong_type(label, "a list of rows", value))?;
        let decoder = RexDecoder::new(self.context, &[]);
        rows.iter()
            .map(|row| {
                let row = decoder.decode_list(row)?;
                if row.len() != row_type.field_count() {
                    return Err(AlgError::malformed(format!(
                        "row of {} values for {} fields",
                        row.len(),
                        row_type.field_count()
                    )));
                }
                Ok(row)
            })
            .collect()
    }
}

pub fn read_plan(context: &AlgContext, document: &Value) -> Result<AlgRef> {
    PlanReader::new(context).read(document)
}

pub fn from_json_str(context: &AlgContext, text: &str) -> Result<AlgRef> {
    let document: Value = serde_json::from_str(text)?;
    read_plan(context, &document)
}
