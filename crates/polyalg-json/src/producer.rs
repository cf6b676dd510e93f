//! # Plan Writer (Serialization)
//!
//! Turns a plan tree into the JSON plan document:
//!
//! ```text
//! {"version": 1, "Plan": {"id": "2", "relOp": "LogicalFilter",
//!                         "input": {"id": "1", "relOp": "LogicalProject", ...},
//!                         "condition": {...}}}
//! ```
//!
//! ## Traversal
//!
//! The writer walks the tree in post-order. A node's inputs are written, and receive
//! their ids, before the node itself, so ids grow from the leaves up and the root has
//! the highest id. Inputs are nested in their parent under the label of the explain
//! term that holds them.
//!
//! A node reached a second time (a sub-plan shared by two parents) is written as
//! `{"ref": "<id>"}` pointing at its first occurrence.
//!
//! ## Attributes
//!
//! Every other explain term becomes one attribute, in explain order, encoded by
//! [`crate::codec`]. With [`WriterConfig::emit_estimates`] each node also carries
//! `rowCount` and `cumulativeCost`. Readers ignore both.

use crate::codec::{
    agg_calls_to_json, collation_to_json, entity_to_json, row_type_to_json, RexEncoder,
};
use crate::PLAN_VERSION;
use polyalg_core::alg::registry::tag_for;
use polyalg_core::alg::ExplainValue;
use polyalg_core::cost::{CostModel, DefaultCostModel};
use polyalg_core::error::Result;
use polyalg_core::stats::row_count;
use polyalg_core::types::RowType;
use polyalg_core::{AlgContext, AlgRef};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Adds write-only `rowCount` / `cumulativeCost` diagnostics to every node.
    pub emit_estimates: bool,
    /// Indented output from [`to_json_string`].
    pub pretty: bool,
}

pub struct PlanWriter<'a> {
    context: &'a AlgContext,
    config: &'a WriterConfig,
    ids: HashMap<*const (), String>,
    next_id: usize,
}

impl<'a> PlanWriter<'a> {
    pub fn new(context: &'a AlgContext, config: &'a WriterConfig) -> Self {
        Self {
            context,
            config,
            ids: HashMap::new(),
            next_id: 0,
        }
    }

    /// The complete plan document.
    pub fn write(mut self, root: &AlgRef) -> Result<Value> {
        let plan = self.write_node(root)?;
        debug!(nodes = self.next_id, "plan written");
        Ok(json!({ "version": PLAN_VERSION, "Plan": plan }))
    }

    fn write_node(&mut self, node: &AlgRef) -> Result<Value> {
        let key = Arc::as_ptr(node) as *const ();
        if let Some(id) = self.ids.get(&key) {
            trace!(id = %id, "shared node written as reference");
            return Ok(json!({ "ref": id }));
        }

        let input_types: Vec<RowType> = node
            .inputs()
            .iter()
            .map(|input| input.row_type().clone())
            .collect();
        let rex = self.context.rex_builder();
        let encoder = RexEncoder::new(&rex, &input_types);

        let mut attributes = Vec::new();
        for (label, value) in node.explain_terms() {
            let encoded = match value {
                ExplainValue::Input(input) => self.write_node(&input)?,
                ExplainValue::Inputs(inputs) => Value::Array(
                    inputs
                        .iter()
                        .map(|input| self.write_node(input))
                        .collect::<Result<_>>()?,
                ),
                ExplainValue::Str(s) => Value::from(s),
                ExplainValue::Int(i) => Value::from(i),
                ExplainValue::Bool(b) => Value::from(b),
                ExplainValue::IntList(list) => json!(list),
                ExplainValue::StrList(list) => json!(list),
                ExplainValue::Expr(expr) => encoder.encode(&expr),
                ExplainValue::ExprList(exprs) => encoder.encode_list(&exprs),
                ExplainValue::RowType(row_type) => row_type_to_json(&row_type),
                ExplainValue::Collation(collation) => collation_to_json(&collation)?,
                ExplainValue::AggCalls(calls) => agg_calls_to_json(&calls),
                ExplainValue::Entity(entity) => entity_to_json(&entity),
                ExplainValue::Tuples(rows) => Value::Array(
                    rows.iter().map(|row| encoder.encode_list(row)).collect(),
                ),
            };
            attributes.push((label, encoded));
        }

        let id = self.next_id.to_string();
        self.next_id += 1;
        self.ids.insert(key, id.clone());
        let tag = tag_for(&node.type_name());

        let mut map = Map::new();
        map.insert("id".into(), Value::from(id.as_str()));
        map.insert("relOp".into(), Value::from(tag.as_str()));
        for (label, value) in attributes {
            map.insert(label.to_string(), value);
        }
        if self.config.emit_estimates {
            let catalog = self.context.catalog();
            map.insert("rowCount".into(), json!(row_count(node, catalog)));
            let cost = DefaultCostModel::default().cost(node, catalog);
            map.insert("cumulativeCost".into(), json!(cost.total));
        }
        trace!(id = %id, tag = %tag, "node written");
        Ok(Value::Object(map))
    }
}

pub fn write_plan(context: &AlgContext, root: &AlgRef, config: &WriterConfig) -> Result<Value> {
    PlanWriter::new(context, config).write(root)
}

pub fn to_json_string(context: &AlgContext, root: &AlgRef, config: &WriterConfig) -> Result<String> {
    let document = write_plan(context, root, config)?;
    let text = if config.pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyalg_core::alg::{Filter, Project, Scan};
    use polyalg_core::catalog::{EntityRef, InMemoryCatalog};
    use polyalg_core::operator::OperatorKind;
    use polyalg_core::stats::Statistics;
    use polyalg_core::traits::TraitSet;
    use polyalg_core::types::DataType;

    fn context() -> (AlgContext, EntityRef) {
        let emp = EntityRef::new(
            "public",
            "emp",
            RowType::builder()
                .add("id", DataType::integer())
                .add("salary", DataType::decimal(10, 2))
                .build(),
        );
        let mut catalog = InMemoryCatalog::new();
        catalog.add_entity(emp.clone(), Some(Statistics::new(100.0, 1000.0)));
        (AlgContext::new(Arc::new(catalog)), emp)
    }

    fn filtered_projection(ctx: &AlgContext, emp: EntityRef) -> AlgRef {
        let rex = ctx.rex_builder();
        let scan = Scan::create(TraitSet::abstract_(), emp);
        let project = Project::with_derived_names(
            TraitSet::abstract_(),
            scan.clone(),
            vec![rex.field_ref(0, 1, scan.row_type()).unwrap()],
        )
        .unwrap();
        let condition = rex
            .call_kind(
                OperatorKind::GreaterThan,
                vec![rex.field_ref(0, 0, project.row_type()).unwrap(), rex.decimal(500000, 10, 2)],
            )
            .unwrap();
        Filter::create(TraitSet::abstract_(), project, condition).unwrap()
    }

    #[test]
    fn test_post_order_ids_and_tags() {
        let (ctx, emp) = context();
        let plan = filtered_projection(&ctx, emp);
        let doc = write_plan(&ctx, &plan, &WriterConfig::default()).unwrap();

        assert_eq!(doc["version"], 1);
        let root = &doc["Plan"];
        assert_eq!(root["id"], "2");
        assert_eq!(root["relOp"], "LogicalFilter");
        assert_eq!(root["input"]["id"], "1");
        assert_eq!(root["input"]["relOp"], "LogicalProject");
        assert_eq!(root["input"]["input"]["id"], "0");
        assert_eq!(root["input"]["input"]["entity"], json!(["public", "emp"]));
        assert_eq!(root["condition"]["op"], ">");
        assert_eq!(root["condition"]["operands"][0], json!({"input": 0, "name": "salary"}));
        assert!(root.get("rowCount").is_none());
    }

    #[test]
    fn test_id_is_first_key() {
        let (ctx, emp) = context();
        let plan = filtered_projection(&ctx, emp);
        let text = to_json_string(&ctx, &plan, &WriterConfig::default()).unwrap();
        assert!(text.contains(r#""Plan":{"id":"2","relOp":"LogicalFilter""#));
    }

    #[test]
    fn test_estimates_are_optional() {
        let (ctx, emp) = context();
        let scan = Scan::create(TraitSet::abstract_(), emp);
        let config = WriterConfig {
            emit_estimates: true,
            pretty: true,
        };
        let doc = write_plan(&ctx, &scan, &config).unwrap();
        assert_eq!(doc["Plan"]["rowCount"], 100.0);
        assert!(doc["Plan"]["cumulativeCost"].as_f64().unwrap() > 0.0);
        let text = to_json_string(&ctx, &scan, &config).unwrap();
        assert!(text.contains('\n'));
    }
}
