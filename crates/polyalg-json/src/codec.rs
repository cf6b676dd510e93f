//! # Value Codecs
//!
//! JSON encodings of the non-node values a plan carries: data types, row types,
//! scalar expressions, collations, aggregate calls and entities.
//!
//! ## Types
//!
//! A scalar type is an object `{"type": NAME, "nullable": bool, "precision"?, "scale"?}`.
//! A row type is a list of such objects, each with an extra `"name"` key. A `ROW`
//! typed value nests its row type under `"fields"`.
//!
//! ## Expressions
//!
//! | Expression       | JSON                                             |
//! |------------------|--------------------------------------------------|
//! | canonical literal| raw JSON value                                   |
//! | other literal    | `{"literal": value, "type": T}`                  |
//! | field reference  | `{"input": flat_index, "name": field_name}`      |
//! | correlation      | `{"correl": id, "type": T}`                      |
//! | field access     | `{"field": name, "expr": E}`                     |
//! | dynamic param    | `{"dynamicParam": index, "type": T}`             |
//! | call             | `{"op": name, "operands": [E...], "type"?, "class"?}` |
//!
//! A literal is canonical when its type is exactly what the raw JSON value decodes to:
//! `BOOLEAN`, `BIGINT`, `DOUBLE` or `CHAR(len)`, all `NOT NULL`. Everything else,
//! typed nulls included, carries its type. Decimals travel as strings so no digit is
//! lost to a float.
//!
//! Field references are addressed by their flat index over the concatenated row types
//! of the node's inputs. A call records its type only when it cannot be derived again
//! from the operator and operand types.

use polyalg_core::alg::AggregateCall;
use polyalg_core::catalog::EntityRef;
use polyalg_core::context::AlgContext;
use polyalg_core::error::{AlgError, Result};
use polyalg_core::rex::{LiteralValue, RexBuilder, RexNode, RexRef};
use polyalg_core::traits::{Collation, FieldCollation};
use polyalg_core::types::{DataType, RowType, TypeName};
use ordered_float::OrderedFloat;
use serde_json::{json, Map, Value};

pub fn type_to_json(ty: &DataType) -> Value {
    let mut map = Map::new();
    map.insert("type".into(), Value::from(ty.name().as_str()));
    map.insert("nullable".into(), Value::from(ty.is_nullable()));
    if let Some(precision) = ty.precision() {
        map.insert("precision".into(), Value::from(precision));
    }
    if let Some(scale) = ty.scale() {
        map.insert("scale".into(), Value::from(scale));
    }
    if let Some(fields) = ty.fields() {
        map.insert("fields".into(), row_type_to_json(fields));
    }
    Value::Object(map)
}

pub fn type_from_json(value: &Value) -> Result<DataType> {
    let map = value
        .as_object()
        .ok_or_else(|| AlgError::malformed(format!("expected a type object, got {}", value)))?;
    let name = map
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| AlgError::malformed("type object without 'type'"))?;
    let type_name = TypeName::parse(name)
        .ok_or_else(|| AlgError::malformed(format!("unknown type '{}'", name)))?;
    let nullable = map.get("nullable").and_then(Value::as_bool).unwrap_or(false);

    if let Some(fields) = map.get("fields") {
        return Ok(DataType::row(row_type_from_json(fields)?).with_nullable(nullable));
    }
    let precision = opt_u32(map, "precision")?;
    let scale = opt_u32(map, "scale")?;
    Ok(DataType::new(type_name)
        .with_precision_scale(precision, scale)
        .with_nullable(nullable))
}

fn opt_u32(map: &Map<String, Value>, key: &str) -> Result<Option<u32>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| AlgError::malformed(format!("'{}' must be a small integer, got {}", key, v))),
    }
}

pub fn row_type_to_json(row_type: &RowType) -> Value {
    let fields = row_type
        .fields()
        .iter()
        .map(|field| {
            let mut map = Map::new();
            map.insert("name".into(), Value::from(field.name.as_str()));
            if let Value::Object(ty) = type_to_json(&field.data_type) {
                map.extend(ty);
            }
            Value::Object(map)
        })
        .collect();
    Value::Array(fields)
}

pub fn row_type_from_json(value: &Value) -> Result<RowType> {
    let fields = value
        .as_array()
        .ok_or_else(|| AlgError::malformed(format!("expected a list of fields, got {}", value)))?;
    let mut builder = RowType::builder();
    for field in fields {
        let name = field
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| AlgError::malformed("row type field without 'name'"))?;
        builder.push(name, type_from_json(field)?);
    }
    Ok(builder.build())
}

fn is_canonical(value: &LiteralValue, ty: &DataType) -> bool {
    match value {
        LiteralValue::Boolean(_) => *ty == DataType::boolean(),
        LiteralValue::Integer(_) => *ty == DataType::bigint(),
        LiteralValue::Double(d) => d.0.is_finite() && *ty == DataType::double(),
        LiteralValue::String(s) => {
            *ty == DataType::with_precision(TypeName::Char, s.chars().count() as u32)
        }
        LiteralValue::Null | LiteralValue::Decimal { .. } => false,
    }
}

fn raw_literal(value: &LiteralValue) -> Value {
    match value {
        LiteralValue::Null => Value::Null,
        LiteralValue::Boolean(b) => Value::from(*b),
        LiteralValue::Integer(i) => Value::from(*i),
        LiteralValue::Decimal { .. } => Value::from(value.to_string()),
        LiteralValue::Double(d) => serde_json::Number::from_f64(d.0)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(format!("{:?}", d.0))),
        LiteralValue::String(s) => Value::from(s.as_str()),
    }
}

pub fn literal_to_json(value: &LiteralValue, ty: &DataType) -> Value {
    if is_canonical(value, ty) {
        return raw_literal(value);
    }
    json!({ "literal": raw_literal(value), "type": type_to_json(ty) })
}

/// Raw value of a typed literal, interpreted through its type.
fn literal_value(raw: &Value, ty: &DataType) -> Result<LiteralValue> {
    let mismatch = || AlgError::malformed(format!("literal {} does not fit type {}", raw, ty));
    if raw.is_null() {
        return Ok(LiteralValue::Null);
    }
    match ty.name() {
        TypeName::Decimal => {
            let text = match raw {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return Err(mismatch()),
            };
            LiteralValue::parse_decimal(&text).ok_or_else(mismatch)
        }
        TypeName::Real | TypeName::Double => match raw {
            Value::Number(n) => n.as_f64().map(|f| LiteralValue::Double(OrderedFloat(f))).ok_or_else(mismatch),
            Value::String(s) => s
                .parse::<f64>()
                .map(|f| LiteralValue::Double(OrderedFloat(f)))
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        _ => match raw {
            Value::Bool(b) => Ok(LiteralValue::Boolean(*b)),
            Value::Number(n) => n.as_i64().map(LiteralValue::Integer).ok_or_else(mismatch),
            Value::String(s) => Ok(LiteralValue::String(s.clone())),
            _ => Err(mismatch()),
        },
    }
}

fn canonical_literal(rex: &RexBuilder, raw: &Value) -> Result<RexRef> {
    match raw {
        Value::Bool(b) => Ok(rex.boolean(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(rex.bigint(i))
            } else if let Some(f) = n.as_f64().filter(|_| n.is_f64()) {
                Ok(rex.double(f))
            } else {
                Err(AlgError::malformed(format!("integer literal {} out of range", n)))
            }
        }
        Value::String(s) => Ok(rex.string(s.as_str())),
        Value::Null => Err(AlgError::malformed(
            "untyped null literal; nulls must be written as {\"literal\": null, \"type\": ...}",
        )),
        other => Err(AlgError::malformed(format!("{} is not an expression", other))),
    }
}

/// Encodes expressions over the given input row types.
pub struct RexEncoder<'a> {
    rex: &'a RexBuilder,
    inputs: &'a [RowType],
}

impl<'a> RexEncoder<'a> {
    pub fn new(rex: &'a RexBuilder, inputs: &'a [RowType]) -> Self {
        Self { rex, inputs }
    }

    pub fn encode(&self, expr: &RexRef) -> Value {
        match expr.as_ref() {
            RexNode::Literal { value, ty } => literal_to_json(value, ty),
            RexNode::FieldRef { input, index, .. } => {
                let offset: usize = self
                    .inputs
                    .iter()
                    .take(*input)
                    .map(RowType::field_count)
                    .sum();
                let flat = offset + index;
                let name = self
                    .inputs
                    .get(*input)
                    .and_then(|rt| rt.field(*index))
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| format!("${}", flat));
                json!({ "input": flat, "name": name })
            }
            RexNode::CorrelVariable { id, ty } => json!({ "correl": id, "type": type_to_json(ty) }),
            RexNode::FieldAccess { expr, field, .. } => {
                json!({ "field": field, "expr": self.encode(expr) })
            }
            RexNode::DynamicParam { index, ty } => {
                json!({ "dynamicParam": index, "type": type_to_json(ty) })
            }
            RexNode::Call { op, operands, ty } => {
                let mut map = Map::new();
                map.insert("op".into(), Value::from(op.name()));
                map.insert(
                    "operands".into(),
                    Value::Array(operands.iter().map(|o| self.encode(o)).collect()),
                );
                let derivable = self
                    .rex
                    .call(op, operands.clone())
                    .map(|derived| derived.ty() == ty)
                    .unwrap_or(false);
                if !derivable {
                    map.insert("type".into(), type_to_json(ty));
                }
                if let Some(class) = op.class_name() {
                    map.insert("class".into(), Value::from(class));
                }
                Value::Object(map)
            }
        }
    }

    pub fn encode_list(&self, exprs: &[RexRef]) -> Value {
        Value::Array(exprs.iter().map(|e| self.encode(e)).collect())
    }
}

/// Decodes expressions over the given input row types.
pub struct RexDecoder<'a> {
    rex: RexBuilder,
    context: &'a AlgContext,
    inputs: &'a [RowType],
}

impl<'a> RexDecoder<'a> {
    pub fn new(context: &'a AlgContext, inputs: &'a [RowType]) -> Self {
        Self {
            rex: context.rex_builder(),
            context,
            inputs,
        }
    }

    pub fn decode(&self, value: &Value) -> Result<RexRef> {
        let Value::Object(map) = value else {
            return canonical_literal(&self.rex, value);
        };
        if map.contains_key("literal") {
            let ty = type_from_json(required(map, "type")?)?;
            let literal = literal_value(required(map, "literal")?, &ty)?;
            return Ok(self.rex.literal(literal, ty));
        }
        if let Some(flat) = map.get("input") {
            let flat = as_index(flat, "input")?;
            let (input, index) = self.locate(flat)?;
            let row_type = &self.inputs[input];
            if let (Some(expected), Some(field)) =
                (map.get("name").and_then(Value::as_str), row_type.field(index))
            {
                if field.name != expected {
                    return Err(AlgError::malformed(format!(
                        "input reference {} is '{}', not '{}'",
                        flat, field.name, expected
                    )));
                }
            }
            return self.rex.field_ref(input, index, row_type);
        }
        if let Some(id) = map.get("correl") {
            let id = id
                .as_str()
                .ok_or_else(|| AlgError::malformed("'correl' must be a string"))?;
            return Ok(self.rex.correl(id, type_from_json(required(map, "type")?)?));
        }
        if let Some(field) = map.get("field") {
            let field = field
                .as_str()
                .ok_or_else(|| AlgError::malformed("'field' must be a string"))?;
            let expr = self.decode(required(map, "expr")?)?;
            return self.rex.field_access(expr, field);
        }
        if let Some(index) = map.get("dynamicParam") {
            let index = as_index(index, "dynamicParam")?;
            return Ok(self
                .rex
                .dynamic_param(index, type_from_json(required(map, "type")?)?));
        }
        if let Some(name) = map.get("op") {
            let name = name
                .as_str()
                .ok_or_else(|| AlgError::malformed("'op' must be a string"))?;
            let class = map.get("class").and_then(Value::as_str);
            let op = self.context.operators().resolve(name, class)?;
            let operands = match map.get("operands") {
                Some(list) => self.decode_list(list)?,
                None => Vec::new(),
            };
            return match map.get("type") {
                Some(ty) => self.rex.call_with_type(&op, operands, type_from_json(ty)?),
                None => self.rex.call(&op, operands),
            };
        }
        Err(AlgError::malformed(format!("unrecognized expression {}", value)))
    }

    pub fn decode_list(&self, value: &Value) -> Result<Vec<RexRef>> {
        value
            .as_array()
            .ok_or_else(|| AlgError::malformed(format!("expected a list of expressions, got {}", value)))?
            .iter()
            .map(|e| self.decode(e))
            .collect()
    }

    /// `(input ordinal, field index)` of a flat field index.
    fn locate(&self, flat: usize) -> Result<(usize, usize)> {
        let mut offset = 0;
        for (ordinal, row_type) in self.inputs.iter().enumerate() {
            if flat < offset + row_type.field_count() {
                return Ok((ordinal, flat - offset));
            }
            offset += row_type.field_count();
        }
        Err(AlgError::malformed(format!(
            "input reference {} out of range; inputs have {} fields",
            flat, offset
        )))
    }
}

fn required<'v>(map: &'v Map<String, Value>, key: &str) -> Result<&'v Value> {
    map.get(key)
        .ok_or_else(|| AlgError::malformed(format!("missing '{}'", key)))
}

pub(crate) fn as_index(value: &Value, what: &str) -> Result<usize> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| AlgError::malformed(format!("'{}' must be a non-negative integer, got {}", what, value)))
}

pub fn collation_to_json(collation: &Collation) -> Result<Value> {
    Ok(serde_json::to_value(collation.keys())?)
}

pub fn collation_from_json(value: &Value) -> Result<Collation> {
    let keys: Vec<FieldCollation> = serde_json::from_value(value.clone())?;
    Ok(Collation::of(keys))
}

pub fn agg_calls_to_json(calls: &[AggregateCall]) -> Value {
    let calls = calls
        .iter()
        .map(|call| {
            let mut map = Map::new();
            map.insert("agg".into(), Value::from(call.op.name()));
            if let Some(class) = call.op.class_name() {
                map.insert("class".into(), Value::from(class));
            }
            map.insert("distinct".into(), Value::from(call.distinct));
            map.insert("operands".into(), json!(call.args));
            if let Some(filter) = call.filter {
                map.insert("filter".into(), Value::from(filter));
            }
            map.insert("type".into(), type_to_json(&call.ty));
            if let Some(name) = &call.name {
                map.insert("name".into(), Value::from(name.as_str()));
            }
            Value::Object(map)
        })
        .collect();
    Value::Array(calls)
}

/// Aggregate calls over `input`, retyped for `group_count` grouping columns. A written
/// type takes precedence over the derived one.
pub fn agg_calls_from_json(
    context: &AlgContext,
    value: &Value,
    input: &RowType,
    group_count: usize,
) -> Result<Vec<AggregateCall>> {
    let calls = value
        .as_array()
        .ok_or_else(|| AlgError::malformed(format!("expected a list of aggregate calls, got {}", value)))?;
    calls
        .iter()
        .map(|call| {
            let map = call
                .as_object()
                .ok_or_else(|| AlgError::malformed(format!("expected an aggregate call, got {}", call)))?;
            let name = required(map, "agg")?
                .as_str()
                .ok_or_else(|| AlgError::malformed("'agg' must be a string"))?;
            let class = map.get("class").and_then(Value::as_str);
            let op = context.operators().resolve(name, class)?;
            let distinct = map.get("distinct").and_then(Value::as_bool).unwrap_or(false);
            let args = match map.get("operands") {
                Some(Value::Array(args)) => args
                    .iter()
                    .map(|a| as_index(a, "operands"))
                    .collect::<Result<Vec<_>>>()?,
                Some(other) => {
                    return Err(AlgError::malformed(format!("'operands' must be a list, got {}", other)))
                }
                None => Vec::new(),
            };
            let filter = match map.get("filter") {
                None | Some(Value::Null) => None,
                Some(f) => Some(as_index(f, "filter")?),
            };
            let alias = map.get("name").and_then(Value::as_str).map(str::to_string);
            let mut call = AggregateCall::create_filtered(
                context.type_system(),
                op,
                distinct,
                args,
                filter,
                alias,
                input,
                group_count,
            )?;
            if let Some(ty) = map.get("type") {
                call.ty = type_from_json(ty)?;
            }
            Ok(call)
        })
        .collect()
}

pub fn entity_to_json(entity: &EntityRef) -> Value {
    json!([entity.namespace, entity.name])
}

pub fn entity_from_json(context: &AlgContext, value: &Value) -> Result<EntityRef> {
    let parts: Option<Vec<&str>> = value
        .as_array()
        .and_then(|parts| parts.iter().map(Value::as_str).collect());
    match parts.as_deref() {
        Some([namespace, name]) => context
            .catalog()
            .entity(namespace, name)
            .ok_or_else(|| AlgError::UnknownEntity(format!("{}.{}", namespace, name))),
        _ => Err(AlgError::malformed(format!(
            "entity must be [namespace, name], got {}",
            value
        ))),
    }
}
