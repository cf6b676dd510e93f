//! # Projection Pushdown Rule
//!
//! Pushes the column requirements of a Project into the Scan directly below it. The
//! scan is narrowed to the entity fields the projection references, and the
//! projection is rewritten against the narrower row.
//!
//! ```text
//! Before: Project([$3, +($1, 1)], Scan(emp))
//! After:  Project([$1, +($0, 1)], Scan(emp, fields=[1, 3]))
//! ```
//!
//! When the rewritten projection is the identity (same fields, same order, same
//! names) and identity pruning is enabled, only the narrowed scan is proposed.
//!
//! The narrowed scan keeps the entity's field order, so a projection that already
//! references every scan field is left alone. That is also the rule's fixed point.

use polyalg_core::AlgNode;
use polyalg_core::alg::{downcast, AlgRef, Project, Scan};
use polyalg_core::error::Result;
use polyalg_core::pattern::Pattern;
use polyalg_core::rex::{remap_field_refs, RexNode};
use polyalg_core::rule::{Rule, RuleCall, RuleType};
use std::sync::Arc;
use tracing::trace;

/// Narrow a scan to the fields its parent projection reads.
pub struct ProjectScanPushdownRule;

impl Rule for ProjectScanPushdownRule {
    fn name(&self) -> &str {
        "ProjectScanPushdown"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Transformation
    }

    fn pattern(&self) -> Pattern {
        // Match: Project(Scan)
        Pattern::project_scan()
    }

    fn on_match(&self, call: &mut RuleCall<'_>) -> Result<Vec<AlgRef>> {
        let Some(project) = downcast::<Project>(call.node()) else {
            return Ok(vec![]);
        };
        let Some(scan) = downcast::<Scan>(project.input()) else {
            return Ok(vec![]);
        };

        let mut used: Vec<usize> = project
            .exprs()
            .iter()
            .flat_map(|e| e.field_refs())
            .map(|(_, index)| index)
            .collect();
        used.sort_unstable();
        used.dedup();
        if used.len() == scan.row_type().field_count() {
            return Ok(vec![]);
        }

        let entity_fields: Vec<usize> = used.iter().map(|&i| scan.source_field(i)).collect();
        trace!(entity = %scan.entity(), fields = ?entity_fields, "narrowing scan");
        let narrowed = Scan::narrowed(scan.traits().clone(), scan.entity().clone(), entity_fields)?;

        let exprs = project
            .exprs()
            .iter()
            .map(|e| {
                remap_field_refs(e, &mut |input, index, ty| {
                    let position = used.iter().position(|&u| u == index)?;
                    Some(Arc::new(RexNode::FieldRef {
                        input,
                        index: position,
                        ty: ty.clone(),
                    }))
                })
            })
            .collect();
        let residual = Project::create(
            project.traits().clone(),
            narrowed.clone(),
            exprs,
            project.row_type().field_names(),
        )?;

        let keep_residual = downcast::<Project>(&residual).map_or(true, |p| !p.is_identity());
        if call.config().prune_identity_projects && !keep_residual {
            return Ok(vec![narrowed]);
        }
        Ok(vec![residual])
    }
}
