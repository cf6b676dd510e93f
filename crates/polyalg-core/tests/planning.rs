//! End-to-end planner tests with the built-in rule set.
//!
//! Plans are built over a small two-entity catalog (`emp`, `dept`), optimized to the
//! interpreted convention, and checked for shape, convergence and failure modes.

use polyalg_core::alg::{
    downcast, explain, Aggregate, AggregateCall, AlgRef, Filter, Join, JoinType, Project, Scan,
};
use polyalg_core::catalog::{EntityRef, InMemoryCatalog};
use polyalg_core::config::PlannerConfig;
use polyalg_core::context::AlgContext;
use polyalg_core::cost::DefaultCostModel;
use polyalg_core::error::AlgError;
use polyalg_core::operator::OperatorKind;
use polyalg_core::planner::{Planner, PlannerState};
use polyalg_core::rule::RuleRegistry;
use polyalg_core::stats::Statistics;
use polyalg_core::traits::{Collation, Convention, FieldCollation, Prefer, TraitSet};
use polyalg_core::types::{DataType, RowType};
use polyalg_rules::default_rule_registry;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn emp() -> EntityRef {
    let row_type = RowType::builder()
        .add("id", DataType::integer())
        .add("name", DataType::varchar(Some(20)))
        .add("dept", DataType::integer().with_nullable(true))
        .add("salary", DataType::decimal(10, 2))
        .build();
    EntityRef::new("public", "emp", row_type)
}

fn dept() -> EntityRef {
    let row_type = RowType::builder()
        .add("deptno", DataType::integer())
        .add("dname", DataType::varchar(Some(10)))
        .build();
    EntityRef::new("public", "dept", row_type)
}

fn context() -> AlgContext {
    let mut catalog = InMemoryCatalog::new();
    catalog.add_entity(emp(), Some(Statistics::new(14.0, 1400.0)));
    catalog.add_entity(dept(), Some(Statistics::new(4.0, 80.0)));
    AlgContext::new(Arc::new(catalog))
}

fn planner() -> Planner {
    init_tracing();
    Planner::new(context(), Arc::new(default_rule_registry()))
}

/// `Filter(name = 'SMITH', Project([name, id], Scan(emp)))`
fn filter_over_project() -> AlgRef {
    let ctx = context();
    let rex = ctx.rex_builder();
    let scan = Scan::create(TraitSet::abstract_(), emp());
    let project = Project::with_derived_names(
        TraitSet::abstract_(),
        scan.clone(),
        vec![
            rex.field_ref(0, 1, scan.row_type()).unwrap(),
            rex.field_ref(0, 0, scan.row_type()).unwrap(),
        ],
    )
    .unwrap();
    let name = rex.field_ref(0, 0, project.row_type()).unwrap();
    let condition = rex.equals(name, rex.string("SMITH")).unwrap();
    Filter::create(TraitSet::abstract_(), project, condition).unwrap()
}

/// `Filter(dname = 'SALES', Filter(id > 7000, Join(emp, dept, dept = deptno)))`
fn filters_over_join() -> AlgRef {
    let ctx = context();
    let rex = ctx.rex_builder();
    let (emp, dept) = (
        Scan::create(TraitSet::abstract_(), emp()),
        Scan::create(TraitSet::abstract_(), dept()),
    );
    let on = rex
        .equals(
            rex.field_ref(0, 2, emp.row_type()).unwrap(),
            rex.field_ref(1, 0, dept.row_type()).unwrap(),
        )
        .unwrap();
    let join = Join::create(TraitSet::abstract_(), emp, dept, on, JoinType::Inner).unwrap();
    let id = rex.field_ref(0, 0, join.row_type()).unwrap();
    let lower = Filter::create(
        TraitSet::abstract_(),
        join.clone(),
        rex.call_kind(OperatorKind::GreaterThan, vec![id, rex.integer(7000)])
            .unwrap(),
    )
    .unwrap();
    let dname = rex.field_ref(0, 5, join.row_type()).unwrap();
    Filter::create(
        TraitSet::abstract_(),
        lower,
        rex.equals(dname, rex.string("SALES")).unwrap(),
    )
    .unwrap()
}

fn type_names(plan: &AlgRef) -> Vec<String> {
    let mut names = vec![plan.type_name()];
    let mut current = plan.clone();
    while let Some(first) = current.inputs().first().cloned() {
        names.push(first.type_name());
        current = first;
    }
    names
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_project_pushed_into_scan_and_lowered() {
    let mut planner = planner();
    let plan = planner
        .optimize(filter_over_project(), &TraitSet::of(Convention::Interpreted))
        .unwrap();
    assert_eq!(planner.state(), PlannerState::Converged);
    assert_eq!(
        type_names(&plan),
        vec![
            "algebra.interpreted.Interpretable",
            "algebra.compiled.CompiledFilter",
            "algebra.compiled.CompiledProject",
            "algebra.compiled.CompiledScan",
        ]
    );
    let project = plan.inputs()[0].inputs()[0].clone();
    let scan = downcast::<Scan>(&project.inputs()[0]).unwrap().fields().map(|f| f.to_vec());
    assert_eq!(scan, Some(vec![0, 1]));
    assert_eq!(plan.row_type(), filter_over_project().row_type());
}

#[test]
fn test_filters_fold_into_join_condition() {
    let mut planner = planner();
    let explored = planner.explore(filters_over_join()).unwrap();
    let join = downcast::<Join>(&explored).expect("filters should be absorbed");
    assert_eq!(
        join.condition().to_string(),
        "AND(=($2, $1.0), >($0, 7000), =($1.1, 'SALES'))"
    );
}

#[test]
fn test_converged_plan_is_a_fixed_point() {
    for plan in [filter_over_project(), filters_over_join()] {
        let once = planner().explore(plan).unwrap();
        let mut again = planner();
        let twice = again.explore(once.clone()).unwrap();
        assert_eq!(explain(&once), explain(&twice));
    }
}

#[test]
fn test_cost_model_agrees_with_rule_order() {
    let mut plain = planner();
    let mut costed = planner().with_cost_model(Arc::new(DefaultCostModel::default()));
    let required = TraitSet::of(Convention::Interpreted);
    let a = plain.optimize(filters_over_join(), &required).unwrap();
    let b = costed.optimize(filters_over_join(), &required).unwrap();
    assert_eq!(explain(&a), explain(&b));
}

#[test]
fn test_required_collation_adds_sort() {
    let mut planner = planner();
    let collation = Collation::of(vec![FieldCollation::desc(1)]);
    let required = TraitSet::of(Convention::Interpreted).with_collation(collation.clone());
    let plan = planner.optimize(filter_over_project(), &required).unwrap();
    assert_eq!(
        type_names(&plan)[..2],
        ["algebra.interpreted.Interpretable", "algebra.compiled.CompiledSort"]
    );
    assert_eq!(plan.traits().collation(), &collation);
    assert!(plan.traits().satisfies(&required));
}

#[test]
fn test_prefer_array_reaches_every_compiled_node() {
    let config = PlannerConfig {
        prefer: Prefer::Array,
        ..PlannerConfig::default()
    };
    let mut planner = planner().with_config(config);
    let plan = planner
        .optimize(filter_over_project(), &TraitSet::of(Convention::Compiled))
        .unwrap();
    assert!(explain(&plan).lines().all(|line| line.contains("format=[ARRAY]")));
}

#[test]
fn test_missing_interpreted_rule_is_infeasible() {
    let mut rules = RuleRegistry::new();
    for rule in polyalg_rules::compiled::CompiledRule::all() {
        rules.add_rule(Box::new(rule));
    }
    let mut planner = Planner::new(context(), Arc::new(rules));
    let err = planner
        .optimize(filter_over_project(), &TraitSet::of(Convention::Interpreted))
        .unwrap_err();
    match err {
        AlgError::PlannerInfeasible { kind, convention } => {
            assert_eq!(kind, "Filter");
            assert_eq!(convention, "INTERPRETED");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(planner.state(), PlannerState::Infeasible);
}

#[test]
fn test_single_round_limit_still_converts() {
    let config = PlannerConfig {
        max_rounds: 1,
        ..PlannerConfig::default()
    };
    let mut planner = planner().with_config(config);
    let plan = planner
        .optimize(filters_over_join(), &TraitSet::of(Convention::Interpreted))
        .unwrap();
    assert_eq!(plan.traits().convention(), Convention::Interpreted);
}

/// `SUM(salary) AS alias` per `dept`. Two of these differ only in the alias, which
/// explain does not show.
fn salary_per_dept(ctx: &AlgContext, alias: &str) -> AlgRef {
    let scan = Scan::create(TraitSet::abstract_(), emp());
    let sum = AggregateCall::create(
        ctx.type_system(),
        ctx.operators().get(OperatorKind::Sum).unwrap(),
        false,
        vec![3],
        Some(alias.to_string()),
        scan.row_type(),
        1,
    )
    .unwrap();
    Aggregate::create(TraitSet::abstract_(), scan, vec![2], vec![sum]).unwrap()
}

#[test]
fn test_equal_explain_subtrees_convert_separately() {
    let ctx = context();
    let left = salary_per_dept(&ctx, "a");
    let right = salary_per_dept(&ctx, "b");
    assert_eq!(explain(&left), explain(&right));
    let join = Join::create(
        TraitSet::abstract_(),
        left,
        right,
        ctx.rex_builder().boolean(true),
        JoinType::Inner,
    )
    .unwrap();

    let mut planner = planner();
    let plan = planner
        .optimize(join.clone(), &TraitSet::of(Convention::Compiled))
        .unwrap();
    assert_eq!(plan.row_type(), join.row_type());
    assert_eq!(plan.row_type().field_names(), vec!["dept", "a", "dept", "b"]);
    let inputs = plan.inputs();
    assert_eq!(inputs[1].row_type().field_names(), vec!["dept", "b"]);
}
