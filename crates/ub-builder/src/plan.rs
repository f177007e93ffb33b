use tracing::{debug, info};

use crate::config::BuildConfig;
use crate::types::{Plan, PlanSelection};
use crate::{Error, Operation, Result, ServerApi};

/// Plan picked when neither a plan name nor CPU/memory are configured.
pub const DEFAULT_PLAN: &str = "1xCPU-1GB";

/// `value` when positive, otherwise `fallback`.
pub fn coalesce_positive(fallback: i32, value: i32) -> i32 {
    if value > 0 { value } else { fallback }
}

/// Pick a plan from `catalog`:
///
/// 1. a non-empty `name` must match a plan exactly, else `PlanNotFound`;
/// 2. positive `cpu` and `memory` select the plan with exactly those values,
///    falling back to custom sizing;
/// 3. with neither, the `DEFAULT_PLAN` entry, or custom sizing if absent.
///
/// Any other combination (only one of `cpu`/`memory` set) is custom sizing.
pub fn select_plan(
    catalog: &[Plan],
    name: Option<&str>,
    cpu: i32,
    memory: i32,
) -> Result<PlanSelection> {
    match name.filter(|n| !n.is_empty()) {
        Some(name) => {
            find(catalog, |plan| plan.name == name).ok_or_else(|| Error::PlanNotFound(name.into()))
        }
        None if cpu > 0 && memory > 0 => Ok(find(catalog, |plan| {
            plan.core_number == cpu && plan.memory_amount == memory
        })
        .unwrap_or(PlanSelection::Custom)),
        None if cpu <= 0 && memory <= 0 => {
            Ok(find(catalog, |plan| plan.name == DEFAULT_PLAN).unwrap_or(PlanSelection::Custom))
        }
        None => Ok(PlanSelection::Custom),
    }
}

fn find(catalog: &[Plan], pred: impl Fn(&Plan) -> bool) -> Option<PlanSelection> {
    catalog
        .iter()
        .find(|plan| pred(*plan))
        .cloned()
        .map(PlanSelection::Named)
}

/// Fetch the catalog once and resolve the configured plan against it.
pub async fn resolve_plan(api: &dyn ServerApi, config: &BuildConfig) -> Result<PlanSelection> {
    let catalog = api
        .list_plans()
        .await
        .map_err(|e| Error::remote(Operation::ListPlans, &config.zone, e))?;
    debug!(plans = catalog.len(), "fetched plan catalog");

    let selection = select_plan(&catalog, config.plan.as_deref(), config.cpu, config.memory)?;
    match &selection {
        PlanSelection::Named(plan) => info!(plan = %plan.name, "using plan"),
        PlanSelection::Custom => {
            info!(cpu = config.cpu, memory = config.memory, "using custom sizing")
        }
    }
    Ok(selection)
}
