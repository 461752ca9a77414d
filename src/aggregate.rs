use crate::estimate::monthly_cost;
use crate::models::{CostBreakdown, CostReport, UsageProfile, VirtualMachine, VmCost, Workload};
use chrono::Utc;

/// Hours per month and savings discount applied to one workload class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioHours {
    pub nominal: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub savings_discount: f64,
}

const VIRTUAL_DESKTOP: ScenarioHours = ScenarioHours {
    nominal: 200.0,
    minimum: 100.0,
    maximum: UsageProfile::HOURS_PER_MONTH,
    savings_discount: 0.87,
};

const ALWAYS_ON: ScenarioHours = ScenarioHours {
    nominal: UsageProfile::HOURS_PER_MONTH,
    minimum: UsageProfile::HOURS_PER_MONTH,
    maximum: UsageProfile::HOURS_PER_MONTH,
    savings_discount: 0.60,
};

/// Classifies a VM by naming convention: a name containing `marker`
/// (case-sensitive, `"AVD"` by default) is a virtual desktop host, anything
/// else runs around the clock. An empty marker matches nothing.
pub fn classify_workload(name: &str, marker: &str) -> Workload {
    if !marker.is_empty() && name.contains(marker) {
        Workload::VirtualDesktop
    } else {
        Workload::AlwaysOn
    }
}

pub fn scenario_hours(workload: Workload) -> ScenarioHours {
    match workload {
        Workload::VirtualDesktop => VIRTUAL_DESKTOP,
        Workload::AlwaysOn => ALWAYS_ON,
    }
}

pub fn breakdown(hourly_cost: f64, workload: Workload) -> CostBreakdown {
    let s = scenario_hours(workload);
    let cost = |hours: f64, discount: f64| {
        monthly_cost(hourly_cost, UsageProfile::hours(hours).with_discount(discount))
    };

    CostBreakdown {
        nominal: cost(s.nominal, 1.0),
        minimum: cost(s.minimum, 1.0),
        maximum: cost(s.maximum, 1.0),
        nominal_with_savings: cost(s.nominal, s.savings_discount),
        minimum_with_savings: cost(s.minimum, s.savings_discount),
        maximum_with_savings: cost(s.maximum, s.savings_discount),
    }
}

pub fn vm_cost(vm: &VirtualMachine, hourly_cost: Option<f64>, marker: &str) -> VmCost {
    let workload = classify_workload(&vm.name, marker);
    VmCost {
        name: vm.name.clone(),
        resource_group: vm.resource_group.clone(),
        location: vm.location.clone(),
        vm_size: vm.vm_size.clone(),
        power_state: vm.power_state.clone(),
        workload,
        hourly_cost,
        breakdown: hourly_cost.map(|h| breakdown(h, workload)),
    }
}

/// Sums every figure over the priced lines; unpriced lines contribute nothing.
pub fn totals(lines: &[VmCost]) -> CostBreakdown {
    let mut sum = CostBreakdown::default();
    for b in lines.iter().filter_map(|l| l.breakdown) {
        sum += b;
    }
    sum
}

pub fn build_report(subscription_id: &str, lines: Vec<VmCost>) -> CostReport {
    let totals = totals(&lines);
    CostReport {
        subscription_id: subscription_id.to_string(),
        lines,
        totals,
        generated_at: Utc::now(),
    }
}
