use crate::models::{
    CostBreakdown, CostReport, GroupListing, ResourceCost, ResourceKind, Subscription, VmCost,
    Workload, CURRENCY_SYMBOL,
};
use crossterm::style::Stylize;
use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::Path;

pub const CSV_HEADER: &str =
    "resource_group,type,name,region,sku,hourly_cost,monthly_cost,disk_size_gb";

/// Console styling, switched off for `--no-color` and `NO_COLOR`.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub color: bool,
}

impl Palette {
    pub fn detect(no_color_flag: bool) -> Self {
        Self::resolve(no_color_flag, std::env::var_os("NO_COLOR").as_deref())
    }

    fn resolve(no_color_flag: bool, no_color_env: Option<&OsStr>) -> Self {
        let env_disabled = no_color_env.is_some_and(|v| !v.is_empty());
        if no_color_flag || env_disabled {
            Self::plain()
        } else {
            Self { color: true }
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    fn heading(self, text: &str) -> String {
        if self.color {
            text.bold().cyan().to_string()
        } else {
            text.to_string()
        }
    }

    fn money(self, amount: f64) -> String {
        let text = money(amount);
        if self.color {
            text.as_str().green().to_string()
        } else {
            text
        }
    }

    fn warn(self, text: &str) -> String {
        if self.color {
            text.yellow().to_string()
        } else {
            text.to_string()
        }
    }
}

pub fn money(amount: f64) -> String {
    format!("{CURRENCY_SYMBOL}{amount:.2}")
}

pub fn render_subscriptions(
    subs: &[Subscription],
    active: Option<&str>,
    palette: Palette,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", palette.heading("Available subscriptions:"));
    for sub in subs {
        let marker = if active.is_some_and(|a| a.eq_ignore_ascii_case(&sub.id)) {
            " *"
        } else {
            ""
        };
        let state = match sub.state.as_deref() {
            Some(state) if !state.eq_ignore_ascii_case("Enabled") => format!(" [{state}]"),
            _ => String::new(),
        };
        let _ = writeln!(out, "- {} ({}){state}{marker}", sub.id, sub.display_name);
    }
    match active {
        Some(id) => {
            let _ = writeln!(out, "Active subscription: {id}");
        }
        None => {
            let hint =
                "No active subscription set. Use the 'subscription --set' command to set one.";
            let _ = writeln!(out, "{}", palette.warn(hint));
        }
    }
    out
}

fn resource_line(rc: &ResourceCost, palette: Palette) -> String {
    let r = &rc.record;
    let mut line = format!("  - {}: {}", r.type_name, r.name);
    if let Some(sku) = &r.sku {
        let _ = write!(line, " [{sku}]");
    }
    if let Some(size) = r.disk_size_gb {
        let _ = write!(line, " {size} GB");
    }
    if let Some(hourly) = rc.hourly_cost {
        let _ = write!(line, " | {}/hr", palette.money(hourly));
    }
    if let Some(monthly) = rc.monthly_cost {
        let _ = write!(line, " | {}/month", palette.money(monthly));
    }
    line
}

/// Groups then resources, in the order the listing was sorted into.
pub fn render_resources(
    subscription_id: &str,
    groups: &[GroupListing],
    palette: Palette,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        palette.heading(&format!("Listing resources for subscription: {subscription_id}"))
    );
    for group in groups {
        let _ = writeln!(out, "- Resource Group: {}", group.name);
        for rc in &group.resources {
            let _ = writeln!(out, "{}", resource_line(rc, palette));
        }
    }
    out
}

fn vm_block(line: &VmCost, palette: Palette) -> String {
    let mut out = String::new();
    let state = line.power_state.as_deref().unwrap_or("unknown");
    let _ = writeln!(out, "- Name: {} ({}) [{state}]", line.name, line.vm_size);
    let (Some(hourly), Some(b)) = (line.hourly_cost, line.breakdown) else {
        let _ = writeln!(out, "  - {}", palette.warn("Price unavailable"));
        return out;
    };
    let _ = writeln!(out, "  - Hourly Cost: {}", palette.money(hourly));
    let _ = writeln!(out, "  - Monthly Cost: {}", palette.money(b.nominal));
    if line.workload == Workload::VirtualDesktop {
        let _ = writeln!(out, "  - Minimum Cost: {}", palette.money(b.minimum));
        let _ = writeln!(out, "  - Maximum Cost: {}", palette.money(b.maximum));
    }
    out
}

pub fn render_totals(totals: &CostBreakdown, palette: Palette) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Minimum Monthly Cost for all VMs: {} | {} with savings",
        palette.money(totals.minimum),
        palette.money(totals.minimum_with_savings)
    );
    let _ = writeln!(
        out,
        "Maximum Monthly Cost for all VMs: {} | {} with savings",
        palette.money(totals.maximum),
        palette.money(totals.maximum_with_savings)
    );
    let _ = writeln!(
        out,
        "Total Estimated Cost per Month for all VMs: {} | {} with savings",
        palette.money(totals.nominal),
        palette.money(totals.nominal_with_savings)
    );
    out
}

pub fn render_vm_report(report: &CostReport, palette: Palette) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        palette.heading(&format!(
            "Compute resources for subscription: {}",
            report.subscription_id
        ))
    );
    for line in &report.lines {
        out.push_str(&vm_block(line, palette));
    }
    let unpriced = report.lines.iter().filter(|l| l.breakdown.is_none()).count();
    if unpriced > 0 {
        let note = format!("{unpriced} VM(s) without a retail price are excluded from totals");
        let _ = writeln!(out, "{}", palette.warn(&note));
    }
    out.push_str(&render_totals(&report.totals, palette));
    let _ = writeln!(
        out,
        "Generated at {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    out
}

pub fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn csv_row(rc: &ResourceCost) -> String {
    let r = &rc.record;
    let hourly = match r.kind {
        ResourceKind::Disk => String::new(),
        _ => rc.hourly_cost.map(|h| format!("{h:.3}")).unwrap_or_default(),
    };
    [
        csv_field(&r.resource_group),
        csv_field(&r.type_name),
        csv_field(&r.name),
        csv_field(&r.location),
        csv_field(r.sku.as_deref().unwrap_or_default()),
        hourly,
        rc.monthly_cost.map(|m| format!("{m:.2}")).unwrap_or_default(),
        r.disk_size_gb.map(|s| s.to_string()).unwrap_or_default(),
    ]
    .join(",")
}

/// CSV document with one row per resource; VM extensions are left out.
pub fn to_csv(groups: &[GroupListing]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for rc in groups.iter().flat_map(|g| &g.resources) {
        if rc.record.kind == ResourceKind::VmExtension {
            continue;
        }
        out.push_str(&csv_row(rc));
        out.push('\n');
    }
    out
}

pub fn write_csv(path: &Path, groups: &[GroupListing]) -> std::io::Result<usize> {
    std::fs::write(path, to_csv(groups))?;
    Ok(groups
        .iter()
        .flat_map(|g| &g.resources)
        .filter(|rc| rc.record.kind != ResourceKind::VmExtension)
        .count())
}
