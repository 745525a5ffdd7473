//! Plain-text narrative insights derived from the published projections.

use crate::{
    demand::AlignmentRow,
    projection::{GrowthRow, RiskRow},
    stats::mean,
    summary::KpiSnapshot,
};
use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of most recent defined observations an outlook is judged on.
pub const RECENT_WINDOW: usize = 5;

/// Mean recent growth (percent) beyond which momentum counts as strong or declining.
pub const GROWTH_THRESHOLD_PCT: f64 = 2.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
pub enum GrowthOutlook {
    #[display("Revenue shows strong short-term growth momentum.")]
    Strong,
    #[display("Revenue is declining in recent periods, growth intervention needed.")]
    Declining,
    #[display("Revenue growth is stable but slow, optimization opportunity exists.")]
    Stable,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
pub enum RiskOutlook {
    #[display("Market volatility detected, elevated business risk in recent periods.")]
    Elevated,
    #[display("Market conditions appear stable with low volatility risk.")]
    Stable,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
pub enum DemandOutlook {
    #[display("Demand is increasing faster than revenue, potential conversion or pricing gap.")]
    DemandLeading,
    #[display("Revenue growth outpaces demand, momentum driven by market activity.")]
    RevenueLeading,
    #[display("Demand and revenue trends are aligned.")]
    Aligned,
}

/// Mean of the last [`RECENT_WINDOW`] defined values.
fn recent_mean(values: impl DoubleEndedIterator<Item = Option<f64>>) -> Option<f64> {
    let recent = values.rev().flatten().take(RECENT_WINDOW).collect_vec();
    mean(&recent)
}

pub fn growth_outlook(growth: &[GrowthRow]) -> GrowthOutlook {
    match recent_mean(growth.iter().map(|row| row.revenue_growth_pct)) {
        Some(avg) if avg > GROWTH_THRESHOLD_PCT => GrowthOutlook::Strong,
        Some(avg) if avg < -GROWTH_THRESHOLD_PCT => GrowthOutlook::Declining,
        _ => GrowthOutlook::Stable,
    }
}

pub fn risk_outlook(risk: &[RiskRow]) -> RiskOutlook {
    if risk.iter().any(|row| row.high_volatility_flag) {
        RiskOutlook::Elevated
    } else {
        RiskOutlook::Stable
    }
}

pub fn demand_outlook(alignment: &[AlignmentRow]) -> DemandOutlook {
    match recent_mean(alignment.iter().map(|row| row.demand_revenue_gap)) {
        Some(gap) if gap > 0.0 => DemandOutlook::DemandLeading,
        Some(gap) if gap < 0.0 => DemandOutlook::RevenueLeading,
        _ => DemandOutlook::Aligned,
    }
}

/// Full insight report, rendered via [`fmt::Display`] as the `auto_insights.txt` body.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct InsightReport {
    pub kpis: KpiSnapshot,
    pub growth: GrowthOutlook,
    pub risk: RiskOutlook,
    pub demand: DemandOutlook,
}

impl InsightReport {
    pub fn generate(
        kpis: KpiSnapshot,
        growth: &[GrowthRow],
        risk: &[RiskRow],
        alignment: &[AlignmentRow],
    ) -> Self {
        Self {
            kpis,
            growth: growth_outlook(growth),
            risk: risk_outlook(risk),
            demand: demand_outlook(alignment),
        }
    }
}

impl fmt::Display for InsightReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Executive Summary:")?;
        writeln!(f, "- Total Revenue Observed: {:.2}", self.kpis.total_revenue)?;
        writeln!(f, "- Average Transaction Price: {:.2}", self.kpis.avg_price)?;
        writeln!(f)?;
        writeln!(f, "{}", self.growth)?;
        writeln!(f)?;
        writeln!(f, "{}", self.risk)?;
        writeln!(f)?;
        writeln!(f, "{}", self.demand)
    }
}
