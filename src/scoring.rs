//! Derived-value computation: AI-maturity scoring and the ROI model.
//!
//! Everything here is pure arithmetic over fixed tables; no I/O, no
//! failure modes for well-typed input.

use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// AI maturity
// ---------------------------------------------------------------------------

/// Points awarded for enumerated string answers, out of 10.
const ANSWER_POINTS: [(&str, u32); 5] = [
    ("none", 0),
    ("exploring", 3),
    ("piloting", 5),
    ("scaling", 8),
    ("operational", 10),
];

const LIKERT_MAX: u32 = 5;
const ANSWER_MAX: u32 = 10;

/// Recommendation copy per maturity band, most impactful first.
/// The band structure is the contract; the copy is product text.
const BAND_RECOMMENDATIONS: [(&str, [&str; 4]); 4] = [
    (
        "Beginner",
        [
            "Begin with foundational data hygiene",
            "Identify one high-friction workflow to automate first",
            "Assign a single owner for AI initiatives",
            "Run a low-risk pilot with an off-the-shelf tool",
        ],
    ),
    (
        "Developing",
        [
            "Consolidate data sources into a shared warehouse",
            "Upskill one team on prompt and workflow design",
            "Define measurable success criteria for each pilot",
            "Establish a lightweight AI usage policy",
        ],
    ),
    (
        "Intermediate",
        [
            "Move proven pilots into production workflows",
            "Introduce model and prompt evaluation gates",
            "Integrate AI outputs into existing reporting",
            "Budget for dedicated AI tooling and training",
        ],
    ),
    (
        "Advanced",
        [
            "Automate end-to-end processes across departments",
            "Stand up continuous monitoring for model drift",
            "Negotiate enterprise agreements with AI vendors",
            "Publish internal case studies to scale adoption",
        ],
    ),
];

const EMPTY_RESPONSES_RECOMMENDATION: &str = "Begin with foundational data hygiene";

#[derive(Debug, Clone, PartialEq)]
pub struct MaturityResult {
    /// Normalized 0–100.
    pub score: i64,
    pub band: &'static str,
    pub recommendations: Vec<String>,
}

/// Scores one answer: Likert integers 1–5 count face value out of 5,
/// enumerated strings score out of 10 via the fixed table. Unknown
/// strings earn nothing but still widen the denominator.
fn score_answer(answer: &Value) -> Option<(u32, u32)> {
    match answer {
        Value::Number(n) => {
            let v = n.as_i64()?;
            if (1..=LIKERT_MAX as i64).contains(&v) {
                Some((v as u32, LIKERT_MAX))
            } else {
                None
            }
        }
        Value::String(s) => {
            let key = s.trim().to_lowercase();
            let points = ANSWER_POINTS
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, points)| *points)
                .unwrap_or(0);
            Some((points, ANSWER_MAX))
        }
        _ => None,
    }
}

/// Computes the maturity score and band recommendations from the raw
/// question-id → answer mapping. Empty (or entirely unscorable) responses
/// yield score 0 with the single foundational recommendation.
pub fn assess_maturity(responses: &Map<String, Value>) -> MaturityResult {
    let mut points = 0u32;
    let mut max_points = 0u32;
    for answer in responses.values() {
        if let Some((p, max)) = score_answer(answer) {
            points += p;
            max_points += max;
        }
    }

    if max_points == 0 {
        return MaturityResult {
            score: 0,
            band: BAND_RECOMMENDATIONS[0].0,
            recommendations: vec![EMPTY_RESPONSES_RECOMMENDATION.to_string()],
        };
    }

    let score = (100.0 * f64::from(points) / f64::from(max_points)).round() as i64;
    let (band, recommendations) = band_for_score(score);
    MaturityResult {
        score,
        band,
        recommendations: recommendations.iter().map(|s| s.to_string()).collect(),
    }
}

/// Bands partition [0, 100]: [0,25) [25,50) [50,75) [75,100].
fn band_for_score(score: i64) -> (&'static str, [&'static str; 4]) {
    let idx = match score {
        s if s < 25 => 0,
        s if s < 50 => 1,
        s if s < 75 => 2,
        _ => 3,
    };
    BAND_RECOMMENDATIONS[idx]
}

// ---------------------------------------------------------------------------
// ROI model
// ---------------------------------------------------------------------------

pub const EMPLOYEE_COUNT_BANDS: [&str; 5] = ["1-10", "11-50", "51-200", "201-500", "500+"];

/// Efficiency multiplier per company-size band.
fn efficiency_multiplier(employee_count: &str) -> f64 {
    match employee_count {
        "1-10" => 0.15,
        "11-50" => 0.20,
        "51-200" => 0.25,
        "201-500" => 0.35,
        _ => 0.45, // "500+"
    }
}

pub const REGIONS: [&str; 5] = ["US", "UK", "EU", "APAC", "LATAM"];
pub const DEFAULT_REGION: &str = "US";

/// Purchasing-power adjustment applied to monetary outputs only.
/// Product decision deferred to configuration; defaults live here so the
/// table can be swapped in one place.
fn region_factor(region: &str) -> f64 {
    match region {
        "US" | "UK" => 1.0,
        "EU" => 0.95,
        "APAC" => 0.80,
        "LATAM" => 0.70,
        _ => 1.0,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RoiInputs<'a> {
    pub current_pm_costs: f64,
    pub tech_budget: f64,
    pub employee_count: &'a str,
    pub user_region: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiOutputs {
    /// Annual, region-adjusted.
    pub potential_savings: i64,
    /// Region-adjusted.
    pub implementation_cost: i64,
    /// Computed before region adjustment; a pure ratio.
    pub roi_percentage: i64,
    /// `None` when savings are zero.
    pub payback_period_months: Option<i64>,
}

/// ROI computation per the published model. Divisions by zero
/// short-circuit to the sentinels (`roi_percentage = 0`, payback absent).
pub fn compute_roi(inputs: RoiInputs<'_>) -> RoiOutputs {
    let annual_pm_cost = inputs.current_pm_costs * 12.0;
    let savings = annual_pm_cost * efficiency_multiplier(inputs.employee_count);
    let implementation_cost = inputs.tech_budget.min(annual_pm_cost * 1.5);

    let roi_percentage = if implementation_cost > 0.0 {
        (100.0 * (savings - implementation_cost) / implementation_cost).round() as i64
    } else {
        0
    };

    let payback_period_months = if savings > 0.0 {
        Some((implementation_cost * 12.0 / savings).ceil() as i64)
    } else {
        None
    };

    let factor = region_factor(inputs.user_region);
    RoiOutputs {
        potential_savings: (savings * factor).round() as i64,
        implementation_cost: (implementation_cost * factor).round() as i64,
        roi_percentage,
        payback_period_months,
    }
}
