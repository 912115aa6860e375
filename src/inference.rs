use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::debug;

use crate::FittedModel;

/// Alternative hypothesis of a coefficient test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alternative {
    #[default]
    TwoSided,
    Greater,
    Less,
}

impl FromStr for Alternative {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "two-sided" => Self::TwoSided,
            "greater" => Self::Greater,
            "less" => Self::Less,
            _ => {
                return Err(crate::Error::InvalidAlternative(s.to_string()));
            },
        })
    }
}

impl Display for Alternative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::TwoSided => "two-sided",
            Self::Greater => "greater",
            Self::Less => "less",
        })
    }
}

/// Standard Student-t distribution with `ddof` degrees of freedom.
pub(crate) fn t_dist(ddof: u64) -> Result<StudentsT, crate::Error> {
    if ddof == 0 {
        return Err(crate::Error::InvalidDegreesOfFreedom(ddof));
    }
    StudentsT::new(0.0, 1.0, ddof as f64).map_err(|_| crate::Error::InvalidDegreesOfFreedom(ddof))
}

pub(crate) fn check_alpha(alpha: f64) -> Result<f64, crate::Error> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(alpha)
    } else {
        Err(crate::Error::InvalidAlpha(alpha))
    }
}

#[inline]
pub fn t_statistic(estimate: f64, null: f64, std_err: f64) -> f64 {
    (estimate - null) / std_err
}

pub fn p_value(t: f64, ddof: u64, alternative: Alternative) -> Result<f64, crate::Error> {
    let dist = t_dist(ddof)?;
    Ok(match alternative {
        Alternative::TwoSided => (2.0 * dist.sf(t.abs())).min(1.0),
        Alternative::Greater => dist.sf(t),
        Alternative::Less => dist.cdf(t),
    })
}

/// Rejection region boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum CriticalValues {
    /// Reject when `|t| >= c`.
    Symmetric(f64),
    /// Reject when `t >= c`.
    Upper(f64),
    /// Reject when `t <= c`; `c` is negative for `alpha < 0.5`.
    Lower(f64),
}

impl CriticalValues {
    pub fn new(alpha: f64, ddof: u64, alternative: Alternative) -> Result<Self, crate::Error> {
        let alpha = check_alpha(alpha)?;
        let dist = t_dist(ddof)?;
        Ok(match alternative {
            Alternative::TwoSided => Self::Symmetric(dist.inverse_cdf(1.0 - alpha / 2.0)),
            Alternative::Greater => Self::Upper(dist.inverse_cdf(1.0 - alpha)),
            Alternative::Less => Self::Lower(-dist.inverse_cdf(1.0 - alpha)),
        })
    }

    pub fn rejects(&self, t: f64) -> bool {
        match *self {
            Self::Symmetric(c) => t.abs() >= c,
            Self::Upper(c) => t >= c,
            Self::Lower(c) => t <= c,
        }
    }

    /// Every boundary, ascending.
    pub fn values(&self) -> Vec<f64> {
        match *self {
            Self::Symmetric(c) => vec![-c, c],
            Self::Upper(c) | Self::Lower(c) => vec![c],
        }
    }
}

impl Display for CriticalValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Symmetric(c) => write!(f, "±{:.3}", c),
            Self::Upper(c) | Self::Lower(c) => write!(f, "{:.3}", c),
        }
    }
}

/// A single-coefficient t-test against `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSpec {
    coefficient: String,
    null: f64,
    alternative: Alternative,
    alpha: f64,
}

impl TestSpec {
    pub fn new(coefficient: impl ToString) -> Self {
        Self {
            coefficient: coefficient.to_string(),
            null: 0.0,
            alternative: Alternative::TwoSided,
            alpha: 0.05,
        }
    }

    pub fn null(mut self, null: f64) -> Self {
        self.null = null;
        self
    }

    pub fn alternative(mut self, alternative: Alternative) -> Self {
        self.alternative = alternative;
        self
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn coefficient(&self) -> &str {
        &self.coefficient
    }

    pub fn null_value(&self) -> f64 {
        self.null
    }

    pub fn alternative_mode(&self) -> Alternative {
        self.alternative
    }

    pub fn significance(&self) -> f64 {
        self.alpha
    }

    /// Run the test against a fitted model.
    pub fn run(&self, model: &FittedModel) -> Result<TestResult, crate::Error> {
        let alpha = check_alpha(self.alpha)?;
        let coef = model.coef(&self.coefficient)?;
        let t = t_statistic(coef.coef(), self.null, coef.std_err());
        let p = p_value(t, model.ddof(), self.alternative)?;
        let critical = CriticalValues::new(alpha, model.ddof(), self.alternative)?;
        debug!(
            coefficient = coef.label(),
            t,
            p,
            alternative = %self.alternative,
            "Tested coefficient"
        );
        Ok(TestResult {
            coefficient: coef.label().to_string(),
            estimate: coef.coef(),
            std_err: coef.std_err(),
            null: self.null,
            t,
            p,
            ddof: model.ddof(),
            alpha,
            alternative: self.alternative,
            critical,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    coefficient: String,
    estimate: f64,
    std_err: f64,
    null: f64,
    t: f64,
    p: f64,
    ddof: u64,
    alpha: f64,
    alternative: Alternative,
    critical: CriticalValues,
}

impl TestResult {
    #[inline]
    pub fn coefficient(&self) -> &str {
        &self.coefficient
    }

    #[inline]
    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    #[inline]
    pub fn std_err(&self) -> f64 {
        self.std_err
    }

    #[inline]
    pub fn null(&self) -> f64 {
        self.null
    }

    #[inline]
    pub fn t(&self) -> f64 {
        self.t
    }

    #[inline]
    pub fn p(&self) -> f64 {
        self.p
    }

    #[inline]
    pub fn ddof(&self) -> u64 {
        self.ddof
    }

    #[inline]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    #[inline]
    pub fn alternative(&self) -> Alternative {
        self.alternative
    }

    #[inline]
    pub fn critical(&self) -> CriticalValues {
        self.critical
    }

    pub fn rejects_null(&self) -> bool {
        self.critical.rejects(self.t)
    }
}

impl Display for TestResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Coefficient: {}", self.coefficient)?;
        writeln!(f, "t statistic: {:.3}", self.t)?;
        write!(f, "p-value: {:.4}", self.p)
    }
}
