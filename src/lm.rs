use faer::{linalg::solvers::Solve, Col, Mat};
use tracing::{debug, warn};

use crate::{Alternative, Dataset, Formula};

/// Coefficient name given to the constant column.
pub const INTERCEPT: &str = "Intercept";

// (X'X)^-1_jj * X'X_jj is the variance inflation of column j, past this the
// columns are treated as linearly dependent
const MAX_VARIANCE_INFLATION: f64 = 1e12;

// a centered column whose sum of squares is below this fraction of the raw
// sum of squares is constant up to rounding
const MIN_RELATIVE_SPREAD: f64 = 1e-20;

#[derive(Debug, Clone, PartialEq)]
pub struct Coef {
    label: String,
    coef: f64,
    std_err: f64,
    t: f64,
    p: f64,
}

impl Coef {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn coef(&self) -> f64 {
        self.coef
    }

    pub fn std_err(&self) -> f64 {
        self.std_err
    }

    /// t statistic against zero.
    pub fn t(&self) -> f64 {
        self.t
    }

    /// Two-sided p-value against zero.
    pub fn p(&self) -> f64 {
        self.p
    }
}

/// An ordinary least squares fit. Only constructed by [`FittedModel::fit`], so
/// every value carries finite estimates and at least one residual degree of
/// freedom.
#[derive(Debug, Clone)]
pub struct FittedModel {
    formula: Formula,
    coefs: Vec<Coef>,
    ddof: u64,
    n: u64,
    r2: f64,
    adj_r2: f64,
    sigma: f64,
}

impl FittedModel {
    /// Fit `formula` (e.g. `wage ~ educ`) against `data`. Rows with a missing
    /// or non-finite value in any used column are dropped.
    #[tracing::instrument(skip(data))]
    pub fn fit(formula: &str, data: &Dataset) -> Result<Self, crate::Error> {
        let formula: Formula = formula.parse()?;
        Self::fit_formula(formula, data)
    }

    pub fn fit_formula(formula: Formula, data: &Dataset) -> Result<Self, crate::Error> {
        let response = formula.response().eval(data)?;
        let columns = formula
            .terms()
            .iter()
            .map(|t| t.eval(data))
            .collect::<Result<Vec<_>, _>>()?;

        let rows = (0..data.nrows())
            .filter(|&i| response[i].is_finite() && columns.iter().all(|c| c[i].is_finite()))
            .collect::<Vec<_>>();
        if rows.len() < data.nrows() {
            debug!("Dropped {} incomplete rows", data.nrows() - rows.len());
        }

        let intercept = formula.intercept();
        let offset = intercept as usize;
        let n = rows.len();
        let p = columns.len();
        let k = p + offset;
        if n <= k {
            return Err(crate::Error::InsufficientObservations { n, k });
        }

        // with an intercept the regressors and response are centered, so the
        // normal equations only see the spread of each column and not its level
        let mean = |v: &[f64]| -> f64 {
            if intercept {
                rows.iter().map(|&i| v[i]).sum::<f64>() / n as f64
            } else {
                0.0
            }
        };
        let means = columns.iter().map(|c| mean(c.as_slice())).collect::<Vec<_>>();
        let y_mean = mean(response.as_slice());
        let x = Mat::from_fn(n, p, |i, j| columns[j][rows[i]] - means[j]);
        let y = Col::from_fn(n, |i| response[rows[i]] - y_mean);

        let (slopes, xtx_inv) = if p == 0 {
            (Col::<f64>::zeros(0), Mat::<f64>::zeros(0, 0))
        } else {
            let xtx = x.as_ref().transpose() * x.as_ref();
            let xty = x.as_ref().transpose() * y.as_ref();
            for (j, c) in columns.iter().enumerate() {
                let raw = rows.iter().map(|&i| c[i].powi(2)).sum::<f64>();
                if intercept && xtx[(j, j)] <= raw * MIN_RELATIVE_SPREAD {
                    warn!(column = j, "Regressor is constant");
                    return Err(crate::Error::RankDeficient);
                }
            }
            let chol = xtx.llt(faer::Side::Lower).map_err(|e| {
                warn!("Cholesky decomposition failed: {:?}", e);
                crate::Error::RankDeficient
            })?;
            let xtx_inv = chol.solve(&Mat::<f64>::identity(p, p));
            for j in 0..p {
                let inflation = xtx_inv[(j, j)] * xtx[(j, j)];
                if !inflation.is_finite() || inflation > MAX_VARIANCE_INFLATION {
                    warn!(column = j, inflation, "Design matrix is numerically singular");
                    return Err(crate::Error::RankDeficient);
                }
            }
            (chol.solve(&xty), xtx_inv)
        };

        let fitted = x.as_ref() * slopes.as_ref();
        let rss = (0..n).map(|i| (y[i] - fitted[i]).powi(2)).sum::<f64>();
        let ddof = n - k;
        let sigma2 = rss / ddof as f64;

        // uncentered without an intercept, matching the usual convention
        let tss = (0..n).map(|i| y[i].powi(2)).sum::<f64>();
        let r2 = 1.0 - rss / tss;
        let adj_r2 = 1.0 - (1.0 - r2) * (n - offset) as f64 / ddof as f64;

        let mut estimates = Vec::with_capacity(k);
        if intercept {
            // var(b0) = sigma^2 (1/n + m' (Xc'Xc)^-1 m) for column means m
            let quad = (0..p)
                .flat_map(|a| (0..p).map(move |b| (a, b)))
                .map(|(a, b)| means[a] * xtx_inv[(a, b)] * means[b])
                .sum::<f64>();
            let b0 = y_mean - (0..p).map(|j| means[j] * slopes[j]).sum::<f64>();
            estimates.push((b0, (sigma2 * (1.0 / n as f64 + quad)).sqrt()));
        }
        estimates.extend((0..p).map(|j| (slopes[j], (sigma2 * xtx_inv[(j, j)]).sqrt())));

        let coefs = formula
            .labels()
            .into_iter()
            .zip(estimates)
            .map(|(label, (coef, std_err))| -> Result<Coef, crate::Error> {
                let t = crate::t_statistic(coef, 0.0, std_err);
                let p = crate::p_value(t, ddof as u64, Alternative::TwoSided)?;
                Ok(Coef {
                    label,
                    coef,
                    std_err,
                    t,
                    p,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(n, k, r2, "Fitted {}", formula);

        Ok(Self {
            formula,
            coefs,
            ddof: ddof as u64,
            n: n as u64,
            r2,
            adj_r2,
            sigma: sigma2.sqrt(),
        })
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn coefs(&self) -> &[Coef] {
        &self.coefs
    }

    /// Look up a coefficient by name. Whitespace in `name` is ignored and `**`
    /// matches `^`, so `I(x ** 2)` finds `I(x^2)`.
    pub fn coef(&self, name: &str) -> Result<&Coef, crate::Error> {
        let key = name.split_whitespace().collect::<String>().replace("**", "^");
        self.coefs
            .iter()
            .find(|c| c.label == key)
            .ok_or_else(|| crate::Error::UnknownCoefficient(name.to_string()))
    }

    pub fn intercept(&self) -> Option<&Coef> {
        self.formula.intercept().then(|| &self.coefs[0])
    }

    /// Residual degrees of freedom, always at least one.
    pub fn ddof(&self) -> u64 {
        self.ddof
    }

    /// Number of observations used in the fit.
    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn r2(&self) -> f64 {
        self.r2
    }

    pub fn adj_r2(&self) -> f64 {
        self.adj_r2
    }

    /// Residual standard error.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Predicted response on the model scale for every row of `data`; rows
    /// with missing regressors predict `NaN`.
    pub fn predict(&self, data: &Dataset) -> Result<Vec<f64>, crate::Error> {
        let columns = self
            .formula
            .terms()
            .iter()
            .map(|t| t.eval(data))
            .collect::<Result<Vec<_>, _>>()?;
        let offset = self.formula.intercept() as usize;
        Ok((0..data.nrows())
            .map(|i| {
                let mut v = if offset == 1 { self.coefs[0].coef } else { 0.0 };
                for (j, c) in columns.iter().enumerate() {
                    v += self.coefs[j + offset].coef * c[i];
                }
                v
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    macro_rules! assert_float_eq {
        ($a:expr, $b:expr, $tol:expr) => {
            assert!(($a - $b).abs() < $tol, "{:.22} != {:.22}", $a, $b);
        };
    }

    macro_rules! float_eq {
        ($a:expr, $b:expr) => {
            assert_float_eq!($a, $b, 1e-10);
        };
    }

    fn small() -> Dataset {
        Dataset::from_columns([
            ("x", vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            ("y", vec![2.0, 4.0, 5.0, 4.0, 5.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_fit_closed_form() {
        let m = FittedModel::fit("y ~ x", &small()).unwrap();
        assert_eq!(m.ddof(), 3);
        assert_eq!(m.n(), 5);
        assert_eq!(m.coefs().len(), 2);
        let slope = m.coef("x").unwrap();
        float_eq!(slope.coef(), 0.6);
        float_eq!(slope.std_err(), (0.8f64 / 10.0).sqrt());
        float_eq!(slope.t(), 0.6 / (0.08f64).sqrt());
        let intercept = m.intercept().unwrap();
        assert_eq!(intercept.label(), INTERCEPT);
        float_eq!(intercept.coef(), 2.2);
        float_eq!(intercept.std_err(), (0.88f64).sqrt());
        float_eq!(m.sigma(), (0.8f64).sqrt());
        // rss 2.4, tss 6.0
        float_eq!(m.r2(), 0.6);
        float_eq!(m.adj_r2(), 1.0 - 0.4 * 4.0 / 3.0);
        assert!(slope.p() > 0.1 && slope.p() < 0.2);
    }

    #[test]
    fn test_predict() {
        let m = FittedModel::fit("y ~ x", &small()).unwrap();
        let predicted = m.predict(&small()).unwrap();
        for (a, b) in predicted.iter().zip([2.8, 3.4, 4.0, 4.6, 5.2]) {
            float_eq!(*a, b);
        }
    }

    #[test]
    fn test_no_intercept() {
        let data = Dataset::from_columns([
            ("x", vec![1.0, 2.0, 3.0]),
            ("y", vec![2.0, 4.0, 6.5]),
        ])
        .unwrap();
        let m = FittedModel::fit("y ~ x - 1", &data).unwrap();
        assert!(m.intercept().is_none());
        assert_eq!(m.ddof(), 2);
        // sum(xy) / sum(x^2) = 29.5 / 14
        float_eq!(m.coef("x").unwrap().coef(), 29.5 / 14.0);
    }

    #[test]
    fn test_drops_missing_rows() {
        let data = Dataset::from_columns([
            ("x", vec![1.0, 2.0, f64::NAN, 3.0, 4.0, 5.0]),
            ("y", vec![2.0, 4.0, 100.0, 5.0, 4.0, 5.0]),
        ])
        .unwrap();
        let m = FittedModel::fit("y ~ x", &data).unwrap();
        assert_eq!(m.n(), 5);
        float_eq!(m.coef("x").unwrap().coef(), 0.6);
    }

    #[test]
    fn test_transformed_terms() {
        let xs: [f64; 6] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let data = Dataset::from_columns([
            ("x", xs.to_vec()),
            (
                "y",
                xs.iter().map(|&x| (1.0 + 2.0 * x + 0.5 * x * x).exp()).collect(),
            ),
        ])
        .unwrap();
        let m = FittedModel::fit("log(y) ~ x + I(x ^ 2)", &data).unwrap();
        assert_float_eq!(m.coef("x").unwrap().coef(), 2.0, 1e-6);
        assert_float_eq!(m.coef("I(x ^ 2)").unwrap().coef(), 0.5, 1e-6);
        assert_float_eq!(m.intercept().unwrap().coef(), 1.0, 1e-6);
    }

    #[test]
    fn test_power_term_lookup_by_source_text() {
        let data = Dataset::from_columns([
            ("x", vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            ("y", vec![3.3, 3.9, 5.25, 7.1, 9.1]),
        ])
        .unwrap();
        let m = FittedModel::fit("y ~ I(x**2)", &data).unwrap();
        let squared = &m.coefs()[1];
        assert_eq!(squared.label(), "I(x^2)");
        assert_eq!(m.coef("I(x**2)").unwrap(), squared);
        assert_eq!(m.coef("I(x ** 2)").unwrap(), squared);
        assert_eq!(m.coef("I(x^2)").unwrap(), squared);
        let res = crate::TestSpec::new("I(x**2)").run(&m).unwrap();
        assert_eq!(res.coefficient(), "I(x^2)");
        assert_eq!(res.estimate(), squared.coef());
    }

    #[test]
    fn test_regressor_far_from_zero() {
        // mean / sd of x is above 1e6
        let data = Dataset::from_columns([
            ("x", vec![1e7 + 1.0, 1e7 + 2.0, 1e7 + 3.0, 1e7 + 4.0, 1e7 + 5.0]),
            ("y", vec![2.0, 4.0, 5.0, 4.0, 5.0]),
        ])
        .unwrap();
        let m = FittedModel::fit("y ~ x", &data).unwrap();
        let slope = m.coef("x").unwrap();
        float_eq!(slope.coef(), 0.6);
        float_eq!(slope.std_err(), (0.08f64).sqrt());
        assert_float_eq!(m.intercept().unwrap().coef(), 4.0 - 0.6 * (1e7 + 3.0), 1e-6);
        float_eq!(m.r2(), 0.6);
    }

    #[test]
    fn test_intercept_only() {
        let m = FittedModel::fit("y ~ 1", &small()).unwrap();
        assert_eq!(m.ddof(), 4);
        let intercept = m.intercept().unwrap();
        float_eq!(intercept.coef(), 4.0);
        // sample variance 1.5 over five rows
        float_eq!(intercept.std_err(), (0.3f64).sqrt());
        float_eq!(m.r2(), 0.0);
    }

    #[test]
    fn test_constant_regressor() {
        let data = Dataset::from_columns([
            ("x", vec![0.1; 5]),
            ("y", vec![2.0, 4.0, 5.0, 4.0, 5.0]),
        ])
        .unwrap();
        assert!(matches!(
            FittedModel::fit("y ~ x", &data),
            Err(crate::Error::RankDeficient)
        ));
    }

    #[test]
    fn test_unknown_coefficient() {
        let m = FittedModel::fit("y ~ x", &small()).unwrap();
        assert!(matches!(
            m.coef("educ"),
            Err(crate::Error::UnknownCoefficient(c)) if c == "educ"
        ));
    }

    #[test]
    fn test_missing_column() {
        assert!(matches!(
            FittedModel::fit("y ~ educ", &small()),
            Err(crate::Error::ColumnNameNotFound(c)) if c == "educ"
        ));
    }

    #[test]
    fn test_rank_deficient() {
        let data = Dataset::from_columns([
            ("x", vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            ("z", vec![2.0, 4.0, 6.0, 8.0, 10.0]),
            ("y", vec![2.0, 4.0, 5.0, 4.0, 5.0]),
        ])
        .unwrap();
        assert!(matches!(
            FittedModel::fit("y ~ x + z", &data),
            Err(crate::Error::RankDeficient)
        ));
    }

    #[test]
    fn test_insufficient_observations() {
        let data = Dataset::from_columns([("x", vec![1.0, 2.0]), ("y", vec![2.0, 4.0])]).unwrap();
        assert!(matches!(
            FittedModel::fit("y ~ x", &data),
            Err(crate::Error::InsufficientObservations { n: 2, k: 2 })
        ));
    }
}
