use serde::{Deserialize, Serialize};
use statrs::distribution::Continuous;
use tracing::{debug, info};

use crate::{
    inference::{check_alpha, t_dist},
    p_value, Alternative, CriticalValues, FittedModel, PlotConfig, Renderer, TestResult, TestSpec,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Blue,
    Red,
    Green,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dashed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
}

/// A sampled curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub label: String,
    pub color: Color,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Area between the x axis and `y`, drawn translucent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub label: Option<String>,
    pub color: Color,
    pub opacity: f64,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// A vertical line across the whole plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub label: Option<String>,
    pub color: Color,
    pub style: LineStyle,
    pub x: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub align: Align,
}

/// Everything a renderer needs to draw a t distribution test plot, in data
/// coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_range: (f64, f64),
    pub width: u32,
    pub height: u32,
    pub curve: Series,
    pub regions: Vec<Region>,
    pub markers: Vec<Marker>,
    pub annotations: Vec<Annotation>,
}

pub(crate) fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n)
        .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
        .collect()
}

impl Figure {
    /// Density of the t distribution with `ddof` degrees of freedom over
    /// `[min(-4, t - 0.5), max(4, t + 0.5)]`, the rejection region(s) for
    /// `alternative` at level `alpha`, and markers at `t` and the critical
    /// value(s).
    pub fn t_test(
        alpha: f64,
        ddof: u64,
        t: f64,
        alternative: Alternative,
        config: &PlotConfig,
    ) -> Result<Self, crate::Error> {
        let alpha = check_alpha(alpha)?;
        config.validate()?;
        if !t.is_finite() {
            return Err(crate::Error::InvalidStatistic(t));
        }
        let dist = t_dist(ddof)?;
        let critical = CriticalValues::new(alpha, ddof, alternative)?;
        let p = p_value(t, ddof, alternative)?;

        let x_min = (-4.0f64).min(t - 0.5);
        let x_max = 4.0f64.max(t + 0.5);
        debug!(x_min, x_max, %critical, "Building t distribution figure");

        let x = linspace(x_min, x_max, config.curve_points);
        let y = x.iter().map(|x| dist.pdf(*x)).collect();
        let curve = Series {
            label: "t distribution".to_string(),
            color: Color::Blue,
            x,
            y,
        };

        let tails = match critical {
            CriticalValues::Symmetric(c) => vec![(c, x_max), (x_min, -c)],
            CriticalValues::Upper(c) => vec![(c, x_max)],
            CriticalValues::Lower(c) => vec![(x_min, c)],
        };
        let mut regions = vec![];
        for (lo, hi) in tails {
            // a critical value past the edge of the plot leaves nothing to shade
            let (lo, hi) = (lo.max(x_min), hi.min(x_max));
            if lo >= hi {
                continue;
            }
            let x = linspace(lo, hi, config.region_points);
            let y = x.iter().map(|x| dist.pdf(*x)).collect();
            regions.push(Region {
                label: regions
                    .is_empty()
                    .then(|| format!("Rejection region (α={})", alpha)),
                color: Color::Red,
                opacity: 0.3,
                x,
                y,
            });
        }

        let mut markers = vec![Marker {
            label: Some("t statistic".to_string()),
            color: Color::Green,
            style: LineStyle::Dashed,
            x: t,
        }];
        markers.extend(critical.values().into_iter().enumerate().map(|(i, c)| Marker {
            label: (i == 0).then(|| "Critical value".to_string()),
            color: Color::Red,
            style: LineStyle::Solid,
            x: c,
        }));

        let (crit_x, crit_text) = match critical {
            CriticalValues::Symmetric(c) => (c, format!("t_crit = ±{:.3}", c)),
            CriticalValues::Upper(c) | CriticalValues::Lower(c) => {
                (c, format!("t_crit = {:.3}", c))
            },
        };
        let annotations = vec![
            Annotation {
                text: format!("p-value = {:.4}", p),
                x: 0.0,
                y: 0.2,
                align: Align::Center,
            },
            Annotation {
                text: format!("t = {:.3}", t),
                x: t,
                y: 0.05,
                align: Align::Left,
            },
            Annotation {
                text: crit_text,
                x: crit_x,
                y: 0.05,
                align: Align::Left,
            },
        ];

        Ok(Self {
            title: format!(
                "t distribution, rejection regions (α={}, alternative={}) and t statistic",
                alpha, alternative
            ),
            x_label: "t value".to_string(),
            y_label: "Density".to_string(),
            x_range: (x_min, x_max),
            width: config.width,
            height: config.height,
            curve,
            regions,
            markers,
            annotations,
        })
    }

    pub fn from_result(result: &TestResult, config: &PlotConfig) -> Result<Self, crate::Error> {
        Self::t_test(
            result.alpha(),
            result.ddof(),
            result.t(),
            result.alternative(),
            config,
        )
    }
}

/// Draw the t distribution for `ddof` degrees of freedom with the rejection
/// region(s) for `alternative` at level `alpha` and the observed statistic
/// `t`. Sampling and size come from [`PlotConfig::from_env`].
pub fn plot_t(
    renderer: &mut impl Renderer,
    alpha: f64,
    ddof: u64,
    t: f64,
    alternative: Alternative,
) -> Result<(), crate::Error> {
    let figure = Figure::t_test(alpha, ddof, t, alternative, &PlotConfig::from_env())?;
    renderer.render(&figure)
}

/// Test `spec` against `model` and draw the result.
pub fn plot_t_for_coef(
    renderer: &mut impl Renderer,
    model: &FittedModel,
    spec: &TestSpec,
) -> Result<TestResult, crate::Error> {
    let result = spec.run(model)?;
    info!(coefficient = result.coefficient(), "Plotting t distribution");
    renderer.render(&Figure::from_result(&result, &PlotConfig::from_env())?)?;
    Ok(result)
}
