use serde::{Deserialize, Serialize};
use tracing::warn;

/// Sampling and output size for distribution plots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPlotConfig")]
pub struct PlotConfig {
    /// Points on the density curve.
    pub curve_points: usize,
    /// Points along each shaded rejection region.
    pub region_points: usize,
    pub width: u32,
    pub height: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            curve_points: 1000,
            region_points: 100,
            width: 1200,
            height: 600,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawPlotConfig {
    curve_points: usize,
    region_points: usize,
    width: u32,
    height: u32,
}

impl Default for RawPlotConfig {
    fn default() -> Self {
        let d = PlotConfig::default();
        Self {
            curve_points: d.curve_points,
            region_points: d.region_points,
            width: d.width,
            height: d.height,
        }
    }
}

impl TryFrom<RawPlotConfig> for PlotConfig {
    type Error = crate::Error;

    fn try_from(raw: RawPlotConfig) -> Result<Self, Self::Error> {
        let config = Self {
            curve_points: raw.curve_points,
            region_points: raw.region_points,
            width: raw.width,
            height: raw.height,
        };
        config.validate()?;
        Ok(config)
    }
}

fn env_or<T: std::str::FromStr + PartialOrd>(name: &str, default: T, min: T) -> T {
    match std::env::var(name) {
        Ok(v) => match v.parse::<T>() {
            Ok(v) if v >= min => v,
            _ => {
                warn!("Ignoring invalid {}={}", name, v);
                default
            },
        },
        Err(_) => default,
    }
}

impl PlotConfig {
    /// Both curves need at least two points and the canvas a nonzero size.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.curve_points < 2 || self.region_points < 2 {
            return Err(crate::Error::InvalidPlotConfig(format!(
                "need at least 2 points per curve, got {} and {}",
                self.curve_points, self.region_points
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(crate::Error::InvalidPlotConfig(format!(
                "empty plot size {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Defaults overridden by `LMTEST_CURVE_POINTS`, `LMTEST_REGION_POINTS`,
    /// `LMTEST_PLOT_WIDTH` and `LMTEST_PLOT_HEIGHT`.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            curve_points: env_or("LMTEST_CURVE_POINTS", d.curve_points, 2),
            region_points: env_or("LMTEST_REGION_POINTS", d.region_points, 2),
            width: env_or("LMTEST_PLOT_WIDTH", d.width, 1),
            height: env_or("LMTEST_PLOT_HEIGHT", d.height, 1),
        }
    }
}
