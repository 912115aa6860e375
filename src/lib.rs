mod config;
mod dataset;
mod error;
mod file;
mod formula;
mod inference;
mod lm;
mod plot;
mod render;

use std::str::FromStr;

use tracing::{info, warn};

pub use crate::{
    config::*, dataset::*, error::*, file::*, formula::*, inference::*, lm::*, plot::*, render::*,
};

/// Install a `tracing` fmt subscriber at the level named by `LMTEST_LOG`
/// (`info` if unset). Does nothing if a global subscriber already exists.
pub fn init_tracing() {
    let level = match std::env::var("LMTEST_LOG") {
        Ok(level) => tracing::Level::from_str(&level).unwrap_or_else(|_| {
            eprintln!("invalid LMTEST_LOG={}, using info", level);
            tracing::Level::INFO
        }),
        Err(_) => tracing::Level::INFO,
    };
    if tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .is_err()
    {
        warn!("tracing subscriber already installed");
    }
}

/// Fit `formula` on `data`, test the coefficient named in `spec`, log the
/// statistic and p-value, and draw the t distribution plot with `renderer`.
#[tracing::instrument(skip(data, renderer))]
pub fn summarize(
    formula: &str,
    data: &Dataset,
    spec: &TestSpec,
    renderer: &mut impl Renderer,
) -> Result<(FittedModel, TestResult), Error> {
    let model = FittedModel::fit(formula, data)?;
    let result = spec.run(&model)?;
    info!("Coefficient: {}", result.coefficient());
    info!("t statistic: {:.3}", result.t());
    info!("p-value: {:.4}", result.p());
    renderer.render(&Figure::from_result(&result, &PlotConfig::from_env())?)?;
    Ok((model, result))
}

/// [`summarize`] on a dataset fetched from `provider`.
pub fn summarize_dataset(
    provider: &impl DatasetProvider,
    dataset: &str,
    formula: &str,
    spec: &TestSpec,
    renderer: &mut impl Renderer,
) -> Result<(FittedModel, TestResult), Error> {
    let data = provider.load(dataset)?;
    summarize(formula, &data, spec, renderer)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_log::test;

    use super::*;

    fn data() -> Dataset {
        Dataset::from_columns([
            ("x", vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            ("y", vec![2.0, 4.0, 5.0, 4.0, 5.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_summarize() {
        let mut figures: Vec<Figure> = vec![];
        let spec = TestSpec::new("x").alternative(Alternative::Greater);
        let (model, result) = summarize("y ~ x", &data(), &spec, &mut figures).unwrap();
        assert_eq!(model.ddof(), 3);
        assert_eq!(result.alternative(), Alternative::Greater);
        assert_eq!(figures.len(), 1);
        assert_eq!(figures[0].regions.len(), 1);
        assert_eq!(figures[0].markers[0].x, result.t());
    }

    #[test]
    fn test_summarize_unknown_coefficient_renders_nothing() {
        let mut figures: Vec<Figure> = vec![];
        let res = summarize("y ~ x", &data(), &TestSpec::new("z"), &mut figures);
        assert!(matches!(res, Err(Error::UnknownCoefficient(_))));
        assert!(figures.is_empty());
    }

    #[test]
    fn test_summarize_dataset() {
        let mut provider = HashMap::new();
        provider.insert("small".to_string(), data());
        let mut figures: Vec<Figure> = vec![];
        let (_, result) =
            summarize_dataset(&provider, "small", "y ~ x", &TestSpec::new("x"), &mut figures)
                .unwrap();
        assert_eq!(result.coefficient(), "x");
        assert!(matches!(
            summarize_dataset(&provider, "big", "y ~ x", &TestSpec::new("x"), &mut figures),
            Err(Error::DatasetNotFound(_))
        ));
    }
}
