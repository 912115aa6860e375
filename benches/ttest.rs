use std::fmt::Debug;

use diol::prelude::*;
use lmtest::{Dataset, Figure, FittedModel, PlotConfig, TestSpec};
use rand::SeedableRng;
use rand_distr::Distribution;

#[derive(Clone)]
struct Arg {
    data: Dataset,
}

impl Debug for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arg")
            .field("nrow", &self.data.nrows())
            .field("ncol", &self.data.ncols())
            .finish()
    }
}

fn main() -> std::io::Result<()> {
    let mut bench = Bench::new(BenchConfig::from_args()?);
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let args = [2, 3, 4, 5].iter().map(|len| {
        let nrow = 10_usize.pow(*len);
        let normal = rand_distr::Normal::new(0.0, 1.0).unwrap();
        let x1 = normal.sample_iter(&mut rng).take(nrow).collect::<Vec<_>>();
        let x2 = normal.sample_iter(&mut rng).take(nrow).collect::<Vec<_>>();
        let y = x1
            .iter()
            .zip(&x2)
            .zip(normal.sample_iter(&mut rng))
            .map(|((a, b), e)| 1.0 + 0.5 * a - 0.2 * b + e)
            .collect::<Vec<_>>();
        let data = Dataset::from_columns([("y", y), ("x1", x1), ("x2", x2)]).unwrap();
        Arg { data }
    });
    bench.register_many(list![fit, fit_and_test, figure], args);
    bench.run()?;
    Ok(())
}

fn fit(bencher: Bencher, Arg { data }: Arg) {
    bencher.bench(|| {
        FittedModel::fit("y ~ x1 + x2", &data).unwrap();
    });
}

fn fit_and_test(bencher: Bencher, Arg { data }: Arg) {
    let spec = TestSpec::new("x1");
    bencher.bench(|| {
        let model = FittedModel::fit("y ~ x1 + x2", &data).unwrap();
        spec.run(&model).unwrap();
    });
}

fn figure(bencher: Bencher, Arg { data }: Arg) {
    let model = FittedModel::fit("y ~ x1 + x2", &data).unwrap();
    let result = TestSpec::new("x2").run(&model).unwrap();
    let config = PlotConfig::default();
    bencher.bench(|| {
        Figure::from_result(&result, &config).unwrap();
    });
}
