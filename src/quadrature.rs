//! Adaptive Gauss–Kronrod (G7–K15) integration.

/// Kronrod abscissae on `[-1, 1]`, positive half. Odd indices are the Gauss nodes.
const XGK: [f64; 8] = [
    0.991_455_371_120_812_6,
    0.949_107_912_342_758_5,
    0.864_864_423_359_769_1,
    0.741_531_185_599_394_4,
    0.586_087_235_467_691_1,
    0.405_845_151_377_397_2,
    0.207_784_955_007_898_5,
    0.0,
];

const WGK: [f64; 8] = [
    0.022_935_322_010_529_22,
    0.063_092_092_629_978_55,
    0.104_790_010_322_250_2,
    0.140_653_259_715_525_9,
    0.169_004_726_639_267_9,
    0.190_350_578_064_785_4,
    0.204_432_940_075_298_9,
    0.209_482_141_084_727_8,
];

const WG: [f64; 4] = [
    0.129_484_966_168_869_7,
    0.279_705_391_489_276_7,
    0.381_830_050_505_118_9,
    0.417_959_183_673_469_4,
];

pub const DEFAULT_TOLERANCE: f64 = 1e-12;
pub const DEFAULT_MAX_DEPTH: u32 = 15;

/// One K15 panel: the Kronrod estimate and its distance to the embedded G7 estimate.
fn kronrod15<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64) -> (f64, f64) {
    let center = 0.5 * (a + b);
    let half = 0.5 * (b - a);
    let fc = f(center);
    let mut kronrod = fc * WGK[7];
    let mut gauss = fc * WG[3];
    for j in 0..7 {
        let dx = half * XGK[j];
        let pair = f(center - dx) + f(center + dx);
        kronrod += WGK[j] * pair;
        if j % 2 == 1 {
            gauss += WG[j / 2] * pair;
        }
    }
    (kronrod * half, ((kronrod - gauss) * half).abs())
}

fn adapt<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64, tolerance: f64, depth: u32) -> f64 {
    let (value, error) = kronrod15(f, a, b);
    if depth == 0 || error <= tolerance.max(64.0 * f64::EPSILON * value.abs()) {
        return value;
    }
    let mid = 0.5 * (a + b);
    adapt(f, a, mid, 0.5 * tolerance, depth - 1) + adapt(f, mid, b, 0.5 * tolerance, depth - 1)
}

/// Integrates `f` over `[a, b]`, bisecting panels until the G7/K15 disagreement falls below
/// `tolerance` or `max_depth` splits have been made.
pub fn gauss_kronrod<F: Fn(f64) -> f64>(
    f: F,
    a: f64,
    b: f64,
    tolerance: f64,
    max_depth: u32,
) -> f64 {
    if a == b {
        return 0.0;
    }
    adapt(&f, a, b, tolerance, max_depth)
}

/// [`gauss_kronrod`] with the default tolerance and depth.
pub fn integrate<F: Fn(f64) -> f64>(f: F, a: f64, b: f64) -> f64 {
    gauss_kronrod(f, a, b, DEFAULT_TOLERANCE, DEFAULT_MAX_DEPTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use core::f64::consts::PI;

    #[test]
    fn polynomials_are_exact() {
        assert_relative_eq!(integrate(|x| x * x * x - 2.0 * x, 0.0, 2.0), 0.0, epsilon = 1e-14);
        assert_relative_eq!(integrate(|x| x.powi(6), -1.0, 1.0), 2.0 / 7.0, epsilon = 1e-15);
    }

    #[test]
    fn sine_over_half_period() {
        assert_relative_eq!(integrate(f64::sin, 0.0, PI), 2.0, epsilon = 1e-13);
    }

    #[test]
    fn kink_needs_adaptation() {
        assert_relative_eq!(integrate(|x: f64| x.abs(), -1.0, 1.0), 1.0, epsilon = 1e-14);
    }
}
