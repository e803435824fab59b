//! Root finding for the implicit model equations.

/// Relative step below which an iteration counts as converged.
const TOLERANCE: f64 = 1e-12;
/// Residual accepted when the step size keeps bouncing in the last digits.
const RESIDUAL: f64 = 1e-10;

/// Schröder/Halley iteration with a safeguarding bracket.
///
/// `f` returns the function value and its first two derivatives. Steps that would leave
/// `[min, max]` are replaced by a bisection towards the violated bound. Returns `None` when
/// the iteration stalls on a zero derivative, hits `NaN`, or runs out of iterations away
/// from a root.
pub(crate) fn schroder_iterate<F>(
    f: F,
    guess: f64,
    min: f64,
    max: f64,
    max_iter: usize,
) -> Option<f64>
where
    F: Fn(f64) -> (f64, f64, f64),
{
    let mut x = guess.clamp(min, max);
    let mut residual = f64::INFINITY;
    for _ in 0..max_iter {
        let (f0, f1, f2) = f(x);
        residual = f0.abs();
        if f0 == 0.0 {
            return Some(x);
        }
        if f0.is_nan() || f1.is_nan() || f1 == 0.0 {
            return None;
        }

        let newton = f0 / f1;
        let mut delta = newton;
        if x != 0.0 && (newton / x).abs() < 0.1 {
            let schroder = newton + (f2 / (2.0 * f1)) * newton * newton;
            // the correction term must not flip the direction of the step
            if schroder.signum() == newton.signum() {
                delta = schroder;
            }
        }

        let mut next = x - delta;
        if next < min {
            next = 0.5 * (x + min);
        } else if next > max {
            next = 0.5 * (x + max);
        }

        if (next - x).abs() <= TOLERANCE * next.abs() {
            return Some(next);
        }
        x = next;
    }
    (residual <= RESIDUAL).then_some(x)
}

/// Bisects a sign change of `f` inside `[a, b]` down to adjacent floating point values.
///
/// Signs are compared by sign bit, so `-0.0` and `+0.0` count as different. Returns `None`
/// when the endpoints do not bracket a sign change or `f` produces `NaN`.
pub(crate) fn bisect<F>(f: F, mut a: f64, mut b: f64) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    let mut fa = f(a);
    let fb = f(b);
    if fa.is_nan() || fb.is_nan() || fa.is_sign_negative() == fb.is_sign_negative() {
        return None;
    }
    if fa == 0.0 {
        return Some(a);
    }
    if fb == 0.0 {
        return Some(b);
    }

    // worst case walks the full exponent range of f64
    for _ in 0..2200 {
        let mid = a + 0.5 * (b - a);
        if mid <= a || mid >= b {
            return Some(mid);
        }
        let fm = f(mid);
        if fm.is_nan() {
            return None;
        }
        if fm == 0.0 {
            return Some(mid);
        }
        if fm.is_sign_negative() == fa.is_sign_negative() {
            a = mid;
            fa = fm;
        } else {
            b = mid;
        }
    }
    Some(a + 0.5 * (b - a))
}

/// Scans `ladder` for the first pair of neighbouring points where `f` changes sign, then
/// bisects inside it.
pub(crate) fn bracket_and_bisect<F>(f: F, ladder: &[f64]) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    let mut prev = (ladder.first().copied()?, f(*ladder.first()?));
    for &x in &ladder[1..] {
        let fx = f(x);
        if !prev.1.is_nan() && !fx.is_nan() && prev.1.is_sign_negative() != fx.is_sign_negative() {
            return bisect(&f, prev.0, x);
        }
        prev = (x, fx);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn schroder_finds_square_root() {
        let root = schroder_iterate(|x| (x * x - 2.0, 2.0 * x, 2.0), 1.0, 0.0, 2.0, 100);
        assert_relative_eq!(root.unwrap_or(f64::NAN), 2f64.sqrt(), epsilon = 1e-15);
    }

    #[test]
    fn schroder_reports_zero_derivative() {
        assert_eq!(schroder_iterate(|_| (1.0, 0.0, 0.0), 1.0, 0.0, 2.0, 100), None);
    }

    #[test]
    fn bisect_needs_a_sign_change() {
        assert_eq!(bisect(|x| x * x + 1.0, -1.0, 1.0), None);
        let root = bisect(|x: f64| x.cos(), 0.0, 3.0).unwrap_or(f64::NAN);
        assert_relative_eq!(root, core::f64::consts::FRAC_PI_2, epsilon = 1e-15);
    }

    #[test]
    fn ladder_picks_the_first_sign_change() {
        // roots at -5 and 50
        let f = |x: f64| (x + 5.0) * (x - 50.0);
        let root = bracket_and_bisect(f, &[-1e20, -1e1, 0.0, 1e1, 1e2, 1e20]).unwrap_or(f64::NAN);
        assert_relative_eq!(root, -5.0, epsilon = 1e-12);
    }
}
