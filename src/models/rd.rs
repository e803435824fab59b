//! The `Rd` shape parameter and its precomputed LF table.
//!
//! `Rd` summarizes the whole LF shape in one number. The regression below maps it to the
//! open, peak and return times, and the table stores the fitted `alpha` and `epsilon` for
//! every grid point so that shape mode never runs a solver on the audio path.
//!
//! # Formulas
//! ```text
//!    Rap = 0                          Rd < 0.21
//!          (4.8 Rd - 1) / 100         Rd <= 2.7
//!          (32.3 / Rd) / 100          otherwise
//!
//!    Rd <= 1.8476:
//!        Rkp = (22.4 + 11.8 Rd) / 100
//!        Rgp = 0.25 Rkp / (0.11 Rd / (0.5 + 1.2 Rkp) - Rap)
//!    Rd > 1.8476:
//!        OQupp = 1 - 1 / (2.17 Rd)
//!        Rgp = 9.3552e-3 + 5.96 / (7.96 - 2 OQupp)
//!        Rkp = 2 Rgp OQupp - 0.9572
//!
//!    Ta = Rap,  Tp = 1 / (2 Rgp),  Te = Tp (1 + Rkp)
//! ```

use super::lf;
use super::parameters::Shape;
use crate::math::round;
use std::sync::OnceLock;

pub const RD_MIN: f64 = 0.01;
pub const RD_MAX: f64 = 6.0;
pub const RD_STEP: f64 = 0.001;

/// Fitted LF time constants for one value of `Rd`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LfShape {
    pub te: f64,
    pub tp: f64,
    pub ta: f64,
    pub alpha: f64,
    pub epsilon: f64,
}

static RD_TABLE: OnceLock<Vec<LfShape>> = OnceLock::new();

fn table() -> &'static [LfShape] {
    RD_TABLE.get_or_init(build_table)
}

/// Builds the table now. Generators call this on construction so the first lookup on the
/// audio thread does not run thousands of LF fits.
pub fn preload() {
    let _ = table();
}

#[must_use]
pub fn is_loaded() -> bool {
    RD_TABLE.get().is_some()
}

/// `(Te, Tp, Ta)` for a given `Rd`, normalized to a unit period.
#[must_use]
pub fn basic_times(rd: f64) -> (f64, f64, f64) {
    let rap = if rd < 0.21 {
        0.0
    } else if rd <= 2.7 {
        (-1.0 + 4.8 * rd) / 100.0
    } else {
        (32.3 / rd) / 100.0
    };

    let (rkp, rgp) = if rd > 1.8476 {
        let oq_upp = 1.0 - 1.0 / (2.17 * rd);
        let rgp = 9.3552e-3 + 5.96 / (7.96 - 2.0 * oq_upp);
        (2.0 * rgp * oq_upp - 0.9572, rgp)
    } else {
        let rkp = (22.4 + 11.8 * rd) / 100.0;
        (rkp, 0.25 * rkp / ((0.11 * rd) / (0.5 + 1.2 * rkp) - rap))
    };

    let tp = 1.0 / (2.0 * rgp);
    (tp * (1.0 + rkp), tp, rap)
}

/// The three-parameter shape equivalent to `rd`, for models that do not use the table.
#[must_use]
pub fn shape_from_rd(rd: f64) -> Shape {
    let (te, tp, ta) = basic_times(rd.clamp(RD_MIN, RD_MAX));
    Shape {
        oq: te,
        am: tp / te,
        qa: if te < 1.0 { ta / (1.0 - te) } else { 0.0 },
    }
}

/// `Rd` of grid point `index`.
#[must_use]
pub fn rd_at(index: usize) -> f64 {
    RD_MIN + index as f64 * RD_STEP
}

#[must_use]
pub fn table_len() -> usize {
    table().len()
}

#[must_use]
pub fn table_entry(index: usize) -> Option<LfShape> {
    table().get(index).copied()
}

/// Interpolates the table at `rd`, clamped to `[RD_MIN, RD_MAX]`.
///
/// A value on a grid point returns that entry unchanged.
#[must_use]
pub fn lookup(rd: f64) -> LfShape {
    let entries = table();
    let last = entries.len() - 1;
    let pos = (rd.clamp(RD_MIN, RD_MAX) - RD_MIN) / RD_STEP;

    let nearest = round(pos);
    if (pos - nearest).abs() < 1e-9 {
        return entries[(nearest as usize).min(last)];
    }

    let index = (pos.floor() as usize).min(last - 1);
    let frac = pos - index as f64;
    let (a, b) = (entries[index], entries[index + 1]);
    let lerp = |x: f64, y: f64| x + (y - x) * frac;

    // alpha and epsilon are infinite or huge below Rd = 0.21; never mix a finite
    // neighbour with an infinite one
    let epsilon = if a.epsilon.is_infinite() || b.epsilon.is_infinite() {
        if frac < 0.5 { a.epsilon } else { b.epsilon }
    } else {
        lerp(a.epsilon, b.epsilon)
    };

    LfShape {
        te: lerp(a.te, b.te),
        tp: lerp(a.tp, b.tp),
        ta: lerp(a.ta, b.ta),
        alpha: lerp(a.alpha, b.alpha),
        epsilon,
    }
}

fn build_table() -> Vec<LfShape> {
    let count = round((RD_MAX - RD_MIN) / RD_STEP) as usize + 1;
    let mut table: Vec<LfShape> = Vec::with_capacity(count);

    for index in 0..count {
        let rd = rd_at(index);
        let (te, tp, ta) = basic_times(rd);
        let fitted = lf::solve_epsilon(te, ta)
            .and_then(|epsilon| lf::solve_alpha(te, tp, ta, epsilon).map(|alpha| (alpha, epsilon)));

        let entry = match fitted {
            Ok((alpha, epsilon)) => LfShape {
                te,
                tp,
                ta,
                alpha,
                epsilon,
            },
            Err(e) => {
                log::warn!("Rd table: {e} at Rd = {rd:.3}, reusing previous entry");
                table.last().copied().unwrap_or(LfShape {
                    te,
                    tp,
                    ta,
                    alpha: 0.0,
                    epsilon: f64::INFINITY,
                })
            }
        };
        table.push(entry);
    }

    log::debug!("Rd table built with {} entries", table.len());
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn table_spans_the_rd_range() {
        assert_eq!(table_len(), 5991);
        assert_relative_eq!(rd_at(table_len() - 1), RD_MAX, epsilon = 1e-9);
    }

    #[test]
    fn grid_points_return_exact_entries() {
        for index in [0, 1, 199, 200, 1000, 1837, 2690, 4000, 5990] {
            let entry = table_entry(index).unwrap();
            assert_eq!(lookup(rd_at(index)), entry, "grid point {index}");
        }
    }

    #[test]
    fn entries_are_finite_where_ta_is_positive() {
        for index in (0..table_len()).step_by(7) {
            let entry = table_entry(index).unwrap();
            assert!(entry.alpha.is_finite(), "alpha at {}", rd_at(index));
            if entry.ta > 0.0 {
                assert!(entry.epsilon.is_finite(), "epsilon at {}", rd_at(index));
            }
        }
    }

    #[test]
    fn interpolation_stays_between_neighbours() {
        let a = table_entry(1000).unwrap();
        let b = table_entry(1001).unwrap();
        let mid = lookup(0.5 * (rd_at(1000) + rd_at(1001)));
        assert!(mid.te >= a.te.min(b.te) && mid.te <= a.te.max(b.te));
        assert!(mid.alpha >= a.alpha.min(b.alpha) && mid.alpha <= a.alpha.max(b.alpha));
    }

    #[test]
    fn regression_branches_meet() {
        let below = basic_times(1.8476);
        let above = basic_times(1.8477);
        assert_relative_eq!(below.0, above.0, epsilon = 1e-2);
        assert_relative_eq!(below.1, above.1, epsilon = 1e-2);
    }

    #[test]
    fn shape_is_consistent_with_times() {
        let (te, tp, ta) = basic_times(1.2);
        let shape = shape_from_rd(1.2);
        assert_relative_eq!(shape.oq, te);
        assert_relative_eq!(shape.am * shape.oq, tp, epsilon = 1e-15);
        assert_relative_eq!(shape.qa * (1.0 - te), ta, epsilon = 1e-15);
    }
}
