//! Cascades of second-order sections.

use crate::error::{Error, Result};
use crate::traits::BasicFilter;
use num_complex::Complex64;

/// One biquad section: `[b0, b1, b2, a0, a1, a2]`.
pub type Sos = [f64; 6];

/// Tolerance for deciding that a root is real or that two roots are conjugates.
const PAIR_TOLERANCE: f64 = 100.0 * f64::EPSILON;

/// A cascade of biquads run in transposed direct form II.
///
/// # Formulas
/// Per section, with `z0`, `z1` the section state:
/// ```text
///    y  = b0 * x + z0
///    z0 = b1 * x - a1 * y + z1
///    z1 = b2 * x - a2 * y
/// ```
/// An empty cascade passes its input through unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SosFilter {
    sos: Vec<Sos>,
    zi: Vec<[f64; 2]>,
}

impl SosFilter {
    /// Builds a cascade, dividing every section by its `a0`.
    #[must_use]
    pub fn new(sos: Vec<Sos>) -> Self {
        let sos: Vec<Sos> = sos
            .into_iter()
            .map(|s| {
                let a0 = s[3];
                [s[0] / a0, s[1] / a0, s[2] / a0, 1.0, s[4] / a0, s[5] / a0]
            })
            .collect();
        let zi = vec![[0.0; 2]; sos.len()];
        SosFilter { sos, zi }
    }

    /// Builds a cascade from zeros, poles and gain.
    ///
    /// # Errors
    ///
    /// [`Error::UnpairedRoots`] when complex roots do not come in conjugate pairs.
    pub fn from_zpk(zeros: &[Complex64], poles: &[Complex64], gain: f64) -> Result<Self> {
        Ok(Self::new(zpk2sos(zeros, poles, gain)?))
    }

    #[must_use]
    pub fn coefficients(&self) -> &[Sos] {
        &self.sos
    }

    #[must_use]
    pub fn sections(&self) -> usize {
        self.sos.len()
    }

    /// Clears the state of every section.
    pub fn reset(&mut self) {
        self.zi.fill([0.0; 2]);
    }

    #[inline]
    fn tick(&mut self, x: f64) -> f64 {
        let mut cur = x;
        for (s, z) in self.sos.iter().zip(self.zi.iter_mut()) {
            let y = s[0] * cur + z[0];
            z[0] = s[1] * cur - s[4] * y + z[1];
            z[1] = s[2] * cur - s[5] * y;
            cur = y;
        }
        cur
    }

    /// Filters a block, carrying the state over to the next call.
    #[must_use]
    pub fn filter(&mut self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|&x| self.tick(x)).collect()
    }

    pub fn filter_in_place(&mut self, buffer: &mut [f64]) {
        for x in buffer {
            *x = self.tick(*x);
        }
    }

    /// `H(e^(iw))` for a normalized angular frequency `w` in radians per sample.
    #[must_use]
    pub fn frequency_response(&self, w: f64) -> Complex64 {
        sos_response(&self.sos, w)
    }
}

impl BasicFilter for SosFilter {
    fn sos_coefficients(&self) -> Vec<Sos> {
        self.sos.clone()
    }

    fn step(&mut self, x: f64) -> f64 {
        self.tick(x)
    }
}

/// Response of a cascade at normalized angular frequency `w`.
#[must_use]
pub fn sos_response(sos: &[Sos], w: f64) -> Complex64 {
    let z1 = Complex64::from_polar(1.0, -w);
    let z2 = z1 * z1;
    sos.iter().fold(Complex64::new(1.0, 0.0), |h, s| {
        h * (s[0] + s[1] * z1 + s[2] * z2) / (s[3] + s[4] * z1 + s[5] * z2)
    })
}

fn is_real(z: Complex64) -> bool {
    z.im.abs() <= PAIR_TOLERANCE * z.norm()
}

/// Sorts roots into conjugate pairs, negative imaginary part first, with pairs ordered by
/// real part. Real roots follow at the end in ascending order.
///
/// # Errors
///
/// [`Error::UnpairedRoots`] when a complex root has no conjugate.
pub fn cplxpair(roots: &[Complex64]) -> Result<Vec<Complex64>> {
    let mut reals: Vec<f64> = roots.iter().filter(|z| is_real(**z)).map(|z| z.re).collect();
    reals.sort_by(f64::total_cmp);

    let mut rest: Vec<Complex64> = roots.iter().copied().filter(|z| !is_real(*z)).collect();
    if rest.len() % 2 == 1 {
        return Err(Error::UnpairedRoots);
    }
    rest.sort_by(|a, b| a.re.total_cmp(&b.re));

    let mut paired = Vec::with_capacity(roots.len());
    while let Some(&first) = rest.first() {
        let (mut group, others): (Vec<Complex64>, Vec<Complex64>) = rest
            .iter()
            .partition(|z| (z.re - first.re).abs() <= PAIR_TOLERANCE * z.norm());
        if group.len() % 2 == 1 {
            return Err(Error::UnpairedRoots);
        }
        group.sort_by(|a, b| a.im.total_cmp(&b.im));

        let unpaired = group
            .iter()
            .zip(group.iter().rev())
            .any(|(a, b)| (a.im + b.im).abs() > PAIR_TOLERANCE * a.norm());
        if unpaired {
            return Err(Error::UnpairedRoots);
        }
        for z in group.iter().skip(group.len() / 2).rev() {
            paired.push(z.conj());
            paired.push(*z);
        }
        rest = others;
    }

    paired.extend(reals.into_iter().map(|re| Complex64::new(re, 0.0)));
    Ok(paired)
}

/// Splits roots into the positive-imaginary half of each conjugate pair and the real roots.
///
/// # Errors
///
/// See [`cplxpair`].
pub fn cplxreal(roots: &[Complex64]) -> Result<(Vec<Complex64>, Vec<f64>)> {
    let paired = cplxpair(roots)?;
    let complex = paired.iter().copied().filter(|z| !is_real(*z) && z.im > 0.0).collect();
    let real = paired.iter().filter(|z| is_real(**z)).map(|z| z.re).collect();
    Ok((complex, real))
}

/// Quadratic factors `[c1, c2]` of `1 + c1 z^-1 + c2 z^-2` for a set of roots.
fn quadratic_factors(complex: &[Complex64], mut real: Vec<f64>) -> Vec<[f64; 2]> {
    if real.len() % 2 == 1 {
        real.push(0.0);
    }
    complex
        .iter()
        .map(|z| [-2.0 * z.re, z.norm_sqr()])
        .chain(real.chunks_exact(2).map(|r| [-r[0] - r[1], r[0] * r[1]]))
        .collect()
}

/// Converts zeros, poles and gain into second-order sections.
///
/// Complex pairs are laid down before real pairs, then the section order is reversed so
/// that the poles closest to the unit circle come last. The gain goes into the first
/// section.
///
/// # Errors
///
/// [`Error::UnpairedRoots`] when complex roots do not come in conjugate pairs.
pub fn zpk2sos(zeros: &[Complex64], poles: &[Complex64], gain: f64) -> Result<Vec<Sos>> {
    let (zc, zr) = cplxreal(zeros)?;
    let (pc, pr) = cplxreal(poles)?;
    let numerators = quadratic_factors(&zc, zr);
    let denominators = quadratic_factors(&pc, pr);

    let sections = numerators.len().max(denominators.len()).max(1);
    let mut sos: Vec<Sos> = (0..sections)
        .map(|i| {
            let b = numerators.get(i).copied().unwrap_or([0.0; 2]);
            let a = denominators.get(i).copied().unwrap_or([0.0; 2]);
            [1.0, b[0], b[1], 1.0, a[0], a[1]]
        })
        .collect();
    sos.reverse();

    for c in &mut sos[0][..3] {
        *c *= gain;
    }
    Ok(sos)
}
