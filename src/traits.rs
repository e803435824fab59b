use crate::filters::Sos;

pub trait BasicFilter {
    /// Returns the filter as a cascade of second-order sections in the z-plane.
    /// Each section is `[b0, b1, b2, a0, a1, a2]`, normalized so that `a0 = 1`.
    fn sos_coefficients(&self) -> Vec<Sos>;
    /// Perform one step of a filter.
    fn step(&mut self, x: f64) -> f64;
}
