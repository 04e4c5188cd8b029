use rand::Rng;

/// Stand-in for the ML model the demo pretends to have.
///
/// Each scorer adds `oracle.sample() * max_weight` to its total. Keeping the
/// random source behind a trait lets tests pin the term to a fixed value and
/// make every tier decision deterministic.
pub trait MlOracle: Send + Sync {
    /// A value in `[0, 1)`.
    fn sample(&self) -> f64;
}

/// Production oracle: plain uniform randomness.
pub struct RandomOracle;

impl MlOracle for RandomOracle {
    fn sample(&self) -> f64 {
        rand::rng().random_range(0.0..1.0)
    }
}

/// Test oracle returning a constant.
pub struct FixedOracle(pub f64);

impl MlOracle for FixedOracle {
    fn sample(&self) -> f64 {
        self.0
    }
}
