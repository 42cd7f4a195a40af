/// Injectable randomness for `selectForQuery`'s weighted strategy draw, so
/// tests can pin a seed (spec §9, "Strategy selection RNG: must be seedable
/// for tests").
pub trait RngSource: Send + Sync {
    /// Returns a value in `[0, 100)`, used against cumulative
    /// `rolloutPercentage` weights.
    fn next_weight(&self) -> u8;
}
