//! Mathematical constants

/// 0.5 ln(2π)
pub const HALF_LN_2PI: f64 = 0.918_938_533_204_672_7;
/// ln(2π)
pub const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// Diagonal jitter added to inducing-point covariance matrices before
/// factorization
pub const DEFAULT_JITTER: f64 = 1E-6;
