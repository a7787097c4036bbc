pub mod categorical;
pub mod normal;

pub use categorical::Categorical;
pub use normal::{DiagGaussian, SquashedDiagGaussian};
