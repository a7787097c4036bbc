pub mod agent;
pub mod algorithm;
pub mod buffer;
pub mod checkpoint;
pub mod distributions;
pub mod logger;
pub mod on_policy;
pub mod policies;
pub mod rollout;
pub mod spaces;
pub mod to_tensor;
pub mod utils;
