pub mod base;
pub mod classic_control;
pub mod registry;
pub mod render;
pub mod video;
pub mod wrappers;
