//! Example construction: anchors, feature/target windows, splits and scaling

pub mod adapter;
pub mod features;
pub mod metrics;
pub mod normalize;
pub mod split;
pub mod targets;
pub mod window;

pub use adapter::*;
pub use features::*;
pub use metrics::*;
pub use normalize::*;
pub use split::*;
pub use targets::*;
pub use window::*;
