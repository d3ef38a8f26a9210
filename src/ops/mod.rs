pub mod adjustments;
pub mod brush;
pub mod pipeline;
pub mod transform;
