//! Built-in stages, thin adapters from [`StageContext`](crate::StageContext)
//! to the `rf_av` actions.

mod finalize;
mod interpolate;
mod stabilize;
mod upscale;

pub use finalize::FinalizeStage;
pub use interpolate::InterpolateStage;
pub use stabilize::StabilizeStage;
pub use upscale::UpscaleStage;

use crate::stage::Stage;

/// All built-in stages, in run order.
pub fn default_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(StabilizeStage),
        Box::new(UpscaleStage),
        Box::new(InterpolateStage),
        Box::new(FinalizeStage),
    ]
}
