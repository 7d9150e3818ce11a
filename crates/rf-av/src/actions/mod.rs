//! Media processing actions: stabilization, upscaling, frame interpolation,
//! and the final audio mix / subtitle burn-in, plus the frame extraction and
//! reassembly helpers they share.

mod finalize;
mod frames;
mod interpolate;
mod stabilize;
mod upscale;

pub use finalize::{finalize, finalize_args, AudioMix, FinalizeInputs};
pub use frames::{
    assemble_frames, count_frames, extract_frames, source_frame_rate, Reassembly, FRAME_PATTERN,
};
pub use interpolate::interpolate;
pub use stabilize::stabilize;
pub use upscale::upscale;
