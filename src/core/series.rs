mod resample;
mod rolling;
mod smooth;

pub use self::{
    resample::Resampler,
    rolling::RollingMean,
    smooth::{SmoothingEngine, SmoothingMode},
};
