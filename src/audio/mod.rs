// Audio module - clocks, tone output and the cpal backend

pub mod clock;
pub mod device;
pub mod dsp_utils;
pub mod format_conversion;
pub mod offline;
pub mod timing;
pub mod tone;
