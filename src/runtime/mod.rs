//! Run execution: child-process supervision, worker threads and the
//! surfaces that present a run to the user

pub mod engine;
pub mod process;
pub mod pump;
pub mod surface;
