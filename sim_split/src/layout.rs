//! Sets constants for the on-disk pair store layout.
//!
//! All integers and floats are big endian.

//for the file header
pub const COUNT_START: usize = 0;
pub const COUNT_SIZE: usize = 8;

pub const FLOOR_START: usize = COUNT_START + COUNT_SIZE;
pub const FLOOR_SIZE: usize = 4;

pub const HEADER_SIZE: usize = FLOOR_START + FLOOR_SIZE;

//for each PairRecord
pub const I_START: usize = 0;
pub const I_SIZE: usize = 8;

pub const J_START: usize = I_START + I_SIZE;
pub const J_SIZE: usize = 8;

pub const SIM_START: usize = J_START + J_SIZE;
pub const SIM_SIZE: usize = 4;

pub const RECORD_SIZE: usize = SIM_START + SIM_SIZE;
