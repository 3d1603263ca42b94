#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod bus;
pub mod monitor;
pub mod register;
pub mod sensor;
