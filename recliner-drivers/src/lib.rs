//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the capability traits
//! defined in recliner-core on top of `embedded-hal`:
//!
//! - Motor drivers (PWM + reversing relay pair)
//! - Current sense (ADC channel with oversampling)

#![no_std]
#![deny(unsafe_code)]

pub mod motor;
pub mod sensor;
