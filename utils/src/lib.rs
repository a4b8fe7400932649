#![cfg_attr(not(feature = "std"), no_std)]

//! Algebraic helpers shared by the incentive system crates: hashing to fields and groups, a
//! keyed PRF, Pedersen commitment keys, Elgamal in the exponent over small digits, digit
//! decomposition and a lookup table for small discrete logs.

#[macro_use]
pub mod serde_utils;
pub mod aliases;
pub mod commitment;
pub mod digits;
pub mod elgamal;
pub mod hashing_utils;
#[macro_use]
pub mod macros;
pub mod msm;
pub mod prf;
pub mod solve_discrete_log;
