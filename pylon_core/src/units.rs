//! # Moment Units
//!
//! Bending moments pass between the load solver, the member selector, the
//! foundation and the connection checks in three different units. These
//! wrappers keep the conversions explicit. They serialize as bare numbers.
//!
//! | Type | Unit | Produced by |
//! |------|------|-------------|
//! | [`FtLb`] | ft-lb | force (lb) × lever arm (ft) |
//! | [`KipFt`] | kip-ft | load results, member demand |
//! | [`KipIn`] | kip-in | section capacity φ·Fy·Sx |
//!
//! ## Example
//!
//! ```rust
//! use pylon_core::units::{FtLb, KipFt, KipIn};
//!
//! let demand: KipFt = FtLb(150_000.0).into();
//! let demand_in: KipIn = demand.into();
//! assert_eq!(demand_in.value(), 1800.0);
//! ```

use std::ops::Mul;

use serde::{Deserialize, Serialize};

/// Moment in foot-pounds
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FtLb(pub f64);

/// Moment in kip-feet
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KipFt(pub f64);

/// Moment in kip-inches
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KipIn(pub f64);

impl From<FtLb> for KipFt {
    fn from(m: FtLb) -> Self {
        KipFt(m.0 / 1000.0)
    }
}

impl From<KipFt> for FtLb {
    fn from(m: KipFt) -> Self {
        FtLb(m.0 * 1000.0)
    }
}

impl From<KipFt> for KipIn {
    fn from(m: KipFt) -> Self {
        KipIn(m.0 * 12.0)
    }
}

impl From<KipIn> for KipFt {
    fn from(m: KipIn) -> Self {
        KipFt(m.0 / 12.0)
    }
}

macro_rules! impl_moment {
    ($type:ty) => {
        /// Scale by a load factor
        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, factor: f64) -> Self::Output {
                Self(self.0 * factor)
            }
        }

        impl $type {
            pub fn value(self) -> f64 {
                self.0
            }
        }
    };
}

impl_moment!(FtLb);
impl_moment!(KipFt);
impl_moment!(KipIn);
