//! Physical quantities used throughout the reconstruction.
//!
//! Scanner dimensions are carried around as `uom` quantities so that the
//! units are explicit at every interface. The numerical kernels work on plain
//! `f32`s in mm: convert at the boundary with `mm_` and friends.

pub mod todo;

pub use uom;
pub use uom::si::Quantity;
pub use uom::si::f32::{Angle, Length, Ratio};
pub use uom::ConstZero;

mod units {
  pub use uom::si::{length::{nanometer, millimeter, centimeter},
                    ratio ::ratio,
                    angle ::{radian, degree},
  };
}

// Making values from float literals seems to be very long-winded, so provide
// some pithily-named convenience constructors.

/// Generate a function called NAME which returns QUANTITY by interpreting its
/// argument as UNIT
///
/// wrap!(NAME QUANTITY UNIT);
macro_rules! wrap {
  ($name:ident $quantity:ident $unit:ident ) => {
    pub fn $name(x: f32) -> $quantity { $quantity::new::<units::$unit>(x) }
  };
}

wrap!(cm     Length         centimeter);
wrap!(mm     Length         millimeter);
wrap!(nm     Length          nanometer);
wrap!(ratio  Ratio               ratio);
wrap!(radian Angle              radian);
wrap!(degree Angle              degree);

// Reverse direction of the above.
pub fn mm_    (x: Length) -> f32 { x.get::<units::millimeter>() }
pub fn cm_    (x: Length) -> f32 { x.get::<units::centimeter>() }
pub fn ratio_ (x: Ratio ) -> f32 { x.get::<units::ratio>() }
pub fn radian_(x: Angle ) -> f32 { x.get::<units::radian>() }
pub fn degree_(x: Angle ) -> f32 { x.get::<units::degree>() }

/// Half a turn. Views of a sinogram cover `[0, PI)`.
pub fn half_turn() -> Angle { radian(std::f32::consts::PI) }

#[macro_export]
macro_rules! assert_uom_eq {
  ($unit:ident, $lhs:expr, $rhs:expr, $algo:ident <= $tol:expr) => {
    float_eq::assert_float_eq!($lhs.get::<$unit>(), $rhs.get::<$unit>(), $algo <= $tol)
  };
}

pub mod unit {
  pub use super::units::*;
}
