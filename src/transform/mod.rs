// Cell transforms applied between loading and output
pub mod transformer;


pub use transformer::*;
