pub mod convert;
pub mod goal;
