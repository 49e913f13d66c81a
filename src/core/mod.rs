pub mod array;
pub mod convert;
pub mod error;
pub mod interner;
pub mod string;
pub mod value;
