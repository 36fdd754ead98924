pub mod path;
pub mod xml;
pub(crate) mod zip;
