pub(crate) mod catalog;
pub(crate) mod execution;
pub(crate) mod program;
pub(crate) mod raster;
pub(crate) mod session;
