pub(crate) mod api;
pub(crate) mod backend;
pub(crate) mod escape;
#[cfg(feature = "gpu")]
pub(crate) mod gpu;
pub(crate) mod host;
#[cfg(feature = "opencl")]
#[allow(unsafe_code)]
pub(crate) mod opencl;
