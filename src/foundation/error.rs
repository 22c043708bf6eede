/// Convenience result type used across clmandelbrot.
pub type MandelResult<T> = Result<T, MandelError>;

/// Maximum number of bytes of compiler diagnostics retained in [`MandelError::Compile`].
pub const COMPILE_LOG_LIMIT: usize = 2048;

/// Pipeline stage a failure originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Platform/device enumeration.
    DeviceEnumeration,
    /// Building a context scoped to the render device.
    ContextCreation,
    /// Compiling the kernel source.
    Compilation,
    /// Extracting the kernel entry point from the compiled program.
    KernelLookup,
    /// Creating the command queue.
    QueueCreation,
    /// Allocating the device output buffer.
    BufferAllocation,
    /// Binding kernel parameters.
    ArgumentBinding,
    /// Querying the kernel work-group limit.
    WorkGroupQuery,
    /// Enqueueing the parallel range and draining the queue.
    Dispatch,
    /// Copying the output buffer back to the host.
    Readback,
    /// Host-side allocation of the result field.
    HostAllocation,
}

impl Stage {
    /// Stable snake_case name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Stage::DeviceEnumeration => "device_enumeration",
            Stage::ContextCreation => "context_creation",
            Stage::Compilation => "compilation",
            Stage::KernelLookup => "kernel_lookup",
            Stage::QueueCreation => "queue_creation",
            Stage::BufferAllocation => "buffer_allocation",
            Stage::ArgumentBinding => "argument_binding",
            Stage::WorkGroupQuery => "work_group_query",
            Stage::Dispatch => "dispatch",
            Stage::Readback => "readback",
            Stage::HostAllocation => "host_allocation",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Top-level error taxonomy used by the render pipeline.
#[derive(thiserror::Error, Debug)]
pub enum MandelError {
    /// Invalid request, settings, or kernel source reference.
    #[error("validation error: {0}")]
    Validation(String),

    /// No compute device could be enumerated (or the requested one does not exist).
    #[error("no compute device: {0}")]
    NoDevice(String),

    /// The device context could not be built.
    #[error("context creation failed: {0}")]
    ContextCreation(String),

    /// The kernel source failed to compile. Carries the (truncated) build log.
    #[error("kernel compilation failed: {log}")]
    Compile {
        /// Compiler diagnostics, at most [`COMPILE_LOG_LIMIT`] bytes.
        log: String,
    },

    /// The named entry point is absent from the compiled program.
    #[error("kernel entry point '{0}' not found")]
    KernelLookup(String),

    /// The command queue could not be created.
    #[error("command queue creation failed: {0}")]
    QueueCreation(String),

    /// The device output buffer could not be allocated.
    #[error("device buffer allocation failed: {0}")]
    BufferAllocation(String),

    /// A kernel parameter could not be bound.
    #[error("kernel argument binding failed: {0}")]
    ArgumentBinding(String),

    /// The kernel work-group limit could not be queried.
    #[error("work-group size query failed: {0}")]
    WorkGroupQuery(String),

    /// Enqueueing or draining the parallel range failed.
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// Copying the output buffer back to host memory failed.
    #[error("readback failed: {0}")]
    Readback(String),

    /// Host-side allocation failed.
    #[error("host allocation failed: {0}")]
    HostAllocation(String),

    /// Errors when serializing or deserializing settings and device records.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MandelError {
    /// Build a [`MandelError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MandelError::NoDevice`] value.
    pub fn no_device(msg: impl Into<String>) -> Self {
        Self::NoDevice(msg.into())
    }

    /// Build a [`MandelError::ContextCreation`] value.
    pub fn context_creation(msg: impl Into<String>) -> Self {
        Self::ContextCreation(msg.into())
    }

    /// Build a [`MandelError::Compile`] value, truncating the log to [`COMPILE_LOG_LIMIT`].
    pub fn compile(log: impl Into<String>) -> Self {
        Self::Compile {
            log: truncate_log(log.into(), COMPILE_LOG_LIMIT),
        }
    }

    /// Build a [`MandelError::KernelLookup`] value.
    pub fn kernel_lookup(entry_point: impl Into<String>) -> Self {
        Self::KernelLookup(entry_point.into())
    }

    /// Build a [`MandelError::QueueCreation`] value.
    pub fn queue_creation(msg: impl Into<String>) -> Self {
        Self::QueueCreation(msg.into())
    }

    /// Build a [`MandelError::BufferAllocation`] value.
    pub fn buffer_allocation(msg: impl Into<String>) -> Self {
        Self::BufferAllocation(msg.into())
    }

    /// Build a [`MandelError::ArgumentBinding`] value.
    pub fn argument_binding(msg: impl Into<String>) -> Self {
        Self::ArgumentBinding(msg.into())
    }

    /// Build a [`MandelError::WorkGroupQuery`] value.
    pub fn work_group_query(msg: impl Into<String>) -> Self {
        Self::WorkGroupQuery(msg.into())
    }

    /// Build a [`MandelError::Dispatch`] value.
    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::Dispatch(msg.into())
    }

    /// Build a [`MandelError::Readback`] value.
    pub fn readback(msg: impl Into<String>) -> Self {
        Self::Readback(msg.into())
    }

    /// Build a [`MandelError::HostAllocation`] value.
    pub fn host_allocation(msg: impl Into<String>) -> Self {
        Self::HostAllocation(msg.into())
    }

    /// Build a [`MandelError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build the error variant belonging to `stage`.
    pub fn for_stage(stage: Stage, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match stage {
            Stage::DeviceEnumeration => Self::NoDevice(msg),
            Stage::ContextCreation => Self::ContextCreation(msg),
            Stage::Compilation => Self::compile(msg),
            Stage::KernelLookup => Self::KernelLookup(msg),
            Stage::QueueCreation => Self::QueueCreation(msg),
            Stage::BufferAllocation => Self::BufferAllocation(msg),
            Stage::ArgumentBinding => Self::ArgumentBinding(msg),
            Stage::WorkGroupQuery => Self::WorkGroupQuery(msg),
            Stage::Dispatch => Self::Dispatch(msg),
            Stage::Readback => Self::Readback(msg),
            Stage::HostAllocation => Self::HostAllocation(msg),
        }
    }

    /// Attribute this error to `stage`.
    ///
    /// Errors already tagged with `stage` pass through untouched; anything else is rewrapped
    /// into the `stage` variant with its display text as the message.
    pub fn at_stage(self, stage: Stage) -> Self {
        if self.stage() == Some(stage) {
            self
        } else {
            Self::for_stage(stage, self.to_string())
        }
    }

    /// Pipeline stage this error belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::NoDevice(_) => Some(Stage::DeviceEnumeration),
            Self::ContextCreation(_) => Some(Stage::ContextCreation),
            Self::Compile { .. } => Some(Stage::Compilation),
            Self::KernelLookup(_) => Some(Stage::KernelLookup),
            Self::QueueCreation(_) => Some(Stage::QueueCreation),
            Self::BufferAllocation(_) => Some(Stage::BufferAllocation),
            Self::ArgumentBinding(_) => Some(Stage::ArgumentBinding),
            Self::WorkGroupQuery(_) => Some(Stage::WorkGroupQuery),
            Self::Dispatch(_) => Some(Stage::Dispatch),
            Self::Readback(_) => Some(Stage::Readback),
            Self::HostAllocation(_) => Some(Stage::HostAllocation),
            Self::Validation(_) | Self::Serde(_) | Self::Other(_) => None,
        }
    }
}

/// Cut `log` down to at most `limit` bytes without splitting a UTF-8 sequence.
fn truncate_log(mut log: String, limit: usize) -> String {
    if log.len() <= limit {
        return log;
    }
    let mut cut = limit;
    while !log.is_char_boundary(cut) {
        cut -= 1;
    }
    log.truncate(cut);
    log
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
