//! Declarative description of the device and platform attributes reported by
//! [`list_devices`](crate::list_devices).

/// `CL_DEVICE_TYPE_DEFAULT`.
pub const DEVICE_TYPE_DEFAULT: u64 = 1 << 0;
/// `CL_DEVICE_TYPE_CPU`.
pub const DEVICE_TYPE_CPU: u64 = 1 << 1;
/// `CL_DEVICE_TYPE_GPU`.
pub const DEVICE_TYPE_GPU: u64 = 1 << 2;
/// `CL_DEVICE_TYPE_ACCELERATOR`.
pub const DEVICE_TYPE_ACCELERATOR: u64 = 1 << 3;

/// `CL_FP_DENORM`.
pub const FP_DENORM: u64 = 1 << 0;
/// `CL_FP_INF_NAN`.
pub const FP_INF_NAN: u64 = 1 << 1;
/// `CL_FP_ROUND_TO_NEAREST`.
pub const FP_ROUND_TO_NEAREST: u64 = 1 << 2;
/// `CL_FP_ROUND_TO_ZERO`.
pub const FP_ROUND_TO_ZERO: u64 = 1 << 3;
/// `CL_FP_ROUND_TO_INF`.
pub const FP_ROUND_TO_INF: u64 = 1 << 4;
/// `CL_FP_FMA`.
pub const FP_FMA: u64 = 1 << 5;

/// Device attributes queried through
/// [`ComputeApi::device_field`](crate::ComputeApi::device_field).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceField {
    /// Device classification bitfield (`DEVICE_TYPE_*`).
    Type,
    /// Vendor identifier.
    VendorId,
    /// Parallel compute units.
    MaxComputeUnits,
    /// Work-item dimensions supported.
    MaxWorkItemDimensions,
    /// Per-dimension work-item maxima.
    MaxWorkItemSizes,
    /// Work-group size limit.
    MaxWorkGroupSize,
    /// Global memory size in bytes.
    GlobalMemSize,
    /// Local memory size in bytes.
    LocalMemSize,
    /// Global memory cache size in bytes.
    GlobalMemCacheSize,
    /// Constant buffer size limit in bytes.
    MaxConstantBufferSize,
    /// Largest single allocation in bytes.
    MaxMemAllocSize,
    /// Single precision floating-point capability bitfield (`FP_*`).
    SingleFpConfig,
    /// Double precision floating-point capability bitfield (`FP_*`).
    DoubleFpConfig,
    /// Image objects supported.
    ImageSupport,
    /// Error-correcting memory.
    ErrorCorrectionSupport,
    /// Little-endian device.
    EndianLittle,
    /// Device is available.
    Available,
    /// Kernel compiler is available.
    CompilerAvailable,
    /// Device name.
    Name,
    /// Vendor name.
    Vendor,
    /// Driver version.
    DriverVersion,
    /// Supported profile.
    Profile,
    /// Supported API version.
    Version,
    /// Space separated extension list.
    Extensions,
}

/// Platform attributes queried through
/// [`ComputeApi::platform_field`](crate::ComputeApi::platform_field).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlatformField {
    /// Supported profile.
    Profile,
    /// Supported API version.
    Version,
    /// Platform name.
    Name,
    /// Platform vendor.
    Vendor,
    /// Space separated extension list.
    Extensions,
}

/// Shape of an attribute value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Flag set, reported as an integer.
    Bitfield,
    /// Unsigned integer (counts and byte sizes).
    UInt,
    /// Variable-length list of unsigned integers.
    UIntList,
    /// Boolean flag.
    Bool,
    /// String.
    Text,
}

/// A queried attribute value.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum InfoValue {
    /// Flag set.
    Bitfield(u64),
    /// Unsigned integer.
    UInt(u64),
    /// List of unsigned integers.
    UIntList(Vec<u64>),
    /// Boolean flag.
    Bool(bool),
    /// String.
    Text(String),
}

impl InfoValue {
    /// Kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            InfoValue::Bitfield(_) => ValueKind::Bitfield,
            InfoValue::UInt(_) => ValueKind::UInt,
            InfoValue::UIntList(_) => ValueKind::UIntList,
            InfoValue::Bool(_) => ValueKind::Bool,
            InfoValue::Text(_) => ValueKind::Text,
        }
    }
}

/// One row of an attribute table: record key, field to query, expected value kind.
#[derive(Clone, Copy, Debug)]
pub struct FieldDescriptor<F> {
    /// Key in the serialized record.
    pub key: &'static str,
    /// Attribute to query.
    pub field: F,
    /// Expected kind. Values of any other kind are reported as null.
    pub kind: ValueKind,
}

const fn d(
    key: &'static str,
    field: DeviceField,
    kind: ValueKind,
) -> FieldDescriptor<DeviceField> {
    FieldDescriptor { key, field, kind }
}

const fn p(
    key: &'static str,
    field: PlatformField,
    kind: ValueKind,
) -> FieldDescriptor<PlatformField> {
    FieldDescriptor { key, field, kind }
}

/// Device attributes in report order.
pub const DEVICE_FIELDS: &[FieldDescriptor<DeviceField>] = &[
    d("type", DeviceField::Type, ValueKind::Bitfield),
    d("vendor_id", DeviceField::VendorId, ValueKind::UInt),
    d("max_compute_units", DeviceField::MaxComputeUnits, ValueKind::UInt),
    d(
        "max_work_item_dimensions",
        DeviceField::MaxWorkItemDimensions,
        ValueKind::UInt,
    ),
    d(
        "max_work_item_sizes",
        DeviceField::MaxWorkItemSizes,
        ValueKind::UIntList,
    ),
    d("max_work_group_size", DeviceField::MaxWorkGroupSize, ValueKind::UInt),
    d("global_mem_size", DeviceField::GlobalMemSize, ValueKind::UInt),
    d("local_mem_size", DeviceField::LocalMemSize, ValueKind::UInt),
    d(
        "global_mem_cache_size",
        DeviceField::GlobalMemCacheSize,
        ValueKind::UInt,
    ),
    d(
        "max_constant_buffer_size",
        DeviceField::MaxConstantBufferSize,
        ValueKind::UInt,
    ),
    d("max_mem_alloc_size", DeviceField::MaxMemAllocSize, ValueKind::UInt),
    d("single_fp_config", DeviceField::SingleFpConfig, ValueKind::Bitfield),
    d("double_fp_config", DeviceField::DoubleFpConfig, ValueKind::Bitfield),
    d("image_support", DeviceField::ImageSupport, ValueKind::Bool),
    d(
        "error_correction_support",
        DeviceField::ErrorCorrectionSupport,
        ValueKind::Bool,
    ),
    d("endian_little", DeviceField::EndianLittle, ValueKind::Bool),
    d("available", DeviceField::Available, ValueKind::Bool),
    d("compiler_available", DeviceField::CompilerAvailable, ValueKind::Bool),
    d("name", DeviceField::Name, ValueKind::Text),
    d("vendor", DeviceField::Vendor, ValueKind::Text),
    d("driver_version", DeviceField::DriverVersion, ValueKind::Text),
    d("profile", DeviceField::Profile, ValueKind::Text),
    d("version", DeviceField::Version, ValueKind::Text),
    d("extensions", DeviceField::Extensions, ValueKind::Text),
];

/// Platform attributes in report order.
pub const PLATFORM_FIELDS: &[FieldDescriptor<PlatformField>] = &[
    p("profile", PlatformField::Profile, ValueKind::Text),
    p("version", PlatformField::Version, ValueKind::Text),
    p("name", PlatformField::Name, ValueKind::Text),
    p("vendor", PlatformField::Vendor, ValueKind::Text),
    p("extensions", PlatformField::Extensions, ValueKind::Text),
];
