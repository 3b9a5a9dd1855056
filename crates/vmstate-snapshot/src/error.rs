use std::io;

use thiserror::Error;

use crate::types::RegisterId;

pub type Result<T> = std::result::Result<T, VmstateError>;

#[derive(Debug, Error)]
pub enum VmstateError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("out of memory allocating {len} bytes")]
    OutOfMemory { len: usize },

    #[error("invalid vmstate magic")]
    InvalidMagic,

    #[error("unsupported vmstate version {0}")]
    UnsupportedVersion(u16),

    #[error("invalid endianness tag {0}")]
    InvalidEndianness(u8),

    #[error("unknown target architecture tag {0}")]
    UnknownArch(u8),

    #[error("declared payload length {declared} does not match actual length {actual}")]
    PayloadLenMismatch { declared: u64, actual: u64 },

    #[error("payload checksum mismatch (declared {declared:#010x}, actual {actual:#010x})")]
    ChecksumMismatch { declared: u32, actual: u32 },

    #[error("corrupt vmstate: {0}")]
    Corrupt(&'static str),

    #[error("utf-8 decoding failed: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("no {0} section in this vmstate")]
    SectionNotFound(&'static str),

    #[error("duplicate register id {id} in the bank of vcpu {vcpu}")]
    DuplicateRegisterId { vcpu: usize, id: RegisterId },

    #[error("duplicate network device id {0:?}")]
    DuplicateDeviceId(String),

    #[error("invalid tap name: {0}")]
    TapNameInvalid(&'static str),

    #[error("tap name is {len} bytes, the format allows at most {max}")]
    TapNameTooLong { len: usize, max: usize },

    #[error("edit changed the vcpu count (expected {expected}, found {found})")]
    VcpuCountChanged { expected: usize, found: usize },

    #[error("edit changed the section layout: {0}")]
    SectionLayoutChanged(&'static str),

    #[error("cannot pick a network device to rename: the vm-state section holds {count} devices")]
    AmbiguousNetDevice { count: usize },
}
