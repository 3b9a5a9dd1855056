pub const VMSTATE_MAGIC: &[u8; 8] = b"VMSTSNAP";
pub const VMSTATE_VERSION_V1: u16 = 1;
pub const VMSTATE_ENDIANNESS_LITTLE: u8 = 1;

/// Fixed byte length of the file header.
pub const VMSTATE_HEADER_LEN: usize = 32;

/// Fixed byte length of a section header (id + version + flags + len).
pub const SECTION_HEADER_LEN: u64 = 16;

/// Payload schema version written for sections this crate understands.
pub const SECTION_VERSION_V1: u16 = 1;

/// On-disk size of the tap interface name buffer, including the mandatory NUL
/// terminator.
pub const TAP_NAME_BUF_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionId(pub u32);

impl SectionId {
    /// Per-vCPU register banks.
    pub const VCPU_STATES: SectionId = SectionId(1);
    /// Device configuration, currently the network device records.
    pub const VM_STATE: SectionId = SectionId(2);

    pub fn name(self) -> Option<&'static str> {
        match self {
            SectionId::VCPU_STATES => Some("vcpu-states"),
            SectionId::VM_STATE => Some("vm-state"),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<SectionId> {
        match name {
            "vcpu-states" => Some(SectionId::VCPU_STATES),
            "vm-state" => Some(SectionId::VM_STATE),
            _ => None,
        }
    }
}

impl core::fmt::Display for SectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(name) = self.name() {
            write!(f, "{name}({})", self.0)
        } else {
            write!(f, "SectionId({})", self.0)
        }
    }
}

/// Guest architecture the snapshot was taken on. Register ids are only
/// meaningful relative to this.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetArch {
    X86_64,
    Aarch64,
}

impl TargetArch {
    pub fn tag(self) -> u8 {
        match self {
            TargetArch::X86_64 => 1,
            TargetArch::Aarch64 => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<TargetArch> {
        match tag {
            1 => Some(TargetArch::X86_64),
            2 => Some(TargetArch::Aarch64),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TargetArch::X86_64 => "x86_64",
            TargetArch::Aarch64 => "aarch64",
        }
    }
}

impl core::fmt::Display for TargetArch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
