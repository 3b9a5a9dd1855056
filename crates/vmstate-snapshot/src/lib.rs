//! Model of the hypervisor "vmstate" snapshot file: a format-aware loader,
//! typed in-memory representation, edit operations, a post-edit validator,
//! and an atomic serializer.
//!
//! Sections whose id this crate does not register are carried as opaque
//! bytes and re-emitted verbatim at their original position, so a snapshot
//! produced by a newer hypervisor survives an edit untouched apart from the
//! sections the edit targets.

mod edit;
mod error;
mod format;
mod image;
mod io;
mod report;
mod types;
mod validate;

pub use crate::edit::{apply_edit, edit_image, EditOperation};
pub use crate::error::{Result, VmstateError};
pub use crate::format::{
    SectionId, TargetArch, SECTION_VERSION_V1, TAP_NAME_BUF_LEN, VMSTATE_ENDIANNESS_LITTLE,
    VMSTATE_HEADER_LEN, VMSTATE_MAGIC, VMSTATE_VERSION_V1,
};
pub use crate::image::{
    load_vmstate, read_image, save_vmstate, write_image, Section, SectionBody, SnapshotImage,
};
pub use crate::report::{report_net_state, report_sections, report_vcpu_states, report_version};
pub use crate::types::{
    NetDeviceState, NetDevicesSection, RegisterEntry, RegisterId, VcpuRegisterBank,
    VcpuStatesSection,
};
pub use crate::validate::{validate_edit, validate_image};
