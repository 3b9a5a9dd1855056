use std::collections::HashSet;
use std::mem::discriminant;

use crate::error::{Result, VmstateError};
use crate::format::TAP_NAME_BUF_LEN;
use crate::image::{SectionBody, SnapshotImage};

/// Re-checks every structural invariant after a mutation, against the
/// pre-mutation image. Mutations may alter payloads of understood sections,
/// never the section layout, the header fields, or opaque bytes.
pub fn validate_edit(original: &SnapshotImage, edited: &SnapshotImage) -> Result<()> {
    if original.version != edited.version || original.arch != edited.arch {
        return Err(VmstateError::SectionLayoutChanged("header fields changed"));
    }
    if original.sections.len() != edited.sections.len() {
        return Err(VmstateError::SectionLayoutChanged("section count changed"));
    }

    for (before, after) in original.sections.iter().zip(&edited.sections) {
        if before.id != after.id {
            return Err(VmstateError::SectionLayoutChanged("section order changed"));
        }
        if before.version != after.version || before.flags != after.flags {
            return Err(VmstateError::SectionLayoutChanged(
                "section header fields changed",
            ));
        }
        if discriminant(&before.body) != discriminant(&after.body) {
            return Err(VmstateError::SectionLayoutChanged(
                "section body kind changed",
            ));
        }
        if let (SectionBody::Opaque(a), SectionBody::Opaque(b)) = (&before.body, &after.body) {
            if a != b {
                return Err(VmstateError::SectionLayoutChanged(
                    "opaque section payload changed",
                ));
            }
        }
    }

    if let (Some(before), Some(after)) = (original.vcpu_states(), edited.vcpu_states()) {
        if before.banks.len() != after.banks.len() {
            return Err(VmstateError::VcpuCountChanged {
                expected: before.banks.len(),
                found: after.banks.len(),
            });
        }
    }

    validate_image(edited)
}

/// Invariants any image must satisfy before it may be serialized.
pub fn validate_image(image: &SnapshotImage) -> Result<()> {
    for section in &image.sections {
        match &section.body {
            SectionBody::VcpuStates(states) => {
                u32::try_from(states.banks.len())
                    .map_err(|_| VmstateError::Corrupt("too many vcpus"))?;
                for (vcpu, bank) in states.banks.iter().enumerate() {
                    u32::try_from(bank.regs.len())
                        .map_err(|_| VmstateError::Corrupt("too many registers in one bank"))?;
                    let mut seen = HashSet::with_capacity(bank.regs.len());
                    for reg in &bank.regs {
                        if !seen.insert(reg.id) {
                            return Err(VmstateError::DuplicateRegisterId { vcpu, id: reg.id });
                        }
                    }
                }
            }
            SectionBody::NetDevices(net) => {
                u32::try_from(net.devices.len())
                    .map_err(|_| VmstateError::Corrupt("too many network devices"))?;
                let mut seen = HashSet::with_capacity(net.devices.len());
                for device in &net.devices {
                    if !seen.insert(device.device_id.as_str()) {
                        return Err(VmstateError::DuplicateDeviceId(device.device_id.clone()));
                    }
                    if device.tap_name.len() >= TAP_NAME_BUF_LEN {
                        return Err(VmstateError::TapNameTooLong {
                            len: device.tap_name.len(),
                            max: TAP_NAME_BUF_LEN - 1,
                        });
                    }
                }
            }
            SectionBody::Opaque(_) => {}
        }
    }
    Ok(())
}
