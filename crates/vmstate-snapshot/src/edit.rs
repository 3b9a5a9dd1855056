use std::collections::BTreeSet;

use crate::error::{Result, VmstateError};
use crate::format::TAP_NAME_BUF_LEN;
use crate::image::SnapshotImage;
use crate::types::RegisterId;
use crate::validate::validate_edit;

/// A single mutation request. Immutable once constructed; applying it
/// produces a new image and leaves the input untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOperation {
    /// Drop the given register ids from every vCPU bank. Ids that no bank
    /// holds are a silent no-op.
    RemoveRegs(BTreeSet<RegisterId>),
    /// Point the single network device at a different host tap interface.
    RenameNetTap { tap_name: String },
}

/// Applies `op` and re-checks the structural invariants against the
/// pre-edit image. This is the only edit entry point that should feed the
/// serializer.
pub fn edit_image(image: &SnapshotImage, op: &EditOperation) -> Result<SnapshotImage> {
    let edited = apply_edit(image, op)?;
    validate_edit(image, &edited)?;
    Ok(edited)
}

pub fn apply_edit(image: &SnapshotImage, op: &EditOperation) -> Result<SnapshotImage> {
    let mut edited = image.clone();
    match op {
        EditOperation::RemoveRegs(ids) => remove_regs(&mut edited, ids)?,
        EditOperation::RenameNetTap { tap_name } => rename_net_tap(&mut edited, tap_name)?,
    }
    Ok(edited)
}

fn remove_regs(image: &mut SnapshotImage, ids: &BTreeSet<RegisterId>) -> Result<()> {
    let states = image
        .vcpu_states_mut()
        .ok_or(VmstateError::SectionNotFound("vcpu-states"))?;

    let mut removed = 0usize;
    for bank in &mut states.banks {
        let before = bank.regs.len();
        bank.regs.retain(|reg| !ids.contains(&reg.id));
        removed += before - bank.regs.len();
    }
    tracing::debug!(requested = ids.len(), removed, "removed register entries");
    Ok(())
}

fn rename_net_tap(image: &mut SnapshotImage, tap_name: &str) -> Result<()> {
    if tap_name.is_empty() {
        return Err(VmstateError::TapNameInvalid("name is empty"));
    }
    if tap_name.as_bytes().contains(&0) {
        return Err(VmstateError::TapNameInvalid("name contains a NUL byte"));
    }
    if tap_name.len() >= TAP_NAME_BUF_LEN {
        return Err(VmstateError::TapNameTooLong {
            len: tap_name.len(),
            max: TAP_NAME_BUF_LEN - 1,
        });
    }

    let net = image
        .net_devices_mut()
        .ok_or(VmstateError::SectionNotFound("vm-state"))?;
    match net.devices.as_mut_slice() {
        [device] => {
            tracing::debug!(from = %device.tap_name, to = %tap_name, "renamed tap interface");
            device.tap_name = tap_name.to_string();
            Ok(())
        }
        devices => Err(VmstateError::AmbiguousNetDevice {
            count: devices.len(),
        }),
    }
}
