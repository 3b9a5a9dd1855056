use std::collections::BTreeSet;

use vmstate_snapshot::{
    apply_edit, edit_image, EditOperation, RegisterEntry, RegisterId, Section, SectionBody,
    SectionId, SnapshotImage, TargetArch, VcpuRegisterBank, VcpuStatesSection, VmstateError,
    SECTION_VERSION_V1, VMSTATE_VERSION_V1,
};

fn image_with_banks(banks: Vec<Vec<u64>>) -> SnapshotImage {
    let banks = banks
        .into_iter()
        .map(|ids| VcpuRegisterBank {
            regs: ids
                .into_iter()
                .map(|id| RegisterEntry {
                    id: RegisterId(id),
                    value: u128::from(id) ^ 0xfeed,
                })
                .collect(),
        })
        .collect();

    SnapshotImage {
        version: VMSTATE_VERSION_V1,
        arch: TargetArch::Aarch64,
        sections: vec![
            Section {
                id: SectionId::VCPU_STATES,
                version: SECTION_VERSION_V1,
                flags: 0,
                body: SectionBody::VcpuStates(VcpuStatesSection { banks }),
            },
            Section {
                id: SectionId(0x40),
                version: 1,
                flags: 0,
                body: SectionBody::Opaque(vec![9, 9, 9]),
            },
        ],
    }
}

fn ids(raw: &[u64]) -> BTreeSet<RegisterId> {
    raw.iter().copied().map(RegisterId).collect()
}

fn bank_ids(image: &SnapshotImage, vcpu: usize) -> Vec<u64> {
    image.vcpu_states().unwrap().banks[vcpu]
        .regs
        .iter()
        .map(|reg| reg.id.0)
        .collect()
}

#[test]
fn removes_matching_ids_from_every_bank() {
    let image = image_with_banks(vec![vec![0x10, 0x20, 0x30], vec![0x20, 0x40]]);

    let edited = edit_image(&image, &EditOperation::RemoveRegs(ids(&[0x20]))).unwrap();

    assert_eq!(bank_ids(&edited, 0), vec![0x10, 0x30]);
    assert_eq!(bank_ids(&edited, 1), vec![0x40]);
}

#[test]
fn preserves_relative_order_of_survivors() {
    let image = image_with_banks(vec![vec![0x50, 0x30, 0x90, 0x10]]);

    let edited = edit_image(&image, &EditOperation::RemoveRegs(ids(&[0x30]))).unwrap();

    assert_eq!(bank_ids(&edited, 0), vec![0x50, 0x90, 0x10]);
}

#[test]
fn id_absent_from_one_bank_is_a_per_bank_noop() {
    let image = image_with_banks(vec![vec![0x10], vec![0x10, 0x20]]);

    let edited = edit_image(&image, &EditOperation::RemoveRegs(ids(&[0x20]))).unwrap();

    assert_eq!(bank_ids(&edited, 0), vec![0x10]);
    assert_eq!(bank_ids(&edited, 1), vec![0x10]);
}

#[test]
fn id_absent_from_all_banks_changes_nothing() {
    let image = image_with_banks(vec![vec![0x10, 0x20], vec![0x30]]);

    let edited = edit_image(&image, &EditOperation::RemoveRegs(ids(&[0x7777]))).unwrap();

    assert_eq!(edited, image);
}

#[test]
fn missing_vcpu_states_section_is_an_error() {
    let image = SnapshotImage {
        version: VMSTATE_VERSION_V1,
        arch: TargetArch::X86_64,
        sections: vec![Section {
            id: SectionId(0x40),
            version: 1,
            flags: 0,
            body: SectionBody::Opaque(vec![1]),
        }],
    };

    let err = edit_image(&image, &EditOperation::RemoveRegs(ids(&[0x10]))).unwrap_err();
    assert!(matches!(err, VmstateError::SectionNotFound("vcpu-states")));
}

#[test]
fn original_image_is_not_mutated() {
    let image = image_with_banks(vec![vec![0x10, 0x20]]);

    let _ = apply_edit(&image, &EditOperation::RemoveRegs(ids(&[0x10]))).unwrap();

    assert_eq!(bank_ids(&image, 0), vec![0x10, 0x20]);
}

#[test]
fn untouched_sections_are_carried_over() {
    let image = image_with_banks(vec![vec![0x10]]);

    let edited = edit_image(&image, &EditOperation::RemoveRegs(ids(&[0x10]))).unwrap();

    assert_eq!(edited.sections[1], image.sections[1]);
}
