use std::io::Cursor;

use vmstate_snapshot::{
    load_vmstate, read_image, save_vmstate, write_image, NetDeviceState, NetDevicesSection,
    RegisterEntry, RegisterId, Section, SectionBody, SectionId, SnapshotImage, TargetArch,
    VcpuRegisterBank, VcpuStatesSection, SECTION_VERSION_V1, VMSTATE_VERSION_V1,
};

fn sample_image() -> SnapshotImage {
    let banks = vec![
        VcpuRegisterBank {
            regs: vec![
                RegisterEntry {
                    id: RegisterId(0x6030_0000_0013_c000),
                    value: 0x410f_d083,
                },
                RegisterEntry {
                    id: RegisterId(0x6030_0000_0013_8012),
                    value: 1,
                },
            ],
        },
        VcpuRegisterBank {
            regs: vec![RegisterEntry {
                id: RegisterId(0x6030_0000_0013_c000),
                value: 0x410f_d083,
            }],
        },
    ];
    let devices = vec![NetDeviceState {
        device_id: "eth0".to_string(),
        tap_name: "vmtap0".to_string(),
        extra: vec![0xaa, 0xbb, 0xcc, 0xdd],
    }];

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
                id: SectionId(0x77),
                version: 3,
                flags: 1,
                body: SectionBody::Opaque(vec![1, 2, 3, 4, 5]),
            },
            Section {
                id: SectionId::VM_STATE,
                version: SECTION_VERSION_V1,
                flags: 0,
                body: SectionBody::NetDevices(NetDevicesSection { devices }),
            },
        ],
    }
}

#[test]
fn save_load_reports_identical_contents() {
    let image = sample_image();

    let mut bytes = Vec::new();
    write_image(&mut bytes, &image).unwrap();
    let reloaded = read_image(&mut Cursor::new(&bytes)).unwrap();
    assert_eq!(reloaded, image);

    let mut bytes_again = Vec::new();
    write_image(&mut bytes_again, &reloaded).unwrap();
    assert_eq!(bytes_again, bytes);
}

#[test]
fn opaque_section_keeps_position_header_and_bytes() {
    let image = sample_image();

    let mut bytes = Vec::new();
    write_image(&mut bytes, &image).unwrap();
    let reloaded = read_image(&mut Cursor::new(&bytes)).unwrap();

    let section = &reloaded.sections[1];
    assert_eq!(section.id, SectionId(0x77));
    assert_eq!(section.version, 3);
    assert_eq!(section.flags, 1);
    assert_eq!(section.body, SectionBody::Opaque(vec![1, 2, 3, 4, 5]));
}

#[test]
fn save_vmstate_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.vmstate");

    let image = sample_image();
    save_vmstate(&image, &path).unwrap();

    let reloaded = load_vmstate(&path).unwrap();
    assert_eq!(reloaded, image);

    // The staging file must not survive a successful save.
    assert!(!dir.path().join("snapshot.vmstate.tmp").exists());
}

#[test]
fn save_vmstate_replaces_existing_file_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.vmstate");

    let image = sample_image();
    save_vmstate(&image, &path).unwrap();

    let mut edited = image.clone();
    edited
        .net_devices_mut()
        .unwrap()
        .devices[0]
        .tap_name = "vmtap9".to_string();
    save_vmstate(&edited, &path).unwrap();

    let reloaded = load_vmstate(&path).unwrap();
    assert_eq!(reloaded, edited);
}
