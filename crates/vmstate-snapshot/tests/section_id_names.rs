use vmstate_snapshot::SectionId;

#[test]
fn section_ids_have_stable_names_and_numbers() {
    let cases = [
        (SectionId::VCPU_STATES, 1u32, "vcpu-states"),
        (SectionId::VM_STATE, 2u32, "vm-state"),
    ];

    for (id, expected_num, expected_name) in cases {
        assert_eq!(
            id.0, expected_num,
            "{expected_name} SectionId number changed; must remain stable"
        );
        assert_eq!(id.name(), Some(expected_name));
        assert_eq!(SectionId::from_name(expected_name), Some(id));
        assert_eq!(format!("{id}"), format!("{expected_name}({expected_num})"));
    }
}

#[test]
fn unregistered_ids_have_no_name() {
    assert_eq!(SectionId(0x1234).name(), None);
    assert_eq!(SectionId::from_name("ram"), None);
    assert_eq!(format!("{}", SectionId(0x1234)), "SectionId(4660)");
}
