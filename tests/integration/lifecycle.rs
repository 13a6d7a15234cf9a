//! Session states and persistence across reopening.

use super::{define_trim, write_constants, Pair, THICK};
use ndarray::arr1;
use nefis::{
    AttributeValue, AxisOrder, Catalog, Coding, DataType, Element, NefisError, OpenMode,
    OpenOptions,
};

#[test]
fn persists_in_both_codings() {
    for (coding, kmax) in [(Coding::Big, [0u8, 0, 0, 5]), (Coding::Little, [5u8, 0, 0, 0])] {
        let pair = Pair::new("life-coding");
        let mut session = pair.create(coding);
        define_trim(&mut session);
        write_constants(&mut session);
        session.close().unwrap();

        let mut session = pair.open(OpenMode::Read);
        assert_eq!(session.coding().unwrap(), coding);
        assert_eq!(session.mode().unwrap(), OpenMode::Read);
        let directory = session.directory().unwrap();
        assert_eq!(directory.elements().len(), 5);
        assert_eq!(directory.cells().len(), 2);
        assert_eq!(directory.group_definitions().len(), 2);
        assert_eq!(directory.group_instances().len(), 2);
        assert_eq!(directory.element("THICK").unwrap().unit, "-");
        assert_eq!(directory.group_definition("map-series").unwrap().dimensions, [0]);

        let raw = session
            .read("map-const", "KMAX", &[], &AxisOrder::identity(1))
            .unwrap();
        assert_eq!(raw, kmax);
        let thick = session
            .typed_read::<f32>("map-const", "THICK", &[], &AxisOrder::identity(1))
            .unwrap();
        assert_eq!(thick.into_raw_vec(), THICK);
        assert_eq!(
            session.attributes("map-const").unwrap()["ITDATE"],
            AttributeValue::Integer(20240101)
        );
    }
}

#[test]
fn header_texts_are_kept() {
    let pair = Pair::new("life-headers");
    let session = OpenOptions::new()
        .mode(OpenMode::Create)
        .def_header("trim-run definitions")
        .dat_header("trim-run data")
        .open(&pair.dat, &pair.def)
        .unwrap();
    drop(session);
    let session = pair.open(OpenMode::Read);
    assert_eq!(session.def_header().unwrap(), "trim-run definitions");
    assert_eq!(session.dat_header().unwrap(), "trim-run data");

    let other = Pair::new("life-default-headers");
    let session = other.create(Coding::Big);
    assert!(session.def_header().unwrap().starts_with("NEFIS Definition File"));
    assert!(session.dat_header().unwrap().starts_with("NEFIS Data File"));

    let long = "x".repeat(65);
    assert!(OpenOptions::new()
        .mode(OpenMode::Create)
        .def_header(long)
        .open(other.dat.with_extension("dat2"), other.def.with_extension("def2"))
        .is_err());
    assert!(!other.dat.with_extension("dat2").exists());
}

#[test]
fn updates_append_to_existing_pair() {
    let pair = Pair::new("life-update");
    let mut session = pair.create(Coding::Little);
    define_trim(&mut session);
    session.close().unwrap();

    for t in 0..2 {
        let mut session = pair.open(OpenMode::Update);
        assert_eq!(session.max_index("map-series").unwrap(), t);
        session
            .typed_write(
                "map-series",
                "ITMAP",
                &[nefis::IndexRange::single(t)],
                &AxisOrder::identity(1),
                &arr1(&[t as i32 * 60]),
            )
            .unwrap();
        session
            .put_attribute("map-series", "NSTEPS", AttributeValue::Integer(t as i32 + 1))
            .unwrap();
        // Dropped without close: flushed on drop.
    }

    let mut session = pair.open(OpenMode::Read);
    assert_eq!(session.max_index("map-series").unwrap(), 2);
    let steps = session
        .typed_read::<i32>("map-series", "ITMAP", &[], &AxisOrder::identity(1))
        .unwrap();
    assert_eq!(steps.into_raw_vec(), [0, 60]);
    let attributes = session.attributes("map-series").unwrap();
    assert_eq!(attributes.len(), 1);
    assert_eq!(attributes["NSTEPS"], AttributeValue::Integer(2));
}

#[test]
fn closed_sessions_refuse_everything() {
    let pair = Pair::new("life-closed");
    let mut session = pair.create(Coding::Big);
    define_trim(&mut session);
    session.close().unwrap();
    assert!(!session.is_open());
    assert!(matches!(session.close(), Err(NefisError::SessionClosed)));
    assert!(matches!(session.flush(), Err(NefisError::SessionClosed)));
    assert!(matches!(session.variables(), Err(NefisError::SessionClosed)));
    assert!(matches!(
        session.define_element(Element::new("DPS0", DataType::Real32, &[])),
        Err(NefisError::SessionClosed)
    ));
    assert!(matches!(
        session.typed_read::<f32>("map-const", "THICK", &[], &AxisOrder::identity(1)),
        Err(NefisError::SessionClosed)
    ));
}

#[test]
fn read_sessions_refuse_changes() {
    let pair = Pair::new("life-readonly");
    let mut session = pair.create(Coding::Big);
    define_trim(&mut session);
    write_constants(&mut session);
    session.close().unwrap();

    let mut session = pair.open(OpenMode::Read);
    assert!(matches!(
        session.define_element(Element::new("DPS0", DataType::Real32, &[])),
        Err(NefisError::ReadOnly)
    ));
    assert!(matches!(
        session.instantiate_group("map-const-2", "map-const"),
        Err(NefisError::ReadOnly)
    ));
    assert!(matches!(
        session.write("map-const", "KMAX", &[], &AxisOrder::identity(1), &[0; 4]),
        Err(NefisError::ReadOnly)
    ));
    assert!(matches!(
        session.put_attribute("map-const", "ITDATE", AttributeValue::Integer(0)),
        Err(NefisError::ReadOnly)
    ));
    session.flush().unwrap();
    assert_eq!(session.max_index("map-const").unwrap(), 1);
}

#[test]
fn duplicates_leave_the_pair_unchanged() {
    let pair = Pair::new("life-duplicates");
    let mut session = pair.create(Coding::Big);
    define_trim(&mut session);

    match session.define_element(Element::new("THICK", DataType::Real64, &[2])) {
        Err(NefisError::DuplicateName { catalog, name }) => {
            assert_eq!(catalog, Catalog::Element);
            assert_eq!(name, "THICK");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(matches!(
        session.define_cell("map-const", &["KMAX"]),
        Err(NefisError::DuplicateName {
            catalog: Catalog::Cell,
            ..
        })
    ));
    assert!(matches!(
        session.define_group("map-const", "map-const", &[1], &[0]),
        Err(NefisError::DuplicateName {
            catalog: Catalog::GroupDefinition,
            ..
        })
    ));
    assert!(matches!(
        session.instantiate_group("map-const", "map-const"),
        Err(NefisError::DuplicateName {
            catalog: Catalog::GroupInstance,
            ..
        })
    ));
    assert!(matches!(
        session.define_cell("map-extra", &["DPS0"]),
        Err(NefisError::UnknownElement(_))
    ));
    assert!(matches!(
        session.instantiate_group("map-extra", "map-extra"),
        Err(NefisError::UnknownGroupDef(_))
    ));
    session.close().unwrap();

    let session = pair.open(OpenMode::Read);
    let directory = session.directory().unwrap();
    assert_eq!(directory.element("THICK").unwrap().data_type, DataType::Real32);
    assert_eq!(directory.elements().len(), 5);
    assert_eq!(directory.group_instances().len(), 2);
}

#[test]
fn reports_library_version() {
    assert_eq!(nefis::version(), env!("CARGO_PKG_VERSION"));
    assert_eq!("u".parse::<OpenMode>().unwrap(), OpenMode::Update);
    assert!("x".parse::<OpenMode>().is_err());
}
