//! Reading a populated pair through variables, typed arrays and raw bytes.

use super::{define_trim, write_constants, Pair, THICK};
use ndarray::{arr1, Array, Ix1};
use nefis::{AxisOrder, Coding, DataType, IndexRange, NefisError, OpenMode, VariableData};

#[test]
fn thick_reads_back_in_every_form() {
    let pair = Pair::new("trim-thick");
    let mut session = pair.create(Coding::Big);
    define_trim(&mut session);
    write_constants(&mut session);
    session.close().unwrap();

    let mut session = pair.open(OpenMode::Read);
    let order = AxisOrder::identity(1);
    let thick = session
        .typed_read::<f32>("map-const", "THICK", &[], &order)
        .unwrap();
    assert_eq!(thick.shape(), &[1, 5]);
    assert_eq!(thick.iter().copied().collect::<Vec<_>>(), THICK);

    let raw = session.read("map-const", "THICK", &[], &order).unwrap();
    assert_eq!(raw.len(), 20);
    assert_eq!(&raw[..4], &0.4f32.to_be_bytes());

    match session.read_variable("THICK", 0).unwrap() {
        VariableData::Real32(values) => {
            let values = values.into_dimensionality::<Ix1>().unwrap();
            assert_eq!(values, arr1(&THICK));
        }
        other => panic!("unexpected variable data: {:?}", other),
    }
}

#[test]
fn variables_describe_every_element() {
    let pair = Pair::new("trim-vars");
    let mut session = pair.create(Coding::Big);
    define_trim(&mut session);
    write_constants(&mut session);

    let variables = session.variables().unwrap();
    let keys: Vec<&str> = variables.keys().map(String::as_str).collect();
    assert_eq!(keys, ["KMAX", "THICK", "NAMCON", "ITMAP", "S1"]);

    let thick = &variables["THICK"];
    assert_eq!(thick.group, "map-const");
    assert_eq!(thick.name, "THICK");
    assert_eq!(thick.dtype, DataType::Real32);
    assert_eq!(thick.shape, [1, 5]);
    assert_eq!(thick.attributes["quantity"], "thickness");
    assert_eq!(thick.attributes["unit"], "-");
    assert_eq!(thick.attributes["description"], "Fraction part of layer thickness");

    // Nothing written yet along the unbounded axis.
    assert_eq!(variables["S1"].shape, [0, 2, 3]);
    assert_eq!(variables["KMAX"].shape, [1]);
}

#[test]
fn shared_elements_are_qualified() {
    let pair = Pair::new("trim-shared");
    let mut session = pair.create(Coding::Big);
    define_trim(&mut session);
    session.instantiate_group("map-const-2", "map-const").unwrap();
    let order = AxisOrder::identity(1);
    session
        .typed_write("map-const-2", "KMAX", &[], &order, &arr1(&[10i32]))
        .unwrap();

    let variables = session.variables().unwrap();
    assert!(!variables.contains_key("KMAX"));
    assert_eq!(variables["map-const/KMAX"].group, "map-const");
    assert_eq!(variables["map-const-2/KMAX"].group, "map-const-2");

    match session.read_variable("KMAX", 0) {
        Err(NefisError::AmbiguousVariable { groups, .. }) => {
            assert_eq!(groups, ["map-const", "map-const-2"])
        }
        other => panic!("unexpected result: {:?}", other),
    }
    match session.read_variable("map-const-2/KMAX", 0).unwrap() {
        VariableData::Integer32(values) => assert_eq!(values.into_raw_vec(), [10]),
        other => panic!("unexpected variable data: {:?}", other),
    }
    // The qualified form also resolves an element held by one group.
    assert!(session.read_variable("map-const/THICK", 0).is_ok());
    assert!(matches!(
        session.read_variable("DPS0", 0),
        Err(NefisError::NotFound { .. })
    ));
    // A slash would make a plain name look qualified.
    assert!(matches!(
        session.instantiate_group("map-const/KMAX", "map-const"),
        Err(NefisError::InvalidName(_))
    ));
    assert_eq!(session.variables().unwrap().len(), variables.len());
}

#[test]
fn character_values_round_trip() {
    let pair = Pair::new("trim-names");
    let mut session = pair.create(Coding::Little);
    define_trim(&mut session);
    write_constants(&mut session);

    let names = session
        .typed_read::<String>("map-const", "NAMCON", &[], &AxisOrder::identity(1))
        .unwrap();
    assert_eq!(names.shape(), &[1, 2]);
    assert_eq!(names.into_raw_vec(), ["Salinity", "Temperature"]);

    match session.read_variable("NAMCON", 0).unwrap() {
        VariableData::Character(values) => assert_eq!(values.shape(), &[2]),
        other => panic!("unexpected variable data: {:?}", other),
    }

    let too_long = Array::from_shape_vec((1, 2), vec!["x".repeat(21), String::new()]).unwrap();
    let err = session
        .typed_write("map-const", "NAMCON", &[], &AxisOrder::identity(1), &too_long)
        .unwrap_err();
    assert!(matches!(err, NefisError::ShapeMismatch(_)));
}

#[test]
fn typed_access_checks_type_and_shape() {
    let pair = Pair::new("trim-checks");
    let mut session = pair.create(Coding::Big);
    define_trim(&mut session);
    write_constants(&mut session);
    let order = AxisOrder::identity(1);

    assert!(matches!(
        session.typed_read::<f64>("map-const", "THICK", &[], &order),
        Err(NefisError::TypeMismatch {
            data_type: DataType::Real32,
            requested: "f64"
        })
    ));
    assert!(matches!(
        session.typed_read::<f32>("map-const", "S1", &[], &order),
        Err(NefisError::ElementNotInGroup { .. })
    ));
    assert!(matches!(
        session.read("map-const", "THICK", &[IndexRange::single(0), IndexRange::single(0)], &order),
        Err(NefisError::ShapeMismatch(_))
    ));
    assert!(matches!(
        session.read("map-const", "THICK", &[IndexRange::single(1)], &order),
        Err(NefisError::OutOfRange {
            axis: 0,
            index: 1,
            extent: 1
        })
    ));
    assert!(matches!(
        session.typed_write("map-const", "THICK", &[], &order, &arr1(&THICK)),
        Err(NefisError::ShapeMismatch(_))
    ));
    assert!(matches!(
        session.write("map-const", "THICK", &[], &order, &[0; 19]),
        Err(NefisError::ShapeMismatch(_))
    ));
    assert!(matches!(
        session.read("map-missing", "THICK", &[], &order),
        Err(NefisError::NotFound { .. })
    ));
}

#[test]
fn dump_lists_every_section() {
    let pair = Pair::new("trim-dump");
    let mut session = pair.create(Coding::Big);
    define_trim(&mut session);
    write_constants(&mut session);
    let dump = session.dump().unwrap().to_string();
    let sections = ["GROUPS", "GROUP DEFINITIONS", "CELLS", "ELEMENTS", "VARIABLES"];
    let mut last = 0;
    for section in sections {
        let at = dump[last..].find(section).map(|i| i + last).unwrap();
        last = at + section.len();
    }
    assert!(dump.contains("ITDATE = 20240101"));
    assert!(dump.contains("THICK: REAL*4 [5]"));
    assert!(dump.contains("map-const: 64 bytes, elements [KMAX, THICK, NAMCON]"));
}
