//! Growing groups, strided selections and axis orders.

use super::{define_trim, Pair};
use ndarray::{Array, Array2, Ix2};
use nefis::{
    AxisOrder, Coding, DataType, Element, IndexRange, NefisError, OpenMode, Session, VariableData,
};
use std::fs;

fn level(t: usize, j: usize, i: usize) -> f32 {
    (t * 100 + j * 10 + i) as f32
}

fn append_step(session: &mut Session, t: usize) {
    let field = Array::from_shape_fn((1, 2, 3), |(_, j, i)| level(t, j, i));
    session
        .typed_write(
            "map-series",
            "S1",
            &[IndexRange::single(t)],
            &AxisOrder::identity(1),
            &field,
        )
        .unwrap();
}

#[test]
fn appends_grow_max_index() {
    let pair = Pair::new("append-grow");
    let mut session = pair.create(Coding::Big);
    define_trim(&mut session);
    assert_eq!(session.max_index("map-series").unwrap(), 0);
    assert_eq!(session.max_index("map-const").unwrap(), 1);
    for t in 0..3 {
        append_step(&mut session, t);
        assert_eq!(session.max_index("map-series").unwrap(), t + 1);
    }

    let s1 = session
        .typed_read::<f32>("map-series", "S1", &[], &AxisOrder::identity(1))
        .unwrap();
    assert_eq!(s1.shape(), &[3, 2, 3]);
    for ((t, j, i), &value) in s1
        .into_dimensionality::<ndarray::Ix3>()
        .unwrap()
        .indexed_iter()
    {
        assert_eq!(value, level(t, j, i));
    }

    match session.read_variable("S1", 1).unwrap() {
        VariableData::Real32(values) => {
            let values = values.into_dimensionality::<Ix2>().unwrap();
            assert_eq!(values.shape(), &[2, 3]);
            assert_eq!(values[[1, 2]], level(1, 1, 2));
        }
        other => panic!("unexpected variable data: {:?}", other),
    }
    assert!(matches!(
        session.read_variable("S1", 3),
        Err(NefisError::OutOfRange { index: 3, extent: 3, .. })
    ));
}

#[test]
fn gaps_are_rejected_before_writing() {
    let pair = Pair::new("append-gap");
    let mut session = pair.create(Coding::Big);
    define_trim(&mut session);
    append_step(&mut session, 0);
    session.flush().unwrap();
    let len = fs::metadata(&pair.dat).unwrap().len();

    let field = Array::from_shape_fn((1, 2, 3), |(_, j, i)| level(5, j, i));
    let err = session
        .typed_write(
            "map-series",
            "S1",
            &[IndexRange::single(5)],
            &AxisOrder::identity(1),
            &field,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        NefisError::OutOfRange {
            axis: 0,
            index: 5,
            extent: 1
        }
    ));
    assert_eq!(session.max_index("map-series").unwrap(), 1);
    session.flush().unwrap();
    assert_eq!(fs::metadata(&pair.dat).unwrap().len(), len);

    // Rewriting an existing index leaves max_index alone.
    append_step(&mut session, 0);
    assert_eq!(session.max_index("map-series").unwrap(), 1);
}

#[test]
fn multi_step_append_in_one_write() {
    let pair = Pair::new("append-multi");
    let mut session = pair.create(Coding::Little);
    define_trim(&mut session);
    let steps: Vec<i32> = (0..4).map(|t| t * 3600).collect();
    let buf: Vec<u8> = steps.iter().flat_map(|t| t.to_le_bytes()).collect();
    session
        .write(
            "map-series",
            "ITMAP",
            &[IndexRange::new(0, 4, 1)],
            &AxisOrder::identity(1),
            &buf,
        )
        .unwrap();
    assert_eq!(session.max_index("map-series").unwrap(), 4);

    let every_other = session
        .typed_read::<i32>(
            "map-series",
            "ITMAP",
            &[IndexRange::new(1, 4, 2)],
            &AxisOrder::identity(1),
        )
        .unwrap();
    assert_eq!(every_other.into_raw_vec(), [3600, 10800]);

    // A strided selection may only reach past max_index at max_index itself.
    let err = session
        .write(
            "map-series",
            "ITMAP",
            &[IndexRange::new(3, 7, 2)],
            &AxisOrder::identity(1),
            &[0; 8],
        )
        .unwrap_err();
    assert!(matches!(err, NefisError::OutOfRange { .. }));
    assert_eq!(session.max_index("map-series").unwrap(), 4);
}

#[test]
fn reversed_order_transposes() {
    let pair = Pair::new("append-order");
    let mut session = pair.create(Coding::Big);
    session
        .define_element(Element::new("DP", DataType::Integer32, &[]))
        .unwrap();
    session.define_cell("depth", &["DP"]).unwrap();
    session.define_group("grid", "depth", &[3, 2], &[0, 1]).unwrap();
    session.instantiate_group("grid", "grid").unwrap();

    // Natural shape is [extent of axis 1, extent of axis 0].
    let written = Array2::from_shape_fn((2, 3), |(a1, a0)| (a0 * 10 + a1) as i32);
    session
        .typed_write("grid", "DP", &[], &AxisOrder::identity(2), &written)
        .unwrap();

    let swapped = session
        .typed_read::<i32>("grid", "DP", &[], &AxisOrder::new(vec![1, 0]).unwrap())
        .unwrap()
        .into_dimensionality::<Ix2>()
        .unwrap();
    assert_eq!(swapped, written.t());
    assert_eq!(swapped[[2, 1]], 21);

    let raw = session
        .read("grid", "DP", &[], &AxisOrder::identity(2))
        .unwrap();
    assert_eq!(&raw[4..8], &10i32.to_be_bytes());

    let corner = session
        .typed_read::<i32>(
            "grid",
            "DP",
            &[IndexRange::new(0, 3, 2), IndexRange::single(1)],
            &AxisOrder::identity(2),
        )
        .unwrap();
    assert_eq!(corner.shape(), &[1, 2]);
    assert_eq!(corner.into_raw_vec(), [1, 21]);

    assert!(matches!(
        session.typed_read::<i32>("grid", "DP", &[], &AxisOrder::identity(1)),
        Err(NefisError::ShapeMismatch(_))
    ));
    session.close().unwrap();

    let mut session = pair.open(OpenMode::Read);
    assert_eq!(session.max_index("grid").unwrap(), 2);
    let reread = session
        .typed_read::<i32>("grid", "DP", &[], &AxisOrder::identity(2))
        .unwrap();
    assert_eq!(reread, written.into_dyn());
}

#[test]
fn natural_rewrite_is_byte_exact() {
    for coding in [Coding::Big, Coding::Little] {
        let pair = Pair::new("append-rewrite");
        let mut session = pair.create(coding);
        session
            .define_element(Element::new("UV", DataType::Real64, &[2, 3]))
            .unwrap();
        session.define_cell("velocity", &["UV"]).unwrap();
        session
            .define_group("velocity", "velocity", &[4, 3], &[1, 0])
            .unwrap();
        session.instantiate_group("velocity", "velocity").unwrap();

        let raw: Vec<u8> = (0..2 * 3 * 4 * 3)
            .flat_map(|v| match coding {
                Coding::Big => (v as f64 * 0.5).to_be_bytes(),
                Coding::Little => (v as f64 * 0.5).to_le_bytes(),
            })
            .collect();
        let identity = AxisOrder::identity(2);
        session.write("velocity", "UV", &[], &identity, &raw).unwrap();

        for order in [identity.clone(), AxisOrder::new(vec![1, 0]).unwrap()] {
            let before = session.read("velocity", "UV", &[], &order).unwrap();
            let values = session
                .typed_read::<f64>("velocity", "UV", &[], &order)
                .unwrap();
            assert_eq!(values.ndim(), 4);
            session
                .typed_write("velocity", "UV", &[], &order, &values)
                .unwrap();
            let after = session.read("velocity", "UV", &[], &order).unwrap();
            assert_eq!(before, after);
        }
        assert_eq!(session.read("velocity", "UV", &[], &identity).unwrap(), raw);
    }
}

#[test]
fn extreme_indices_are_out_of_range() {
    let pair = Pair::new("append-extreme");
    let mut session = pair.create(Coding::Big);
    define_trim(&mut session);
    append_step(&mut session, 0);
    let order = AxisOrder::identity(1);

    assert!(matches!(
        session.read_variable("S1", usize::MAX),
        Err(NefisError::OutOfRange { .. })
    ));
    assert!(matches!(
        session.read("map-series", "ITMAP", &[IndexRange::new(0, usize::MAX, 2)], &order),
        Err(NefisError::OutOfRange { .. })
    ));
    assert!(matches!(
        session.write("map-series", "ITMAP", &[IndexRange::new(1, usize::MAX, 1)], &order, &[0; 4]),
        Err(NefisError::ShapeMismatch(_))
    ));
    assert_eq!(session.max_index("map-series").unwrap(), 1);
}
