//! Integration tests.

use ndarray::{arr2, Array2};
use nefis::{AttributeValue, AxisOrder, Coding, DataType, Element, OpenMode, OpenOptions, Session};
use std::path::PathBuf;
use tempfile::TempDir;

mod append;
mod lifecycle;
mod trim;

pub const THICK: [f32; 5] = [0.4, 0.27, 0.18, 0.1, 0.05];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Paths of a `.dat`/`.def` pair in a fresh temporary directory.
pub struct Pair {
    _dir: TempDir,
    pub dat: PathBuf,
    pub def: PathBuf,
}

impl Pair {
    pub fn new(stem: &str) -> Pair {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let dat = dir.path().join(format!("{}.dat", stem));
        let def = dir.path().join(format!("{}.def", stem));
        Pair { _dir: dir, dat, def }
    }

    pub fn create(&self, coding: Coding) -> Session {
        OpenOptions::new()
            .mode(OpenMode::Create)
            .coding(coding)
            .open(&self.dat, &self.def)
            .unwrap()
    }

    pub fn open(&self, mode: OpenMode) -> Session {
        Session::open(&self.dat, &self.def, mode).unwrap()
    }
}

/// Defines a constant map group holding layer thicknesses and constituent
/// names, and an empty growing map group holding a 3 x 2 water level field.
pub fn define_trim(session: &mut Session) {
    session
        .define_element(
            Element::new("KMAX", DataType::Integer32, &[]).with_description("Number of layers"),
        )
        .unwrap();
    session
        .define_element(
            Element::new("THICK", DataType::Real32, &[5])
                .with_quantity("thickness")
                .with_unit("-")
                .with_description("Fraction part of layer thickness"),
        )
        .unwrap();
    session
        .define_element(Element::new("NAMCON", DataType::Character(20), &[2]))
        .unwrap();
    session
        .define_element(Element::new("ITMAP", DataType::Integer32, &[]))
        .unwrap();
    session
        .define_element(
            Element::new("S1", DataType::Real32, &[3, 2])
                .with_quantity("water level")
                .with_unit("m"),
        )
        .unwrap();
    session
        .define_cell("map-const", &["KMAX", "THICK", "NAMCON"])
        .unwrap();
    session.define_cell("map-series", &["ITMAP", "S1"]).unwrap();
    session
        .define_group("map-const", "map-const", &[1], &[0])
        .unwrap();
    session
        .define_group("map-series", "map-series", &[0], &[0])
        .unwrap();
    session.instantiate_group("map-const", "map-const").unwrap();
    session.instantiate_group("map-series", "map-series").unwrap();
}

/// Fills the constant map group.
pub fn write_constants(session: &mut Session) {
    let order = AxisOrder::identity(1);
    session
        .typed_write("map-const", "KMAX", &[], &order, &ndarray::arr1(&[5i32]))
        .unwrap();
    session
        .typed_write("map-const", "THICK", &[], &order, &arr2(&[THICK]))
        .unwrap();
    let names = vec!["Salinity".to_owned(), "Temperature".to_owned()];
    let names = Array2::from_shape_vec((1, 2), names).unwrap();
    session
        .typed_write("map-const", "NAMCON", &[], &order, &names)
        .unwrap();
    session
        .put_attribute("map-const", "ITDATE", AttributeValue::Integer(20240101))
        .unwrap();
}
