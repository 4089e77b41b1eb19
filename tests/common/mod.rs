//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

/// Writes an emulator-style CSV. Rows are `(source, region, year, sample, sle_cm)`.
pub fn write_emulator_csv(path: &Path, rows: &[(&str, &str, i32, u32, f64)]) {
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "ice_source,region,year,sample,GSAT,model,exp,SLE").unwrap();
    for (source, region, year, sample, sle) in rows {
        writeln!(file, "{source},{region},{year},{sample},1.1,m,e,{sle}").unwrap();
    }
}

/// Writes a fingerprint dataset with 1-D `lat`/`lon` and 2-D `fp`.
pub fn write_fingerprint(path: &Path, lats: &[f64], lons: &[f64], fp: impl Fn(f64, f64) -> f64) {
    let mut values = Vec::with_capacity(lats.len() * lons.len());
    for &lat in lats {
        for &lon in lons {
            values.push(fp(lat, lon));
        }
    }

    let mut file = netcdf::create(path).unwrap();
    file.add_dimension("lat", lats.len()).unwrap();
    file.add_dimension("lon", lons.len()).unwrap();
    file.add_variable::<f64>("lat", &["lat"]).unwrap().put_values(lats, ..).unwrap();
    file.add_variable::<f64>("lon", &["lon"]).unwrap().put_values(lons, ..).unwrap();
    file.add_variable::<f64>("fp", &["lat", "lon"])
        .unwrap()
        .put_values(&values, ..)
        .unwrap();
}

/// Reads a whole f32 variable.
pub fn read_f32(path: &Path, name: &str) -> Vec<f32> {
    let file = netcdf::open(path).unwrap();
    let var = file.variable(name).unwrap();
    var.get_values::<f32, _>(..).unwrap()
}

pub fn dimension_len(path: &Path, name: &str) -> usize {
    let file = netcdf::open(path).unwrap();
    let len = file.dimension(name).unwrap().len();
    len
}

/// True if the variable is stored as single-precision float.
pub fn is_stored_f32(path: &Path, name: &str) -> bool {
    let file = netcdf::open(path).unwrap();
    let stored = file.variable(name).unwrap().vartype();
    stored == netcdf::types::NcVariableType::Float(netcdf::types::FloatType::F32)
}

pub fn has_global_attribute(path: &Path, name: &str) -> bool {
    let file = netcdf::open(path).unwrap();
    let found = file.attribute(name).is_some();
    found
}
