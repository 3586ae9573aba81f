use numpy::ndarray::{ArrayView2, Zip};
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use rangeland_components::kernels::soil;
use rangeland_core::raster::{is_nodata, TARGET_NODATA};

fn check_shapes(arrays: &[&ArrayView2<'_, f32>]) -> PyResult<()> {
    let first = arrays[0].dim();
    match arrays.iter().find(|a| a.dim() != first) {
        Some(other) => Err(PyValueError::new_err(format!(
            "array shapes differ: {:?} and {:?}",
            first,
            other.dim()
        ))),
        None => Ok(()),
    }
}

fn any_nodata(values: &[f32]) -> bool {
    values.iter().any(|v| is_nodata(*v, TARGET_NODATA))
}

/// Organic matter percentage of the top soil layer.
#[pyfunction]
fn ompc<'py>(
    py: Python<'py>,
    som1c_2: PyReadonlyArray2<'py, f32>,
    som2c_2: PyReadonlyArray2<'py, f32>,
    som3c: PyReadonlyArray2<'py, f32>,
    bulk_d: PyReadonlyArray2<'py, f32>,
    edepth: f64,
) -> PyResult<Bound<'py, PyArray2<f32>>> {
    let (a, b, c, d) = (som1c_2.as_array(), som2c_2.as_array(), som3c.as_array(), bulk_d.as_array());
    check_shapes(&[&a, &b, &c, &d])?;
    let out = Zip::from(a).and(b).and(c).and(d).map_collect(|&a, &b, &c, &d| {
        if any_nodata(&[a, b, c, d]) {
            return TARGET_NODATA;
        }
        soil::ompc(a as f64, b as f64, c as f64, d as f64, edepth).map_or(TARGET_NODATA, |v| v as f32)
    });
    Ok(out.into_pyarray_bound(py))
}

fn water_limit<'py>(
    py: Python<'py>,
    arrays: [PyReadonlyArray2<'py, f32>; 5],
    kernel: fn(f64, f64, f64, f64, f64) -> f64,
) -> PyResult<Bound<'py, PyArray2<f32>>> {
    let [sand, silt, clay, ompc, bulk_d] = arrays.each_ref().map(|a| a.as_array());
    check_shapes(&[&sand, &silt, &clay, &ompc, &bulk_d])?;
    let out = Zip::from(sand)
        .and(silt)
        .and(clay)
        .and(ompc)
        .and(bulk_d)
        .map_collect(|&sa, &si, &cl, &om, &bd| {
            if any_nodata(&[sa, si, cl, om, bd]) {
                return TARGET_NODATA;
            }
            kernel(sa as f64, si as f64, cl as f64, om as f64, bd as f64) as f32
        });
    Ok(out.into_pyarray_bound(py))
}

/// Field capacity of a soil layer (volumetric fraction).
#[pyfunction]
fn afiel<'py>(
    py: Python<'py>,
    sand: PyReadonlyArray2<'py, f32>,
    silt: PyReadonlyArray2<'py, f32>,
    clay: PyReadonlyArray2<'py, f32>,
    ompc: PyReadonlyArray2<'py, f32>,
    bulk_d: PyReadonlyArray2<'py, f32>,
) -> PyResult<Bound<'py, PyArray2<f32>>> {
    water_limit(py, [sand, silt, clay, ompc, bulk_d], soil::afiel)
}

/// Wilting point of a soil layer (volumetric fraction).
#[pyfunction]
fn awilt<'py>(
    py: Python<'py>,
    sand: PyReadonlyArray2<'py, f32>,
    silt: PyReadonlyArray2<'py, f32>,
    clay: PyReadonlyArray2<'py, f32>,
    ompc: PyReadonlyArray2<'py, f32>,
    bulk_d: PyReadonlyArray2<'py, f32>,
) -> PyResult<Bound<'py, PyArray2<f32>>> {
    water_limit(py, [sand, silt, clay, ompc, bulk_d], soil::awilt)
}

#[pymodule]
#[pyo3(name = "_lib")]
fn rangeland(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_function(wrap_pyfunction!(ompc, m)?)?;
    m.add_function(wrap_pyfunction!(afiel, m)?)?;
    m.add_function(wrap_pyfunction!(awilt, m)?)?;
    Ok(())
}
