//! Python bindings for rdentropy via PyO3.
//!
//! Native half of the `rdrand` package: capability flags and one-shot draw
//! functions per instruction. The `random.Random` subclasses live in
//! `python/rdrand/__init__.py` and delegate to these functions.

use pyo3::exceptions::{
    PyNotImplementedError, PyOSError, PyOverflowError, PySystemError, PyTypeError, PyValueError,
};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict, PyFloat, PyInt, PyList};

use rdentropy_core::{
    EntropyError, HardwareSource, Instruction, LegacyRandom, Quantity, RandomBits,
    has_hardware_rand, has_hardware_seed, integral_count,
};

fn to_py_err(e: EntropyError) -> PyErr {
    let msg = e.to_string();
    match e {
        EntropyError::InvalidArgument { .. } => PyValueError::new_err(msg),
        EntropyError::TypeMismatch { .. } => PyTypeError::new_err(msg),
        EntropyError::WidthOutOfRange { .. } => PyOverflowError::new_err(msg),
        EntropyError::UnsupportedOperation { .. } => PyNotImplementedError::new_err(msg),
        EntropyError::UnsupportedHardware { .. } => PySystemError::new_err(msg),
        EntropyError::HardwareEntropyUnavailable { .. } => PyOSError::new_err(msg),
    }
}

/// A bit or byte count from Python. Ints pass through; floats go through
/// [`integral_count`] so the sign is checked first.
fn count_arg(obj: &Bound<'_, PyAny>, quantity: Quantity) -> PyResult<i64> {
    if let Ok(int) = obj.downcast::<PyInt>() {
        return int.extract::<i64>();
    }
    if let Ok(float) = obj.downcast::<PyFloat>() {
        return integral_count(float.value(), quantity).map_err(to_py_err);
    }
    Err(to_py_err(EntropyError::TypeMismatch { quantity }))
}

/// `int.from_bytes(bits, "little")`.
fn bits_to_int<'py>(py: Python<'py>, bits: &RandomBits) -> PyResult<Bound<'py, PyAny>> {
    py.get_type::<PyInt>().call_method1(
        "from_bytes",
        (PyBytes::new(py, bits.as_le_bytes()), "little"),
    )
}

fn draw_bits<'py>(
    py: Python<'py>,
    rng: &LegacyRandom<HardwareSource>,
    k: &Bound<'py, PyAny>,
) -> PyResult<Bound<'py, PyAny>> {
    let k = count_arg(k, Quantity::Bits)?;
    let bits = py.allow_threads(|| rng.getrandbits(k)).map_err(to_py_err)?;
    bits_to_int(py, &bits)
}

fn draw_bytes<'py>(
    py: Python<'py>,
    rng: &LegacyRandom<HardwareSource>,
    k: &Bound<'py, PyAny>,
) -> PyResult<Bound<'py, PyBytes>> {
    let k = count_arg(k, Quantity::Bytes)?;
    let bytes = py.allow_threads(|| rng.getrandbytes(k)).map_err(to_py_err)?;
    Ok(PyBytes::new(py, &bytes))
}

fn open(instruction: Instruction) -> PyResult<LegacyRandom<HardwareSource>> {
    LegacyRandom::open(instruction).map_err(to_py_err)
}

// ---------------------------------------------------------------------------
// Module functions
// ---------------------------------------------------------------------------

/// `n` random bits from RDRAND as a non-negative int.
#[pyfunction]
fn rdrand_get_bits<'py>(py: Python<'py>, n: &Bound<'py, PyAny>) -> PyResult<Bound<'py, PyAny>> {
    draw_bits(py, &open(Instruction::RdRand)?, n)
}

/// `n` random bytes from RDRAND.
#[pyfunction]
fn rdrand_get_bytes<'py>(py: Python<'py>, n: &Bound<'py, PyAny>) -> PyResult<Bound<'py, PyBytes>> {
    draw_bytes(py, &open(Instruction::RdRand)?, n)
}

/// `n` random bits from RDSEED as a non-negative int.
#[pyfunction]
fn rdseed_get_bits<'py>(py: Python<'py>, n: &Bound<'py, PyAny>) -> PyResult<Bound<'py, PyAny>> {
    draw_bits(py, &open(Instruction::RdSeed)?, n)
}

/// `n` random bytes from RDSEED.
#[pyfunction]
fn rdseed_get_bytes<'py>(py: Python<'py>, n: &Bound<'py, PyAny>) -> PyResult<Bound<'py, PyBytes>> {
    draw_bytes(py, &open(Instruction::RdSeed)?, n)
}

/// Run the randomness test battery on a bytes object.
#[pyfunction]
fn run_all_tests<'py>(py: Python<'py>, data: &[u8]) -> PyResult<Bound<'py, PyList>> {
    let results = rdentropy_tests::run_all_tests(data);
    let list = PyList::empty(py);
    for r in &results {
        let d = PyDict::new(py);
        d.set_item("name", &r.name)?;
        d.set_item("passed", r.passed)?;
        d.set_item("p_value", r.p_value)?;
        d.set_item("statistic", r.statistic)?;
        d.set_item("details", &r.details)?;
        d.set_item("grade", r.grade.to_string())?;
        list.append(d)?;
    }
    Ok(list)
}

#[pymodule]
fn _rdrand(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", rdentropy_core::VERSION)?;
    m.add("HAS_RAND", i32::from(has_hardware_rand()))?;
    m.add("HAS_SEED", i32::from(has_hardware_seed()))?;
    m.add_function(wrap_pyfunction!(rdrand_get_bits, m)?)?;
    m.add_function(wrap_pyfunction!(rdrand_get_bytes, m)?)?;
    m.add_function(wrap_pyfunction!(rdseed_get_bits, m)?)?;
    m.add_function(wrap_pyfunction!(rdseed_get_bytes, m)?)?;
    m.add_function(wrap_pyfunction!(run_all_tests, m)?)?;
    Ok(())
}
