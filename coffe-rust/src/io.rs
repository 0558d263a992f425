//! Column files: power spectra, bias tables, tabulated backgrounds and the
//! correlation function output.
//!
//! Input files are whitespace separated numbers, one row per line. Empty
//! lines and everything after `#` are ignored.

use crate::corrfunc::CorrelationArray;
use crate::error::{CoffeError, Result};
use crate::interpolation1d::{Interpolate1D, InterpolationMethod};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

fn io_error(path: &Path, source: std::io::Error) -> CoffeError {
    CoffeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read the first `n_columns` columns of a numeric table.
///
/// Returns the columns, each as long as the number of data rows.
///
/// # Errors
/// `Io` if the file cannot be read, `Parse` for a row with too few or
/// non-numeric fields.
pub fn read_columns(path: &Path, n_columns: usize) -> Result<Vec<Vec<f64>>> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let mut columns = vec![Vec::new(); n_columns];

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| io_error(path, e))?;
        let data = line.split('#').next().unwrap_or("").trim();
        if data.is_empty() {
            continue;
        }
        let fields: Vec<&str> = data.split_whitespace().collect();
        if fields.len() < n_columns {
            return Err(CoffeError::Parse {
                path: path.to_path_buf(),
                line: index + 1,
                message: format!("expected {} columns, found {}", n_columns, fields.len()),
            });
        }
        for (column, field) in columns.iter_mut().zip(&fields) {
            let value = field.parse::<f64>().map_err(|e| CoffeError::Parse {
                path: path.to_path_buf(),
                line: index + 1,
                message: format!("'{}': {}", field, e),
            })?;
            column.push(value);
        }
    }
    Ok(columns)
}

/// Interpolant through the first two columns of a file (x, y).
pub fn read_interpolant(path: &Path, method: InterpolationMethod) -> Result<Interpolate1D> {
    let columns = read_columns(path, 2)?;
    Interpolate1D::new(&columns[0], &columns[1], method).map_err(|e| match e {
        CoffeError::InvalidInput(message) => CoffeError::Parse {
            path: path.to_path_buf(),
            line: 0,
            message,
        },
        other => other,
    })
}

/// Write `z_mean mu r xi` rows in grid order, preceded by a header.
pub fn write_corrfunc(path: &Path, array: &CorrelationArray) -> Result<()> {
    let file = File::create(path).map_err(|e| io_error(path, e))?;
    let mut out = BufWriter::new(file);
    let mut write = || -> std::io::Result<()> {
        writeln!(out, "# z_mean\tmu\tr [Mpc/h]\txi")?;
        for p in array.points() {
            writeln!(
                out,
                "{:.10e}\t{:.10e}\t{:.10e}\t{:.16e}",
                p.z_mean, p.mu, p.separation, p.value
            )?;
        }
        out.flush()
    };
    write().map_err(|e| io_error(path, e))
}
