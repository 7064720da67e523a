// utils.rs
use std::fmt::Write;

use ndarray::Array2;

/// Format a 2D array as a matrix, one row per line.
/// # Arguments
///     `a`:  Array2, matrix to format.
pub fn format_array2(a: &Array2<f64>) -> String {
    let mut out = String::new();
    for row in a.rows() {
        for x in row {
            let _ = write!(out, "{:>12.6}", x);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rows_on_separate_lines() {
        let s = format_array2(&array![[1.0, -2.0], [0.5, 0.0]]);
        assert_eq!(s, "    1.000000   -2.000000\n    0.500000    0.000000\n");
    }
}
