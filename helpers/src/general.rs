use std::cmp::Ordering;
use std::error::Error;
use std::fmt;

/// InputValueError is used if some simulation option or parameter does not fulfill the posed
/// requirements, e.g., a tick interval of zero or an inverted sampling range.
#[derive(Debug, Clone, PartialEq)]
pub struct InputValueError {
    pub msg: String,
}

impl InputValueError {
    pub fn new(msg: impl Into<String>) -> InputValueError {
        InputValueError { msg: msg.into() }
    }
}

impl fmt::Display for InputValueError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid input value: {}", self.msg)
    }
}

impl Error for InputValueError {}

/// argmax returns the index of the maximum value in the array x. If several entries share the
/// maximum, the first of them is returned. Returns None for an empty array.
pub fn argmax<T: PartialOrd + Copy>(x: &[T]) -> Option<usize> {
    let (&first, rest) = x.split_first()?;
    let mut idx_max = 0;
    let mut val_max = first;

    for (i, &val) in rest.iter().enumerate() {
        if val > val_max {
            val_max = val;
            idx_max = i + 1;
        }
    }

    Some(idx_max)
}

/// mean returns the arithmetic mean of x, or None if x is empty.
pub fn mean(x: &[f64]) -> Option<f64> {
    if x.is_empty() {
        return None;
    }
    Some(x.iter().sum::<f64>() / x.len() as f64)
}

#[derive(Debug, Clone, Copy)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// argsort returns the indices that would sort an array. The sort is stable, incomparable values
/// (NaN) are treated as equal.
pub fn argsort<T: PartialOrd>(x: &[T], order: SortOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..x.len()).collect();
    let cmp = |a: &T, b: &T| a.partial_cmp(b).unwrap_or(Ordering::Equal);
    match order {
        SortOrder::Ascending => indices.sort_by(|&a, &b| cmp(&x[a], &x[b])),
        SortOrder::Descending => indices.sort_by(|&a, &b| cmp(&x[b], &x[a])),
    }
    indices
}

/// check_range checks that a [low, high) range is finite, non-negative and non-empty.
pub fn check_range(name: &str, range: [f64; 2]) -> Result<(), InputValueError> {
    let [low, high] = range;
    if !low.is_finite() || !high.is_finite() || low < 0.0 || low >= high {
        return Err(InputValueError::new(format!(
            "{} must be a non-empty, non-negative range, got [{}, {})",
            name, low, high
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_first_of_equal_values() {
        assert_eq!(argmax(&[100.0, 100.0]), Some(0));
        assert_eq!(argmax(&[3.0, 7.5, 7.5, 1.0]), Some(1));
        assert_eq!(argmax::<f64>(&[]), None);
    }

    #[test]
    fn mean_of_values() {
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn argsort_descending_is_stable() {
        let points = [10, 30, 10, 50];
        assert_eq!(argsort(&points, SortOrder::Descending), vec![3, 1, 0, 2]);
        assert_eq!(argsort(&points, SortOrder::Ascending), vec![0, 2, 1, 3]);
    }

    #[test]
    fn check_range_rejects_inverted_and_negative() {
        assert!(check_range("ping_range", [10.0, 110.0]).is_ok());
        assert!(check_range("ping_range", [110.0, 10.0]).is_err());
        assert!(check_range("ping_range", [-1.0, 10.0]).is_err());
        assert!(check_range("ping_range", [5.0, 5.0]).is_err());
    }
}
