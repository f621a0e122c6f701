//! Template functions.
//!
//! Two functions are available to every template on top of the engine's own:
//!
//! - `includeFile(path)` renders another file against the same model and
//!   inserts the result.
//! - `range(start, end[, step])` produces an integer sequence, exclusive of
//!   `end`, counting down when `end < start`.
//!
//! Both fail soft: a bad call renders a readable message in place of its
//! output instead of aborting the page. The message is built here as a
//! [`FunctionError`]; the engine adapter in [`crate::template`] decides how
//! it is embedded.

use std::fmt;

/// Name under which the include function is registered.
pub const INCLUDE_FILE: &str = "includeFile";

/// Name under which the range function is registered.
pub const RANGE: &str = "range";

/// Maximum nesting of `includeFile` calls before giving up.
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// Failure of a template function call, rendered inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionError {
    pub function: &'static str,
    pub message: String,
}

impl FunctionError {
    pub fn new(function: &'static str, message: impl Into<String>) -> Self {
        Self {
            function,
            message: message.into(),
        }
    }
}

impl fmt::Display for FunctionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}: {}]", self.function, self.message)
    }
}

impl std::error::Error for FunctionError {}

/// Compute `range(start, end, step)`.
///
/// - `start == end` is an empty sequence.
/// - The sign of `step` is corrected to match the direction from `start` to
///   `end`, so `range(5, 0, 2)` and `range(5, 0, -2)` agree.
/// - A zero step, or a step larger than the distance to cover, is an error.
pub fn range(start: i64, end: i64, step: Option<i64>) -> Result<Vec<i64>, FunctionError> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(FunctionError::new(RANGE, "step must not be zero"));
    }
    if start == end {
        return Ok(Vec::new());
    }

    let distance = end.abs_diff(start);
    let magnitude = step.unsigned_abs();
    if magnitude > distance {
        return Err(FunctionError::new(
            RANGE,
            format!("step {step} cannot go from {start} to {end}"),
        ));
    }

    let ascending = end > start;
    let mut values = Vec::with_capacity((distance / magnitude) as usize + 1);
    let mut current = start;
    while (ascending && current < end) || (!ascending && current > end) {
        values.push(current);
        let next = if ascending {
            current.checked_add_unsigned(magnitude)
        } else {
            current.checked_sub_unsigned(magnitude)
        };
        match next {
            Some(n) => current = n,
            None => break,
        }
    }
    Ok(values)
}

/// Validate a raw argument list for `range` and compute the sequence.
///
/// Arguments arrive already converted to integers where possible; `None`
/// marks an argument that was not an integer.
pub fn range_from_args(args: &[Option<i64>]) -> Result<Vec<i64>, FunctionError> {
    if args.len() < 2 {
        return Err(FunctionError::new(
            RANGE,
            "expected a start and an end, e.g. range(0, 10)",
        ));
    }
    if args.len() > 3 {
        return Err(FunctionError::new(
            RANGE,
            format!("expected at most 3 arguments, got {}", args.len()),
        ));
    }
    let integer = |index: usize, name: &str| {
        args[index].ok_or_else(|| FunctionError::new(RANGE, format!("{name} must be an integer")))
    };
    let start = integer(0, "start")?;
    let end = integer(1, "end")?;
    let step = if args.len() == 3 {
        Some(integer(2, "step")?)
    } else {
        None
    };
    range(start, end, step)
}
