use olm_elem::ElementKind;

/// Fractional part of `length / step_size` treated as round-off.
const STEP_FRACTION_TOLERANCE: f64 = 1e-9;

/// Sub-division of one element into equal steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepPlan {
    /// Number of sub-steps, at least one.
    pub steps: usize,
    /// Length of every sub-step (m).
    pub step_length: f64,
}

/// Step count for an element of `kind` and `length`.
///
/// Fixed-geometry elements, and every element while space charge is on, are
/// cut into `ceil(length / step_size)` steps; everything else takes one. A
/// ratio within 1e-9 above an integer rounds down to that integer.
pub fn step_count(kind: ElementKind, length: f64, step_size: f64, space_charge: bool) -> usize {
    if length <= 0.0 || !(kind.has_fixed_geometry() || space_charge) {
        return 1;
    }
    let ratio = length / step_size;
    let whole = ratio.floor();
    let steps = if ratio - whole <= STEP_FRACTION_TOLERANCE {
        whole
    } else {
        whole + 1.0
    };
    if steps.is_finite() && steps >= 1.0 {
        steps as usize
    } else {
        1
    }
}

/// Step plan for an element; a zero-length element is one zero-length step.
pub fn plan(kind: ElementKind, length: f64, step_size: f64, space_charge: bool) -> StepPlan {
    let steps = step_count(kind, length, step_size, space_charge);
    StepPlan {
        steps,
        step_length: if length > 0.0 { length / steps as f64 } else { 0.0 },
    }
}
