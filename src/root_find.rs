// root_find.rs — bounded bisection

/// Iteration budget used by the morph surface inverse.
///
/// Forty halvings shrink a bracket of width π below 3e-12, far finer than an
/// `f32` can resolve. The residual `f(root)` is never checked: a ray that only
/// grazes the surface can still return a root whose error is not bounded by
/// the bracket width.
pub const BISECTION_ITERATIONS: u32 = 40;

/// Finds a root of `f` inside `[lo, hi]` by bisection.
///
/// The endpoints must bracket a root (opposite signs); an endpoint that
/// evaluates to exactly zero is returned immediately. Returns `None` when
/// there is no sign change or an endpoint is not finite. Exactly
/// `iterations` halvings are performed and the midpoint of the final bracket
/// is returned.
pub fn bisect<F>(f: F, mut lo: f32, mut hi: f32, iterations: u32) -> Option<f32>
where
    F: Fn(f32) -> f32,
{
    let mut f_lo = f(lo);
    let f_hi = f(hi);
    if !f_lo.is_finite() || !f_hi.is_finite() {
        return None;
    }
    if f_lo == 0.0 {
        return Some(lo);
    }
    if f_hi == 0.0 {
        return Some(hi);
    }
    if same_sign(f_lo, f_hi) {
        return None;
    }

    for _ in 0..iterations {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if same_sign(f_lo, f_mid) {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Some(0.5 * (lo + hi))
}

fn same_sign(a: f32, b: f32) -> bool {
    (a > 0.0 && b > 0.0) || (a < 0.0 && b < 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn finds_square_root_of_two() {
        let root = bisect(|x| x * x - 2.0, 0.0, 2.0, BISECTION_ITERATIONS).unwrap();
        assert_abs_diff_eq!(root, std::f32::consts::SQRT_2, epsilon = 1e-6);
    }

    #[test]
    fn works_with_decreasing_functions() {
        let root = bisect(|x| 1.0 - x, -3.0, 5.0, BISECTION_ITERATIONS).unwrap();
        assert_abs_diff_eq!(root, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn reports_missing_bracket() {
        assert_eq!(bisect(|x| x * x + 1.0, -1.0, 1.0, BISECTION_ITERATIONS), None);
    }

    #[test]
    fn returns_exact_endpoint_roots() {
        assert_eq!(bisect(|x| x, 0.0, 1.0, BISECTION_ITERATIONS), Some(0.0));
        assert_eq!(bisect(|x| x - 1.0, 0.0, 1.0, BISECTION_ITERATIONS), Some(1.0));
    }

    #[test]
    fn honours_the_iteration_budget() {
        // Zero halvings: the answer is the midpoint of the initial bracket.
        assert_eq!(bisect(|x| x - 0.1, 0.0, 1.0, 0), Some(0.5));
        // One halving keeps [0, 0.5].
        assert_eq!(bisect(|x| x - 0.1, 0.0, 1.0, 1), Some(0.25));
    }

    #[test]
    fn rejects_non_finite_endpoints() {
        assert_eq!(bisect(|x| 1.0 / x, 0.0, 1.0, 10), None);
    }
}
