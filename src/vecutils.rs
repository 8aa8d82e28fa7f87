//! Vector utility functions like max_abs(), flip(), trapz()

/// Largest element, or 0.0 for an empty slice.
pub fn max(vec: &[f64]) -> f64 {
    vec.iter().cloned().max_by(f64::total_cmp).unwrap_or(0.0)
}

/// Largest absolute value, or 0.0 for an empty slice.
pub fn max_abs(vec: &[f64]) -> f64 {
    vec.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

/// Euclidean norm.
pub fn norm(vec: &[f64]) -> f64 {
    vec.iter().map(|v| v * v).sum::<f64>().sqrt()
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Reverses `v` and returns it as a new vector.
pub fn flip<T: Clone>(v: &[T]) -> Vec<T> {
    v.iter().rev().cloned().collect()
}

/// `n` evenly spaced points from `start` to `end` (both included).
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => {
            let ds = (end - start) / (n - 1) as f64;
            let mut v: Vec<f64> = (0..n).map(|i| start + i as f64 * ds).collect();
            // Accumulated rounding can push the last point past `end`.
            v[n - 1] = end;
            v
        }
    }
}

/// Cumulative trapezoidal integral of `y` over `x`.
///
/// The first element is always 0.0; the last is the integral over the whole range.
pub fn trapz(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len().min(y.len());
    let mut z = vec![0.0; n];
    for i in 1..n {
        z[i] = z[i - 1] + 0.5 * (x[i] - x[i - 1]) * (y[i] + y[i - 1]);
    }
    z
}

/// Linear interpolation of `(xs, ys)` at `x`.
///
/// `xs` must be increasing. Returns `None` outside `[xs[0], xs[last]]`.
pub fn interp_linear(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n == 0 || x < xs[0] || x > xs[n - 1] {
        return None;
    }
    if n == 1 {
        return Some(ys[0]);
    }
    // First index with xs[k] >= x.
    let k = xs[..n].partition_point(|&v| v < x);
    if k == 0 {
        return Some(ys[0]);
    }
    let (x0, x1) = (xs[k - 1], xs[k]);
    let (y0, y1) = (ys[k - 1], ys[k]);
    if (x1 - x0).abs() < 1e-300 {
        return Some(y1);
    }
    Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
}

/// Centered moving average with a window of `window` samples.
///
/// The window shrinks symmetrically near both ends so the output has the
/// same length as the input.
pub fn moving_average(v: &[f64], window: usize) -> Vec<f64> {
    let half = window / 2;
    let n = v.len();
    (0..n)
        .map(|i| {
            let h = half.min(i).min(n - 1 - i);
            let slice = &v[i - h..=i + h];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// First derivative `dy/dx` on a (possibly non-uniform) grid.
///
/// Second-order central differences in the interior, one-sided at the ends.
pub fn gradient(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len().min(y.len());
    let mut d = vec![0.0; n];
    if n < 2 {
        return d;
    }
    d[0] = (y[1] - y[0]) / (x[1] - x[0]);
    d[n - 1] = (y[n - 1] - y[n - 2]) / (x[n - 1] - x[n - 2]);
    for i in 1..n - 1 {
        let h0 = x[i] - x[i - 1];
        let h1 = x[i + 1] - x[i];
        d[i] = (h0 * h0 * y[i + 1] - h1 * h1 * y[i - 1] + (h1 * h1 - h0 * h0) * y[i])
            / (h0 * h1 * (h0 + h1));
    }
    d
}

/// Checks if two arrays or vectors are almost equal.
///
/// Elements in both containers must be in the same order.
pub fn almost_equal(a: &[f64], b: &[f64], eps: f64) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(&x, &y)| (x - y).abs() <= eps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_abs() {
        assert_eq!(max_abs(&[1.0, -3.0, 2.0]), 3.0);
        assert_eq!(max_abs(&[]), 0.0);
        assert_eq!(max(&[-5.0, -1.0, -3.0]), -1.0);
    }

    #[test]
    fn test_flip() {
        let v = vec![1, 2, 3, 4];
        assert_eq!(flip(&v), vec![4, 3, 2, 1]);
        let empty: Vec<i32> = vec![];
        assert_eq!(flip(&empty), Vec::<i32>::new());
    }

    #[test]
    fn test_linspace_endpoints() {
        let v = linspace(-1.0, 1.0, 5);
        assert_eq!(v.len(), 5);
        assert!((v[0] + 1.0).abs() < 1e-15);
        assert!((v[4] - 1.0).abs() < 1e-15);
        assert!((v[2]).abs() < 1e-15);
    }

    #[test]
    fn test_linspace_last_point_is_exact() {
        for k in 0..200 {
            let start = -0.02 + 2e-4 * k as f64;
            let end = 1.0 - start;
            for n in [2, 7, 50, 333] {
                let v = linspace(start, end, n);
                assert_eq!(v[0], start);
                assert_eq!(v[n - 1], end, "start {start}, n {n}");
                assert!(v.windows(2).all(|w| w[1] > w[0]));
            }
        }
    }

    #[test]
    fn test_trapz_exact_for_linear_integrand() {
        // y = 3x + 2 on a non-uniform grid; antiderivative 1.5x^2 + 2x.
        let x = vec![0.0, 0.1, 0.35, 0.4, 0.9, 1.7, 2.0];
        let y: Vec<f64> = x.iter().map(|&v| 3.0 * v + 2.0).collect();
        let z = trapz(&x, &y);
        for (xi, zi) in x.iter().zip(z.iter()) {
            let exact = 1.5 * xi * xi + 2.0 * xi;
            assert!((zi - exact).abs() < 1e-12, "x={xi}: got {zi}, expected {exact}");
        }
    }

    #[test]
    fn test_interp_linear() {
        let xs = vec![0.0, 1.0, 3.0];
        let ys = vec![0.0, 2.0, 0.0];
        assert_eq!(interp_linear(&xs, &ys, 0.5), Some(1.0));
        assert_eq!(interp_linear(&xs, &ys, 2.0), Some(1.0));
        assert_eq!(interp_linear(&xs, &ys, 3.0), Some(0.0));
        assert_eq!(interp_linear(&xs, &ys, -0.1), None);
        assert_eq!(interp_linear(&xs, &ys, 3.1), None);
    }

    #[test]
    fn test_moving_average_preserves_linear() {
        let v: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let s = moving_average(&v, 5);
        assert!(almost_equal(&v, &s, 1e-12));
    }

    #[test]
    fn test_gradient_of_quadratic() {
        let x = vec![0.0, 0.5, 1.5, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| v * v).collect();
        let d = gradient(&x, &y);
        // Central differences are exact for quadratics at interior points.
        for i in 1..x.len() - 1 {
            assert!((d[i] - 2.0 * x[i]).abs() < 1e-12, "i={i}: {}", d[i]);
        }
    }

    #[test]
    fn test_almost_equal_false() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![1.0, 2.0, 4.0];
        assert!(!almost_equal(&a, &b, 1e-10));
    }
}
