//! Derivative-free minimization.

/// Outcome of a Nelder–Mead run.
#[derive(Debug, Clone)]
pub(super) struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Nelder–Mead simplex minimization starting from `x0` with per-coordinate
/// initial steps.
///
/// Non-finite objective values are treated as `f64::MAX`. Stops when the
/// spread of simplex values falls below `tolerance` (relative to their
/// magnitude) or after `max_iters` iterations.
pub(super) fn nelder_mead(
    f: impl Fn(&[f64]) -> f64,
    x0: &[f64],
    steps: &[f64],
    max_iters: usize,
    tolerance: f64,
) -> Minimum {
    debug_assert_eq!(x0.len(), steps.len());
    let n = x0.len();
    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() {
            v
        } else {
            f64::MAX
        }
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(x0.to_vec());
    for i in 0..n {
        let mut v = x0.to_vec();
        v[i] += steps[i];
        simplex.push(v);
    }
    let mut values: Vec<f64> = simplex.iter().map(|x| eval(x)).collect();

    let mut iterations = 0;
    let mut converged = false;
    while iterations < max_iters {
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let best = values[0];
        let worst = values[n];
        let scale = best.abs() + worst.abs() + 1e-300;
        if 2.0 * (worst - best).abs() <= tolerance * scale {
            converged = true;
            break;
        }
        iterations += 1;

        let mut centroid = vec![0.0; n];
        for x in &simplex[..n] {
            for (c, xi) in centroid.iter_mut().zip(x) {
                *c += xi / n as f64;
            }
        }
        let along = |t: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[n])
                .map(|(c, w)| c + t * (c - w))
                .collect()
        };

        let reflected = along(REFLECT);
        let f_reflected = eval(&reflected);
        if f_reflected < values[0] {
            let expanded = along(EXPAND);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
            continue;
        }
        if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
            continue;
        }

        let (contracted, f_contracted) = if f_reflected < values[n] {
            let c = along(CONTRACT * REFLECT);
            let fc = eval(&c);
            (c, fc)
        } else {
            let c = along(-CONTRACT);
            let fc = eval(&c);
            (c, fc)
        };
        if f_contracted < values[n].min(f_reflected) {
            simplex[n] = contracted;
            values[n] = f_contracted;
            continue;
        }

        let best_x = simplex[0].clone();
        for i in 1..=n {
            for (xi, bi) in simplex[i].iter_mut().zip(&best_x) {
                *xi = bi + SHRINK * (*xi - bi);
            }
            values[i] = eval(&simplex[i]);
        }
    }

    let (best_idx, _) = values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .unwrap_or((0, &values[0]));
    Minimum {
        x: simplex[best_idx].clone(),
        value: values[best_idx],
        iterations,
        converged,
    }
}

/// Nelder–Mead followed by one restart from the optimum with fresh steps,
/// which recovers from premature simplex collapse.
pub(super) fn nelder_mead_restarted(
    f: impl Fn(&[f64]) -> f64,
    x0: &[f64],
    steps: &[f64],
    max_iters: usize,
    tolerance: f64,
) -> Minimum {
    let first = nelder_mead(&f, x0, steps, max_iters, tolerance);
    let second = nelder_mead(&f, &first.x, steps, max_iters, tolerance);
    if second.value <= first.value {
        Minimum {
            iterations: first.iterations + second.iterations,
            ..second
        }
    } else {
        first
    }
}
