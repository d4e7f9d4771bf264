//! Derivative-free minimisation (Nelder–Mead).
//!
//! The ARIMA objective is a conditional sum of squares over 1–6 parameters
//! with infeasible regions reported as `f64::INFINITY`, which rules out
//! gradient methods but suits a simplex search. The search is deterministic
//! for a given start point.

#[derive(Debug, Clone)]
pub struct NelderMeadOptions {
    pub max_iterations: usize,
    /// Converged when the spread of simplex values falls below this
    pub f_tolerance: f64,
    /// ... and the simplex diameter falls below this
    pub x_tolerance: f64,
    pub initial_step: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            f_tolerance: 1e-9,
            x_tolerance: 1e-6,
            initial_step: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

pub fn nelder_mead<F>(objective: F, start: &[f64], opts: &NelderMeadOptions) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let dim = start.len();
    if dim == 0 {
        return Minimum {
            x: Vec::new(),
            value: objective(start),
            iterations: 0,
            converged: true,
        };
    }

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(dim + 1);
    simplex.push(start.to_vec());
    for i in 0..dim {
        let mut vertex = start.to_vec();
        vertex[i] += if vertex[i].abs() > 1e-8 {
            opts.initial_step * vertex[i].abs().max(0.25)
        } else {
            opts.initial_step
        };
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| objective(v)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < opts.max_iterations {
        order_simplex(&mut simplex, &mut values);

        if has_converged(&simplex, &values, opts) {
            converged = true;
            break;
        }
        iterations += 1;

        let worst = dim;
        let centroid = centroid_without(&simplex, worst);

        let reflected = along(&centroid, &simplex[worst], -REFLECT);
        let f_reflected = objective(&reflected);

        if f_reflected < values[0] {
            let expanded = along(&centroid, &simplex[worst], -EXPAND);
            let f_expanded = objective(&expanded);
            if f_expanded < f_reflected {
                simplex[worst] = expanded;
                values[worst] = f_expanded;
            } else {
                simplex[worst] = reflected;
                values[worst] = f_reflected;
            }
            continue;
        }

        if f_reflected < values[worst - 1] {
            simplex[worst] = reflected;
            values[worst] = f_reflected;
            continue;
        }

        // Outside contraction when the reflection beat the worst point
        let (contracted, f_contracted) = if f_reflected < values[worst] {
            let point = along(&centroid, &reflected, CONTRACT);
            let f = objective(&point);
            (point, f)
        } else {
            let point = along(&centroid, &simplex[worst], CONTRACT);
            let f = objective(&point);
            (point, f)
        };

        if f_contracted < values[worst].min(f_reflected) {
            simplex[worst] = contracted;
            values[worst] = f_contracted;
            continue;
        }

        let best = simplex[0].clone();
        for i in 1..=dim {
            simplex[i] = along(&best, &simplex[i], SHRINK);
            values[i] = objective(&simplex[i]);
        }
    }

    order_simplex(&mut simplex, &mut values);
    Minimum {
        x: simplex[0].clone(),
        value: values[0],
        iterations,
        converged,
    }
}

/// `origin + t * (target - origin)`
fn along(origin: &[f64], target: &[f64], t: f64) -> Vec<f64> {
    origin
        .iter()
        .zip(target)
        .map(|(o, p)| o + t * (p - o))
        .collect()
}

fn centroid_without(simplex: &[Vec<f64>], skip: usize) -> Vec<f64> {
    let dim = simplex[0].len();
    let mut centroid = vec![0.0; dim];
    for (i, vertex) in simplex.iter().enumerate() {
        if i == skip {
            continue;
        }
        for (c, v) in centroid.iter_mut().zip(vertex) {
            *c += v;
        }
    }
    let count = (simplex.len() - 1) as f64;
    centroid.iter_mut().for_each(|c| *c /= count);
    centroid
}

fn order_simplex(simplex: &mut Vec<Vec<f64>>, values: &mut Vec<f64>) {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    *simplex = idx.iter().map(|&i| simplex[i].clone()).collect();
    *values = idx.iter().map(|&i| values[i]).collect();
}

fn has_converged(simplex: &[Vec<f64>], values: &[f64], opts: &NelderMeadOptions) -> bool {
    let best = values[0];
    let worst = values[values.len() - 1];
    if !best.is_finite() || !worst.is_finite() {
        return false;
    }
    let f_spread = (worst - best).abs();

    let diameter = simplex[1..]
        .iter()
        .flat_map(|v| v.iter().zip(&simplex[0]).map(|(a, b)| (a - b).abs()))
        .fold(0.0, f64::max);

    f_spread <= opts.f_tolerance * (1.0 + best.abs()) && diameter <= opts.x_tolerance
}
