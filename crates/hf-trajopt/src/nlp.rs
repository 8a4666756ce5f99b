//! Bound-constrained augmented Lagrangian solver.
//!
//! Solves `min f(z)` subject to `cl <= c(z) <= cu` and `lb <= z <= ub`.
//! General constraints enter a shifted quadratic penalty; variable bounds are
//! kept exactly by projection. The inner loop is a damped Gauss-Newton method
//! on the penalty term plus the diagonal curvature of the cost, with an
//! Armijo search along the projection arc.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{TrajOptError, TrajOptResult};
use crate::jacobian::{finite_difference_jacobian, gradient_and_curvature};

/// A smooth constrained minimization problem.
pub trait NlpProblem: Sync {
    fn num_variables(&self) -> usize;

    /// `(lb, ub)` per variable; infinite entries are unbounded.
    fn variable_bounds(&self) -> (DVector<f64>, DVector<f64>);

    /// `(cl, cu)` per constraint; equal entries make an equality.
    fn constraint_bounds(&self) -> (DVector<f64>, DVector<f64>);

    fn cost(&self, z: &DVector<f64>) -> TrajOptResult<f64>;

    fn constraints(&self, z: &DVector<f64>) -> TrajOptResult<DVector<f64>>;
}

/// Outcome of a solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolutionResult {
    SolutionFound,
    Infeasible,
    IterationLimitExceeded,
    NumericalError,
}

/// Solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub max_outer_iterations: usize,
    pub max_inner_iterations: usize,
    pub max_line_search_iterations: usize,
    /// Largest allowed constraint violation at a solution.
    pub constraint_tolerance: f64,
    /// Projected gradient norm that ends an inner solve.
    pub optimality_tolerance: f64,
    pub initial_penalty: f64,
    pub penalty_growth: f64,
    /// Penalty cap; exceeding it while infeasible reports `Infeasible`.
    pub max_penalty: f64,
    /// Relative step for constraint Jacobians.
    pub fd_step: f64,
    /// Relative step for cost gradient and curvature.
    pub curvature_step: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_outer_iterations: 50,
            max_inner_iterations: 200,
            max_line_search_iterations: 40,
            constraint_tolerance: 1e-6,
            optimality_tolerance: 1e-6,
            initial_penalty: 10.0,
            penalty_growth: 10.0,
            max_penalty: 1e8,
            fd_step: 1e-6,
            curvature_step: 1e-4,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> TrajOptResult<()> {
        let positive = [
            ("constraint_tolerance", self.constraint_tolerance),
            ("optimality_tolerance", self.optimality_tolerance),
            ("initial_penalty", self.initial_penalty),
            ("max_penalty", self.max_penalty),
            ("fd_step", self.fd_step),
            ("curvature_step", self.curvature_step),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(TrajOptError::setup(format!("{name} must be finite and positive")));
            }
        }
        if !(self.penalty_growth.is_finite() && self.penalty_growth > 1.0) {
            return Err(TrajOptError::setup("penalty_growth must be greater than one"));
        }
        if self.max_outer_iterations == 0 || self.max_inner_iterations == 0 {
            return Err(TrajOptError::setup("iteration limits must be positive"));
        }
        Ok(())
    }
}

/// Final iterate and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct NlpSolution {
    pub result: SolutionResult,
    pub z: DVector<f64>,
    pub cost: f64,
    pub constraint_violation: f64,
    pub multipliers: DVector<f64>,
    pub penalty: f64,
    pub outer_iterations: usize,
    pub inner_iterations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InnerStatus {
    Converged,
    Stalled,
    IterationLimit,
    Numerical,
}

#[derive(Debug, Clone)]
struct Iterate {
    z: DVector<f64>,
    cost: f64,
    c: DVector<f64>,
}

impl Iterate {
    fn is_finite(&self) -> bool {
        self.cost.is_finite() && self.c.iter().all(|v| v.is_finite())
    }
}

const BOUND_EPS: f64 = 1e-12;
const ARMIJO: f64 = 1e-4;

struct AugmentedLagrangian<'p, P: NlpProblem> {
    problem: &'p P,
    options: &'p SolverOptions,
    lb: DVector<f64>,
    ub: DVector<f64>,
    cl: DVector<f64>,
    cu: DVector<f64>,
    lambda: DVector<f64>,
    mu: f64,
}

impl<'p, P: NlpProblem> AugmentedLagrangian<'p, P> {
    fn new(problem: &'p P, options: &'p SolverOptions) -> TrajOptResult<Self> {
        let n = problem.num_variables();
        let (lb, ub) = problem.variable_bounds();
        let (cl, cu) = problem.constraint_bounds();
        if lb.len() != n || ub.len() != n {
            return Err(TrajOptError::setup("variable bounds do not match the variable count"));
        }
        if cl.len() != cu.len() {
            return Err(TrajOptError::setup("constraint bounds have different lengths"));
        }
        if lb.iter().chain(ub.iter()).chain(cl.iter()).chain(cu.iter()).any(|v| v.is_nan()) {
            return Err(TrajOptError::setup("bounds must not be NaN"));
        }
        let m = cl.len();
        Ok(Self {
            problem,
            options,
            lb,
            ub,
            cl,
            cu,
            lambda: DVector::zeros(m),
            mu: options.initial_penalty,
        })
    }

    /// Some lower bound exceeds its upper bound, so no point is feasible.
    fn has_crossed_bounds(&self) -> bool {
        let crossed = |l: &DVector<f64>, u: &DVector<f64>| l.iter().zip(u.iter()).any(|(l, u)| l > u);
        crossed(&self.lb, &self.ub) || crossed(&self.cl, &self.cu)
    }

    fn project(&self, z: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            z.len(),
            z.iter()
                .zip(self.lb.iter().zip(self.ub.iter()))
                .map(|(v, (l, u))| v.clamp(*l, *u)),
        )
    }

    fn evaluate(&self, z: DVector<f64>) -> TrajOptResult<Iterate> {
        let cost = self.problem.cost(&z)?;
        let c = self.problem.constraints(&z)?;
        if c.len() != self.cl.len() {
            return Err(TrajOptError::setup(format!(
                "constraint function returned {} values, bounds describe {}",
                c.len(),
                self.cl.len()
            )));
        }
        Ok(Iterate { z, cost, c })
    }

    /// Distance of the multiplier-shifted constraints from their bounds.
    fn residual(&self, c: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            c.len(),
            (0..c.len()).map(|i| {
                let shifted = c[i] + self.lambda[i] / self.mu;
                shifted - shifted.clamp(self.cl[i], self.cu[i])
            }),
        )
    }

    fn merit(&self, it: &Iterate) -> f64 {
        let r = self.residual(&it.c);
        it.cost + 0.5 * self.mu * r.norm_squared()
    }

    fn violation(&self, c: &DVector<f64>) -> f64 {
        (0..c.len())
            .map(|i| (self.cl[i] - c[i]).max(c[i] - self.cu[i]).max(0.0))
            .fold(0.0, f64::max)
    }

    fn update_multipliers(&mut self, c: &DVector<f64>) {
        self.lambda = self.residual(c) * self.mu;
    }

    fn is_free(&self, z: &DVector<f64>, g: &DVector<f64>, i: usize) -> bool {
        if self.lb[i] == self.ub[i] {
            return false;
        }
        let at_lower = z[i] - self.lb[i] <= BOUND_EPS && g[i] > 0.0;
        let at_upper = self.ub[i] - z[i] <= BOUND_EPS && g[i] < 0.0;
        !(at_lower || at_upper)
    }

    fn projected_gradient_norm(&self, z: &DVector<f64>, g: &DVector<f64>) -> f64 {
        (0..z.len())
            .map(|i| ((z[i] - g[i]).clamp(self.lb[i], self.ub[i]) - z[i]).abs())
            .fold(0.0, f64::max)
    }

    /// Minimize the augmented Lagrangian for fixed multipliers and penalty.
    fn minimize(&self, mut it: Iterate) -> TrajOptResult<(Iterate, InnerStatus, usize)> {
        let opts = self.options;
        for iter in 0..opts.max_inner_iterations {
            let r = self.residual(&it.c);
            let merit = it.cost + 0.5 * self.mu * r.norm_squared();

            let jac = finite_difference_jacobian(
                &it.z,
                &it.c,
                |z| self.problem.constraints(z),
                opts.fd_step,
            )?;
            let (cost_grad, curvature) = gradient_and_curvature(
                &it.z,
                it.cost,
                |z| self.problem.cost(z),
                opts.curvature_step,
            )?;
            let grad = cost_grad + jac.transpose() * &r * self.mu;
            if grad.iter().any(|g| !g.is_finite()) {
                return Ok((it, InnerStatus::Numerical, iter));
            }

            if self.projected_gradient_norm(&it.z, &grad) <= opts.optimality_tolerance {
                return Ok((it, InnerStatus::Converged, iter));
            }

            let free: Vec<usize> = (0..it.z.len()).filter(|&i| self.is_free(&it.z, &grad, i)).collect();
            if free.is_empty() {
                return Ok((it, InnerStatus::Converged, iter));
            }
            let active_rows: Vec<usize> = (0..r.len()).filter(|&i| r[i] != 0.0).collect();

            let j_free = jac.select_rows(active_rows.iter()).select_columns(free.iter());
            let mut hessian = j_free.transpose() * &j_free * self.mu;
            for (k, &i) in free.iter().enumerate() {
                hessian[(k, k)] += curvature[i].max(0.0);
            }
            let rhs = DVector::from_iterator(free.len(), free.iter().map(|&i| -grad[i]));
            let Some(step_free) = solve_damped(hessian, &rhs) else {
                return Ok((it, InnerStatus::Numerical, iter));
            };
            let mut step = DVector::zeros(it.z.len());
            for (k, &i) in free.iter().enumerate() {
                step[i] = step_free[k];
            }

            let mut alpha = 1.0;
            let mut accepted = None;
            for _ in 0..opts.max_line_search_iterations {
                let z_new = self.project(&(&it.z + &step * alpha));
                let moved = &z_new - &it.z;
                if moved.amax() <= f64::EPSILON * (1.0 + it.z.amax()) {
                    break;
                }
                let candidate = self.evaluate(z_new)?;
                if candidate.is_finite()
                    && self.merit(&candidate) <= merit + ARMIJO * grad.dot(&moved)
                {
                    accepted = Some(candidate);
                    break;
                }
                alpha *= 0.5;
            }

            match accepted {
                Some(next) => it = next,
                None => return Ok((it, InnerStatus::Stalled, iter)),
            }
        }
        Ok((it, InnerStatus::IterationLimit, opts.max_inner_iterations))
    }

    fn finish(
        &self,
        result: SolutionResult,
        it: Iterate,
        outer_iterations: usize,
        inner_iterations: usize,
    ) -> NlpSolution {
        NlpSolution {
            result,
            constraint_violation: self.violation(&it.c),
            cost: it.cost,
            z: it.z,
            multipliers: self.lambda.clone(),
            penalty: self.mu,
            outer_iterations,
            inner_iterations,
        }
    }
}

/// Solve `(H + dI) x = rhs`, raising `d` until the Cholesky factorization
/// succeeds.
fn solve_damped(hessian: DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    let n = hessian.nrows();
    let scale = hessian.diagonal().amax().max(1.0);
    let mut damping = 1e-8 * scale;
    for _ in 0..12 {
        let mut damped = hessian.clone();
        for i in 0..n {
            damped[(i, i)] += damping;
        }
        if let Some(chol) = damped.cholesky() {
            let x = chol.solve(rhs);
            if x.iter().all(|v| v.is_finite()) {
                return Some(x);
            }
        }
        damping *= 100.0;
    }
    None
}

/// Run the augmented Lagrangian method from `z0`.
///
/// Problem evaluation failures are returned as errors. Every other ending,
/// including non-finite values, is reported through `NlpSolution::result`.
pub fn solve<P: NlpProblem>(
    problem: &P,
    z0: &DVector<f64>,
    options: &SolverOptions,
) -> TrajOptResult<NlpSolution> {
    options.validate()?;
    if z0.len() != problem.num_variables() {
        return Err(TrajOptError::setup(format!(
            "initial guess has {} entries, problem has {} variables",
            z0.len(),
            problem.num_variables()
        )));
    }
    let mut al = AugmentedLagrangian::new(problem, options)?;
    if al.has_crossed_bounds() {
        warn!("bounds are contradictory");
        let it = al.evaluate(z0.clone())?;
        return Ok(al.finish(SolutionResult::Infeasible, it, 0, 0));
    }

    let mut it = al.evaluate(al.project(z0))?;
    if !it.is_finite() {
        return Ok(al.finish(SolutionResult::NumericalError, it, 0, 0));
    }
    let mut best_violation = al.violation(&it.c);
    let mut inner_total = 0;

    for outer in 1..=options.max_outer_iterations {
        let (next, status, inner) = al.minimize(it)?;
        it = next;
        inner_total += inner;

        if status == InnerStatus::Numerical || !it.is_finite() {
            warn!(outer, "non-finite values in augmented Lagrangian solve");
            return Ok(al.finish(SolutionResult::NumericalError, it, outer, inner_total));
        }

        let violation = al.violation(&it.c);
        debug!(
            outer,
            inner,
            cost = it.cost,
            violation,
            penalty = al.mu,
            status = ?status,
            "outer iteration"
        );

        let inner_done = matches!(status, InnerStatus::Converged | InnerStatus::Stalled);
        if violation <= options.constraint_tolerance && inner_done {
            return Ok(al.finish(SolutionResult::SolutionFound, it, outer, inner_total));
        }

        if violation <= options.constraint_tolerance || violation <= 0.25 * best_violation {
            al.update_multipliers(&it.c);
            best_violation = best_violation.min(violation);
        } else {
            al.mu *= options.penalty_growth;
            if al.mu > options.max_penalty {
                warn!(violation, "penalty cap reached with constraints still violated");
                return Ok(al.finish(SolutionResult::Infeasible, it, outer, inner_total));
            }
        }
    }

    Ok(al.finish(
        SolutionResult::IterationLimitExceeded,
        it,
        options.max_outer_iterations,
        inner_total,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quadratic {
        target: Vec<f64>,
        lb: Vec<f64>,
        ub: Vec<f64>,
        constraint: fn(&DVector<f64>) -> DVector<f64>,
        cl: Vec<f64>,
        cu: Vec<f64>,
    }

    impl NlpProblem for Quadratic {
        fn num_variables(&self) -> usize {
            self.target.len()
        }

        fn variable_bounds(&self) -> (DVector<f64>, DVector<f64>) {
            (DVector::from_vec(self.lb.clone()), DVector::from_vec(self.ub.clone()))
        }

        fn constraint_bounds(&self) -> (DVector<f64>, DVector<f64>) {
            (DVector::from_vec(self.cl.clone()), DVector::from_vec(self.cu.clone()))
        }

        fn cost(&self, z: &DVector<f64>) -> TrajOptResult<f64> {
            Ok(z.iter().zip(&self.target).map(|(v, t)| (v - t).powi(2)).sum())
        }

        fn constraints(&self, z: &DVector<f64>) -> TrajOptResult<DVector<f64>> {
            Ok((self.constraint)(z))
        }
    }

    fn none(_: &DVector<f64>) -> DVector<f64> {
        DVector::zeros(0)
    }

    #[test]
    fn equality_constrained_quadratic() {
        // min (z0-2)^2 + (z1-1)^2 s.t. z0 + z1 = 1 -> (1, 0)
        let problem = Quadratic {
            target: vec![2.0, 1.0],
            lb: vec![f64::NEG_INFINITY; 2],
            ub: vec![f64::INFINITY; 2],
            constraint: |z| DVector::from_element(1, z[0] + z[1]),
            cl: vec![1.0],
            cu: vec![1.0],
        };
        let sol = solve(&problem, &DVector::zeros(2), &SolverOptions::default()).unwrap();

        assert_eq!(sol.result, SolutionResult::SolutionFound);
        assert!((sol.z[0] - 1.0).abs() < 1e-4);
        assert!(sol.z[1].abs() < 1e-4);
        assert!(sol.constraint_violation <= 1e-6);
    }

    #[test]
    fn variable_bound_is_respected() {
        let problem = Quadratic {
            target: vec![3.0],
            lb: vec![-1.0],
            ub: vec![1.0],
            constraint: none,
            cl: vec![],
            cu: vec![],
        };
        let sol = solve(&problem, &DVector::zeros(1), &SolverOptions::default()).unwrap();

        assert_eq!(sol.result, SolutionResult::SolutionFound);
        assert_eq!(sol.z[0], 1.0);
    }

    #[test]
    fn inactive_inequality_leaves_unconstrained_minimum() {
        let problem = Quadratic {
            target: vec![0.5, 0.5],
            lb: vec![f64::NEG_INFINITY; 2],
            ub: vec![f64::INFINITY; 2],
            constraint: |z| DVector::from_element(1, z[0] * z[0] + z[1] * z[1]),
            cl: vec![f64::NEG_INFINITY],
            cu: vec![4.0],
        };
        let sol = solve(&problem, &DVector::from_vec(vec![1.0, -1.0]), &SolverOptions::default())
            .unwrap();

        assert_eq!(sol.result, SolutionResult::SolutionFound);
        assert!((sol.z[0] - 0.5).abs() < 1e-4);
        assert!((sol.z[1] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn unsatisfiable_constraint_is_infeasible() {
        // z^2 <= -1 has no solution.
        let problem = Quadratic {
            target: vec![0.0],
            lb: vec![f64::NEG_INFINITY],
            ub: vec![f64::INFINITY],
            constraint: |z| DVector::from_element(1, z[0] * z[0]),
            cl: vec![f64::NEG_INFINITY],
            cu: vec![-1.0],
        };
        let sol = solve(&problem, &DVector::from_element(1, 1.0), &SolverOptions::default())
            .unwrap();

        assert_eq!(sol.result, SolutionResult::Infeasible);
        assert!(sol.constraint_violation > 0.5);
    }

    #[test]
    fn crossed_bounds_are_infeasible() {
        let problem = Quadratic {
            target: vec![0.0],
            lb: vec![1.0],
            ub: vec![0.0],
            constraint: none,
            cl: vec![],
            cu: vec![],
        };
        let sol = solve(&problem, &DVector::zeros(1), &SolverOptions::default()).unwrap();
        assert_eq!(sol.result, SolutionResult::Infeasible);
        assert_eq!(sol.outer_iterations, 0);
    }

    #[test]
    fn rejects_bad_setup() {
        let problem = Quadratic {
            target: vec![0.0],
            lb: vec![f64::NAN],
            ub: vec![0.0],
            constraint: none,
            cl: vec![],
            cu: vec![],
        };
        let err = solve(&problem, &DVector::zeros(1), &SolverOptions::default()).unwrap_err();
        assert!(matches!(err, TrajOptError::ProblemSetup { .. }));

        let err = solve(&problem, &DVector::zeros(3), &SolverOptions::default()).unwrap_err();
        assert!(matches!(err, TrajOptError::ProblemSetup { .. }));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: SolverOptions = serde_yaml::from_str("max_outer_iterations: 5\n").unwrap();
        assert_eq!(opts.max_outer_iterations, 5);
        assert_eq!(opts.max_penalty, 1e8);
        assert!(opts.validate().is_ok());

        let bad = SolverOptions {
            penalty_growth: 1.0,
            ..SolverOptions::default()
        };
        assert!(bad.validate().is_err());
    }
}
