//! Direct collocation over a continuous-time system.
//!
//! Decision vector layout: `[T, x_0 .. x_{N-1}, u_0 .. u_{N-1}]` with knots
//! spaced `T / (N - 1)` apart. Each interval contributes a Hermite-Simpson
//! defect that must vanish. Dynamics are taken from input port 0 and the
//! continuous state of the system, evaluated on clones of the given context;
//! they are assumed time invariant.

use hf_framework::{Context, System, Value, ValueKind};
use nalgebra::DVector;
use tracing::info;

use crate::error::{TrajOptError, TrajOptResult};
use crate::nlp::{self, NlpProblem, NlpSolution, SolutionResult, SolverOptions};
use crate::trajectory::PiecewisePolynomial;

pub type KnotFunction = Box<dyn Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64> + Send + Sync>;
pub type RunningCost = Box<dyn Fn(&DVector<f64>, &DVector<f64>) -> f64 + Send + Sync>;
pub type FinalCost = Box<dyn Fn(f64, &DVector<f64>) -> f64 + Send + Sync>;

struct KnotConstraint {
    function: KnotFunction,
    lower: DVector<f64>,
    upper: DVector<f64>,
}

pub struct DirectCollocation<'s> {
    system: &'s System,
    context: Context,
    num_samples: usize,
    num_states: usize,
    num_inputs: usize,
    t_min: f64,
    t_max: f64,
    lower: DVector<f64>,
    upper: DVector<f64>,
    knot_constraints: Vec<KnotConstraint>,
    running_costs: Vec<RunningCost>,
    final_costs: Vec<FinalCost>,
    input_guess: Option<PiecewisePolynomial>,
    state_guess: Option<PiecewisePolynomial>,
    options: SolverOptions,
    solution: Option<NlpSolution>,
}

impl<'s> DirectCollocation<'s> {
    /// Transcribe `system` with parameters from `context` into `num_samples`
    /// knots whose total duration lies in `[t_min, t_max]`.
    pub fn new(
        system: &'s System,
        context: &Context,
        num_samples: usize,
        t_min: f64,
        t_max: f64,
    ) -> TrajOptResult<Self> {
        if num_samples < 2 {
            return Err(TrajOptError::setup("at least two samples are required"));
        }
        if !(t_min.is_finite() && t_max.is_finite() && t_min > 0.0 && t_min <= t_max) {
            return Err(TrajOptError::setup(format!(
                "duration bounds [{t_min}, {t_max}] must satisfy 0 < t_min <= t_max"
            )));
        }
        let num_states = system.continuous_state_size();
        if num_states == 0 {
            return Err(TrajOptError::setup(format!(
                "system '{}' has no continuous state",
                system.name()
            )));
        }
        let num_inputs = match system.input_specs().first().map(|spec| spec.kind) {
            None => 0,
            Some(ValueKind::Vector(width)) => width,
            Some(ValueKind::Abstract) => {
                return Err(TrajOptError::setup("input port 0 must carry a vector"));
            }
        };

        let num_vars = 1 + num_samples * (num_states + num_inputs);
        let mut lower = DVector::from_element(num_vars, f64::NEG_INFINITY);
        let mut upper = DVector::from_element(num_vars, f64::INFINITY);
        lower[0] = t_min;
        upper[0] = t_max;

        let dircol = Self {
            system,
            context: context.clone(),
            num_samples,
            num_states,
            num_inputs,
            t_min,
            t_max,
            lower,
            upper,
            knot_constraints: Vec::new(),
            running_costs: Vec::new(),
            final_costs: Vec::new(),
            input_guess: None,
            state_guess: None,
            options: SolverOptions::default(),
            solution: None,
        };
        // Surface wiring or context problems before any solve.
        dircol.dynamics(&context.continuous_state(), &DVector::zeros(num_inputs))?;
        Ok(dircol)
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn duration_bounds(&self) -> (f64, f64) {
        (self.t_min, self.t_max)
    }

    pub fn set_solver_options(&mut self, options: SolverOptions) {
        self.options = options;
    }

    fn state_offset(&self, k: usize) -> usize {
        1 + k * self.num_states
    }

    fn input_offset(&self, k: usize) -> usize {
        1 + self.num_samples * self.num_states + k * self.num_inputs
    }

    fn state(&self, z: &DVector<f64>, k: usize) -> DVector<f64> {
        z.rows(self.state_offset(k), self.num_states).into_owned()
    }

    fn input(&self, z: &DVector<f64>, k: usize) -> DVector<f64> {
        z.rows(self.input_offset(k), self.num_inputs).into_owned()
    }

    fn check_width(what: &str, expected: usize, actual: usize) -> TrajOptResult<()> {
        if expected != actual {
            return Err(TrajOptError::setup(format!(
                "{what} has {actual} entries, expected {expected}"
            )));
        }
        Ok(())
    }

    /// Tighten the bounds of `width` variables starting at every `offset`.
    fn tighten(&mut self, offsets: Vec<usize>, lower: &[f64], upper: &[f64]) {
        for offset in offsets {
            for (i, (l, u)) in lower.iter().zip(upper).enumerate() {
                self.lower[offset + i] = self.lower[offset + i].max(*l);
                self.upper[offset + i] = self.upper[offset + i].min(*u);
            }
        }
    }

    /// `lower <= u_k <= upper` at every knot.
    pub fn add_input_bounds(&mut self, lower: &[f64], upper: &[f64]) -> TrajOptResult<()> {
        Self::check_width("input lower bound", self.num_inputs, lower.len())?;
        Self::check_width("input upper bound", self.num_inputs, upper.len())?;
        let offsets = (0..self.num_samples).map(|k| self.input_offset(k)).collect();
        self.tighten(offsets, lower, upper);
        Ok(())
    }

    /// `lower <= x_k <= upper` at every knot.
    pub fn add_state_bounds(&mut self, lower: &[f64], upper: &[f64]) -> TrajOptResult<()> {
        Self::check_width("state lower bound", self.num_states, lower.len())?;
        Self::check_width("state upper bound", self.num_states, upper.len())?;
        let offsets = (0..self.num_samples).map(|k| self.state_offset(k)).collect();
        self.tighten(offsets, lower, upper);
        Ok(())
    }

    pub fn add_initial_state_constraint(&mut self, x0: &[f64]) -> TrajOptResult<()> {
        Self::check_width("initial state", self.num_states, x0.len())?;
        let offset = self.state_offset(0);
        self.tighten(vec![offset], x0, x0);
        Ok(())
    }

    pub fn add_final_state_constraint(&mut self, xf: &[f64]) -> TrajOptResult<()> {
        Self::check_width("final state", self.num_states, xf.len())?;
        let offset = self.state_offset(self.num_samples - 1);
        self.tighten(vec![offset], xf, xf);
        Ok(())
    }

    /// `lower <= f(x_k, u_k) <= upper` at every knot.
    pub fn add_constraint_to_all_knot_points<F>(
        &mut self,
        function: F,
        lower: &[f64],
        upper: &[f64],
    ) -> TrajOptResult<()>
    where
        F: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
    {
        Self::check_width("knot constraint upper bound", lower.len(), upper.len())?;
        self.knot_constraints.push(KnotConstraint {
            function: Box::new(function),
            lower: DVector::from_column_slice(lower),
            upper: DVector::from_column_slice(upper),
        });
        Ok(())
    }

    /// Add `integral g(x, u) dt`, approximated with trapezoidal weights.
    pub fn add_running_cost<F>(&mut self, cost: F)
    where
        F: Fn(&DVector<f64>, &DVector<f64>) -> f64 + Send + Sync + 'static,
    {
        self.running_costs.push(Box::new(cost));
    }

    /// Add `F(T, x_{N-1})`.
    pub fn add_final_cost<F>(&mut self, cost: F)
    where
        F: Fn(f64, &DVector<f64>) -> f64 + Send + Sync + 'static,
    {
        self.final_costs.push(Box::new(cost));
    }

    /// Seed the solver. Either guess may be omitted; missing inputs start at
    /// zero and missing states blend linearly between pinned end states.
    pub fn set_initial_trajectory(
        &mut self,
        input_guess: Option<PiecewisePolynomial>,
        state_guess: Option<PiecewisePolynomial>,
    ) -> TrajOptResult<()> {
        if let Some(guess) = &input_guess {
            Self::check_width("input guess", self.num_inputs, guess.rows())?;
        }
        if let Some(guess) = &state_guess {
            Self::check_width("state guess", self.num_states, guess.rows())?;
        }
        self.input_guess = input_guess;
        self.state_guess = state_guess;
        Ok(())
    }

    fn dynamics(&self, x: &DVector<f64>, u: &DVector<f64>) -> TrajOptResult<DVector<f64>> {
        let mut ctx = self.context.clone();
        ctx.set_continuous_state(x)?;
        if self.num_inputs > 0 {
            self.system.fix_input_port(&mut ctx, 0, Value::Vector(u.clone()))?;
        }
        Ok(self.system.compute_time_derivatives(&ctx)?)
    }

    fn knot_derivatives(&self, z: &DVector<f64>) -> TrajOptResult<Vec<DVector<f64>>> {
        (0..self.num_samples)
            .map(|k| self.dynamics(&self.state(z, k), &self.input(z, k)))
            .collect()
    }

    fn spacing(&self, duration: f64) -> f64 {
        duration / (self.num_samples - 1) as f64
    }

    fn knot_times(&self, duration: f64) -> Vec<f64> {
        let h = self.spacing(duration);
        let mut times: Vec<f64> = (0..self.num_samples).map(|k| k as f64 * h).collect();
        times[self.num_samples - 1] = duration;
        times
    }

    fn initial_guess(&self) -> DVector<f64> {
        let n = self.num_states;
        let last = self.num_samples - 1;
        let guess_duration = self
            .state_guess
            .as_ref()
            .or(self.input_guess.as_ref())
            .map(PiecewisePolynomial::duration)
            .unwrap_or(0.5 * (self.t_min + self.t_max));

        let mut z = DVector::zeros(self.lower.len());
        z[0] = guess_duration;

        let pinned = |offset: usize| -> DVector<f64> {
            DVector::from_iterator(
                n,
                (offset..offset + n).map(|i| {
                    if self.lower[i] == self.upper[i] { self.lower[i] } else { 0.0 }
                }),
            )
        };
        let (x_start, x_end) = (pinned(self.state_offset(0)), pinned(self.state_offset(last)));

        let h = self.spacing(guess_duration);
        for k in 0..self.num_samples {
            let x = match &self.state_guess {
                Some(guess) => guess.value(guess.start_time() + k as f64 * h),
                None => {
                    let s = k as f64 / last as f64;
                    &x_start * (1.0 - s) + &x_end * s
                }
            };
            z.rows_mut(self.state_offset(k), n).copy_from(&x);
            if let Some(guess) = &self.input_guess {
                let u = guess.value(guess.start_time() + k as f64 * h);
                z.rows_mut(self.input_offset(k), self.num_inputs).copy_from(&u);
            }
        }
        z
    }

    /// Run the optimizer from the current initial guess.
    pub fn solve(&mut self) -> TrajOptResult<SolutionResult> {
        let z0 = self.initial_guess();
        let solution = nlp::solve(&Transcription(self), &z0, &self.options)?;
        info!(
            result = ?solution.result,
            duration = solution.z[0],
            cost = solution.cost,
            violation = solution.constraint_violation,
            outer = solution.outer_iterations,
            inner = solution.inner_iterations,
            "direct collocation finished"
        );
        let result = solution.result;
        self.solution = Some(solution);
        Ok(result)
    }

    /// Outcome of the last `solve`, if any.
    pub fn solution_result(&self) -> Option<SolutionResult> {
        self.solution.as_ref().map(|s| s.result)
    }

    /// The last solve, only when it found a solution.
    pub fn solution(&self) -> TrajOptResult<&NlpSolution> {
        match &self.solution {
            Some(s) if s.result == SolutionResult::SolutionFound => Ok(s),
            other => Err(TrajOptError::NoSolution {
                outcome: other.as_ref().map(|s| s.result),
            }),
        }
    }

    pub fn duration(&self) -> TrajOptResult<f64> {
        Ok(self.solution()?.z[0])
    }

    pub fn sample_times(&self) -> TrajOptResult<Vec<f64>> {
        Ok(self.knot_times(self.duration()?))
    }

    /// First-order hold through the knot inputs over `[0, T]`.
    pub fn reconstruct_input_trajectory(&self) -> TrajOptResult<PiecewisePolynomial> {
        let z = &self.solution()?.z;
        let inputs: Vec<_> = (0..self.num_samples).map(|k| self.input(z, k)).collect();
        PiecewisePolynomial::first_order_hold(&self.knot_times(z[0]), &inputs)
    }

    /// Cubic Hermite spline through the knot states and their derivatives
    /// over `[0, T]`.
    pub fn reconstruct_state_trajectory(&self) -> TrajOptResult<PiecewisePolynomial> {
        let z = &self.solution()?.z;
        let states: Vec<_> = (0..self.num_samples).map(|k| self.state(z, k)).collect();
        let derivatives = self.knot_derivatives(z)?;
        PiecewisePolynomial::cubic_hermite(&self.knot_times(z[0]), &states, &derivatives)
    }
}

/// Read-only view of a `DirectCollocation` as a nonlinear program.
struct Transcription<'a, 's>(&'a DirectCollocation<'s>);

impl NlpProblem for Transcription<'_, '_> {
    fn num_variables(&self) -> usize {
        self.0.lower.len()
    }

    fn variable_bounds(&self) -> (DVector<f64>, DVector<f64>) {
        (self.0.lower.clone(), self.0.upper.clone())
    }

    fn constraint_bounds(&self) -> (DVector<f64>, DVector<f64>) {
        let dc = self.0;
        let mut lower = vec![0.0; (dc.num_samples - 1) * dc.num_states];
        let mut upper = lower.clone();
        for constraint in &dc.knot_constraints {
            for _ in 0..dc.num_samples {
                lower.extend(constraint.lower.iter());
                upper.extend(constraint.upper.iter());
            }
        }
        (DVector::from_vec(lower), DVector::from_vec(upper))
    }

    fn cost(&self, z: &DVector<f64>) -> TrajOptResult<f64> {
        let dc = self.0;
        let last = dc.num_samples - 1;
        let h = dc.spacing(z[0]);
        let mut total = 0.0;
        if !dc.running_costs.is_empty() {
            for k in 0..dc.num_samples {
                let weight = if k == 0 || k == last { 0.5 * h } else { h };
                let (x, u) = (dc.state(z, k), dc.input(z, k));
                total += weight * dc.running_costs.iter().map(|g| g(&x, &u)).sum::<f64>();
            }
        }
        let x_final = dc.state(z, last);
        total += dc.final_costs.iter().map(|f| f(z[0], &x_final)).sum::<f64>();
        Ok(total)
    }

    fn constraints(&self, z: &DVector<f64>) -> TrajOptResult<DVector<f64>> {
        let dc = self.0;
        let h = dc.spacing(z[0]);
        let derivs = dc.knot_derivatives(z)?;
        let mut out = Vec::new();

        for k in 0..dc.num_samples - 1 {
            let (x0, x1) = (dc.state(z, k), dc.state(z, k + 1));
            let (u0, u1) = (dc.input(z, k), dc.input(z, k + 1));
            let (f0, f1) = (&derivs[k], &derivs[k + 1]);

            let x_mid = (&x0 + &x1) * 0.5 + (f0 - f1) * (h / 8.0);
            let u_mid = (&u0 + &u1) * 0.5;
            let xdot_mid = (&x1 - &x0) * (1.5 / h) - (f0 + f1) * 0.25;
            let defect = xdot_mid - dc.dynamics(&x_mid, &u_mid)?;
            out.extend(defect.iter());
        }

        for constraint in &dc.knot_constraints {
            for k in 0..dc.num_samples {
                let value = (constraint.function)(&dc.state(z, k), &dc.input(z, k));
                if value.len() != constraint.lower.len() {
                    return Err(TrajOptError::setup(format!(
                        "knot constraint returned {} values, bounds describe {}",
                        value.len(),
                        constraint.lower.len()
                    )));
                }
                out.extend(value.iter());
            }
        }
        Ok(DVector::from_vec(out))
    }
}
