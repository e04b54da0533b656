//! Integration test suite to verify the eigenpairs computed by the restarted solver.
//!
//! # Test Methodology
//!
//! Every test problem has a spectrum known in closed form, so the computed eigenvalues
//! can be compared against the exact ones. Eigenvectors are checked through their true
//! residual `||A x - lambda x||`, recomputed here independently of the solver.
//!
//! The end-to-end scenario is repeated for every reorthogonalization strategy and both
//! restart kinds through a `macro_rules!` generator, so a regression in one policy shows
//! up as a single, clearly named failing test.

use anyhow::{Result, ensure};
use faer::{Mat, MatMut, MatRef};
use krylov_eigs::{
    ConvergedReason, EigenErrorKind, EigenSolver, SolverConfig,
    algorithms::{
        convergence::SelectionCriterion,
        monitor::{ConvergenceHistory, IterationReport, Monitor, MonitorAction},
        reorthog::ReorthogStrategy,
        restart::RestartKind,
    },
    matrix::{ApplyContext, FnOperator},
    utils::problems::Problem,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Maximum true residual accepted for a converged pair, relative to the eigenvalue.
const RESIDUAL_TOLERANCE: f64 = 1e-8;

/// Recomputes `||A x - lambda x|| / |lambda|` for every returned pair.
fn max_relative_residual(a: &Mat<f64>, values: &[f64], vectors: MatRef<'_, f64>) -> f64 {
    values
        .iter()
        .enumerate()
        .map(|(i, &lambda)| {
            let x = vectors.get(.., i..i + 1);
            let mut r = a * x;
            for k in 0..r.nrows() {
                r[(k, 0)] -= lambda * x[(k, 0)];
            }
            r.norm_l2() / lambda.abs().max(1.0)
        })
        .fold(0.0, f64::max)
}

/// Generates the 10 x 10 scenario with known eigenvalues {1, ..., 10}: the three largest
/// are requested with tolerance 1e-10 and a basis of six vectors.
macro_rules! generate_end_to_end_test {
    ($test_name:ident, $strategy:expr, $restart:expr) => {
        #[test]
        fn $test_name() -> Result<()> {
            let a = Problem::ShiftedClement.build(10)?.to_dense();
            let config = SolverConfig::new(3)
                .with_ncv(6)
                .with_tol(1e-10)
                .with_which(SelectionCriterion::LargestReal)
                .with_reorthog($strategy)
                .with_restart($restart)
                .with_seed(7);
            let solution = EigenSolver::new(config).solve(&a)?;

            ensure!(
                solution.reason == ConvergedReason::Converged,
                "{} did not converge: {:?}",
                $strategy,
                solution.reason
            );
            ensure!(solution.nconv() >= 3, "only {} pairs", solution.nconv());
            for (value, expected) in solution.eigenvalues.iter().zip([10.0, 9.0, 8.0]) {
                ensure!(
                    (value - expected).abs() < 1e-8,
                    "expected {expected}, got {value}"
                );
            }
            for i in 0..3 {
                ensure!(
                    solution.residual_norm(i) < 1e-8,
                    "residual of pair {i} is {}",
                    solution.residual_norm(i)
                );
            }
            let recomputed = max_relative_residual(
                &a,
                &solution.eigenvalues,
                solution.eigenvectors.as_ref(),
            );
            ensure!(recomputed < RESIDUAL_TOLERANCE, "recomputed residual {recomputed}");
            Ok(())
        }
    };
}

generate_end_to_end_test!(test_end_to_end_local, ReorthogStrategy::Local, RestartKind::Thick);
generate_end_to_end_test!(test_end_to_end_full, ReorthogStrategy::Full, RestartKind::Thick);
generate_end_to_end_test!(test_end_to_end_selective, ReorthogStrategy::Selective, RestartKind::Thick);
generate_end_to_end_test!(test_end_to_end_periodic, ReorthogStrategy::Periodic, RestartKind::Thick);
generate_end_to_end_test!(test_end_to_end_partial, ReorthogStrategy::Partial, RestartKind::Thick);
generate_end_to_end_test!(test_end_to_end_delayed, ReorthogStrategy::Delayed, RestartKind::Thick);
generate_end_to_end_test!(test_end_to_end_full_explicit, ReorthogStrategy::Full, RestartKind::Explicit);
generate_end_to_end_test!(test_end_to_end_local_explicit, ReorthogStrategy::Local, RestartKind::Explicit);

#[test]
fn test_larger_sparse_problem_smallest_eigenvalues() -> Result<()> {
    let n = 400;
    let a = Problem::Diagonal.build(n)?;
    let config = SolverConfig::new(4)
        .with_ncv(20)
        .with_tol(1e-9)
        .with_which(SelectionCriterion::SmallestReal)
        .with_reorthog(ReorthogStrategy::Full)
        .with_max_it(1000);
    let solution = EigenSolver::new(config).solve(&a)?;
    ensure!(solution.is_converged(), "reason {:?}", solution.reason);
    for (value, expected) in solution.eigenvalues.iter().zip([1.0, 2.0, 3.0, 4.0]) {
        ensure!((value - expected).abs() < 1e-6, "expected {expected}, got {value}");
    }
    Ok(())
}

#[test]
fn test_target_criterion_finds_interior_eigenvalue() -> Result<()> {
    let a = Problem::Diagonal.build(30)?.to_dense();
    let config = SolverConfig::new(1)
        .with_ncv(30)
        .with_tol(1e-10)
        .with_which(SelectionCriterion::TargetMagnitude(15.3))
        .with_reorthog(ReorthogStrategy::Full);
    let solution = EigenSolver::new(config).solve(&a)?;
    ensure!(solution.is_converged());
    ensure!((solution.eigenvalues[0] - 15.0).abs() < 1e-8);
    Ok(())
}

#[test]
fn test_more_eigenvalues_than_dimension_fails_before_iterating() -> Result<()> {
    let a = Problem::Diagonal.build(10)?;
    let calls = std::cell::Cell::new(0usize);
    let op = FnOperator::new(10, |out: MatMut<'_, f64>, rhs: MatRef<'_, f64>, ctx: &mut ApplyContext<'_>| {
        calls.set(calls.get() + 1);
        krylov_eigs::LinearOperator::apply(&a, out, rhs, ctx)
    });
    let err = EigenSolver::new(SolverConfig::new(11)).solve(&op).unwrap_err();
    ensure!(matches!(err.kind(), EigenErrorKind::InputError(_)));
    ensure!(calls.get() == 0, "the operator was applied {} times", calls.get());
    Ok(())
}

#[test]
fn test_zero_on_first_call_operator_recovers_true_eigenpairs() -> Result<()> {
    let diag: Vec<f64> = (1..=12).map(|i| i as f64).collect();
    let op = FnOperator::new(12, |mut out: MatMut<'_, f64>, rhs: MatRef<'_, f64>, ctx: &mut ApplyContext<'_>| {
        for i in 0..12 {
            out[(i, 0)] = if ctx.application == 0 { 0.0 } else { diag[i] * rhs[(i, 0)] };
        }
        Ok(())
    });
    for strategy in ReorthogStrategy::ALL {
        let config = SolverConfig::new(2).with_ncv(6).with_reorthog(strategy);
        let solution = EigenSolver::new(config).solve(&op)?;
        ensure!(solution.eigenvalues.iter().all(|v| v.is_finite()));
        ensure!(solution.residual_norms.iter().all(|r| r.is_finite()));

        // The start vector must not be locked as an eigenvector of eigenvalue zero.
        ensure!(
            solution.reason == ConvergedReason::Converged,
            "{strategy}: {:?}",
            solution.reason
        );
        for (i, expected) in [12.0, 11.0].into_iter().enumerate() {
            ensure!(
                (solution.eigenvalues[i] - expected).abs() < 1e-6,
                "{strategy}: expected {expected}, got {:?}",
                solution.eigenvalues
            );
            ensure!(
                solution.residual_norm(i) < 1e-6,
                "{strategy}: residual of pair {i} is {}",
                solution.residual_norm(i)
            );
        }
    }
    Ok(())
}

#[test]
fn test_zero_operator_never_produces_nan() -> Result<()> {
    let a = Mat::<f64>::zeros(8, 8);
    let solution = EigenSolver::new(SolverConfig::new(2).with_ncv(4)).solve(&a)?;
    ensure!(matches!(
        solution.reason,
        ConvergedReason::Converged | ConvergedReason::DivergedBreakdown
    ));
    ensure!(solution.eigenvalues.iter().all(|v| *v == 0.0));
    Ok(())
}

#[test]
fn test_deflation_space_is_excluded_from_the_search() -> Result<()> {
    let n = 20;
    let a = Problem::Diagonal.build(n)?.to_dense();
    // Hide the eigenvector of the largest eigenvalue.
    let mut space = Mat::<f64>::zeros(n, 1);
    space[(n - 1, 0)] = 1.0;
    let config = SolverConfig::new(2)
        .with_ncv(10)
        .with_tol(1e-10)
        .with_which(SelectionCriterion::LargestReal)
        .with_reorthog(ReorthogStrategy::Full)
        .with_deflation_space(space);
    let solution = EigenSolver::new(config).solve(&a)?;
    ensure!(solution.is_converged());
    ensure!((solution.eigenvalues[0] - 19.0).abs() < 1e-8, "got {}", solution.eigenvalues[0]);
    ensure!((solution.eigenvalues[1] - 18.0).abs() < 1e-8);
    ensure!(solution.eigenvectors[(n - 1, 0)].abs() < 1e-12);
    Ok(())
}

#[test]
fn test_user_initial_vector_and_monitors() -> Result<()> {
    let n = 50;
    let a = Problem::Laplacian.build(n)?;
    let mut rng = StdRng::seed_from_u64(42);
    let v0 = Mat::from_fn(n, 1, |_, _| rng.random::<f64>());
    let config = SolverConfig::new(2)
        .with_ncv(12)
        .with_reorthog(ReorthogStrategy::Full)
        .with_which(SelectionCriterion::LargestReal)
        .with_initial_vector(v0);

    let mut history = ConvergenceHistory::new();
    let mut stop_after_two = |report: &IterationReport| {
        if report.iteration >= 2 {
            MonitorAction::Stop
        } else {
            MonitorAction::Continue
        }
    };
    let solution = {
        let mut monitors: [&mut dyn Monitor; 2] = [&mut history, &mut stop_after_two];
        EigenSolver::new(config).solve_monitored(&a, &mut monitors)?
    };

    ensure!(solution.iterations <= 2);
    ensure!(history.reports().len() == solution.iterations);
    ensure!(matches!(
        solution.reason,
        ConvergedReason::Stopped | ConvergedReason::Converged
    ));
    Ok(())
}

#[test]
fn test_iteration_limit_returns_partial_results() -> Result<()> {
    let a = Problem::Laplacian.build(300)?;
    let config = SolverConfig::new(6)
        .with_ncv(10)
        .with_tol(1e-12)
        .with_max_it(3)
        .with_which(SelectionCriterion::SmallestReal)
        .with_reorthog(ReorthogStrategy::Full);
    let solution = EigenSolver::new(config).solve(&a)?;
    ensure!(solution.reason == ConvergedReason::DivergedIts);
    ensure!(solution.iterations == 3);
    ensure!(solution.nconv() < 6);
    Ok(())
}
