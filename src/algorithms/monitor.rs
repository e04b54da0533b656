//! Per-iteration observers.
//!
//! After every outer iteration the controller hands an [`IterationReport`] to each
//! registered [`Monitor`]. A monitor may ask the solve to stop; the controller honors
//! the request at the end of the iteration, after locking whatever has converged.

use super::convergence::EigenpairEstimate;

/// Snapshot of one outer iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    /// One-based iteration counter.
    pub iteration: usize,
    /// Number of eigenpairs locked before this iteration.
    pub locked: usize,
    /// Number of pairs accepted in this iteration.
    pub newly_converged: usize,
    /// Ritz pairs of the active window, in ranked order.
    pub estimates: Vec<EigenpairEstimate>,
    /// Residual norm of the decomposition.
    pub beta: f64,
    /// Total operator applications so far.
    pub applications: usize,
}

impl IterationReport {
    /// Total number of converged pairs after this iteration.
    pub fn converged(&self) -> usize {
        self.locked + self.newly_converged
    }
}

/// What the solve should do after a monitor has seen an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorAction {
    #[default]
    Continue,
    Stop,
}

/// Observer of the outer iteration.
pub trait Monitor {
    fn observe(&mut self, report: &IterationReport) -> MonitorAction;
}

impl<F> Monitor for F
where
    F: FnMut(&IterationReport) -> MonitorAction,
{
    fn observe(&mut self, report: &IterationReport) -> MonitorAction {
        self(report)
    }
}

/// Writes a one-line summary of every iteration to the `debug` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMonitor;

impl Monitor for LogMonitor {
    fn observe(&mut self, report: &IterationReport) -> MonitorAction {
        let leading = report
            .estimates
            .first()
            .map(|e| format!("{:.10e} (error {:.3e})", e.value, e.error))
            .unwrap_or_else(|| "none".to_string());
        log::debug!(
            "Iteration {}: {} converged, leading unlocked value {leading}, beta {:.3e}, {} applications.",
            report.iteration,
            report.converged(),
            report.beta,
            report.applications
        );
        MonitorAction::Continue
    }
}

/// Records every report, for plotting convergence after the solve.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceHistory {
    reports: Vec<IterationReport>,
}

impl ConvergenceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[IterationReport] {
        &self.reports
    }

    /// Error estimate of the best-ranked unlocked pair at each iteration.
    pub fn leading_errors(&self) -> Vec<f64> {
        self.reports
            .iter()
            .map(|r| r.estimates.first().map_or(0.0, |e| e.error))
            .collect()
    }
}

impl Monitor for ConvergenceHistory {
    fn observe(&mut self, report: &IterationReport) -> MonitorAction {
        self.reports.push(report.clone());
        MonitorAction::Continue
    }
}

/// Fans a report out to several monitors. The solve stops if any of them asks to.
pub(crate) fn notify(monitors: &mut [&mut dyn Monitor], report: &IterationReport) -> MonitorAction {
    let mut action = MonitorAction::Continue;
    for monitor in monitors.iter_mut() {
        if monitor.observe(report) == MonitorAction::Stop {
            action = MonitorAction::Stop;
        }
    }
    action
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(iteration: usize) -> IterationReport {
        IterationReport {
            iteration,
            locked: 1,
            newly_converged: 2,
            estimates: Vec::new(),
            beta: 0.5,
            applications: 10 * iteration,
        }
    }

    #[test]
    fn test_every_monitor_sees_the_report() {
        let mut history = ConvergenceHistory::new();
        let mut calls = 0;
        let mut stopper = |r: &IterationReport| {
            calls += 1;
            if r.iteration >= 2 {
                MonitorAction::Stop
            } else {
                MonitorAction::Continue
            }
        };
        {
            let mut monitors: [&mut dyn Monitor; 3] = [&mut stopper, &mut history, &mut LogMonitor];
            assert_eq!(notify(&mut monitors, &report(1)), MonitorAction::Continue);
            assert_eq!(notify(&mut monitors, &report(2)), MonitorAction::Stop);
        }
        assert_eq!(calls, 2);
        assert_eq!(history.reports().len(), 2);
        assert_eq!(history.reports()[1].converged(), 3);
        assert_eq!(history.leading_errors(), vec![0.0, 0.0]);
    }
}
