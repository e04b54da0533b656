//! Decorator chain wrapped around every operator application.
//!
//! Instrumentation (counting, timing, tracing) is composed once at setup as an ordered
//! list of [`ApplyLayer`]s. Each layer receives the input vector, the output buffer and a
//! `next` continuation that runs the rest of the chain and, at the end, the operator
//! itself. A layer may do work before and after calling `next`, but must call it exactly
//! once.

use crate::error::EigenError;
use faer::{MatMut, MatRef};
use std::time::{Duration, Instant};

/// Continuation handed to a layer: runs the remaining layers and the operator.
pub type Next<'n> = dyn FnMut(MatRef<'_, f64>, MatMut<'_, f64>) -> Result<(), EigenError> + 'n;

/// A wrapper around operator application.
pub trait ApplyLayer {
    /// Short name, used in log output.
    fn name(&self) -> &str;

    fn apply(
        &mut self,
        x: MatRef<'_, f64>,
        y: MatMut<'_, f64>,
        next: &mut Next<'_>,
    ) -> Result<(), EigenError>;

    /// One-line summary of what the layer observed, logged at the end of a solve.
    fn summary(&self) -> Option<String> {
        None
    }
}

/// An ordered list of layers; the first one pushed is the outermost.
#[derive(Default)]
pub struct LayerStack {
    layers: Vec<Box<dyn ApplyLayer>>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `layer` inside every layer already present.
    pub fn push(&mut self, layer: impl ApplyLayer + 'static) -> &mut Self {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Runs `x` through the chain, ending in `inner`.
    pub fn apply(
        &mut self,
        x: MatRef<'_, f64>,
        y: MatMut<'_, f64>,
        inner: &mut Next<'_>,
    ) -> Result<(), EigenError> {
        run_chain(&mut self.layers, x, y, inner)
    }

    /// Summaries of every layer that has one, outermost first.
    pub fn summaries(&self) -> Vec<(String, String)> {
        self.layers
            .iter()
            .filter_map(|layer| layer.summary().map(|s| (layer.name().to_string(), s)))
            .collect()
    }
}

fn run_chain(
    layers: &mut [Box<dyn ApplyLayer>],
    x: MatRef<'_, f64>,
    y: MatMut<'_, f64>,
    inner: &mut Next<'_>,
) -> Result<(), EigenError> {
    match layers.split_first_mut() {
        None => inner(x, y),
        Some((first, rest)) => first.apply(x, y, &mut |x, y| run_chain(rest, x, y, inner)),
    }
}

/// Counts operator applications.
#[derive(Debug, Default, Clone)]
pub struct ApplyCounter {
    count: usize,
}

impl ApplyCounter {
    pub fn count(&self) -> usize {
        self.count
    }
}

impl ApplyLayer for ApplyCounter {
    fn name(&self) -> &str {
        "counter"
    }

    fn apply(
        &mut self,
        x: MatRef<'_, f64>,
        y: MatMut<'_, f64>,
        next: &mut Next<'_>,
    ) -> Result<(), EigenError> {
        next(x, y)?;
        self.count += 1;
        Ok(())
    }

    fn summary(&self) -> Option<String> {
        Some(format!("{} operator applications", self.count))
    }
}

/// Accumulates the wall-clock time spent inside the operator.
#[derive(Debug, Default, Clone)]
pub struct ApplyTimer {
    elapsed: Duration,
    calls: usize,
}

impl ApplyTimer {
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Mean time of one application, zero before the first one.
    pub fn per_application(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.elapsed.div_f64(self.calls as f64)
        }
    }
}

impl ApplyLayer for ApplyTimer {
    fn name(&self) -> &str {
        "timer"
    }

    fn apply(
        &mut self,
        x: MatRef<'_, f64>,
        y: MatMut<'_, f64>,
        next: &mut Next<'_>,
    ) -> Result<(), EigenError> {
        let start = Instant::now();
        let result = next(x, y);
        self.elapsed += start.elapsed();
        self.calls += 1;
        result
    }

    fn summary(&self) -> Option<String> {
        if self.calls == 0 {
            return None;
        }
        Some(format!(
            "{:?} in the operator ({:?} per application)",
            self.elapsed,
            self.per_application()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::{Mat, mat};
    use std::{cell::RefCell, rc::Rc};

    /// Records the order in which layers are entered and left.
    struct Trace {
        label: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl ApplyLayer for Trace {
        fn name(&self) -> &str {
            self.label
        }

        fn apply(
            &mut self,
            x: MatRef<'_, f64>,
            y: MatMut<'_, f64>,
            next: &mut Next<'_>,
        ) -> Result<(), EigenError> {
            self.log.borrow_mut().push(format!("enter {}", self.label));
            next(x, y)?;
            self.log.borrow_mut().push(format!("leave {}", self.label));
            Ok(())
        }
    }

    #[test]
    fn test_layers_run_outermost_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stack = LayerStack::new();
        stack
            .push(Trace {
                label: "outer",
                log: log.clone(),
            })
            .push(Trace {
                label: "inner",
                log: log.clone(),
            })
            .push(ApplyCounter::default());

        let x: Mat<f64> = mat![[1.0], [2.0]];
        let mut y = Mat::<f64>::zeros(2, 1);
        let inner_log = log.clone();
        stack
            .apply(x.as_ref(), y.as_mut(), &mut |x, mut y| {
                inner_log.borrow_mut().push("operator".to_string());
                for i in 0..x.nrows() {
                    y[(i, 0)] = 2.0 * x[(i, 0)];
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(y, mat![[2.0], [4.0]]);
        assert_eq!(
            *log.borrow(),
            vec![
                "enter outer",
                "enter inner",
                "operator",
                "leave inner",
                "leave outer"
            ]
        );
        let summaries = stack.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].1, "1 operator applications");
    }

    #[test]
    fn test_errors_propagate_through_layers() {
        let mut stack = LayerStack::new();
        stack.push(ApplyTimer::default()).push(ApplyCounter::default());
        let x = Mat::<f64>::zeros(1, 1);
        let mut y = Mat::<f64>::zeros(1, 1);
        let result = stack.apply(x.as_ref(), y.as_mut(), &mut |_, _| {
            Err(EigenError::input("operator refused"))
        });
        assert!(result.is_err());
        // The counter only counts successful applications.
        assert_eq!(stack.summaries()[1].1, "0 operator applications");
    }

    #[test]
    fn test_mean_time_survives_huge_call_counts() {
        let timer = ApplyTimer {
            elapsed: Duration::from_secs(10),
            calls: u32::MAX as usize + 3,
        };
        // 10 s over ~4.3e9 calls is a couple of nanoseconds.
        assert!(timer.per_application() < Duration::from_micros(1));
        assert_eq!(ApplyTimer::default().per_application(), Duration::ZERO);
    }
}
