use nalgebra::DVector;

use crate::dynamics::RocketDynamics;
use crate::error::{check_duration, SimError, SimResult};
use crate::gnc::PidController;
use crate::io::TableSink;
use super::record::{RunSummary, SimulationRecord};

/// Progress is logged every this many steps.
const PROGRESS_INTERVAL: usize = 25;

// ---------------------------------------------------------------------------
// Step count
// ---------------------------------------------------------------------------

/// Number of whole sampling intervals in `duration`. Quotients within 1e-9
/// of an integer snap to it; anything else truncates.
pub fn step_count(duration: f64, sampling_time: f64) -> usize {
    let q = (duration / sampling_time).max(0.0);
    let nearest = q.round();
    if (q - nearest).abs() < 1e-9 {
        nearest as usize
    } else {
        tracing::warn!(
            duration,
            sampling_time,
            steps = q.trunc(),
            "duration is not a whole number of samples, truncating"
        );
        q.trunc() as usize
    }
}

// ---------------------------------------------------------------------------
// Closed-loop simulator
// ---------------------------------------------------------------------------

/// Owns one controller, one plant and one table sink.
///
/// The plant output feeds the controller input and the controller output
/// drives the plant, so the channel counts must line up crosswise.
#[derive(Debug, Clone)]
pub struct Simulator<S> {
    controller: PidController,
    dynamics: RocketDynamics,
    sink: S,
}

impl<S: TableSink> Simulator<S> {
    pub fn new(controller: PidController, dynamics: RocketDynamics, sink: S) -> SimResult<Self> {
        if controller.n_inputs() != dynamics.n_outputs() {
            return Err(SimError::Dimension {
                what: "controller inputs vs plant outputs",
                expected: dynamics.n_outputs(),
                actual: controller.n_inputs(),
            });
        }
        if controller.n_outputs() != dynamics.n_inputs() {
            return Err(SimError::Dimension {
                what: "controller outputs vs plant inputs",
                expected: dynamics.n_inputs(),
                actual: controller.n_outputs(),
            });
        }
        if (controller.sampling_time() - dynamics.sampling_time()).abs() > 1e-12 {
            return Err(SimError::SamplingMismatch {
                controller: controller.sampling_time(),
                dynamics: dynamics.sampling_time(),
            });
        }
        Ok(Self { controller, dynamics, sink })
    }

    /// Run one closed-loop trajectory from the plant's current state.
    ///
    /// With `record` set, the state/output/input tables are returned in the
    /// summary and saved to the sink.
    pub fn simulate(&mut self, duration: f64, record: bool) -> SimResult<RunSummary> {
        check_duration(duration)?;
        let steps = step_count(duration, self.dynamics.sampling_time());

        let mut y = self.dynamics.observe();
        self.controller.init(&y, None, self.dynamics.time())?;
        let mut peak = y[0];

        let mut rec = record.then(|| {
            SimulationRecord::zeros(
                steps + 1,
                self.dynamics.n_states(),
                self.dynamics.n_outputs(),
                self.dynamics.n_inputs(),
            )
        });
        if let Some(r) = rec.as_mut() {
            let u0 = DVector::zeros(self.dynamics.n_inputs());
            r.set_row(0, self.dynamics.state(), self.dynamics.omega(), &y, &u0);
        }

        for k in 1..=steps {
            self.controller.step(self.dynamics.time(), &y, None)?;
            let u = self.controller.control_output().clone();
            y = self.dynamics.step(&u)?;
            peak = peak.max(y[0]);

            if let Some(r) = rec.as_mut() {
                r.set_row(k, self.dynamics.state(), self.dynamics.omega(), &y, &u);
            }

            if k % PROGRESS_INTERVAL == 0 {
                tracing::debug!(
                    step = k,
                    of = steps,
                    time = self.dynamics.time(),
                    altitude = y[0],
                    command = u[0],
                    "closed-loop progress"
                );
            }
        }

        if let Some(r) = &rec {
            r.save_to(&mut self.sink)?;
        }

        Ok(RunSummary {
            steps,
            peak,
            final_time: self.dynamics.time(),
            record: rec,
        })
    }

    /// Restore the plant (optionally offset) and clear all controller memory.
    pub(crate) fn reset_all(&mut self, offsets: Option<&DVector<f64>>) -> SimResult<()> {
        self.dynamics.reset_dynamics(offsets)?;
        self.controller.reset_controller();
        self.controller.reset_saturator();
        Ok(())
    }

    pub fn controller(&self) -> &PidController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PidController {
        &mut self.controller
    }

    pub fn dynamics(&self) -> &RocketDynamics {
        &self.dynamics
    }

    pub fn dynamics_mut(&mut self) -> &mut RocketDynamics {
        &mut self.dynamics
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
