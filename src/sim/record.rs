use nalgebra::{DMatrix, DVector};

use crate::error::SimResult;
use crate::io::TableSink;

// ---------------------------------------------------------------------------
// Time series of one recorded closed-loop run
// ---------------------------------------------------------------------------

/// One row per sample. `state` carries the actuator-rate proxy in its last
/// column.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRecord {
    pub state: DMatrix<f64>,
    pub output: DMatrix<f64>,
    pub input: DMatrix<f64>,
}

impl SimulationRecord {
    pub(crate) fn zeros(samples: usize, n_states: usize, n_outputs: usize, n_inputs: usize) -> Self {
        Self {
            state: DMatrix::zeros(samples, n_states + 1),
            output: DMatrix::zeros(samples, n_outputs),
            input: DMatrix::zeros(samples, n_inputs),
        }
    }

    pub(crate) fn set_row(
        &mut self,
        k: usize,
        state: &DVector<f64>,
        omega: f64,
        y: &DVector<f64>,
        u: &DVector<f64>,
    ) {
        let nx = state.len();
        self.state.view_mut((k, 0), (1, nx)).copy_from(&state.transpose());
        self.state[(k, nx)] = omega;
        self.output.row_mut(k).copy_from(&y.transpose());
        self.input.row_mut(k).copy_from(&u.transpose());
    }

    pub fn samples(&self) -> usize {
        self.state.nrows()
    }

    /// Column `j` of the state table as a time series.
    pub fn state_series(&self, j: usize) -> Vec<f64> {
        self.state.column(j).iter().copied().collect()
    }

    /// Column `j` of the output table as a time series.
    pub fn output_series(&self, j: usize) -> Vec<f64> {
        self.output.column(j).iter().copied().collect()
    }

    pub fn save_to<S: TableSink + ?Sized>(&self, sink: &mut S) -> SimResult<()> {
        sink.save("state", &self.state)?;
        sink.save("output", &self.output)?;
        sink.save("input", &self.input)
    }
}

/// Outcome of [`Simulator::simulate`](super::Simulator::simulate).
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub steps: usize,
    /// Maximum of output channel 0, including the initial observation.
    pub peak: f64,
    pub final_time: f64,
    pub record: Option<SimulationRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemorySink;

    #[test]
    fn rows_land_in_place() {
        let mut rec = SimulationRecord::zeros(3, 2, 1, 1);
        let s = DVector::from_vec(vec![10.0, 20.0]);
        rec.set_row(1, &s, 0.5, &DVector::from_element(1, 9.0), &DVector::from_element(1, 0.01));
        assert_eq!(rec.state.row(1).iter().copied().collect::<Vec<_>>(), vec![10.0, 20.0, 0.5]);
        assert_eq!(rec.output[(1, 0)], 9.0);
        assert_eq!(rec.input[(1, 0)], 0.01);
        assert_eq!(rec.state_series(0), vec![0.0, 10.0, 0.0]);
    }

    #[test]
    fn saves_three_named_tables() {
        let rec = SimulationRecord::zeros(5, 4, 2, 1);
        let mut sink = MemorySink::new();
        rec.save_to(&mut sink).unwrap();
        assert_eq!(sink.get("state").unwrap().shape(), (5, 5));
        assert_eq!(sink.get("output").unwrap().shape(), (5, 2));
        assert_eq!(sink.get("input").unwrap().shape(), (5, 1));
    }
}
