use nalgebra::{DMatrix, DVector};
use serde::Deserialize;

use crate::error::{check_len, SimError, SimResult};
use crate::io::TableSink;
use super::runner::Simulator;

// ---------------------------------------------------------------------------
// Initial-condition sweep
// ---------------------------------------------------------------------------

/// Square grid of relative offsets on two state components:
/// `offset = index * step` for `index` in `-span..=span`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RobustnessGrid {
    pub dims: [usize; 2],
    pub span: i32,
    pub step: f64,
    pub target: f64,
    pub duration: f64,
}

impl Default for RobustnessGrid {
    fn default() -> Self {
        Self {
            dims: [1, 3],
            span: 10,
            step: 0.01,
            target: 3500.0,
            duration: 20.0,
        }
    }
}

impl RobustnessGrid {
    pub fn side(&self) -> usize {
        if self.span < 0 {
            0
        } else {
            2 * self.span as usize + 1
        }
    }

    pub fn cells(&self) -> usize {
        self.side() * self.side()
    }
}

/// Row `k` of both tables belongs to grid cell `k`, ordered with the first
/// dimension's index outermost.
#[derive(Debug, Clone, PartialEq)]
pub struct RobustnessMap {
    /// `target - peak`, one column.
    pub deviations: DMatrix<f64>,
    /// Absolute state perturbation `init_state .* offsets`.
    pub state_offsets: DMatrix<f64>,
}

impl RobustnessMap {
    /// Largest `|deviation|` and its cell.
    pub fn worst(&self) -> Option<(usize, f64)> {
        self.deviations
            .column(0)
            .iter()
            .map(|d| d.abs())
            .enumerate()
            .fold(None, |acc, (k, d)| match acc {
                Some((_, w)) if w >= d => acc,
                _ => Some((k, d)),
            })
    }

    pub fn save_to<S: TableSink + ?Sized>(&self, sink: &mut S) -> SimResult<()> {
        sink.save("deviations", &self.deviations)?;
        sink.save("state_offsets", &self.state_offsets)
    }
}

impl<S: TableSink> Simulator<S> {
    /// [`robustness_with`](Self::robustness_with) over the default grid.
    pub fn robustness(&mut self, init_state: &DVector<f64>) -> SimResult<RobustnessMap> {
        self.robustness_with(init_state, &RobustnessGrid::default())
    }

    /// Re-run the closed loop from every perturbed initial state in `grid`
    /// and tabulate how far each peak misses the target.
    pub fn robustness_with(
        &mut self,
        init_state: &DVector<f64>,
        grid: &RobustnessGrid,
    ) -> SimResult<RobustnessMap> {
        let nx = self.dynamics().n_states();
        check_len("robustness initial state", nx, init_state.len())?;
        for &dim in &grid.dims {
            if dim >= nx {
                return Err(SimError::Dimension {
                    what: "robustness grid dimension",
                    expected: nx,
                    actual: dim,
                });
            }
        }
        if grid.dims[0] == grid.dims[1] {
            return Err(SimError::Dimension {
                what: "distinct robustness grid dimensions",
                expected: 2,
                actual: 1,
            });
        }

        let cells = grid.cells();
        let mut deviations = DMatrix::zeros(cells, 1);
        let mut state_offsets = DMatrix::zeros(cells, nx);
        tracing::info!(cells, dims = ?grid.dims, "starting robustness sweep");

        let mut k = 0;
        for i in -grid.span..=grid.span {
            for ii in -grid.span..=grid.span {
                let mut offsets = DVector::zeros(nx);
                offsets[grid.dims[0]] = i as f64 * grid.step;
                offsets[grid.dims[1]] = ii as f64 * grid.step;

                self.reset_all(Some(&offsets))?;
                let run = self.simulate(grid.duration, false)?;

                let deviation = grid.target - run.peak;
                deviations[(k, 0)] = deviation;
                let abs_offsets = init_state.component_mul(&offsets);
                state_offsets.row_mut(k).copy_from(&abs_offsets.transpose());

                tracing::debug!(cell = k + 1, of = cells, i, ii, deviation, "robustness cell");
                k += 1;
            }
        }

        let map = RobustnessMap { deviations, state_offsets };
        map.save_to(self.sink_mut())?;
        if let Some((cell, worst)) = map.worst() {
            tracing::info!(cell, worst, "robustness sweep finished");
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{RocketDynamics, StateLayout};
    use crate::gnc::PidController;
    use crate::io::MemorySink;

    fn init() -> DVector<f64> {
        DVector::from_vec(vec![171.9, 1098.5, 54.14, 332.26])
    }

    fn small_sim() -> Simulator<MemorySink> {
        let mut pid = PidController::new(2, 1, 0.05).unwrap();
        pid.set_proportional_gains(DVector::from_vec(vec![-3.0, -3.0])).unwrap();
        pid.set_derivative_gains(DVector::from_vec(vec![-7.0, -7.0])).unwrap();
        let sat = pid.saturator_mut();
        sat.set_lower_limit_at(0, 0.0).unwrap();
        sat.set_upper_limit_at(0, 0.05).unwrap();
        sat.set_lower_rate_limit_at(0, -0.05).unwrap();
        sat.set_upper_rate_limit_at(0, 0.05).unwrap();
        let plant = RocketDynamics::new(StateLayout::Planar, 1, 2, init(), 0.05, 5.5).unwrap();
        Simulator::new(pid, plant, MemorySink::new()).unwrap()
    }

    fn small_grid() -> RobustnessGrid {
        RobustnessGrid { span: 1, step: 0.05, duration: 1.0, ..RobustnessGrid::default() }
    }

    #[test]
    fn default_grid_has_441_cells() {
        assert_eq!(RobustnessGrid::default().cells(), 441);
    }

    #[test]
    fn tables_have_one_row_per_cell() {
        let mut sim = small_sim();
        let map = sim.robustness_with(&init(), &small_grid()).unwrap();
        assert_eq!(map.deviations.shape(), (9, 1));
        assert_eq!(map.state_offsets.shape(), (9, 4));
        assert_eq!(sim.sink().get("deviations"), Some(&map.deviations));
        assert_eq!(sim.sink().get("state_offsets"), Some(&map.state_offsets));
    }

    #[test]
    fn offsets_follow_grid_order() {
        let mut sim = small_sim();
        let map = sim.robustness_with(&init(), &small_grid()).unwrap();
        // Cell 0 is (i, ii) = (-1, -1); cell 5 is (0, 1)
        let first = map.state_offsets.row(0);
        assert!((first[1] + 1098.5 * 0.05).abs() < 1e-9);
        assert!((first[3] + 332.26 * 0.05).abs() < 1e-9);
        assert_eq!(first[0], 0.0);
        assert_eq!(first[2], 0.0);
        let sixth = map.state_offsets.row(5);
        assert_eq!(sixth[1], 0.0);
        assert!((sixth[3] - 332.26 * 0.05).abs() < 1e-9);
    }

    #[test]
    fn higher_start_lowers_deviation() {
        let mut sim = small_sim();
        let map = sim.robustness_with(&init(), &small_grid()).unwrap();
        // Cells 1 and 7 differ only in the altitude offset (-5% vs +5%)
        assert!(map.deviations[(7, 0)] < map.deviations[(1, 0)]);
    }

    #[test]
    fn centre_cell_matches_plain_run() {
        let mut sim = small_sim();
        let map = sim.robustness_with(&init(), &small_grid()).unwrap();
        sim.reset_all(None).unwrap();
        let run = sim.simulate(1.0, false).unwrap();
        assert!((map.deviations[(4, 0)] - (3500.0 - run.peak)).abs() < 1e-9);
    }

    #[test]
    fn worst_cell() {
        let map = RobustnessMap {
            deviations: DMatrix::from_column_slice(3, 1, &[1.0, -4.0, 2.0]),
            state_offsets: DMatrix::zeros(3, 1),
        };
        assert_eq!(map.worst(), Some((1, 4.0)));
    }

    #[test]
    fn dimension_errors() {
        let mut sim = small_sim();
        assert!(matches!(
            sim.robustness_with(&DVector::zeros(2), &small_grid()),
            Err(SimError::Dimension { .. })
        ));
        let grid = RobustnessGrid { dims: [1, 4], ..small_grid() };
        assert!(matches!(sim.robustness_with(&init(), &grid), Err(SimError::Dimension { .. })));
    }

    #[test]
    fn repeated_dimension_rejected() {
        let mut sim = small_sim();
        let grid = RobustnessGrid { dims: [1, 1], ..small_grid() };
        assert!(matches!(
            sim.robustness_with(&init(), &grid),
            Err(SimError::Dimension { what: "distinct robustness grid dimensions", .. })
        ));
        assert!(sim.sink().tables().is_empty());
    }
}
