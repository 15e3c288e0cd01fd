use anyhow::Context;
use eframe::egui;
use egui_plot::{Legend, Line, Plot};

use airbrake_sim::config::AirbrakeConfig;
use airbrake_sim::gnc::PolynomialReference;
use airbrake_sim::io::MemorySink;
use airbrake_sim::sim::SimulationRecord;

fn main() -> eframe::Result {
    let config = match std::env::args().nth(1) {
        Some(path) => AirbrakeConfig::from_file(&path).unwrap_or_else(|e| {
            eprintln!("Falling back to defaults, could not load {path}: {e}");
            AirbrakeConfig::default()
        }),
        None => AirbrakeConfig::default(),
    };

    let app = match run(&config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Simulation failed: {e}");
            std::process::exit(1);
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1200.0, 800.0]),
        ..Default::default()
    };
    eframe::run_native("Airbrake Controller", options, Box::new(|_| Ok(Box::new(app))))
}

fn run(config: &AirbrakeConfig) -> anyhow::Result<AirbrakeViz> {
    let mut sim = config.build_simulator(MemorySink::new())?;
    let t0 = sim.dynamics().time();
    let dt = sim.dynamics().sampling_time();
    let layout = sim.dynamics().layout();
    let summary = sim.simulate(config.duration, true)?;

    let reference = PolynomialReference::from_rows(&config.controller.reference)?;
    let record = summary.record.context("run was not recorded")?;

    Ok(AirbrakeViz {
        times: (0..record.samples()).map(|k| t0 + k as f64 * dt).collect(),
        altitude: record.state_series(layout.altitude_index()),
        velocity: record.state_series(layout.vertical_velocity_index()),
        command: record.input.column(0).iter().copied().collect(),
        reference,
        apogee: summary.peak,
        record,
    })
}

struct AirbrakeViz {
    times: Vec<f64>,
    altitude: Vec<f64>,
    velocity: Vec<f64>,
    command: Vec<f64>,
    reference: PolynomialReference,
    apogee: f64,
    record: SimulationRecord,
}

impl AirbrakeViz {
    fn series(&self, ys: &[f64]) -> Vec<[f64; 2]> {
        self.times.iter().zip(ys).map(|(&t, &y)| [t, y]).collect()
    }

    fn reference_series(&self, channel: usize) -> Vec<[f64; 2]> {
        if channel >= self.reference.channels() {
            return Vec::new();
        }
        self.times
            .iter()
            .map(|&t| [t, self.reference.evaluate(t)[channel]])
            .collect()
    }
}

impl eframe::App for AirbrakeViz {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.heading("Airbrake apogee control");
            let omega_col = self.record.state.ncols() - 1;
            let max_rate = self
                .record
                .state
                .column(omega_col)
                .iter()
                .fold(0.0_f64, |m, w| m.max(w.abs()));
            ui.label(format!(
                "Apogee: {:.1} m  |  Samples: {}  |  Peak actuator rate proxy: {:.2}",
                self.apogee,
                self.record.samples(),
                max_rate,
            ));
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_size();
            let half_w = available.x / 2.0 - 8.0;
            let half_h = available.y / 2.0 - 8.0;

            ui.horizontal(|ui| {
                ui.vertical(|ui| {
                    ui.label("Altitude (m)");
                    Plot::new("altitude")
                        .width(half_w)
                        .height(half_h)
                        .legend(Legend::default())
                        .x_axis_label("Time (s)")
                        .show(ui, |plot_ui| {
                            plot_ui.line(Line::new("Altitude", self.series(&self.altitude)));
                            plot_ui.line(Line::new("Reference", self.reference_series(0)));
                        });
                });

                ui.vertical(|ui| {
                    ui.label("Vertical velocity (m/s)");
                    Plot::new("velocity")
                        .width(half_w)
                        .height(half_h)
                        .legend(Legend::default())
                        .x_axis_label("Time (s)")
                        .show(ui, |plot_ui| {
                            plot_ui.line(Line::new("Vy", self.series(&self.velocity)));
                            plot_ui.line(Line::new("Reference", self.reference_series(1)));
                        });
                });
            });

            ui.vertical(|ui| {
                ui.label("Airbrake command");
                Plot::new("command")
                    .width(available.x)
                    .height(half_h)
                    .x_axis_label("Time (s)")
                    .show(ui, |plot_ui| {
                        plot_ui.line(Line::new("u", self.series(&self.command)));
                    });
            });
        });
    }
}
