use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use icethermo::io::config::RunConfig;
use icethermo::io::read_solution;
use icethermo::sim::thermo::{
    AirProperties, FluidScalars, FluxBalanceModel, ImportRange, ImportedSurface, Strategy,
    SurfaceCoefficients, SurfaceMesh, SurfaceSide, ThermoConfig, ThermoSolution,
    WaterProperties, solve_surface,
};
use icethermo::vecutils;

/// Uniform 50-node surface with constant collection efficiency.
fn uniform_surface(n: usize, beta: f64) -> ImportedSurface {
    let fluid = FluidScalars::default();
    let air = AirProperties::default();
    let mesh = SurfaceMesh::uniform(0.0, 0.4, n, fluid.chord).unwrap();
    let coefficients = SurfaceCoefficients::uniform(
        n,
        beta,
        10.0,
        500.0,
        fluid.temperature_c(),
        fluid.velocity,
        fluid.pressure,
        fluid.recovery_temperature_c(&air),
    );
    ImportedSurface {
        side: SurfaceSide::Upper,
        mesh,
        coefficients,
        range: ImportRange {
            first: 0,
            last: n - 1,
        },
        stagnation: 0.0,
    }
}

fn dry_config() -> ThermoConfig {
    let mut config = ThermoConfig::new();
    config.num_points = 50;
    config.evaporation = false;
    config
}

fn solve(surface: &ImportedSurface, config: &ThermoConfig) -> ThermoSolution {
    solve_surface(
        surface,
        &FluidScalars::default(),
        &WaterProperties::default(),
        &AirProperties::default(),
        config,
    )
    .unwrap()
}

#[test]
fn test_rime_scenario() {
    let fluid = FluidScalars::default();
    assert_eq!(fluid.liquid_water_content, 5.5e-4);
    assert_eq!(fluid.velocity, 100.0);

    let sol = solve(&uniform_surface(50, 1e-3), &dry_config());
    assert!(sol.is_converged(), "{:?}", sol.status);
    assert_eq!(sol.state.film_height[0], 0.0);
    for i in 1..49 {
        assert!(sol.state.ice_rate[i] > 0.0, "node {i}: {}", sol.state.ice_rate[i]);
        assert!(sol.state.temperature[i] < 0.0);
    }
    assert!(sol.state.is_finite());
    assert_eq!(sol.record.len(), sol.status.iterations());
}

#[test]
fn test_zero_impingement() {
    let sol = solve(&uniform_surface(50, 0.0), &dry_config());
    assert!(sol.is_converged());
    for i in 1..49 {
        assert_eq!(sol.state.film_height[i], 0.0, "node {i}");
        assert_eq!(sol.state.ice_rate[i], 0.0, "node {i}");
    }
}

#[test]
fn test_residuals_at_convergence() {
    let surface = uniform_surface(50, 1e-3);
    let config = dry_config();
    let sol = solve(&surface, &config);
    assert!(sol.is_converged());

    let fluid = FluidScalars::default();
    let air = AirProperties::default();
    let model = FluxBalanceModel::new(
        &surface.mesh,
        &surface.coefficients,
        &fluid,
        &WaterProperties::default(),
        &air,
        &config,
    )
    .unwrap();
    let s = &sol.state;
    let mass = model.mass_residual(&s.film_height, &s.ice_rate, &s.evaporation);
    let energy = model.energy_residual(&s.film_height, &s.temperature, &s.ice_rate);
    // Scale of the convective source term.
    let scale = 500.0 * fluid.recovery_temperature_c(&air).abs();
    assert!(vecutils::max_abs(&mass[1..49]) < 1e-12);
    assert!(vecutils::max_abs(&energy[1..49]) < 1e-3 * scale);
}

#[test]
fn test_repeated_solves_are_identical() {
    let mut config = dry_config();
    config.evaporation = true;
    let surface = uniform_surface(50, 5e-3);
    let a = solve(&surface, &config);
    let b = solve(&surface, &config);
    assert_eq!(a.state, b.state);
    assert_eq!(a.record, b.record);
    assert_eq!(a.status, b.status);
}

#[test]
fn test_mirror_is_involutive() {
    let sol = solve(&uniform_surface(50, 1e-3), &dry_config());
    let back = sol.mirrored().mirrored();
    assert_eq!(back.mesh, sol.mesh);
    assert_eq!(back.state, sol.state);
    assert_eq!(back.coefficients, sol.coefficients);
}

#[test]
fn test_newton_krylov_energy_matches_explicit() {
    let surface = uniform_surface(50, 1e-3);
    let explicit = solve(&surface, &dry_config());
    let mut config = dry_config();
    config.energy_strategy = Strategy::NewtonKrylov;
    let nk = solve(&surface, &config);
    assert!(nk.is_converged());
    for i in 1..49 {
        let (a, b) = (explicit.state.temperature[i], nk.state.temperature[i]);
        assert!((a - b).abs() < 1e-2, "node {i}: {a} vs {b}");
        assert!(nk.state.ice_rate[i] > 0.0);
    }
}

#[test]
fn test_marching_keeps_phases_compatible() {
    let mut config = dry_config();
    config.evaporation = true;
    config.mass_strategy = Strategy::Marching;
    config.energy_strategy = Strategy::Marching;
    let sol = solve(&uniform_surface(50, 0.5), &config);
    assert!(sol.is_converged(), "{:?}", sol.status);
    let s = &sol.state;
    assert!(s.outflow.is_some());
    for i in 0..s.len() {
        assert!(s.film_height[i] * s.temperature[i] >= -1e-8, "cold water at {i}");
        assert!(s.temperature[i] * s.ice_rate[i] <= 1e-8, "warm ice at {i}");
    }
}

fn write_inputs(dir: &Path) {
    let s = vecutils::linspace(-1.0, 1.0, 401);
    let mut table = String::new();
    for &x in &s {
        let ue = 100.0 * (5.0 * x.abs()).min(1.0);
        writeln!(
            table,
            "{x:.6e} {:.6e} {:.6e} {:.6e} {:.6e} {ue:.6e}",
            400.0,
            0.005 * x,
            263.15,
            101_325.0
        )
        .unwrap();
    }
    fs::write(dir.join("chcf.dat"), table).unwrap();

    let mut beta = String::new();
    for &x in &vecutils::linspace(-0.3, 0.3, 61) {
        writeln!(beta, "{x:.6},{:.6}", 0.02 * (1.0 - x.abs() / 0.3)).unwrap();
    }
    fs::write(dir.join("beta.dat"), beta).unwrap();
}

#[test]
fn test_run_writes_both_sides() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let mut thermo = ThermoConfig::new();
    thermo.num_points = 60;
    let config = RunConfig {
        thermo,
        fluid: FluidScalars::default(),
        water: WaterProperties::default(),
        air: AirProperties::default(),
        surface_table: dir.path().join("chcf.dat"),
        collection_efficiency: dir.path().join("beta.dat"),
        stagnation_arc_length: 0.0,
        sides: vec![SurfaceSide::Upper, SurfaceSide::Lower],
        output_dir: dir.path().join("out"),
    };

    let outputs = icethermo::run(&config).unwrap();
    assert_eq!(outputs.len(), 2);
    assert!(outputs[0].path.ends_with("THERMO_SOLN_UPPER.out"));
    assert!(outputs[1].path.ends_with("THERMO_SOLN_LOWER.out"));

    for out in &outputs {
        let table = read_solution(&out.path).unwrap();
        let sol = &out.solution;
        assert_eq!(table.len(), 60);
        assert_eq!(table.recovery_temperature.as_ref().map(Vec::len), Some(60));
        assert!(sol.state.is_finite());
        for i in 0..60 {
            assert!((table.arc_length[i] - sol.mesh.coordinates()[i]).abs() < 1e-6);
            assert!((table.temperature[i] - sol.state.temperature[i]).abs() < 1e-6);
            assert!((table.ice_rate[i] - sol.state.ice_rate[i]).abs() < 1e-6);
        }
    }
    // Lower side coordinates run from the far end up to the stagnation point.
    let lower = &outputs[1].solution;
    assert!(lower.mesh.coordinates()[0] < -0.39);
    assert!(lower.mesh.coordinates()[59].abs() < 1e-9);
}

#[test]
fn test_run_fails_on_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig {
        thermo: ThermoConfig::new(),
        fluid: FluidScalars::default(),
        water: WaterProperties::default(),
        air: AirProperties::default(),
        surface_table: dir.path().join("missing.dat"),
        collection_efficiency: dir.path().join("beta.dat"),
        stagnation_arc_length: 0.0,
        sides: vec![SurfaceSide::Upper],
        output_dir: dir.path().to_path_buf(),
    };
    assert!(icethermo::run(&config).is_err());
}
