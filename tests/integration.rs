use std::{env, fs, path::PathBuf, process::Command};

const CONFIG: &str = r#"
[growth]
initial_population = 100
growth_rate = 0.05
years = 20

[pva]
initial_population = 50
growth_rate = 0.01
environmental_variance = 0.3
carrying_capacity = 400
years = 40
simulations = 200

[pva_options]
seed = 42
quasi_extinction_threshold = 20.0

[metapopulation]
patch_populations = [ 100.0, 20.0,]
patch_capacities = [ 150.0, 60.0,]
growth_rates = [ 0.2, 0.1,]
migration_matrix = [ [ 0.0, 0.1,], [ 0.05, 0.0,],]
years = 10

[effective_population]
breeding_males = 25
breeding_females = 30

[bottleneck]
sizes = [ 1000.0, 900.0, 50.0, 100.0, 200.0, 400.0,]

[allelic_richness]
allele_counts = [ 5, 8,]
sample_sizes = [ 20, 40,]

[hardy_weinberg]
genotypes = [
    { alleles = [ "A", "A",], count = 36 },
    { alleles = [ "A", "B",], count = 48 },
    { alleles = [ "B", "B",], count = 16 },
]
"#;

fn run_bin(args: &[&str]) -> String {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_viable"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

    assert!(
        output.status.success(),
        "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
    );

    stdout_str.to_string()
}

fn parse(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).expect("failed to parse report")
}

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    fs::write(&config_path, CONFIG).expect("failed to write config file");
    let config = config_path
        .to_str()
        .expect("failed to convert config path to string");

    let growth = parse(&run_bin(&["--config", config, "growth"]));
    let final_pop = growth["growth"]["projection"]["population"][20]
        .as_f64()
        .expect("missing final population");
    assert!((final_pop - 271.828).abs() < 0.01);

    let pva_a = parse(&run_bin(&["--config", config, "pva"]));
    let pva_b = parse(&run_bin(&["--config", config, "pva", "--sequential"]));
    assert_eq!(pva_a, pva_b);
    let prob = pva_a["pva"]["extinction_probability"]
        .as_f64()
        .expect("missing extinction probability");
    assert!((0.0..=1.0).contains(&prob));

    let traj_file = test_dir.join("trajectories.msgpack");
    let traj_file_str = traj_file
        .to_str()
        .expect("failed to convert trajectory path to string");
    let pva_c = parse(&run_bin(&[
        "--config",
        config,
        "pva",
        "--seed",
        "7",
        "--trajectory-file",
        traj_file_str,
    ]));
    assert!(traj_file.exists());
    assert!(pva_c["pva"]["percentile_bands"].is_object());

    let meta = parse(&run_bin(&["--config", config, "metapopulation"]));
    assert_eq!(meta["metapopulation"]["total_population"][0], 120.0);

    let genetics = parse(&run_bin(&["--config", config, "--decimals", "2", "genetics"]));
    assert_eq!(
        genetics["genetics"]["effective_population"]["effective_population_size"],
        54.55
    );
    assert_eq!(genetics["genetics"]["bottleneck"]["severity"], "Severe");
    assert!(genetics["genetics"].get("inbreeding").is_none());
    assert_eq!(genetics["genetics"]["hardy_weinberg"]["in_equilibrium"], true);

    let report_path = test_dir.join("report.json");
    let report_str = report_path
        .to_str()
        .expect("failed to convert report path to string");
    run_bin(&["--config", config, "--output", report_str, "all"]);
    let report = parse(&fs::read_to_string(&report_path).expect("failed to read report"));
    for key in ["growth", "pva", "metapopulation", "genetics"] {
        assert!(report.get(key).is_some(), "report is missing {key}");
    }

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_config_fails() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("invalid_config");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[metapopulation]\n"
        + "patch_populations = [ 100.0, 20.0,]\n"
        + "patch_capacities = [ 150.0,]\n"
        + "growth_rates = [ 0.2, 0.1,]\n"
        + "migration_matrix = [ [ 0.0, 0.1,], [ 0.05, 0.0,],]\n"
        + "years = 10\n";
    fs::write(&config_path, config_contents).expect("failed to write config file");

    let output = Command::new(env!("CARGO_BIN_EXE_viable"))
        .args(["--config", config_path.to_str().unwrap(), "metapopulation"])
        .output()
        .expect("failed to execute command");
    assert!(!output.status.success());

    fs::remove_dir_all(&test_dir).ok();
}
