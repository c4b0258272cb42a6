use rustphorus_engine::{Config, Error, Headless, Progress, Runtime, UnknownOpcodePolicy, Value};

const COUNTER: &str = include_str!("fixtures/counter.json");

fn load(json: &str, config: Config) -> Runtime {
  Runtime::from_reader(json.as_bytes(), config, Box::new(Headless)).unwrap()
}

/// Sweeps until nothing is left to do, returning the number of sweeps.
fn run_to_idle(runtime: &mut Runtime) -> usize {
  let mut sweeps = 0;
  while runtime.has_active_threads() {
    assert!(sweeps < 200, "project never went idle");
    let sweep = runtime.run_threads();
    assert_eq!(sweep.progress, Progress::Continue);
    sweeps += 1;
  }
  sweeps
}

#[test]
fn counter_project_runs_to_completion() {
  let mut runtime = load(COUNTER, Config::default());
  assert_eq!(runtime.green_flag(), 1);
  run_to_idle(&mut runtime);

  let shared = runtime.shared();
  assert_eq!(shared.global_variables, [Value::Number(3.)]);
  assert_eq!(shared.global_lists, [vec![Value::from("finished")]]);
  let cat = runtime.sprite_by_name("Cat").unwrap();
  assert_eq!((cat.state.x, cat.state.y), (30., 0.));
  assert!(runtime.diagnostics().is_empty());
}

#[test]
fn green_flag_restarts_from_scratch() {
  let mut runtime = load(COUNTER, Config::default());
  runtime.green_flag();
  for _ in 0..3 {
    runtime.run_threads();
  }
  runtime.green_flag();
  run_to_idle(&mut runtime);
  // The first run was cut short, but its partial work stays.
  let score = runtime.shared().global_variables[0].to_number().unwrap();
  assert!(score > 3.);
  assert_eq!(runtime.shared().global_lists[0].len(), 1);
}

#[test]
fn host_broadcasts_reach_receivers() {
  let mut runtime = load(COUNTER, Config::default());
  assert_eq!(runtime.broadcast("DONE"), 1);
  run_to_idle(&mut runtime);
  assert_eq!(runtime.shared().global_lists[0].len(), 1);
  assert_eq!(runtime.shared().global_variables, [Value::Number(0.)]);
}

const STOPPER: &str = r#"{"targets": [
  {"isStage": true, "name": "Stage"},
  {"isStage": false, "name": "Quitter", "blocks": {
    "flag": {"opcode": "event_whenflagclicked", "next": "stop", "parent": null,
             "inputs": {}, "fields": {}, "topLevel": true},
    "stop": {"opcode": "control_stop", "next": null, "parent": "flag",
             "inputs": {}, "fields": {"STOP_OPTION": ["all", null]},
             "topLevel": false, "mutation": {"tagName": "mutation",
             "children": [], "hasnext": "false"}},
    "drum": {"opcode": "music_playDrumForBeats", "next": null, "parent": null,
             "inputs": {}, "fields": {}, "topLevel": true}
  }}
]}"#;

#[test]
fn unknown_opcodes_are_refused_by_default() {
  let result = Runtime::from_reader(
    STOPPER.as_bytes(),
    Config::default(),
    Box::new(Headless),
  );
  assert!(matches!(
    result,
    Err(Error::UnknownOpcode { opcode, .. }) if opcode == "music_playDrumForBeats"
  ));
}

#[test]
fn stop_all_closes_the_project() {
  let config = Config {
    unknown_opcodes: UnknownOpcodePolicy::Ignore,
    ..Config::default()
  };
  let mut runtime = load(STOPPER, config);
  runtime.green_flag();
  let mut last = runtime.run_threads();
  for _ in 0..5 {
    if last.progress != Progress::Continue {
      break;
    }
    last = runtime.run_threads();
  }
  assert_eq!(last.progress, Progress::CloseProject);
  let quitter = runtime.sprite_by_name("Quitter").unwrap();
  assert_eq!(last.sprite, Some(quitter.id()));
}

#[test]
fn config_reads_partial_json() {
  let config: Config =
    serde_json::from_str(r#"{"frame_rate": 60, "seed": 9}"#).unwrap();
  assert_eq!(config.frame_rate, 60);
  assert_eq!(config.seed, Some(9));
  assert_eq!(config.max_clones, Config::default().max_clones);
}
