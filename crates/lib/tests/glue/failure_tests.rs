//! Failure behavior of a load.

use cuke_lib::discover::DiscoveryError;
use cuke_lib::lua::locate::LocateError;
use cuke_lib::{Glue, GlueError, GlueLoader, LoaderConfig};
use tracing_test::traced_test;

use super::common::TestEnv;

#[test]
fn thrown_error_reaches_the_caller_and_globals_are_restored() {
  let env = TestEnv::new();
  env.loader.lua().load("After = 'host after'").exec().unwrap();
  env.write_file(
    "features/broken.lua",
    "Before(function() end)\nlocal t = nil\nprint(t.field)\n",
  );

  let err = env.loader.load_glue(env.glue_dir(), Glue::new).unwrap_err();

  match &err {
    GlueError::Execute { path, .. } => assert!(path.ends_with("broken.lua")),
    other => panic!("unexpected error: {other}"),
  }
  assert!(err.to_string().contains("broken.lua"), "{err}");
  assert_eq!(env.eval::<String>("return After"), "host after");
  assert!(env.eval::<bool>("return rawget(_G, 'Before') == nil"));
}

#[test]
fn later_files_are_not_executed_after_a_failure() {
  let env = TestEnv::new();
  env.write_file("features/a.lua", "error('first')\n");
  env.write_file("features/b.lua", "b_ran = true\n");

  assert!(env.loader.load_glue(env.glue_dir(), Glue::new).is_err());
  assert!(env.eval::<Option<bool>>("return b_ran").is_none());
}

#[test]
fn syntax_error_is_an_execution_error() {
  let env = TestEnv::new();
  env.write_file("features/bad.lua", "Given('unterminated', function()\n");

  let err = env.loader.load_glue(env.glue_dir(), Glue::new).unwrap_err();
  assert!(matches!(err, GlueError::Execute { .. }), "{err}");
  assert!(env.eval::<bool>("return rawget(_G, 'Given') == nil"));
}

#[test]
fn missing_root_is_a_discovery_error() {
  let env = TestEnv::new();
  let err = env
    .loader
    .load_glue(env.root().join("no-such-dir"), Glue::new)
    .unwrap_err();
  assert!(matches!(err, GlueError::Discovery(DiscoveryError::RootNotFound(_))), "{err}");
}

#[test]
fn invalid_pattern_is_a_discovery_error() {
  let env = TestEnv::new();
  let loader = GlueLoader::new(LoaderConfig::default().with_base_dir(env.root()).with_pattern("[*.lua")).unwrap();
  let err = loader.load_glue(env.glue_dir(), Glue::new).unwrap_err();
  assert!(matches!(err, GlueError::Discovery(DiscoveryError::Pattern { .. })), "{err}");
}

#[test]
fn keyword_called_through_pcall_fails_the_load() {
  let env = TestEnv::new();
  env.write_file(
    "features/steps.lua",
    "local ok = pcall(Given, 'indirect', function() end)\nWhen('direct', function() end)\n",
  );

  let err = env.loader.load_glue(env.glue_dir(), Glue::new).unwrap_err();
  assert!(
    matches!(
      err,
      GlueError::Location {
        source: LocateError::NotLuaCaller { .. },
        ..
      }
    ),
    "{err}"
  );
  assert!(env.eval::<bool>("return rawget(_G, 'When') == nil"));
}

#[test]
fn bad_arguments_fail_the_load() {
  let env = TestEnv::new();
  env.write_file("features/steps.lua", "Given(function() end)\n");

  let err = env.loader.load_glue(env.glue_dir(), Glue::new).unwrap_err();
  assert!(err.to_string().contains("step pattern must be a string"), "{err}");
}

#[test]
#[traced_test]
fn aliased_keyword_is_flagged() {
  let env = TestEnv::new();
  env.write_file("features/steps.lua", "local step = When\nstep('x', function() end)\n");

  env.loader.load_glue(env.glue_dir(), Glue::new).unwrap();
  assert!(logs_contain("no direct keyword call on this line"));
}

#[cfg(unix)]
#[test]
fn symlinked_glue_is_loaded_once_per_load() {
  let env = TestEnv::new();
  env.write_file("features/real/steps.lua", "Given('once', function() end)\n");
  std::os::unix::fs::symlink(env.root().join("features/real"), env.root().join("features/alias")).unwrap();

  let glue = env.loader.load_glue(env.glue_dir(), Glue::new).unwrap();
  assert_eq!(glue.step_definitions.len(), 1);
}
