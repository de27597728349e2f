//! Declaration order, keyword equivalence, and hook phases.

use cuke_lib::{Glue, HookPhase, StepDefinition};

use super::common::TestEnv;

fn patterns(steps: &[StepDefinition]) -> Vec<&str> {
  steps.iter().map(|s| s.pattern.as_str()).collect()
}

#[test]
fn steps_follow_file_then_statement_order() {
  let env = TestEnv::new();
  env.write_file(
    "features/f2.lua",
    "Given('S2a', function() end)\n",
  );
  env.write_file(
    "features/f1.lua",
    "Given('S1a', function() end)\nWhen('S1b', function() end)\n",
  );

  let glue = env.loader.load_glue(env.glue_dir(), Glue::new).unwrap();
  assert_eq!(patterns(&glue.step_definitions), vec!["S1a", "S1b", "S2a"]);
}

#[test]
fn nested_directories_sort_by_full_path() {
  let env = TestEnv::new();
  env.write_file("features/b.lua", "Given('b', function() end)\n");
  env.write_file("features/a/z.lua", "Given('a/z', function() end)\n");
  env.write_file("features/a/deeper/y.lua", "Given('a/deeper/y', function() end)\n");

  let glue = env.loader.load_glue(env.glue_dir(), Glue::new).unwrap();
  assert_eq!(patterns(&glue.step_definitions), vec!["a/deeper/y", "a/z", "b"]);
}

#[test]
fn every_step_keyword_registers_the_same_shape() {
  let env = TestEnv::new();
  env.write_file(
    "features/steps.lua",
    r#"local body = function() end
Given("p", body)
When("p", body)
Then("p", body)
And("p", body)
But("p", body)
"#,
  );

  let glue = env.loader.load_glue(env.glue_dir(), Glue::new).unwrap();
  let steps = &glue.step_definitions;
  assert_eq!(steps.len(), 5);
  for (i, step) in steps.iter().enumerate() {
    assert_eq!(step.pattern, "p");
    assert_eq!(step.body, steps[0].body);
    assert_eq!(step.location.line, i + 2);
    assert_eq!(step.location.column, 1);
  }
}

#[test]
fn step_bodies_are_callable_after_the_load() {
  let env = TestEnv::new();
  env.write_file(
    "features/steps.lua",
    "Given('I have {int} cukes', function(n) return n * 2 end)\n",
  );

  let glue = env.loader.load_glue(env.glue_dir(), Glue::new).unwrap();
  let doubled: i64 = glue.step_definitions[0].body.call(21).unwrap();
  assert_eq!(doubled, 42);
}

#[test]
fn hooks_keep_phase_and_order_independently_of_steps() {
  let env = TestEnv::new();
  env.write_file(
    "features/a.lua",
    r#"Before(function() return "b1" end)
Given("s1", function() end)
After(function() return "a1" end)
"#,
  );
  env.write_file(
    "features/b.lua",
    r#"When("s2", function() end)
After(function() return "a2" end)
Before(function() return "b2" end)
"#,
  );

  let glue = env.loader.load_glue(env.glue_dir(), Glue::new).unwrap();

  assert_eq!(patterns(&glue.step_definitions), vec!["s1", "s2"]);
  let hooks: Vec<(HookPhase, String)> = glue
    .hooks
    .iter()
    .map(|h| (h.phase, h.body.call::<String>(()).unwrap()))
    .collect();
  assert_eq!(
    hooks,
    vec![
      (HookPhase::Before, "b1".to_string()),
      (HookPhase::After, "a1".to_string()),
      (HookPhase::After, "a2".to_string()),
      (HookPhase::Before, "b2".to_string()),
    ]
  );
  assert_eq!(glue.before_hooks().count(), 2);
  assert_eq!(glue.after_hooks().count(), 2);
}

#[test]
fn registrations_inside_functions_and_loops_are_kept() {
  let env = TestEnv::new();
  env.write_file(
    "features/steps.lua",
    r#"local function define(word)
  Given("a " .. word, function() end)
end
for _, word in ipairs({ "red", "green", "blue" }) do
  define(word)
end
"#,
  );

  let glue = env.loader.load_glue(env.glue_dir(), Glue::new).unwrap();
  assert_eq!(patterns(&glue.step_definitions), vec!["a red", "a green", "a blue"]);
  for step in &glue.step_definitions {
    assert_eq!((step.location.line, step.location.column), (2, 3));
  }
}

#[test]
fn empty_directory_builds_from_empty_sequences() {
  let env = TestEnv::new();
  env.write_file("features/README.md", "no glue here");

  let (steps, hooks) = env
    .loader
    .load_glue(env.glue_dir(), |steps, hooks| (steps, hooks))
    .unwrap();
  assert!(steps.is_empty());
  assert!(hooks.is_empty());
}

#[test]
fn custom_pattern_limits_discovery() {
  let env = TestEnv::new();
  env.write_file("features/step_definitions/steps.lua", "Given('kept', function() end)\n");
  env.write_file("features/support/env.lua", "Given('ignored', function() end)\n");

  let loader = cuke_lib::GlueLoader::new(
    cuke_lib::LoaderConfig::default()
      .with_base_dir(env.root())
      .with_pattern("step_definitions/*.lua"),
  )
  .unwrap();
  let glue = loader.load_glue(env.glue_dir(), Glue::new).unwrap();
  assert_eq!(patterns(&glue.step_definitions), vec!["kept"]);
}

#[test]
fn support_file_pulled_in_with_dofile_is_not_run_again() {
  let env = TestEnv::new();
  env.write_file("features/a.lua", "dofile(__dir .. '/b.lua')\nGiven('from a', function() end)\n");
  env.write_file("features/b.lua", "Given('from b', function() end)\n");

  for _ in 0..2 {
    let glue = env.loader.load_glue(env.glue_dir(), Glue::new).unwrap();
    assert_eq!(patterns(&glue.step_definitions), vec!["from b", "from a"]);
  }
}
