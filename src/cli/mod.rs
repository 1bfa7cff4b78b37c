//! SW-017: CLI subcommands — init, validate, synth, plan, graph, schema, completions.

use crate::core::emitter::{self, OutputFormat, Template};
use crate::core::types::{PlanAction, ProvenanceEvent, StackConfig};
use crate::core::{compose, parser, planner, state};
use crate::provenance::eventlog;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "stackwright",
    version,
    about = "Compose Bitbucket Server infrastructure and emit a deployable template"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter stack.yaml
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate stack.yaml and the resulting resource graph
    Validate {
        /// Path to stack.yaml
        #[arg(short, long, env = "STACKWRIGHT_FILE", default_value = "stack.yaml")]
        file: PathBuf,
    },

    /// Emit the template, lock file and provenance events
    Synth {
        /// Path to stack.yaml
        #[arg(short, long, env = "STACKWRIGHT_FILE", default_value = "stack.yaml")]
        file: PathBuf,

        /// Output directory
        #[arg(short, long, env = "STACKWRIGHT_OUT", default_value = "out")]
        out: PathBuf,

        /// Template format (json, yaml)
        #[arg(long, default_value = "json")]
        format: OutputFormat,

        /// Print the template to stdout instead of writing artifacts
        #[arg(long)]
        stdout: bool,
    },

    /// Show what changed since the last synth
    Plan {
        /// Path to stack.yaml
        #[arg(short, long, env = "STACKWRIGHT_FILE", default_value = "stack.yaml")]
        file: PathBuf,

        /// Output directory holding the last lock file
        #[arg(short, long, env = "STACKWRIGHT_OUT", default_value = "out")]
        out: PathBuf,
    },

    /// Print resources in emission order with their dependencies
    Graph {
        /// Path to stack.yaml
        #[arg(short, long, env = "STACKWRIGHT_FILE", default_value = "stack.yaml")]
        file: PathBuf,
    },

    /// Print the JSON Schema of stack.yaml
    Schema,

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Synth {
            file,
            out,
            format,
            stdout,
        } => cmd_synth(&file, &out, format, stdout),
        Commands::Plan { file, out } => cmd_plan(&file, &out),
        Commands::Graph { file } => cmd_graph(&file),
        Commands::Schema => cmd_schema(),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "stackwright", &mut std::io::stdout());
            Ok(())
        }
    }
}

const STARTER_CONFIG: &str = r#"# Bitbucket Server stack
name: bitbucket

# small | medium | large | xlarge
computeSize: small

# small | medium | large
dbSize: small

# vm | container
deploymentStrategy: container

desiredCount: 1

# Build the application image from source instead of using `image`:
# pipelineRepo:
#   owner: my-org
#   repo: bitbucket-image
#   buildSpecPath: buildspec.yml
#   branch: master
"#;

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join("stack.yaml");
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }
    std::fs::create_dir_all(path)
        .map_err(|e| format!("cannot create {}: {}", path.display(), e))?;
    std::fs::write(&config_path, STARTER_CONFIG)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    println!("Initialized stack at {}", path.display());
    println!("  Created: {}", config_path.display());
    Ok(())
}

fn stack_name(config: &StackConfig) -> String {
    config
        .name
        .clone()
        .unwrap_or_else(|| parser::DEFAULT_STACK_NAME.to_string())
}

/// Compose, emit and render in one go.
fn synthesize(config: &StackConfig, format: OutputFormat) -> Result<(Template, String), String> {
    let graph = compose::compose(config).map_err(|e| e.to_string())?;
    let template = emitter::emit(&graph).map_err(|e| e.to_string())?;
    let rendered = template.render(format).map_err(|e| e.to_string())?;
    Ok((template, rendered))
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let config = parser::parse_config_file(file)?;
    let spec = match parser::validate_config(&config) {
        Ok(spec) => spec,
        Err(errors) => {
            for e in &errors {
                eprintln!("  ERROR: {}", e);
            }
            return Err(format!("{} validation error(s)", errors.len()));
        }
    };
    let graph = compose::compose_spec(&spec).map_err(|e| e.to_string())?;
    println!(
        "OK: {} ({} strategy, {} resources)",
        spec.name,
        spec.strategy,
        graph.len()
    );
    Ok(())
}

fn cmd_synth(file: &Path, out_dir: &Path, format: OutputFormat, to_stdout: bool) -> Result<(), String> {
    let config = parser::parse_config_file(file)?;

    if to_stdout {
        let (_, rendered) = synthesize(&config, format)?;
        print!("{}", rendered);
        return Ok(());
    }

    let stack = stack_name(&config);
    let run_id = eventlog::generate_run_id();
    eventlog::append_event(
        out_dir,
        ProvenanceEvent::SynthStarted {
            stack: stack.clone(),
            run_id: run_id.clone(),
            generator: format!("stackwright {}", env!("CARGO_PKG_VERSION")),
        },
    )?;

    let result = synthesize(&config, format).and_then(|(template, rendered)| {
        let template_path = state::write_template(out_dir, format, &rendered)?;
        let lock = state::new_lock(&stack, &template, &rendered)?;
        state::save_lock(out_dir, &lock)?;
        Ok((template_path, lock))
    });

    let (template_path, lock) = match result {
        Ok(done) => done,
        Err(e) => {
            eventlog::append_event(
                out_dir,
                ProvenanceEvent::SynthFailed {
                    stack,
                    run_id,
                    error: e.clone(),
                },
            )?;
            return Err(e);
        }
    };

    for (id, rl) in &lock.resources {
        eventlog::append_event(
            out_dir,
            ProvenanceEvent::ResourceEmitted {
                stack: stack.clone(),
                resource: id.clone(),
                resource_type: rl.resource_type.clone(),
                hash: rl.hash.clone(),
            },
        )?;
    }
    eventlog::append_event(
        out_dir,
        ProvenanceEvent::SynthCompleted {
            stack: stack.clone(),
            run_id,
            resources: lock.resources.len() as u32,
            template_hash: lock.template_hash.clone(),
        },
    )?;

    println!(
        "Synthesized {} ({} resources)",
        stack,
        lock.resources.len()
    );
    println!("  Template: {}", template_path.display());
    println!("  Lock:     {}", state::lock_file_path(out_dir).display());
    println!("  Hash:     {}", lock.template_hash);
    Ok(())
}

fn cmd_plan(file: &Path, out_dir: &Path) -> Result<(), String> {
    let config = parser::parse_config_file(file)?;
    let stack = stack_name(&config);
    let (template, _) = synthesize(&config, OutputFormat::Json)?;
    let lock = state::load_lock(out_dir)?;
    let plan = planner::plan(&stack, &template, lock.as_ref())?;

    println!("Planning: {} ({} resources)", plan.name, template.resources.len());
    println!();
    for change in &plan.changes {
        let symbol = match change.action {
            PlanAction::Create => "+",
            PlanAction::Update => "~",
            PlanAction::Destroy => "-",
            PlanAction::NoOp => " ",
        };
        println!("  {} {}", symbol, change.description);
    }
    println!();
    println!(
        "Plan: {} to add, {} to change, {} to destroy, {} unchanged.",
        plan.to_create, plan.to_update, plan.to_destroy, plan.unchanged
    );
    Ok(())
}

fn cmd_graph(file: &Path) -> Result<(), String> {
    let config = parser::parse_config_file(file)?;
    let graph = compose::compose(&config).map_err(|e| e.to_string())?;

    for (i, node) in graph.nodes_in_order().enumerate() {
        let deps: Vec<&str> = node.dependencies().into_iter().collect();
        if deps.is_empty() {
            println!("{:>2}. {} [{}]", i + 1, node.id, node.kind);
        } else {
            println!(
                "{:>2}. {} [{}] <- {}",
                i + 1,
                node.id,
                node.kind,
                deps.join(", ")
            );
        }
    }
    for name in graph.outputs().keys() {
        println!("    output {}", name);
    }
    Ok(())
}

fn cmd_schema() -> Result<(), String> {
    let schema = schemars::schema_for!(StackConfig);
    let json =
        serde_json::to_string_pretty(&schema).map_err(|e| format!("JSON serialize error: {}", e))?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, yaml: &str) -> PathBuf {
        let path = dir.join("stack.yaml");
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn test_sw017_cli_parses_synth() {
        let cli = Cli::try_parse_from([
            "stackwright", "synth", "-f", "s.yaml", "--format", "yaml", "-o", "build",
        ])
        .unwrap();
        match cli.command {
            Commands::Synth { file, out, format, stdout } => {
                assert_eq!(file, PathBuf::from("s.yaml"));
                assert_eq!(out, PathBuf::from("build"));
                assert_eq!(format, OutputFormat::Yaml);
                assert!(!stdout);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Cli::try_parse_from(["stackwright", "synth", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_sw017_file_and_out_read_from_env() {
        let cmd = Cli::command();
        for name in ["validate", "synth", "plan", "graph"] {
            let sub = cmd.find_subcommand(name).unwrap();
            let file = sub.get_arguments().find(|a| a.get_id() == "file").unwrap();
            assert_eq!(file.get_env(), Some(std::ffi::OsStr::new("STACKWRIGHT_FILE")));
        }
        let synth = cmd.find_subcommand("synth").unwrap();
        let out = synth.get_arguments().find(|a| a.get_id() == "out").unwrap();
        assert_eq!(out.get_env(), Some(std::ffi::OsStr::new("STACKWRIGHT_OUT")));
    }

    #[test]
    fn test_sw017_synth_switching_format_drops_old_template() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "computeSize: small\ndbSize: small\n");
        let out = dir.path().join("out");
        cmd_synth(&config, &out, OutputFormat::Json, false).unwrap();
        cmd_synth(&config, &out, OutputFormat::Yaml, false).unwrap();
        assert!(!out.join("template.json").exists());
        let rendered = std::fs::read_to_string(out.join("template.yaml")).unwrap();
        let lock = state::load_lock(&out).unwrap().unwrap();
        assert_eq!(
            lock.template_hash,
            crate::provenance::hasher::hash_string(&rendered)
        );
    }

    #[test]
    fn test_sw017_plan_rejects_foreign_lock() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let a = write_config(dir.path(), "name: alpha\ncomputeSize: small\ndbSize: small\n");
        cmd_synth(&a, &out, OutputFormat::Json, false).unwrap();
        let b = write_config(dir.path(), "name: beta\ncomputeSize: small\ndbSize: small\n");
        let err = cmd_plan(&b, &out).unwrap_err();
        assert!(err.contains("alpha"));
    }

    #[test]
    fn test_sw017_init() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("project");
        cmd_init(&sub).unwrap();
        let config = parser::parse_config_file(&sub.join("stack.yaml")).unwrap();
        assert!(parser::validate_config(&config).is_ok());
    }

    #[test]
    fn test_sw017_init_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stack.yaml"), "exists").unwrap();
        assert!(cmd_init(dir.path()).is_err());
    }

    #[test]
    fn test_sw017_validate() {
        let dir = tempfile::tempdir().unwrap();
        let ok = write_config(dir.path(), "computeSize: small\ndbSize: small\n");
        cmd_validate(&ok).unwrap();
        let bad = write_config(dir.path(), "computeSize: small\n");
        assert!(cmd_validate(&bad).unwrap_err().contains("1 validation error"));
    }

    #[test]
    fn test_sw017_synth_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "computeSize: small\ndbSize: small\n");
        let out = dir.path().join("out");
        cmd_synth(&config, &out, OutputFormat::Json, false).unwrap();

        let rendered = std::fs::read_to_string(out.join("template.json")).unwrap();
        let template: Template = serde_json::from_str(&rendered).unwrap();
        assert_eq!(template.resources.len(), 4);

        let lock = state::load_lock(&out).unwrap().unwrap();
        assert_eq!(
            lock.template_hash,
            crate::provenance::hasher::hash_string(&rendered)
        );

        let events = std::fs::read_to_string(eventlog::event_log_path(&out)).unwrap();
        let lines: Vec<&str> = events.lines().collect();
        // started + one per resource + completed
        assert_eq!(lines.len(), 6);
        assert!(lines[0].contains("synth_started"));
        assert!(lines[5].contains("synth_completed"));
    }

    #[test]
    fn test_sw017_synth_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "computeSize: medium\ndbSize: small\n");
        let out = dir.path().join("out");
        cmd_synth(&config, &out, OutputFormat::Yaml, false).unwrap();
        let first = std::fs::read_to_string(out.join("template.yaml")).unwrap();
        cmd_synth(&config, &out, OutputFormat::Yaml, false).unwrap();
        let second = std::fs::read_to_string(out.join("template.yaml")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sw017_synth_failure_logged() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "computeSize: small\n");
        let out = dir.path().join("out");
        let err = cmd_synth(&config, &out, OutputFormat::Json, false).unwrap_err();
        assert!(err.contains("dbSize"));
        assert!(!out.join("template.json").exists());
        let events = std::fs::read_to_string(eventlog::event_log_path(&out)).unwrap();
        assert!(events.contains("synth_failed"));
    }

    #[test]
    fn test_sw017_plan_after_synth() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "computeSize: small\ndbSize: small\n");
        let out = dir.path().join("out");
        cmd_plan(&config, &out).unwrap();
        cmd_synth(&config, &out, OutputFormat::Json, false).unwrap();
        cmd_plan(&config, &out).unwrap();
    }

    #[test]
    fn test_sw017_graph_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            "computeSize: small\ndbSize: small\ndeploymentStrategy: vm\n",
        );
        cmd_graph(&config).unwrap();
        cmd_schema().unwrap();
    }

    #[test]
    fn test_sw017_schema_mentions_fields() {
        let schema = schemars::schema_for!(StackConfig);
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("computeSize"));
        assert!(json.contains("pipelineRepo"));
    }
}
