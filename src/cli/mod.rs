//! Command-line interface for docflow.
//!
//! Provides commands for generating requirements, architecture and review
//! documents, listing generated artifacts and inspecting the bundled
//! workflows and configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::adapters::{AnthropicInvoker, CapabilityInvoker, EchoInvoker, FabricInvoker};
use crate::config::{self, Backend, CapabilitySettings, ResolvedConfig};
use crate::core::{ArtifactWriter, Condition, Executor, Orchestrator, Workflow};
use crate::domain::{RunContext, RunStatus};
use crate::workflows::{
    architecture, code_review, generate, implementation_cycle, Catalog, GenerationRequest,
    GenerationResult, Scope, KEY_CONTEXT, KEY_SUBJECT,
};

/// docflow - Nested workflow engine for product documents
#[derive(Parser, Debug)]
#[command(name = "docflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Text generation backend (overrides config; `echo` is a dry run)
    #[arg(long, value_enum, global = true)]
    pub backend: Option<BackendArg>,

    /// Directory for generated artifacts (overrides config)
    #[arg(long, global = true, env = "DOCFLOW_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a PRD, architecture and implementation ticket
    Generate {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Generate only the requirements document
    Discover {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Generate architecture and a ticket from an existing PRD
    Architect {
        /// Product or feature name
        name: String,

        /// PRD file to design from
        #[arg(long)]
        prd_file: PathBuf,
    },

    /// Review code, optionally against an architecture document
    Review {
        /// Product or feature name
        name: String,

        /// File containing the code to review
        #[arg(long)]
        code_file: PathBuf,

        /// Architecture document to review against
        #[arg(long)]
        architecture_file: Option<PathBuf>,
    },

    /// Implement from a design, revising until code and security reviews approve
    Implement {
        /// Product or feature name
        name: String,

        /// What to implement
        #[arg(short, long)]
        task: String,

        /// Architecture document or ticket to implement
        #[arg(long)]
        architecture_file: PathBuf,
    },

    /// List generated artifacts
    Artifacts {
        /// Only artifacts with this prefix (prd, ticket, research, review, implementation)
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Show the bundled workflow definitions
    Workflows,

    /// Show resolved configuration (debug)
    Config,
}

/// What to generate documents for
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Product or feature name
    pub name: String,

    /// What should be built
    #[arg(short, long)]
    pub context: String,

    /// Intended users
    #[arg(short, long)]
    pub audience: Option<String>,

    /// Original free-form request
    #[arg(long)]
    pub prompt: Option<String>,

    /// Scope (derived from the analysis if not specified)
    #[arg(short, long, value_enum)]
    pub scope: Option<ScopeArg>,

    /// Run market research (new products only)
    #[arg(long)]
    pub research: bool,

    /// Run competitor analysis (new products only)
    #[arg(long)]
    pub competitors: bool,
}

impl From<RequestArgs> for GenerationRequest {
    fn from(args: RequestArgs) -> Self {
        Self {
            subject_name: args.name,
            context_description: args.context,
            audience: args.audience,
            user_prompt: args.prompt,
            scope: args.scope.map(Scope::from),
            enable_research: args.research,
            enable_competitor_analysis: args.competitors,
        }
    }
}

/// Scope for CLI (maps to Scope)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ScopeArg {
    /// New product built from scratch
    Product,

    /// Feature of an existing product
    Feature,
}

impl From<ScopeArg> for Scope {
    fn from(s: ScopeArg) -> Self {
        match s {
            ScopeArg::Product => Scope::Product,
            ScopeArg::Feature => Scope::Feature,
        }
    }
}

/// Backend for CLI (maps to Backend)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BackendArg {
    /// Fabric CLI
    Fabric,

    /// Anthropic Messages API
    Anthropic,

    /// Offline echo
    Echo,
}

impl From<BackendArg> for Backend {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Fabric => Backend::Fabric,
            BackendArg::Anthropic => Backend::Anthropic,
            BackendArg::Echo => Backend::Echo,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let settings = Settings {
            backend: self.backend.map(Backend::from),
            output_dir: self.output_dir,
            json: self.json,
        };

        match self.command {
            Commands::Generate { request } => {
                let catalog = Catalog::build()?;
                run_request(&settings, &catalog.software_development, request.into()).await
            }
            Commands::Discover { request } => {
                let catalog = Catalog::build()?;
                run_request(&settings, &catalog.discovery, request.into()).await
            }
            Commands::Architect { name, prd_file } => {
                architect(&settings, &name, &prd_file).await
            }
            Commands::Review {
                name,
                code_file,
                architecture_file,
            } => {
                review(&settings, &name, &code_file, architecture_file.as_deref()).await
            }
            Commands::Implement {
                name,
                task,
                architecture_file,
            } => {
                implement(&settings, &name, &task, &architecture_file).await
            }
            Commands::Artifacts { prefix } => {
                list_artifacts(&settings, prefix.as_deref())
            }
            Commands::Workflows => {
                show_workflows()
            }
            Commands::Config => {
                show_config()
            }
        }
    }
}

/// Flags shared by every command
#[derive(Debug)]
struct Settings {
    backend: Option<Backend>,
    output_dir: Option<PathBuf>,
    json: bool,
}

impl Settings {
    fn output_dir(&self, cfg: &ResolvedConfig) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| cfg.output_dir.clone())
    }

    fn orchestrator(&self) -> Result<Orchestrator> {
        let cfg = config::config()?;
        let backend = self.backend.unwrap_or(cfg.capability.backend);

        let writer =
            ArtifactWriter::new(self.output_dir(cfg)).with_collision_policy(cfg.collision);

        Ok(Orchestrator::new(
            build_invoker(backend, &cfg.capability)?,
            writer,
        ))
    }
}

/// Build the configured capability invoker
fn build_invoker(
    backend: Backend,
    capability: &CapabilitySettings,
) -> Result<Arc<dyn CapabilityInvoker>> {
    let invoker: Arc<dyn CapabilityInvoker> = match backend {
        Backend::Fabric => {
            let fabric = match &capability.fabric_binary {
                Some(binary) => FabricInvoker::with_binary_path(binary, capability.timeout),
                None => FabricInvoker::new(capability.timeout),
            };
            Arc::new(fabric.with_patterns(capability.roles.clone()))
        }
        Backend::Anthropic => {
            let mut anthropic =
                AnthropicInvoker::new(capability.api_key()?, &capability.model, capability.timeout)
                    .with_max_tokens(capability.max_tokens)
                    .with_instructions(capability.roles.clone());
            if let Some(base_url) = &capability.base_url {
                anthropic = anthropic.with_base_url(base_url);
            }
            Arc::new(anthropic)
        }
        Backend::Echo => Arc::new(EchoInvoker::new()),
    };

    Ok(invoker)
}

/// Run a request-driven workflow
async fn run_request(
    settings: &Settings,
    workflow: &Workflow,
    request: GenerationRequest,
) -> Result<()> {
    let orchestrator = settings.orchestrator()?;
    let result = generate(&orchestrator, workflow, &request).await;
    print_result(settings, &result)
}

/// Design from an existing PRD
async fn architect(settings: &Settings, name: &str, prd_file: &Path) -> Result<()> {
    let prd = read_input(prd_file)?;

    let mut params = RunContext::new();
    params.set(KEY_SUBJECT, name);
    params.set(architecture::KEY_PRD_INPUT, prd);

    let catalog = Catalog::build()?;
    let orchestrator = settings.orchestrator()?;
    let result: GenerationResult = match orchestrator.run(&catalog.architecture, params).await {
        Ok(report) => report.into(),
        Err(err) => err.into(),
    };
    print_result(settings, &result)
}

/// Review a code file
async fn review(
    settings: &Settings,
    name: &str,
    code_file: &Path,
    architecture_file: Option<&Path>,
) -> Result<()> {
    let mut params = RunContext::new();
    params.set(KEY_SUBJECT, name);
    params.set(code_review::KEY_CODE, read_input(code_file)?);
    if let Some(path) = architecture_file {
        params.set(code_review::KEY_ARCHITECTURE, read_input(path)?);
    }

    let catalog = Catalog::build()?;
    let orchestrator = settings.orchestrator()?;
    let result: GenerationResult = match orchestrator.run(&catalog.code_review, params).await {
        Ok(report) => {
            if let Ok(status) = report.context.get_text(code_review::KEY_STATUS) {
                eprintln!("Review status: {}", status);
            }
            report.into()
        }
        Err(err) => err.into(),
    };
    print_result(settings, &result)
}

/// Run the implementation cycle against a design document
async fn implement(
    settings: &Settings,
    name: &str,
    task: &str,
    architecture_file: &Path,
) -> Result<()> {
    let mut params = RunContext::new();
    params.set(KEY_SUBJECT, name);
    params.set(KEY_CONTEXT, task);
    params.set(
        implementation_cycle::KEY_ARCHITECTURE,
        read_input(architecture_file)?,
    );

    let catalog = Catalog::build()?;
    let orchestrator = settings.orchestrator()?;
    let result: GenerationResult =
        match orchestrator.run(&catalog.implementation_cycle, params).await {
            Ok(report) => {
                let ctx = &report.context;
                if let (Ok(status), Ok(iterations)) = (
                    ctx.get_text(implementation_cycle::KEY_STATUS),
                    ctx.get_text(implementation_cycle::KEY_ITERATIONS),
                ) {
                    eprintln!("Implementation status: {} after {} pass(es)", status, iterations);
                }
                report.into()
            }
            Err(err) => err.into(),
        };
    print_result(settings, &result)
}

fn read_input(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    if content.trim().is_empty() {
        anyhow::bail!("Input file is empty: {}", path.display());
    }
    Ok(content)
}

/// Print a generation result; failures exit non-zero
fn print_result(settings: &Settings, result: &GenerationResult) -> Result<()> {
    if settings.json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        for path in &result.generated_artifact_paths {
            println!("{}", path.display());
        }
    }

    match &result.status {
        RunStatus::Completed => {
            eprintln!(
                "\n[Run completed: {} artifact(s) written]",
                result.generated_artifact_paths.len()
            );
            Ok(())
        }
        RunStatus::Failed { step, error } => {
            eprintln!("\n[Run failed at step '{}': {}]", step, error);
            std::process::exit(1);
        }
    }
}

/// List artifacts in the output directory
fn list_artifacts(settings: &Settings, prefix: Option<&str>) -> Result<()> {
    let cfg = config::config()?;
    let writer = ArtifactWriter::new(settings.output_dir(cfg));
    let paths = writer.discover(prefix)?;

    if settings.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    if paths.is_empty() {
        println!("No artifacts found in {}", writer.output_dir().display());
        return Ok(());
    }

    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        println!("{}", name);
    }

    Ok(())
}

/// Print every bundled workflow with its steps
fn show_workflows() -> Result<()> {
    let catalog = Catalog::build()?;

    for workflow in catalog.all() {
        println!("{} - {}", workflow.name(), workflow.description());
        println!("  {:<22} {:<12} {:<12} {}", "STEP", "KIND", "RUNS", "OUTPUTS");

        for step in workflow.steps() {
            let kind = match step.executor() {
                Executor::Nested(nested) => format!("-> {}", nested.workflow().name()),
                other => other.kind().to_string(),
            };
            let runs = match step.condition() {
                Condition::Always => "always",
                Condition::When(_) => "conditional",
            };
            println!(
                "  {:<22} {:<12} {:<12} {}",
                step.name(),
                kind,
                runs,
                step.outputs().join(", ")
            );
        }

        if let Some(returns) = workflow.returns() {
            println!("  returns: {}", returns.join(", "));
        }
        println!();
    }

    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("docflow configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Artifacts: {}", cfg.output_dir.display());
    println!();
    println!("Capability:");
    println!("  Backend:   {}", cfg.capability.backend);
    println!("  Model:     {}", cfg.capability.model);
    println!("  API key:   ${}", cfg.capability.api_key_env);
    println!("  Timeout:   {}s", cfg.capability.timeout.as_secs());
    println!("  Max tokens: {}", cfg.capability.max_tokens);
    if cfg.capability.roles.is_empty() {
        println!("  Roles:     (using defaults)");
    } else {
        println!("  Roles:");
        let mut roles: Vec<_> = cfg.capability.roles.iter().collect();
        roles.sort();
        for (role, value) in roles {
            println!("    {}: {}", role, value);
        }
    }
    println!();
    println!("Artifacts:");
    println!("  Collision policy: {:?}", cfg.collision);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::try_parse_from([
            "docflow",
            "--backend",
            "echo",
            "generate",
            "Blog Scheduler",
            "--context",
            "schedule posts",
            "--scope",
            "product",
            "--research",
        ])
        .unwrap();

        assert!(matches!(cli.backend, Some(BackendArg::Echo)));
        match cli.command {
            Commands::Generate { request } => {
                let request = GenerationRequest::from(request);
                assert_eq!(request.subject_name, "Blog Scheduler");
                assert_eq!(request.scope, Some(Scope::Product));
                assert!(request.enable_research);
                assert!(!request.enable_competitor_analysis);
            }
            other => panic!("Expected Generate, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_requires_context() {
        assert!(Cli::try_parse_from(["docflow", "discover", "Blog"]).is_err());
    }

    #[test]
    fn test_cli_parses_review() {
        let cli = Cli::try_parse_from([
            "docflow",
            "review",
            "Blog",
            "--code-file",
            "src/lib.rs",
            "--json",
        ])
        .unwrap();

        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Review { architecture_file: None, .. }
        ));
    }

    #[test]
    fn test_cli_parses_implement() {
        let cli = Cli::try_parse_from([
            "docflow",
            "implement",
            "Blog",
            "--task",
            "queue posts",
            "--architecture-file",
            "ticket.md",
        ])
        .unwrap();

        match cli.command {
            Commands::Implement {
                task,
                architecture_file,
                ..
            } => {
                assert_eq!(task, "queue posts");
                assert_eq!(architecture_file, PathBuf::from("ticket.md"));
            }
            other => panic!("Expected Implement, got {:?}", other),
        }
        assert!(Cli::try_parse_from(["docflow", "implement", "Blog", "--task", "x"]).is_err());
    }

    #[test]
    fn test_echo_invoker_needs_no_credentials() {
        let invoker = build_invoker(Backend::Echo, &CapabilitySettings::default()).unwrap();
        assert_eq!(invoker.name(), "echo");
    }
}
