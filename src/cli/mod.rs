//! Command-line front end: list and call tools of configured MCP servers.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use crate::adapter::{sanitize_function_name, CodeAgentAdapter, CodeAgentTool, HostLanguage, ToolOutput};
use crate::config::{default_servers_path, BridgeConfig, ServersFile};
use crate::error::BridgeError;
use crate::mcp::{AggregateOptions, McpToolset};

/// MCP tool bridge CLI
#[derive(Parser, Debug)]
#[command(name = "mcp-bridge", version, about = "Inspect and call MCP server tools")]
pub struct Cli {
    /// Servers file (defaults to <config dir>/servers.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the tools of every configured server
    Tools(ToolsArgs),
    /// Call one tool and print its output
    Call(CallArgs),
}

#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Skip servers that fail to connect instead of aborting
    #[arg(long)]
    pub keep_going: bool,

    /// Report structured output types
    #[arg(long)]
    pub structured: bool,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Tool name, as advertised by the server
    pub tool: String,

    /// Arguments as a JSON object
    #[arg(short, long, default_value = "{}")]
    pub args: String,

    /// Reconcile structured output
    #[arg(long)]
    pub structured: bool,
}

/// Run a parsed command line.
pub fn run(cli: Cli) -> Result<(), BridgeError> {
    let path = match cli.config {
        Some(path) => path,
        None => default_servers_path().ok_or_else(|| {
            BridgeError::Configuration("no config directory; pass --config".into())
        })?,
    };
    let file = ServersFile::load(&path)?;
    let bridge = file.bridge_config(BridgeConfig::from_env()?);
    let descriptors = file.descriptors()?;

    match cli.command {
        Commands::Tools(args) => {
            let adapter = CodeAgentAdapter::new().structured(args.structured);
            let options = AggregateOptions::new()
                .fail_fast(!args.keep_going)
                .with_bridge_config(bridge);
            let mut toolset = McpToolset::connect(descriptors, &adapter, options)?;
            for tool in toolset.tools() {
                println!("{}", describe(tool));
            }
            for failed in toolset.failed_connections() {
                eprintln!("! {}: {}", failed.descriptor.label(), failed.error);
            }
            toolset.close();
            Ok(())
        }
        Commands::Call(args) => {
            let arguments: Value = serde_json::from_str(&args.args)
                .map_err(|e| BridgeError::InvalidArgument(format!("--args is not JSON: {e}")))?;
            let adapter = CodeAgentAdapter::new().structured(args.structured);
            let options = AggregateOptions::new()
                .fail_fast(false)
                .with_bridge_config(bridge);
            let mut toolset = McpToolset::connect(descriptors, &adapter, options)?;

            let wanted = sanitize_function_name(&args.tool, HostLanguage::Python);
            let tool = toolset
                .tools()
                .iter()
                .find(|tool| tool.name == wanted)
                .ok_or_else(|| BridgeError::InvalidArgument(format!("no tool named '{}'", args.tool)))?;
            let output = tool.forward(arguments);
            toolset.close();
            println!("{}", render(output?)?);
            Ok(())
        }
    }
}

fn describe(tool: &CodeAgentTool) -> String {
    let inputs: Vec<String> = tool
        .inputs
        .iter()
        .map(|(name, input)| {
            let marker = if input.nullable { "?" } else { "" };
            format!("{name}{marker}: {}", input.kind)
        })
        .collect();
    format!(
        "{}({}) -> {}  {}",
        tool.name,
        inputs.join(", "),
        tool.output_type,
        tool.description
    )
}

fn render(output: ToolOutput) -> Result<String, BridgeError> {
    Ok(match output {
        ToolOutput::Text(text) => text,
        ToolOutput::Structured(value) => serde_json::to_string_pretty(&value)?,
        ToolOutput::Image { mime_type, data } | ToolOutput::Audio { mime_type, data } => {
            format!("<{mime_type}, {} bytes>", data.len())
        }
    })
}
