use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shroud_core::ir::{eval_function, Module, Type, Value};
use shroud_core::pipeline::{DebugConfig, TransformPipeline, VALID_PASS_NAMES};
use shroud_core::transforms::transform_by_name;

#[derive(Parser)]
#[command(name = "shroud", about = "IR obfuscation toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a JSON-serialized IR module in human-readable form.
    PrintIr {
        /// Path to a JSON IR module file.
        file: PathBuf,
    },
    /// Run obfuscation passes over a module and write the result as JSON.
    Run {
        /// Path to a JSON IR module file.
        file: PathBuf,
        /// Passes to run, in order (e.g. "flattening", "substitution").
        #[arg(long = "pass", required = true)]
        passes: Vec<String>,
        /// Output path; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Re-run the pipeline until no pass reports changes.
        #[arg(long)]
        fixpoint: bool,
        /// Emit per-function trace lines to stderr.
        #[arg(long)]
        trace: bool,
        /// Stop after the named pass and dump IR to stderr.
        #[arg(long = "dump-ir-after")]
        dump_ir_after: Option<String>,
        /// Filter IR dumps to functions whose name contains this substring.
        #[arg(long = "dump-function")]
        dump_function: Option<String>,
    },
    /// Evaluate a function under the reference interpreter.
    Eval {
        /// Path to a JSON IR module file.
        file: PathBuf,
        /// Name of the function to run.
        #[arg(long)]
        func: String,
        /// Integer arguments, one per parameter.
        #[arg(long = "args", value_delimiter = ',')]
        args: Vec<i64>,
    },
}

fn load_module(path: &Path) -> Result<Module> {
    let file =
        File::open(path).with_context(|| format!("failed to open IR file: {}", path.display()))?;
    let reader = BufReader::new(file);
    let module: Module = serde_json::from_reader(reader)
        .with_context(|| format!("failed to parse IR file: {}", path.display()))?;
    Ok(module)
}

fn cmd_print_ir(file: &Path) -> Result<()> {
    let module = load_module(file)?;
    for func in module.functions.values() {
        println!("{func}");
    }
    Ok(())
}

fn cmd_run(
    file: &Path,
    passes: &[String],
    out: Option<&Path>,
    fixpoint: bool,
    debug: &DebugConfig,
) -> Result<()> {
    let module = load_module(file)?;

    let mut pipeline = TransformPipeline::new();
    for name in passes {
        let transform = transform_by_name(name).map_err(|_| {
            anyhow::anyhow!(
                "unknown pass: {name:?} (valid: {})",
                VALID_PASS_NAMES.join(", ")
            )
        })?;
        pipeline.add(transform);
    }
    pipeline.set_fixpoint(fixpoint);

    let output = pipeline
        .run_with_debug(module, debug)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    if let Some(stop_after) = &debug.dump_ir_after {
        if !output.stopped_early {
            eprintln!("[warn] --dump-ir-after pass {stop_after:?} not in pipeline; ran to completion");
        }
    }

    match out {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create output file: {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &output.module)?;
            writer.write_all(b"\n")?;
        }
        None => {
            let json = serde_json::to_string_pretty(&output.module)?;
            println!("{json}");
        }
    }
    Ok(())
}

fn cmd_eval(file: &Path, func_name: &str, args: &[i64]) -> Result<()> {
    let module = load_module(file)?;
    let Some(func_id) = module.function_by_name(func_name) else {
        bail!("function not found: {func_name:?}");
    };
    let func = &module.functions[func_id];

    if args.len() != func.sig.params.len() {
        bail!(
            "{} takes {} argument(s), got {}",
            func_name,
            func.sig.params.len(),
            args.len()
        );
    }
    let values: Vec<Value> = func
        .sig
        .params
        .iter()
        .zip(args)
        .map(|(ty, &raw)| match ty {
            Type::Bool => Ok(Value::Bool(raw != 0)),
            Type::Int(_) => Ok(Value::Int(raw)),
            Type::UInt(_) => Ok(Value::UInt(raw as u64)),
            Type::Float(_) => Ok(Value::Float(raw as f64)),
            Type::Void => bail!("{func_name} declares a void parameter"),
        })
        .collect::<Result<_>>()?;

    let result = eval_function(func, &values).map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{result}");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Command::PrintIr { file } => cmd_print_ir(file),
        Command::Run {
            file,
            passes,
            out,
            fixpoint,
            trace,
            dump_ir_after,
            dump_function,
        } => {
            let debug = DebugConfig {
                dump_ir_after: dump_ir_after.clone(),
                function_filter: dump_function.clone(),
                trace: *trace,
            };
            cmd_run(file, passes, out.as_deref(), *fixpoint, &debug)
        }
        Command::Eval { file, func, args } => cmd_eval(file, func, args),
    }
}
