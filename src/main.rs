//! `recompd`: the CLI surface (§6) over the recomp-core library. A thin
//! wrapper — parse the build config, build/validate a `Context`, drive
//! recompilation against the source generator, and write the output
//! tree (or, under `--dump-context`, describe the input object instead).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use recomp_core::config::BuildConfig;
use recomp_core::driver::recompile_context;
use recomp_core::generator::source::render_preamble;
use recomp_core::generator::{overlay, SourceGenerator};
use recomp_core::{config, dump};

/// Static MIPS III -> native recompiler.
#[derive(Debug, Parser)]
#[command(name = "recomp", version, about)]
struct Cli {
    /// Path to the Input 3 build configuration TOML.
    config: PathBuf,

    /// Describe the input object (`dump.toml` + `data_dump.toml`) instead
    /// of recompiling it.
    #[arg(long)]
    dump_context: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<bool> {
    let build_config = BuildConfig::load(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?;

    let symbol_path = build_config
        .symbol_file
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&build_config.input_binary));

    let mut ctx = config::load_symbol_toml(&symbol_path).with_context(|| format!("loading {}", symbol_path.display()))?;
    build_config.apply(&mut ctx).context("applying build config overrides")?;
    ctx.validate().context("validating context")?;

    std::fs::create_dir_all(&build_config.output_dir).with_context(|| format!("creating {}", build_config.output_dir))?;

    if cli.dump_context {
        write_dump(&build_config.output_dir, &ctx)?;
        return Ok(true);
    }

    let (report, outputs) = recompile_context(&mut ctx, SourceGenerator::new);
    for (function_id, error) in &report.failures {
        let name = ctx.function(*function_id).map(|f| f.name.as_str()).unwrap_or("<unknown>");
        log::error!("failed to recompile {name}: {error}");
    }
    log::info!("recompiled {} of {} functions", report.compiled.len(), report.compiled.len() + report.failures.len());

    write_source_tree(&build_config.output_dir, &ctx, outputs)?;
    write_overlay(&build_config.output_dir, &ctx)?;

    if let Some(symbol_out) = &build_config.output_symbol_file {
        let bytes = recomp_core::modfile::encode(&ctx);
        std::fs::write(symbol_out, bytes).with_context(|| format!("writing {symbol_out}"))?;
    }

    Ok(report.ok())
}

fn write_dump(output_dir: &str, ctx: &recomp_core::Context) -> anyhow::Result<()> {
    let context_dump = dump::dump_context(ctx);
    let data_dump = dump::dump_data(ctx);
    std::fs::write(format!("{output_dir}/dump.toml"), dump::to_toml_string(&context_dump))?;
    std::fs::write(format!("{output_dir}/data_dump.toml"), dump::to_toml_string(&data_dump))?;
    Ok(())
}

fn write_source_tree(
    output_dir: &str,
    ctx: &recomp_core::Context,
    outputs: Vec<(recomp_core::model::FunctionId, SourceGenerator)>,
) -> anyhow::Result<()> {
    let mut header = String::from("#pragma once\n\n");
    let mut body = render_preamble("recomp.h");

    for (function_id, generator) in outputs {
        let Some(function) = ctx.function(function_id) else { continue };
        header.push_str(&format!("void {}(uint8_t* rdram, recomp_context* ctx);\n", function.name));
        body.push_str(&generator.finish());
        body.push('\n');
    }

    std::fs::write(format!("{output_dir}/functions.h"), header)?;
    std::fs::write(format!("{output_dir}/functions.c"), body)?;
    Ok(())
}

fn write_overlay(output_dir: &str, ctx: &recomp_core::Context) -> anyhow::Result<()> {
    let doc = overlay::build_overlay(ctx, true);
    std::fs::write(format!("{output_dir}/overlay.toml"), overlay::to_toml_string(&doc))?;
    Ok(())
}
