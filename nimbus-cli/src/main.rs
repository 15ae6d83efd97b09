// nimbus-cli: entry point for nimbus tooling (glue generation, API dump).

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use nimbus_codegen::GlueMode;

#[derive(Parser)]
#[command(name = "nimbus", about = "Nimbus CLI — managed binding tools")]
struct Cli {
    /// Generate managed API sources and native glue into the given directory.
    #[arg(long, value_name = "DIR")]
    generate_mono_glue: Option<PathBuf>,

    /// Generate only the managed API sources.
    #[arg(long, value_name = "DIR", conflicts_with = "generate_mono_glue")]
    generate_mono_cs_glue: Option<PathBuf>,

    /// Generate only the native glue.
    #[arg(
        long,
        value_name = "DIR",
        conflicts_with_all = ["generate_mono_glue", "generate_mono_cs_glue"]
    )]
    generate_mono_cpp_glue: Option<PathBuf>,

    /// Print the exposed API dump as JSON and exit.
    #[arg(long, conflicts_with_all = ["generate_mono_glue", "generate_mono_cs_glue", "generate_mono_cpp_glue"])]
    dump_api: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.dump_api {
        nimbus_core::register_core_classes();
        nimbus_core::class_db::register_all_from_inventory();
        let dump = nimbus_codegen::api_dump::ApiDump::from_class_db();
        println!("{}", dump.to_json());
        return;
    }

    let (dir, mode) = match (
        cli.generate_mono_glue,
        cli.generate_mono_cs_glue,
        cli.generate_mono_cpp_glue,
    ) {
        (Some(dir), _, _) => (dir, GlueMode::All),
        (_, Some(dir), _) => (dir, GlueMode::CsOnly),
        (_, _, Some(dir)) => (dir, GlueMode::CppOnly),
        _ => {
            eprintln!("Error: no action specified.");
            eprintln!("Use --generate-mono-glue, --generate-mono-cs-glue, --generate-mono-cpp-glue or --dump-api.");
            std::process::exit(1);
        }
    };

    // Verification failure inside run_generate exits non-zero.
    nimbus_codegen::run_generate(&dir, mode);
}
