use clap::Parser;
use crucible_cli::{Opt, Run};

fn main() {
    let opt = Opt::parse();

    let filter = map_log_level(&opt.global.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = crucible_config::Config::load().and_then(crucible_config::Config::make_current) {
        eprintln!("failed to load configuration: {err}");
        std::process::exit(1);
    }

    let exit_code = match opt.command.run(&opt.global) {
        Ok(code) => code,
        Err(err) => {
            let marker_file = opt.global.error_marker_file.clone();
            let exit_code = err.exit_code();
            if let Some(path) = &marker_file {
                if let Err(write_err) = err.write_marker_file(path) {
                    eprintln!("failed to write error marker file: {write_err}");
                }
            }
            eprintln!("{:?}", miette::Report::new(err));
            exit_code
        }
    };
    std::process::exit(exit_code);
}

/// Maps the CLI's `{trace,debug,info,warn,error,critical,silent}` levels
/// onto `tracing`'s filter directives; `critical` and `silent` have no
/// `tracing::Level` equivalent so they collapse to `error` and `off`.
fn map_log_level(level: &str) -> &'static str {
    match level {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        "critical" => "error",
        "silent" => "off",
        _ => "info",
    }
}

