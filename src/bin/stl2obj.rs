//! Command-line STL to OBJ converter.
//!
//! ```text
//! stl2obj part.stl                    # writes part.obj
//! stl2obj part.stl out.obj --tolerance 1e-6
//! RUST_LOG=stl2obj=debug stl2obj part.stl
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use stl2obj::convert::default_output_path;
use stl2obj::mesh::WeldParams;
use stl2obj::ConvertStlToObj;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Directives used when `RUST_LOG` is unset, empty, or unparsable.
const DEFAULT_LOG_DIRECTIVES: &str = "warn,stl2obj=info";

#[derive(Debug, Parser)]
#[command(version, about = "Convert an STL mesh into an OBJ mesh with shared vertices")]
struct Args {
    /// Input STL file (binary or ASCII).
    input: PathBuf,

    /// Output OBJ file. Defaults to the input path with an `.obj` extension.
    output: Option<PathBuf>,

    /// Squared distance at or below which two corners are merged.
    #[arg(
        long,
        default_value_t = stl2obj::math::MERGE_TOLERANCE_SQUARED,
        value_parser = parse_tolerance
    )]
    tolerance: f64,
}

/// Accepts finite, non-negative squared distances only.
fn parse_tolerance(text: &str) -> Result<f64, String> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|err| format!("`{text}` is not a number: {err}"))?;
    if !value.is_finite() {
        return Err(format!("tolerance must be finite, got `{text}`"));
    }
    if value < 0.0 {
        return Err(format!("tolerance must not be negative, got `{text}`"));
    }
    Ok(value)
}

/// `RUST_LOG` replaces the defaults entirely, so it can raise or lower any level.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_DIRECTIVES))
}

fn main() -> ExitCode {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(directives.as_deref()))
        .init();

    let args = Args::parse();
    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input));
    let params = WeldParams {
        tolerance_squared: args.tolerance,
    };

    match ConvertStlToObj::new(&args.input, output, params).execute() {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
