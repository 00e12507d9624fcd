//! Git-merge-driver-compatible CLI: merges three Java source files and
//! either overwrites `left` in place (`--git`) or writes the result to
//! `--output`/stdout. Exit code 0 means conflict-free, 1 means conflicts
//! remain, anything above 128 (via `panic = "abort"`) means we crashed —
//! Git treats that as "fall back to your own merge algorithm".

use std::{fs, path::PathBuf, process::exit};

use clap::Parser;
use jmerge::{DisplaySettings, settings::{imitate_cr_lf_from_input, normalize_to_lf}};
use log::warn;

/// Syntax-aware three-way merge driver for Java source files.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CliArgs {
    /// Path to the file containing the base revision
    base: PathBuf,
    /// Path to the file containing the left revision
    left: PathBuf,
    /// Path to the file containing the right revision
    right: PathBuf,
    /// Display compact conflicts, breaking down lines
    #[arg(short, long, default_missing_value = "true", num_args = 0..=1, require_equals = true)]
    compact: Option<bool>,
    /// Length of conflict markers
    #[arg(short = 'l', long)]
    conflict_marker_size: Option<usize>,
    /// Behave as a Git merge driver: overwrite the left revision in place
    #[clap(short, long)]
    git: bool,
    /// Path to write the merge result to (instead of stdout)
    #[clap(short, long, conflicts_with = "git")]
    output: Option<PathBuf>,
    /// Name to use for the base revision in conflict markers
    #[clap(short = 's', long)]
    base_name: Option<String>,
    /// Name to use for the left revision in conflict markers
    #[clap(short = 'x', long)]
    left_name: Option<String>,
    /// Name to use for the right revision in conflict markers
    #[clap(short = 'y', long)]
    right_name: Option<String>,
    /// Verbosity
    #[clap(short, long)]
    verbose: bool,
}

fn main() {
    let args = CliArgs::parse();

    stderrlog::new()
        .module(module_path!())
        .verbosity(if args.verbose { 3 } else { 2 })
        .init()
        .unwrap();

    match real_main(args) {
        Ok(exit_code) => exit(exit_code),
        Err(err) => {
            eprintln!("jmerge: {err}");
            exit(1)
        }
    }
}

fn real_main(args: CliArgs) -> Result<i32, String> {
    let settings = DisplaySettings {
        compact: args.compact.unwrap_or_default(),
        conflict_marker_size: args.conflict_marker_size.unwrap_or(7),
        base_revision_name: args.base_name.unwrap_or_else(|| "BASE".to_string()),
        left_revision_name: args.left_name.unwrap_or_else(|| "LEFT".to_string()),
        right_revision_name: args.right_name.unwrap_or_else(|| "RIGHT".to_string()),
        ..Default::default()
    };

    let original_left = read_file_to_string(&args.left)?;
    let contents_base = normalize_to_lf(&read_file_to_string(&args.base)?);
    let contents_left = normalize_to_lf(&original_left);
    let contents_right = normalize_to_lf(&read_file_to_string(&args.right)?);

    let merge_result = jmerge::merge(&contents_base, &contents_left, &contents_right, &settings);
    let contents = imitate_cr_lf_from_input(&original_left, &merge_result.contents);

    if let Some(fname_out) = &args.output {
        write_string_to_file(fname_out, &contents)?;
    } else if args.git {
        write_string_to_file(&args.left, &contents)?;
    } else {
        print!("{contents}");
    }

    if merge_result.has_conflicts() {
        warn!("jmerge left {} conflict(s) unresolved", merge_result.conflict_count);
        Ok(1)
    } else {
        Ok(0)
    }
}

fn read_file_to_string(path: &PathBuf) -> Result<String, String> {
    fs::read_to_string(path).map_err(|err| format!("could not read {}: {err}", path.display()))
}

fn write_string_to_file(path: &PathBuf, contents: &str) -> Result<(), String> {
    fs::write(path, contents).map_err(|err| format!("could not write {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }
}
