use std::path::PathBuf;

use anyhow::{Result, anyhow};

use bake_forge::bake::RunStatus;
use bake_forge::document::spec::build_document;
use bake_forge::progress::LogProgress;
use bake_forge::{HeadlessRenderer, load_project_from_path, run_jobs};

#[derive(Debug, Default, Clone)]
struct Cli {
    project_json: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--project-json" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --project-json"));
                };
                cli.project_json = Some(PathBuf::from(v));
                i += 2;
            }
            "--outputdir" | "--output-dir" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --outputdir"));
                };
                cli.output_dir = Some(PathBuf::from(v));
                i += 2;
            }
            other => {
                return Err(anyhow!(
                    "unknown argument: {other} (supported: --project-json <project.json>, --outputdir <dir>)"
                ));
            }
        }
    }
    Ok(cli)
}

fn default_project_path() -> PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("assets")
        .join("bake-example.json")
}

fn main() -> Result<()> {
    env_logger::init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&argv)?;

    let project_path = cli.project_json.unwrap_or_else(default_project_path);
    let mut project = load_project_from_path(&project_path)?;

    // Re-root every job's output under --outputdir when given.
    if let Some(dir) = &cli.output_dir {
        for job in &mut project.jobs {
            job.output = dir.join(&job.output);
        }
    }

    let mut doc = build_document(&project.document)?;
    let mut renderer = HeadlessRenderer::new();
    let report = run_jobs(&mut doc, &mut renderer, &project.jobs, &LogProgress)?;

    for message in &report.messages {
        println!("{message}");
    }
    match report.status {
        RunStatus::Finished => {
            println!("finished in {:.2?}", report.elapsed);
            Ok(())
        }
        RunStatus::Cancelled => {
            println!("cancelled");
            std::process::exit(1);
        }
    }
}
