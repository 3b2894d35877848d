//! Minimal CLI: infer → (types | structure)
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::codegen::{Codegen, pascal_case};
use crate::config::Settings;
use crate::inference::{InferenceConfig, infer_from_values, infer_query_results, infer_type_structure};
use crate::types::TypeStructure;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// infer structural types from JSON/NDJSON query samples and emit TypeScript declarations
#[derive(Parser, Debug)]
#[command(name = "shapegen", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// more logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// errors only
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// infer and emit TypeScript declarations
    Types(TypesOut),
    /// infer and print the pruned type graph as JSON
    Structure(StructureOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /result)
    #[arg(long)]
    json_pointer: Option<String>,

    /// treat the documents as the statement results of one query with this id
    #[arg(long)]
    query_id: Option<String>,

    /// infer every input file on its own (in parallel)
    #[arg(long, default_value_t = false)]
    per_file: bool,

    /// JSON settings file (root name, literals, depth limit)
    #[arg(long)]
    config: Option<PathBuf>,

    /// One or more inputs. May be literal paths or quoted glob patterns or '-' for stdin
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct TypesOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// top-level type name
    #[arg(long)]
    root_name: Option<String>,

    /// emit `type X = {..}` instead of interfaces
    #[arg(long)]
    type_alias: bool,

    /// render an object root as a tuple of its fields
    #[arg(long)]
    tuple_root: bool,

    /// output .ts file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct StructureOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// Samples read from one input.
#[derive(Debug)]
struct Document {
    source: String,
    values: Vec<Value>,
}

/// One inference run and the name its root will be declared under.
struct Job {
    name: String,
    values: Vec<Value>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn settings(&self) -> Result<Settings> {
        match &self.config {
            Some(path) => Settings::load(path).with_context(|| format!("loading {}", path.display())),
            None => Ok(Settings::default()),
        }
    }

    fn load_documents(&self) -> Result<Vec<Document>> {
        let mut docs = Vec::new();
        for pattern in &self.input {
            let sources = if pattern == "-" {
                let src = std::io::read_to_string(std::io::stdin()).context("reading stdin")?;
                vec![("<stdin>".to_owned(), src)]
            } else {
                resolve_file_path_patterns([pattern])?
                    .into_iter()
                    .map(|path| {
                        let src = std::fs::read_to_string(&path)
                            .with_context(|| format!("failed to read {}", path.display()))?;
                        Ok((path.to_string_lossy().to_string(), src))
                    })
                    .collect::<Result<Vec<_>>>()?
            };
            for (source, src) in sources {
                let values = self.parse_source(&source, &src)?;
                if values.is_empty() {
                    warn!(%source, "input yielded no samples");
                }
                docs.push(Document { source, values });
            }
        }
        Ok(docs)
    }

    fn parse_source(&self, source: &str, src: &str) -> Result<Vec<Value>> {
        let raw = if self.ndjson {
            src.lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(i, line)| {
                    serde_json::from_str::<Value>(line)
                        .with_context(|| format!("failed to parse {source} line {}", i + 1))
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            vec![serde_json::from_str::<Value>(src).with_context(|| format!("failed to parse {source}"))?]
        };
        match &self.json_pointer {
            None => Ok(raw),
            Some(ptr) => raw
                .into_iter()
                .map(|v| {
                    v.pointer(ptr)
                        .cloned()
                        .ok_or_else(|| anyhow!("JSON pointer {ptr} selects nothing in {source}"))
                })
                .collect(),
        }
    }

    fn jobs(&self, docs: Vec<Document>, root_name: &str) -> Vec<Job> {
        if self.per_file {
            docs.into_iter()
                .map(|doc| Job { name: file_type_name(&doc.source), values: doc.values })
                .collect()
        } else {
            let values = docs.into_iter().flat_map(|doc| doc.values).collect();
            vec![Job { name: root_name.to_owned(), values }]
        }
    }

    /// Run every job with its own registry; jobs share nothing.
    fn infer_all(&self, jobs: &[Job], config: &InferenceConfig) -> Result<Vec<TypeStructure>> {
        jobs.par_iter()
            .map(|job| {
                infer_job(self.query_id.as_deref(), self.ndjson, &job.values, config)
                    .with_context(|| format!("inferring `{}`", job.name))
            })
            .collect()
    }
}

/// NDJSON lines are always rows of one root, however many there are.
fn infer_job(
    query_id: Option<&str>,
    rows: bool,
    values: &[Value],
    config: &InferenceConfig,
) -> Result<TypeStructure> {
    let result = match (query_id, values) {
        (Some(id), _) => infer_query_results(id, values, config),
        (None, [single]) if !rows => infer_type_structure(single, config),
        (None, many) => infer_from_values(many, config),
    };
    if let Err(e) = &result {
        if e.is_internal() {
            error!(error = %e, "inference aborted on an internal invariant; please report the input");
        }
    }
    Ok(result?)
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn init_logging(&self) -> Result<()> {
        crate::logging::init_logging(self.verbose, self.quiet)
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Types(target) => {
                let input = &target.input_settings;
                let settings = input.settings()?;
                let mut options = settings.codegen_options()?;
                options.use_type_alias |= target.type_alias;
                options.root_as_tuple |= target.tuple_root;
                let root_name = target
                    .root_name
                    .clone()
                    .or_else(|| settings.root_name.clone())
                    .or_else(|| input.query_id.clone())
                    .unwrap_or_else(|| "Root".to_owned());

                // 1) read samples
                let docs = input.load_documents()?;
                let jobs = input.jobs(docs, &root_name);

                // 2) infer
                let structures = input.infer_all(&jobs, &settings.inference_config())?;

                // 3) emit declarations
                let mut cg = Codegen::new(options);
                for (job, structure) in jobs.iter().zip(&structures) {
                    cg.emit(structure, &job.name)
                        .with_context(|| format!("emitting `{}`", job.name))?;
                }
                write_output(target.out.as_deref(), &cg.into_string())
            }
            Command::Structure(target) => {
                let input = &target.input_settings;
                let settings = input.settings()?;
                let docs = input.load_documents()?;
                let jobs = input.jobs(docs, settings.root_name.as_deref().unwrap_or("Root"));
                let structures = input.infer_all(&jobs, &settings.inference_config())?;

                let src = if input.per_file {
                    let named: serde_json::Map<String, Value> = jobs
                        .iter()
                        .zip(&structures)
                        .map(|(job, s)| Ok((job.name.clone(), serde_json::to_value(s)?)))
                        .collect::<Result<_>>()?;
                    serde_json::to_string_pretty(&named)?
                } else {
                    serde_json::to_string_pretty(&structures[0])?
                };
                write_output(target.out.as_deref(), &src)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: Option<&Path>, src: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::write(out, src).with_context(|| format!("writing {}", out.display()))?;
            info!(path = %out.display(), bytes = src.len(), "wrote output");
        }
        None => println!("{src}"),
    }
    Ok(())
}

fn file_type_name(source: &str) -> String {
    let stem = Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    pascal_case(&stem)
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("bad glob pattern {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
            debug!(pattern, "expanded glob");
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
