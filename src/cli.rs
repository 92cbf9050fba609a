//! Minimal CLI: analyze → (json | summary)
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use schemodel::{Analyzer, ConfigTranslator, Model, Role, TranslatorConfig};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// analyze OpenAPI/Swagger-style schema files into a language-agnostic type model
#[derive(Parser, Debug)]
#[command(name = "schemodel", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// analyze and print every resulting model as JSON
    Analyze(AnalyzeOut),
    /// analyze and print a short listing of schemas, calls and imports
    Summary(SummaryOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs, relative to --base-dir. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// directory the inputs are resolved against
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// naming policy config (.yaml or .json); names are only sanitized if omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// structural role of the inputs: in, out or in-out
    #[arg(long, default_value = "in-out")]
    role: Role,
}

#[derive(clap::Parser, Debug)]
struct AnalyzeOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct SummaryOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    /// Every Model the inputs lead to, dependencies first.
    fn analyze(&self) -> Result<Vec<Rc<Model>>> {
        let translator = match self.config.as_ref() {
            Some(path) => ConfigTranslator::from_file(path)?,
            None => ConfigTranslator::new(TranslatorConfig::default())?,
        };
        let base_dir = std::fs::canonicalize(&self.base_dir)
            .with_context(|| format!("base directory {} not found", self.base_dir.display()))?;
        let patterns = self
            .input
            .iter()
            .map(|pattern| base_dir.join(pattern).to_string_lossy().into_owned());
        let source_paths = resolve_file_path_patterns(patterns)?;

        let mut analyzer = Analyzer::new(&translator, base_dir.clone());
        for source_path in &source_paths {
            analyzer
                .load_model(source_path, self.role)
                .with_context(|| format!("failed to analyze {}", source_path.display()))?;
        }
        Ok(analyzer.all_models().values().cloned().collect())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Analyze(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let models = target.input_settings.analyze()?;
                let models = models.iter().map(|model| &**model).collect::<Vec<&Model>>();
                let models_src = serde_json::to_string_pretty(&models)?;
                match target.out.as_ref() {
                    Some(out) => write_output(out, &models_src)?,
                    None => println!("{models_src}"),
                }
            }
            Command::Summary(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let models = target.input_settings.analyze()?;
                for model in &models {
                    print_summary(model);
                }
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    std::fs::write(out, contents).with_context(|| format!("cannot write {}", out.display()))
}

fn print_summary(model: &Model) {
    println!("{}", model.file().display().to_string().bold());
    for (name, schema) in model.schemas() {
        match schema.alias_of() {
            Some(target) => println!("  {} {name} = {target}", "schema".cyan()),
            None => println!("  {} {name}", "schema".cyan()),
        }
        for field in &schema.fields {
            let optional = if field.required { "" } else { "?" };
            println!("    {}{optional}: {}", field.name, field.ty);
        }
    }
    for call in model.calls() {
        println!(
            "  {} {} {} {}",
            "call".green(),
            call.verb.to_uppercase(),
            call.path,
            call.name.dimmed()
        );
    }
    for import in model.imports() {
        println!("  {} {}", "import".yellow(), import.display());
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths_pass_through_and_globs_expand() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yaml"), "type: string\n").unwrap();
        std::fs::write(dir.path().join("b.yaml"), "type: string\n").unwrap();

        let glob = dir.path().join("*.yaml").to_string_lossy().into_owned();
        let mut found = resolve_file_path_patterns([glob]).unwrap();
        found.sort();
        assert_eq!(found, [dir.path().join("a.yaml"), dir.path().join("b.yaml")]);

        let literal = resolve_file_path_patterns(["not/there.yaml"]).unwrap();
        assert_eq!(literal, [PathBuf::from("not/there.yaml")]);

        let nothing = dir.path().join("*.json").to_string_lossy().into_owned();
        assert!(resolve_file_path_patterns([nothing]).is_err());
    }

    #[test]
    fn arguments_parse() {
        let cli = CommandLineInterface::try_parse_from([
            "schemodel", "summary", "--input", "api/*.yaml", "--role", "out",
        ])
        .unwrap();
        let Command::Summary(target) = cli.cmd else {
            panic!("expected the summary command");
        };
        assert_eq!(target.input_settings.role, Role::Out);
        assert_eq!(target.input_settings.base_dir, PathBuf::from("."));
    }
}
