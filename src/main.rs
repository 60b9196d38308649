//! Interactive shell for trying EQL queries against a configured registry.

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use eql_compiler::{Backend, QueryCompiler, RegistryBuilder};

/// Bundled demo registry used when no `registry.json` is present.
const SAMPLE_REGISTRY: &str = include_str!("../sample_registry.json");

/// Prefer a registry file in the working directory, fall back to the sample.
fn load_compiler() -> Result<QueryCompiler> {
    match RegistryBuilder::from_json_file("registry.json") {
        Ok(registry) => {
            println!("loaded entity configurations from registry.json");
            Ok(QueryCompiler::new(registry))
        }
        Err(e) => {
            println!("registry.json not usable ({}), using the bundled sample", e);
            let registry = RegistryBuilder::from_json_str(SAMPLE_REGISTRY)
                .context("bundled sample registry must be valid")?;
            Ok(QueryCompiler::new(registry))
        }
    }
}

fn main() -> Result<()> {
    println!("--- EQL compiler shell ---");
    println!("Type an EQL query, e.g.: productCode = \"KETTLE-01\" AND price != 10.50");
    println!("Commands: :entity NAME   (default: product)");
    println!("          :backend relational|search_index   (default: relational)");
    println!("          :quit");

    let compiler = load_compiler()?;
    println!("{} entity configurations loaded", compiler.registry().len());

    let mut editor = DefaultEditor::new()?;
    let mut entity = "product".to_string();
    let mut backend = Backend::Relational;

    loop {
        let line = match editor.readline("eql> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        editor.add_history_entry(line)?;

        if let Some(rest) = line.strip_prefix(":entity") {
            let name = rest.trim();
            if name.is_empty() {
                println!("current entity: {}", entity);
            } else {
                entity = name.to_string();
                println!("entity set to '{}'", entity);
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix(":backend") {
            match rest.trim() {
                "relational" => backend = Backend::Relational,
                "search_index" => backend = Backend::SearchIndex,
                "" => {}
                other => {
                    println!("unknown backend '{}'", other);
                    continue;
                }
            }
            println!("backend is {}", backend.name());
            continue;
        }
        if line == ":quit" || line == ":q" {
            break;
        }

        match compiler.compile(&entity, line, backend) {
            Ok(native) => {
                println!("{}", native.query);
                for (i, param) in native.params.iter().enumerate() {
                    println!("  ?{} = {}", i + 1, param);
                }
            }
            Err(e) => println!("error: {}", e),
        }
    }

    Ok(())
}
