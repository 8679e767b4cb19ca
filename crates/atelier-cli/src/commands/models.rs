//! `atelier models` -- print the backend registry as a table.

use anyhow::bail;
use clap::Args;
use comfy_table::{Table, presets::UTF8_FULL};

use atelier_router::{BackendDescriptor, BackendRegistry, Category};

/// Arguments for the `atelier models` subcommand.
#[derive(Args)]
pub struct ModelsArgs {
    /// Only show one category (e.g. "image-gen", "chat", "upscale").
    #[arg(long)]
    pub category: Option<String>,
}

pub async fn run(args: ModelsArgs) -> anyhow::Result<()> {
    let registry = BackendRegistry::builtin();
    let backends: Vec<&BackendDescriptor> = match args.category.as_deref() {
        None => registry.all().iter().collect(),
        Some(raw) => match Category::parse(raw) {
            Some(category) => registry.by_category(category),
            None => {
                let known: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
                bail!("unknown category '{raw}' (expected one of: {})", known.join(", "));
            }
        },
    };
    println!("{}", models_table(&backends));
    Ok(())
}

fn models_table(backends: &[&BackendDescriptor]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["ID", "CATEGORY", "PROVIDER", "ENDPOINT"]);
    for b in backends {
        table.add_row([
            b.id.as_str(),
            b.category.as_str(),
            b.kind.provider_label(),
            b.endpoint.as_str(),
        ]);
    }
    table
}
